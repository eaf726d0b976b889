// ABOUTME: Lazy Cartesian-product expansion of braced alternatives like "d20+{5/3/1}".
// ABOUTME: Extracts value sets into a placeholder template and substitutes combinations on demand.

use crate::error::{Error, Result};

/// An expression with `{0}`, `{1}`, ... placeholders and the values each may take.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub text: String,
    pub value_sets: Vec<Vec<String>>,
}

impl Template {
    /// Pull every `{a/b/...}` group out of `expr`. Returns `None` when there are none.
    pub fn extract(expr: &str) -> Result<Option<Self>> {
        let mut text = String::with_capacity(expr.len());
        let mut value_sets = Vec::new();
        let mut rest = expr;

        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(Error::syntax("'}' without matching '{'"));
            }
            text.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find(['{', '}'])
                .filter(|&i| after[i..].starts_with('}'))
                .ok_or_else(|| Error::syntax("'{' without matching '}'"))?;

            let values: Vec<String> = after[..close]
                .split('/')
                .map(|v| v.trim().to_string())
                .collect();
            if values.len() < 2 {
                return Err(Error::syntax(format!(
                    "'{{{}}}' needs at least two alternatives separated by '/'",
                    &after[..close]
                )));
            }

            text.push_str(&format!("{{{}}}", value_sets.len()));
            value_sets.push(values);
            rest = &after[close + 1..];
        }
        text.push_str(rest);

        if value_sets.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { text, value_sets }))
    }

    /// Number of combinations the template expands to.
    pub fn len(&self) -> usize {
        self.value_sets.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every combination, last slot varying fastest.
    pub fn permutations(&self) -> Permutations<'_> {
        Permutations::new(&self.value_sets)
    }

    /// Fill the placeholders with one value per slot.
    pub fn substitute(&self, values: &[&str]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let slot = after
                .find('}')
                .and_then(|close| after[..close].parse::<usize>().ok().map(|i| (i, close)));
            match slot {
                Some((i, close)) if i < values.len() => {
                    out.push_str(values[i]);
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Odometer over the value sets of a [`Template`]. Finite and restartable:
/// call [`Template::permutations`] again to start over.
#[derive(Debug, Clone)]
pub struct Permutations<'a> {
    sets: &'a [Vec<String>],
    indices: Vec<usize>,
    done: bool,
}

impl<'a> Permutations<'a> {
    pub fn new(sets: &'a [Vec<String>]) -> Self {
        Self {
            sets,
            indices: vec![0; sets.len()],
            done: sets.iter().any(Vec::is_empty),
        }
    }
}

impl<'a> Iterator for Permutations<'a> {
    type Item = Vec<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self
            .indices
            .iter()
            .zip(self.sets)
            .map(|(&i, set)| set[i].as_str())
            .collect();

        // Advance the odometer.
        self.done = true;
        for slot in (0..self.indices.len()).rev() {
            self.indices[slot] += 1;
            if self.indices[slot] < self.sets[slot].len() {
                self.done = false;
                break;
            }
            self.indices[slot] = 0;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract() {
        let t = Template::extract("d20 + {5/3/1} + {2/0}").unwrap().unwrap();
        assert_eq!(t.text, "d20 + {0} + {1}");
        assert_eq!(t.value_sets, vec![vec!["5", "3", "1"], vec!["2", "0"]]);
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(Template::extract("d20 + 5").unwrap(), None);
    }

    #[test]
    fn test_extract_errors() {
        assert!(matches!(Template::extract("d20 + {5}"), Err(Error::Syntax(_))));
        assert!(matches!(Template::extract("d20 + {5/3"), Err(Error::Syntax(_))));
        assert!(matches!(Template::extract("d20 + 5/3}"), Err(Error::Syntax(_))));
        assert!(matches!(Template::extract("d20 + {{5/3}/1}"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_permutation_order() {
        let t = Template::extract("{a/b} {x/y/z}").unwrap().unwrap();
        let all: Vec<String> = t.permutations().map(|p| t.substitute(&p)).collect();
        assert_eq!(all, vec!["a x", "a y", "a z", "b x", "b y", "b z"]);
    }

    #[test]
    fn test_restartable() {
        let t = Template::extract("{1/2}d6").unwrap().unwrap();
        assert_eq!(t.permutations().count(), 2);
        assert_eq!(t.permutations().count(), 2);
    }
}
