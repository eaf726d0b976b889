// ABOUTME: Parsing of full user-facing roll specifications.
// ABOUTME: Splits off the title, pipe-delimited global modifiers, percentile shorthand and permutations.

use crate::describe::{StructuredDescriptionSet, Tag};
use crate::dice::Natural;
use crate::error::{Error, Result};
use crate::lexer::{self, Scanner};
use crate::permute::Template;

const DEFAULT_SUCCESS: &str = "SUCCESS";
const DEFAULT_FAIL: &str = "FAIL";
const DEFAULT_HIT: &str = "HIT";
const DEFAULT_MISS: &str = "MISS";

/// Word pairs used to guess a fail label from a success label.
const ANTONYMS: &[(&str, &str)] = &[
    ("hit", "miss"),
    ("success", "fail"),
    ("succeed", "fail"),
    ("pass", "fail"),
    ("yes", "no"),
    ("true", "false"),
    ("win", "lose"),
    ("good", "bad"),
    ("make", "miss"),
    ("save", "fail"),
];

/// Critical confirmation settings (`|c[threat][±bonus]`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confirm {
    /// Lowest natural roll that threatens; defaults to the die's maximum face.
    pub threat: Option<u32>,
    pub bonus: i64,
}

impl Confirm {
    fn text(&self) -> String {
        let mut s = "c".to_string();
        if let Some(threat) = self.threat {
            s.push_str(&threat.to_string());
        }
        if self.bonus != 0 {
            s.push_str(&format!("{:+}", self.bonus));
        }
        s
    }
}

/// Percentile shorthand (`42% hit/miss`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Percentile {
    pub chance: u32,
    pub success: String,
    pub fail: String,
}

impl Percentile {
    pub(crate) fn text(&self) -> String {
        format!("{}% {}/{}", self.chance, self.success, self.fail)
    }
}

/// A parsed specification: title, core expression and global modifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Specification {
    pub title: String,
    /// The core expression with any `|min`/`|max` clauses re-appended.
    /// Still contains braces when the specification has permutations.
    pub expression: String,
    pub template: Option<Template>,
    pub confirm: Option<Confirm>,
    pub repeat_for: Option<u32>,
    pub repeat_until: Option<i64>,
    pub maximized: bool,
    pub dc: Option<i64>,
    /// Natural max succeeds and natural 1 fails automatically.
    pub auto_sf: bool,
    /// Explicit success/fail labels from `|sf`.
    pub labels: Option<(String, String)>,
    pub percentile: Option<Percentile>,
}

impl Specification {
    /// Parse `[title=] expr (| modifier)*` or `[title=] N% [success[/fail]] (| modifier)*`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parsed = Specification::default();

        let body = match title_split(spec) {
            Some(i) => {
                parsed.title = spec[..i].trim().to_string();
                &spec[i + 1..]
            }
            None => spec,
        };
        let body = lexer::normalize(body);
        let mut parts = body.split('|');
        let core = parts.next().unwrap_or_default().trim();

        let mut clamps = String::new();
        let mut others = Vec::new();
        for clause in parts {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            if parsed.parse_clause(clause, &mut clamps)? {
                others.push(clause);
            }
        }

        if let Some(template) = Template::extract(core)? {
            let first = template.permutations().next().unwrap_or_default();
            if match_percentile(&template.substitute(&first)).is_some() {
                return Err(Error::IncompatibleModifier(
                    "permutations cannot be combined with a percentile roll".to_string(),
                ));
            }
        }

        if let Some(percentile) = match_percentile(core) {
            if let Some(clause) = others.first() {
                return Err(Error::IncompatibleModifier(format!(
                    "'{}' cannot be combined with a percentile roll",
                    clause
                )));
            }
            parsed.percentile = Some(percentile);
            return Ok(parsed);
        }

        if core.is_empty() {
            return Err(Error::syntax("empty expression"));
        }
        parsed.expression = format!("{}{}", core, clamps);
        parsed.template = Template::extract(&parsed.expression)?;
        tracing::debug!(spec, title = %parsed.title, expression = %parsed.expression, "parsed specification");
        Ok(parsed)
    }

    /// Apply one modifier clause. Returns `true` for clauses that a
    /// percentile roll cannot carry.
    fn parse_clause(&mut self, clause: &str, clamps: &mut String) -> Result<bool> {
        let unknown = || Error::UnknownModifier(clause.to_string());

        if clause == "!" || clause.eq_ignore_ascii_case("maximized") {
            self.maximized = true;
            return Ok(false);
        }

        let mut scan = Scanner::new(clause);
        if scan.eat_word("min") || scan.eat_word("max") {
            scan.skip_ws();
            scan.signed().filter(|_| scan.at_end()).ok_or_else(unknown)?;
            clamps.push('|');
            clamps.push_str(clause);
            return Ok(true);
        }
        if scan.eat_word("until") {
            scan.skip_ws();
            let target = scan.signed().filter(|_| scan.at_end()).ok_or_else(unknown)?;
            self.repeat_until = Some(target);
            return Ok(false);
        }
        if scan.eat_word("repeat") {
            scan.skip_ws();
            let count = scan
                .digits()
                .filter(|_| scan.at_end())
                .ok_or_else(unknown)?;
            if count == 0 {
                return Err(Error::syntax("repeat count must be at least 1"));
            }
            self.repeat_for = Some(u32::try_from(count).map_err(|_| unknown())?);
            return Ok(false);
        }
        if scan.eat_word("dc") {
            scan.skip_ws();
            let dc = scan.signed().filter(|_| scan.at_end()).ok_or_else(unknown)?;
            self.dc = Some(dc);
            return Ok(true);
        }
        if scan.eat_word("sf") {
            self.auto_sf = true;
            self.labels = parse_labels(scan.rest());
            return Ok(true);
        }
        if scan.eat('c') || scan.eat('C') {
            scan.skip_ws();
            let threat = scan
                .digits()
                .map(|t| u32::try_from(t).map_err(|_| unknown()))
                .transpose()?;
            scan.skip_ws();
            let bonus = match scan.peek() {
                None => 0,
                Some('+') | Some('-') => scan.signed().filter(|_| scan.at_end()).ok_or_else(unknown)?,
                Some(_) => return Err(unknown()),
            };
            self.confirm = Some(Confirm { threat, bonus });
            return Ok(true);
        }

        Err(unknown())
    }

    /// Whether the specification always yields more than one result.
    pub fn always_multiple(&self) -> bool {
        let per_iteration = self.template.as_ref().map_or(1, Template::len);
        self.repeat_for.unwrap_or(1) as usize * per_iteration > 1
    }

    /// Success and fail labels in effect for DC and auto success/fail reporting.
    pub fn effective_labels(&self) -> (String, String) {
        match (&self.labels, &self.confirm) {
            (Some(labels), _) => labels.clone(),
            (None, Some(_)) => (DEFAULT_HIT.to_string(), DEFAULT_MISS.to_string()),
            (None, None) => (DEFAULT_SUCCESS.to_string(), DEFAULT_FAIL.to_string()),
        }
    }

    /// Describe the global modifiers, each introduced by a `|` delimiter.
    pub fn describe_modifiers(&self, set: &mut StructuredDescriptionSet) {
        if let Some(confirm) = &self.confirm {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Critspec, confirm.text());
        }
        if let Some(dc) = self.dc {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Dc, format!("dc {}", dc));
        }
        if self.auto_sf {
            set.push(Tag::Moddelim, "|");
            match &self.labels {
                Some((success, fail)) => set.push(Tag::Sf, format!("sf {}/{}", success, fail)),
                None => set.push(Tag::Sf, "sf"),
            }
        }
        if let Some(n) = self.repeat_for {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Repeat, format!("repeat {}", n));
        }
        if let Some(n) = self.repeat_until {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Until, format!("until {}", n));
        }
        if self.maximized {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Fullmax, "maximized");
        }
    }

    /// Describe how a total fared against the DC and natural-roll rules.
    pub fn describe_outcome(&self, set: &mut StructuredDescriptionSet, total: i64, natural: Natural) {
        let mut verdict = None;
        if let Some(dc) = self.dc {
            match total.cmp(&dc) {
                std::cmp::Ordering::Equal => set.push(Tag::Met, ""),
                std::cmp::Ordering::Greater => set.push(Tag::Exceeded, total.saturating_sub(dc).to_string()),
                std::cmp::Ordering::Less => set.push(Tag::Short, dc.saturating_sub(total).to_string()),
            }
            verdict = Some(total >= dc);
        }
        if self.auto_sf {
            if natural.is_max() {
                verdict = Some(true);
            } else if natural.is_one() {
                verdict = Some(false);
            }
        }
        if let Some(success) = verdict {
            let (s, f) = self.effective_labels();
            if success {
                set.push(Tag::Success, s);
            } else {
                set.push(Tag::Fail, f);
            }
        }
    }
}

/// Byte index of the `=` ending a title, ignoring `<=` and `>=`.
/// A title never extends past the first `|`.
fn title_split(spec: &str) -> Option<usize> {
    let mut prev = None;
    for (i, ch) in spec.char_indices() {
        if ch == '|' {
            return None;
        }
        if ch == '=' && !matches!(prev, Some('<') | Some('>')) {
            return Some(i);
        }
        prev = Some(ch);
    }
    None
}

/// Match `N% [success[/fail]]`.
fn match_percentile(core: &str) -> Option<Percentile> {
    let mut scan = Scanner::new(core);
    scan.skip_ws();
    let chance = u32::try_from(scan.digits()?).ok()?;
    scan.skip_ws();
    if !scan.eat('%') {
        return None;
    }
    let (success, fail) = parse_labels(scan.rest())
        .unwrap_or_else(|| (DEFAULT_SUCCESS.to_string(), DEFAULT_FAIL.to_string()));
    Some(Percentile {
        chance,
        success,
        fail,
    })
}

/// Parse `success[/fail]`, deriving the fail label when it is omitted.
fn parse_labels(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.split_once('/') {
        Some((success, fail)) => Some((success.trim().to_string(), fail.trim().to_string())),
        None => Some((text.to_string(), antonym(text))),
    }
}

/// The opposite of a success label, following its capitalization.
pub fn antonym(label: &str) -> String {
    let lower = label.to_lowercase();
    let Some(&(_, opposite)) = ANTONYMS.iter().find(|(word, _)| *word == lower) else {
        return format!("NOT {}", label);
    };

    if label.chars().all(|c| !c.is_lowercase()) {
        opposite.to_uppercase()
    } else if label.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = opposite.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default()
    } else {
        opposite.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_expression() {
        let spec = Specification::parse("d20 + 3").unwrap();
        assert_eq!(spec.title, "");
        assert_eq!(spec.expression, "d20 + 3");
        assert_eq!(spec, Specification { expression: "d20 + 3".into(), ..Default::default() });
    }

    #[test]
    fn test_title() {
        let spec = Specification::parse("Attack‖red≡=d20 + 3 >= 5").unwrap();
        assert_eq!(spec.title, "Attack‖red≡");
        assert_eq!(spec.expression, "d20 + 3 ≥ 5");

        let spec = Specification::parse("d20 <= 15").unwrap();
        assert_eq!(spec.title, "");
    }

    #[test]
    fn test_all_modifiers() {
        let spec =
            Specification::parse("d20+2 | min 3 | max 20 | c19+2 | until 15 | repeat 3 | ! | dc 12 | sf hit")
                .unwrap();
        assert_eq!(spec.expression, "d20+2|min 3|max 20");
        assert_eq!(spec.confirm, Some(Confirm { threat: Some(19), bonus: 2 }));
        assert_eq!(spec.repeat_until, Some(15));
        assert_eq!(spec.repeat_for, Some(3));
        assert!(spec.maximized);
        assert_eq!(spec.dc, Some(12));
        assert!(spec.auto_sf);
        assert_eq!(spec.labels, Some(("hit".to_string(), "miss".to_string())));
    }

    #[test]
    fn test_confirm_defaults() {
        let spec = Specification::parse("d20|c").unwrap();
        assert_eq!(spec.confirm, Some(Confirm::default()));
        assert_eq!(spec.effective_labels(), ("HIT".to_string(), "MISS".to_string()));

        let spec = Specification::parse("d20|c-1").unwrap();
        assert_eq!(spec.confirm, Some(Confirm { threat: None, bonus: -1 }));
    }

    #[test]
    fn test_confirm_spacing_and_sign() {
        let spec = Specification::parse("d20 | c 19").unwrap();
        assert_eq!(spec.confirm, Some(Confirm { threat: Some(19), bonus: 0 }));
        let spec = Specification::parse("d20 | c 19 - 2").unwrap();
        assert_eq!(spec.confirm, Some(Confirm { threat: Some(19), bonus: -2 }));
        let spec = Specification::parse("d20 | c +4").unwrap();
        assert_eq!(spec.confirm, Some(Confirm { threat: None, bonus: 4 }));
        assert!(matches!(Specification::parse("d20 | c19 2"), Err(Error::UnknownModifier(_))));
        assert!(matches!(Specification::parse("d20 | c19 +2 3"), Err(Error::UnknownModifier(_))));
    }

    #[test]
    fn test_title_stops_at_modifiers() {
        let spec = Specification::parse("d20 | sf a=b").unwrap();
        assert_eq!(spec.title, "");
        assert_eq!(spec.expression, "d20");
        assert_eq!(spec.labels, Some(("a=b".to_string(), "NOT a=b".to_string())));

        let spec = Specification::parse("Hit=d20 | sf a=b").unwrap();
        assert_eq!(spec.title, "Hit");
    }

    #[test]
    fn test_extreme_dc_margins() {
        let spec = Specification::parse("d20|dc -9223372036854775807").unwrap();
        let mut set = StructuredDescriptionSet::new();
        spec.describe_outcome(&mut set, i64::MAX, Natural::NotApplicable);
        assert_eq!(set.find(Tag::Exceeded).unwrap().value, i64::MAX.to_string());
    }

    #[test]
    fn test_unknown_modifier() {
        assert!(matches!(Specification::parse("d20|bogus"), Err(Error::UnknownModifier(_))));
        assert!(matches!(Specification::parse("d20|until"), Err(Error::UnknownModifier(_))));
        assert!(matches!(Specification::parse("d20|crit"), Err(Error::UnknownModifier(_))));
        assert!(matches!(Specification::parse("d20|maximum"), Err(Error::UnknownModifier(_))));
    }

    #[test]
    fn test_percentile() {
        let spec = Specification::parse("42%").unwrap();
        let pct = spec.percentile.unwrap();
        assert_eq!(pct.chance, 42);
        assert_eq!((pct.success.as_str(), pct.fail.as_str()), ("SUCCESS", "FAIL"));

        let spec = Specification::parse("Dodge=20% Hit | repeat 2 | maximized").unwrap();
        assert_eq!(spec.title, "Dodge");
        assert_eq!(spec.percentile.unwrap().fail, "Miss");
        assert_eq!(spec.repeat_for, Some(2));

        let spec = Specification::parse("50% lucky/unlucky").unwrap();
        assert_eq!(spec.percentile.unwrap().fail, "unlucky");
    }

    #[test]
    fn test_percentile_incompatibilities() {
        for bad in ["42%|c", "42%|dc 10", "42%|sf", "42%|min 3", "{40/50}%"] {
            assert!(
                matches!(Specification::parse(bad), Err(Error::IncompatibleModifier(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_permutations() {
        let spec = Specification::parse("d20 + {5/3/1} | max 20").unwrap();
        let template = spec.template.as_ref().unwrap();
        assert_eq!(template.text, "d20 + {0}|max 20");
        assert_eq!(template.len(), 3);
        assert!(spec.always_multiple());
        assert!(matches!(Specification::parse("d20 + {5}"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_antonyms() {
        assert_eq!(antonym("hit"), "miss");
        assert_eq!(antonym("HIT"), "MISS");
        assert_eq!(antonym("Success"), "Fail");
        assert_eq!(antonym("Dodge"), "NOT Dodge");
    }

    #[test]
    fn test_describe_outcome() {
        let spec = Specification::parse("d20+3|dc16").unwrap();
        let face = |value| Natural::Face { value, sides: 20 };

        let mut set = StructuredDescriptionSet::new();
        spec.describe_outcome(&mut set, 16, face(13));
        assert_eq!(set.find(Tag::Met).map(|d| d.value.as_str()), Some(""));
        assert_eq!(set.find(Tag::Success).unwrap().value, "SUCCESS");

        let mut set = StructuredDescriptionSet::new();
        spec.describe_outcome(&mut set, 19, face(16));
        assert_eq!(set.find(Tag::Exceeded).unwrap().value, "3");

        let mut set = StructuredDescriptionSet::new();
        spec.describe_outcome(&mut set, 14, face(11));
        assert_eq!(set.find(Tag::Short).unwrap().value, "2");
        assert_eq!(set.find(Tag::Fail).unwrap().value, "FAIL");
    }

    #[test]
    fn test_auto_sf_overrides_dc() {
        let spec = Specification::parse("d20|dc 30|sf").unwrap();
        let mut set = StructuredDescriptionSet::new();
        spec.describe_outcome(&mut set, 20, Natural::Face { value: 20, sides: 20 });
        assert!(set.contains(Tag::Short));
        assert_eq!(set.find(Tag::Success).unwrap().value, "SUCCESS");
    }
}
