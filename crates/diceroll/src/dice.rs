// ABOUTME: Parsed dice expressions and their evaluation.
// ABOUTME: Rolls or maximizes die groups, tracks natural rolls, and renders structured descriptions.

use crate::ast::{Component, DieGroup, Selector};
use crate::describe::{StructuredDescriptionSet, Tag};
use crate::error::{Error, Result};
use crate::parser;
use crate::roller::Rng;
use crate::stack::EvalStack;

/// The unmodified face of the single die that decides criticals and
/// automatic success or failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Natural {
    /// No die contributed (constants only, or `0dN`).
    #[default]
    NotApplicable,
    /// Exactly one single-die group contributed.
    Face { value: u32, sides: u32 },
    /// Several dice contributed, so there is no single natural face.
    Disqualified,
}

impl Natural {
    /// Fold in one die group's natural value: the first contributing group
    /// wins and any later contributing group disqualifies the whole roll.
    fn combine(self, group: Natural) -> Natural {
        match (self, group) {
            (acc, Natural::NotApplicable) => acc,
            (Natural::NotApplicable, group) => group,
            _ => Natural::Disqualified,
        }
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            Natural::Face { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_max(&self) -> bool {
        matches!(self, Natural::Face { value, sides } if value == sides)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Natural::Face { value: 1, .. })
    }
}

/// One attempt at a die group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Raw faces as rolled, before bonus or division.
    pub faces: Vec<u32>,
    /// Sum of the adjusted faces.
    pub sum: i64,
}

/// How one die group came out on one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DieOutcome {
    pub attempts: Vec<Attempt>,
    /// Index of the attempt that counts.
    pub selected: usize,
    pub natural: Natural,
    pub value: i64,
}

/// Result of evaluating a [`Dice`] once. Holds all per-call state so the
/// parsed expression itself is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub total: i64,
    pub natural: Natural,
    pub maximized: bool,
    /// Outcomes of each die group, in expression order.
    pub dice: Vec<DieOutcome>,
}

/// Where die faces come from on one evaluation.
enum Draw<'a, R: Rng + ?Sized> {
    Random(&'a mut R),
    Maximum,
}

impl<R: Rng + ?Sized> Draw<'_, R> {
    fn face(&mut self, sides: u32) -> u32 {
        match self {
            Draw::Random(rng) => rng.roll(sides),
            Draw::Maximum => sides,
        }
    }

    fn is_maximum(&self) -> bool {
        matches!(self, Draw::Maximum)
    }
}

/// A parsed, re-evaluable dice expression with optional result clamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Dice {
    components: Vec<Component>,
    /// The result is never less than this.
    pub min: Option<i64>,
    /// The result is never more than this.
    pub max: Option<i64>,
}

impl Dice {
    pub(crate) fn new(components: Vec<Component>) -> Self {
        Self {
            components,
            min: None,
            max: None,
        }
    }

    /// Parse an expression such as `"d20 + 3 | min 5"`.
    pub fn parse(input: &str) -> Result<Self> {
        parser::parse(input)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Roll the expression with the given random source.
    pub fn roll(&self, rng: &mut impl Rng) -> Result<Evaluation> {
        self.evaluate(&mut Draw::Random(rng))
    }

    /// Evaluate with every die showing its maximum face. Consumes no randomness.
    pub fn max_roll(&self) -> Result<Evaluation> {
        self.evaluate(&mut Draw::<dyn Rng>::Maximum)
    }

    /// The sides of the single die that yields a natural roll, or `None` if
    /// the expression's shape rules out a natural value.
    pub fn natural_die(&self) -> Option<u32> {
        let mut contributing = self.die_groups().filter(|g| g.numerator > 0);
        match (contributing.next(), contributing.next()) {
            (Some(g), None) if g.numerator == 1 && g.reroll.is_none() => Some(g.sides),
            _ => None,
        }
    }

    fn die_groups(&self) -> impl Iterator<Item = &DieGroup> {
        self.components.iter().filter_map(|c| match c {
            Component::Die(g) => Some(g),
            _ => None,
        })
    }

    fn evaluate<R: Rng + ?Sized>(&self, draw: &mut Draw<'_, R>) -> Result<Evaluation> {
        let mut stack = EvalStack::new();
        let mut natural = Natural::NotApplicable;
        let mut outcomes = Vec::new();

        for component in &self.components {
            match component {
                Component::Constant(c) => stack.push_value(c.value),
                Component::Die(group) => {
                    let outcome = roll_group(group, draw)?;
                    stack.push_value(outcome.value as f64);
                    natural = natural.combine(outcome.natural);
                    outcomes.push(outcome);
                }
                Component::Operator(op) => stack.push_op(*op)?,
                Component::GroupBegin => stack.open(),
                Component::GroupEnd => stack.close()?,
                Component::Label(_) => {}
            }
        }

        let mut total = stack.finish()?.floor() as i64;
        if let Some(min) = self.min {
            total = total.max(min);
        }
        if let Some(max) = self.max {
            total = total.min(max);
        }

        tracing::debug!(total, ?natural, maximized = draw.is_maximum(), "evaluated dice");
        Ok(Evaluation {
            total,
            natural,
            maximized: draw.is_maximum(),
            dice: outcomes,
        })
    }

    /// Describe the expression, including rolled values when `eval` is given.
    pub fn describe(&self, eval: Option<&Evaluation>) -> StructuredDescriptionSet {
        let mut set = StructuredDescriptionSet::new();
        let mut outcomes = eval.map(|e| e.dice.iter());
        let roll_tag = if eval.is_some_and(|e| e.maximized) {
            Tag::Maxroll
        } else {
            Tag::Roll
        };

        for component in &self.components {
            match component {
                Component::Constant(c) => {
                    set.push(Tag::Constant, c.value_text());
                    if let Some(label) = &c.label {
                        set.push(Tag::Label, label.as_str());
                    }
                }
                Component::Die(group) => {
                    set.push(Tag::Diespec, group.spec_text());
                    if let Some(bonus) = group.bonus_text() {
                        set.push(Tag::Diebonus, bonus);
                    }
                    if let (Some(reroll), Some(text)) = (group.reroll, group.reroll_text()) {
                        let tag = match reroll.selector {
                            Selector::Best => Tag::Best,
                            Selector::Worst => Tag::Worst,
                        };
                        set.push(tag, text);
                    }
                    if let Some(outcome) = outcomes.as_mut().and_then(|it| it.next()) {
                        for (i, attempt) in outcome.attempts.iter().enumerate() {
                            let faces = attempt
                                .faces
                                .iter()
                                .map(|f| f.to_string())
                                .collect::<Vec<_>>()
                                .join(",");
                            let tag = if i == outcome.selected {
                                roll_tag
                            } else {
                                Tag::Discarded
                            };
                            set.push(tag, faces);
                        }
                        if group.needs_subtotal() {
                            set.push(Tag::Subtotal, outcome.value.to_string());
                        }
                    }
                    if let Some(label) = &group.label {
                        set.push(Tag::Label, label.as_str());
                    }
                }
                Component::Operator(op) => set.push(Tag::Operator, op.symbol()),
                Component::GroupBegin => set.push(Tag::Begingroup, "("),
                Component::GroupEnd => set.push(Tag::Endgroup, ")"),
                Component::Label(label) => set.push(Tag::Label, label.as_str()),
            }
        }

        if let Some(min) = self.min {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Min, format!("min {}", min));
        }
        if let Some(max) = self.max {
            set.push(Tag::Moddelim, "|");
            set.push(Tag::Max, format!("max {}", max));
        }
        set
    }

    /// Describe a completed roll, led by its result.
    pub fn describe_roll(&self, eval: &Evaluation) -> StructuredDescriptionSet {
        let mut set = StructuredDescriptionSet::new();
        set.push(Tag::Result, eval.total.to_string());
        set.push(Tag::Separator, "=");
        set.extend(self.describe(Some(eval)));
        set
    }
}

fn roll_group<R: Rng + ?Sized>(group: &DieGroup, draw: &mut Draw<'_, R>) -> Result<DieOutcome> {
    if group.sides == 0 {
        return Err(Error::InvalidDie(group.sides));
    }

    let attempt_count = if draw.is_maximum() { 1 } else { group.attempts() };
    let mut attempts = Vec::with_capacity(attempt_count as usize);
    for a in 0..attempt_count {
        let faces: Vec<u32> = (0..group.numerator)
            .map(|i| {
                if a == 0 && i == 0 && group.initial_max {
                    group.sides
                } else {
                    draw.face(group.sides)
                }
            })
            .collect();
        let sum = faces
            .iter()
            .fold(0i64, |acc, &f| acc.saturating_add(group.adjust(f as i64)));
        tracing::trace!(die = %group.spec_text(), ?faces, sum, "rolled attempt");
        attempts.push(Attempt { faces, sum });
    }

    let selected = match group.reroll.map(|r| r.selector) {
        None => 0,
        Some(selector) => select(&attempts, selector),
    };

    // Only a lone die without rerolls has a natural face.
    let natural = match (group.numerator, group.reroll) {
        (0, _) => Natural::NotApplicable,
        (1, None) => Natural::Face {
            value: attempts[selected].faces[0],
            sides: group.sides,
        },
        _ => Natural::Disqualified,
    };
    let value = attempts[selected].sum;

    Ok(DieOutcome {
        attempts,
        selected,
        natural,
        value,
    })
}

/// Index of the first attempt with the best (or worst) sum.
fn select(attempts: &[Attempt], selector: Selector) -> usize {
    let mut chosen = 0;
    for (i, attempt) in attempts.iter().enumerate().skip(1) {
        let better = match selector {
            Selector::Best => attempt.sum > attempts[chosen].sum,
            Selector::Worst => attempt.sum < attempts[chosen].sum,
        };
        if better {
            chosen = i;
        }
    }
    chosen
}
