// ABOUTME: Component model for parsed die-roll expressions.
// ABOUTME: A flat sequence of constants, die groups, operators, labels and group markers.

use std::fmt;

/// One element of a parsed expression, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// A numeric constant such as `3` or `1.5 strength`.
    Constant(Constant),
    /// A group of dice such as `3d6` or `>1/2d20 best of 2 fire`.
    Die(DieGroup),
    /// An arithmetic or clamping operator.
    Operator(Op),
    /// Opening parenthesis.
    GroupBegin,
    /// Closing parenthesis.
    GroupEnd,
    /// Descriptive text with no numeric contribution.
    Label(String),
}

/// A numeric constant with an optional trailing label.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: f64,
    pub label: Option<String>,
}

impl Constant {
    /// The constant as source text (integers without a fractional part).
    pub fn value_text(&self) -> String {
        format_number(self.value)
    }
}

/// Which attempt wins when a die group is rolled more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Best,
    Worst,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Best => write!(f, "best"),
            Selector::Worst => write!(f, "worst"),
        }
    }
}

/// Repeated attempts at a die group, keeping the best or worst sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reroll {
    pub selector: Selector,
    /// Extra attempts beyond the first (`best of 3` has two).
    pub count: u32,
}

/// A group of identical dice.
#[derive(Debug, Clone, PartialEq)]
pub struct DieGroup {
    /// Number of dice rolled per attempt.
    pub numerator: u32,
    /// Divisor applied to each face, for fractional dice like `1/2d20`.
    pub denominator: Option<u32>,
    pub sides: u32,
    /// Written as `d%` rather than `d100`.
    pub percentile: bool,
    /// Flat bonus added to every face (`+1 per die`).
    pub bonus: i64,
    pub reroll: Option<Reroll>,
    /// The first die of the first attempt shows its maximum face.
    pub initial_max: bool,
    pub label: Option<String>,
}

impl DieGroup {
    /// A plain `NdS` group.
    pub fn new(numerator: u32, sides: u32) -> Self {
        Self {
            numerator,
            denominator: None,
            sides,
            percentile: false,
            bonus: 0,
            reroll: None,
            initial_max: false,
            label: None,
        }
    }

    /// Number of attempts rolled (one plus any rerolls).
    pub fn attempts(&self) -> u32 {
        1 + self.reroll.map_or(0, |r| r.count)
    }

    /// Adjust a raw face by the per-die bonus and denominator.
    pub fn adjust(&self, face: i64) -> i64 {
        let value = face.saturating_add(self.bonus);
        match self.denominator {
            Some(denom) if denom > 0 => (value.div_euclid(denom as i64)).max(1),
            _ => value,
        }
    }

    /// Whether the rendered description needs a subtotal to be understood.
    pub(crate) fn needs_subtotal(&self) -> bool {
        self.numerator > 1 || self.bonus != 0 || self.denominator.is_some() || self.reroll.is_some()
    }

    /// The die specification as source text, e.g. `>1/2d20`.
    pub fn spec_text(&self) -> String {
        let mut s = String::new();
        if self.initial_max {
            s.push('>');
        }
        s.push_str(&self.numerator.to_string());
        if let Some(denom) = self.denominator {
            s.push_str(&format!("/{}", denom));
        }
        s.push('d');
        if self.percentile {
            s.push('%');
        } else {
            s.push_str(&self.sides.to_string());
        }
        s
    }

    /// The per-die bonus as source text, if any.
    pub fn bonus_text(&self) -> Option<String> {
        (self.bonus != 0).then(|| format!("{:+} per die", self.bonus))
    }

    /// The reroll selection as source text, if any.
    pub fn reroll_text(&self) -> Option<String> {
        self.reroll
            .map(|r| format!("{} of {}", r.selector, r.count + 1))
    }
}

/// An operator in the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    FloorDiv,
    /// `a ≤ b`: the lesser of the two operands.
    AtMost,
    /// `a ≥ b`: the greater of the two operands.
    AtLeast,
    Negate,
}

impl Op {
    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Op::Negate => 4,
            Op::AtMost | Op::AtLeast => 3,
            Op::Mul | Op::FloorDiv => 2,
            Op::Add | Op::Sub => 1,
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Op::Negate)
    }

    /// ASCII source text for the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub | Op::Negate => "-",
            Op::Mul => "*",
            Op::FloorDiv => "//",
            Op::AtMost => "<=",
            Op::AtLeast => ">=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Render a number the way it would be typed: `3`, `-2`, `1.5`.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
