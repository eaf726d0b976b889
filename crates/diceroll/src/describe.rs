// ABOUTME: Structured, presentation-free descriptions of how a roll was derived.
// ABOUTME: Ordered tag/value fragments that renderers style however they like.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a description fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Result,
    Separator,
    Diespec,
    Roll,
    Maxroll,
    Discarded,
    Best,
    Worst,
    Operator,
    Constant,
    Diebonus,
    Label,
    Bonus,
    Moddelim,
    Min,
    Max,
    Critspec,
    Critlabel,
    Dc,
    Met,
    Exceeded,
    Short,
    Repeat,
    Until,
    Iteration,
    Sf,
    Success,
    Fail,
    Fullmax,
    Subtotal,
    Begingroup,
    Endgroup,
    Notice,
    Error,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Result => "result",
            Tag::Separator => "separator",
            Tag::Diespec => "diespec",
            Tag::Roll => "roll",
            Tag::Maxroll => "maxroll",
            Tag::Discarded => "discarded",
            Tag::Best => "best",
            Tag::Worst => "worst",
            Tag::Operator => "operator",
            Tag::Constant => "constant",
            Tag::Diebonus => "diebonus",
            Tag::Label => "label",
            Tag::Bonus => "bonus",
            Tag::Moddelim => "moddelim",
            Tag::Min => "min",
            Tag::Max => "max",
            Tag::Critspec => "critspec",
            Tag::Critlabel => "critlabel",
            Tag::Dc => "dc",
            Tag::Met => "met",
            Tag::Exceeded => "exceeded",
            Tag::Short => "short",
            Tag::Repeat => "repeat",
            Tag::Until => "until",
            Tag::Iteration => "iteration",
            Tag::Sf => "sf",
            Tag::Success => "success",
            Tag::Fail => "fail",
            Tag::Fullmax => "fullmax",
            Tag::Subtotal => "subtotal",
            Tag::Begingroup => "begingroup",
            Tag::Endgroup => "endgroup",
            Tag::Notice => "notice",
            Tag::Error => "error",
        }
    }

    /// Fragments that are part of the request itself rather than its outcome.
    /// Their values, joined with spaces, re-parse to the same request.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Tag::Diespec
                | Tag::Best
                | Tag::Worst
                | Tag::Operator
                | Tag::Constant
                | Tag::Diebonus
                | Tag::Label
                | Tag::Moddelim
                | Tag::Min
                | Tag::Max
                | Tag::Critspec
                | Tag::Dc
                | Tag::Repeat
                | Tag::Until
                | Tag::Sf
                | Tag::Fullmax
                | Tag::Begingroup
                | Tag::Endgroup
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tagged fragment of a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDescription {
    #[serde(rename = "Type")]
    pub tag: Tag,
    #[serde(rename = "Value")]
    pub value: String,
}

impl StructuredDescription {
    pub fn new(tag: Tag, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}

/// An ordered sequence of description fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredDescriptionSet(pub Vec<StructuredDescription>);

impl StructuredDescriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: Tag, value: impl Into<String>) {
        self.0.push(StructuredDescription::new(tag, value));
    }

    pub fn extend(&mut self, other: StructuredDescriptionSet) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructuredDescription> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First fragment with the given tag.
    pub fn find(&self, tag: Tag) -> Option<&StructuredDescription> {
        self.0.iter().find(|d| d.tag == tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    /// The request as source text, built from the source fragments only.
    pub fn text(&self) -> String {
        self.0
            .iter()
            .filter(|d| d.tag.is_source())
            .map(|d| d.value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<'a> IntoIterator for &'a StructuredDescriptionSet {
    type Item = &'a StructuredDescription;
    type IntoIter = std::slice::Iter<'a, StructuredDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Plain-text rendering, e.g. `17 = 1d20 [14] + 3 | dc 16 (exceeded by 1)`.
impl fmt::Display for StructuredDescriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for d in &self.0 {
            let piece = match d.tag {
                Tag::Roll => format!("[{}]", d.value),
                Tag::Maxroll => format!("[={}]", d.value),
                Tag::Discarded => format!("([{}])", d.value),
                Tag::Subtotal => format!("(={})", d.value),
                Tag::Iteration => format!("#{}", d.value),
                Tag::Met => "(met)".to_string(),
                Tag::Exceeded => format!("(exceeded by {})", d.value),
                Tag::Short => format!("(short by {})", d.value),
                Tag::Success | Tag::Fail => format!("** {} **", d.value),
                Tag::Notice | Tag::Error => format!("({})", d.value),
                _ => d.value.clone(),
            };
            if piece.is_empty() {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", piece)?;
            first = false;
        }
        Ok(())
    }
}

/// The outcome of one elementary roll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StructuredResult {
    /// The outcome is deliberately withheld (secret roll receipt).
    pub suppressed: bool,
    /// The request could not be carried out.
    #[serde(rename = "InvalidRequest")]
    pub invalid: bool,
    pub total: i64,
    pub details: StructuredDescriptionSet,
}

impl StructuredResult {
    pub fn new(total: i64, details: StructuredDescriptionSet) -> Self {
        Self {
            suppressed: false,
            invalid: false,
            total,
            details,
        }
    }

    /// A result that only acknowledges a request, revealing nothing rolled.
    pub fn suppressed(details: StructuredDescriptionSet) -> Self {
        Self {
            suppressed: true,
            invalid: false,
            total: 0,
            details,
        }
    }

    /// A reply for a request that failed, carrying the error text.
    pub fn invalid_request(err: &crate::Error) -> Self {
        let mut details = StructuredDescriptionSet::new();
        details.push(Tag::Error, err.to_string());
        Self {
            suppressed: false,
            invalid: true,
            total: 0,
            details,
        }
    }
}

impl fmt::Display for StructuredResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StructuredDescriptionSet {
        let mut set = StructuredDescriptionSet::new();
        set.push(Tag::Result, "17");
        set.push(Tag::Separator, "=");
        set.push(Tag::Diespec, "1d20");
        set.push(Tag::Roll, "14");
        set.push(Tag::Operator, "+");
        set.push(Tag::Constant, "3");
        set.push(Tag::Moddelim, "|");
        set.push(Tag::Dc, "dc 16");
        set.push(Tag::Exceeded, "1");
        set
    }

    #[test]
    fn test_text_keeps_only_source() {
        assert_eq!(sample().text(), "1d20 + 3 | dc 16");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            sample().to_string(),
            "17 = 1d20 [14] + 3 | dc 16 (exceeded by 1)"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let result = StructuredResult::new(17, sample());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["Total"], 17);
        assert_eq!(json["InvalidRequest"], false);
        assert_eq!(json["Details"][0]["Type"], "result");
        assert_eq!(json["Details"][0]["Value"], "17");

        let back: StructuredResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_invalid_request() {
        let result = StructuredResult::invalid_request(&crate::Error::DivisionByZero);
        assert!(result.invalid);
        assert_eq!(result.details.find(Tag::Error).unwrap().value, "Division by zero");
    }
}
