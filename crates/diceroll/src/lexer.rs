// ABOUTME: Tokenizer and operand grammar matcher for die-roll expressions.
// ABOUTME: Splits "d20+3 fire" into operators and operands, then classifies each operand.

use crate::ast::{Constant, DieGroup, Op, Reroll, Selector};
use crate::error::{Error, Result};

/// Characters that may never appear in a label.
const ILLEGAL_LABEL_CHARS: &[char] = &['<', '>', '=', '|', '{', '}', '%', '≤', '≥', '÷'];

/// Most dice one group may roll, counting every best/worst-of attempt.
pub const MAX_FACES: u32 = 10_000;

/// A token in a die-roll expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An operator, always read in its binary sense. The parser decides
    /// whether a leading `+`/`-` is unary.
    Op(Op),
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// Raw text between operators, trimmed.
    Operand(String),
}

/// A classified operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Die(DieGroup),
    Constant(Constant),
    Label(String),
}

/// Rewrite multi-character and Unicode operator spellings into single glyphs.
///
/// `//` becomes `÷`, `>=` becomes `≥`, `<=` becomes `≤` and `×` becomes `*`,
/// so the lexer only ever sees one character per operator.
pub fn normalize(input: &str) -> String {
    input
        .replace("//", "÷")
        .replace(">=", "≥")
        .replace("<=", "≤")
        .replace('×', "*")
}

/// A lexer for normalized die-roll expressions.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for already-normalized input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    /// Get the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();

        let &(pos, ch) = self.chars.peek()?;

        let op = match ch {
            '+' => Some(Token::Op(Op::Add)),
            '-' => Some(Token::Op(Op::Sub)),
            '*' => Some(Token::Op(Op::Mul)),
            '÷' => Some(Token::Op(Op::FloorDiv)),
            '≤' => Some(Token::Op(Op::AtMost)),
            '≥' => Some(Token::Op(Op::AtLeast)),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };

        match op {
            Some(token) => {
                self.chars.next();
                Some(token)
            }
            None => Some(self.operand(pos)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    /// Consume operand text up to the next operator. A `+N per die` or
    /// `-N per die` suffix stays part of the operand.
    fn operand(&mut self, start: usize) -> Token {
        let mut end = self.input.len();

        while let Some(&(pos, ch)) = self.chars.peek() {
            match ch {
                '+' | '-' => {
                    let Some(len) = per_die_len(&self.input[pos..]) else {
                        end = pos;
                        break;
                    };
                    while let Some(&(p, _)) = self.chars.peek() {
                        if p >= pos + len {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '*' | '÷' | '≤' | '≥' | '(' | ')' => {
                    end = pos;
                    break;
                }
                _ => {
                    self.chars.next();
                }
            }
        }

        Token::Operand(self.input[start..end].trim().to_string())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Tokenize an expression, normalizing operator spellings first.
pub fn tokenize(input: &str) -> Vec<Token> {
    let normalized = normalize(input);
    Lexer::new(&normalized).collect()
}

/// Byte length of a leading `+N per die` / `-N per die`, if present.
fn per_die_len(s: &str) -> Option<usize> {
    let mut scan = Scanner::new(s);
    if !(scan.eat('+') || scan.eat('-')) {
        return None;
    }
    scan.skip_ws();
    scan.digits()?;
    scan.skip_ws();
    if !scan.eat_word("per") {
        return None;
    }
    scan.skip_ws();
    if !scan.eat_word("die") {
        return None;
    }
    Some(scan.pos)
}

/// Classify operand text as a die group, a constant, or a bare label.
pub fn classify(text: &str) -> Result<Operand> {
    if let Some(die) = match_die(text)? {
        return Ok(Operand::Die(die));
    }
    if let Some(constant) = match_constant(text)? {
        return Ok(Operand::Constant(constant));
    }
    validate_label(text)?;
    Ok(Operand::Label(text.to_string()))
}

/// Match `[>] [N] [/D] d (S|%) [±B per die] [(best|worst) of K] [label]`.
///
/// Returns `Ok(None)` when the text does not have die-group shape at all.
fn match_die(text: &str) -> Result<Option<DieGroup>> {
    let mut scan = Scanner::new(text);
    scan.skip_ws();
    let initial_max = scan.eat('>');
    scan.skip_ws();
    let numerator = scan.digits();
    scan.skip_ws();

    let mut denominator = None;
    if scan.eat('/') {
        scan.skip_ws();
        match scan.digits() {
            Some(d) => denominator = Some(d),
            None => return Ok(None),
        }
        scan.skip_ws();
    }

    if !(scan.eat('d') || scan.eat('D')) {
        return Ok(None);
    }
    scan.skip_ws();

    let (sides, percentile) = if scan.eat('%') {
        (100, true)
    } else {
        match scan.digits() {
            Some(s) => (s, false),
            None => return Ok(None),
        }
    };

    let numerator = to_u32(numerator.unwrap_or(1))?;
    let sides = to_u32(sides)?;
    if sides == 0 {
        return Err(Error::InvalidDie(0));
    }
    let denominator = match denominator {
        Some(0) => return Err(Error::syntax("fractional die denominator must be positive")),
        Some(d) => Some(to_u32(d)?),
        None => None,
    };

    let mut die = DieGroup::new(numerator, sides);
    die.initial_max = initial_max;
    die.denominator = denominator;
    die.percentile = percentile;

    scan.skip_ws();
    if scan.peek() == Some('+') || scan.peek() == Some('-') {
        let negative = scan.eat('-');
        if !negative {
            scan.eat('+');
        }
        scan.skip_ws();
        let amount = scan
            .digits()
            .ok_or_else(|| Error::syntax(format!("expected per-die bonus in '{}'", text)))?;
        scan.skip_ws();
        let per = scan.eat_word("per");
        scan.skip_ws();
        if !(per && scan.eat_word("die")) {
            return Err(Error::syntax(format!("expected 'per die' after bonus in '{}'", text)));
        }
        let amount = i64::try_from(amount)
            .map_err(|_| Error::syntax(format!("per-die bonus {} is too large", amount)))?;
        die.bonus = if negative { -amount } else { amount };
    }

    scan.skip_ws();
    let selector = if scan.eat_word("best") {
        Some(Selector::Best)
    } else if scan.eat_word("worst") {
        Some(Selector::Worst)
    } else {
        None
    };
    if let Some(selector) = selector {
        scan.skip_ws();
        if !scan.eat_word("of") {
            return Err(Error::syntax(format!("expected 'of' after '{}'", selector)));
        }
        scan.skip_ws();
        let n = scan
            .digits()
            .ok_or_else(|| Error::syntax(format!("expected attempt count after '{} of'", selector)))?;
        if n == 0 {
            return Err(Error::syntax(format!("'{} of 0' rolls nothing", selector)));
        }
        die.reroll = Some(Reroll {
            selector,
            count: to_u32(n)? - 1,
        });
    }

    if u64::from(die.numerator) * u64::from(die.attempts()) > u64::from(MAX_FACES) {
        return Err(Error::syntax(format!(
            "'{}' rolls more than {} dice",
            text.trim(),
            MAX_FACES
        )));
    }

    die.label = trailing_label(scan.rest())?;
    Ok(Some(die))
}

/// Match a numeric constant with an optional trailing label.
fn match_constant(text: &str) -> Result<Option<Constant>> {
    let mut scan = Scanner::new(text);
    scan.skip_ws();
    let start = scan.pos;
    if scan.digits().is_none() {
        return Ok(None);
    }
    if scan.peek() == Some('.') {
        scan.eat('.');
        if scan.digits().is_none() {
            return Err(Error::syntax(format!("malformed number in '{}'", text)));
        }
    }
    let value: f64 = text[start..scan.pos]
        .parse()
        .map_err(|_| Error::syntax(format!("malformed number in '{}'", text)))?;

    Ok(Some(Constant {
        value,
        label: trailing_label(scan.rest())?,
    }))
}

fn trailing_label(rest: &str) -> Result<Option<String>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(None);
    }
    validate_label(rest)?;
    Ok(Some(rest.to_string()))
}

/// Reject labels that hide a missing operator or a misplaced global modifier.
pub(crate) fn validate_label(label: &str) -> Result<()> {
    if let Some(ch) = label.chars().find(|c| ILLEGAL_LABEL_CHARS.contains(c)) {
        return Err(Error::syntax(format!("illegal character '{}' in label '{}'", ch, label)));
    }
    if label.starts_with('+') || label.starts_with('-') {
        return Err(Error::syntax(format!("per-die bonus only applies to dice: '{}'", label)));
    }
    if looks_like_die(label) {
        return Err(Error::syntax(format!("missing operator before '{}'", label)));
    }
    if looks_like_global_modifier(label) {
        return Err(Error::syntax(format!(
            "'{}' is a global modifier and must follow the final '|'",
            label
        )));
    }
    Ok(())
}

fn looks_like_die(label: &str) -> bool {
    !matches!(match_die(label), Ok(None))
}

fn looks_like_global_modifier(label: &str) -> bool {
    let mut scan = Scanner::new(label);
    if !(scan.eat_word("min") || scan.eat_word("max")) {
        return false;
    }
    scan.skip_ws();
    scan.eat('-');
    scan.digits().is_some()
}

fn to_u32(n: u64) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::syntax(format!("number {} is too large", n)))
}

/// A byte-position cursor over operand text.
pub(crate) struct Scanner<'a> {
    s: &'a str,
    pub(crate) pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.s[self.pos..].chars().next()
    }

    pub(crate) fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    pub(crate) fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    /// Consume a run of ASCII digits.
    pub(crate) fn digits(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some('0'..='9')) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        let mut value: u64 = 0;
        for b in self.s[start..self.pos].bytes() {
            value = value.saturating_mul(10).saturating_add((b - b'0') as u64);
        }
        Some(value)
    }

    /// Consume an optionally signed integer.
    pub(crate) fn signed(&mut self) -> Option<i64> {
        let negative = self.eat('-');
        if !negative {
            self.eat('+');
        }
        self.skip_ws();
        let value = i64::try_from(self.digits()?).ok()?;
        Some(if negative { -value } else { value })
    }

    /// Whether only whitespace remains.
    pub(crate) fn at_end(&self) -> bool {
        self.rest().trim().is_empty()
    }

    /// Consume a case-insensitive keyword that is not followed by a letter.
    pub(crate) fn eat_word(&mut self, word: &str) -> bool {
        let rest = self.rest();
        if rest.len() < word.len() || !rest.is_char_boundary(word.len()) {
            return false;
        }
        if !rest[..word.len()].eq_ignore_ascii_case(word) {
            return false;
        }
        if rest[word.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic())
        {
            return false;
        }
        self.pos += word.len();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operand(s: &str) -> Token {
        Token::Operand(s.to_string())
    }

    #[test]
    fn test_basic_expression() {
        assert_eq!(
            tokenize("d20 + 3"),
            vec![operand("d20"), Token::Op(Op::Add), operand("3")]
        );
    }

    #[test]
    fn test_normalized_operators() {
        assert_eq!(
            tokenize("10 // 3 >= 2 <= 9 × 2"),
            vec![
                operand("10"),
                Token::Op(Op::FloorDiv),
                operand("3"),
                Token::Op(Op::AtLeast),
                operand("2"),
                Token::Op(Op::AtMost),
                operand("9"),
                Token::Op(Op::Mul),
                operand("2"),
            ]
        );
        assert_eq!(tokenize("10 ÷ 3"), tokenize("10 // 3"));
        assert_eq!(tokenize("1 ≥ 2"), tokenize("1 >= 2"));
    }

    #[test]
    fn test_groups_and_labels() {
        assert_eq!(
            tokenize("(d6 + 2) fire"),
            vec![
                Token::LParen,
                operand("d6"),
                Token::Op(Op::Add),
                operand("2"),
                Token::RParen,
                operand("fire"),
            ]
        );
    }

    #[test]
    fn test_per_die_bonus_stays_in_operand() {
        assert_eq!(
            tokenize("3d6 +1 per die + 2"),
            vec![operand("3d6 +1 per die"), Token::Op(Op::Add), operand("2")]
        );
    }

    #[test]
    fn test_classify_die() {
        let Operand::Die(die) = classify(">1/2d20 -1 per die best of 3 fire damage").unwrap() else {
            panic!("Expected a die group");
        };
        assert!(die.initial_max);
        assert_eq!(die.numerator, 1);
        assert_eq!(die.denominator, Some(2));
        assert_eq!(die.sides, 20);
        assert_eq!(die.bonus, -1);
        assert_eq!(
            die.reroll,
            Some(Reroll {
                selector: Selector::Best,
                count: 2
            })
        );
        assert_eq!(die.label.as_deref(), Some("fire damage"));
    }

    #[test]
    fn test_classify_percentile_die() {
        let Operand::Die(die) = classify("2d%").unwrap() else {
            panic!("Expected a die group");
        };
        assert_eq!(die.numerator, 2);
        assert_eq!(die.sides, 100);
        assert!(die.percentile);
    }

    #[test]
    fn test_classify_constant_and_label() {
        assert_eq!(
            classify("1.5 strength").unwrap(),
            Operand::Constant(Constant {
                value: 1.5,
                label: Some("strength".to_string())
            })
        );
        assert_eq!(classify("dmg").unwrap(), Operand::Label("dmg".to_string()));
    }

    #[test]
    fn test_zero_sides_is_invalid() {
        assert!(matches!(classify("2d0"), Err(Error::InvalidDie(0))));
    }

    #[test]
    fn test_label_hiding_die_is_rejected() {
        assert!(matches!(classify("d20 d6"), Err(Error::Syntax(_))));
        assert!(matches!(classify("3 2d8 fire"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_global_modifier_in_label_is_rejected() {
        assert!(matches!(classify("d20 max 5"), Err(Error::Syntax(_))));
        assert!(matches!(classify("3 min 1"), Err(Error::Syntax(_))));
        assert!(classify("d20 maximum effort").is_ok());
    }

    #[test]
    fn test_oversized_bonus_is_rejected() {
        assert!(matches!(
            classify("d6 +18446744073709551615 per die"),
            Err(Error::Syntax(_))
        ));
        let Operand::Die(die) = classify("d6 +9223372036854775807 per die").unwrap() else {
            panic!("Expected a die group");
        };
        assert_eq!(die.adjust(3), i64::MAX);
    }

    #[test]
    fn test_dice_count_limit() {
        assert!(matches!(classify("4000000000d6"), Err(Error::Syntax(_))));
        assert!(matches!(classify("d6 best of 4000000000"), Err(Error::Syntax(_))));
        assert!(matches!(classify("5000d6 best of 3"), Err(Error::Syntax(_))));
        assert!(classify("10000d6").is_ok());
        assert!(classify("100d6 best of 100").is_ok());
    }

    #[test]
    fn test_best_of_zero_is_rejected() {
        assert!(matches!(classify("d20 best of 0"), Err(Error::Syntax(_))));
        assert!(matches!(classify("d20 worst 2"), Err(Error::Syntax(_))));
    }
}
