// ABOUTME: Parser that turns a die-roll expression into a flat component sequence.
// ABOUTME: Enforces operator/operand alternation, grouping balance, and trailing min/max clauses.

use crate::ast::{Component, Op};
use crate::dice::Dice;
use crate::error::{Error, Result};
use crate::lexer::{self, Lexer, Operand, Scanner, Token};

/// What the parser will accept next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    Operator,
}

/// Parser for a single expression (no `|` clauses).
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    components: Vec<Component>,
    expect: Expect,
    /// At the start of the expression or just after `(`, where a unary sign is legal.
    at_start: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over already-normalized input.
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            components: Vec::new(),
            expect: Expect::Value,
            at_start: true,
            depth: 0,
        }
    }

    /// Parse the input into a component sequence.
    pub fn parse(mut self) -> Result<Vec<Component>> {
        while let Some(token) = self.lexer.next_token() {
            match token {
                Token::LParen => self.open()?,
                Token::RParen => self.close()?,
                Token::Op(op) => self.operator(op)?,
                Token::Operand(text) => self.operand(&text)?,
            }
        }

        if self.components.is_empty() {
            return Err(Error::syntax("empty expression"));
        }
        if self.expect == Expect::Value {
            return Err(Error::syntax("expression ends where a value was expected"));
        }
        if self.depth != 0 {
            return Err(Error::UnbalancedGroup);
        }
        Ok(self.components)
    }

    fn open(&mut self) -> Result<()> {
        if self.expect != Expect::Value {
            return Err(Error::syntax("missing operator before '('"));
        }
        self.components.push(Component::GroupBegin);
        self.depth += 1;
        self.at_start = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::UnbalancedGroup);
        }
        if self.expect != Expect::Operator {
            return Err(Error::syntax("expected a value before ')'"));
        }
        self.components.push(Component::GroupEnd);
        self.depth -= 1;
        Ok(())
    }

    fn operator(&mut self, op: Op) -> Result<()> {
        if self.expect == Expect::Operator {
            self.components.push(Component::Operator(op));
            self.expect = Expect::Value;
            self.at_start = false;
            return Ok(());
        }

        match op {
            Op::Add if self.at_start => {}
            Op::Sub if self.at_start => self.components.push(Component::Operator(Op::Negate)),
            _ => {
                return Err(Error::syntax(format!(
                    "expected a value but found operator '{}'",
                    op
                )))
            }
        }
        self.at_start = false;
        Ok(())
    }

    fn operand(&mut self, text: &str) -> Result<()> {
        let operand = lexer::classify(text)?;
        match (self.expect, operand) {
            (Expect::Value, Operand::Die(die)) => self.components.push(Component::Die(die)),
            (Expect::Value, Operand::Constant(c)) => self.components.push(Component::Constant(c)),
            (Expect::Value, Operand::Label(label)) => {
                return Err(Error::syntax(format!(
                    "expected a value but found '{}'",
                    label
                )))
            }
            (Expect::Operator, Operand::Label(label)) => {
                self.components.push(Component::Label(label));
                return Ok(());
            }
            (Expect::Operator, _) => {
                return Err(Error::syntax(format!("missing operator before '{}'", text)))
            }
        }
        self.expect = Expect::Operator;
        self.at_start = false;
        Ok(())
    }
}

/// Parse an expression with optional trailing `|min N` and `|max N` clauses.
pub fn parse(input: &str) -> Result<Dice> {
    let normalized = lexer::normalize(input);
    let mut parts = normalized.split('|');
    let expression = parts.next().unwrap_or_default();

    let components = Parser::new(expression).parse()?;
    let mut dice = Dice::new(components);

    for clause in parts {
        let clause = clause.trim();
        let mut scan = Scanner::new(clause);
        let is_min = if scan.eat_word("min") {
            true
        } else if scan.eat_word("max") {
            false
        } else {
            return Err(Error::UnknownModifier(clause.to_string()));
        };
        scan.skip_ws();
        let value = scan
            .signed()
            .filter(|_| scan.at_end())
            .ok_or_else(|| Error::UnknownModifier(clause.to_string()))?;
        if is_min {
            dice.min = Some(value);
        } else {
            dice.max = Some(value);
        }
    }

    tracing::debug!(expression = input, components = dice.components().len(), "parsed dice");
    Ok(dice)
}
