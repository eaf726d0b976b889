// ABOUTME: Dual-stack operator-precedence evaluator for expression components.
// ABOUTME: Keeps operands in floating point and floors after every operator application.

use crate::ast::Op;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    Op(Op),
    Open,
}

/// Operand and operator stacks for one evaluation pass.
#[derive(Debug, Default)]
pub(crate) struct EvalStack {
    values: Vec<f64>,
    ops: Vec<Pending>,
}

impl EvalStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_value(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Push an operator, first applying every pending operator that binds at
    /// least as tightly. Prefix operators never reduce what precedes them.
    pub(crate) fn push_op(&mut self, op: Op) -> Result<()> {
        if !op.is_unary() {
            while let Some(&Pending::Op(top)) = self.ops.last() {
                if top.precedence() < op.precedence() {
                    break;
                }
                self.ops.pop();
                self.apply(top)?;
            }
        }
        self.ops.push(Pending::Op(op));
        Ok(())
    }

    pub(crate) fn open(&mut self) {
        self.ops.push(Pending::Open);
    }

    /// Apply operators back to the matching open group and discard it.
    pub(crate) fn close(&mut self) -> Result<()> {
        loop {
            match self.ops.pop() {
                Some(Pending::Op(op)) => self.apply(op)?,
                Some(Pending::Open) => return Ok(()),
                None => return Err(Error::UnbalancedGroup),
            }
        }
    }

    /// Apply everything left and return the single remaining value.
    pub(crate) fn finish(mut self) -> Result<f64> {
        while let Some(pending) = self.ops.pop() {
            match pending {
                Pending::Op(op) => self.apply(op)?,
                Pending::Open => return Err(Error::UnbalancedGroup),
            }
        }
        match self.values.as_slice() {
            [value] => Ok(*value),
            values => Err(Error::StackIntegrity(values.len())),
        }
    }

    fn apply(&mut self, op: Op) -> Result<()> {
        let result = match op {
            Op::Negate => -self.pop()?,
            Op::Add => {
                let (left, right) = self.pop_pair()?;
                left + right
            }
            Op::Sub => {
                let (left, right) = self.pop_pair()?;
                left - right
            }
            Op::Mul => {
                let (left, right) = self.pop_pair()?;
                left * right
            }
            Op::FloorDiv => {
                let (left, right) = self.pop_pair()?;
                if right == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                left / right
            }
            Op::AtMost => {
                let (left, right) = self.pop_pair()?;
                left.min(right)
            }
            Op::AtLeast => {
                let (left, right) = self.pop_pair()?;
                left.max(right)
            }
        };
        self.values.push(result.floor());
        Ok(())
    }

    fn pop(&mut self) -> Result<f64> {
        self.values.pop().ok_or(Error::StackIntegrity(0))
    }

    fn pop_pair(&mut self) -> Result<(f64, f64)> {
        match (self.values.pop(), self.values.pop()) {
            (Some(right), Some(left)) => Ok((left, right)),
            _ => Err(Error::StackIntegrity(self.values.len())),
        }
    }
}
