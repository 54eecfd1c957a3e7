//! The scaling-expression engine
//!
//! The definitions database describes how a raw decoded value becomes an
//! engineering value as a small arithmetic expression over one free variable
//! `x`, e.g. `x * 0.01 - 40`. The same few expressions are shared by many
//! blocks and re-evaluated for many readings, so [ScalingEngine] caches
//! parses per distinct source string and memoizes evaluations per
//! `(expression, input)` pair. Caches are owned by the engine instance;
//! nothing is process-global.
mod eval;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::rc::Rc;

use ordered_float::OrderedFloat;

pub use parser::Expr;

/// A raw numeric reading, the engine's input domain
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

/// A value produced while evaluating a scaling expression
///
/// Byte strings only arise from `0x`/`0b` literals; a full expression
/// normally reduces to a real number.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl Value {
    /// The real-number view of this value, if it has one
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bytes(_) => None,
        }
    }
}

impl From<Num> for Value {
    fn from(num: Num) -> Value {
        match num {
            Num::Int(v) => Value::Int(v),
            Num::Float(v) => Value::Float(v),
        }
    }
}

/// Hashable form of [Num] for the evaluation memo
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum MemoNum {
    Int(i64),
    Float(OrderedFloat<f64>),
}

impl From<Num> for MemoNum {
    fn from(num: Num) -> MemoNum {
        match num {
            Num::Int(v) => MemoNum::Int(v),
            Num::Float(v) => MemoNum::Float(OrderedFloat(v)),
        }
    }
}

/// Parses and evaluates scaling expressions, with caching
#[derive(Default)]
pub struct ScalingEngine {
    parsed: HashMap<String, Rc<Expr>>,
    memo: HashMap<(usize, MemoNum), Value>,
}

impl ScalingEngine {
    pub fn new() -> ScalingEngine {
        ScalingEngine::default()
    }

    /// Parse an expression, reusing the cached AST for a repeated source
    pub fn parse(&mut self, expression: &str) -> eyre::Result<Rc<Expr>> {
        if let Some(ast) = self.parsed.get(expression) {
            return Ok(Rc::clone(ast));
        }
        let ast = Rc::new(parser::parse(expression)?);
        self.parsed
            .insert(expression.to_string(), Rc::clone(&ast));
        Ok(ast)
    }

    /// Evaluate `expression` with the free variable bound to `x`
    ///
    /// All DSL failures (malformed expression, operand-kind mismatch, unknown
    /// function, division by zero) are recoverable errors: the caller decides
    /// whether to skip or abort the affected reading.
    pub fn evaluate(&mut self, expression: &str, x: Num) -> eyre::Result<Value> {
        let ast = self.parse(expression)?;
        // The Rc pointer is stable for as long as the parse cache holds it
        let key = (Rc::as_ptr(&ast) as usize, MemoNum::from(x));
        if let Some(value) = self.memo.get(&key) {
            return Ok(value.clone());
        }
        let value = eval::eval(&ast, x)?;
        self.memo.insert(key, value.clone());
        Ok(value)
    }
}
