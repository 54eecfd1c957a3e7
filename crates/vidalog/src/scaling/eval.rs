//! Evaluation of parsed scaling expressions
//!
//! Values are tagged (`Int | Float | Bytes`) and every operator checks its
//! operand kinds explicitly: the numeric operators require real operands,
//! bitwise AND also accepts byte strings (read as big-endian unsigned
//! integers), and `ln` requires a strictly positive real argument. Kind
//! mismatches are evaluation errors, not coercions.
use eyre::bail;

use crate::scaling::parser::Expr;
use crate::scaling::{Num, Value};

pub(crate) fn eval(expr: &Expr, x: Num) -> eyre::Result<Value> {
    match expr {
        Expr::Int(value) => Ok(Value::Int(*value)),
        Expr::Float(value) => Ok(Value::Float(*value)),
        Expr::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
        Expr::Var => Ok(x.into()),
        Expr::Neg(operand) => match eval(operand, x)? {
            Value::Int(v) => Ok(Value::Int(-v)),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Bytes(_) => bail!("Cannot negate a byte string"),
        },
        Expr::Add(lhs, rhs) => arith(
            eval(lhs, x)?,
            eval(rhs, x)?,
            "add",
            |a, b| a + b,
            i64::checked_add,
        ),
        Expr::Sub(lhs, rhs) => arith(
            eval(lhs, x)?,
            eval(rhs, x)?,
            "subtract",
            |a, b| a - b,
            i64::checked_sub,
        ),
        Expr::Mul(lhs, rhs) => arith(
            eval(lhs, x)?,
            eval(rhs, x)?,
            "multiply",
            |a, b| a * b,
            i64::checked_mul,
        ),
        Expr::Div(lhs, rhs) => {
            let numerator = real_operand(eval(lhs, x)?, "divide")?;
            let denominator = real_operand(eval(rhs, x)?, "divide")?;
            if denominator == 0.0 {
                bail!("Division by zero in scaling expression");
            }
            Ok(Value::Float(numerator / denominator))
        }
        Expr::BitAnd(lhs, rhs) => {
            let lhs = int_operand(eval(lhs, x)?)?;
            let rhs = int_operand(eval(rhs, x)?)?;
            Ok(Value::Int(lhs & rhs))
        }
        Expr::Call(name, arg) => match name.as_str() {
            "ln" => {
                let v = real_operand(eval(arg, x)?, "ln")?;
                if v <= 0.0 {
                    bail!("ln of a non-positive value: {v}");
                }
                Ok(Value::Float(v.ln()))
            }
            _ => bail!("Unknown function: {name}"),
        },
    }
}

/// Apply a numeric operator, staying integral when both operands are
fn arith(
    lhs: Value,
    rhs: Value,
    op: &str,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> Option<i64>,
) -> eyre::Result<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => match int_op(*a, *b) {
            Some(v) => Ok(Value::Int(v)),
            None => bail!("Integer overflow trying to {op} {a} and {b}"),
        },
        _ => {
            let a = real_operand(lhs, op)?;
            let b = real_operand(rhs, op)?;
            Ok(Value::Float(float_op(a, b)))
        }
    }
}

/// Require a real (Int or Float) operand
fn real_operand(value: Value, op: &str) -> eyre::Result<f64> {
    match value {
        Value::Int(v) => Ok(v as f64),
        Value::Float(v) => Ok(v),
        Value::Bytes(_) => bail!("Cannot {op} a byte string"),
    }
}

/// Require an integral operand: Int as-is, Bytes as big-endian unsigned
fn int_operand(value: Value) -> eyre::Result<i64> {
    match value {
        Value::Int(v) => Ok(v),
        Value::Float(v) => bail!("Bitwise AND requires integer or byte-string operands, got float {v}"),
        Value::Bytes(bytes) => {
            if bytes.len() > 8 {
                bail!("Byte string too wide for bitwise AND: {} bytes", bytes.len());
            }
            let wide = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
            match i64::try_from(wide) {
                Ok(v) => Ok(v),
                Err(_) => bail!("Byte string value too large for bitwise AND: {wide:#x}"),
            }
        }
    }
}
