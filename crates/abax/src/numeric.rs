//! The pluggable numeric domain.
//!
//! A domain is a strategy bundling literal constructors with the
//! arithmetic operators, so the decimal-vs-native decision lives in one
//! place instead of being scattered through the interpreter. Container
//! operators live with the containers; everything numeric comes through
//! here.
//!
//! The matrix-multiply operator is implemented by neither domain and
//! raises a plain TypeError.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    exception::{Exception, RunResult},
    expressions::{Operator, UnaryOperator},
    types::{Decimal, DecimalError},
    value::{Value, py_float_repr},
};

/// Capability bundle turning literals into values and applying numeric
/// operators to them.
pub(crate) trait NumericDomain: std::fmt::Debug {
    /// Integer literal (already exact).
    fn from_int(&self, value: BigInt) -> Value;

    /// A float value flowing in at runtime (e.g. `math.e`).
    fn from_float(&self, value: f64) -> RunResult<Value>;

    /// Float literal; `text` is the source spelling for exact conversion.
    fn from_float_literal(&self, value: f64, text: &str) -> RunResult<Value>;

    fn from_str_literal(&self, text: &str) -> Value {
        Value::Str(text.into())
    }

    fn from_bytes_literal(&self, bytes: &[u8]) -> Value {
        Value::Bytes(bytes.into())
    }

    /// Binary operator over numeric scalars.
    fn binary(&self, op: Operator, left: &Value, right: &Value) -> RunResult<Value>;

    /// Unary `+`/`-`/`~` over numeric scalars.
    fn unary(&self, op: UnaryOperator, operand: &Value) -> RunResult<Value> {
        unary_numeric(op, operand)
    }
}

/// Native binary numerics: big integers and IEEE-754 doubles.
#[derive(Debug)]
pub(crate) struct NativeDomain;

/// Arbitrary-precision decimal numerics.
#[derive(Debug)]
pub(crate) struct DecimalDomain;

static NATIVE: NativeDomain = NativeDomain;
static DECIMAL: DecimalDomain = DecimalDomain;

pub(crate) fn domain_for(decimal_mode: bool) -> &'static dyn NumericDomain {
    if decimal_mode { &DECIMAL } else { &NATIVE }
}

impl NumericDomain for NativeDomain {
    fn from_int(&self, value: BigInt) -> Value {
        Value::Int(value)
    }

    fn from_float(&self, value: f64) -> RunResult<Value> {
        Ok(Value::Float(value))
    }

    fn from_float_literal(&self, value: f64, _text: &str) -> RunResult<Value> {
        Ok(Value::Float(value))
    }

    fn binary(&self, op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
        if matches!(left, Value::Decimal(_)) || matches!(right, Value::Decimal(_)) {
            return decimal_binary(op, left, right);
        }
        if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
            return int_binary(op, &a, &b, left, right);
        }
        if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
            return float_binary(op, a, b, left, right);
        }
        Err(binop_type_error(op, left, right))
    }
}

impl NumericDomain for DecimalDomain {
    fn from_int(&self, value: BigInt) -> Value {
        Value::Decimal(Decimal::from_bigint(value))
    }

    fn from_float(&self, value: f64) -> RunResult<Value> {
        Decimal::try_from_f64(value)
            .map(Value::Decimal)
            .map_err(|_| Exception::value_error("cannot convert float infinity or NaN to Decimal"))
    }

    fn from_float_literal(&self, value: f64, text: &str) -> RunResult<Value> {
        match text.parse::<Decimal>() {
            Ok(d) => Ok(Value::Decimal(d)),
            Err(_) => self.from_float(value),
        }
    }

    fn binary(&self, op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
        // Integers that flow in from builtins keep integer semantics.
        if !matches!(left, Value::Decimal(_) | Value::Float(_))
            && !matches!(right, Value::Decimal(_) | Value::Float(_))
        {
            if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
                return int_binary(op, &a, &b, left, right);
            }
        }
        decimal_binary(op, left, right)
    }
}

fn int_operand(value: &Value) -> Option<BigInt> {
    match value {
        Value::Bool(b) => Some(BigInt::from(i32::from(*b))),
        Value::Int(n) => Some(n.clone()),
        _ => None,
    }
}

fn binop_type_error(op: Operator, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_().name(),
        right.type_().name()
    ))
}

fn int_binary(op: Operator, a: &BigInt, b: &BigInt, left: &Value, right: &Value) -> RunResult<Value> {
    match op {
        Operator::Add => Ok(Value::Int(a + b)),
        Operator::Sub => Ok(Value::Int(a - b)),
        Operator::Mult => Ok(Value::Int(a * b)),
        Operator::Div => {
            if b.is_zero() {
                return Err(Exception::zero_division("division by zero"));
            }
            Ok(Value::Float(a.to_f64().unwrap_or(f64::NAN) / b.to_f64().unwrap_or(f64::NAN)))
        }
        Operator::FloorDiv => {
            if b.is_zero() {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::Int(a.div_floor(b)))
        }
        Operator::Mod => {
            if b.is_zero() {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::Int(a.mod_floor(b)))
        }
        Operator::Pow => int_pow(a, b),
        Operator::LShift => {
            let shift = shift_count(b)?;
            if a.bits().saturating_add(shift) > 8_000_000 {
                return Err(Exception::overflow("shift count too large"));
            }
            Ok(Value::Int(a.clone() << shift))
        }
        Operator::RShift => {
            let shift = shift_count(b)?;
            Ok(Value::Int(a.clone() >> shift.min(8_000_000)))
        }
        Operator::BitAnd => Ok(Value::Int(a & b)),
        Operator::BitOr => Ok(Value::Int(a | b)),
        Operator::BitXor => Ok(Value::Int(a ^ b)),
        Operator::MatMult => Err(binop_type_error(op, left, right)),
    }
}

fn shift_count(b: &BigInt) -> RunResult<u64> {
    if b.is_negative() {
        return Err(Exception::value_error("negative shift count"));
    }
    b.to_u64().ok_or_else(|| Exception::overflow("shift count too large"))
}

fn int_pow(a: &BigInt, b: &BigInt) -> RunResult<Value> {
    if b.is_negative() {
        let base = a.to_f64().unwrap_or(f64::NAN);
        if base == 0.0 {
            return Err(Exception::zero_division("0.0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float(base.powf(b.to_f64().unwrap_or(f64::NAN))));
    }
    let exp = b.to_u32().ok_or_else(|| Exception::overflow("exponent too large"))?;
    if a.bits().max(1).saturating_mul(u64::from(exp)) > 8_000_000 {
        return Err(Exception::overflow("exponent too large"));
    }
    Ok(Value::Int(a.pow(exp)))
}

fn float_binary(op: Operator, a: f64, b: f64, left: &Value, right: &Value) -> RunResult<Value> {
    match op {
        Operator::Add => Ok(Value::Float(a + b)),
        Operator::Sub => Ok(Value::Float(a - b)),
        Operator::Mult => Ok(Value::Float(a * b)),
        Operator::Div => {
            if b == 0.0 {
                return Err(Exception::zero_division("float division by zero"));
            }
            Ok(Value::Float(a / b))
        }
        Operator::FloorDiv => {
            if b == 0.0 {
                return Err(Exception::zero_division("float floor division by zero"));
            }
            Ok(Value::Float((a / b).floor()))
        }
        Operator::Mod => {
            if b == 0.0 {
                return Err(Exception::zero_division("float modulo"));
            }
            let mut r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r += b;
            }
            Ok(Value::Float(r))
        }
        Operator::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(Exception::zero_division("0.0 cannot be raised to a negative power"));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(Exception::value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            Ok(Value::Float(a.powf(b)))
        }
        _ => Err(binop_type_error(op, left, right)),
    }
}

fn to_decimal_operand(value: &Value) -> RunResult<Option<Decimal>> {
    match value {
        Value::Bool(b) => Ok(Some(Decimal::from_i64(i64::from(*b)))),
        Value::Int(n) => Ok(Some(Decimal::from_bigint(n.clone()))),
        Value::Float(f) => Decimal::try_from_f64(*f)
            .map(Some)
            .map_err(|_| Exception::value_error("cannot convert float infinity or NaN to Decimal")),
        Value::Decimal(d) => Ok(Some(d.clone())),
        _ => Ok(None),
    }
}

fn map_decimal_error(error: DecimalError) -> Exception {
    match error {
        DecimalError::DivisionByZero => Exception::zero_division("division by zero"),
        DecimalError::TooLarge => Exception::overflow("decimal result too large"),
    }
}

fn decimal_binary(op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
    let (Some(a), Some(b)) = (to_decimal_operand(left)?, to_decimal_operand(right)?) else {
        return Err(binop_type_error(op, left, right));
    };
    let result = match op {
        Operator::Add => a.add(&b),
        Operator::Sub => a.sub(&b),
        Operator::Mult => a.mul(&b),
        Operator::Div => a.div(&b).map_err(map_decimal_error)?,
        Operator::FloorDiv => a.floordiv(&b).map_err(map_decimal_error)?,
        Operator::Mod => a.rem(&b).map_err(map_decimal_error)?,
        Operator::Pow => decimal_pow(&a, &b)?,
        Operator::LShift
        | Operator::RShift
        | Operator::BitAnd
        | Operator::BitOr
        | Operator::BitXor
        | Operator::MatMult => return Err(binop_type_error(op, left, right)),
    };
    Ok(Value::Decimal(result))
}

fn decimal_pow(base: &Decimal, exponent: &Decimal) -> RunResult<Decimal> {
    if let Some(n) = exponent.to_bigint() {
        return base.pow_integral(&n).map_err(map_decimal_error);
    }
    // Non-integral exponent: computed through the float domain and
    // converted back from the shortest representation.
    let approx = base.to_f64().powf(exponent.to_f64());
    if !approx.is_finite() {
        return Err(Exception::overflow("decimal result too large"));
    }
    py_float_repr(approx)
        .parse()
        .map_err(|_| Exception::overflow("decimal result too large"))
}

/// Unary numeric operators, shared by both domains: operand kind decides.
pub(crate) fn unary_numeric(op: UnaryOperator, operand: &Value) -> RunResult<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.py_bool())),
        UnaryOperator::Minus => match operand {
            Value::Bool(b) => Ok(Value::int(-i64::from(*b))),
            Value::Int(n) => Ok(Value::Int(-n.clone())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Decimal(d) => Ok(Value::Decimal(d.neg())),
            _ => Err(unary_type_error("-", operand)),
        },
        UnaryOperator::Plus => match operand {
            Value::Bool(b) => Ok(Value::int(i64::from(*b))),
            Value::Int(_) | Value::Float(_) | Value::Decimal(_) => Ok(operand.clone()),
            _ => Err(unary_type_error("+", operand)),
        },
        UnaryOperator::Invert => match operand {
            Value::Bool(b) => Ok(Value::int(-i64::from(*b) - 1)),
            Value::Int(n) => Ok(Value::Int(-n.clone() - BigInt::from(1))),
            _ => Err(unary_type_error("~", operand)),
        },
    }
}

fn unary_type_error(symbol: &str, operand: &Value) -> Exception {
    Exception::type_error(format!(
        "bad operand type for unary {symbol}: '{}'",
        operand.type_().name()
    ))
}
