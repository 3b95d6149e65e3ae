//! The `math` module surface.
//!
//! Constants and functions resolve as attributes of the pre-bound module
//! object. Integer-valued functions return ints; everything else returns
//! floats regardless of numeric mode, like the host's math module.

use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_traits::{FromPrimitive, Signed, ToPrimitive};
use strum::Display;

use crate::{
    args::CallArgs,
    exception::{Exception, RunResult},
    value::Value,
};

/// Math module functions. The enum is the identity stored in
/// `Value::MathFunction` and the dispatch key in [`call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MathFunction {
    Sqrt,
    Floor,
    Ceil,
    Trunc,
    Fabs,
    Exp,
    Log,
    Log2,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Degrees,
    Radians,
    Pow,
    Hypot,
    Copysign,
    Fmod,
    Factorial,
    Gcd,
    Isqrt,
    Isnan,
    Isinf,
    Isfinite,
}

/// Resolves a math-module attribute (already past the filter).
pub(crate) fn attr(name: &str) -> Option<Value> {
    let function = match name {
        "pi" => return Some(Value::Float(std::f64::consts::PI)),
        "e" => return Some(Value::Float(std::f64::consts::E)),
        "tau" => return Some(Value::Float(std::f64::consts::TAU)),
        "inf" => return Some(Value::Float(f64::INFINITY)),
        "nan" => return Some(Value::Float(f64::NAN)),
        "sqrt" => MathFunction::Sqrt,
        "floor" => MathFunction::Floor,
        "ceil" => MathFunction::Ceil,
        "trunc" => MathFunction::Trunc,
        "fabs" => MathFunction::Fabs,
        "exp" => MathFunction::Exp,
        "log" => MathFunction::Log,
        "log2" => MathFunction::Log2,
        "log10" => MathFunction::Log10,
        "sin" => MathFunction::Sin,
        "cos" => MathFunction::Cos,
        "tan" => MathFunction::Tan,
        "asin" => MathFunction::Asin,
        "acos" => MathFunction::Acos,
        "atan" => MathFunction::Atan,
        "atan2" => MathFunction::Atan2,
        "sinh" => MathFunction::Sinh,
        "cosh" => MathFunction::Cosh,
        "tanh" => MathFunction::Tanh,
        "degrees" => MathFunction::Degrees,
        "radians" => MathFunction::Radians,
        "pow" => MathFunction::Pow,
        "hypot" => MathFunction::Hypot,
        "copysign" => MathFunction::Copysign,
        "fmod" => MathFunction::Fmod,
        "factorial" => MathFunction::Factorial,
        "gcd" => MathFunction::Gcd,
        "isqrt" => MathFunction::Isqrt,
        "isnan" => MathFunction::Isnan,
        "isinf" => MathFunction::Isinf,
        "isfinite" => MathFunction::Isfinite,
        _ => return None,
    };
    Some(Value::MathFunction(function))
}

fn float_arg(value: &Value) -> RunResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| Exception::type_error(format!("must be real number, not {}", value.type_().name())))
}

fn int_arg(value: &Value) -> RunResult<BigInt> {
    value.as_int().ok_or_else(|| {
        Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_().name()
        ))
    })
}

fn domain_checked(result: f64) -> RunResult<Value> {
    if result.is_nan() {
        return Err(Exception::value_error("math domain error"));
    }
    Ok(Value::Float(result))
}

/// Integer result of floor/ceil/trunc over any numeric kind.
fn integral(value: &Value, function: MathFunction) -> RunResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::int(i64::from(*b))),
        Value::Int(n) => Ok(Value::Int(n.clone())),
        Value::Decimal(d) => Ok(Value::Int(match function {
            MathFunction::Floor => d.floor(),
            MathFunction::Ceil => d.ceil(),
            _ => d.trunc(),
        })),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(if f.is_nan() {
                    Exception::value_error("cannot convert float NaN to integer")
                } else {
                    Exception::overflow("cannot convert float infinity to integer")
                });
            }
            let rounded = match function {
                MathFunction::Floor => f.floor(),
                MathFunction::Ceil => f.ceil(),
                _ => f.trunc(),
            };
            Ok(Value::Int(BigInt::from_f64(rounded).expect("finite")))
        }
        _ => Err(Exception::type_error(format!(
            "must be real number, not {}",
            value.type_().name()
        ))),
    }
}

pub(crate) fn call(function: MathFunction, args: CallArgs) -> RunResult<Value> {
    use MathFunction::*;

    match function {
        Floor | Ceil | Trunc => {
            let value = args.exactly_one(&function.to_string())?;
            integral(&value, function)
        }
        Factorial => {
            let n = int_arg(&args.exactly_one("factorial")?)?;
            if n.is_negative() {
                return Err(Exception::value_error(
                    "factorial() not defined for negative values",
                ));
            }
            let n = n
                .to_u32()
                .filter(|n| *n <= 100_000)
                .ok_or_else(|| Exception::overflow("factorial() argument is too large"))?;
            let mut result = BigInt::from(1);
            for i in 2..=u64::from(n) {
                result *= i;
            }
            Ok(Value::Int(result))
        }
        Gcd => {
            let slots = args.bind("gcd", &["a", "b"], 2)?;
            let a = int_arg(slots[0].as_ref().expect("required"))?;
            let b = int_arg(slots[1].as_ref().expect("required"))?;
            Ok(Value::Int(a.gcd(&b)))
        }
        Isqrt => {
            let n = int_arg(&args.exactly_one("isqrt")?)?;
            if n.is_negative() {
                return Err(Exception::value_error("isqrt() argument must be nonnegative"));
            }
            Ok(Value::Int(n.sqrt()))
        }
        Isnan | Isinf | Isfinite => {
            let x = float_arg(&args.exactly_one(&function.to_string())?)?;
            Ok(Value::Bool(match function {
                Isnan => x.is_nan(),
                Isinf => x.is_infinite(),
                _ => x.is_finite(),
            }))
        }
        Atan2 | Copysign | Fmod | Hypot | Pow => {
            let slots = args.bind(&function.to_string(), &["x", "y"], 2)?;
            let x = float_arg(slots[0].as_ref().expect("required"))?;
            let y = float_arg(slots[1].as_ref().expect("required"))?;
            match function {
                Atan2 => Ok(Value::Float(x.atan2(y))),
                Copysign => Ok(Value::Float(x.copysign(y))),
                Hypot => Ok(Value::Float(x.hypot(y))),
                Fmod => {
                    if y == 0.0 {
                        return Err(Exception::value_error("math domain error"));
                    }
                    Ok(Value::Float(x % y))
                }
                _ => domain_checked(x.powf(y)),
            }
        }
        Log => {
            let slots = args.bind("log", &["x", "base"], 1)?;
            let x = float_arg(slots[0].as_ref().expect("required"))?;
            if x <= 0.0 {
                return Err(Exception::value_error("math domain error"));
            }
            match &slots[1] {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let base = float_arg(base)?;
                    if base <= 0.0 || base == 1.0 {
                        return Err(Exception::value_error("math domain error"));
                    }
                    Ok(Value::Float(x.log(base)))
                }
            }
        }
        _ => {
            let x = float_arg(&args.exactly_one(&function.to_string())?)?;
            let result = match function {
                Sqrt => {
                    if x < 0.0 {
                        return Err(Exception::value_error("math domain error"));
                    }
                    x.sqrt()
                }
                Fabs => x.abs(),
                Exp => x.exp(),
                Log2 => {
                    if x <= 0.0 {
                        return Err(Exception::value_error("math domain error"));
                    }
                    x.log2()
                }
                Log10 => {
                    if x <= 0.0 {
                        return Err(Exception::value_error("math domain error"));
                    }
                    x.log10()
                }
                Sin => x.sin(),
                Cos => x.cos(),
                Tan => x.tan(),
                Asin => {
                    if !(-1.0..=1.0).contains(&x) {
                        return Err(Exception::value_error("math domain error"));
                    }
                    x.asin()
                }
                Acos => {
                    if !(-1.0..=1.0).contains(&x) {
                        return Err(Exception::value_error("math domain error"));
                    }
                    x.acos()
                }
                Atan => x.atan(),
                Sinh => x.sinh(),
                Cosh => x.cosh(),
                Tanh => x.tanh(),
                Degrees => x.to_degrees(),
                Radians => x.to_radians(),
                _ => unreachable!("handled above"),
            };
            Ok(Value::Float(result))
        }
    }
}
