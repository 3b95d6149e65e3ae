//! The safe builtin surface.
//!
//! Only the names the bot pre-binds exist: `round`, `max`, `min`, `len`,
//! `abs`, `str`, `int`, `float`, `list`, `tuple`, `set`, `dict`. Each is a
//! [`Builtin`] variant dispatched here. Constructors return native values
//! in every numeric mode; only literals go through the active domain.

use num_bigint::BigInt;
use num_traits::Signed;
use strum::Display;

use crate::{
    args::CallArgs,
    exception::{Exception, RunResult},
    types::Decimal,
    value::{DictValue, HashKey, Value, str_repr, value_ordering},
};

/// A builtin function value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Round,
    Max,
    Min,
    Len,
    Abs,
    Str,
    Int,
    Float,
    List,
    Tuple,
    Set,
    Dict,
}

pub(crate) fn call(builtin: Builtin, args: CallArgs) -> RunResult<Value> {
    match builtin {
        Builtin::Round => round(args),
        Builtin::Max => min_max(args, true),
        Builtin::Min => min_max(args, false),
        Builtin::Len => len(args),
        Builtin::Abs => abs(args),
        Builtin::Str => str_(args),
        Builtin::Int => int(args),
        Builtin::Float => float(args),
        Builtin::List => list(args),
        Builtin::Tuple => tuple(args),
        Builtin::Set => set(args),
        Builtin::Dict => dict(args),
    }
}

fn ndigits_arg(value: &Value) -> RunResult<i32> {
    value
        .as_int()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| {
            Exception::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_().name()
            ))
        })
}

/// `round(number[, ndigits])` with half-even rounding.
fn round(args: CallArgs) -> RunResult<Value> {
    let slots = args.bind("round", &["number", "ndigits"], 1)?;
    let number = slots[0].as_ref().expect("required");
    let ndigits = match &slots[1] {
        Some(Value::None) | None => None,
        Some(value) => Some(ndigits_arg(value)?),
    };
    match number {
        Value::Bool(b) => Ok(Value::int(i64::from(*b))),
        Value::Int(n) => Ok(Value::Int(n.clone())),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(Exception::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(Exception::overflow("cannot convert float infinity to integer"));
            }
            let exact = Decimal::try_from_f64(*f).expect("finite");
            match ndigits {
                None => Ok(Value::Int(exact.quantize(0).to_bigint().expect("integral"))),
                Some(n) => Ok(Value::Float(exact.quantize(n.saturating_neg()).to_f64())),
            }
        }
        Value::Decimal(d) => match ndigits {
            None => Ok(Value::Int(d.quantize(0).to_bigint().expect("integral"))),
            Some(n) => Ok(Value::Decimal(d.quantize(n.saturating_neg()))),
        },
        _ => Err(Exception::type_error(format!(
            "type {} doesn't define __round__ method",
            number.type_().name()
        ))),
    }
}

fn min_max(args: CallArgs, want_max: bool) -> RunResult<Value> {
    let fname = if want_max { "max" } else { "min" };
    args.expect_no_kwargs(fname)?;
    if args.positional.is_empty() {
        return Err(Exception::type_error(format!(
            "{fname} expected at least 1 argument, got 0"
        )));
    }
    let candidates = if args.positional.len() == 1 {
        args.positional[0].iterate()?
    } else {
        args.positional
    };
    let symbol = if want_max { ">" } else { "<" };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            None => candidate,
            Some(current) => {
                let ordering = value_ordering(&candidate, &current, symbol)?;
                let replace = if want_max {
                    ordering == std::cmp::Ordering::Greater
                } else {
                    ordering == std::cmp::Ordering::Less
                };
                if replace { candidate } else { current }
            }
        });
    }
    best.ok_or_else(|| Exception::value_error(format!("{fname}() arg is an empty sequence")))
}

fn len(args: CallArgs) -> RunResult<Value> {
    let value = args.exactly_one("len")?;
    value
        .py_len()
        .map(|n| Value::int(i64::try_from(n).unwrap_or(i64::MAX)))
        .ok_or_else(|| Exception::type_error(format!("object of type '{}' has no len()", value.type_().name())))
}

fn abs(args: CallArgs) -> RunResult<Value> {
    let value = args.exactly_one("abs")?;
    match &value {
        Value::Bool(b) => Ok(Value::int(i64::from(*b))),
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        _ => Err(Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            value.type_().name()
        ))),
    }
}

fn str_(args: CallArgs) -> RunResult<Value> {
    Ok(match args.at_most_one("str")? {
        None => Value::Str("".into()),
        Some(value) => Value::Str(value.py_str().into()),
    })
}

fn int(args: CallArgs) -> RunResult<Value> {
    let Some(value) = args.at_most_one("int")? else {
        return Ok(Value::int(0));
    };
    match &value {
        Value::Bool(b) => Ok(Value::int(i64::from(*b))),
        Value::Int(n) => Ok(Value::Int(n.clone())),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(Exception::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(Exception::overflow("cannot convert float infinity to integer"));
            }
            Ok(Value::Int(Decimal::try_from_f64(*f).expect("finite").trunc()))
        }
        Value::Decimal(d) => Ok(Value::Int(d.trunc())),
        Value::Str(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != '_').collect();
            cleaned
                .parse::<BigInt>()
                .map(Value::Int)
                .map_err(|_| {
                    Exception::value_error(format!("invalid literal for int() with base 10: {}", str_repr(s)))
                })
        }
        _ => Err(Exception::type_error(format!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            value.type_().name()
        ))),
    }
}

fn float(args: CallArgs) -> RunResult<Value> {
    let Some(value) = args.at_most_one("float")? else {
        return Ok(Value::Float(0.0));
    };
    match &value {
        Value::Bool(_) | Value::Int(_) | Value::Decimal(_) | Value::Float(_) => {
            Ok(Value::Float(value.as_f64().expect("numeric")))
        }
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Exception::value_error(format!("could not convert string to float: {}", str_repr(s)))),
        _ => Err(Exception::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            value.type_().name()
        ))),
    }
}

fn list(args: CallArgs) -> RunResult<Value> {
    Ok(match args.at_most_one("list")? {
        None => Value::list(Vec::new()),
        Some(value) => Value::list(value.iterate()?),
    })
}

fn tuple(args: CallArgs) -> RunResult<Value> {
    Ok(match args.at_most_one("tuple")? {
        None => Value::tuple(Vec::new()),
        Some(value) => Value::tuple(value.iterate()?),
    })
}

fn set(args: CallArgs) -> RunResult<Value> {
    match args.at_most_one("set")? {
        None => Value::set_of(Vec::new()),
        Some(value) => Value::set_of(value.iterate()?),
    }
}

fn dict(args: CallArgs) -> RunResult<Value> {
    let mut result = DictValue::default();
    if args.positional.len() > 1 {
        return Err(Exception::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.positional.len()
        )));
    }
    if let Some(source) = args.positional.first() {
        match source {
            Value::Dict(existing) => {
                result = existing.borrow().clone();
            }
            _ => {
                for (index, item) in source.iterate()?.into_iter().enumerate() {
                    let pair = item.iterate().map_err(|_| pair_error(index))?;
                    let [key, value] = <[Value; 2]>::try_from(pair).map_err(|_| pair_error(index))?;
                    result.insert(HashKey::new(key)?, value);
                }
            }
        }
    }
    for (name, value) in args.keywords {
        result.insert(HashKey::new(Value::from(name))?, value);
    }
    Ok(Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(result))))
}

fn pair_error(index: usize) -> Exception {
    Exception::type_error(format!(
        "cannot convert dictionary update sequence element #{index} to a sequence"
    ))
}
