//! Runtime values.
//!
//! Scalars are stored inline; containers share ownership through
//! `Rc<RefCell<…>>` so assignment aliases and in-place mutation behave like
//! the host language. Dicts and sets key on [`HashKey`], which normalizes
//! numerics so `1`, `1.0` and `Decimal('1')` are one key.

use std::{
    cell::RefCell,
    cmp::Ordering,
    hash::{BuildHasher, Hash, Hasher},
    rc::Rc,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::{
    builtins::Builtin,
    exception::{Exception, RunResult},
    methods::Method,
    modules::math::MathFunction,
    types::{
        Decimal,
        datetime_types::{date_isoformat, date_repr, datetime_isoformat, datetime_repr, time_isoformat, time_repr},
    },
};

/// Ordered mapping used for dict values.
pub type DictValue = IndexMap<HashKey, Value>;
/// Ordered set used for set values.
pub type SetValue = IndexSet<HashKey>;

/// Type tag of a runtime value, used by the attribute filter and for
/// Python-style type names in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    NoneType,
    Ellipsis,
    Bool,
    Int,
    Float,
    Decimal,
    Str,
    Bytes,
    List,
    Tuple,
    Set,
    Dict,
    Slice,
    Date,
    Datetime,
    Time,
    /// The pre-bound `date` class object.
    DateType,
    /// The pre-bound `datetime` class object.
    DatetimeType,
    /// The pre-bound `math` module object.
    MathModule,
    /// A builtin or math-module function.
    BuiltinFunction,
    /// A bound method on some receiver.
    Method,
}

impl Type {
    /// The Python-style name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoneType => "NoneType",
            Self::Ellipsis => "ellipsis",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal.Decimal",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Dict => "dict",
            Self::Slice => "slice",
            Self::Date => "datetime.date",
            Self::Datetime => "datetime.datetime",
            Self::Time => "datetime.time",
            Self::DateType | Self::DatetimeType => "type",
            Self::MathModule => "module",
            Self::BuiltinFunction => "builtin_function_or_method",
            Self::Method => "method",
        }
    }
}

/// Which pre-bound class object a `Value::Class` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Date,
    Datetime,
}

/// A slice descriptor built from `a:b:c` syntax; absent parts are `None`.
#[derive(Debug, Clone)]
pub struct SliceValue {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

/// A method bound to its receiver, produced by a permitted attribute read.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Method,
}

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Ellipsis,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Decimal(Decimal),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Set(Rc<RefCell<SetValue>>),
    Dict(Rc<RefCell<DictValue>>),
    Slice(Rc<SliceValue>),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Time(NaiveTime),
    /// A pre-bound class object (`date`, `datetime`).
    Class(ClassKind),
    /// The pre-bound `math` module object.
    MathModule,
    /// A function from the math module (e.g. `math.sqrt`).
    MathFunction(MathFunction),
    /// A safe builtin (`round`, `len`, ...).
    Builtin(Builtin),
    /// A method bound to a receiver (e.g. `l.count`).
    BoundMethod(Rc<BoundMethod>),
}

impl Value {
    pub fn int(value: i64) -> Self {
        Self::Int(BigInt::from(value))
    }

    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    /// Builds a set value; fails if an element is unhashable.
    pub fn set_of(items: Vec<Self>) -> RunResult<Self> {
        let mut set = SetValue::default();
        for item in items {
            set.insert(HashKey::new(item)?);
        }
        Ok(Self::Set(Rc::new(RefCell::new(set))))
    }

    /// Builds a dict value; fails if a key is unhashable.
    pub fn dict_of(pairs: Vec<(Self, Self)>) -> RunResult<Self> {
        let mut dict = DictValue::default();
        for (key, value) in pairs {
            dict.insert(HashKey::new(key)?, value);
        }
        Ok(Self::Dict(Rc::new(RefCell::new(dict))))
    }

    pub fn type_(&self) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Ellipsis => Type::Ellipsis,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Decimal(_) => Type::Decimal,
            Self::Str(_) => Type::Str,
            Self::Bytes(_) => Type::Bytes,
            Self::List(_) => Type::List,
            Self::Tuple(_) => Type::Tuple,
            Self::Set(_) => Type::Set,
            Self::Dict(_) => Type::Dict,
            Self::Slice(_) => Type::Slice,
            Self::Date(_) => Type::Date,
            Self::Datetime(_) => Type::Datetime,
            Self::Time(_) => Type::Time,
            Self::Class(ClassKind::Date) => Type::DateType,
            Self::Class(ClassKind::Datetime) => Type::DatetimeType,
            Self::MathModule => Type::MathModule,
            Self::MathFunction(_) | Self::Builtin(_) => Type::BuiltinFunction,
            Self::BoundMethod(_) => Type::Method,
        }
    }

    /// Python truthiness.
    pub fn py_bool(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(n) => !n.is_zero(),
            Self::Float(f) => *f != 0.0,
            Self::Decimal(d) => !d.is_zero(),
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Set(set) => !set.borrow().is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            _ => true,
        }
    }

    /// Length for sized values.
    pub fn py_len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::Bytes(b) => Some(b.len()),
            Self::List(items) => Some(items.borrow().len()),
            Self::Tuple(items) => Some(items.len()),
            Self::Set(set) => Some(set.borrow().len()),
            Self::Dict(dict) => Some(dict.borrow().len()),
            _ => None,
        }
    }

    /// Integer view for indexing and integer arguments: bools, ints and
    /// integral decimals.
    pub(crate) fn as_int(&self) -> Option<BigInt> {
        match self {
            Self::Bool(b) => Some(BigInt::from(i32::from(*b))),
            Self::Int(n) => Some(n.clone()),
            Self::Decimal(d) => d.to_bigint(),
            _ => None,
        }
    }

    /// Float view for math functions.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(i32::from(*b))),
            Self::Int(n) => Some(n.to_f64().unwrap_or(f64::NAN)),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    /// Deep structural equality with exact cross-type numerics.
    pub fn py_eq(&self, other: &Self) -> bool {
        if is_numeric(self) && is_numeric(other) {
            return compare_numeric(self, other) == Some(Ordering::Equal);
        }
        match (self, other) {
            (Self::None, Self::None) | (Self::Ellipsis, Self::Ellipsis) | (Self::MathModule, Self::MathModule) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Self::Set(a), Self::Set(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && b.iter().all(|key| a.contains(key))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && b.iter().all(|(key, value)| a.get(key).is_some_and(|v| v.py_eq(value)))
            }
            (Self::Slice(a), Self::Slice(b)) => {
                a.start.py_eq(&b.start) && a.stop.py_eq(&b.stop) && a.step.py_eq(&b.step)
            }
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Datetime(a), Self::Datetime(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::MathFunction(a), Self::MathFunction(b)) => a == b,
            (Self::BoundMethod(a), Self::BoundMethod(b)) => {
                a.method == b.method && a.receiver.is_identical(&b.receiver)
            }
            _ => false,
        }
    }

    /// Object identity for `is` / `is not`: pointer identity for containers,
    /// value identity for immediate scalars.
    pub(crate) fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Slice(a), Self::Slice(b)) => Rc::ptr_eq(a, b),
            (Self::BoundMethod(a), Self::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Self::None, Self::None) | (Self::Ellipsis, Self::Ellipsis) | (Self::MathModule, Self::MathModule) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Datetime(a), Self::Datetime(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::MathFunction(a), Self::MathFunction(b)) => a == b,
            _ => false,
        }
    }

    /// Materializes the elements of an iterable value.
    pub(crate) fn iterate(&self) -> RunResult<Vec<Self>> {
        match self {
            Self::Str(s) => Ok(s.chars().map(|c| Self::Str(c.to_string().into())).collect()),
            Self::Bytes(b) => Ok(b.iter().map(|byte| Self::int(i64::from(*byte))).collect()),
            Self::List(items) => Ok(items.borrow().clone()),
            Self::Tuple(items) => Ok(items.as_ref().clone()),
            Self::Set(set) => Ok(set.borrow().iter().map(|key| key.value.clone()).collect()),
            Self::Dict(dict) => Ok(dict.borrow().keys().map(|key| key.value.clone()).collect()),
            _ => Err(Exception::type_error(format!(
                "'{}' object is not iterable",
                self.type_().name()
            ))),
        }
    }

    /// Membership test with `self` as the container.
    pub(crate) fn contains(&self, item: &Self) -> RunResult<bool> {
        match self {
            Self::Str(s) => match item {
                Self::Str(needle) => Ok(s.contains(needle.as_ref())),
                _ => Err(Exception::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_().name()
                ))),
            },
            Self::Bytes(b) => match item {
                Self::Bytes(needle) => {
                    Ok(needle.is_empty() || b.windows(needle.len()).any(|w| w == needle.as_ref()))
                }
                other => match other.as_int().and_then(|n| n.to_u8()) {
                    Some(byte) => Ok(b.contains(&byte)),
                    None => Err(Exception::type_error("a bytes-like object is required")),
                },
            },
            Self::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
            Self::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
            Self::Set(set) => {
                let key = HashKey::new(item.clone())?;
                Ok(set.borrow().contains(&key))
            }
            Self::Dict(dict) => {
                let key = HashKey::new(item.clone())?;
                Ok(dict.borrow().contains_key(&key))
            }
            _ => Err(Exception::type_error(format!(
                "argument of type '{}' is not iterable",
                self.type_().name()
            ))),
        }
    }

    /// `self[index]`.
    pub(crate) fn get_item(&self, index: &Self) -> RunResult<Self> {
        match self {
            Self::List(items) => {
                if let Self::Slice(slice) = index {
                    let items = items.borrow();
                    let picked = slice_indices(slice, items.len())?;
                    return Ok(Self::list(picked.into_iter().map(|i| items[i].clone()).collect()));
                }
                let items = items.borrow();
                let i = sequence_index(index, items.len(), "list")?;
                Ok(items[i].clone())
            }
            Self::Tuple(items) => {
                if let Self::Slice(slice) = index {
                    let picked = slice_indices(slice, items.len())?;
                    return Ok(Self::tuple(picked.into_iter().map(|i| items[i].clone()).collect()));
                }
                let i = sequence_index(index, items.len(), "tuple")?;
                Ok(items[i].clone())
            }
            Self::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                if let Self::Slice(slice) = index {
                    let picked = slice_indices(slice, chars.len())?;
                    return Ok(Self::Str(picked.into_iter().map(|i| chars[i]).collect::<String>().into()));
                }
                let i = sequence_index(index, chars.len(), "string")?;
                Ok(Self::Str(chars[i].to_string().into()))
            }
            Self::Bytes(b) => {
                if let Self::Slice(slice) = index {
                    let picked = slice_indices(slice, b.len())?;
                    let bytes: Vec<u8> = picked.into_iter().map(|i| b[i]).collect();
                    return Ok(Self::Bytes(bytes.into()));
                }
                let i = sequence_index(index, b.len(), "bytes")?;
                Ok(Self::int(i64::from(b[i])))
            }
            Self::Dict(dict) => {
                let key = HashKey::new(index.clone())?;
                dict.borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| Exception::key_error(index.py_repr()))
            }
            _ => Err(Exception::type_error(format!(
                "'{}' object is not subscriptable",
                self.type_().name()
            ))),
        }
    }

    /// `self[index] = value`. Slice targets are rejected by the caller.
    pub(crate) fn set_item(&self, index: &Self, value: Self) -> RunResult<()> {
        match self {
            Self::List(items) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                let i = assignment_index(index, len)?;
                items[i] = value;
                Ok(())
            }
            Self::Dict(dict) => {
                let key = HashKey::new(index.clone())?;
                dict.borrow_mut().insert(key, value);
                Ok(())
            }
            _ => Err(Exception::type_error(format!(
                "'{}' object does not support item assignment",
                self.type_().name()
            ))),
        }
    }

    /// `del self[index]`. Slice targets are rejected by the caller.
    pub(crate) fn del_item(&self, index: &Self) -> RunResult<()> {
        match self {
            Self::List(items) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                let i = assignment_index(index, len)?;
                items.remove(i);
                Ok(())
            }
            Self::Dict(dict) => {
                let key = HashKey::new(index.clone())?;
                if dict.borrow_mut().shift_remove(&key).is_none() {
                    return Err(Exception::key_error(index.py_repr()));
                }
                Ok(())
            }
            _ => Err(Exception::type_error(format!(
                "'{}' object doesn't support item deletion",
                self.type_().name()
            ))),
        }
    }

    /// Python `repr`.
    pub fn py_repr(&self) -> String {
        let mut out = String::new();
        self.repr_into(&mut out, &mut Vec::new());
        out
    }

    /// Python `str`.
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Date(d) => date_isoformat(*d),
            Self::Datetime(dt) => datetime_isoformat(*dt, ' '),
            Self::Time(t) => time_isoformat(*t),
            _ => self.py_repr(),
        }
    }

    fn repr_into(&self, out: &mut String, seen: &mut Vec<*const ()>) {
        match self {
            Self::None => out.push_str("None"),
            Self::Ellipsis => out.push_str("Ellipsis"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(n) => out.push_str(&n.to_string()),
            Self::Float(f) => out.push_str(&py_float_repr(*f)),
            Self::Decimal(d) => {
                out.push_str("Decimal('");
                out.push_str(&d.to_string());
                out.push_str("')");
            }
            Self::Str(s) => out.push_str(&str_repr(s)),
            Self::Bytes(b) => out.push_str(&bytes_repr(b)),
            Self::List(items) => {
                let ptr = Rc::as_ptr(items).cast::<()>();
                if seen.contains(&ptr) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(ptr);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, seen);
                }
                out.push(']');
                seen.pop();
            }
            Self::Tuple(items) => {
                let ptr = Rc::as_ptr(items).cast::<()>();
                if seen.contains(&ptr) {
                    out.push_str("(...)");
                    return;
                }
                seen.push(ptr);
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, seen);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
                seen.pop();
            }
            Self::Set(set) => {
                let borrowed = set.borrow();
                if borrowed.is_empty() {
                    out.push_str("set()");
                    return;
                }
                let ptr = Rc::as_ptr(set).cast::<()>();
                if seen.contains(&ptr) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(ptr);
                out.push('{');
                for (i, key) in borrowed.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.value.repr_into(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Self::Dict(dict) => {
                let ptr = Rc::as_ptr(dict).cast::<()>();
                if seen.contains(&ptr) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(ptr);
                out.push('{');
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.value.repr_into(out, seen);
                    out.push_str(": ");
                    value.repr_into(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Self::Slice(slice) => {
                out.push_str("slice(");
                slice.start.repr_into(out, seen);
                out.push_str(", ");
                slice.stop.repr_into(out, seen);
                out.push_str(", ");
                slice.step.repr_into(out, seen);
                out.push(')');
            }
            Self::Date(d) => out.push_str(&date_repr(*d)),
            Self::Datetime(dt) => out.push_str(&datetime_repr(*dt)),
            Self::Time(t) => out.push_str(&time_repr(*t)),
            Self::Class(ClassKind::Date) => out.push_str("<class 'datetime.date'>"),
            Self::Class(ClassKind::Datetime) => out.push_str("<class 'datetime.datetime'>"),
            Self::MathModule => out.push_str("<module 'math'>"),
            Self::MathFunction(f) => {
                out.push_str("<built-in function ");
                out.push_str(&f.to_string());
                out.push('>');
            }
            Self::Builtin(b) => {
                out.push_str("<built-in function ");
                out.push_str(&b.to_string());
                out.push('>');
            }
            Self::BoundMethod(m) => {
                out.push_str("<built-in method of ");
                out.push_str(m.receiver.type_().name());
                out.push_str(" object>");
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::int(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

/// A hashable dict/set key: the value plus its precomputed hash.
#[derive(Debug, Clone)]
pub struct HashKey {
    pub value: Value,
    hash: u64,
}

impl HashKey {
    /// Fails with `TypeError: unhashable type` for mutable values.
    pub fn new(value: Value) -> RunResult<Self> {
        let hash = py_hash(&value)?;
        Ok(Self { value, hash })
    }
}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.value.py_eq(&other.value)
    }
}

impl Eq for HashKey {}

fn fixed_state() -> ahash::RandomState {
    ahash::RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
}

/// Computes a hash consistent with [`Value::py_eq`]: numerically equal
/// values hash alike regardless of representation.
pub(crate) fn py_hash(value: &Value) -> RunResult<u64> {
    let mut hasher = fixed_state().build_hasher();
    write_hash(value, &mut hasher)?;
    Ok(hasher.finish())
}

fn write_hash<H: Hasher>(value: &Value, hasher: &mut H) -> RunResult<()> {
    match value {
        Value::None => hasher.write_u8(1),
        Value::Ellipsis => hasher.write_u8(2),
        Value::Bool(_) | Value::Int(_) | Value::Decimal(_) => {
            let decimal = to_decimal_exact(value).expect("numeric");
            let (coefficient, exponent) = decimal.normalized();
            hasher.write_u8(3);
            coefficient.hash(hasher);
            hasher.write_i32(exponent);
        }
        Value::Float(f) => {
            if f.is_finite() {
                let decimal = Decimal::try_from_f64(*f).expect("finite");
                let (coefficient, exponent) = decimal.normalized();
                hasher.write_u8(3);
                coefficient.hash(hasher);
                hasher.write_i32(exponent);
            } else {
                hasher.write_u8(4);
                hasher.write_u64(f.to_bits());
            }
        }
        Value::Str(s) => {
            hasher.write_u8(5);
            hasher.write(s.as_bytes());
        }
        Value::Bytes(b) => {
            hasher.write_u8(6);
            hasher.write(b);
        }
        Value::Tuple(items) => {
            hasher.write_u8(7);
            hasher.write_usize(items.len());
            for item in items.iter() {
                hasher.write_u64(py_hash(item)?);
            }
        }
        Value::Date(d) => {
            hasher.write_u8(8);
            d.hash(hasher);
        }
        Value::Datetime(dt) => {
            hasher.write_u8(9);
            dt.hash(hasher);
        }
        Value::Time(t) => {
            hasher.write_u8(10);
            t.hash(hasher);
        }
        Value::Class(kind) => {
            hasher.write_u8(11);
            kind.hash(hasher);
        }
        Value::Builtin(b) => {
            hasher.write_u8(12);
            b.hash(hasher);
        }
        Value::MathFunction(f) => {
            hasher.write_u8(13);
            f.hash(hasher);
        }
        Value::MathModule => hasher.write_u8(14),
        Value::BoundMethod(m) => {
            hasher.write_u8(15);
            m.method.hash(hasher);
        }
        Value::List(_) | Value::Set(_) | Value::Dict(_) | Value::Slice(_) => {
            return Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                value.type_().name()
            )));
        }
    }
    Ok(())
}

/// True for values that take part in numeric arithmetic and comparison.
pub(crate) fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Decimal(_))
}

/// Exact decimal view of a numeric value; `None` for non-finite floats.
pub(crate) fn to_decimal_exact(value: &Value) -> Option<Decimal> {
    match value {
        Value::Bool(b) => Some(Decimal::from_i64(i64::from(*b))),
        Value::Int(n) => Some(Decimal::from_bigint(n.clone())),
        Value::Float(f) => Decimal::try_from_f64(*f).ok(),
        Value::Decimal(d) => Some(d.clone()),
        _ => None,
    }
}

/// Exact ordering between numeric values; `None` when NaN is involved.
pub(crate) fn compare_numeric(a: &Value, b: &Value) -> Option<Ordering> {
    match (to_decimal_exact(a), to_decimal_exact(b)) {
        (Some(da), Some(db)) => Some(da.cmp(&db)),
        // A non-finite float on either side: IEEE comparison decides.
        _ => {
            let fa = a.as_f64()?;
            let fb = b.as_f64()?;
            fa.partial_cmp(&fb)
        }
    }
}

/// Total ordering for `< <= > >=`, `sorted`, `max`/`min`.
pub(crate) fn value_ordering(a: &Value, b: &Value, symbol: &str) -> RunResult<Ordering> {
    if is_numeric(a) && is_numeric(b) {
        return Ok(compare_numeric(a, b).unwrap_or(Ordering::Less));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Ok(x.cmp(y)),
        (Value::Datetime(x), Value::Datetime(y)) => Ok(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            sequence_ordering(&x, &y, symbol)
        }
        (Value::Tuple(x), Value::Tuple(y)) => sequence_ordering(x, y, symbol),
        _ => Err(Exception::type_error(format!(
            "'{symbol}' not supported between instances of '{}' and '{}'",
            a.type_().name(),
            b.type_().name()
        ))),
    }
}

fn sequence_ordering(a: &[Value], b: &[Value], symbol: &str) -> RunResult<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        if !x.py_eq(y) {
            return value_ordering(x, y, symbol);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Like [`sequence_index`], with the host's assignment error message.
fn assignment_index(index: &Value, len: usize) -> RunResult<usize> {
    let i = sequence_index(index, len, "list");
    i.map_err(|e| {
        if e == Exception::index_error("list index out of range") {
            Exception::index_error("list assignment index out of range")
        } else {
            e
        }
    })
}

/// Normalizes a sequence index: negatives count from the end.
fn sequence_index(index: &Value, len: usize, kind: &str) -> RunResult<usize> {
    let Some(i) = index.as_int() else {
        return Err(Exception::type_error(format!(
            "{kind} indices must be integers or slices, not {}",
            index.type_().name()
        )));
    };
    let i = i
        .to_i64()
        .ok_or_else(|| Exception::index_error("cannot fit 'int' into an index-sized integer"))?;
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if i < 0 { i + len } else { i };
    if adjusted < 0 || adjusted >= len {
        return Err(Exception::index_error(format!("{kind} index out of range")));
    }
    Ok(usize::try_from(adjusted).expect("in range"))
}

/// Resolves a slice against a sequence length into concrete indices,
/// following the host's clamping rules.
pub(crate) fn slice_indices(slice: &SliceValue, len: usize) -> RunResult<Vec<usize>> {
    fn bound(value: &Value) -> RunResult<Option<i64>> {
        match value {
            Value::None => Ok(None),
            _ => value
                .as_int()
                .and_then(|n| n.to_i64())
                .map(Some)
                .ok_or_else(|| {
                    Exception::type_error("slice indices must be integers or None or have an __index__ method")
                }),
        }
    }

    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let step = bound(&slice.step)?.unwrap_or(1);
    if step == 0 {
        return Err(Exception::value_error("slice step cannot be zero"));
    }
    let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
    let clamp = |i: i64| -> i64 {
        let i = if i < 0 { i + len } else { i };
        if step > 0 { i.clamp(0, len) } else { i.clamp(-1, len - 1) }
    };
    let start = bound(&slice.start)?.map_or(default_start, clamp);
    let stop = bound(&slice.stop)?.map_or(default_stop, clamp);

    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        indices.push(usize::try_from(i).expect("in range"));
        i += step;
    }
    Ok(indices)
}

/// Python-style `repr` for strings: single quotes preferred, switching to
/// double quotes when the text contains only single quotes.
pub(crate) fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b'");
    for byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b.is_ascii_graphic() || *b == b' ' => out.push(char::from(*b)),
            b => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('\'');
    out
}

/// Shortest float repr in the host's style: `3.0`, `0.1`, `1e+16`, `inf`.
pub(crate) fn py_float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format(f);
    match formatted.find('e') {
        None => formatted.to_string(),
        Some(pos) => {
            // Normalize ryu's exponent form to the host's: a sign is always
            // present and the exponent has at least two digits.
            let (mantissa, exponent) = formatted.split_at(pos);
            let exponent = &exponent[1..];
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            let mantissa = mantissa.strip_suffix(".0").unwrap_or(mantissa);
            format!("{mantissa}e{sign}{digits:0>2}")
        }
    }
}

/// Binary operations owned by the containers rather than the numeric
/// domain: concatenation, repetition, set algebra, dict merge. Returns
/// `None` when the operand kinds don't match any container rule.
pub(crate) fn container_op(
    op: crate::expressions::Operator,
    left: &Value,
    right: &Value,
) -> Option<RunResult<Value>> {
    use crate::expressions::Operator;

    match (op, left, right) {
        (Operator::Add, Value::Str(a), Value::Str(b)) => {
            Some(Ok(Value::Str(format!("{a}{b}").into())))
        }
        (Operator::Add, Value::Bytes(a), Value::Bytes(b)) => {
            let mut bytes = a.to_vec();
            bytes.extend_from_slice(b);
            Some(Ok(Value::Bytes(bytes.into())))
        }
        (Operator::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Some(Ok(Value::list(items)))
        }
        (Operator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Some(Ok(Value::tuple(items)))
        }
        (Operator::Mult, seq, count) | (Operator::Mult, count, seq)
            if matches!(seq, Value::Str(_) | Value::Bytes(_) | Value::List(_) | Value::Tuple(_))
                && count.as_int().is_some() =>
        {
            Some(repeat_sequence(seq, count))
        }
        (Operator::BitAnd | Operator::BitOr | Operator::BitXor | Operator::Sub, Value::Set(a), Value::Set(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            let result: SetValue = match op {
                Operator::BitAnd => a.iter().filter(|key| b.contains(*key)).cloned().collect(),
                Operator::BitOr => a.iter().chain(b.iter()).cloned().collect(),
                Operator::BitXor => a
                    .iter()
                    .filter(|key| !b.contains(*key))
                    .chain(b.iter().filter(|key| !a.contains(*key)))
                    .cloned()
                    .collect(),
                _ => a.iter().filter(|key| !b.contains(*key)).cloned().collect(),
            };
            Some(Ok(Value::Set(Rc::new(RefCell::new(result)))))
        }
        (Operator::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (key, value) in b.borrow().iter() {
                merged.insert(key.clone(), value.clone());
            }
            Some(Ok(Value::Dict(Rc::new(RefCell::new(merged)))))
        }
        _ => None,
    }
}

fn repeat_sequence(seq: &Value, count: &Value) -> RunResult<Value> {
    let count = count
        .as_int()
        .and_then(|n| n.to_i64())
        .ok_or_else(|| Exception::overflow("cannot fit 'int' into an index-sized integer"))?;
    let count = usize::try_from(count.max(0)).expect("non-negative");
    let len = seq.py_len().unwrap_or(0);
    if len.saturating_mul(count) > 100_000_000 {
        return Err(Exception::overflow("repeated sequence is too large"));
    }
    Ok(match seq {
        Value::Str(s) => Value::Str(s.repeat(count).into()),
        Value::Bytes(b) => Value::Bytes(b.repeat(count).into()),
        Value::List(items) => {
            let items = items.borrow();
            let mut result = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                result.extend(items.iter().cloned());
            }
            Value::list(result)
        }
        Value::Tuple(items) => {
            let mut result = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                result.extend(items.iter().cloned());
            }
            Value::tuple(result)
        }
        _ => unreachable!("checked by caller"),
    })
}
