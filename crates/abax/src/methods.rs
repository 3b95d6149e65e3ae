//! Per-type attribute resolution and bound-method dispatch.
//!
//! [`resolve_attr`] turns a permitted attribute read into a value: a data
//! attribute (date components, math constants) or a [`Method`] bound to
//! its receiver. [`call_method`] executes bound methods. Mutating methods
//! work through the shared containers, so `l.append(x)` is visible through
//! every alias of `l`.

use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use chrono::{Datelike, Timelike};
use num_traits::ToPrimitive;

use crate::{
    args::CallArgs,
    exception::{Exception, RunResult},
    fstring,
    modules::math,
    types::datetime_types::{
        self, StrftimeTarget, date_isoformat, datetime_isoformat, time_isoformat,
    },
    value::{BoundMethod, ClassKind, HashKey, SetValue, Value},
};

/// Identity of a bound method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    StrFormat,
    StrUpper,
    StrLower,
    StrStrip,
    StrLstrip,
    StrRstrip,
    StrSplit,
    StrRsplit,
    StrJoin,
    StrReplace,
    StrStartswith,
    StrEndswith,
    StrFind,
    StrCount,
    ListAppend,
    ListExtend,
    ListInsert,
    ListRemove,
    ListPop,
    ListClear,
    ListIndex,
    ListCount,
    ListReverse,
    ListSort,
    ListCopy,
    TupleCount,
    TupleIndex,
    DictGet,
    DictKeys,
    DictValues,
    DictItems,
    DictPop,
    DictUpdate,
    DictClear,
    DictCopy,
    DictSetdefault,
    SetAdd,
    SetDiscard,
    SetRemove,
    SetUnion,
    SetIntersection,
    SetDifference,
    SetSymmetricDifference,
    SetIssubset,
    SetIssuperset,
    SetClear,
    SetCopy,
    DateWeekday,
    DateIsoweekday,
    DateIsoformat,
    DateReplace,
    DateStrftime,
    DatetimeDate,
    DatetimeTime,
    DatetimeWeekday,
    DatetimeIsoweekday,
    DatetimeIsoformat,
    DatetimeReplace,
    DatetimeStrftime,
    TimeIsoformat,
    TimeReplace,
    DateClassToday,
    DatetimeClassNow,
    DatetimeClassToday,
}

fn bound(receiver: &Value, method: Method) -> Value {
    Value::BoundMethod(Rc::new(BoundMethod {
        receiver: receiver.clone(),
        method,
    }))
}

/// Resolves a permitted attribute read to a value. `None` means the name
/// passed the filter but has no implementation, which surfaces as an
/// `AttributeError`.
pub(crate) fn resolve_attr(value: &Value, name: &str) -> Option<Value> {
    let method = match (value, name) {
        (Value::MathModule, _) => return math::attr(name),
        (Value::Date(d), "year") => return Some(Value::int(i64::from(d.year()))),
        (Value::Date(d), "month") => return Some(Value::int(i64::from(d.month()))),
        (Value::Date(d), "day") => return Some(Value::int(i64::from(d.day()))),
        (Value::Datetime(dt), "year") => return Some(Value::int(i64::from(dt.year()))),
        (Value::Datetime(dt), "month") => return Some(Value::int(i64::from(dt.month()))),
        (Value::Datetime(dt), "day") => return Some(Value::int(i64::from(dt.day()))),
        (Value::Datetime(dt), "hour") => return Some(Value::int(i64::from(dt.hour()))),
        (Value::Datetime(dt), "minute") => return Some(Value::int(i64::from(dt.minute()))),
        (Value::Datetime(dt), "second") => return Some(Value::int(i64::from(dt.second()))),
        (Value::Datetime(dt), "microsecond") => {
            return Some(Value::int(i64::from(dt.nanosecond() / 1000)));
        }
        (Value::Time(t), "hour") => return Some(Value::int(i64::from(t.hour()))),
        (Value::Time(t), "minute") => return Some(Value::int(i64::from(t.minute()))),
        (Value::Time(t), "second") => return Some(Value::int(i64::from(t.second()))),
        (Value::Time(t), "microsecond") => return Some(Value::int(i64::from(t.nanosecond() / 1000))),

        (Value::Str(_), "format") => Method::StrFormat,
        (Value::Str(_), "upper") => Method::StrUpper,
        (Value::Str(_), "lower") => Method::StrLower,
        (Value::Str(_), "strip") => Method::StrStrip,
        (Value::Str(_), "lstrip") => Method::StrLstrip,
        (Value::Str(_), "rstrip") => Method::StrRstrip,
        (Value::Str(_), "split") => Method::StrSplit,
        (Value::Str(_), "rsplit") => Method::StrRsplit,
        (Value::Str(_), "join") => Method::StrJoin,
        (Value::Str(_), "replace") => Method::StrReplace,
        (Value::Str(_), "startswith") => Method::StrStartswith,
        (Value::Str(_), "endswith") => Method::StrEndswith,
        (Value::Str(_), "find") => Method::StrFind,
        (Value::Str(_), "count") => Method::StrCount,

        (Value::List(_), "append") => Method::ListAppend,
        (Value::List(_), "extend") => Method::ListExtend,
        (Value::List(_), "insert") => Method::ListInsert,
        (Value::List(_), "remove") => Method::ListRemove,
        (Value::List(_), "pop") => Method::ListPop,
        (Value::List(_), "clear") => Method::ListClear,
        (Value::List(_), "index") => Method::ListIndex,
        (Value::List(_), "count") => Method::ListCount,
        (Value::List(_), "reverse") => Method::ListReverse,
        (Value::List(_), "sort") => Method::ListSort,
        (Value::List(_), "copy") => Method::ListCopy,

        (Value::Tuple(_), "count") => Method::TupleCount,
        (Value::Tuple(_), "index") => Method::TupleIndex,

        (Value::Dict(_), "get") => Method::DictGet,
        (Value::Dict(_), "keys") => Method::DictKeys,
        (Value::Dict(_), "values") => Method::DictValues,
        (Value::Dict(_), "items") => Method::DictItems,
        (Value::Dict(_), "pop") => Method::DictPop,
        (Value::Dict(_), "update") => Method::DictUpdate,
        (Value::Dict(_), "clear") => Method::DictClear,
        (Value::Dict(_), "copy") => Method::DictCopy,
        (Value::Dict(_), "setdefault") => Method::DictSetdefault,

        (Value::Set(_), "add") => Method::SetAdd,
        (Value::Set(_), "discard") => Method::SetDiscard,
        (Value::Set(_), "remove") => Method::SetRemove,
        (Value::Set(_), "union") => Method::SetUnion,
        (Value::Set(_), "intersection") => Method::SetIntersection,
        (Value::Set(_), "difference") => Method::SetDifference,
        (Value::Set(_), "symmetric_difference") => Method::SetSymmetricDifference,
        (Value::Set(_), "issubset") => Method::SetIssubset,
        (Value::Set(_), "issuperset") => Method::SetIssuperset,
        (Value::Set(_), "clear") => Method::SetClear,
        (Value::Set(_), "copy") => Method::SetCopy,

        (Value::Date(_), "weekday") => Method::DateWeekday,
        (Value::Date(_), "isoweekday") => Method::DateIsoweekday,
        (Value::Date(_), "isoformat") => Method::DateIsoformat,
        (Value::Date(_), "replace") => Method::DateReplace,
        (Value::Date(_), "strftime") => Method::DateStrftime,

        (Value::Datetime(_), "date") => Method::DatetimeDate,
        (Value::Datetime(_), "time") => Method::DatetimeTime,
        (Value::Datetime(_), "weekday") => Method::DatetimeWeekday,
        (Value::Datetime(_), "isoweekday") => Method::DatetimeIsoweekday,
        (Value::Datetime(_), "isoformat") => Method::DatetimeIsoformat,
        (Value::Datetime(_), "replace") => Method::DatetimeReplace,
        (Value::Datetime(_), "strftime") => Method::DatetimeStrftime,

        (Value::Time(_), "isoformat") => Method::TimeIsoformat,
        (Value::Time(_), "replace") => Method::TimeReplace,

        (Value::Class(ClassKind::Date), "today") => Method::DateClassToday,
        (Value::Class(ClassKind::Datetime), "now") => Method::DatetimeClassNow,
        (Value::Class(ClassKind::Datetime), "today") => Method::DatetimeClassToday,

        _ => return None,
    };
    Some(bound(value, method))
}

pub(crate) fn call_method(receiver: &Value, method: Method, args: CallArgs) -> RunResult<Value> {
    match method {
        Method::StrFormat
        | Method::StrUpper
        | Method::StrLower
        | Method::StrStrip
        | Method::StrLstrip
        | Method::StrRstrip
        | Method::StrSplit
        | Method::StrRsplit
        | Method::StrJoin
        | Method::StrReplace
        | Method::StrStartswith
        | Method::StrEndswith
        | Method::StrFind
        | Method::StrCount => {
            let Value::Str(s) = receiver else {
                unreachable!("bound to str")
            };
            str_method(s, method, args)
        }
        Method::ListAppend
        | Method::ListExtend
        | Method::ListInsert
        | Method::ListRemove
        | Method::ListPop
        | Method::ListClear
        | Method::ListIndex
        | Method::ListCount
        | Method::ListReverse
        | Method::ListSort
        | Method::ListCopy => {
            let Value::List(items) = receiver else {
                unreachable!("bound to list")
            };
            list_method(items, method, args)
        }
        Method::TupleCount | Method::TupleIndex => {
            let Value::Tuple(items) = receiver else {
                unreachable!("bound to tuple")
            };
            tuple_method(items, method, args)
        }
        Method::DictGet
        | Method::DictKeys
        | Method::DictValues
        | Method::DictItems
        | Method::DictPop
        | Method::DictUpdate
        | Method::DictClear
        | Method::DictCopy
        | Method::DictSetdefault => {
            let Value::Dict(dict) = receiver else {
                unreachable!("bound to dict")
            };
            dict_method(dict, method, args)
        }
        Method::SetAdd
        | Method::SetDiscard
        | Method::SetRemove
        | Method::SetUnion
        | Method::SetIntersection
        | Method::SetDifference
        | Method::SetSymmetricDifference
        | Method::SetIssubset
        | Method::SetIssuperset
        | Method::SetClear
        | Method::SetCopy => {
            let Value::Set(set) = receiver else {
                unreachable!("bound to set")
            };
            set_method(set, method, args)
        }
        Method::DateWeekday | Method::DatetimeWeekday => {
            args.exactly_none("weekday")?;
            Ok(Value::int(i64::from(weekday_of(receiver).num_days_from_monday())))
        }
        Method::DateIsoweekday | Method::DatetimeIsoweekday => {
            args.exactly_none("isoweekday")?;
            Ok(Value::int(i64::from(weekday_of(receiver).num_days_from_monday()) + 1))
        }
        Method::DateIsoformat => {
            args.exactly_none("isoformat")?;
            let Value::Date(d) = receiver else {
                unreachable!("bound to date")
            };
            Ok(Value::Str(date_isoformat(*d).into()))
        }
        Method::DatetimeIsoformat => {
            args.exactly_none("isoformat")?;
            let Value::Datetime(dt) = receiver else {
                unreachable!("bound to datetime")
            };
            Ok(Value::Str(datetime_isoformat(*dt, 'T').into()))
        }
        Method::TimeIsoformat => {
            args.exactly_none("isoformat")?;
            let Value::Time(t) = receiver else {
                unreachable!("bound to time")
            };
            Ok(Value::Str(time_isoformat(*t).into()))
        }
        Method::DateReplace => {
            let Value::Date(d) = receiver else {
                unreachable!("bound to date")
            };
            datetime_types::date_replace(*d, args)
        }
        Method::DatetimeReplace => {
            let Value::Datetime(dt) = receiver else {
                unreachable!("bound to datetime")
            };
            datetime_types::datetime_replace(*dt, args)
        }
        Method::TimeReplace => {
            let Value::Time(t) = receiver else {
                unreachable!("bound to time")
            };
            datetime_types::time_replace(*t, args)
        }
        Method::DateStrftime => {
            let Value::Date(d) = receiver else {
                unreachable!("bound to date")
            };
            datetime_types::strftime(args, StrftimeTarget::Date(*d))
        }
        Method::DatetimeStrftime => {
            let Value::Datetime(dt) = receiver else {
                unreachable!("bound to datetime")
            };
            datetime_types::strftime(args, StrftimeTarget::Datetime(*dt))
        }
        Method::DatetimeDate => {
            args.exactly_none("date")?;
            let Value::Datetime(dt) = receiver else {
                unreachable!("bound to datetime")
            };
            Ok(Value::Date(dt.date()))
        }
        Method::DatetimeTime => {
            args.exactly_none("time")?;
            let Value::Datetime(dt) = receiver else {
                unreachable!("bound to datetime")
            };
            Ok(Value::Time(dt.time()))
        }
        Method::DateClassToday | Method::DatetimeClassToday => {
            args.exactly_none("today")?;
            match method {
                Method::DateClassToday => Ok(datetime_types::date_today()),
                _ => Ok(datetime_types::datetime_now()),
            }
        }
        Method::DatetimeClassNow => {
            args.exactly_none("now")?;
            Ok(datetime_types::datetime_now())
        }
    }
}

fn weekday_of(receiver: &Value) -> chrono::Weekday {
    match receiver {
        Value::Date(d) => d.weekday(),
        Value::Datetime(dt) => dt.weekday(),
        _ => unreachable!("bound to a date-like value"),
    }
}

fn expect_str(value: &Value, what: &str) -> RunResult<Rc<str>> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(Exception::type_error(format!(
            "{what} must be str, not {}",
            value.type_().name()
        ))),
    }
}

fn str_method(s: &Rc<str>, method: Method, args: CallArgs) -> RunResult<Value> {
    match method {
        Method::StrFormat => {
            let kwargs: Vec<(String, Value)> = args.keywords;
            Ok(Value::Str(fstring::str_format(s, &args.positional, &kwargs)?.into()))
        }
        Method::StrUpper => {
            args.exactly_none("upper")?;
            Ok(Value::Str(s.to_uppercase().into()))
        }
        Method::StrLower => {
            args.exactly_none("lower")?;
            Ok(Value::Str(s.to_lowercase().into()))
        }
        Method::StrStrip | Method::StrLstrip | Method::StrRstrip => {
            let name = match method {
                Method::StrStrip => "strip",
                Method::StrLstrip => "lstrip",
                _ => "rstrip",
            };
            let chars: Option<Vec<char>> = match args.at_most_one(name)? {
                None | Some(Value::None) => None,
                Some(value) => Some(expect_str(&value, "strip arg")?.chars().collect()),
            };
            let matches = |c: char| match &chars {
                None => c.is_whitespace(),
                Some(set) => set.contains(&c),
            };
            let stripped = match method {
                Method::StrStrip => s.trim_matches(matches),
                Method::StrLstrip => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Ok(Value::Str(stripped.into()))
        }
        Method::StrSplit | Method::StrRsplit => {
            let name = if method == Method::StrSplit { "split" } else { "rsplit" };
            let slots = args.bind(name, &["sep", "maxsplit"], 0)?;
            let maxsplit = match &slots[1] {
                None | Some(Value::None) => -1,
                Some(value) => value
                    .as_int()
                    .and_then(|n| n.to_i64())
                    .ok_or_else(|| Exception::type_error("maxsplit must be an integer"))?,
            };
            let from_right = method == Method::StrRsplit;
            let parts: Vec<String> = match &slots[0] {
                None | Some(Value::None) => whitespace_split(s, maxsplit, from_right),
                Some(value) => {
                    let sep = expect_str(value, "sep")?;
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    separator_split(s, &sep, maxsplit, from_right)
                }
            };
            Ok(Value::list(parts.into_iter().map(Value::from).collect()))
        }
        Method::StrJoin => {
            let iterable = args.exactly_one("join")?;
            let mut parts = Vec::new();
            for (index, item) in iterable.iterate()?.into_iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part.to_string()),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {index}: expected str instance, {} found",
                            other.type_().name()
                        )));
                    }
                }
            }
            Ok(Value::Str(parts.join(s).into()))
        }
        Method::StrReplace => {
            let slots = args.bind("replace", &["old", "new", "count"], 2)?;
            let old = expect_str(slots[0].as_ref().expect("required"), "replace arg")?;
            let new = expect_str(slots[1].as_ref().expect("required"), "replace arg")?;
            let count = match &slots[2] {
                None | Some(Value::None) => -1,
                Some(value) => value
                    .as_int()
                    .and_then(|n| n.to_i64())
                    .ok_or_else(|| Exception::type_error("count must be an integer"))?,
            };
            let replaced = if count < 0 {
                s.replace(old.as_ref(), &new)
            } else {
                s.replacen(old.as_ref(), &new, usize::try_from(count).expect("non-negative"))
            };
            Ok(Value::Str(replaced.into()))
        }
        Method::StrStartswith | Method::StrEndswith => {
            let name = if method == Method::StrStartswith { "startswith" } else { "endswith" };
            let needle = args.exactly_one(name)?;
            let probes: Vec<Rc<str>> = match &needle {
                Value::Tuple(items) => items
                    .iter()
                    .map(|item| expect_str(item, "a str or tuple of str"))
                    .collect::<RunResult<_>>()?,
                other => vec![expect_str(other, "a str or tuple of str")?],
            };
            let hit = probes.iter().any(|probe| {
                if method == Method::StrStartswith {
                    s.starts_with(probe.as_ref())
                } else {
                    s.ends_with(probe.as_ref())
                }
            });
            Ok(Value::Bool(hit))
        }
        Method::StrFind => {
            let needle = args.exactly_one("find")?;
            let needle = expect_str(&needle, "find arg")?;
            match s.find(needle.as_ref()) {
                Some(byte_index) => Ok(Value::int(
                    i64::try_from(s[..byte_index].chars().count()).expect("fits"),
                )),
                None => Ok(Value::int(-1)),
            }
        }
        Method::StrCount => {
            let needle = args.exactly_one("count")?;
            let needle = expect_str(&needle, "count arg")?;
            if needle.is_empty() {
                return Ok(Value::int(i64::try_from(s.chars().count() + 1).expect("fits")));
            }
            let mut count = 0i64;
            let mut rest: &str = s;
            while let Some(pos) = rest.find(needle.as_ref()) {
                count += 1;
                rest = &rest[pos + needle.len()..];
            }
            Ok(Value::int(count))
        }
        _ => unreachable!("not a str method"),
    }
}

fn separator_split(s: &str, sep: &str, maxsplit: i64, from_right: bool) -> Vec<String> {
    if maxsplit < 0 {
        return s.split(sep).map(str::to_string).collect();
    }
    let max_parts = usize::try_from(maxsplit).expect("non-negative") + 1;
    if from_right {
        let mut parts: Vec<String> = s.rsplitn(max_parts, sep).map(str::to_string).collect();
        parts.reverse();
        parts
    } else {
        s.splitn(max_parts, sep).map(str::to_string).collect()
    }
}

/// Whitespace splitting: runs of whitespace separate, leading/trailing
/// whitespace never produces empty parts, and the unsplit remainder is
/// kept verbatim when maxsplit runs out.
fn whitespace_split(s: &str, maxsplit: i64, from_right: bool) -> Vec<String> {
    if maxsplit < 0 {
        return s.split_whitespace().map(str::to_string).collect();
    }
    let mut splits_left = usize::try_from(maxsplit).expect("non-negative");
    let mut parts = Vec::new();
    if from_right {
        let mut rest = s.trim_end();
        while !rest.is_empty() {
            if splits_left == 0 {
                parts.push(rest.trim_start().to_string());
                break;
            }
            match rest.rfind(char::is_whitespace) {
                Some(pos) => {
                    let (head, tail) = rest.split_at(pos + 1);
                    if !tail.is_empty() {
                        parts.push(tail.to_string());
                        splits_left -= 1;
                    }
                    rest = head.trim_end();
                }
                None => {
                    parts.push(rest.to_string());
                    break;
                }
            }
        }
        parts.reverse();
    } else {
        let mut rest = s.trim_start();
        while !rest.is_empty() {
            if splits_left == 0 {
                parts.push(rest.trim_end().to_string());
                break;
            }
            match rest.find(char::is_whitespace) {
                Some(pos) => {
                    let (head, tail) = rest.split_at(pos);
                    parts.push(head.to_string());
                    splits_left -= 1;
                    rest = tail.trim_start();
                }
                None => {
                    parts.push(rest.to_string());
                    break;
                }
            }
        }
    }
    parts
}

fn list_method(items: &Rc<RefCell<Vec<Value>>>, method: Method, args: CallArgs) -> RunResult<Value> {
    match method {
        Method::ListAppend => {
            let value = args.exactly_one("append")?;
            items.borrow_mut().push(value);
            Ok(Value::None)
        }
        Method::ListExtend => {
            let value = args.exactly_one("extend")?;
            let added = value.iterate()?;
            items.borrow_mut().extend(added);
            Ok(Value::None)
        }
        Method::ListInsert => {
            let slots = args.bind("insert", &["index", "object"], 2)?;
            let index = slots[0]
                .as_ref()
                .expect("required")
                .as_int()
                .and_then(|n| n.to_i64())
                .ok_or_else(|| Exception::type_error("'index' requires an integer"))?;
            let value = slots[1].clone().expect("required");
            let mut items = items.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(usize::try_from(position).expect("clamped"), value);
            Ok(Value::None)
        }
        Method::ListRemove => {
            let value = args.exactly_one("remove")?;
            let mut items = items.borrow_mut();
            match items.iter().position(|item| item.py_eq(&value)) {
                Some(position) => {
                    items.remove(position);
                    Ok(Value::None)
                }
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }
        Method::ListPop => {
            let index = match args.at_most_one("pop")? {
                None => -1,
                Some(value) => value
                    .as_int()
                    .and_then(|n| n.to_i64())
                    .ok_or_else(|| Exception::type_error("'index' requires an integer"))?,
            };
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }
            let len = i64::try_from(items.len()).expect("fits");
            let position = if index < 0 { index + len } else { index };
            if position < 0 || position >= len {
                return Err(Exception::index_error("pop index out of range"));
            }
            Ok(items.remove(usize::try_from(position).expect("in range")))
        }
        Method::ListClear => {
            args.exactly_none("clear")?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        Method::ListIndex => {
            let value = args.exactly_one("index")?;
            let items = items.borrow();
            items
                .iter()
                .position(|item| item.py_eq(&value))
                .map(|position| Value::int(i64::try_from(position).expect("fits")))
                .ok_or_else(|| Exception::value_error(format!("{} is not in list", value.py_repr())))
        }
        Method::ListCount => {
            let value = args.exactly_one("count")?;
            let count = items.borrow().iter().filter(|item| item.py_eq(&value)).count();
            Ok(Value::int(i64::try_from(count).expect("fits")))
        }
        Method::ListReverse => {
            args.exactly_none("reverse")?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        Method::ListSort => {
            let slots = args.bind("sort", &["reverse"], 0)?;
            let descending = slots[0].as_ref().is_some_and(Value::py_bool);
            let mut sorted = items.borrow().clone();
            let mut error = None;
            sorted.sort_by(|a, b| match crate::value::value_ordering(a, b, "<") {
                Ok(ordering) => ordering,
                Err(e) => {
                    error.get_or_insert(e);
                    Ordering::Equal
                }
            });
            if let Some(error) = error {
                return Err(error);
            }
            if descending {
                sorted.reverse();
            }
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        Method::ListCopy => {
            args.exactly_none("copy")?;
            Ok(Value::list(items.borrow().clone()))
        }
        _ => unreachable!("not a list method"),
    }
}

fn tuple_method(items: &Rc<Vec<Value>>, method: Method, args: CallArgs) -> RunResult<Value> {
    match method {
        Method::TupleCount => {
            let value = args.exactly_one("count")?;
            let count = items.iter().filter(|item| item.py_eq(&value)).count();
            Ok(Value::int(i64::try_from(count).expect("fits")))
        }
        Method::TupleIndex => {
            let value = args.exactly_one("index")?;
            items
                .iter()
                .position(|item| item.py_eq(&value))
                .map(|position| Value::int(i64::try_from(position).expect("fits")))
                .ok_or_else(|| Exception::value_error("tuple.index(x): x not in tuple"))
        }
        _ => unreachable!("not a tuple method"),
    }
}

fn dict_method(
    dict: &Rc<RefCell<crate::value::DictValue>>,
    method: Method,
    args: CallArgs,
) -> RunResult<Value> {
    match method {
        Method::DictGet => {
            let slots = args.bind("get", &["key", "default"], 1)?;
            let key = HashKey::new(slots[0].clone().expect("required"))?;
            let fallback = slots[1].clone().unwrap_or(Value::None);
            Ok(dict.borrow().get(&key).cloned().unwrap_or(fallback))
        }
        Method::DictKeys => {
            args.exactly_none("keys")?;
            Ok(Value::list(dict.borrow().keys().map(|key| key.value.clone()).collect()))
        }
        Method::DictValues => {
            args.exactly_none("values")?;
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }
        Method::DictItems => {
            args.exactly_none("items")?;
            Ok(Value::list(
                dict.borrow()
                    .iter()
                    .map(|(key, value)| Value::tuple(vec![key.value.clone(), value.clone()]))
                    .collect(),
            ))
        }
        Method::DictPop => {
            let slots = args.bind("pop", &["key", "default"], 1)?;
            let key_value = slots[0].clone().expect("required");
            let key = HashKey::new(key_value.clone())?;
            match dict.borrow_mut().shift_remove(&key) {
                Some(value) => Ok(value),
                None => slots[1]
                    .clone()
                    .ok_or_else(|| Exception::key_error(key_value.py_repr())),
            }
        }
        Method::DictUpdate => {
            let source = args.exactly_one("update")?;
            let Value::Dict(other) = &source else {
                return Err(Exception::type_error(format!(
                    "update argument must be dict, not {}",
                    source.type_().name()
                )));
            };
            let additions: Vec<_> = other
                .borrow()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            dict.borrow_mut().extend(additions);
            Ok(Value::None)
        }
        Method::DictClear => {
            args.exactly_none("clear")?;
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        Method::DictCopy => {
            args.exactly_none("copy")?;
            let copied = dict.borrow().clone();
            Ok(Value::Dict(Rc::new(RefCell::new(copied))))
        }
        Method::DictSetdefault => {
            let slots = args.bind("setdefault", &["key", "default"], 1)?;
            let key = HashKey::new(slots[0].clone().expect("required"))?;
            let fallback = slots[1].clone().unwrap_or(Value::None);
            let mut dict = dict.borrow_mut();
            Ok(dict.entry(key).or_insert(fallback).clone())
        }
        _ => unreachable!("not a dict method"),
    }
}

fn keys_of(value: &Value) -> RunResult<Vec<HashKey>> {
    value.iterate()?.into_iter().map(HashKey::new).collect()
}

fn set_method(set: &Rc<RefCell<SetValue>>, method: Method, args: CallArgs) -> RunResult<Value> {
    match method {
        Method::SetAdd => {
            let value = args.exactly_one("add")?;
            set.borrow_mut().insert(HashKey::new(value)?);
            Ok(Value::None)
        }
        Method::SetDiscard => {
            let value = args.exactly_one("discard")?;
            set.borrow_mut().shift_remove(&HashKey::new(value)?);
            Ok(Value::None)
        }
        Method::SetRemove => {
            let value = args.exactly_one("remove")?;
            let key = HashKey::new(value.clone())?;
            if set.borrow_mut().shift_remove(&key) {
                Ok(Value::None)
            } else {
                Err(Exception::key_error(value.py_repr()))
            }
        }
        Method::SetUnion | Method::SetIntersection | Method::SetDifference | Method::SetSymmetricDifference => {
            let name = match method {
                Method::SetUnion => "union",
                Method::SetIntersection => "intersection",
                Method::SetDifference => "difference",
                _ => "symmetric_difference",
            };
            let other = keys_of(&args.exactly_one(name)?)?;
            let current = set.borrow();
            let result: SetValue = match method {
                Method::SetUnion => current.iter().cloned().chain(other).collect(),
                Method::SetIntersection => current
                    .iter()
                    .filter(|key| other.contains(key))
                    .cloned()
                    .collect(),
                Method::SetDifference => current
                    .iter()
                    .filter(|key| !other.contains(key))
                    .cloned()
                    .collect(),
                _ => {
                    let mut result: SetValue =
                        current.iter().filter(|key| !other.contains(key)).cloned().collect();
                    for key in other {
                        if !current.contains(&key) {
                            result.insert(key);
                        }
                    }
                    result
                }
            };
            Ok(Value::Set(Rc::new(RefCell::new(result))))
        }
        Method::SetIssubset => {
            let other = keys_of(&args.exactly_one("issubset")?)?;
            let hit = set.borrow().iter().all(|key| other.contains(key));
            Ok(Value::Bool(hit))
        }
        Method::SetIssuperset => {
            let other = keys_of(&args.exactly_one("issuperset")?)?;
            let current = set.borrow();
            Ok(Value::Bool(other.iter().all(|key| current.contains(key))))
        }
        Method::SetClear => {
            args.exactly_none("clear")?;
            set.borrow_mut().clear();
            Ok(Value::None)
        }
        Method::SetCopy => {
            args.exactly_none("copy")?;
            let copied = set.borrow().clone();
            Ok(Value::Set(Rc::new(RefCell::new(copied))))
        }
        _ => unreachable!("not a set method"),
    }
}
