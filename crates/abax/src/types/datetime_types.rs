//! Implementation of the `date`, `datetime` and `time` value types.
//!
//! Backed by chrono's naive types. Constructors validate ranges with
//! CPython's messages; `time` values only arise from `datetime.time()`.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_traits::ToPrimitive;

use crate::{
    args::CallArgs,
    exception::{Exception, RunResult},
    value::Value,
};

// Year bounds matching CPython's datetime module.
const MINYEAR: i32 = 1;
const MAXYEAR: i32 = 9999;

fn int_arg(value: &Value) -> RunResult<i64> {
    value
        .as_int()
        .and_then(|n| n.to_i64())
        .ok_or_else(|| Exception::type_error(format!("an integer is required (got type {})", value.type_().name())))
}

fn checked_year(year: i64) -> RunResult<i32> {
    let year = i32::try_from(year).unwrap_or(-1);
    if (MINYEAR..=MAXYEAR).contains(&year) {
        Ok(year)
    } else {
        Err(Exception::value_error(format!("year {year} is out of range")))
    }
}

fn checked_component(value: i64, name: &str, max: u32) -> RunResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .ok_or_else(|| Exception::value_error(format!("{name} must be in 0..{max}")))
}

fn build_date(year: i64, month: i64, day: i64) -> RunResult<NaiveDate> {
    let year = checked_year(year)?;
    let month = u32::try_from(month)
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| Exception::value_error("month must be in 1..12"))?;
    let day = u32::try_from(day)
        .ok()
        .filter(|d| (1..=31).contains(d))
        .ok_or_else(|| Exception::value_error("day is out of range for month"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Exception::value_error("day is out of range for month"))
}

fn build_time(hour: i64, minute: i64, second: i64, microsecond: i64) -> RunResult<NaiveTime> {
    let hour = checked_component(hour, "hour", 23)?;
    let minute = checked_component(minute, "minute", 59)?;
    let second = checked_component(second, "second", 59)?;
    let microsecond = checked_component(microsecond, "microsecond", 999_999)?;
    NaiveTime::from_hms_micro_opt(hour, minute, second, microsecond)
        .ok_or_else(|| Exception::value_error("invalid time"))
}

/// `date(year, month, day)`
pub(crate) fn date_new(args: CallArgs) -> RunResult<Value> {
    let slots = args.bind("date", &["year", "month", "day"], 3)?;
    let mut parts = [0i64; 3];
    for (part, slot) in parts.iter_mut().zip(&slots) {
        *part = int_arg(slot.as_ref().expect("required"))?;
    }
    Ok(Value::Date(build_date(parts[0], parts[1], parts[2])?))
}

/// `datetime(year, month, day, hour=0, minute=0, second=0, microsecond=0)`
pub(crate) fn datetime_new(args: CallArgs) -> RunResult<Value> {
    let params = ["year", "month", "day", "hour", "minute", "second", "microsecond"];
    let slots = args.bind("datetime", &params, 3)?;
    let mut parts = [0i64; 7];
    for (part, slot) in parts.iter_mut().zip(&slots) {
        if let Some(value) = slot {
            *part = int_arg(value)?;
        }
    }
    let date = build_date(parts[0], parts[1], parts[2])?;
    let time = build_time(parts[3], parts[4], parts[5], parts[6])?;
    Ok(Value::Datetime(date.and_time(time)))
}

pub(crate) fn date_today() -> Value {
    Value::Date(Local::now().date_naive())
}

pub(crate) fn datetime_now() -> Value {
    Value::Datetime(Local::now().naive_local())
}

/// `d.replace(...)` for dates.
pub(crate) fn date_replace(d: NaiveDate, args: CallArgs) -> RunResult<Value> {
    let slots = args.bind("replace", &["year", "month", "day"], 0)?;
    let year = slots[0].as_ref().map_or(Ok(i64::from(d.year())), int_arg)?;
    let month = slots[1].as_ref().map_or(Ok(i64::from(d.month())), int_arg)?;
    let day = slots[2].as_ref().map_or(Ok(i64::from(d.day())), int_arg)?;
    Ok(Value::Date(build_date(year, month, day)?))
}

/// `dt.replace(...)` for datetimes.
pub(crate) fn datetime_replace(dt: NaiveDateTime, args: CallArgs) -> RunResult<Value> {
    let params = ["year", "month", "day", "hour", "minute", "second", "microsecond"];
    let slots = args.bind("replace", &params, 0)?;
    let current = [
        i64::from(dt.year()),
        i64::from(dt.month()),
        i64::from(dt.day()),
        i64::from(dt.hour()),
        i64::from(dt.minute()),
        i64::from(dt.second()),
        i64::from(dt.nanosecond() / 1000),
    ];
    let mut parts = current;
    for (part, slot) in parts.iter_mut().zip(&slots) {
        if let Some(value) = slot {
            *part = int_arg(value)?;
        }
    }
    let date = build_date(parts[0], parts[1], parts[2])?;
    let time = build_time(parts[3], parts[4], parts[5], parts[6])?;
    Ok(Value::Datetime(date.and_time(time)))
}

/// `t.replace(...)` for times.
pub(crate) fn time_replace(t: NaiveTime, args: CallArgs) -> RunResult<Value> {
    let params = ["hour", "minute", "second", "microsecond"];
    let slots = args.bind("replace", &params, 0)?;
    let current = [
        i64::from(t.hour()),
        i64::from(t.minute()),
        i64::from(t.second()),
        i64::from(t.nanosecond() / 1000),
    ];
    let mut parts = current;
    for (part, slot) in parts.iter_mut().zip(&slots) {
        if let Some(value) = slot {
            *part = int_arg(value)?;
        }
    }
    Ok(Value::Time(build_time(parts[0], parts[1], parts[2], parts[3])?))
}

pub(crate) fn date_isoformat(d: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())
}

pub(crate) fn time_isoformat(t: NaiveTime) -> String {
    let micro = t.nanosecond() / 1000;
    if micro == 0 {
        format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())
    } else {
        format!("{:02}:{:02}:{:02}.{micro:06}", t.hour(), t.minute(), t.second())
    }
}

pub(crate) fn datetime_isoformat(dt: NaiveDateTime, sep: char) -> String {
    format!("{}{sep}{}", date_isoformat(dt.date()), time_isoformat(dt.time()))
}

pub(crate) fn date_repr(d: NaiveDate) -> String {
    format!("datetime.date({}, {}, {})", d.year(), d.month(), d.day())
}

pub(crate) fn datetime_repr(dt: NaiveDateTime) -> String {
    let micro = dt.nanosecond() / 1000;
    let mut out = format!(
        "datetime.datetime({}, {}, {}, {}, {}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute()
    );
    if dt.second() != 0 || micro != 0 {
        out.push_str(&format!(", {}", dt.second()));
    }
    if micro != 0 {
        out.push_str(&format!(", {micro}"));
    }
    out.push(')');
    out
}

pub(crate) fn time_repr(t: NaiveTime) -> String {
    let micro = t.nanosecond() / 1000;
    let mut out = format!("datetime.time({}, {}", t.hour(), t.minute());
    if t.second() != 0 || micro != 0 {
        out.push_str(&format!(", {}", t.second()));
    }
    if micro != 0 {
        out.push_str(&format!(", {micro}"));
    }
    out.push(')');
    out
}

/// strftime via chrono's formatter; an invalid directive surfaces as
/// `ValueError` instead of a panic.
pub(crate) fn strftime(format_args: CallArgs, format_target: StrftimeTarget) -> RunResult<Value> {
    use std::fmt::Write;

    let format = format_args.exactly_one("strftime")?;
    let Value::Str(format) = format else {
        return Err(Exception::type_error(format!(
            "strftime() argument must be str, not {}",
            format.type_().name()
        )));
    };
    let mut out = String::new();
    let result = match format_target {
        StrftimeTarget::Date(d) => write!(out, "{}", d.format(&format)),
        StrftimeTarget::Datetime(dt) => write!(out, "{}", dt.format(&format)),
        StrftimeTarget::Time(t) => write!(out, "{}", t.format(&format)),
    };
    result.map_err(|_| Exception::value_error("Invalid format string"))?;
    Ok(Value::Str(out.into()))
}

/// What `strftime` is being applied to.
pub(crate) enum StrftimeTarget {
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Time(NaiveTime),
}
