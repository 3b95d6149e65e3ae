//! The attribute filter.
//!
//! Attribute reads are permitted iff the name is on the per-type
//! allow-list; names shaped like dunders are always denied before the
//! per-type lookup, and types with no entry deny everything. Attribute
//! writes and deletes never get this far — they are denied as assignment
//! targets.
//!
//! The default policy covers the shipped surface; [`AttributePolicy::permit`]
//! is the registration API for callers that bind their own objects.

use ahash::{AHashMap, AHashSet};

use crate::{
    exception::{Exception, RunResult},
    value::{Type, Value},
};

/// Per-type attribute allow-lists with a global dunder ban.
#[derive(Debug, Clone)]
pub struct AttributePolicy {
    allowed: AHashMap<Type, AHashSet<&'static str>>,
}

impl AttributePolicy {
    /// A policy that denies every attribute read.
    pub fn deny_all() -> Self {
        Self {
            allowed: AHashMap::new(),
        }
    }

    /// Registers permitted attribute names for a type.
    pub fn permit(&mut self, type_: Type, names: impl IntoIterator<Item = &'static str>) {
        self.allowed.entry(type_).or_default().extend(names);
    }

    /// Checks an attribute read of `name` against `value`'s type.
    pub fn check(&self, value: &Value, name: &str) -> RunResult<()> {
        if is_dunder(name) {
            return Err(denial(name));
        }
        let permitted = self
            .allowed
            .get(&value.type_())
            .is_some_and(|names| names.contains(name));
        if permitted { Ok(()) } else { Err(denial(name)) }
    }
}

fn denial(name: &str) -> Exception {
    Exception::bad_syntax(format!("You can not access `{name}` attribute"))
}

fn is_dunder(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__")
}

impl Default for AttributePolicy {
    /// The shipped surface: container and string methods, date/datetime
    /// components, and the math module's functions and constants.
    fn default() -> Self {
        let mut policy = Self::deny_all();
        policy.permit(
            Type::Str,
            [
                "format",
                "upper",
                "lower",
                "strip",
                "lstrip",
                "rstrip",
                "split",
                "rsplit",
                "join",
                "replace",
                "startswith",
                "endswith",
                "find",
                "count",
            ],
        );
        policy.permit(
            Type::List,
            [
                "append", "extend", "insert", "remove", "pop", "clear", "index", "count", "reverse", "sort", "copy",
            ],
        );
        policy.permit(Type::Tuple, ["count", "index"]);
        policy.permit(
            Type::Dict,
            ["get", "keys", "values", "items", "pop", "update", "clear", "copy", "setdefault"],
        );
        policy.permit(
            Type::Set,
            [
                "add",
                "discard",
                "remove",
                "union",
                "intersection",
                "difference",
                "symmetric_difference",
                "issubset",
                "issuperset",
                "clear",
                "copy",
            ],
        );
        policy.permit(
            Type::Date,
            ["year", "month", "day", "weekday", "isoweekday", "isoformat", "replace", "strftime"],
        );
        policy.permit(
            Type::Datetime,
            [
                "year",
                "month",
                "day",
                "hour",
                "minute",
                "second",
                "microsecond",
                "date",
                "time",
                "weekday",
                "isoweekday",
                "isoformat",
                "replace",
                "strftime",
            ],
        );
        policy.permit(
            Type::Time,
            ["hour", "minute", "second", "microsecond", "isoformat", "replace"],
        );
        policy.permit(Type::DateType, ["today"]);
        policy.permit(Type::DatetimeType, ["now", "today"]);
        policy.permit(
            Type::MathModule,
            [
                "pi", "e", "tau", "inf", "nan", "sqrt", "floor", "ceil", "trunc", "fabs", "exp", "log", "log2",
                "log10", "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh", "degrees",
                "radians", "pow", "hypot", "copysign", "fmod", "factorial", "gcd", "isqrt", "isnan", "isinf",
                "isfinite",
            ],
        );
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dunder_names_always_denied() {
        let policy = AttributePolicy::default();
        let err = policy.check(&Value::MathModule, "__module__").unwrap_err();
        assert_eq!(
            err,
            Exception::bad_syntax("You can not access `__module__` attribute")
        );
        // even for a type with no entry at all
        assert!(policy.check(&Value::int(1), "__class__").is_err());
    }

    #[test]
    fn unknown_objects_deny_everything() {
        let policy = AttributePolicy::default();
        assert!(policy.check(&Value::int(1), "real").is_err());
        assert!(policy.check(&Value::None, "anything").is_err());
    }

    #[test]
    fn per_type_allow_list() {
        let policy = AttributePolicy::default();
        assert!(policy.check(&Value::list(vec![]), "count").is_ok());
        assert!(policy.check(&Value::list(vec![]), "items").is_err());
        assert!(policy.check(&Value::MathModule, "sqrt").is_ok());
        assert!(policy.check(&Value::MathModule, "system").is_err());
    }

    #[test]
    fn registration_extends_the_surface() {
        let mut policy = AttributePolicy::default();
        assert!(policy.check(&Value::from("x"), "casefold").is_err());
        policy.permit(Type::Str, ["casefold"]);
        assert!(policy.check(&Value::from("x"), "casefold").is_ok());
    }
}
