//! End-to-end `calculate` scenarios, each run in decimal and native mode.
//!
//! `calculate` returns the terminal value plus the environment delta
//! against the default seed; both are checked. Cross-type numeric
//! equality lets one expected value cover both modes except where the
//! modes genuinely diverge (float accumulation).

use abax::{Decimal, ExcType, Exception, Value, calculate};
use pretty_assertions::assert_eq;

fn dec(text: &str) -> Value {
    Value::Decimal(text.parse::<Decimal>().unwrap())
}

/// Runs `expr` in both modes, asserting the same expected value and
/// environment delta for each.
fn check(expr: &str, expected: &Value, expected_locals: &[(&str, Value)]) {
    for decimal_mode in [true, false] {
        let (value, locals) = calculate(expr, decimal_mode).unwrap();
        assert_eq!(&value, expected, "value of {expr:?} (decimal={decimal_mode})");
        assert_eq!(
            locals.len(),
            expected_locals.len(),
            "locals of {expr:?} (decimal={decimal_mode}): {locals:?}"
        );
        for (name, expected_value) in expected_locals {
            let actual = locals
                .get(*name)
                .unwrap_or_else(|| panic!("{name} missing from locals of {expr:?}"));
            assert_eq!(actual, expected_value, "{name} in {expr:?} (decimal={decimal_mode})");
        }
    }
}

#[test]
fn plain_arithmetic() {
    check("1", &Value::int(1), &[]);
    check("1+2", &Value::int(3), &[]);
    check("1-2", &Value::int(-1), &[]);
    check("4*5", &Value::int(20), &[]);
    check("1/2", &Value::Float(0.5), &[]);
    check("10%3", &Value::int(1), &[]);
    check("2**3", &Value::int(8), &[]);
    check("(1+2)**3", &Value::int(27), &[]);
}

#[test]
fn decimal_mode_is_exact() {
    let tenths = "0.1+0.1+0.1+0.1+0.1+0.1+0.1+0.1+0.1+0.1";
    let (value, locals) = calculate(tenths, true).unwrap();
    assert_eq!(value, Value::int(1));
    assert!(locals.is_empty());

    // native mode matches IEEE-754 accumulation instead
    let mut accumulated = 0.0f64;
    for _ in 0..10 {
        accumulated += 0.1;
    }
    let (value, _) = calculate(tenths, false).unwrap();
    assert_eq!(value, Value::Float(accumulated));
    assert_ne!(value, Value::int(1));
}

#[test]
fn decimal_mode_produces_decimal_values() {
    let (value, locals) = calculate("money = 1000; money * 2", true).unwrap();
    assert!(matches!(value, Value::Decimal(_)), "{value:?}");
    assert!(matches!(locals["money"], Value::Decimal(_)));
    assert_eq!(value, dec("2000"));

    let (value, locals) = calculate("money = 1000; money * 2", false).unwrap();
    assert!(matches!(value, Value::Int(_)), "{value:?}");
    assert!(matches!(locals["money"], Value::Int(_)));
    assert_eq!(value, Value::int(2000));
}

#[test]
fn decimal_division_is_decimal() {
    let (value, _) = calculate("1/2", true).unwrap();
    assert_eq!(value, dec("0.5"));
    assert_eq!(value.py_str(), "0.5");
    let (value, _) = calculate("1/3", true).unwrap();
    assert_eq!(value.py_str(), "0.3333333333333333333333333333");
}

#[test]
fn builtin_calls() {
    check("max(1,2,3,4,5)", &Value::int(5), &[]);
    check("min(1,2,3,4,5)", &Value::int(1), &[]);
    check("math.floor(3.2)", &Value::int(3), &[]);
    check("abs(-3)", &Value::int(3), &[]);
    check("len([1, 2, 3])", &Value::int(3), &[]);

    // round is correctly rounded in both modes, which makes them disagree
    // here: the binary 2.675 is below the tie, the decimal one is on it.
    let (value, _) = calculate("round(2.675, 2)", false).unwrap();
    assert_eq!(value, Value::Float(2.67));
    let (value, _) = calculate("round(2.675, 2)", true).unwrap();
    assert_eq!(value, dec("2.68"));
}

#[test]
fn seeded_values_are_not_locals() {
    check("round", &Value::Builtin(abax::Builtin::Round), &[]);
    check("math", &Value::MathModule, &[]);
}

#[test]
fn math_constant_promotion() {
    // Decimal mode converts the binary float exactly, then the sum rounds
    // to the 28-digit context.
    let (value, _) = calculate("1+math.e", true).unwrap();
    assert_eq!(value, dec("3.718281828459045090795598298"));
    assert_eq!(value.py_str(), "3.718281828459045090795598298");

    let (value, _) = calculate("1+math.e", false).unwrap();
    assert_eq!(value, Value::Float(std::f64::consts::E + 1.0));
}

#[test]
fn containers_propagate_the_domain() {
    check(
        "[1,2,3]",
        &Value::list(vec![Value::int(1), Value::int(2), Value::int(3)]),
        &[],
    );
    check(
        "[x*10 for x in [0,1,2]]",
        &Value::list(vec![Value::int(0), Value::int(10), Value::int(20)]),
        &[],
    );
    check(
        "(1,2,3)",
        &Value::tuple(vec![Value::int(1), Value::int(2), Value::int(3)]),
        &[],
    );
    check(
        "{3,2,10}",
        &Value::set_of(vec![Value::int(3), Value::int(2), Value::int(10)]).unwrap(),
        &[],
    );
    check(
        "{x%2 for x in [1,2,3,4]}",
        &Value::set_of(vec![Value::int(0), Value::int(1)]).unwrap(),
        &[],
    );
    check(
        "{\"ab\": 123}",
        &Value::dict_of(vec![(Value::from("ab"), Value::int(123))]).unwrap(),
        &[],
    );
    check(
        "{\"k\"+str(x): x-1 for x in [1,2,3]}",
        &Value::dict_of(vec![
            (Value::from("k1"), Value::int(0)),
            (Value::from("k2"), Value::int(1)),
            (Value::from("k3"), Value::int(2)),
        ])
        .unwrap(),
        &[],
    );

    // element types follow the mode
    let (value, _) = calculate("[1,2,3]", true).unwrap();
    let Value::List(items) = &value else { panic!("expected list") };
    assert!(items.borrow().iter().all(|item| matches!(item, Value::Decimal(_))));
}

#[test]
fn membership_and_methods() {
    check("3 in [1,2,3]", &Value::Bool(true), &[]);
    check("[1,2,3,12,3].count(3)", &Value::int(2), &[]);
    check(
        "{1,2} & {2,3}",
        &Value::set_of(vec![Value::int(2)]).unwrap(),
        &[],
    );
}

#[test]
fn string_results() {
    check("\"item4\"", &Value::from("item4"), &[]);
    check("\"{}4\".format(\"item\")", &Value::from("item4"), &[]);
    check(
        "money = 1000; f\"{money}원\"",
        &Value::from("1000원"),
        &[("money", Value::int(1000))],
    );
}

#[test]
fn assignments_and_terminal_values() {
    check("money = 1000", &Value::None, &[("money", Value::int(1000))]);
    check(
        "money = 1000; money * 2",
        &Value::int(2000),
        &[("money", Value::int(1000))],
    );
    check(
        "a = 11;\nif a > 10:\n    a += 100\na",
        &Value::int(111),
        &[("a", Value::int(111))],
    );
}

#[test]
fn matrix_multiply_is_a_type_error() {
    for decimal_mode in [true, false] {
        let err = calculate("2 @ 3", decimal_mode).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::TypeError), "decimal={decimal_mode}");
    }
}

#[test]
fn denials_surface_through_calculate() {
    let err = calculate("import sys", true).unwrap_err();
    assert_eq!(err, Exception::BadSyntax("You can not import anything".to_string()));
}

#[test]
fn literal_evaluation_is_a_function() {
    for source in ["123", "0.25", "\"text\"", "[1, 2]", "{1: 2}"] {
        for decimal_mode in [true, false] {
            let (first, _) = calculate(source, decimal_mode).unwrap();
            let (second, _) = calculate(source, decimal_mode).unwrap();
            assert_eq!(first, second, "{source:?} (decimal={decimal_mode})");
        }
    }
}

#[test]
fn loop_scenario_matches_host_semantics() {
    let source = concat!(
        "total=0\n",
        "for x in [1,2,3,4,5,6]:\n",
        "    total=total+x\n",
        "    if total>10: continue\n",
        "    total=total*2\n",
        "else:\n",
        "    total=total+10000\n",
    );
    for decimal_mode in [true, false] {
        let (value, locals) = calculate(source, decimal_mode).unwrap();
        assert_eq!(value, Value::None);
        assert_eq!(locals["total"], Value::int(10026), "decimal={decimal_mode}");
        assert_eq!(locals["x"], Value::int(6));
    }
}
