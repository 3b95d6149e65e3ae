//! Behavior suite for the persistent evaluator: one test per node kind,
//! every policy denial with its exact message, and the scoping and
//! control-flow invariants.

use abax::{Evaluator, Exception, Interrupt, Value};
use pretty_assertions::assert_eq;

fn evaluator() -> Evaluator {
    Evaluator::new(false)
}

fn seeded() -> Evaluator {
    Evaluator::with_default_symbols(false)
}

/// Runs the fragment expecting a `BadSyntax` denial, returning its message.
fn denial(e: &mut Evaluator, source: &str) -> String {
    match e.run(source) {
        Err(Exception::BadSyntax(message)) => message,
        other => panic!("expected BadSyntax for {source:?}, got {other:?}"),
    }
}

#[test]
fn test_annassign() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "a: int = 10"), "You can not use annotation syntax");
    assert!(!e.symbol_table.contains_key("a"));
}

#[test]
fn test_assert() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "assert True"), "You can not use assertion syntax");
    assert_eq!(denial(&mut e, "assert False"), "You can not use assertion syntax");
}

#[test]
fn test_assign() {
    let mut e = seeded();
    e.run("a = 1 + 2").unwrap();
    assert_eq!(e.symbol_table["a"], Value::int(3));
    e.run("x, y = 10, 20").unwrap();
    assert_eq!(e.symbol_table["x"], Value::int(10));
    assert_eq!(e.symbol_table["y"], Value::int(20));

    e.run("dt = datetime.now()").unwrap();
    assert_eq!(denial(&mut e, "dt.year = 2000"), "This assign method is not allowed");
}

#[test]
fn test_asyncfor() {
    let mut e = evaluator();
    e.symbol_table.insert("r".to_string(), Value::int(0));
    let err = denial(&mut e, "async for x in [1, 2, 3, 4]:\n    r += x\n");
    assert_eq!(err, "You can not use `async for` loop syntax");
    assert_eq!(e.symbol_table["r"], Value::int(0));
}

#[test]
fn test_asyncfunctiondef() {
    let mut e = evaluator();
    let err = denial(&mut e, "async def abc():\n    pass\n");
    assert_eq!(err, "Defining new coroutine via def syntax is not allowed");
    assert!(!e.symbol_table.contains_key("abc"));
}

#[test]
fn test_asyncwith() {
    let mut e = evaluator();
    e.symbol_table.insert("r".to_string(), Value::int(0));
    let err = denial(&mut e, "async with x():\n    r += 100\n");
    assert_eq!(err, "You can not use `async with` syntax");
    assert_eq!(e.symbol_table["r"], Value::int(0));
}

#[test]
fn test_attribute() {
    let mut e = seeded();
    e.run("dt = datetime(2019, 10, 7, 1, 2, 3)").unwrap();
    e.run("x = dt.year").unwrap();
    assert_eq!(e.symbol_table["x"], Value::int(2019));

    let err = denial(&mut e, "y = dt.test_test_test");
    assert_eq!(err, "You can not access `test_test_test` attribute");
    assert!(!e.symbol_table.contains_key("y"));

    let err = denial(&mut e, "z = x.asdf");
    assert_eq!(err, "You can not access `asdf` attribute");
    assert!(!e.symbol_table.contains_key("z"));

    let err = denial(&mut e, "math.__module__");
    assert_eq!(err, "You can not access `__module__` attribute");

    let err = denial(&mut e, "datetime.test_test");
    assert_eq!(err, "You can not access `test_test` attribute");
}

#[test]
fn test_augassign() {
    let mut e = seeded();
    e.symbol_table.insert("a".to_string(), Value::int(0));
    e.run("a += 1").unwrap();
    assert_eq!(e.symbol_table["a"], Value::int(1));

    e.run("l = [1, 2, 3, 4]").unwrap();
    e.run("l[0] -= 1").unwrap();
    assert_eq!(
        e.symbol_table["l"],
        Value::list(vec![Value::int(0), Value::int(2), Value::int(3), Value::int(4)])
    );

    assert_eq!(denial(&mut e, "l[2:3] += 20"), "This assign method is not allowed");
    e.run("dt = datetime.now()").unwrap();
    assert_eq!(denial(&mut e, "dt.year += 2000"), "This assign method is not allowed");
}

#[test]
fn test_await() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "r = await x()"), "You can not await anything");
    assert!(!e.symbol_table.contains_key("r"));
}

#[test]
fn test_binop() {
    let mut e = evaluator();
    assert_eq!(e.run("1 + 2").unwrap(), Value::int(3));
    assert_eq!(e.run("3 & 2").unwrap(), Value::int(2));
    assert_eq!(e.run("1 | 2").unwrap(), Value::int(3));
    assert_eq!(e.run("3 ^ 2").unwrap(), Value::int(1));
    assert_eq!(e.run("3 / 2").unwrap(), Value::Float(1.5));
    assert_eq!(e.run("3 // 2").unwrap(), Value::int(1));
    assert_eq!(e.run("3 << 2").unwrap(), Value::int(12));
    let err = e.run("2 @ 3").unwrap_err();
    assert_eq!(
        err,
        Exception::Raised(abax::SimpleException::new(
            abax::ExcType::TypeError,
            "unsupported operand type(s) for @: 'int' and 'int'",
        ))
    );
    assert_eq!(e.run("3 * 2").unwrap(), Value::int(6));
    assert_eq!(e.run("33 % 4").unwrap(), Value::int(1));
    assert_eq!(e.run("3 ** 2").unwrap(), Value::int(9));
    assert_eq!(e.run("100 >> 2").unwrap(), Value::int(25));
    assert_eq!(e.run("3 - 1").unwrap(), Value::int(2));
}

#[test]
fn test_binop_python_division_semantics() {
    let mut e = evaluator();
    assert_eq!(e.run("-7 // 2").unwrap(), Value::int(-4));
    assert_eq!(e.run("-7 % 2").unwrap(), Value::int(1));
    assert_eq!(e.run("7 % -2").unwrap(), Value::int(-1));
    assert_eq!(e.run("2 ** -1").unwrap(), Value::Float(0.5));
    let err = e.run("1 // 0").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::ZeroDivisionError));
    let err = e.run("1 / 0").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::ZeroDivisionError));
}

#[test]
fn test_boolop() {
    let mut e = evaluator();
    assert_eq!(e.run("True and False").unwrap(), Value::Bool(false));
    assert_eq!(e.run("True or False").unwrap(), Value::Bool(true));
    // short-circuit returns the last evaluated operand, not a bool
    assert_eq!(e.run("0 or 'fallback'").unwrap(), Value::from("fallback"));
    assert_eq!(e.run("1 and 2 and 3").unwrap(), Value::int(3));
    assert_eq!(e.run("0 and unbound_name").unwrap(), Value::int(0));
    assert_eq!(e.run("1 or unbound_name").unwrap(), Value::int(1));
}

#[test]
fn test_break() {
    let mut e = evaluator();
    e.run("break").unwrap();
    assert_eq!(e.current_interrupt, Some(Interrupt::Break));
}

#[test]
fn test_bytes() {
    let mut e = evaluator();
    let expected = Value::Bytes(b"asdf".to_vec().into());
    assert_eq!(e.run("b\"asdf\"").unwrap(), expected);
    e.run("a = b\"asdf\"").unwrap();
    assert_eq!(e.symbol_table["a"], expected);
}

#[test]
fn test_call() {
    let mut e = seeded();
    e.run("x = date(2019, 10, day=7)").unwrap();
    assert_eq!(e.run("x == date(2019, 10, 7)").unwrap(), Value::Bool(true));

    e.run("y = math.sqrt(121)").unwrap();
    assert_eq!(e.symbol_table["y"], Value::Float(11.0));

    e.run("z = datetime.now().date()").unwrap();
    assert_eq!(e.run("z == datetime.now().date()").unwrap(), Value::Bool(true));
}

#[test]
fn test_classdef() {
    let mut e = evaluator();
    let err = denial(&mut e, "class ABCD:\n    pass\n");
    assert_eq!(err, "Defining new class via def syntax is not allowed");
    assert!(!e.symbol_table.contains_key("ABCD"));
}

#[test]
fn test_compare() {
    let mut e = evaluator();
    assert_eq!(e.run("1 == 2").unwrap(), Value::Bool(false));
    assert_eq!(e.run("3 > 2").unwrap(), Value::Bool(true));
    assert_eq!(e.run("3 >= 2").unwrap(), Value::Bool(true));
    assert_eq!(e.run("\"A\" in \"America\"").unwrap(), Value::Bool(true));
    assert_eq!(e.run("\"E\" not in \"America\"").unwrap(), Value::Bool(true));
    assert_eq!(e.run("1 is 2").unwrap(), Value::Bool(false));
    assert_eq!(e.run("1 is not 2").unwrap(), Value::Bool(true));
    assert_eq!(e.run("3 < 2").unwrap(), Value::Bool(false));
    assert_eq!(e.run("3 <= 2").unwrap(), Value::Bool(false));
}

#[test]
fn test_compare_chained() {
    let mut e = evaluator();
    assert_eq!(e.run("1 < 2 < 3").unwrap(), Value::Bool(true));
    assert_eq!(e.run("1 < 2 > 3").unwrap(), Value::Bool(false));
    // short-circuits before evaluating the third operand
    assert_eq!(e.run("3 < 2 < unbound_name").unwrap(), Value::Bool(false));
}

#[test]
fn test_continue() {
    let mut e = evaluator();
    e.run("continue").unwrap();
    assert_eq!(e.current_interrupt, Some(Interrupt::Continue));
}

#[test]
fn test_delete() {
    let mut e = evaluator();
    for name in ["a", "b", "c"] {
        e.symbol_table.insert(name.to_string(), Value::int(0));
    }
    e.run("del a, b, c").unwrap();
    assert!(!e.symbol_table.contains_key("a"));
    assert!(!e.symbol_table.contains_key("b"));
    assert!(!e.symbol_table.contains_key("c"));

    e.run("l = [1, 2, 3, 4]").unwrap();
    e.run("del l[0]").unwrap();
    assert_eq!(
        e.symbol_table["l"],
        Value::list(vec![Value::int(2), Value::int(3), Value::int(4)])
    );

    assert_eq!(denial(&mut e, "del l[2:3]"), "This delete method is not allowed");
    assert_eq!(
        e.symbol_table["l"],
        Value::list(vec![Value::int(2), Value::int(3), Value::int(4)])
    );

    let mut e = seeded();
    e.run("dt = datetime.now()").unwrap();
    assert_eq!(denial(&mut e, "del dt.year"), "This delete method is not allowed");
}

#[test]
fn test_dict() {
    let mut e = evaluator();
    let expected = Value::dict_of(vec![
        (Value::int(1), Value::int(111)),
        (Value::int(2), Value::int(222)),
    ])
    .unwrap();
    assert_eq!(e.run("{1: 111, 2: 222}").unwrap(), expected);
    e.run("a = {1: 111, 2: 222}").unwrap();
    assert_eq!(e.symbol_table["a"], expected);
}

#[test]
fn test_dictcomp() {
    let mut e = evaluator();
    let expected = Value::dict_of(vec![
        (Value::int(2), Value::int(1)),
        (Value::int(3), Value::int(121)),
        (Value::int(4), Value::int(12321)),
    ])
    .unwrap();
    assert_eq!(
        e.run("{k+1: v**2 for k, v in {1: 1, 2: 11, 3: 111}.items()}").unwrap(),
        expected
    );
    assert!(!e.symbol_table.contains_key("k"));
    assert!(!e.symbol_table.contains_key("v"));
    e.run("a = {k+1: v**2 for k, v in {1: 1, 2: 11, 3: 111}.items()}")
        .unwrap();
    assert_eq!(e.symbol_table["a"], expected);
    assert!(!e.symbol_table.contains_key("k"));
    assert!(!e.symbol_table.contains_key("v"));
}

#[test]
fn test_ellipsis() {
    let mut e = evaluator();
    assert_eq!(e.run("...").unwrap(), Value::Ellipsis);
}

#[test]
fn test_expr() {
    let mut e = evaluator();
    assert_eq!(e.run("True").unwrap(), Value::Bool(true));
    assert_eq!(e.run("False").unwrap(), Value::Bool(false));
    assert_eq!(e.run("None").unwrap(), Value::None);
    assert_eq!(e.run("123").unwrap(), Value::int(123));
    assert_eq!(e.run("\"abc\"").unwrap(), Value::from("abc"));
    assert_eq!(
        e.run("[1, 2, 3]").unwrap(),
        Value::list(vec![Value::int(1), Value::int(2), Value::int(3)])
    );
    assert_eq!(
        e.run("(1, 2, 3, 3)").unwrap(),
        Value::tuple(vec![Value::int(1), Value::int(2), Value::int(3), Value::int(3)])
    );
    assert_eq!(
        e.run("{1, 2, 3, 3}").unwrap(),
        Value::set_of(vec![Value::int(1), Value::int(2), Value::int(3)]).unwrap()
    );
}

#[test]
fn test_slices() {
    let mut e = evaluator();
    e.run("l = [1, 2, 3, 4, 5]").unwrap();
    assert_eq!(
        e.run("l[1:3]").unwrap(),
        Value::list(vec![Value::int(2), Value::int(3)])
    );
    assert_eq!(
        e.run("l[::2]").unwrap(),
        Value::list(vec![Value::int(1), Value::int(3), Value::int(5)])
    );
    assert_eq!(
        e.run("l[::-1]").unwrap(),
        Value::list(vec![
            Value::int(5),
            Value::int(4),
            Value::int(3),
            Value::int(2),
            Value::int(1)
        ])
    );
    assert_eq!(
        e.run("l[10:20:3]").unwrap(),
        Value::list(vec![])
    );
    assert_eq!(e.run("\"abcdef\"[2:4]").unwrap(), Value::from("cd"));
    assert_eq!(e.run("(1, 2, 3)[1:]").unwrap(), Value::tuple(vec![Value::int(2), Value::int(3)]));
    let err = e.run("l[::0]").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::ValueError));
}

#[test]
fn test_extended_subscript() {
    let mut e = evaluator();
    // a tuple subscript reaches the container as a tuple key
    e.run("d = {(1, 2): 'x'}").unwrap();
    assert_eq!(e.run("d[1, 2]").unwrap(), Value::from("x"));
    // sequences reject tuple indices
    let err = e.run("[1, 2, 3][1, 2]").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::TypeError));
}

#[test]
fn test_functiondef() {
    let mut e = evaluator();
    let err = denial(&mut e, "def abc():\n    pass\n");
    assert_eq!(err, "Defining new function via def syntax is not allowed");
    assert!(!e.symbol_table.contains_key("abc"));
}

#[test]
fn test_for() {
    let mut e = evaluator();
    e.run(concat!(
        "total = 0\n",
        "for x in [1, 2, 3, 4, 5, 6]:\n",
        "    total = total + x\n",
        "    if total > 10:\n",
        "        continue\n",
        "    total = total * 2\n",
        "else:\n",
        "    total = total + 10000\n",
    ))
    .unwrap();
    assert_eq!(e.symbol_table["total"], Value::int(10026));

    e.run(concat!(
        "total2 = 0\n",
        "for x in [1, 2, 3, 4, 5, 6]:\n",
        "    total2 = total2 + x\n",
        "    if total2 > 10:\n",
        "        break\n",
        "    total2 = total2 * 2\n",
        "else:\n",
        "    total2 = total2 + 10000\n",
    ))
    .unwrap();
    assert_eq!(e.symbol_table["total2"], Value::int(11));

    // the loop target binds in the enclosing environment and persists
    assert_eq!(e.symbol_table["x"], Value::int(6));
}

#[test]
fn test_formattedvalue() {
    let mut e = evaluator();
    e.symbol_table.insert("before".to_string(), Value::int(123_456));
    e.run("after = f\"change {before} to {before:,}!\"").unwrap();
    assert_eq!(e.symbol_table["after"], Value::from("change 123456 to 123,456!"));
}

#[test]
fn test_generator_exp() {
    let mut e = evaluator();
    e.run("r = [1, 2, 3]").unwrap();
    let err = denial(&mut e, "x = (i ** 2 for i in r)");
    assert_eq!(err, "Defining new generator expression is not allowed");
    assert!(!e.symbol_table.contains_key("x"));
}

#[test]
fn test_global() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "global x"), "You can not use `global` syntax");
}

#[test]
fn test_if() {
    let mut e = evaluator();
    e.symbol_table.insert("a".to_string(), Value::int(1));
    e.run("if a == 1:\n    a = 2\n    b = 3\n").unwrap();
    assert_eq!(e.symbol_table["a"], Value::int(2));
    assert_eq!(e.symbol_table["b"], Value::int(3));

    e.run(concat!(
        "if a == 1:\n",
        "    a = 2\n",
        "    b = 3\n",
        "    z = 1\n",
        "else:\n",
        "    a = 3\n",
        "    b = 4\n",
        "    c = 5\n",
    ))
    .unwrap();
    assert_eq!(e.symbol_table["a"], Value::int(3));
    assert_eq!(e.symbol_table["b"], Value::int(4));
    assert_eq!(e.symbol_table["c"], Value::int(5));
    assert!(!e.symbol_table.contains_key("z"));

    e.run(concat!(
        "if a == 1:\n",
        "    a = 2\n",
        "    b = 3\n",
        "    z = 1\n",
        "elif a == 3:\n",
        "    d = 4\n",
        "    e = 5\n",
        "    f = 6\n",
        "else:\n",
        "    a = 3\n",
        "    b = 4\n",
        "    c = 5\n",
        "    y = 7\n",
    ))
    .unwrap();
    assert_eq!(e.symbol_table["d"], Value::int(4));
    assert_eq!(e.symbol_table["e"], Value::int(5));
    assert_eq!(e.symbol_table["f"], Value::int(6));
    assert!(!e.symbol_table.contains_key("y"));
    assert!(!e.symbol_table.contains_key("z"));
}

#[test]
fn test_ifexp() {
    let mut e = evaluator();
    assert_eq!(e.run("100 if 1 == 1 else 200").unwrap(), Value::int(100));
    assert_eq!(e.run("100 if 1 == 2 else 200").unwrap(), Value::int(200));
    // only the taken branch is evaluated
    assert_eq!(e.run("100 if True else unbound_name").unwrap(), Value::int(100));
}

#[test]
fn test_import() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "import sys"), "You can not import anything");
    assert!(!e.symbol_table.contains_key("sys"));
}

#[test]
fn test_importfrom() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "from os import path"), "You can not import anything");
    assert!(!e.symbol_table.contains_key("path"));
}

#[test]
fn test_index() {
    let mut e = evaluator();
    e.run("l = [11, 22, 33]").unwrap();
    assert_eq!(e.run("l[2]").unwrap(), Value::int(33));
    assert_eq!(e.run("l[-1]").unwrap(), Value::int(33));
    let err = e.run("l[3]").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::IndexError));
    e.run("d = {\"asdf\": 1}").unwrap();
    assert_eq!(e.run("d[\"asdf\"]").unwrap(), Value::int(1));
    let err = e.run("d[\"missing\"]").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::KeyError));
}

#[test]
fn test_lambda() {
    let mut e = evaluator();
    assert_eq!(
        denial(&mut e, "lambda x: x*2"),
        "Defining new function via lambda syntax is not allowed"
    );
}

#[test]
fn test_list() {
    let mut e = evaluator();
    let expected = Value::list(vec![Value::int(1), Value::int(2), Value::int(3)]);
    assert_eq!(e.run("[1, 2, 3]").unwrap(), expected);
    e.run("a = [1, 2, 3]").unwrap();
    assert_eq!(e.symbol_table["a"], expected);
}

#[test]
fn test_listcomp() {
    let mut e = evaluator();
    assert_eq!(
        e.run("[x ** 2 for x in [1, 2, 3]]").unwrap(),
        Value::list(vec![Value::int(1), Value::int(4), Value::int(9)])
    );
    assert!(!e.symbol_table.contains_key("x"));

    let expected: Vec<Value> = [11, 21, 31, 14, 24, 34, 19, 29, 39].iter().map(|n| Value::int(*n)).collect();
    assert_eq!(
        e.run("[x ** 2 + y for x in [1, 2, 3] for y in [10, 20, 30]]").unwrap(),
        Value::list(expected)
    );
    assert!(!e.symbol_table.contains_key("x"));
    assert!(!e.symbol_table.contains_key("y"));

    // a later generator sees the targets of earlier ones
    let expected: Vec<Value> = [4, 16, 36, 9, 25, 49, 16, 36, 64].iter().map(|n| Value::int(*n)).collect();
    assert_eq!(
        e.run("[y ** 2 for x in [1, 2, 3] for y in [x+1, x+3, x+5]]").unwrap(),
        Value::list(expected)
    );
    assert!(!e.symbol_table.contains_key("x"));
    assert!(!e.symbol_table.contains_key("y"));
}

#[test]
fn test_comprehension_filters() {
    let mut e = evaluator();
    assert_eq!(
        e.run("[x for x in [1, 2, 3, 4, 5, 6] if x % 2 == 0 if x > 2]").unwrap(),
        Value::list(vec![Value::int(4), Value::int(6)])
    );
}

#[test]
fn test_comprehension_no_leak_with_outer_binding() {
    let mut e = evaluator();
    e.run("x = 'outer'").unwrap();
    let keys_before: Vec<String> = e.symbol_table.keys().cloned().collect();
    e.run("[x ** 2 for x in [1, 2, 3]]").unwrap();
    let keys_after: Vec<String> = e.symbol_table.keys().cloned().collect();
    assert_eq!(keys_before, keys_after);
    // the outer binding is untouched
    assert_eq!(e.symbol_table["x"], Value::from("outer"));
}

#[test]
fn test_nameconstant() {
    let mut e = evaluator();
    e.run("x = True").unwrap();
    e.run("y = False").unwrap();
    e.run("z = None").unwrap();
    assert_eq!(e.symbol_table["x"], Value::Bool(true));
    assert_eq!(e.symbol_table["y"], Value::Bool(false));
    assert_eq!(e.symbol_table["z"], Value::None);
}

#[test]
fn test_name_lookup_error() {
    let mut e = evaluator();
    assert_eq!(
        e.run("unknown_name").unwrap_err(),
        Exception::NameLookup("unknown_name".to_string())
    );
}

#[test]
fn test_nonlocal() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "nonlocal x"), "You can not use `nonlocal` syntax");
}

#[test]
fn test_num() {
    let mut e = evaluator();
    assert_eq!(e.run("123").unwrap(), Value::int(123));
    e.run("a = 123").unwrap();
    assert_eq!(e.symbol_table["a"], Value::int(123));
    // big integer literals don't overflow
    assert_eq!(
        e.run("10 ** 30").unwrap().py_str(),
        "1000000000000000000000000000000"
    );
}

#[test]
fn test_pass() {
    let mut e = evaluator();
    e.run("pass").unwrap();
}

#[test]
fn test_raise() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "raise NameError"), "You can not use `raise` syntax");
}

#[test]
fn test_return() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "return True"), "You can not use `return` syntax");
}

#[test]
fn test_set() {
    let mut e = evaluator();
    let expected = Value::set_of(vec![Value::int(1), Value::int(2), Value::int(3)]).unwrap();
    assert_eq!(e.run("{1, 1, 2, 3, 3}").unwrap(), expected);
    e.run("a = {1, 1, 2, 3, 3}").unwrap();
    assert_eq!(e.symbol_table["a"], expected);
}

#[test]
fn test_setcomp() {
    let mut e = evaluator();
    assert_eq!(
        e.run("{x ** 2 for x in [1, 2, 3, 3]}").unwrap(),
        Value::set_of(vec![Value::int(1), Value::int(4), Value::int(9)]).unwrap()
    );
    assert!(!e.symbol_table.contains_key("x"));

    let expected: Vec<Value> = [11, 21, 31, 14, 24, 34, 19, 29, 39].iter().map(|n| Value::int(*n)).collect();
    assert_eq!(
        e.run("{x ** 2 + y for x in [1, 2, 3] for y in [10, 20, 30]}").unwrap(),
        Value::set_of(expected).unwrap()
    );
    assert!(!e.symbol_table.contains_key("x"));
    assert!(!e.symbol_table.contains_key("y"));
}

#[test]
fn test_str() {
    let mut e = evaluator();
    assert_eq!(e.run("\"asdf\"").unwrap(), Value::from("asdf"));
    e.run("a = \"asdf\"").unwrap();
    assert_eq!(e.symbol_table["a"], Value::from("asdf"));
}

#[test]
fn test_subscript() {
    let mut e = evaluator();
    assert_eq!(e.run("[10, 20, 30][0]").unwrap(), Value::int(10));
    assert_eq!(e.run("(100, 200, 300)[0]").unwrap(), Value::int(100));
    assert_eq!(
        e.run("{\"a\": 1000, \"b\": 2000, \"c\": 3000}[\"a\"]").unwrap(),
        Value::int(1000)
    );
    e.run("l = [11, 22, 33]").unwrap();
    assert_eq!(e.run("l[2]").unwrap(), Value::int(33));
    e.run("l[2] = 44").unwrap();
    assert_eq!(
        e.symbol_table["l"],
        Value::list(vec![Value::int(11), Value::int(22), Value::int(44)])
    );
}

#[test]
fn test_try() {
    let mut e = evaluator();
    let err = denial(&mut e, "try:\n    x = 1\nexcept:\n    pass\n");
    assert_eq!(err, "You can not use `try` syntax");
    assert!(!e.symbol_table.contains_key("x"));
}

#[test]
fn test_tuple() {
    let mut e = evaluator();
    let expected = Value::tuple(vec![
        Value::int(1),
        Value::int(1),
        Value::int(2),
        Value::int(3),
        Value::int(3),
    ]);
    assert_eq!(e.run("(1, 1, 2, 3, 3)").unwrap(), expected);
    e.run("a = (1, 1, 2, 3, 3)").unwrap();
    assert_eq!(e.symbol_table["a"], expected);
}

#[test]
fn test_unaryop() {
    let mut e = evaluator();
    assert_eq!(e.run("~100").unwrap(), Value::int(-101));
    assert_eq!(e.run("not 100").unwrap(), Value::Bool(false));
    assert_eq!(e.run("+100").unwrap(), Value::int(100));
    assert_eq!(e.run("-100").unwrap(), Value::int(-100));
}

#[test]
fn test_while() {
    let mut e = evaluator();
    e.run(concat!(
        "total = 0\n",
        "i = 1\n",
        "while total > 100:\n",
        "    total += i\n",
        "    i += i\n",
        "    if i % 10 == 0:\n",
        "        i += 1\n",
        "else:\n",
        "    total = total + 10000\n",
    ))
    .unwrap();
    assert_eq!(e.symbol_table["total"], Value::int(10000));

    e.run(concat!(
        "r = 0\n",
        "while True:\n",
        "    break\n",
        "else:\n",
        "    r += 10\n",
    ))
    .unwrap();
    assert_eq!(e.symbol_table["r"], Value::int(0));
}

#[test]
fn test_nested_loops_consume_their_own_interrupt() {
    let mut e = evaluator();
    e.run(concat!(
        "hits = 0\n",
        "for i in [1, 2, 3]:\n",
        "    for j in [1, 2, 3]:\n",
        "        if j == 2:\n",
        "            break\n",
        "        hits = hits + 1\n",
        "    hits = hits + 10\n",
    ))
    .unwrap();
    // inner break never escapes: three outer iterations complete
    assert_eq!(e.symbol_table["hits"], Value::int(33));
}

#[test]
fn test_with() {
    let mut e = evaluator();
    let err = denial(&mut e, "with some:\n    x = 1\n");
    assert_eq!(err, "You can not use `with` syntax");
    assert!(!e.symbol_table.contains_key("x"));
}

#[test]
fn test_yield() {
    let mut e = evaluator();
    assert_eq!(denial(&mut e, "x = yield f()"), "You can not use `yield` syntax");
    assert!(!e.symbol_table.contains_key("x"));
}

#[test]
fn test_yield_from() {
    let mut e = evaluator();
    assert_eq!(
        denial(&mut e, "x = yield from f()"),
        "You can not use `yield from` syntax"
    );
    assert!(!e.symbol_table.contains_key("x"));
}

#[test]
fn test_denial_keeps_completed_statements() {
    let mut e = evaluator();
    let err = e.run("a = 1\nimport sys\nb = 2\n").unwrap_err();
    assert_eq!(err, Exception::BadSyntax("You can not import anything".to_string()));
    // the statement before the denial kept its effect; the one after never ran
    assert_eq!(e.symbol_table["a"], Value::int(1));
    assert!(!e.symbol_table.contains_key("b"));
}

#[test]
fn test_runtime_error_keeps_completed_statements() {
    let mut e = evaluator();
    let err = e.run("a = 1\nb = 1 / 0\nc = 2\n").unwrap_err();
    assert_eq!(err.exc_type(), Some(abax::ExcType::ZeroDivisionError));
    assert_eq!(e.symbol_table["a"], Value::int(1));
    assert!(!e.symbol_table.contains_key("b"));
    assert!(!e.symbol_table.contains_key("c"));
}

#[test]
fn test_mutating_methods_alias() {
    let mut e = evaluator();
    e.run("l = [1, 2]").unwrap();
    e.run("m = l").unwrap();
    e.run("l.append(3)").unwrap();
    assert_eq!(
        e.symbol_table["m"],
        Value::list(vec![Value::int(1), Value::int(2), Value::int(3)])
    );
    assert_eq!(e.run("m is l").unwrap(), Value::Bool(true));
    assert_eq!(e.run("[1, 2, 3] is [1, 2, 3]").unwrap(), Value::Bool(false));
}

#[test]
fn test_string_methods() {
    let mut e = evaluator();
    assert_eq!(e.run("\"a,b,c\".split(\",\")").unwrap(), Value::list(vec![
        Value::from("a"),
        Value::from("b"),
        Value::from("c"),
    ]));
    assert_eq!(e.run("\"-\".join([\"x\", \"y\"])").unwrap(), Value::from("x-y"));
    assert_eq!(e.run("\"  pad  \".strip()").unwrap(), Value::from("pad"));
    assert_eq!(e.run("\"abc\".upper()").unwrap(), Value::from("ABC"));
    assert_eq!(e.run("\"hello\".replace(\"l\", \"L\", 1)").unwrap(), Value::from("heLlo"));
    assert_eq!(e.run("\"hello\".startswith(\"he\")").unwrap(), Value::Bool(true));
    assert_eq!(e.run("\"hello\".find(\"lo\")").unwrap(), Value::int(3));
    assert_eq!(e.run("\"banana\".count(\"an\")").unwrap(), Value::int(2));
}

#[test]
fn test_fstring_conversions() {
    let mut e = evaluator();
    e.run("word = 'way'").unwrap();
    assert_eq!(e.run("f\"{word!r}\"").unwrap(), Value::from("'way'"));
    assert_eq!(e.run("f\"{word:>5}\"").unwrap(), Value::from("  way"));
    e.run("width = 6").unwrap();
    assert_eq!(e.run("f\"{word:>{width}}\"").unwrap(), Value::from("   way"));
}
