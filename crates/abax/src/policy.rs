//! The syntax-level security policy.
//!
//! For each AST node kind, [`check_statement`] and [`check_expression`]
//! decide permit or deny. Both are pure functions over the ruff AST; the
//! parser consults them before lowering any node, and lowers denied nodes
//! to `Forbidden` so the denial fires at evaluation time.
//!
//! The denial messages are stable: callers and tests match on them.
//! Expression kinds not explicitly permitted below are denied — the policy
//! is an allow-list.

use ruff_python_ast::{Expr as AstExpr, Number, Stmt};

pub(crate) const ANNOTATION: &str = "You can not use annotation syntax";
pub(crate) const ASSERTION: &str = "You can not use assertion syntax";
pub(crate) const ASYNC_FOR: &str = "You can not use `async for` loop syntax";
pub(crate) const ASYNC_FUNCTION_DEF: &str = "Defining new coroutine via def syntax is not allowed";
pub(crate) const ASYNC_WITH: &str = "You can not use `async with` syntax";
pub(crate) const AWAIT: &str = "You can not await anything";
pub(crate) const CLASS_DEF: &str = "Defining new class via def syntax is not allowed";
pub(crate) const FUNCTION_DEF: &str = "Defining new function via def syntax is not allowed";
pub(crate) const GENERATOR_EXP: &str = "Defining new generator expression is not allowed";
pub(crate) const GLOBAL: &str = "You can not use `global` syntax";
pub(crate) const IMPORT: &str = "You can not import anything";
pub(crate) const LAMBDA: &str = "Defining new function via lambda syntax is not allowed";
pub(crate) const NONLOCAL: &str = "You can not use `nonlocal` syntax";
pub(crate) const RAISE: &str = "You can not use `raise` syntax";
pub(crate) const RETURN: &str = "You can not use `return` syntax";
pub(crate) const TRY: &str = "You can not use `try` syntax";
pub(crate) const WITH: &str = "You can not use `with` syntax";
pub(crate) const YIELD: &str = "You can not use `yield` syntax";
pub(crate) const YIELD_FROM: &str = "You can not use `yield from` syntax";

// Target-validator denials (spec-stable messages shared by every bad shape).
pub(crate) const ASSIGN_TARGET: &str = "This assign method is not allowed";
pub(crate) const DELETE_TARGET: &str = "This delete method is not allowed";

// Kinds outside the contract table, denied in the same register.
pub(crate) const WALRUS: &str = "You can not use assignment expression syntax";
pub(crate) const STARRED: &str = "You can not use `*` expansion syntax";
pub(crate) const DOUBLE_STARRED: &str = "You can not use `**` expansion syntax";
pub(crate) const MATCH: &str = "You can not use `match` syntax";
pub(crate) const TYPE_ALIAS: &str = "You can not use type alias syntax";
pub(crate) const COMPLEX: &str = "You can not use complex number syntax";
pub(crate) const TEMPLATE_STR: &str = "You can not use template string syntax";
pub(crate) const UNSUPPORTED: &str = "You can not use this syntax";

/// Classifies a statement kind: `Ok` to permit, `Err(message)` to deny.
#[allow(unreachable_patterns)]
pub(crate) fn check_statement(stmt: &Stmt) -> Result<(), &'static str> {
    match stmt {
        Stmt::Expr(_)
        | Stmt::Assign(_)
        | Stmt::AugAssign(_)
        | Stmt::Delete(_)
        | Stmt::If(_)
        | Stmt::While(_)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Pass(_) => Ok(()),
        Stmt::For(f) => {
            if f.is_async {
                Err(ASYNC_FOR)
            } else {
                Ok(())
            }
        }
        Stmt::FunctionDef(f) => {
            if f.is_async {
                Err(ASYNC_FUNCTION_DEF)
            } else {
                Err(FUNCTION_DEF)
            }
        }
        Stmt::ClassDef(_) => Err(CLASS_DEF),
        Stmt::Return(_) => Err(RETURN),
        Stmt::AnnAssign(_) => Err(ANNOTATION),
        Stmt::With(w) => {
            if w.is_async {
                Err(ASYNC_WITH)
            } else {
                Err(WITH)
            }
        }
        Stmt::Match(_) => Err(MATCH),
        Stmt::Raise(_) => Err(RAISE),
        Stmt::Try(_) => Err(TRY),
        Stmt::TypeAlias(_) => Err(TYPE_ALIAS),
        Stmt::Assert(_) => Err(ASSERTION),
        Stmt::Import(_) | Stmt::ImportFrom(_) => Err(IMPORT),
        Stmt::Global(_) => Err(GLOBAL),
        Stmt::Nonlocal(_) => Err(NONLOCAL),
        Stmt::IpyEscapeCommand(_) => Err(UNSUPPORTED),
        _ => Err(UNSUPPORTED),
    }
}

/// Classifies an expression kind: `Ok` to permit, `Err(message)` to deny.
///
/// Only the shallow kind is classified here; the parser recurses into
/// permitted nodes and classifies their children in turn.
#[allow(unreachable_patterns)]
pub(crate) fn check_expression(expr: &AstExpr) -> Result<(), &'static str> {
    match expr {
        AstExpr::BoolOp(_)
        | AstExpr::BinOp(_)
        | AstExpr::UnaryOp(_)
        | AstExpr::If(_)
        | AstExpr::Dict(_)
        | AstExpr::Set(_)
        | AstExpr::ListComp(_)
        | AstExpr::SetComp(_)
        | AstExpr::DictComp(_)
        | AstExpr::Compare(_)
        | AstExpr::Call(_)
        | AstExpr::FString(_)
        | AstExpr::StringLiteral(_)
        | AstExpr::BytesLiteral(_)
        | AstExpr::BooleanLiteral(_)
        | AstExpr::NoneLiteral(_)
        | AstExpr::EllipsisLiteral(_)
        | AstExpr::Attribute(_)
        | AstExpr::Subscript(_)
        | AstExpr::Name(_)
        | AstExpr::List(_)
        | AstExpr::Tuple(_)
        | AstExpr::Slice(_) => Ok(()),
        AstExpr::NumberLiteral(n) => match n.value {
            Number::Complex { .. } => Err(COMPLEX),
            _ => Ok(()),
        },
        AstExpr::Lambda(_) => Err(LAMBDA),
        AstExpr::Await(_) => Err(AWAIT),
        AstExpr::Yield(_) => Err(YIELD),
        AstExpr::YieldFrom(_) => Err(YIELD_FROM),
        AstExpr::Generator(_) => Err(GENERATOR_EXP),
        AstExpr::Named(_) => Err(WALRUS),
        AstExpr::Starred(_) => Err(STARRED),
        AstExpr::TString(_) => Err(TEMPLATE_STR),
        AstExpr::IpyEscapeCommand(_) => Err(UNSUPPORTED),
        _ => Err(UNSUPPORTED),
    }
}

#[cfg(test)]
mod tests {
    use ruff_python_parser::parse_module;

    use super::*;

    fn first_statement(code: &str) -> Stmt {
        parse_module(code)
            .unwrap()
            .into_syntax()
            .body
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn denied_statement_kinds() {
        let cases: &[(&str, &str)] = &[
            ("a: int = 10", ANNOTATION),
            ("assert True", ASSERTION),
            ("async def abc():\n    pass\n", ASYNC_FUNCTION_DEF),
            ("def abc():\n    pass\n", FUNCTION_DEF),
            ("class ABCD:\n    pass\n", CLASS_DEF),
            ("global x", GLOBAL),
            ("nonlocal x", NONLOCAL),
            ("import sys", IMPORT),
            ("from os import path", IMPORT),
            ("raise NameError", RAISE),
            ("return True", RETURN),
            ("try:\n    pass\nexcept:\n    pass\n", TRY),
            ("with some:\n    pass\n", WITH),
        ];
        for (code, message) in cases {
            assert_eq!(check_statement(&first_statement(code)), Err(*message), "{code}");
        }
    }

    #[test]
    fn permitted_statement_kinds() {
        for code in [
            "pass",
            "a = 1",
            "a += 1",
            "del a",
            "if x:\n    pass\n",
            "for x in y:\n    pass\n",
            "while x:\n    pass\n",
            "break",
            "continue",
            "1 + 2",
        ] {
            assert_eq!(check_statement(&first_statement(code)), Ok(()), "{code}");
        }
    }

    #[test]
    fn denied_expression_kinds() {
        let cases: &[(&str, &str)] = &[
            ("lambda x: x*2", LAMBDA),
            ("await x()", AWAIT),
            ("(i ** 2 for i in r)", GENERATOR_EXP),
            ("(x := 1)", WALRUS),
            ("2j", COMPLEX),
        ];
        for (code, message) in cases {
            let Stmt::Expr(stmt) = first_statement(code) else {
                panic!("expected expression statement for {code}");
            };
            assert_eq!(check_expression(&stmt.value), Err(*message), "{code}");
        }
    }
}
