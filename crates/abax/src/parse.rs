//! Lowering from the ruff AST to the crate IR.
//!
//! Every node is classified by the policy before it is lowered; denied
//! nodes become `Forbidden` so the denial fires at evaluation time with
//! the completed-statements environment intact. Assignment and delete
//! targets are validated here: a bare name, nested tuple/list
//! destructuring, or a single-index subscript of a name — anything else
//! lowers to `Forbidden` with the target denial message.

use num_bigint::BigInt;
use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ConversionFlag as RuffConversionFlag, ElifElseClause, Expr as AstExpr,
    InterpolatedStringElement, Number, Operator as AstOperator, Stmt, UnaryOp,
};
use ruff_python_parser::parse_module;
use ruff_text_size::Ranged;
use thin_vec::ThinVec;

use crate::{
    exception::{Exception, RunResult},
    expressions::{
        AssignTarget, BoolOperator, CmpOperator, Comprehension, DeleteTarget, Expr, Literal, Node, Operator,
        UnaryOperator,
    },
    fstring::{ConversionFlag, FStringPart, FormatSpec},
    policy,
};

/// Parses source text into IR nodes. Real syntax errors surface as
/// `SyntaxError`; policy denials are embedded as `Forbidden` nodes.
pub(crate) fn parse(code: &str) -> RunResult<Vec<Node>> {
    let parsed = parse_module(code).map_err(|e| Exception::syntax_error(e.to_string()))?;
    let parser = Parser { code };
    parser.parse_statements(parsed.into_syntax().body)
}

/// Outcome of lowering a would-be assignment target.
type Target<T> = Result<T, &'static str>;

struct Parser<'a> {
    code: &'a str,
}

impl Parser<'_> {
    fn parse_statements(&self, body: ThinVec<Stmt>) -> RunResult<Vec<Node>> {
        body.into_iter().map(|stmt| self.parse_statement(stmt)).collect()
    }

    #[allow(unreachable_patterns)]
    fn parse_statement(&self, stmt: Stmt) -> RunResult<Node> {
        if let Err(message) = policy::check_statement(&stmt) {
            return Ok(Node::Forbidden(message));
        }
        match stmt {
            Stmt::Pass(_) => Ok(Node::Pass),
            Stmt::Break(_) => Ok(Node::Break),
            Stmt::Continue(_) => Ok(Node::Continue),
            Stmt::Expr(ast::StmtExpr { value, .. }) => Ok(Node::Expr(self.parse_expression(*value)?)),
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let value = self.parse_expression(*value)?;
                let mut lowered = Vec::with_capacity(targets.len());
                for target in targets {
                    match self.parse_target(target)? {
                        Ok(target) => lowered.push(target),
                        Err(message) => return Ok(Node::Forbidden(message)),
                    }
                }
                Ok(Node::Assign {
                    targets: lowered,
                    value,
                })
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => {
                let value = self.parse_expression(*value)?;
                let target = match self.parse_target(*target)? {
                    // Tuple targets are not valid augmented assignment
                    // targets; ruff rejects them before we get here.
                    Ok(target @ (AssignTarget::Name(_) | AssignTarget::Subscript { .. })) => target,
                    _ => return Ok(Node::Forbidden(policy::ASSIGN_TARGET)),
                };
                Ok(Node::AugAssign {
                    target,
                    op: convert_op(&op),
                    value,
                })
            }
            Stmt::Delete(ast::StmtDelete { targets, .. }) => {
                let mut lowered = Vec::with_capacity(targets.len());
                for target in targets {
                    match self.parse_delete_target(target, &mut lowered)? {
                        Ok(()) => {}
                        Err(message) => return Ok(Node::Forbidden(message)),
                    }
                }
                Ok(Node::Delete { targets: lowered })
            }
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body)?;
                let or_else = self.parse_elif_else_clauses(elif_else_clauses)?;
                Ok(Node::If { test, body, or_else })
            }
            Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                let target = match self.parse_target(*target)? {
                    Ok(target) => target,
                    Err(message) => return Ok(Node::Forbidden(message)),
                };
                Ok(Node::For {
                    target,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body)?,
                    or_else: self.parse_statements(orelse)?,
                })
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => Ok(Node::While {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body)?,
                or_else: self.parse_statements(orelse)?,
            }),
            _ => Ok(Node::Forbidden(policy::UNSUPPORTED)),
        }
    }

    /// Folds ruff's elif/else clause list into nested `If` nodes.
    fn parse_elif_else_clauses(&self, clauses: Vec<ElifElseClause>) -> RunResult<Vec<Node>> {
        let mut iter = clauses.into_iter();
        let Some(clause) = iter.next() else {
            return Ok(Vec::new());
        };
        match clause.test {
            // Plain `else:` is always the final clause.
            None => self.parse_statements(clause.body),
            Some(test) => {
                let test = self.parse_expression(test)?;
                let body = self.parse_statements(clause.body)?;
                let or_else = self.parse_elif_else_clauses(iter.collect())?;
                Ok(vec![Node::If { test, body, or_else }])
            }
        }
    }

    /// Lowers an assignment/loop/comprehension target, validating its shape.
    fn parse_target(&self, target: AstExpr) -> RunResult<Target<AssignTarget>> {
        match target {
            AstExpr::Name(ast::ExprName { id, .. }) => Ok(Ok(AssignTarget::Name(id.to_string().into()))),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) | AstExpr::List(ast::ExprList { elts, .. }) => {
                let mut targets = Vec::with_capacity(elts.len());
                for elt in elts {
                    match self.parse_target(elt)? {
                        Ok(target) => targets.push(target),
                        Err(message) => return Ok(Err(message)),
                    }
                }
                Ok(Ok(AssignTarget::Unpack(targets)))
            }
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                let AstExpr::Name(ast::ExprName { id, .. }) = *value else {
                    return Ok(Err(policy::ASSIGN_TARGET));
                };
                if matches!(*slice, AstExpr::Slice(_)) {
                    return Ok(Err(policy::ASSIGN_TARGET));
                }
                Ok(Ok(AssignTarget::Subscript {
                    name: id.to_string().into(),
                    index: Box::new(self.parse_expression(*slice)?),
                }))
            }
            _ => Ok(Err(policy::ASSIGN_TARGET)),
        }
    }

    /// Lowers one `del` target, flattening tuples, appending to `out`.
    fn parse_delete_target(&self, target: AstExpr, out: &mut Vec<DeleteTarget>) -> RunResult<Target<()>> {
        match target {
            AstExpr::Name(ast::ExprName { id, .. }) => {
                out.push(DeleteTarget::Name(id.to_string().into()));
                Ok(Ok(()))
            }
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) | AstExpr::List(ast::ExprList { elts, .. }) => {
                for elt in elts {
                    match self.parse_delete_target(elt, out)? {
                        Ok(()) => {}
                        Err(message) => return Ok(Err(message)),
                    }
                }
                Ok(Ok(()))
            }
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                let AstExpr::Name(ast::ExprName { id, .. }) = *value else {
                    return Ok(Err(policy::DELETE_TARGET));
                };
                if matches!(*slice, AstExpr::Slice(_)) {
                    return Ok(Err(policy::DELETE_TARGET));
                }
                out.push(DeleteTarget::Subscript {
                    name: id.to_string().into(),
                    index: self.parse_expression(*slice)?,
                });
                Ok(Ok(()))
            }
            _ => Ok(Err(policy::DELETE_TARGET)),
        }
    }

    fn parse_expressions(&self, exprs: Vec<AstExpr>) -> RunResult<Vec<Expr>> {
        exprs.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    #[allow(unreachable_patterns)]
    fn parse_expression(&self, expr: AstExpr) -> RunResult<Expr> {
        if let Err(message) = policy::check_expression(&expr) {
            return Ok(Expr::Forbidden(message));
        }
        match expr {
            AstExpr::NoneLiteral(_) => Ok(Expr::Literal(Literal::None)),
            AstExpr::EllipsisLiteral(_) => Ok(Expr::Literal(Literal::Ellipsis)),
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => {
                Ok(Expr::Literal(Literal::Bool(value)))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, range, .. }) => match value {
                Number::Int(i) => {
                    let value = match i.as_i64() {
                        Some(small) => BigInt::from(small),
                        None => parse_int_literal(&i.to_string()).ok_or_else(|| {
                            Exception::syntax_error(format!("invalid integer literal: {i}"))
                        })?,
                    };
                    Ok(Expr::Literal(Literal::Int(value)))
                }
                Number::Float(f) => Ok(Expr::Literal(Literal::Float {
                    value: f,
                    text: self.code[range].into(),
                })),
                Number::Complex { .. } => unreachable!("denied by policy"),
            },
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                Ok(Expr::Literal(Literal::Str(value.to_string().into())))
            }
            AstExpr::BytesLiteral(ast::ExprBytesLiteral { value, .. }) => {
                let bytes: std::borrow::Cow<'_, [u8]> = std::borrow::Cow::from(&value);
                Ok(Expr::Literal(Literal::Bytes(bytes.into_owned().into())))
            }
            AstExpr::FString(ast::ExprFString { value, .. }) => self.parse_fstring(&value),
            AstExpr::Name(ast::ExprName { id, .. }) => Ok(Expr::Name(id.to_string().into())),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(Expr::Attribute {
                object: Box::new(self.parse_expression(*value)?),
                attr: attr.id().to_string().into(),
            }),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(Expr::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_expression(*slice)?),
            }),
            AstExpr::Slice(ast::ExprSlice { lower, upper, step, .. }) => {
                let parse_part = |part: Option<Box<AstExpr>>| -> RunResult<Option<Box<Expr>>> {
                    part.map(|e| self.parse_expression(*e).map(Box::new)).transpose()
                };
                Ok(Expr::Slice {
                    lower: parse_part(lower)?,
                    upper: parse_part(upper)?,
                    step: parse_part(step)?,
                })
            }
            AstExpr::List(ast::ExprList { elts, .. }) => Ok(Expr::List(self.parse_expressions(elts)?)),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Ok(Expr::Tuple(self.parse_expressions(elts)?)),
            AstExpr::Set(ast::ExprSet { elts, .. }) => Ok(Expr::Set(self.parse_expressions(elts)?)),
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut pairs = Vec::with_capacity(items.len());
                for ast::DictItem { key, value } in items {
                    let Some(key) = key else {
                        return Ok(Expr::Forbidden(policy::DOUBLE_STARRED));
                    };
                    pairs.push((self.parse_expression(key)?, self.parse_expression(value)?));
                }
                Ok(Expr::Dict(pairs))
            }
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => Ok(Expr::Op {
                left: Box::new(self.parse_expression(*left)?),
                op: convert_op(&op),
                right: Box::new(self.parse_expression(*right)?),
            }),
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => Ok(Expr::BoolOp {
                op: match op {
                    BoolOp::And => BoolOperator::And,
                    BoolOp::Or => BoolOperator::Or,
                },
                values: self.parse_expressions(values)?,
            }),
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => Ok(Expr::Unary {
                op: match op {
                    UnaryOp::Not => UnaryOperator::Not,
                    UnaryOp::USub => UnaryOperator::Minus,
                    UnaryOp::UAdd => UnaryOperator::Plus,
                    UnaryOp::Invert => UnaryOperator::Invert,
                },
                operand: Box::new(self.parse_expression(*operand)?),
            }),
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => {
                let left = Box::new(self.parse_expression(*left)?);
                let mut comparisons = Vec::with_capacity(ops.len());
                for (op, comparator) in ops.iter().zip(comparators.into_vec()) {
                    comparisons.push((convert_cmp_op(op), self.parse_expression(comparator)?));
                }
                Ok(Expr::Compare { left, comparisons })
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => Ok(Expr::IfElse {
                test: Box::new(self.parse_expression(*test)?),
                body: Box::new(self.parse_expression(*body)?),
                or_else: Box::new(self.parse_expression(*orelse)?),
            }),
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let func = Box::new(self.parse_expression(*func)?);
                let args = self.parse_expressions(arguments.args.into_vec())?;
                let mut kwargs = Vec::with_capacity(arguments.keywords.len());
                for keyword in arguments.keywords {
                    let Some(name) = keyword.arg else {
                        return Ok(Expr::Forbidden(policy::DOUBLE_STARRED));
                    };
                    kwargs.push((name.id().to_string().into(), self.parse_expression(keyword.value)?));
                }
                Ok(Expr::Call { func, args, kwargs })
            }
            AstExpr::ListComp(ast::ExprListComp { elt, generators, .. }) => {
                match self.parse_comprehensions(generators)? {
                    Ok(generators) => Ok(Expr::ListComp {
                        elt: Box::new(self.parse_expression(*elt)?),
                        generators,
                    }),
                    Err(message) => Ok(Expr::Forbidden(message)),
                }
            }
            AstExpr::SetComp(ast::ExprSetComp { elt, generators, .. }) => {
                match self.parse_comprehensions(generators)? {
                    Ok(generators) => Ok(Expr::SetComp {
                        elt: Box::new(self.parse_expression(*elt)?),
                        generators,
                    }),
                    Err(message) => Ok(Expr::Forbidden(message)),
                }
            }
            AstExpr::DictComp(ast::ExprDictComp {
                key, value, generators, ..
            }) => {
                let Some(key) = key else {
                    return Ok(Expr::Forbidden(policy::UNSUPPORTED));
                };
                match self.parse_comprehensions(generators)? {
                    Ok(generators) => Ok(Expr::DictComp {
                        key: Box::new(self.parse_expression(*key)?),
                        value: Box::new(self.parse_expression(*value)?),
                        generators,
                    }),
                    Err(message) => Ok(Expr::Forbidden(message)),
                }
            }
            _ => Ok(Expr::Forbidden(policy::UNSUPPORTED)),
        }
    }

    fn parse_comprehensions(
        &self,
        generators: Vec<ast::Comprehension>,
    ) -> RunResult<Target<Vec<Comprehension>>> {
        let mut lowered = Vec::with_capacity(generators.len());
        for generator in generators {
            if generator.is_async {
                return Ok(Err(policy::ASYNC_FOR));
            }
            let target = match self.parse_target(generator.target)? {
                Ok(target) => target,
                Err(message) => return Ok(Err(message)),
            };
            lowered.push(Comprehension {
                target,
                iter: self.parse_expression(generator.iter)?,
                ifs: self.parse_expressions(generator.ifs)?,
            });
        }
        Ok(Ok(lowered))
    }

    /// Lowers an f-string into parts; a single literal part collapses to a
    /// plain string literal.
    fn parse_fstring(&self, value: &ast::FStringValue) -> RunResult<Expr> {
        let mut parts = Vec::new();
        for fstring_part in value {
            match fstring_part {
                ast::FStringPart::Literal(literal) => {
                    let text = literal.value.to_string();
                    if !text.is_empty() {
                        parts.push(FStringPart::Literal(text.into()));
                    }
                }
                ast::FStringPart::FString(fstring) => {
                    for element in &fstring.elements {
                        parts.push(self.parse_fstring_element(element)?);
                    }
                }
            }
        }
        if parts.len() == 1
            && let FStringPart::Literal(text) = &parts[0]
        {
            return Ok(Expr::Literal(Literal::Str(text.clone())));
        }
        Ok(Expr::FString(parts))
    }

    fn parse_fstring_element(&self, element: &InterpolatedStringElement) -> RunResult<FStringPart> {
        match element {
            InterpolatedStringElement::Literal(literal) => {
                Ok(FStringPart::Literal(literal.value.to_string().into()))
            }
            InterpolatedStringElement::Interpolation(interpolation) => {
                let expr = Box::new(self.parse_expression((*interpolation.expression).clone())?);
                let conversion = match interpolation.conversion {
                    RuffConversionFlag::None => ConversionFlag::None,
                    RuffConversionFlag::Str => ConversionFlag::Str,
                    RuffConversionFlag::Ascii => ConversionFlag::Ascii,
                    RuffConversionFlag::Repr => ConversionFlag::Repr,
                };
                let format_spec = match &interpolation.format_spec {
                    Some(spec) => Some(self.parse_format_spec(spec)?),
                    None => None,
                };
                let debug_prefix = interpolation.debug_text.as_ref().map(|debug| {
                    let expr_text = &self.code[interpolation.expression.range()];
                    format!("{}{}{}", debug.leading(), expr_text, debug.trailing()).into()
                });
                Ok(FStringPart::Interpolation {
                    expr,
                    conversion,
                    format_spec,
                    debug_prefix,
                })
            }
        }
    }

    /// A spec with interpolations stays dynamic; plain text is kept as-is
    /// and parsed at evaluation time.
    fn parse_format_spec(&self, spec: &ast::InterpolatedStringFormatSpec) -> RunResult<FormatSpec> {
        let mut parts = Vec::new();
        let mut dynamic = false;
        for element in &spec.elements {
            let part = self.parse_fstring_element(element)?;
            dynamic |= matches!(part, FStringPart::Interpolation { .. });
            parts.push(part);
        }
        if dynamic {
            return Ok(FormatSpec::Dynamic(parts));
        }
        let text: String = parts
            .iter()
            .map(|part| match part {
                FStringPart::Literal(text) => text.as_ref(),
                FStringPart::Interpolation { .. } => unreachable!("checked above"),
            })
            .collect();
        Ok(FormatSpec::Static(text.into()))
    }
}

fn convert_op(op: &AstOperator) -> Operator {
    match op {
        AstOperator::Add => Operator::Add,
        AstOperator::Sub => Operator::Sub,
        AstOperator::Mult => Operator::Mult,
        AstOperator::MatMult => Operator::MatMult,
        AstOperator::Div => Operator::Div,
        AstOperator::Mod => Operator::Mod,
        AstOperator::Pow => Operator::Pow,
        AstOperator::LShift => Operator::LShift,
        AstOperator::RShift => Operator::RShift,
        AstOperator::BitOr => Operator::BitOr,
        AstOperator::BitXor => Operator::BitXor,
        AstOperator::BitAnd => Operator::BitAnd,
        AstOperator::FloorDiv => Operator::FloorDiv,
    }
}

fn convert_cmp_op(op: &CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

/// Parses an integer literal that exceeded i64, handling radix prefixes
/// (0x, 0o, 0b) and underscores.
fn parse_int_literal(text: &str) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let (digits, radix) = match cleaned.get(..2) {
        Some("0x" | "0X") => (&cleaned[2..], 16),
        Some("0o" | "0O") => (&cleaned[2..], 8),
        Some("0b" | "0B") => (&cleaned[2..], 2),
        _ => (cleaned.as_str(), 10),
    };
    BigInt::parse_bytes(digits.as_bytes(), radix)
}
