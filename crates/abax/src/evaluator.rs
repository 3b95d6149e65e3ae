//! The tree-walking evaluator.
//!
//! A recursive dispatch over the lowered AST. Policy denials are already
//! embedded as `Forbidden` nodes, so evaluation of one raises `BadSyntax`
//! at exactly the point the offending node would have taken effect —
//! statements completed before it keep their effects.
//!
//! Control flow uses a single interrupt slot instead of host exceptions:
//! `break`/`continue` set it, the nearest enclosing loop consumes it (a
//! break skips the loop's `else:`), and bare expression statements record
//! their value in it as the terminal value returned to the caller.

use std::rc::Rc;

use crate::{
    args::CallArgs,
    attrs::AttributePolicy,
    builtins::{self, Builtin},
    environment::{Scopes, SymbolTable},
    exception::{Exception, RunResult},
    expressions::{
        AssignTarget, BoolOperator, CmpOperator, Comprehension, DeleteTarget, Expr, Literal, Node, Operator,
        UnaryOperator,
    },
    fstring::{self, ConversionFlag, FStringPart, FormatSpec},
    methods,
    modules::math,
    numeric::{NumericDomain, domain_for},
    parse, policy,
    types::datetime_types,
    value::{ClassKind, SliceValue, Value, compare_numeric, container_op, is_numeric, value_ordering},
};

/// Contents of the control-flow interrupt slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    /// Set by `break`; consumed by the nearest loop, skipping its `else:`.
    Break,
    /// Set by `continue`; consumed by the nearest loop.
    Continue,
    /// Value of the last bare expression statement. Not control flow.
    Terminal(Value),
}

/// A reusable evaluator with a persistent symbol table.
///
/// Each [`run`](Self::run) call evaluates a fragment against
/// `symbol_table`, which survives across calls; comprehension shadow
/// scopes are transient. `current_interrupt` exposes the interrupt slot as
/// it stood when the last run ended.
#[derive(Debug)]
pub struct Evaluator {
    /// The persistent base environment, readable and writable by callers.
    pub symbol_table: SymbolTable,
    /// Last observed top-level interrupt.
    pub current_interrupt: Option<Interrupt>,
    /// The attribute filter consulted for every attribute read.
    pub attribute_policy: AttributePolicy,
    scopes: Scopes,
    domain: &'static dyn NumericDomain,
    interrupt: Option<Interrupt>,
}

/// The binding set the bot ships with: `math`, `date`, `datetime` and the
/// safe builtins. This is configuration, not contract — callers may seed
/// any table they like.
pub fn default_symbol_table() -> SymbolTable {
    let mut table = SymbolTable::new();
    table.insert("math".to_string(), Value::MathModule);
    table.insert("date".to_string(), Value::Class(ClassKind::Date));
    table.insert("datetime".to_string(), Value::Class(ClassKind::Datetime));
    for builtin in [
        Builtin::Round,
        Builtin::Max,
        Builtin::Min,
        Builtin::Len,
        Builtin::Abs,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::List,
        Builtin::Tuple,
        Builtin::Set,
        Builtin::Dict,
    ] {
        table.insert(builtin.to_string(), Value::Builtin(builtin));
    }
    table
}

/// Parses and evaluates `source` against a freshly seeded environment.
///
/// Returns the value of the last expression statement (`Value::None` when
/// there is none) together with the environment delta against the default
/// seed.
pub fn calculate(source: &str, decimal_mode: bool) -> Result<(Value, SymbolTable), Exception> {
    let seed = default_symbol_table();
    let mut evaluator = Evaluator::with_default_symbols(decimal_mode);
    let value = evaluator.run(source)?;
    let locals = evaluator
        .symbol_table
        .into_iter()
        .filter(|(name, value)| seed.get(name).is_none_or(|seeded| !seeded.py_eq(value)))
        .collect();
    Ok((value, locals))
}

impl Evaluator {
    /// An evaluator with an empty symbol table and the default attribute
    /// policy.
    pub fn new(decimal_mode: bool) -> Self {
        Self {
            symbol_table: SymbolTable::new(),
            current_interrupt: None,
            attribute_policy: AttributePolicy::default(),
            scopes: Scopes::default(),
            domain: domain_for(decimal_mode),
            interrupt: None,
        }
    }

    /// An evaluator pre-seeded with [`default_symbol_table`].
    pub fn with_default_symbols(decimal_mode: bool) -> Self {
        let mut evaluator = Self::new(decimal_mode);
        evaluator.symbol_table = default_symbol_table();
        evaluator
    }

    /// Evaluates a fragment against the persistent symbol table.
    ///
    /// On error the symbol table keeps only the effects of statements
    /// completed before the failing one.
    pub fn run(&mut self, source: &str) -> Result<Value, Exception> {
        let nodes = parse::parse(source)?;
        self.scopes.clear();
        self.interrupt = None;
        let result = self.eval_block(&nodes);
        self.scopes.clear();
        self.current_interrupt = self.interrupt.take();
        result?;
        Ok(match &self.current_interrupt {
            Some(Interrupt::Terminal(value)) => value.clone(),
            _ => Value::None,
        })
    }

    fn eval_block(&mut self, nodes: &[Node]) -> RunResult<()> {
        for node in nodes {
            self.eval_node(node)?;
            if matches!(self.interrupt, Some(Interrupt::Break | Interrupt::Continue)) {
                break;
            }
        }
        Ok(())
    }

    fn eval_node(&mut self, node: &Node) -> RunResult<()> {
        match node {
            Node::Pass => Ok(()),
            Node::Forbidden(message) => Err(Exception::bad_syntax(*message)),
            Node::Expr(expr) => {
                let value = self.eval_expr(expr)?;
                self.interrupt = Some(Interrupt::Terminal(value));
                Ok(())
            }
            Node::Assign { targets, value } => {
                let value = self.eval_expr(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
                Ok(())
            }
            Node::AugAssign { target, op, value } => self.eval_aug_assign(target, *op, value),
            Node::Delete { targets } => {
                for target in targets {
                    self.delete_target(target)?;
                }
                Ok(())
            }
            Node::If { test, body, or_else } => {
                if self.eval_expr(test)?.py_bool() {
                    self.eval_block(body)
                } else {
                    self.eval_block(or_else)
                }
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => self.eval_for(target, iter, body, or_else),
            Node::While { test, body, or_else } => self.eval_while(test, body, or_else),
            Node::Break => {
                self.interrupt = Some(Interrupt::Break);
                Ok(())
            }
            Node::Continue => {
                self.interrupt = Some(Interrupt::Continue);
                Ok(())
            }
        }
    }

    fn eval_for(&mut self, target: &AssignTarget, iter: &Expr, body: &[Node], or_else: &[Node]) -> RunResult<()> {
        let items = self.eval_expr(iter)?.iterate()?;
        for item in items {
            self.assign_target(target, item)?;
            self.eval_block(body)?;
            match self.interrupt {
                Some(Interrupt::Continue) => self.interrupt = None,
                Some(Interrupt::Break) => {
                    self.interrupt = None;
                    return Ok(());
                }
                _ => {}
            }
        }
        self.eval_block(or_else)
    }

    fn eval_while(&mut self, test: &Expr, body: &[Node], or_else: &[Node]) -> RunResult<()> {
        loop {
            if !self.eval_expr(test)?.py_bool() {
                return self.eval_block(or_else);
            }
            self.eval_block(body)?;
            match self.interrupt {
                Some(Interrupt::Continue) => self.interrupt = None,
                Some(Interrupt::Break) => {
                    self.interrupt = None;
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    fn assign_target(&mut self, target: &AssignTarget, value: Value) -> RunResult<()> {
        match target {
            AssignTarget::Name(name) => {
                self.scopes.bind(&mut self.symbol_table, name, value);
                Ok(())
            }
            AssignTarget::Unpack(targets) => {
                let items = value.iterate().map_err(|_| {
                    Exception::type_error(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_().name()
                    ))
                })?;
                if items.len() < targets.len() {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                if items.len() > targets.len() {
                    return Err(Exception::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign_target(target, item)?;
                }
                Ok(())
            }
            AssignTarget::Subscript { name, index } => {
                let index = self.eval_expr(index)?;
                if matches!(index, Value::Slice(_)) {
                    return Err(Exception::bad_syntax(policy::ASSIGN_TARGET));
                }
                let container = self.scopes.lookup(&self.symbol_table, name)?;
                container.set_item(&index, value)
            }
        }
    }

    fn eval_aug_assign(&mut self, target: &AssignTarget, op: Operator, value: &Expr) -> RunResult<()> {
        match target {
            AssignTarget::Name(name) => {
                let current = self.scopes.lookup(&self.symbol_table, name)?;
                let value = self.eval_expr(value)?;
                let result = self.binary_op(op, &current, &value)?;
                self.scopes.bind(&mut self.symbol_table, name, result);
                Ok(())
            }
            AssignTarget::Subscript { name, index } => {
                let index = self.eval_expr(index)?;
                if matches!(index, Value::Slice(_)) {
                    return Err(Exception::bad_syntax(policy::ASSIGN_TARGET));
                }
                let container = self.scopes.lookup(&self.symbol_table, name)?;
                let current = container.get_item(&index)?;
                let value = self.eval_expr(value)?;
                let result = self.binary_op(op, &current, &value)?;
                container.set_item(&index, result)
            }
            AssignTarget::Unpack(_) => Err(Exception::bad_syntax(policy::ASSIGN_TARGET)),
        }
    }

    fn delete_target(&mut self, target: &DeleteTarget) -> RunResult<()> {
        match target {
            DeleteTarget::Name(name) => self.scopes.unbind(&mut self.symbol_table, name),
            DeleteTarget::Subscript { name, index } => {
                let index = self.eval_expr(index)?;
                if matches!(index, Value::Slice(_)) {
                    return Err(Exception::bad_syntax(policy::DELETE_TARGET));
                }
                let container = self.scopes.lookup(&self.symbol_table, name)?;
                container.del_item(&index)
            }
        }
    }

    fn eval_list(&mut self, exprs: &[Expr]) -> RunResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval_expr(expr)).collect()
    }

    fn eval_expr(&mut self, expr: &Expr) -> RunResult<Value> {
        match expr {
            Expr::Forbidden(message) => Err(Exception::bad_syntax(*message)),
            Expr::Literal(literal) => self.eval_literal(literal),
            Expr::Name(name) => self.scopes.lookup(&self.symbol_table, name),
            Expr::Attribute { object, attr } => {
                let object = self.eval_expr(object)?;
                self.get_attr(&object, attr)
            }
            Expr::Subscript { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                object.get_item(&index)
            }
            Expr::Slice { lower, upper, step } => {
                let start = self.eval_optional(lower.as_deref())?;
                let stop = self.eval_optional(upper.as_deref())?;
                let step = self.eval_optional(step.as_deref())?;
                Ok(Value::Slice(Rc::new(SliceValue { start, stop, step })))
            }
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_list(items)?)),
            Expr::List(items) => Ok(Value::list(self.eval_list(items)?)),
            Expr::Set(items) => Value::set_of(self.eval_list(items)?),
            Expr::Dict(pairs) => {
                let mut evaluated = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    evaluated.push((self.eval_expr(key)?, self.eval_expr(value)?));
                }
                Value::dict_of(evaluated)
            }
            Expr::Op { left, op, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                self.binary_op(*op, &left, &right)
            }
            Expr::BoolOp { op, values } => {
                let (last, rest) = values.split_last().expect("boolean op has operands");
                for value in rest {
                    let evaluated = self.eval_expr(value)?;
                    let truthy = evaluated.py_bool();
                    let short_circuit = match op {
                        BoolOperator::And => !truthy,
                        BoolOperator::Or => truthy,
                    };
                    if short_circuit {
                        return Ok(evaluated);
                    }
                }
                self.eval_expr(last)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval_expr(operand)?;
                match op {
                    UnaryOperator::Not => Ok(Value::Bool(!operand.py_bool())),
                    _ => self.domain.unary(*op, &operand),
                }
            }
            Expr::Compare { left, comparisons } => {
                let mut previous = self.eval_expr(left)?;
                for (op, rhs) in comparisons {
                    let current = self.eval_expr(rhs)?;
                    if !compare(*op, &previous, &current)? {
                        return Ok(Value::Bool(false));
                    }
                    previous = current;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfElse { test, body, or_else } => {
                if self.eval_expr(test)?.py_bool() {
                    self.eval_expr(body)
                } else {
                    self.eval_expr(or_else)
                }
            }
            Expr::Call { func, args, kwargs } => self.eval_call(func, args, kwargs),
            Expr::ListComp { elt, generators } => {
                let mut items = Vec::new();
                self.eval_comprehension(generators, &mut |evaluator| {
                    items.push(evaluator.eval_expr(elt)?);
                    Ok(())
                })?;
                Ok(Value::list(items))
            }
            Expr::SetComp { elt, generators } => {
                let mut items = Vec::new();
                self.eval_comprehension(generators, &mut |evaluator| {
                    items.push(evaluator.eval_expr(elt)?);
                    Ok(())
                })?;
                Value::set_of(items)
            }
            Expr::DictComp { key, value, generators } => {
                let mut pairs = Vec::new();
                self.eval_comprehension(generators, &mut |evaluator| {
                    let entry_key = evaluator.eval_expr(key)?;
                    let entry_value = evaluator.eval_expr(value)?;
                    pairs.push((entry_key, entry_value));
                    Ok(())
                })?;
                Value::dict_of(pairs)
            }
            Expr::FString(parts) => {
                let mut out = String::new();
                self.build_fstring(parts, &mut out)?;
                Ok(Value::Str(out.into()))
            }
        }
    }

    fn eval_optional(&mut self, expr: Option<&Expr>) -> RunResult<Value> {
        match expr {
            Some(expr) => self.eval_expr(expr),
            None => Ok(Value::None),
        }
    }

    fn eval_literal(&mut self, literal: &Literal) -> RunResult<Value> {
        Ok(match literal {
            Literal::None => Value::None,
            Literal::Ellipsis => Value::Ellipsis,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => self.domain.from_int(n.clone()),
            Literal::Float { value, text } => self.domain.from_float_literal(*value, text)?,
            Literal::Str(s) => self.domain.from_str_literal(s),
            Literal::Bytes(b) => self.domain.from_bytes_literal(b),
        })
    }

    /// Attribute read: the filter first, then resolution.
    fn get_attr(&self, object: &Value, name: &str) -> RunResult<Value> {
        self.attribute_policy.check(object, name)?;
        methods::resolve_attr(object, name).ok_or_else(|| {
            Exception::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                object.type_().name()
            ))
        })
    }

    fn eval_call(&mut self, func: &Expr, args: &[Expr], kwargs: &[(Box<str>, Expr)]) -> RunResult<Value> {
        let callee = self.eval_expr(func)?;
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(self.eval_expr(arg)?);
        }
        let mut keywords = Vec::with_capacity(kwargs.len());
        for (name, value) in kwargs {
            keywords.push((name.to_string(), self.eval_expr(value)?));
        }
        let call_args = CallArgs::new(positional, keywords);
        match &callee {
            Value::Builtin(builtin) => builtins::call(*builtin, call_args),
            Value::MathFunction(function) => math::call(*function, call_args),
            Value::Class(ClassKind::Date) => datetime_types::date_new(call_args),
            Value::Class(ClassKind::Datetime) => datetime_types::datetime_new(call_args),
            Value::BoundMethod(bound) => methods::call_method(&bound.receiver, bound.method, call_args),
            _ => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                callee.type_().name()
            ))),
        }
    }

    /// One shadow frame for the whole comprehension, popped on every path.
    fn eval_comprehension(
        &mut self,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self) -> RunResult<()>,
    ) -> RunResult<()> {
        self.scopes.push();
        let result = self.comprehension_clause(generators, emit);
        self.scopes.pop();
        result
    }

    fn comprehension_clause(
        &mut self,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self) -> RunResult<()>,
    ) -> RunResult<()> {
        let Some((generator, rest)) = generators.split_first() else {
            return emit(self);
        };
        let items = self.eval_expr(&generator.iter)?.iterate()?;
        'items: for item in items {
            self.assign_target(&generator.target, item)?;
            for condition in &generator.ifs {
                if !self.eval_expr(condition)?.py_bool() {
                    continue 'items;
                }
            }
            self.comprehension_clause(rest, emit)?;
        }
        Ok(())
    }

    fn build_fstring(&mut self, parts: &[FStringPart], out: &mut String) -> RunResult<()> {
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Interpolation {
                    expr,
                    conversion,
                    format_spec,
                    debug_prefix,
                } => {
                    let value = self.eval_expr(expr)?;
                    if let Some(prefix) = debug_prefix {
                        out.push_str(prefix);
                    }
                    // Bare `{x=}` debug specs default to repr.
                    let conversion = if *conversion == ConversionFlag::None
                        && debug_prefix.is_some()
                        && format_spec.is_none()
                    {
                        ConversionFlag::Repr
                    } else {
                        *conversion
                    };
                    let spec = match format_spec {
                        None => fstring::parse_format_spec("")?,
                        Some(FormatSpec::Static(text)) => fstring::parse_format_spec(text)?,
                        Some(FormatSpec::Dynamic(spec_parts)) => {
                            let mut spec_text = String::new();
                            self.build_fstring(spec_parts, &mut spec_text)?;
                            fstring::parse_format_spec(&spec_text)?
                        }
                    };
                    match fstring::apply_conversion(&value, conversion) {
                        Some(text) => out.push_str(&fstring::format_value(&Value::from(text), &spec)?),
                        None => out.push_str(&fstring::format_value(&value, &spec)?),
                    }
                }
            }
        }
        Ok(())
    }

    fn binary_op(&self, op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
        if op == Operator::MatMult {
            return Err(Exception::type_error(format!(
                "unsupported operand type(s) for @: '{}' and '{}'",
                left.type_().name(),
                right.type_().name()
            )));
        }
        if is_numeric(left) && is_numeric(right) {
            return self.domain.binary(op, left, right);
        }
        if let Some(result) = container_op(op, left, right) {
            return result;
        }
        Err(Exception::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_().name(),
            right.type_().name()
        )))
    }
}

/// One comparison step of a (possibly chained) comparison.
fn compare(op: CmpOperator, left: &Value, right: &Value) -> RunResult<bool> {
    use std::cmp::Ordering;

    match op {
        CmpOperator::Eq => Ok(left.py_eq(right)),
        CmpOperator::NotEq => Ok(!left.py_eq(right)),
        CmpOperator::Is => Ok(left.is_identical(right)),
        CmpOperator::IsNot => Ok(!left.is_identical(right)),
        CmpOperator::In => right.contains(left),
        CmpOperator::NotIn => Ok(!right.contains(left)?),
        CmpOperator::Lt | CmpOperator::LtE | CmpOperator::Gt | CmpOperator::GtE => {
            // Set order comparisons are subset relations.
            if let (Value::Set(a), Value::Set(b)) = (left, right) {
                let (a, b) = (a.borrow(), b.borrow());
                let subset = a.iter().all(|key| b.contains(key));
                let superset = b.iter().all(|key| a.contains(key));
                return Ok(match op {
                    CmpOperator::Lt => subset && a.len() < b.len(),
                    CmpOperator::LtE => subset,
                    CmpOperator::Gt => superset && a.len() > b.len(),
                    _ => superset,
                });
            }
            let ordering = if is_numeric(left) && is_numeric(right) {
                // NaN compares false against everything.
                match compare_numeric(left, right) {
                    Some(ordering) => ordering,
                    None => return Ok(false),
                }
            } else {
                let symbol = match op {
                    CmpOperator::Lt => "<",
                    CmpOperator::LtE => "<=",
                    CmpOperator::Gt => ">",
                    _ => ">=",
                };
                value_ordering(left, right, symbol)?
            };
            Ok(match op {
                CmpOperator::Lt => ordering == Ordering::Less,
                CmpOperator::LtE => ordering != Ordering::Greater,
                CmpOperator::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}
