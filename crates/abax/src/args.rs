//! Call argument handling.
//!
//! Arguments are evaluated left-to-right by the evaluator and handed to
//! builtins, methods and constructors as a [`CallArgs`]. Binding against a
//! parameter list reproduces CPython's error messages for arity and
//! keyword mistakes.

use crate::{
    exception::{Exception, RunResult},
    value::Value,
};

/// Evaluated positional and keyword arguments for one call.
#[derive(Debug)]
pub(crate) struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self { positional, keywords }
    }

    pub fn expect_no_kwargs(&self, fname: &str) -> RunResult<()> {
        if let Some((name, _)) = self.keywords.first() {
            return Err(Exception::type_error(format!(
                "{fname}() got an unexpected keyword argument '{name}'"
            )));
        }
        Ok(())
    }

    /// No arguments at all.
    pub fn exactly_none(self, fname: &str) -> RunResult<()> {
        self.expect_no_kwargs(fname)?;
        if !self.positional.is_empty() {
            return Err(Exception::type_error(format!(
                "{fname}() takes no arguments ({} given)",
                self.positional.len()
            )));
        }
        Ok(())
    }

    /// Exactly one positional argument and no keywords.
    pub fn exactly_one(mut self, fname: &str) -> RunResult<Value> {
        self.expect_no_kwargs(fname)?;
        if self.positional.len() != 1 {
            return Err(Exception::type_error(format!(
                "{fname}() takes exactly one argument ({} given)",
                self.positional.len()
            )));
        }
        Ok(self.positional.pop().expect("length checked"))
    }

    /// At most one positional argument and no keywords.
    pub fn at_most_one(mut self, fname: &str) -> RunResult<Option<Value>> {
        self.expect_no_kwargs(fname)?;
        if self.positional.len() > 1 {
            return Err(Exception::type_error(format!(
                "{fname}() takes at most 1 argument ({} given)",
                self.positional.len()
            )));
        }
        Ok(self.positional.pop())
    }

    /// Binds against a named parameter list, the first `required` of which
    /// must be supplied. Returns one slot per parameter.
    pub fn bind(self, fname: &str, params: &[&str], required: usize) -> RunResult<Vec<Option<Value>>> {
        let mut slots: Vec<Option<Value>> = (0..params.len()).map(|_| None).collect();
        if self.positional.len() > params.len() {
            return Err(Exception::type_error(format!(
                "{fname}() takes at most {} arguments ({} given)",
                params.len(),
                self.positional.len()
            )));
        }
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (name, value) in self.keywords {
            let Some(index) = params.iter().position(|p| *p == name) else {
                return Err(Exception::type_error(format!(
                    "{fname}() got an unexpected keyword argument '{name}'"
                )));
            };
            if slots[index].is_some() {
                return Err(Exception::type_error(format!(
                    "{fname}() got multiple values for argument '{name}'"
                )));
            }
            slots[index] = Some(value);
        }
        for (index, param) in params.iter().enumerate().take(required) {
            if slots[index].is_none() {
                return Err(Exception::type_error(format!(
                    "{fname}() missing required argument: '{param}'"
                )));
            }
        }
        Ok(slots)
    }
}
