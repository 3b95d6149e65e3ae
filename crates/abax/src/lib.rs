#![doc = include_str!("../../../README.md")]

mod args;
mod attrs;
mod builtins;
mod environment;
mod evaluator;
mod exception;
mod expressions;
mod fstring;
mod methods;
mod modules;
mod numeric;
mod parse;
mod policy;
mod types;
mod value;

pub use crate::{
    attrs::AttributePolicy,
    builtins::Builtin,
    environment::SymbolTable,
    evaluator::{Evaluator, Interrupt, calculate, default_symbol_table},
    exception::{ExcType, Exception, SimpleException},
    types::{Decimal, ParseDecimalError},
    value::{ClassKind, SliceValue, Type, Value},
};
