pub(crate) mod datetime_types;
mod decimal;

pub use decimal::{Decimal, ParseDecimalError};
pub(crate) use decimal::DecimalError;
