//! Error model for the evaluator.
//!
//! Two kinds of failure cross the public boundary:
//! - [`Exception::BadSyntax`] — a policy denial. The message text is part of
//!   the contract; callers and tests match on it.
//! - everything else — host-style runtime errors ([`Exception::Raised`]) and
//!   unbound-name lookups ([`Exception::NameLookup`]), which pass through
//!   unwrapped.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, Exception>;

/// Runtime exception types the evaluator can raise.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string representation matches the variant name exactly
/// (e.g. `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcType {
    TypeError,
    ValueError,
    AttributeError,
    IndexError,
    KeyError,
    ZeroDivisionError,
    OverflowError,
    SyntaxError,
}

/// A runtime exception: a type plus a message, formatted `Type: message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleException {
    pub exc_type: ExcType,
    pub message: String,
}

impl SimpleException {
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: message.into(),
        }
    }
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.exc_type)
        } else {
            write!(f, "{}: {}", self.exc_type, self.message)
        }
    }
}

/// Any failure that aborts a `run`/`calculate` invocation.
///
/// Denials and host errors abort immediately; the environment retains only
/// effects from statements fully completed before the failing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// A syntax-policy denial. The message is stable and user-visible.
    BadSyntax(String),
    /// A name was not bound in any scope. Carries the bare name.
    NameLookup(String),
    /// A runtime error, passed through to the caller unwrapped.
    Raised(SimpleException),
}

impl Exception {
    pub(crate) fn bad_syntax(message: impl Into<String>) -> Self {
        Self::BadSyntax(message.into())
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::TypeError, message))
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::ValueError, message))
    }

    pub(crate) fn attribute_error(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::AttributeError, message))
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::IndexError, message))
    }

    pub(crate) fn key_error(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::KeyError, message))
    }

    pub(crate) fn zero_division(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::ZeroDivisionError, message))
    }

    pub(crate) fn overflow(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::OverflowError, message))
    }

    pub(crate) fn syntax_error(message: impl Into<String>) -> Self {
        Self::Raised(SimpleException::new(ExcType::SyntaxError, message))
    }

    /// The exception type for [`Exception::Raised`], `None` otherwise.
    pub fn exc_type(&self) -> Option<ExcType> {
        match self {
            Self::Raised(e) => Some(e.exc_type),
            _ => None,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSyntax(message) => write!(f, "BadSyntax: {message}"),
            Self::NameLookup(name) => write!(f, "NameError: name '{name}' is not defined"),
            Self::Raised(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Exception {}

impl From<SimpleException> for Exception {
    fn from(e: SimpleException) -> Self {
        Self::Raised(e)
    }
}
