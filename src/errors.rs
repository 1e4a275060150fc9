use std::fmt;

use thiserror::Error;

use crate::engine::Category;

/// Protocol-level failures detected before a request reaches the dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
}

impl AppError {
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }
}

/// Registration-time failures. Any of these is fatal to startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate {category} name: {name}")]
    DuplicateName { category: Category, name: String },
    #[error("resource template `{template}` conflicts with registered template `{existing}`")]
    Conflict { template: String, existing: String },
    #[error("invalid {category} descriptor `{name}`: {reason}")]
    InvalidDescriptor {
        category: Category,
        name: String,
        reason: String,
    },
}

impl RegistryError {
    pub fn invalid(category: Category, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            category,
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    Missing,
    TypeMismatch { found: &'static str },
    ElementMismatch { index: usize, found: &'static str },
    ValueMismatch { key: String, found: &'static str },
    Unknown,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing required argument"),
            Self::TypeMismatch { found } => write!(f, "found {found}"),
            Self::ElementMismatch { index, found } => write!(f, "element {index} is {found}"),
            Self::ValueMismatch { key, found } => write!(f, "value for key `{key}` is {found}"),
            Self::Unknown => write!(f, "unknown argument"),
        }
    }
}

/// A malformed argument bag, reported before any handler code runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument `{parameter}`: {reason}, expected {expected}")]
pub struct ValidationError {
    pub parameter: String,
    pub expected: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self.reason {
            ValidationReason::Missing => "missing_argument",
            ValidationReason::Unknown => "unknown_argument",
            _ => "invalid_argument",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Domain,
    Internal,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Domain => "domain",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Failure of a single invocation, as surfaced to the caller.
///
/// `Internal` carries no payload. Fault details are logged where the fault is
/// observed and never cross the transport boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    #[error("{category} not found: {name}")]
    NotFound { category: Category, name: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Domain(String),
    #[error("internal error")]
    Internal,
    #[error("invocation cancelled")]
    Cancelled,
}

impl InvocationError {
    pub fn not_found(category: Category, name: impl Into<String>) -> Self {
        Self::NotFound {
            category,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Domain(_) => ErrorKind::Domain,
            Self::Internal => ErrorKind::Internal,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Emission on a progress channel whose invocation already ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("progress channel closed")]
pub struct ChannelClosed;
