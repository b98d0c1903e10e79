// src/error.rs

//! Error types shared by both package manager backends

use std::fmt;
use thiserror::Error;

/// Result type for package manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure code carried by a transaction error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionCode {
    /// Numeric error code reported by the backend
    Backend(u32),
    /// The transaction failed after the caller requested cancellation
    Cancelled,
    /// The service dropped off the bus while the transaction was running
    Closed,
    /// dnf5daemon could not resolve the goal
    Unresolvable(u32),
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(code) => write!(f, "{}", code),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Closed => write!(f, "close"),
            Self::Unresolvable(code) => write!(f, "unresolvable ({})", code),
        }
    }
}

/// Errors raised by backend selection and package manager operations
#[derive(Error, Debug)]
pub enum Error {
    /// Package management is disabled on an immutable OS
    #[error("unsupported platform: package management is disabled on an immutable OS")]
    UnsupportedPlatform,

    /// Neither dnf5daemon nor PackageKit answered the detection probe
    #[error("no package manager found")]
    NoPackageManagerFound,

    /// Backend-reported transaction failure
    #[error("transaction failed ({code}): {detail}")]
    Transaction { code: TransactionCode, detail: String },

    /// A dnf5daemon session could not be opened or closed
    #[error("session error: {0}")]
    Session(String),

    /// D-Bus transport failure
    #[error("D-Bus error: {0}")]
    Bus(String),

    /// Malformed reply from a backend
    #[error("unexpected reply from {backend}: {message}")]
    Protocol { backend: &'static str, message: String },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a transaction error
    pub fn transaction(code: TransactionCode, detail: impl Into<String>) -> Self {
        Self::Transaction {
            code,
            detail: detail.into(),
        }
    }

    /// Build a protocol error
    pub fn protocol(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol {
            backend,
            message: message.into(),
        }
    }

    /// True if this is a transaction that ended because of a cancel request
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Transaction {
                code: TransactionCode::Cancelled,
                ..
            }
        )
    }
}

#[cfg(feature = "dbus")]
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        Self::Bus(err.to_string())
    }
}

#[cfg(feature = "dbus")]
impl From<zbus::fdo::Error> for Error {
    fn from(err: zbus::fdo::Error) -> Self {
        Self::Bus(err.to_string())
    }
}
