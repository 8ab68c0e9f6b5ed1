//! Error types.
//!
//! Every operation either succeeds or returns a [`CfError`]. Callers that
//! speak the errno convention can use [`CfError::code`] to get the negative
//! integer form.

use std::io;
use thiserror::Error;

/// Error type for protocol and handle operations.
#[derive(Debug, Error)]
pub enum CfError {
    /// OS-level failure from open/read/write/seek/stat/sync/close.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation the protocol declines to implement.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    /// Option rejected at configuration time.
    #[error("invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name as given by the caller.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No protocol registered for the URL's scheme.
    #[error("protocol not found: {0}")]
    UnknownProtocol(String),

    /// Configuration document could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl CfError {
    /// Create a NotSupported error.
    pub fn not_supported(op: &'static str) -> Self {
        Self::NotSupported(op)
    }

    /// Create an InvalidOption error.
    pub fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnknownProtocol error.
    pub fn unknown_protocol(scheme: impl Into<String>) -> Self {
        Self::UnknownProtocol(scheme.into())
    }

    /// Negative errno-style code for this error.
    ///
    /// OS errors carry their platform value. I/O errors synthesized by std
    /// without an errno (e.g. `WriteZero`) map to `-EIO`.
    pub fn code(&self) -> i32 {
        let errno = match self {
            CfError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            CfError::NotSupported(_) => libc::ENOSYS,
            CfError::InvalidOption { .. } | CfError::Config(_) => libc::EINVAL,
            CfError::UnknownProtocol(_) => libc::ENOENT,
        };
        -errno
    }

    /// Returns true for the fixed "not supported" signal.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, CfError::NotSupported(_))
    }
}

impl From<rustix::io::Errno> for CfError {
    fn from(e: rustix::io::Errno) -> Self {
        CfError::Io(e.into())
    }
}

/// Convert CfError to std::io::Error for compatibility.
impl From<CfError> for io::Error {
    fn from(e: CfError) -> Self {
        match e {
            CfError::Io(e) => e,
            CfError::NotSupported(op) => io::Error::new(io::ErrorKind::Unsupported, op),
            CfError::InvalidOption { name, reason } => {
                io::Error::new(io::ErrorKind::InvalidInput, format!("{name}: {reason}"))
            }
            CfError::UnknownProtocol(scheme) => io::Error::new(io::ErrorKind::NotFound, scheme),
            CfError::Config(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
        }
    }
}

/// Result type for protocol and handle operations.
pub type CfResult<T> = Result<T, CfError>;
