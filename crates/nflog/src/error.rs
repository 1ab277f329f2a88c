//! Error types for NFLOG operations.

use std::io;

/// Result type for NFLOG operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or reading an NFLOG connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Copy mode outside `{none, meta, packet}`.
    #[error("invalid copy mode: {0:#x}")]
    InvalidCopyMode(u8),

    /// Flags value carries bits that are not known configuration flags.
    #[error("unknown flag bits in {0:#06x}")]
    UnknownFlag(u16),

    /// A frame or attribute violates the netlink wire layout.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A frame or attribute is shorter than its fixed header.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The connection has been closed.
    #[error("connection closed")]
    Closed,

    /// The kernel rejected a step of the bind handshake.
    #[error("{operation}: {message} (errno {errno})")]
    Bind {
        /// Handshake step that failed.
        operation: &'static str,
        /// The errno value from the kernel (positive).
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// The netlink socket could not be created or bound.
    #[error("cannot open netlink socket: {0}")]
    Open(#[source] io::Error),

    /// Transport error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a bind error from the (negative) errno carried in an ACK frame.
    pub fn from_errno(errno: i32, operation: &'static str) -> Self {
        let errno = errno.saturating_abs();
        Self::Bind {
            operation,
            errno,
            message: io::Error::from_raw_os_error(errno).to_string(),
        }
    }

    /// Check if this error describes undecodable input.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Truncated { .. })
    }

    /// Check if this error means the connection was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Check if the kernel dropped messages because the receive buffer overflowed (ENOBUFS).
    pub fn is_overrun(&self) -> bool {
        match self {
            Self::Io(e) => e.raw_os_error() == Some(libc::ENOBUFS),
            _ => false,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Get the errno value if one is attached.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Bind { errno, .. } => Some(*errno),
            Self::Open(e) | Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
