//! Connection configuration and its validation.
//!
//! [`Config`] keeps its fields as raw protocol integers so that any value a
//! caller may pass through (from a CLI, a config file, ...) is representable.
//! [`Config::validate`] checks them against the known enumerations before any
//! socket is created; [`Connection::open`](crate::Connection::open) always
//! runs it first.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use nflog::{Config, CopyMode, LogFlags};
//!
//! let config = Config::new(10)
//!     .copy_mode(CopyMode::Packet)
//!     .copy_range(128)
//!     .flags(LogFlags::SEQ | LogFlags::SEQ_GLOBAL)
//!     .timeout(Duration::from_millis(100))
//!     .sock_buf_size(1 << 21);
//!
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::types::{
    NFULNL_CFG_F_SEQ, NFULNL_CFG_F_SEQ_GLOBAL, NFULNL_COPY_META, NFULNL_COPY_NONE,
    NFULNL_COPY_PACKET, NFULNL_COPY_RANGE_MAX,
};

/// How much of each logged packet the kernel copies to userspace.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// Neither metadata nor payload.
    None = NFULNL_COPY_NONE,
    /// Metadata only.
    Meta = NFULNL_COPY_META,
    /// Metadata and payload (up to the copy range).
    #[default]
    Packet = NFULNL_COPY_PACKET,
}

impl CopyMode {
    /// Get the wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check whether packets logged in this mode carry payload bytes.
    pub fn includes_payload(self) -> bool {
        self == CopyMode::Packet
    }
}

impl TryFrom<u8> for CopyMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            NFULNL_COPY_NONE => Ok(Self::None),
            NFULNL_COPY_META => Ok(Self::Meta),
            NFULNL_COPY_PACKET => Ok(Self::Packet),
            other => Err(Error::InvalidCopyMode(other)),
        }
    }
}

bitflags! {
    /// Per-instance flags accepted by the kernel's flags-set request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LogFlags: u16 {
        /// Attach a per-instance sequence number to every record.
        const SEQ = NFULNL_CFG_F_SEQ;
        /// Attach a global (all instances) sequence number to every record.
        const SEQ_GLOBAL = NFULNL_CFG_F_SEQ_GLOBAL;
    }
}

impl TryFrom<u16> for LogFlags {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        LogFlags::from_bits(value).ok_or(Error::UnknownFlag(value))
    }
}

/// Configuration for an NFLOG connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Log group to bind to.
    pub group: u16,
    /// Copy mode, see [`CopyMode`].
    pub copy_mode: u8,
    /// Maximum payload bytes copied per packet in [`CopyMode::Packet`].
    pub copy_range: u32,
    /// Flag bits, see [`LogFlags`].
    pub flags: u16,
    /// Requested socket receive buffer size in bytes; 0 keeps the platform default.
    pub sock_buf_size: u32,
    /// Protocol family named in the protocol-family bind request.
    pub family: u8,
    /// Kernel-side netlink buffer size for this instance.
    pub nl_buf_size: Option<u32>,
    /// Number of packets the kernel queues before flushing a batch.
    pub qthresh: Option<u32>,
    /// Maximum time the kernel holds a partial batch.
    pub timeout: Option<Duration>,
    /// Ask the kernel not to report receive-buffer overruns (`NETLINK_NO_ENOBUFS`).
    pub no_enobufs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group: 0,
            copy_mode: CopyMode::Packet.as_u8(),
            copy_range: NFULNL_COPY_RANGE_MAX,
            flags: 0,
            sock_buf_size: 0,
            family: libc::AF_INET as u8,
            nl_buf_size: None,
            qthresh: None,
            timeout: None,
            no_enobufs: false,
        }
    }
}

impl Config {
    /// Create a configuration for the given log group.
    pub fn new(group: u16) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }

    /// Set the copy mode.
    pub fn copy_mode(mut self, mode: CopyMode) -> Self {
        self.copy_mode = mode.as_u8();
        self
    }

    /// Set the copy range (payload snap length).
    pub fn copy_range(mut self, range: u32) -> Self {
        self.copy_range = range;
        self
    }

    /// Set the flags.
    pub fn flags(mut self, flags: LogFlags) -> Self {
        self.flags = flags.bits();
        self
    }

    /// Set the requested socket receive buffer size.
    pub fn sock_buf_size(mut self, size: u32) -> Self {
        self.sock_buf_size = size;
        self
    }

    /// Set the protocol family for the protocol-family bind request.
    pub fn family(mut self, family: u8) -> Self {
        self.family = family;
        self
    }

    /// Set the kernel-side netlink buffer size.
    pub fn nl_buf_size(mut self, size: u32) -> Self {
        self.nl_buf_size = Some(size);
        self
    }

    /// Set the queue threshold.
    pub fn qthresh(mut self, qthresh: u32) -> Self {
        self.qthresh = Some(qthresh);
        self
    }

    /// Set the batch flush timeout (sent with 10ms resolution).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Suppress ENOBUFS reporting on the socket.
    pub fn no_enobufs(mut self, enabled: bool) -> Self {
        self.no_enobufs = enabled;
        self
    }

    /// Check copy mode and flags against the known constants.
    pub fn validate(&self) -> Result<()> {
        self.to_params().map(|_| ())
    }

    /// Validate and convert into the typed parameters used by the handshake.
    pub(crate) fn to_params(&self) -> Result<BindParams> {
        let copy_mode = CopyMode::try_from(self.copy_mode)?;
        let flags = LogFlags::try_from(self.flags)?;
        Ok(BindParams {
            group: self.group,
            family: self.family,
            copy_mode,
            copy_range: self.copy_range.min(NFULNL_COPY_RANGE_MAX),
            flags,
            nl_buf_size: self.nl_buf_size,
            qthresh: self.qthresh,
            timeout: self.timeout.map(centiseconds),
        })
    }
}

/// Validated handshake parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BindParams {
    pub group: u16,
    pub family: u8,
    pub copy_mode: CopyMode,
    pub copy_range: u32,
    pub flags: LogFlags,
    pub nl_buf_size: Option<u32>,
    pub qthresh: Option<u32>,
    /// Flush timeout in 1/100 s.
    pub timeout: Option<u32>,
}

fn centiseconds(d: Duration) -> u32 {
    u32::try_from(d.as_millis() / 10).unwrap_or(u32::MAX)
}
