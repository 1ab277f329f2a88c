//! Netfilter netlink sub-header.
//!
//! NETLINK_NETFILTER messages carry a 4-byte `nfgenmsg` right after the
//! standard netlink header:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ nlmsghdr (16 bytes, host byte order)    │
//! │   nlmsg_len, nlmsg_type (subsys << 8 |  │
//! │   msg), nlmsg_flags, nlmsg_seq, pid     │
//! ├─────────────────────────────────────────┤
//! │ nfgenmsg (4 bytes)                      │
//! │   family (u8), version (u8),            │
//! │   res_id (be16, the log group)          │
//! ├─────────────────────────────────────────┤
//! │ Attributes (TLV format)                 │
//! └─────────────────────────────────────────┘
//! ```

use std::mem;

use zerocopy::byteorder::network_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};
use crate::types::NFNETLINK_V0;

/// Netfilter netlink sub-header (mirrors struct nfgenmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NfGenMsg {
    /// Address family.
    pub family: u8,
    /// nfnetlink version.
    pub version: u8,
    /// Resource id, the log group for NFLOG.
    pub res_id: U16,
}

/// Size of the nfgenmsg header in bytes.
pub const NFGEN_HDRLEN: usize = mem::size_of::<NfGenMsg>();

impl NfGenMsg {
    /// Create a new header for the given family and resource id.
    #[inline]
    pub fn new(family: u8, res_id: u16) -> Self {
        Self {
            family,
            version: NFNETLINK_V0,
            res_id: U16::new(res_id),
        }
    }

    /// Get the resource id in host byte order.
    #[inline]
    pub fn res_id(&self) -> u16 {
        self.res_id.get()
    }

    /// Split a message payload into its header and the attribute bytes that follow.
    pub fn split(payload: &[u8]) -> Result<(&Self, &[u8])> {
        Self::ref_from_prefix(payload).map_err(|_| Error::Truncated {
            expected: NFGEN_HDRLEN,
            actual: payload.len(),
        })
    }

    /// Get the header as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(NFGEN_HDRLEN, 4);
    }

    #[test]
    fn test_group_is_big_endian() {
        let hdr = NfGenMsg::new(libc::AF_INET as u8, 0x0102);
        assert_eq!(hdr.as_bytes(), &[0x02, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_split() {
        let data = [0x0a, 0x00, 0x00, 0x0a, 0xff];
        let (hdr, rest) = NfGenMsg::split(&data).unwrap();
        assert_eq!(hdr.family, 10);
        assert_eq!(hdr.res_id(), 10);
        assert_eq!(rest, &[0xff]);
    }

    #[test]
    fn test_split_too_short() {
        assert!(NfGenMsg::split(&[0x02, 0x00, 0x00]).unwrap_err().is_malformed());
    }
}
