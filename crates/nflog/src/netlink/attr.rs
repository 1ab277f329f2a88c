//! Netlink attribute (nlattr) encoding and decoding.
//!
//! Attributes are TLV blocks: a 4-byte header (`nla_len`, `nla_type`, host
//! byte order) followed by the payload, padded to a 4-byte boundary.
//! `nla_len` covers header and payload but not the trailing padding. Nested
//! attributes carry [`NLA_F_NESTED`] and their payload is itself a sequence
//! of attributes.
//!
//! Decoding is strict: a header that declares a length smaller than the
//! header itself, or larger than what is left of the buffer, and any tail
//! too short to hold a header, is reported as [`Error::Malformed`] or
//! [`Error::Truncated`]. No slice is ever taken past the input.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct nlattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Deepest nesting [`Attr::to_attribute`] descends into.
pub const MAX_NEST_DEPTH: usize = 32;

impl NlAttr {
    /// Create a new attribute header.
    ///
    /// Returns an error if the payload cannot be described by a 16-bit length.
    pub fn new(attr_type: u16, data_len: usize) -> Result<Self> {
        let len = u16::try_from(NLA_HDRLEN + data_len).map_err(|_| {
            Error::Malformed(format!("attribute payload of {} bytes too large", data_len))
        })?;
        Ok(Self {
            nla_len: len,
            nla_type: attr_type,
        })
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Check if this is a nested attribute.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Read a header from the front of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(hdr, _)| hdr)
            .map_err(|_| Error::Truncated {
                expected: NLA_HDRLEN,
                actual: data.len(),
            })
    }
}

/// A decoded attribute borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr<'a> {
    /// Attribute type with flag bits removed.
    pub kind: u16,
    /// Whether the sender marked the payload as nested attributes.
    pub nested: bool,
    /// Payload without header or padding.
    pub payload: &'a [u8],
}

impl<'a> Attr<'a> {
    /// Iterate over the attributes nested in this attribute's payload.
    pub fn nested_iter(&self) -> AttrIter<'a> {
        AttrIter::new(self.payload)
    }

    /// Convert into an owned [`Attribute`], descending into nested payloads.
    ///
    /// Nesting deeper than [`MAX_NEST_DEPTH`] is reported as malformed.
    pub fn to_attribute(&self) -> Result<Attribute> {
        self.to_attribute_at(0)
    }

    fn to_attribute_at(&self, depth: usize) -> Result<Attribute> {
        let value = if self.nested {
            if depth >= MAX_NEST_DEPTH {
                return Err(Error::Malformed(format!(
                    "attributes nested deeper than {} levels",
                    MAX_NEST_DEPTH
                )));
            }
            AttrValue::Nested(
                self.nested_iter()
                    .map(|a| a.and_then(|a| a.to_attribute_at(depth + 1)))
                    .collect::<Result<_>>()?,
            )
        } else {
            AttrValue::Bytes(self.payload.to_vec())
        };
        Ok(Attribute {
            kind: self.kind,
            value,
        })
    }
}

/// Iterator over netlink attributes in a buffer.
///
/// Yields at most one error, after which it is exhausted.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Check if there are no more bytes to decode.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn fail(&mut self, err: Error) -> Option<Result<Attr<'a>>> {
        self.data = &[];
        Some(Err(err))
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = Result<Attr<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let hdr = match NlAttr::from_bytes(self.data) {
            Ok(h) => h,
            Err(e) => return self.fail(e),
        };

        let len = hdr.nla_len as usize;
        if len < NLA_HDRLEN {
            return self.fail(Error::Malformed(format!(
                "attribute length {} shorter than header",
                len
            )));
        }
        if len > self.data.len() {
            return self.fail(Error::Malformed(format!(
                "attribute length {} exceeds remaining {} bytes",
                len,
                self.data.len()
            )));
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned = nla_align(len).min(self.data.len());
        self.data = &self.data[aligned..];

        Some(Ok(Attr {
            kind: hdr.kind(),
            nested: hdr.is_nested(),
            payload,
        }))
    }
}

/// Decode every attribute in `data`, in order.
pub fn decode(data: &[u8]) -> Result<Vec<Attr<'_>>> {
    AttrIter::new(data).collect()
}

/// Owned attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Raw payload bytes.
    Bytes(Vec<u8>),
    /// Nested attribute list.
    Nested(Vec<Attribute>),
}

/// An owned attribute, as used for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type (flags are added by the encoder).
    pub kind: u16,
    /// Payload.
    pub value: AttrValue,
}

impl Attribute {
    /// Create a plain attribute.
    pub fn bytes(kind: u16, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            value: AttrValue::Bytes(data.into()),
        }
    }

    /// Create a nested attribute.
    pub fn nested(kind: u16, children: Vec<Attribute>) -> Self {
        Self {
            kind,
            value: AttrValue::Nested(children),
        }
    }
}

/// Encode attributes into a fresh buffer.
pub fn encode(attrs: &[Attribute]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_into(&mut buf, attrs)?;
    Ok(buf)
}

/// Append encoded attributes to `buf`.
///
/// `buf` must already be 4-byte aligned in length; every block written
/// keeps it aligned. A kind that overlaps the flag bits is rejected.
pub fn encode_into(buf: &mut Vec<u8>, attrs: &[Attribute]) -> Result<()> {
    for attr in attrs {
        if attr.kind & !NLA_TYPE_MASK != 0 {
            return Err(Error::Malformed(format!(
                "attribute type 0x{:04x} overlaps the flag bits",
                attr.kind
            )));
        }
        match &attr.value {
            AttrValue::Bytes(data) => push_attr(buf, attr.nla_type(), data)?,
            AttrValue::Nested(children) => {
                let start = buf.len();
                buf.extend_from_slice(NlAttr::default().as_bytes());
                encode_into(buf, children)?;
                // Patch the header once the subtree length is known.
                let hdr = NlAttr::new(attr.nla_type(), buf.len() - start - NLA_HDRLEN)?;
                buf[start..start + NLA_HDRLEN].copy_from_slice(hdr.as_bytes());
            }
        }
    }
    Ok(())
}

impl Attribute {
    fn nla_type(&self) -> u16 {
        match self.value {
            AttrValue::Bytes(_) => self.kind,
            AttrValue::Nested(_) => self.kind | NLA_F_NESTED,
        }
    }
}

/// Append one plain attribute to `buf`, padding to alignment.
pub(crate) fn push_attr(buf: &mut Vec<u8>, attr_type: u16, data: &[u8]) -> Result<()> {
    let hdr = NlAttr::new(attr_type, data.len())?;
    buf.extend_from_slice(hdr.as_bytes());
    buf.extend_from_slice(data);
    let aligned = nla_align(buf.len());
    buf.resize(aligned, 0);
    Ok(())
}

/// Helper functions for extracting typed values from attribute payloads.
///
/// NFLOG encodes every integer attribute in network byte order.
pub mod get {
    use super::*;

    fn exact<const N: usize>(data: &[u8], what: &str) -> Result<[u8; N]> {
        data.get(..N)
            .and_then(|b| <[u8; N]>::try_from(b).ok())
            .ok_or_else(|| Error::Malformed(format!("truncated {} attribute", what)))
    }

    /// Extract a u8 value.
    pub fn u8(data: &[u8]) -> Result<u8> {
        exact::<1>(data, "u8").map(|b| b[0])
    }

    /// Extract a u16 value (big endian / network order).
    pub fn u16_be(data: &[u8]) -> Result<u16> {
        exact(data, "u16").map(u16::from_be_bytes)
    }

    /// Extract a u32 value (big endian / network order).
    pub fn u32_be(data: &[u8]) -> Result<u32> {
        exact(data, "u32").map(u32::from_be_bytes)
    }

    /// Extract a u64 value (big endian / network order).
    pub fn u64_be(data: &[u8]) -> Result<u64> {
        exact(data, "u64").map(u64::from_be_bytes)
    }

    /// Extract a null-terminated string, replacing invalid UTF-8.
    pub fn string(data: &[u8]) -> String {
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        String::from_utf8_lossy(&data[..len]).into_owned()
    }
}
