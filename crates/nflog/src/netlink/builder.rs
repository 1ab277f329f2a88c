//! Message builder for constructing netlink messages.

use super::attr::{self, Attribute};
use super::header::NfGenMsg;
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};
use crate::error::Result;

/// Builder for constructing netlink messages.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    /// Create a new message builder with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        let header = NlMsgHdr::new(msg_type, flags);
        let mut buf = vec![0u8; NLMSG_HDRLEN];
        buf[..std::mem::size_of::<NlMsgHdr>()].copy_from_slice(header.as_bytes());
        Self { buf }
    }

    /// Create a netfilter message: netlink header followed by `nfgenmsg`.
    pub fn netfilter(msg_type: u16, flags: u16, family: u8, res_id: u16) -> Self {
        let mut builder = Self::new(msg_type, flags);
        builder.append_bytes(NfGenMsg::new(family, res_id).as_bytes());
        builder
    }

    /// Get the current message length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    /// Append raw bytes to the message (with alignment padding).
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        let aligned = nlmsg_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append an attribute with the given type and data.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) -> Result<()> {
        attr::push_attr(&mut self.buf, attr_type, data)
    }

    /// Append a u8 attribute.
    pub fn append_attr_u8(&mut self, attr_type: u16, value: u8) -> Result<()> {
        self.append_attr(attr_type, &[value])
    }

    /// Append a u16 attribute (big endian / network order).
    pub fn append_attr_u16_be(&mut self, attr_type: u16, value: u16) -> Result<()> {
        self.append_attr(attr_type, &value.to_be_bytes())
    }

    /// Append a u32 attribute (big endian / network order).
    pub fn append_attr_u32_be(&mut self, attr_type: u16, value: u32) -> Result<()> {
        self.append_attr(attr_type, &value.to_be_bytes())
    }

    /// Append a list of (possibly nested) attributes.
    pub fn append_attrs(&mut self, attrs: &[Attribute]) -> Result<()> {
        attr::encode_into(&mut self.buf, attrs)
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        let bytes = seq.to_ne_bytes();
        self.buf[8..12].copy_from_slice(&bytes);
    }

    /// Set the port ID.
    pub fn set_pid(&mut self, pid: u32) {
        let bytes = pid.to_ne_bytes();
        self.buf[12..16].copy_from_slice(&bytes);
    }

    /// Finalize and return the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        // Update message length in header
        let len = self.buf.len() as u32;
        let len_bytes = len.to_ne_bytes();
        self.buf[0..4].copy_from_slice(&len_bytes);
        self.buf
    }

    /// Get the current buffer for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::NLA_HDRLEN;
    use crate::netlink::header::NFGEN_HDRLEN;
    use crate::netlink::message::{NLM_F_REQUEST, decode_message};

    #[test]
    fn test_simple_message() {
        let msg = MessageBuilder::new(16, NLM_F_REQUEST).finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!(header.nlmsg_type, 16);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST);
    }

    #[test]
    fn test_netfilter_header() {
        let b = MessageBuilder::netfilter(0x0401, NLM_F_REQUEST, 2, 10);
        assert!(!b.is_empty());
        assert_eq!(b.len(), NLMSG_HDRLEN + NFGEN_HDRLEN);
        assert_eq!(&b.as_bytes()[NLMSG_HDRLEN..], &[0x02, 0x00, 0x00, 0x0a]);
    }

    #[test]
    fn test_attribute() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder.append_attr_u32_be(1, 0x12345678).unwrap();
        builder.append_attr_u8(2, 7).unwrap();
        builder.append_attr_u16_be(3, 0x0102).unwrap();
        let msg = builder.finish();

        assert_eq!(msg.len(), NLMSG_HDRLEN + (NLA_HDRLEN + 4) + 8 + 8);
        assert_eq!(&msg[NLMSG_HDRLEN + NLA_HDRLEN..][..4], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_seq_and_pid() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder.set_seq(42);
        builder.set_pid(7);
        let msg = builder.finish();
        let (decoded, _) = decode_message(&msg).unwrap();
        assert_eq!(decoded.header.nlmsg_seq, 42);
        assert_eq!(decoded.header.nlmsg_pid, 7);
    }

    #[test]
    fn test_nested_attributes() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder
            .append_attrs(&[Attribute::nested(
                20,
                vec![Attribute::bytes(1, vec![0x81, 0x00])],
            )])
            .unwrap();
        let msg = builder.finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN + NLA_HDRLEN + 8);
    }
}
