//! Netlink message header and framing.
//!
//! One datagram read from a netlink socket may hold several messages back to
//! back, each padded to [`NLMSG_ALIGNTO`]. [`decode_message`] decodes the
//! first of them and reports how many bytes it used so callers can walk the
//! rest; [`MessageIter`] does that walk.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is an error message or ACK.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Check if this message has the multi flag.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Read a header from the front of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(h, _)| h)
            .map_err(|_| Error::Truncated {
                expected: NLMSG_HDRLEN,
                actual: data.len(),
            })
    }
}

/// Standard netlink control message types.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;
    /// Data lost.
    pub const OVERRUN: u16 = 4;
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;

/// A decoded message borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct NlMessage<'a> {
    /// The message header.
    pub header: NlMsgHdr,
    /// Bytes after the header, up to `nlmsg_len`.
    pub payload: &'a [u8],
}

/// Decode the first message in `data`.
///
/// Returns the message and the number of bytes it occupies including
/// alignment padding (clamped to `data.len()`).
pub fn decode_message(data: &[u8]) -> Result<(NlMessage<'_>, usize)> {
    let header = NlMsgHdr::from_bytes(data)?;

    let msg_len = header.nlmsg_len as usize;
    if msg_len < NLMSG_HDRLEN {
        return Err(Error::Malformed(format!(
            "message length {} shorter than header",
            msg_len
        )));
    }
    if msg_len > data.len() {
        return Err(Error::Malformed(format!(
            "message length {} exceeds remaining {} bytes",
            msg_len,
            data.len()
        )));
    }

    let consumed = nlmsg_align(msg_len).min(data.len());
    Ok((
        NlMessage {
            header,
            payload: &data[NLMSG_HDRLEN..msg_len],
        },
        consumed,
    ))
}

/// Iterator over netlink messages in a buffer.
///
/// A framing error leaves no way to locate the next message, so the
/// iterator yields it once and stops.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<NlMessage<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        match decode_message(self.data) {
            Ok((msg, consumed)) => {
                self.data = &self.data[consumed..];
                Some(Ok(msg))
            }
            Err(e) => {
                self.data = &[];
                Some(Err(e))
            }
        }
    }
}

/// Netlink error message payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Parse error message from payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(e, _)| e)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::builder::MessageBuilder;

    #[test]
    fn test_header_size() {
        assert_eq!(NLMSG_HDRLEN, 16);
    }

    #[test]
    fn test_short_buffer() {
        assert!(decode_message(&[0u8; 3]).unwrap_err().is_malformed());
        assert!(decode_message(&[0u8; 15]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_bad_lengths() {
        let mut hdr = NlMsgHdr::new(0x0400, 0);
        hdr.nlmsg_len = 8;
        assert!(decode_message(hdr.as_bytes()).unwrap_err().is_malformed());

        hdr.nlmsg_len = 64;
        assert!(decode_message(hdr.as_bytes()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_consumed_includes_padding() {
        let mut b = MessageBuilder::new(0x0400, 0);
        b.append_bytes(&[1, 2, 3, 4]);
        b.append_attr(9, &[0xaa]).unwrap();
        let first = b.finish();
        let second = MessageBuilder::new(NlMsgType::DONE, NLM_F_MULTI).finish();

        let mut buf = first.clone();
        buf.extend_from_slice(&second);

        let (msg, consumed) = decode_message(&buf).unwrap();
        assert_eq!(consumed, first.len());
        assert_eq!(msg.header.nlmsg_type, 0x0400);
        assert_eq!(msg.payload.len(), first.len() - NLMSG_HDRLEN);

        let (done, consumed2) = decode_message(&buf[consumed..]).unwrap();
        assert!(done.header.is_done());
        assert!(done.header.is_multi());
        assert_eq!(consumed + consumed2, buf.len());
    }

    #[test]
    fn test_iter_multipart() {
        let mut buf = Vec::new();
        for seq in 1..=3 {
            let mut b = MessageBuilder::new(0x0400, NLM_F_MULTI);
            b.set_seq(seq);
            buf.extend_from_slice(&b.finish());
        }
        let seqs: Vec<u32> = MessageIter::new(&buf)
            .map(|m| m.unwrap().header.nlmsg_seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_iter_stops_after_framing_error() {
        let mut buf = MessageBuilder::new(0x0400, 0).finish();
        buf.extend_from_slice(&[0xff; 7]);
        let mut iter = MessageIter::new(&buf);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_error_payload() {
        let mut payload = (-1i32).to_ne_bytes().to_vec();
        payload.extend_from_slice(NlMsgHdr::new(0x0401, NLM_F_REQUEST | NLM_F_ACK).as_bytes());
        let err = NlMsgError::from_bytes(&payload).unwrap();
        assert!(!err.is_ack());
        assert_eq!(err.error, -1);
        assert_eq!(err.msg.nlmsg_type, 0x0401);

        assert!(NlMsgError::from_bytes(&payload[..6]).is_err());
    }

    #[test]
    fn test_random_input_never_panics() {
        let mut state = 0x1234_5678u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for _ in 0..2000 {
            let len = (next() % 80) as usize;
            let mut data: Vec<u8> = (0..len).map(|_| next() as u8).collect();
            if len >= 4 && next() % 2 == 0 {
                let l = next() % (len as u32 + 8);
                data[..4].copy_from_slice(&l.to_ne_bytes());
            }
            for msg in MessageIter::new(&data).flatten() {
                assert!(msg.payload.len() <= data.len());
            }
        }
    }
}
