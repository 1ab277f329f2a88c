//! Netlink wire layer: attribute codec, message framing and the socket.
//!
//! Nothing in here is NFLOG-specific beyond the `nfgenmsg` sub-header; the
//! packet-logging semantics live in the crate root modules.

pub mod attr;
mod builder;
pub mod header;
pub mod message;
mod socket;

pub use attr::{Attr, AttrIter, AttrValue, Attribute, NlAttr};
pub use builder::MessageBuilder;
pub use header::{NFGEN_HDRLEN, NfGenMsg};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMessage, NlMsgError, NlMsgHdr, NlMsgType, decode_message};
pub use socket::NetlinkSocket;
