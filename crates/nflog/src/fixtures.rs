//! Netlink message fixtures for testing.
//!
//! Frames are returned as `Vec<u8>` and can be fed straight to the decoder.
//! Netlink and attribute headers are in host byte order; the literal
//! fixtures below spell them out for a little-endian host.

use crate::netlink::message::{NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
use crate::netlink::{Attribute, MessageBuilder};
use crate::types::{attr, msg, vlan_attr};

/// A 20-byte IPv4 header (192.168.1.10 -> 10.0.0.1, TCP).
pub const IPV4_HEADER: [u8; 20] = [
    0x45, 0x00, 0x00, 0x3c, // version/ihl, tos, total length 60
    0x1c, 0x46, 0x40, 0x00, // id, flags DF
    0x40, 0x06, 0xb1, 0xe6, // ttl 64, proto TCP, checksum
    0xc0, 0xa8, 0x01, 0x0a, // src
    0x0a, 0x00, 0x00, 0x01, // dst
];

/// Wrap `body` in a netlink header.
pub fn frame(msg_type: u16, flags: u16, seq: u32, body: &[u8]) -> Vec<u8> {
    let mut hdr = NlMsgHdr::new(msg_type, flags);
    hdr.nlmsg_len = (NLMSG_HDRLEN + body.len()) as u32;
    hdr.nlmsg_seq = seq;

    let mut buf = hdr.as_bytes().to_vec();
    buf.extend_from_slice(body);
    buf
}

/// `NLMSG_ERROR` frame answering request `seq` (error 0 is an ACK).
pub fn ack(seq: u32, error: i32) -> Vec<u8> {
    let mut body = error.to_ne_bytes().to_vec();
    let mut original = NlMsgHdr::new(msg::CONFIG, 0);
    original.nlmsg_seq = seq;
    body.extend_from_slice(original.as_bytes());
    frame(NlMsgType::ERROR, 0, seq, &body)
}

/// Metadata-only packet for group 5.
/// Logged in INPUT with `--nflog-prefix ssh`, mark 42, arriving on ifindex 2.
pub fn meta_packet() -> Vec<u8> {
    frame(
        msg::PACKET,
        0,
        0,
        &[
            // nfgenmsg: family=AF_INET, version=0, res_id=5 (big endian)
            0x02, 0x00, 0x00, 0x05,
            // NFULA_PACKET_HDR: hw_protocol=0x0800, hook=1 (LOCAL_IN)
            0x08, 0x00, // len = 8
            0x01, 0x00, // type = NFULA_PACKET_HDR (1)
            0x08, 0x00, 0x01, 0x00,
            // NFULA_MARK = 42
            0x08, 0x00, // len = 8
            0x02, 0x00, // type = NFULA_MARK (2)
            0x00, 0x00, 0x00, 0x2a,
            // NFULA_IFINDEX_INDEV = 2
            0x08, 0x00, // len = 8
            0x04, 0x00, // type = NFULA_IFINDEX_INDEV (4)
            0x00, 0x00, 0x00, 0x02,
            // NFULA_PREFIX = "ssh"
            0x08, 0x00, // len = 8
            0x0a, 0x00, // type = NFULA_PREFIX (10)
            b's', b's', b'h', 0x00,
        ],
    )
}

/// Packet message builder with only the nfgenmsg header filled in.
pub fn packet_builder(group: u16) -> MessageBuilder {
    MessageBuilder::netfilter(msg::PACKET, 0, libc::AF_INET as u8, group)
}

/// Fully populated packet message with payload, as sent in packet copy
/// mode with both sequence flags enabled.
pub fn packet_message(group: u16) -> Vec<u8> {
    let mut ts = 1_700_000_000u64.to_be_bytes().to_vec();
    ts.extend_from_slice(&250u64.to_be_bytes());

    let mut hwaddr = vec![0x00, 0x06, 0x00, 0x00, 0x02, 0x42, 0xac, 0x11, 0x00, 0x02];
    hwaddr.resize(12, 0);

    let mut hw_header = vec![0xff; 12];
    hw_header.extend_from_slice(&[0x08, 0x00]);

    let mut b = packet_builder(group);
    b.append_attrs(&[
        Attribute::bytes(attr::NFULA_PACKET_HDR, vec![0x08, 0x00, 0x03, 0x00]),
        Attribute::bytes(attr::NFULA_TIMESTAMP, ts),
        Attribute::bytes(attr::NFULA_IFINDEX_OUTDEV, 3u32.to_be_bytes().to_vec()),
        Attribute::bytes(attr::NFULA_HWTYPE, 1u16.to_be_bytes().to_vec()),
        Attribute::bytes(attr::NFULA_HWLEN, 14u16.to_be_bytes().to_vec()),
        Attribute::bytes(attr::NFULA_HWHEADER, hw_header),
        Attribute::bytes(attr::NFULA_HWADDR, hwaddr),
        Attribute::bytes(attr::NFULA_PAYLOAD, IPV4_HEADER.to_vec()),
        Attribute::bytes(attr::NFULA_UID, 1000u32.to_be_bytes().to_vec()),
        Attribute::bytes(attr::NFULA_GID, 100u32.to_be_bytes().to_vec()),
        Attribute::bytes(attr::NFULA_SEQ, 7u32.to_be_bytes().to_vec()),
        Attribute::bytes(attr::NFULA_SEQ_GLOBAL, 70u32.to_be_bytes().to_vec()),
        Attribute::nested(
            attr::NFULA_VLAN,
            vec![
                Attribute::bytes(vlan_attr::NFULA_VLAN_PROTO, vec![0x81, 0x00]),
                // priority 5, vlan 100
                Attribute::bytes(vlan_attr::NFULA_VLAN_TCI, vec![0xa0, 0x64]),
            ],
        ),
    ])
    .unwrap();
    b.finish()
}

/// Kernel notification that messages were dropped.
pub fn overrun() -> Vec<u8> {
    frame(NlMsgType::OVERRUN, 0, 0, &[])
}
