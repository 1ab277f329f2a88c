//! Logged packet records.
//!
//! A packet message is an `nfgenmsg` sub-header (whose `res_id` is the log
//! group) followed by a flat list of `NFULA_*` attributes. Only
//! `NFULA_PACKET_HDR` is always present; everything else depends on the copy
//! mode, the configured flags and what the kernel knows about the packet.
//!
//! Byte fields (payload, hardware header, ...) are [`Bytes`] slices of the
//! receive buffer, so building a record does not copy packet data.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::trace;

use crate::error::{Error, Result};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::header::NfGenMsg;
use crate::types::{HWADDR_HDR_LEN, HWADDR_MAX, PACKET_HDR_LEN, TIMESTAMP_LEN, attr, vlan_attr};

/// VLAN tag carried in `NFULA_VLAN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vlan {
    /// Tag protocol identifier (0x8100, 0x88a8, ...).
    pub proto: u16,
    /// Tag control information.
    pub tci: u16,
}

impl Vlan {
    /// VLAN id (low 12 bits of the TCI).
    pub fn id(&self) -> u16 {
        self.tci & 0x0fff
    }

    /// Priority code point.
    pub fn priority(&self) -> u8 {
        (self.tci >> 13) as u8
    }
}

/// One logged packet.
///
/// Records are only built by the receive loop, from the datagram that
/// carried them:
///
/// ```compile_fail
/// let datagram = bytes::Bytes::from_static(&[0; 8]);
/// let _ = nflog::PacketRecord::parse(&datagram, &[0; 8]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketRecord {
    /// Log group the packet was sent to.
    pub group: u16,
    /// Protocol family of the hook that logged the packet.
    pub family: u8,
    /// Link-layer protocol (ethertype), host byte order.
    pub hw_protocol: u16,
    /// Netfilter hook number.
    pub hook: u8,
    /// Firewall mark.
    pub mark: Option<u32>,
    /// Time the packet was received.
    pub timestamp: Option<SystemTime>,
    /// Input interface index.
    pub indev: Option<u32>,
    /// Output interface index.
    pub outdev: Option<u32>,
    /// Physical input interface index (bridged traffic).
    pub physindev: Option<u32>,
    /// Physical output interface index (bridged traffic).
    pub physoutdev: Option<u32>,
    /// Source hardware address.
    pub hwaddr: Option<Bytes>,
    /// ARPHRD_* hardware type.
    pub hwtype: Option<u16>,
    /// Raw link-layer header.
    pub hw_header: Option<Bytes>,
    /// Packet bytes, present only when the copy mode includes payload.
    pub payload: Option<Bytes>,
    /// Log prefix from the firewall rule.
    pub prefix: Option<String>,
    /// UID of the owning socket.
    pub uid: Option<u32>,
    /// GID of the owning socket.
    pub gid: Option<u32>,
    /// Per-instance sequence number.
    pub seq: Option<u32>,
    /// Global sequence number.
    pub seq_global: Option<u32>,
    /// VLAN tag.
    pub vlan: Option<Vlan>,
    /// Layer 2 header (bridge family).
    pub l2_header: Option<Bytes>,
    /// Raw conntrack attribute (nested `CTA_*` set).
    pub conntrack: Option<Bytes>,
    /// Conntrack info (`IP_CT_*`).
    pub ct_info: Option<u32>,
}

impl PacketRecord {
    /// Build a record from the payload of one `NFULNL_MSG_PACKET` message.
    ///
    /// `payload` must be a sub-slice of `datagram`; byte fields of the
    /// record are taken from `datagram` without copying.
    pub(crate) fn parse(datagram: &Bytes, payload: &[u8]) -> Result<Self> {
        let (nfgen, attrs) = NfGenMsg::split(payload)?;

        let mut record = PacketRecord {
            group: nfgen.res_id(),
            family: nfgen.family,
            ..Default::default()
        };
        let mut have_header = false;
        let mut hw_len = None;

        for a in AttrIter::new(attrs) {
            let a = a?;
            let data = a.payload;

            match a.kind {
                attr::NFULA_PACKET_HDR => {
                    let hdr = fixed(data, PACKET_HDR_LEN, "packet header")?;
                    record.hw_protocol = u16::from_be_bytes([hdr[0], hdr[1]]);
                    record.hook = hdr[2];
                    have_header = true;
                }
                attr::NFULA_MARK => record.mark = Some(get::u32_be(data)?),
                attr::NFULA_TIMESTAMP => record.timestamp = Some(timestamp(data)?),
                attr::NFULA_IFINDEX_INDEV => record.indev = Some(get::u32_be(data)?),
                attr::NFULA_IFINDEX_OUTDEV => record.outdev = Some(get::u32_be(data)?),
                attr::NFULA_IFINDEX_PHYSINDEV => record.physindev = Some(get::u32_be(data)?),
                attr::NFULA_IFINDEX_PHYSOUTDEV => record.physoutdev = Some(get::u32_be(data)?),
                attr::NFULA_HWADDR => {
                    let hw = fixed(data, HWADDR_HDR_LEN, "hardware address")?;
                    let len = usize::from(u16::from_be_bytes([hw[0], hw[1]]))
                        .min(HWADDR_MAX)
                        .min(data.len() - HWADDR_HDR_LEN);
                    record.hwaddr = Some(datagram.slice_ref(&data[HWADDR_HDR_LEN..][..len]));
                }
                attr::NFULA_PAYLOAD => record.payload = Some(datagram.slice_ref(data)),
                attr::NFULA_PREFIX => record.prefix = Some(get::string(data)),
                attr::NFULA_UID => record.uid = Some(get::u32_be(data)?),
                attr::NFULA_GID => record.gid = Some(get::u32_be(data)?),
                attr::NFULA_SEQ => record.seq = Some(get::u32_be(data)?),
                attr::NFULA_SEQ_GLOBAL => record.seq_global = Some(get::u32_be(data)?),
                attr::NFULA_HWTYPE => record.hwtype = Some(get::u16_be(data)?),
                attr::NFULA_HWLEN => hw_len = Some(usize::from(get::u16_be(data)?)),
                attr::NFULA_HWHEADER => record.hw_header = Some(datagram.slice_ref(data)),
                attr::NFULA_CT => record.conntrack = Some(datagram.slice_ref(data)),
                attr::NFULA_CT_INFO => record.ct_info = Some(get::u32_be(data)?),
                attr::NFULA_VLAN => record.vlan = Some(vlan(a.nested_iter())?),
                attr::NFULA_L2HDR => record.l2_header = Some(datagram.slice_ref(data)),
                other => trace!(kind = other, "ignoring unknown packet attribute"),
            }
        }

        if !have_header {
            return Err(Error::Malformed("packet message without packet header".into()));
        }

        // NFULA_HWLEN bounds the valid bytes of NFULA_HWHEADER.
        if let (Some(len), Some(header)) = (hw_len, record.hw_header.as_mut()) {
            header.truncate(len);
        }

        Ok(record)
    }

    /// Length of the copied payload, 0 when no payload was copied.
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }
}

fn fixed<'a>(data: &'a [u8], len: usize, what: &str) -> Result<&'a [u8]> {
    if data.len() < len {
        return Err(Error::Malformed(format!(
            "{} attribute is {} bytes, expected {}",
            what,
            data.len(),
            len
        )));
    }
    Ok(&data[..len])
}

fn timestamp(data: &[u8]) -> Result<SystemTime> {
    let ts = fixed(data, TIMESTAMP_LEN, "timestamp")?;
    let sec = get::u64_be(&ts[..8])?;
    let usec = get::u64_be(&ts[8..])?;
    UNIX_EPOCH
        .checked_add(Duration::from_secs(sec))
        .and_then(|t| t.checked_add(Duration::from_micros(usec)))
        .ok_or_else(|| Error::Malformed(format!("timestamp {}.{:06} out of range", sec, usec)))
}

fn vlan(iter: AttrIter<'_>) -> Result<Vlan> {
    let mut vlan = Vlan { proto: 0, tci: 0 };
    for a in iter {
        let a = a?;
        match a.kind {
            vlan_attr::NFULA_VLAN_PROTO => vlan.proto = get::u16_be(a.payload)?,
            vlan_attr::NFULA_VLAN_TCI => vlan.tci = get::u16_be(a.payload)?,
            _ => {}
        }
    }
    Ok(vlan)
}
