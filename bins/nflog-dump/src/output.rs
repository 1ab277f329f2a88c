//! Record formatting.

use std::fmt::{self, Write as _};
use std::time::UNIX_EPOCH;

use nflog::PacketRecord;
use serde::Serialize;

/// One output line; serialized as JSON or displayed as text.
#[derive(Debug, Serialize)]
pub struct PacketLine<'a> {
    pub group: u16,
    pub family: u8,
    pub hw_protocol: u16,
    pub hook: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwaddr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq_global: Option<u32>,
    pub payload_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl<'a> PacketLine<'a> {
    pub fn new(record: &'a PacketRecord, with_payload: bool) -> Self {
        Self {
            group: record.group,
            family: record.family,
            hw_protocol: record.hw_protocol,
            hook: record.hook,
            timestamp: record
                .timestamp
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64()),
            prefix: record.prefix.as_deref(),
            mark: record.mark,
            indev: record.indev,
            outdev: record.outdev,
            hwaddr: record.hwaddr.as_deref().map(|b| hex(b, ":")),
            vlan: record.vlan.map(|v| v.id()),
            uid: record.uid,
            gid: record.gid,
            seq: record.seq,
            seq_global: record.seq_global,
            payload_len: record.payload_len(),
            payload: record
                .payload
                .as_deref()
                .filter(|_| with_payload)
                .map(|b| hex(b, "")),
        }
    }
}

impl fmt::Display for PacketLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ts) = self.timestamp {
            write!(f, "{:.6} ", ts)?;
        }
        write!(
            f,
            "group {} hook {} proto 0x{:04x}",
            self.group, self.hook, self.hw_protocol
        )?;
        if let Some(prefix) = self.prefix {
            write!(f, " prefix {:?}", prefix)?;
        }
        if let Some(dev) = self.indev {
            write!(f, " in {}", dev)?;
        }
        if let Some(dev) = self.outdev {
            write!(f, " out {}", dev)?;
        }
        if let Some(mark) = self.mark {
            write!(f, " mark 0x{:x}", mark)?;
        }
        if let Some(addr) = &self.hwaddr {
            write!(f, " mac {}", addr)?;
        }
        if let Some(vlan) = self.vlan {
            write!(f, " vlan {}", vlan)?;
        }
        if let Some(uid) = self.uid {
            write!(f, " uid {}", uid)?;
        }
        if let Some(gid) = self.gid {
            write!(f, " gid {}", gid)?;
        }
        if let Some(seq) = self.seq {
            write!(f, " seq {}", seq)?;
        }
        if let Some(seq) = self.seq_global {
            write!(f, " gseq {}", seq)?;
        }
        write!(f, " len {}", self.payload_len)?;
        if let Some(payload) = &self.payload {
            write!(f, "\n    {}", payload)?;
        }
        Ok(())
    }
}

fn hex(bytes: &[u8], sep: &str) -> String {
    let mut out = String::with_capacity(bytes.len() * (2 + sep.len()));
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}
