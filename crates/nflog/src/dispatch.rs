//! Per-datagram decoding for the receive loop.
//!
//! How far a decode failure reaches:
//!
//! - a frame whose netlink header is unusable ends processing of the rest of
//!   that datagram, since the next frame boundary is unknown;
//! - a packet message whose attributes fail to decode is skipped on its own;
//! - neither stops the loop.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::netlink::{MessageIter, NlMsgError, NlMsgType};
use crate::packet::PacketRecord;
use crate::types::msg;

/// Snapshot of a connection's receive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Datagrams read from the socket.
    pub datagrams: u64,
    /// Records handed to the consumer.
    pub delivered: u64,
    /// Frames or packet messages skipped because they failed to decode.
    pub malformed: u64,
    /// Receive-buffer overruns reported by the kernel.
    pub overruns: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    datagrams: AtomicU64,
    delivered: AtomicU64,
    malformed: AtomicU64,
    overruns: AtomicU64,
}

impl Counters {
    pub(crate) fn delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

/// Decode every message in `buf`, handing each packet record to `deliver`
/// in arrival order.
///
/// Stops early and returns `Break` as soon as `deliver` does.
pub(crate) fn decode_datagram<F>(buf: &Bytes, counters: &Counters, mut deliver: F) -> ControlFlow<()>
where
    F: FnMut(PacketRecord) -> ControlFlow<()>,
{
    counters.datagrams.fetch_add(1, Ordering::Relaxed);
    trace!(len = buf.len(), "received datagram");

    for msg in MessageIter::new(buf) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "dropping rest of datagram after malformed frame");
                break;
            }
        };

        match msg.header.nlmsg_type {
            msg::PACKET => match PacketRecord::parse(buf, msg.payload) {
                Ok(record) => {
                    if deliver(record).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                Err(e) => {
                    counters.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, seq = msg.header.nlmsg_seq, "skipping malformed packet message");
                }
            },
            NlMsgType::ERROR => match NlMsgError::from_bytes(msg.payload) {
                Ok(err) if err.is_ack() => trace!(seq = msg.header.nlmsg_seq, "late ACK"),
                Ok(err) => warn!(errno = -err.error, seq = msg.header.nlmsg_seq, "kernel reported error"),
                Err(e) => {
                    counters.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "skipping malformed error message");
                }
            },
            NlMsgType::OVERRUN => {
                counters.overrun();
                warn!("kernel reported message overrun");
            }
            NlMsgType::NOOP | NlMsgType::DONE => {}
            other => trace!(msg_type = other, "ignoring message"),
        }
    }

    ControlFlow::Continue(())
}
