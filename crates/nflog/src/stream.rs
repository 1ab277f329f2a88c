//! Stream-based consumption of logged packets.
//!
//! # Example
//!
//! ```ignore
//! use nflog::{Config, Connection};
//! use tokio_stream::StreamExt;
//!
//! let conn = Connection::open(Config::new(1)).await?;
//! let mut packets = conn.into_stream();
//!
//! while let Some(record) = packets.try_next().await? {
//!     println!("{:?} {:?}", record.prefix, record.payload_len());
//! }
//! ```

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::connection::{Connection, ExitReason};
use crate::dispatch::{self, Stats};
use crate::error::Result;
use crate::packet::PacketRecord;

/// A stream of packet records that owns its connection.
///
/// Created by [`Connection::into_stream()`]. Records decoded from one
/// datagram are buffered and handed out one per poll; the socket is not
/// read again until that buffer is drained. The stream ends when the
/// connection is closed (through a [`CloseHandle`](crate::CloseHandle)) and
/// yields a transport error once before ending if the socket fails.
///
/// The stream borrows the socket from its connection only while it is being
/// polled, so closing releases the socket and its log group right away, even
/// if the stream is never polled again.
pub struct PacketStream {
    conn: Connection,
    shutdown: WatchStream<bool>,
    pending: VecDeque<PacketRecord>,
    done: bool,
}

impl PacketStream {
    pub(crate) fn new(conn: Connection) -> Self {
        let shutdown = WatchStream::new(conn.shared().subscribe());
        Self {
            conn,
            shutdown,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Get the receive counters.
    pub fn stats(&self) -> Stats {
        self.conn.stats()
    }

    /// Get how the stream ended, if it has.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.conn.exit_reason()
    }

    /// Close the underlying connection; the stream then ends.
    pub fn close(&self) {
        self.conn.close();
    }

    fn finish(&mut self, reason: ExitReason) {
        if !self.done {
            self.done = true;
            self.conn.shared().record_exit(reason);
        }
        self.pending.clear();
    }
}

impl Stream for PacketStream {
    type Item = Result<PacketRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        // Registers for wake-up on close as a side effect.
        while let Poll::Ready(closed) = Pin::new(&mut this.shutdown).poll_next(cx) {
            if closed != Some(false) {
                this.finish(ExitReason::Closed);
                return Poll::Ready(None);
            }
        }

        let shared = Arc::clone(this.conn.shared());
        loop {
            if let Some(record) = this.pending.pop_front() {
                if !shared.admit() {
                    this.finish(ExitReason::Closed);
                    return Poll::Ready(None);
                }
                return Poll::Ready(Some(Ok(record)));
            }

            let Some(socket) = shared.socket().filter(|_| !shared.is_closed()) else {
                this.finish(ExitReason::Closed);
                return Poll::Ready(None);
            };

            match socket.poll_recv(cx) {
                Poll::Ready(Ok(buf)) => {
                    let pending = &mut this.pending;
                    let _ = dispatch::decode_datagram(&buf, &shared.counters, |record| {
                        pending.push_back(record);
                        ControlFlow::Continue(())
                    });
                }
                Poll::Ready(Err(e)) if e.is_overrun() => {
                    shared.counters.overrun();
                    warn!("socket receive buffer overrun, packets were dropped");
                }
                Poll::Ready(Err(_)) if shared.is_closed() => {
                    this.finish(ExitReason::Closed);
                    return Poll::Ready(None);
                }
                Poll::Ready(Err(e)) => {
                    warn!(error = %e, "packet stream stopped");
                    this.finish(ExitReason::from(&e));
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl std::fmt::Debug for PacketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("conn", &self.conn)
            .field("pending", &self.pending.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
