//! NFLOG connection: open, receive loop and close.

use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::{BindParams, Config};
use crate::dispatch::{self, Counters, Stats};
use crate::error::{Error, Result};
use crate::negotiate;
use crate::netlink::NetlinkSocket;
use crate::packet::PacketRecord;
use crate::stream::PacketStream;

/// Per-packet attribute overhead allowed for when sizing receive buffers.
const RECORD_OVERHEAD: usize = 1024;

/// Why a receive loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The connection was closed.
    Closed,
    /// The consumer asked to stop by returning [`ControlFlow::Break`].
    Stopped,
    /// The socket failed.
    Transport {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// OS error code, if any.
        errno: Option<i32>,
        /// Error text.
        message: String,
    },
}

impl ExitReason {
    /// Check if the loop ended because of a transport failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Convert a transport failure back into an [`Error`].
    pub fn into_error(self) -> Option<Error> {
        match self {
            Self::Transport {
                kind,
                errno,
                message,
            } => Some(Error::Io(match errno {
                Some(errno) => io::Error::from_raw_os_error(errno),
                None => io::Error::new(kind, message),
            })),
            _ => None,
        }
    }
}

impl From<&Error> for ExitReason {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::Io(e) | Error::Open(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        Self::Transport {
            kind,
            errno: err.errno(),
            message: err.to_string(),
        }
    }
}

/// State shared between a connection, its close handles and its stream.
pub(crate) struct Shared {
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    /// Held for the duration of every consumer callback.
    gate: Mutex<()>,
    /// Thread currently inside a callback, if any.
    delivering: Mutex<Option<ThreadId>>,
    socket: Mutex<Option<Arc<NetlinkSocket>>>,
    exit: Mutex<Option<ExitReason>>,
    pub(crate) counters: Counters,
}

impl Shared {
    fn new(socket: Option<NetlinkSocket>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            closed: AtomicBool::new(false),
            shutdown,
            gate: Mutex::new(()),
            delivering: Mutex::new(None),
            socket: Mutex::new(socket.map(Arc::new)),
            exit: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn socket(&self) -> Option<Arc<NetlinkSocket>> {
        self.socket.lock().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub(crate) fn record_exit(&self, reason: ExitReason) {
        *self.exit.lock() = Some(reason);
    }

    /// Hand one record to the consumer unless the connection is closed.
    pub(crate) fn deliver<F>(&self, record: PacketRecord, on_packet: &mut F) -> ControlFlow<()>
    where
        F: FnMut(PacketRecord) -> ControlFlow<()>,
    {
        let _gate = self.gate.lock();
        if self.is_closed() {
            return ControlFlow::Break(());
        }

        self.counters.delivered();
        *self.delivering.lock() = Some(thread::current().id());
        let flow = on_packet(record);
        *self.delivering.lock() = None;
        flow
    }

    /// Count one record about to be handed out by a stream, unless the
    /// connection is closed.
    pub(crate) fn admit(&self) -> bool {
        let _gate = self.gate.lock();
        if self.is_closed() {
            return false;
        }
        self.counters.delivered();
        true
    }

    /// Set the closed flag without waking anyone.
    #[cfg(test)]
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn close(&self) {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.shutdown.send_replace(true);

        // Wait out a callback running on another thread. A callback that
        // closes its own connection already holds the gate.
        let delivering = *self.delivering.lock();
        if delivering != Some(thread::current().id()) {
            drop(self.gate.lock());
        }

        if first {
            if let Some(socket) = self.socket.lock().take() {
                debug!(pid = socket.pid(), "NFLOG connection closed");
            }
        }
    }
}

/// A socket bound to one NFLOG group.
///
/// The receive loop is driven either by [`run`](Self::run) with a callback
/// or by consuming the connection as a [`PacketStream`]. Both deliver
/// records synchronously: while the consumer is busy, nothing more is read
/// from the socket and the kernel buffers (or drops) further packets.
///
/// # Example
///
/// ```ignore
/// use std::ops::ControlFlow;
/// use nflog::{Config, Connection, CopyMode};
///
/// let mut conn = Connection::open(Config::new(1).copy_mode(CopyMode::Packet)).await?;
/// let closer = conn.close_handle();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     closer.close();
/// });
///
/// let reason = conn
///     .run(|record| {
///         println!("{} bytes on hook {}", record.payload_len(), record.hook);
///         ControlFlow::Continue(())
///     })
///     .await;
/// println!("stopped: {:?}", reason);
/// ```
pub struct Connection {
    shared: Arc<Shared>,
    config: Config,
}

impl Connection {
    /// Validate `config`, open a socket and bind it to the configured group.
    ///
    /// Invalid copy modes or flags are rejected before any socket exists.
    /// If any later step fails the socket is closed before the error is
    /// returned. Must be called from within a Tokio runtime.
    pub async fn open(config: Config) -> Result<Self> {
        let params = config.to_params()?;

        let mut socket = NetlinkSocket::open()?;
        if config.sock_buf_size > 0 {
            socket.set_recv_buffer_size(config.sock_buf_size as usize)?;
        }
        if config.no_enobufs {
            socket.set_no_enobufs(true)?;
        }
        socket.set_recv_capacity(recv_capacity(&params));

        negotiate::bind(&socket, &params).await?;
        debug!(
            group = params.group,
            copy_mode = ?params.copy_mode,
            "NFLOG connection open"
        );

        Ok(Self {
            shared: Arc::new(Shared::new(Some(socket))),
            config,
        })
    }

    /// A connection with no socket, for exercising delivery and close.
    #[cfg(test)]
    pub(crate) fn detached(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared::new(None)),
            config,
        }
    }

    /// Get the configuration this connection was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Get a handle that can close this connection from another task or thread.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Close the connection.
    ///
    /// Wakes a blocked receive loop and waits for an in-flight callback to
    /// return; after this, no further records are delivered. Closing an
    /// already closed connection does nothing.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Get the receive counters.
    pub fn stats(&self) -> Stats {
        self.shared.counters.snapshot()
    }

    /// Get how the last receive loop ended, if one has ended.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.shared.exit.lock().clone()
    }

    /// Get the socket receive buffer size as reported by the kernel.
    pub fn recv_buffer_size(&self) -> Result<usize> {
        self.shared.socket().ok_or(Error::Closed)?.recv_buffer_size()
    }

    /// Run the receive loop, calling `on_packet` for every logged packet.
    ///
    /// Returns when the connection is closed, when `on_packet` returns
    /// [`ControlFlow::Break`], or when the socket fails. Malformed frames and
    /// kernel overruns are counted in [`stats`](Self::stats) and skipped. The
    /// returned reason is also available from
    /// [`exit_reason`](Self::exit_reason).
    pub async fn run<F>(&mut self, mut on_packet: F) -> ExitReason
    where
        F: FnMut(PacketRecord) -> ControlFlow<()>,
    {
        let shared = Arc::clone(&self.shared);
        let mut shutdown = shared.subscribe();

        let socket = match shared.socket() {
            Some(socket) if !shared.is_closed() => socket,
            _ => {
                shared.record_exit(ExitReason::Closed);
                return ExitReason::Closed;
            }
        };

        let reason = loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.wait_for(|closed| *closed) => break ExitReason::Closed,
                received = socket.recv() => received,
            };

            match received {
                Ok(buf) => {
                    let flow = dispatch::decode_datagram(&buf, &shared.counters, |record| {
                        shared.deliver(record, &mut on_packet)
                    });
                    if flow.is_break() {
                        break if shared.is_closed() {
                            ExitReason::Closed
                        } else {
                            ExitReason::Stopped
                        };
                    }
                }
                Err(e) if e.is_overrun() => {
                    shared.counters.overrun();
                    warn!("socket receive buffer overrun, packets were dropped");
                }
                Err(_) if shared.is_closed() => break ExitReason::Closed,
                Err(e) => {
                    warn!(error = %e, "receive loop stopped");
                    break ExitReason::from(&e);
                }
            }
        };

        debug!(?reason, "receive loop finished");
        shared.record_exit(reason.clone());
        reason
    }

    /// Consume the connection as a stream of records.
    pub fn into_stream(self) -> PacketStream {
        PacketStream::new(self)
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Cloneable handle for closing a [`Connection`] from anywhere.
#[derive(Clone)]
pub struct CloseHandle {
    shared: Arc<Shared>,
}

impl CloseHandle {
    /// Close the connection. See [`Connection::close`].
    pub fn close(&self) {
        self.shared.close();
    }

    /// Check if the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn recv_capacity(params: &BindParams) -> usize {
    let per_packet = params.copy_range as usize + RECORD_OVERHEAD;
    per_packet.max(params.nl_buf_size.unwrap_or(0) as usize)
}
