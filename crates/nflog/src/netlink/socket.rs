//! Low-level async netlink socket operations.

use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use libc::c_int;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default receive buffer allocation per datagram.
pub const DEFAULT_RECV_CAPACITY: usize = 64 * 1024;

/// Async NETLINK_NETFILTER socket.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
    /// Bytes allocated for each receive.
    recv_capacity: usize,
}

impl NetlinkSocket {
    /// Open and bind a netfilter netlink socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_NETFILTER).map_err(Error::Open)?;
        socket.set_non_blocking(true).map_err(Error::Open)?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr).map_err(Error::Open)?;
        socket.get_address(&mut addr).map_err(Error::Open)?;
        let pid = addr.port_number();

        // Extended ACKs only improve error text; older kernels lack them.
        socket.set_ext_ack(true).ok();

        let fd = AsyncFd::new(socket).map_err(Error::Open)?;
        debug!(pid, "opened netfilter netlink socket");

        Ok(Self {
            fd,
            seq: AtomicU32::new(1),
            pid,
            recv_capacity: DEFAULT_RECV_CAPACITY,
        })
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Set how many bytes each receive may return.
    ///
    /// Datagrams longer than this are truncated by the kernel.
    pub fn set_recv_capacity(&mut self, capacity: usize) {
        self.recv_capacity = capacity.max(DEFAULT_RECV_CAPACITY);
    }

    /// Request a socket receive buffer of at least `size` bytes.
    ///
    /// Tries `SO_RCVBUFFORCE` first, which needs CAP_NET_ADMIN, and falls
    /// back to `SO_RCVBUF` (capped by `net.core.rmem_max`) when that is
    /// refused. The kernel doubles the value it stores, so the returned
    /// size, as reported by the kernel, is usually larger than requested.
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<usize> {
        let val = c_int::try_from(size).unwrap_or(c_int::MAX);
        match setsockopt_int(self.as_raw_fd(), libc::SOL_SOCKET, libc::SO_RCVBUFFORCE, val) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EPERM) => {
                debug!("SO_RCVBUFFORCE not permitted, falling back to SO_RCVBUF");
                setsockopt_int(self.as_raw_fd(), libc::SOL_SOCKET, libc::SO_RCVBUF, val)?;
            }
            Err(e) => return Err(e.into()),
        }

        let actual = self.recv_buffer_size()?;
        if actual < size {
            warn!(
                requested = size,
                actual, "socket receive buffer smaller than requested"
            );
        } else {
            debug!(requested = size, actual, "socket receive buffer set");
        }
        Ok(actual)
    }

    /// Get the receive buffer size as reported by the kernel.
    pub fn recv_buffer_size(&self) -> Result<usize> {
        let val = getsockopt_int(self.as_raw_fd(), libc::SOL_SOCKET, libc::SO_RCVBUF)?;
        Ok(usize::try_from(val).unwrap_or(0))
    }

    /// Toggle `NETLINK_NO_ENOBUFS`.
    pub fn set_no_enobufs(&self, enabled: bool) -> Result<()> {
        setsockopt_int(
            self.as_raw_fd(),
            libc::SOL_NETLINK,
            libc::NETLINK_NO_ENOBUFS,
            c_int::from(enabled),
        )?;
        Ok(())
    }

    /// Send a message.
    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram.
    pub async fn recv(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.recv_capacity);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    let _n = result?;
                    // buf has been advanced by recv, so buf[..] contains the data
                    return Ok(buf.freeze());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Poll for one datagram.
    ///
    /// This is the poll-based version of [`recv`](Self::recv) for use with
    /// `Stream` implementations.
    pub fn poll_recv(&self, cx: &mut Context<'_>) -> Poll<Result<Bytes>> {
        let mut buf = BytesMut::with_capacity(self.recv_capacity);

        loop {
            let mut guard = match self.fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                Poll::Pending => return Poll::Pending,
            };

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => match result {
                    Ok(_n) => return Poll::Ready(Ok(buf.freeze())),
                    Err(e) => return Poll::Ready(Err(e.into())),
                },
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        debug!(pid = self.pid, "closing netfilter netlink socket");
    }
}

fn setsockopt_int(fd: RawFd, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
    // SAFETY: value outlives the call and the length matches its type.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const c_int as *const libc::c_void,
            mem::size_of::<c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn getsockopt_int(fd: RawFd, level: c_int, name: c_int) -> io::Result<c_int> {
    let mut value: c_int = 0;
    let mut len = mem::size_of::<c_int>() as libc::socklen_t;
    // SAFETY: value and len are valid for writes of the advertised size.
    let ret = unsafe {
        libc::getsockopt(
            fd,
            level,
            name,
            &mut value as *mut c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(value)
}
