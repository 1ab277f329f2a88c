//! Async client for the Linux netfilter packet logger (NFLOG).
//!
//! Firewall rules with an `NFLOG` target send matching packets to a numbered
//! log group. This crate binds a NETLINK_NETFILTER socket to such a group
//! and turns what the kernel sends into [`PacketRecord`]s: metadata only, or
//! metadata plus the packet bytes, depending on the [`CopyMode`].
//!
//! Payload bytes are opaque here; decoding IP or transport headers is up to
//! the caller.
//!
//! # Example
//!
//! ```ignore
//! use std::ops::ControlFlow;
//! use nflog::{Config, Connection, CopyMode, LogFlags};
//!
//! #[tokio::main]
//! async fn main() -> nflog::Result<()> {
//!     let config = Config::new(1)
//!         .copy_mode(CopyMode::Packet)
//!         .flags(LogFlags::SEQ)
//!         .sock_buf_size(1 << 21);
//!
//!     let mut conn = Connection::open(config).await?;
//!     let reason = conn
//!         .run(|record| {
//!             println!(
//!                 "group {} seq {:?} prefix {:?}: {} bytes",
//!                 record.group,
//!                 record.seq,
//!                 record.prefix,
//!                 record.payload_len()
//!             );
//!             ControlFlow::Continue(())
//!         })
//!         .await;
//!
//!     if let Some(err) = reason.into_error() {
//!         return Err(err);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Delivery
//!
//! Records are delivered synchronously from the receive loop. A slow
//! consumer stalls the loop; the kernel then queues packets in the socket
//! receive buffer and drops them once it is full. Such overruns are counted
//! in [`Stats::overruns`] and do not end the loop.

pub mod config;
pub mod connection;
pub mod error;
pub mod netlink;
pub mod packet;
pub mod stream;
pub mod types;

mod dispatch;
mod negotiate;

#[cfg(test)]
mod fixtures;

pub use config::{Config, CopyMode, LogFlags};
pub use connection::{CloseHandle, Connection, ExitReason};
pub use dispatch::Stats;
pub use error::{Error, Result};
pub use packet::{PacketRecord, Vlan};
pub use stream::PacketStream;
