//! Bind/configure handshake with the kernel's NFLOG subsystem.
//!
//! Three acknowledged configuration requests are sent in order:
//!
//! 1. `PF_BIND` for the configured protocol family,
//! 2. `BIND` for the log group together with the copy mode and range,
//! 3. the flags-set request, carrying the flags and the optional buffer
//!    size, queue threshold and flush timeout tunables.
//!
//! Each request sets `NLM_F_ACK`; the kernel answers with an `NLMSG_ERROR`
//! frame whose error code is zero on success. Datagrams that arrive before
//! the matching acknowledgement (packets already logged to the freshly
//! bound group, for example) are discarded.

use tracing::{debug, trace};

use crate::config::BindParams;
use crate::error::{Error, Result};
use crate::netlink::message::{NLM_F_ACK, NLM_F_REQUEST};
use crate::netlink::{MessageBuilder, MessageIter, NetlinkSocket, NlMsgError};
use crate::types::{ConfigCmd, cfg_attr, config_mode_bytes, msg};

/// Run the full handshake on `socket`.
pub(crate) async fn bind(socket: &NetlinkSocket, params: &BindParams) -> Result<()> {
    debug!(family = params.family, "binding protocol family");
    request_ack(socket, pf_bind_request(params)?, "binding protocol family").await?;

    debug!(
        group = params.group,
        copy_mode = ?params.copy_mode,
        copy_range = params.copy_range,
        "binding log group"
    );
    request_ack(socket, group_bind_request(params)?, "binding log group").await?;

    debug!(flags = ?params.flags, "setting log flags");
    request_ack(socket, flags_request(params)?, "setting log flags").await?;

    Ok(())
}

fn config_request(family: u8, group: u16) -> MessageBuilder {
    MessageBuilder::netfilter(msg::CONFIG, NLM_F_REQUEST | NLM_F_ACK, family, group)
}

pub(crate) fn pf_bind_request(params: &BindParams) -> Result<MessageBuilder> {
    let mut b = config_request(params.family, 0);
    b.append_attr_u8(cfg_attr::NFULA_CFG_CMD, ConfigCmd::PfBind as u8)?;
    Ok(b)
}

pub(crate) fn group_bind_request(params: &BindParams) -> Result<MessageBuilder> {
    let mut b = config_request(libc::AF_UNSPEC as u8, params.group);
    b.append_attr_u8(cfg_attr::NFULA_CFG_CMD, ConfigCmd::Bind as u8)?;
    b.append_attr(
        cfg_attr::NFULA_CFG_MODE,
        &config_mode_bytes(params.copy_range, params.copy_mode.as_u8()),
    )?;
    Ok(b)
}

pub(crate) fn flags_request(params: &BindParams) -> Result<MessageBuilder> {
    let mut b = config_request(libc::AF_UNSPEC as u8, params.group);
    b.append_attr_u16_be(cfg_attr::NFULA_CFG_FLAGS, params.flags.bits())?;
    if let Some(size) = params.nl_buf_size {
        b.append_attr_u32_be(cfg_attr::NFULA_CFG_NLBUFSIZ, size)?;
    }
    if let Some(timeout) = params.timeout {
        b.append_attr_u32_be(cfg_attr::NFULA_CFG_TIMEOUT, timeout)?;
    }
    if let Some(qthresh) = params.qthresh {
        b.append_attr_u32_be(cfg_attr::NFULA_CFG_QTHRESH, qthresh)?;
    }
    Ok(b)
}

async fn request_ack(
    socket: &NetlinkSocket,
    mut builder: MessageBuilder,
    operation: &'static str,
) -> Result<()> {
    let seq = socket.next_seq();
    builder.set_seq(seq);
    builder.set_pid(socket.pid());
    socket.send(&builder.finish()).await?;

    loop {
        let data = socket.recv().await?;
        if find_ack(&data, seq, operation)? {
            return Ok(());
        }
    }
}

/// Look for the acknowledgement of request `seq` in one datagram.
///
/// Returns `Ok(true)` on a zero-error ACK, `Ok(false)` if the datagram does
/// not contain it, and [`Error::Bind`] if the kernel rejected the request.
pub(crate) fn find_ack(data: &[u8], seq: u32, operation: &'static str) -> Result<bool> {
    for msg in MessageIter::new(data) {
        let msg = msg?;

        if !msg.header.is_error() || msg.header.nlmsg_seq != seq {
            trace!(
                msg_type = msg.header.nlmsg_type,
                seq = msg.header.nlmsg_seq,
                "discarding message while waiting for ACK"
            );
            continue;
        }

        let err = NlMsgError::from_bytes(msg.payload)?;
        if !err.is_ack() {
            return Err(Error::from_errno(err.error, operation));
        }
        return Ok(true);
    }

    Ok(false)
}
