//! NFLOG protocol constants.
//!
//! Values mirror `linux/netfilter/nfnetlink.h` and
//! `linux/netfilter/nfnetlink_log.h` and must not be changed.

/// Netfilter netlink subsystem id of the packet logger.
pub const NFNL_SUBSYS_ULOG: u8 = 4;

/// nfnetlink protocol version carried in `nfgenmsg.version`.
pub const NFNETLINK_V0: u8 = 0;

/// Build a netfilter message type from subsystem and message ids.
#[inline]
pub const fn nfnl_msg_type(subsys: u8, msg: u8) -> u16 {
    ((subsys as u16) << 8) | msg as u16
}

/// NFLOG message kinds.
pub mod msg {
    use super::{NFNL_SUBSYS_ULOG, nfnl_msg_type};

    /// Logged packet, kernel to userspace.
    pub const NFULNL_MSG_PACKET: u8 = 0;
    /// Configuration request, userspace to kernel.
    pub const NFULNL_MSG_CONFIG: u8 = 1;

    /// Netlink type of a packet message.
    pub const PACKET: u16 = nfnl_msg_type(NFNL_SUBSYS_ULOG, NFULNL_MSG_PACKET);
    /// Netlink type of a configuration message.
    pub const CONFIG: u16 = nfnl_msg_type(NFNL_SUBSYS_ULOG, NFULNL_MSG_CONFIG);
}

/// Configuration commands (`NFULA_CFG_CMD` payload).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCmd {
    None = 0,
    Bind = 1,
    Unbind = 2,
    PfBind = 3,
    PfUnbind = 4,
}

/// Configuration attributes.
pub mod cfg_attr {
    pub const NFULA_CFG_UNSPEC: u16 = 0;
    pub const NFULA_CFG_CMD: u16 = 1;
    pub const NFULA_CFG_MODE: u16 = 2;
    pub const NFULA_CFG_NLBUFSIZ: u16 = 3;
    pub const NFULA_CFG_TIMEOUT: u16 = 4;
    pub const NFULA_CFG_QTHRESH: u16 = 5;
    pub const NFULA_CFG_FLAGS: u16 = 6;
}

/// Copy mode values.
pub const NFULNL_COPY_NONE: u8 = 0x00;
pub const NFULNL_COPY_META: u8 = 0x01;
pub const NFULNL_COPY_PACKET: u8 = 0x02;

/// Largest copy range the kernel honours.
pub const NFULNL_COPY_RANGE_MAX: u32 = 0xffff;

/// Configuration flag bits.
pub const NFULNL_CFG_F_SEQ: u16 = 0x0001;
pub const NFULNL_CFG_F_SEQ_GLOBAL: u16 = 0x0002;
pub const NFULNL_CFG_F_CONNTRACK: u16 = 0x0004;

/// Attributes of a packet message.
pub mod attr {
    pub const NFULA_UNSPEC: u16 = 0;
    pub const NFULA_PACKET_HDR: u16 = 1;
    pub const NFULA_MARK: u16 = 2;
    pub const NFULA_TIMESTAMP: u16 = 3;
    pub const NFULA_IFINDEX_INDEV: u16 = 4;
    pub const NFULA_IFINDEX_OUTDEV: u16 = 5;
    pub const NFULA_IFINDEX_PHYSINDEV: u16 = 6;
    pub const NFULA_IFINDEX_PHYSOUTDEV: u16 = 7;
    pub const NFULA_HWADDR: u16 = 8;
    pub const NFULA_PAYLOAD: u16 = 9;
    pub const NFULA_PREFIX: u16 = 10;
    pub const NFULA_UID: u16 = 11;
    pub const NFULA_SEQ: u16 = 12;
    pub const NFULA_SEQ_GLOBAL: u16 = 13;
    pub const NFULA_GID: u16 = 14;
    pub const NFULA_HWTYPE: u16 = 15;
    pub const NFULA_HWHEADER: u16 = 16;
    pub const NFULA_HWLEN: u16 = 17;
    pub const NFULA_CT: u16 = 18;
    pub const NFULA_CT_INFO: u16 = 19;
    pub const NFULA_VLAN: u16 = 20;
    pub const NFULA_L2HDR: u16 = 21;
}

/// Attributes nested inside `NFULA_VLAN`.
pub mod vlan_attr {
    pub const NFULA_VLAN_UNSPEC: u16 = 0;
    pub const NFULA_VLAN_PROTO: u16 = 1;
    pub const NFULA_VLAN_TCI: u16 = 2;
}

/// Size of `struct nfulnl_msg_packet_hdr`.
pub const PACKET_HDR_LEN: usize = 4;
/// Size of `struct nfulnl_msg_packet_timestamp`.
pub const TIMESTAMP_LEN: usize = 16;
/// Size of `struct nfulnl_msg_packet_hw` header before the address bytes.
pub const HWADDR_HDR_LEN: usize = 4;
/// Capacity of the address array in `struct nfulnl_msg_packet_hw`.
pub const HWADDR_MAX: usize = 8;

/// Encode `struct nfulnl_msg_config_mode` (packed, 6 bytes).
pub fn config_mode_bytes(copy_range: u32, copy_mode: u8) -> [u8; 6] {
    let r = copy_range.to_be_bytes();
    [r[0], r[1], r[2], r[3], copy_mode, 0]
}
