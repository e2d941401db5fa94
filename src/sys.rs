#![allow(non_camel_case_types)]

use std::mem;

pub use libc::{c_char, c_int, c_void};
pub use libc::{close, ioctl, socket};
pub use libc::{AF_INET, EINTR, SOCK_STREAM};

pub const IF_NAMESIZE: usize = 16;

cfg_if! {
    if #[cfg(target_env = "musl")] {
        pub type IoctlRequest = c_int;
    } else {
        pub type IoctlRequest = libc::c_ulong;
    }
}

// <linux/sockios.h>
pub const SIOCETHTOOL: IoctlRequest = 0x8946 as IoctlRequest;
pub const SIOCGIFINDEX: IoctlRequest = 0x8933 as IoctlRequest;

// <linux/ethtool.h>
pub const ETHTOOL_GSET: u32 = 0x0000_0001;
pub const DUPLEX_HALF: u8 = 0x00;
pub const DUPLEX_FULL: u8 = 0x01;

#[repr(C)]
pub struct ethtool_cmd {
    pub cmd: u32,
    pub supported: u32,
    pub advertising: u32,
    pub speed: u16,
    pub duplex: u8,
    pub port: u8,
    pub phy_address: u8,
    pub transceiver: u8,
    pub autoneg: u8,
    pub mdio_support: u8,
    pub maxtxpkt: u32,
    pub maxrxpkt: u32,
    pub speed_hi: u16,
    pub eth_tp_mdix: u8,
    pub eth_tp_mdix_ctrl: u8,
    pub lp_advertising: u32,
    pub reserved: [u32; 2],
}

// The kernel only touches the union arm selected by the request; the pad
// keeps the struct at least as large as the kernel's own ifreq.
#[repr(C)]
pub union ifreq_ifru {
    pub ifru_ifindex: c_int,
    pub ifru_data: *mut c_void,
    pub ifru_pad: [u8; 24],
}

#[repr(C)]
pub struct ifreq {
    pub ifr_name: [c_char; IF_NAMESIZE],
    pub ifru: ifreq_ifru,
}

/// Zeroed request block with the interface name copied in, truncated to
/// `IF_NAMESIZE - 1` bytes so the name stays NUL-terminated.
pub fn ifreq_with_name(name: &str) -> ifreq {
    let mut ifr: ifreq = unsafe { mem::zeroed() };
    for (i, byte) in name.bytes().take(IF_NAMESIZE - 1).enumerate() {
        ifr.ifr_name[i] = byte as c_char;
    }
    ifr
}

/// Mbps out of the split `speed`/`speed_hi` halves of the GSET reply.
pub fn ethtool_cmd_speed(cmd: &ethtool_cmd) -> u32 {
    (u32::from(cmd.speed_hi) << 16) | u32::from(cmd.speed)
}
