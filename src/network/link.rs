//! Wireless link vocabulary: status codes, identity, static addressing.

use core::fmt::Write as _;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Status reported by the wireless stack while joining.
///
/// Non-negative codes are progress; negative codes are terminal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum LinkStatusCode {
    Down = 0,
    Joining = 1,
    NoIp = 2,
    Up = 3,
    Fail = -1,
    NoNet = -2,
    BadAuth = -3,
}

impl LinkStatusCode {
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        Some(match code {
            0 => Self::Down,
            1 => Self::Joining,
            2 => Self::NoIp,
            3 => Self::Up,
            -1 => Self::Fail,
            -2 => Self::NoNet,
            -3 => Self::BadAuth,
            _ => return None,
        })
    }

    pub fn is_failure(self) -> bool {
        self.code() < 0
    }

    /// Joining has finished one way or the other.
    pub fn is_settled(self) -> bool {
        self == Self::Up || self.is_failure()
    }
}

/// Address and hardware identity of the node on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkIdentity {
    pub ip: Ipv4Addr,
    pub mac: [u8; 6],
}

impl LinkIdentity {
    /// MAC as lowercase, colon-separated hex (`aa:bb:cc:dd:ee:ff`).
    pub fn mac_string(&self) -> heapless::String<17> {
        format_mac(&self.mac)
    }
}

pub fn format_mac(mac: &[u8; 6]) -> heapless::String<17> {
    let mut s = heapless::String::new();
    for (i, b) in mac.iter().enumerate() {
        if i > 0 {
            let _ = s.push(':');
        }
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Result of a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up(LinkIdentity),
    Down(LinkStatusCode),
}

/// Static IPv4 interface configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub address: [u8; 4],
    pub netmask: [u8; 4],
    pub gateway: [u8; 4],
    pub dns: [u8; 4],
}

impl IpConfig {
    pub const fn new(address: [u8; 4], netmask: [u8; 4], gateway: [u8; 4], dns: [u8; 4]) -> Self {
        Self { address, netmask, gateway, dns }
    }

    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.address)
    }

    pub fn gateway(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.gateway)
    }

    pub fn dns(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dns)
    }

    /// Prefix length of the netmask, or `None` if the mask is not contiguous.
    pub fn prefix_len(&self) -> Option<u8> {
        let mask = u32::from_be_bytes(self.netmask);
        let ones = mask.leading_ones();
        (mask.checked_shl(ones).unwrap_or(0) == 0).then_some(ones as u8)
    }

    pub fn is_valid(&self) -> bool {
        let addr = self.address();
        !addr.is_unspecified() && !addr.is_broadcast() && self.prefix_len().is_some_and(|p| p > 0)
    }
}
