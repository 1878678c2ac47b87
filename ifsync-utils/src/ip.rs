//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

// Address Family identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns the address family of this address.
    fn address_family(&self) -> AddressFamily;

    // Returns the maximum prefix length of this address family.
    fn max_prefixlen(&self) -> u8;
}

// Extension methods for IpNetwork.
pub trait IpNetworkKind {
    // Returns the address family of this network.
    fn address_family(&self) -> AddressFamily;
}

// ===== impl AddressFamily =====

impl AddressFamily {
    // Returns the YANG container name used by ietf-ip for this family.
    pub fn container(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn max_prefixlen(&self) -> u8 {
        match self {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }
}

// ===== impl IpNetwork =====

impl IpNetworkKind for IpNetwork {
    fn address_family(&self) -> AddressFamily {
        self.ip().address_family()
    }
}

// ===== global functions =====

// Parses an IP address of the given address family.
pub fn parse_ip(value: &str, af: AddressFamily) -> Option<IpAddr> {
    let addr = value.parse::<IpAddr>().ok()?;
    (addr.address_family() == af).then_some(addr)
}

// Parses a prefix length, checking it against the address family limits.
pub fn parse_prefixlen(value: &str, af: AddressFamily) -> Option<u8> {
    let plen = value.parse::<u8>().ok()?;
    let max = match af {
        AddressFamily::Ipv4 => 32,
        AddressFamily::Ipv6 => 128,
    };
    (plen <= max).then_some(plen)
}

// Converts a dotted-quad netmask into a prefix length.
//
// Non-contiguous masks are rejected.
pub fn netmask_to_prefixlen(value: &str) -> Option<u8> {
    let mask = u32::from(value.parse::<Ipv4Addr>().ok()?);
    let plen = mask.leading_ones();
    if mask.checked_shl(plen).unwrap_or(0) != 0 {
        return None;
    }
    Some(plen as u8)
}
