//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use bitflags::bitflags;
use derive_new::new;
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct LinkFlags: u8 {
        const ADMIN_UP = 0x01;
        const OPERATIVE = 0x02;
        const LOOPBACK = 0x04;
    }
}

// Read view of a kernel link.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LinkSnapshot {
    pub ifindex: u32,
    pub name: String,
    // Links without IFLA_INFO_KIND (physical devices) have no kind.
    pub kind: Option<LinkKind>,
    pub flags: LinkFlags,
    pub mtu: u32,
    pub address: Option<MacAddr>,
    pub alias: Option<String>,
    pub controller: Option<u32>,
    pub stats: LinkStats,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LinkStats {
    pub in_octets: u64,
    pub in_pkts: u64,
    pub in_errors: u64,
    pub in_discards: u64,
    pub out_octets: u64,
    pub out_pkts: u64,
    pub out_errors: u64,
    pub out_discards: u64,
}

#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AddressSnapshot {
    pub ifindex: u32,
    pub addr: IpNetwork,
}

#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborSnapshot {
    pub ifindex: u32,
    pub ip: IpAddr,
    pub lladdr: Option<MacAddr>,
    // Statically configured (NUD_PERMANENT) entry.
    pub permanent: bool,
}

// Next hop of a kernel route. Routes installed through this layer set at
// least one of the two fields.
#[derive(Clone, Copy, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Nexthop {
    pub addr: Option<IpAddr>,
    pub ifindex: Option<u32>,
}

// Origin of a kernel route (rtm_protocol).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RouteProtocol {
    Kernel,
    Static,
    Other(u8),
}

// Read view of a unicast kernel route.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteSnapshot {
    pub prefix: IpNetwork,
    pub nexthop: Nexthop,
    pub protocol: RouteProtocol,
    pub table: u32,
    pub metric: u32,
}

// Single attribute update applied to an existing link.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LinkChange {
    AdminStatus(bool),
    Mtu(u32),
    // An empty alias clears it.
    Alias(String),
    Address(MacAddr),
    Controller(Option<u32>),
}

// Kernel-affecting request, as logged before being sent.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum KernelRequest {
    LinkAdd { name: String, kind: LinkKind },
    LinkSet { ifindex: u32, change: LinkChange },
    LinkDel { ifindex: u32 },
    AddressAdd { ifindex: u32, addr: IpNetwork },
    AddressDel { ifindex: u32, addr: IpNetwork },
    NeighborAdd { ifindex: u32, ip: IpAddr, lladdr: MacAddr },
    NeighborDel { ifindex: u32, ip: IpAddr },
    RouteAdd { prefix: IpNetwork, nexthop: Nexthop },
    RouteDel { prefix: IpNetwork },
}

// Main routing table (RT_TABLE_MAIN).
pub const RT_TABLE_MAIN: u32 = 254;

// ===== impl LinkSnapshot =====

impl LinkSnapshot {
    pub fn admin_up(&self) -> bool {
        self.flags.contains(LinkFlags::ADMIN_UP)
    }

    pub fn oper_up(&self) -> bool {
        self.flags.contains(LinkFlags::OPERATIVE)
    }

    // Returns the link kind, treating the loopback device as such even though
    // the kernel reports no IFLA_INFO_KIND for it.
    pub fn effective_kind(&self) -> Option<LinkKind> {
        if self.flags.contains(LinkFlags::LOOPBACK) {
            return Some(LinkKind::Loopback);
        }
        self.kind
    }
}
