//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;

use ifsync_southbound::snapshot::{
    AddressSnapshot, LinkSnapshot, LinkStats, NeighborSnapshot,
};
use ifsync_utils::ip::{AddressFamily, IpAddrExt, IpNetworkKind};
use serde::Serialize;

// Operational view of one kernel link.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Interface {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub if_type: Option<&'static str>,
    pub if_index: u32,
    pub admin_status: Status,
    pub oper_status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phys_address: Option<String>,
    pub mtu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_port: Option<String>,
    pub statistics: Statistics,
    pub ipv4: IpFamily,
    pub ipv6: IpFamily,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Statistics {
    pub in_octets: u64,
    pub in_unicast_pkts: u64,
    pub in_errors: u64,
    pub in_discards: u64,
    pub out_octets: u64,
    pub out_unicast_pkts: u64,
    pub out_errors: u64,
    pub out_discards: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IpFamily {
    pub address: BTreeMap<IpAddr, Address>,
    pub neighbor: BTreeMap<IpAddr, Neighbor>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Address {
    pub prefix_length: u8,
    pub origin: Origin,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Neighbor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_layer_address: Option<String>,
    pub origin: Origin,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    Static,
    Dynamic,
    LinkLayer,
}

// ===== impl Interface =====

impl Interface {
    // Projects the kernel view of a link into its operational state.
    //
    // `names` maps link indexes to names, to resolve the bridge a link is
    // enslaved to.
    pub(crate) fn from_kernel(
        link: &LinkSnapshot,
        addresses: &[AddressSnapshot],
        neighbors: &[NeighborSnapshot],
        names: &BTreeMap<u32, String>,
    ) -> Interface {
        let mut ipv4 = IpFamily::default();
        let mut ipv6 = IpFamily::default();
        for address in addresses.iter().filter(|a| a.ifindex == link.ifindex)
        {
            let ip = address.addr.ip();
            let origin = if is_link_local(&ip) {
                Origin::LinkLayer
            } else {
                Origin::Static
            };
            let entry = Address {
                prefix_length: address.addr.prefix(),
                origin,
            };
            let table = match address.addr.address_family() {
                AddressFamily::Ipv4 => &mut ipv4,
                AddressFamily::Ipv6 => &mut ipv6,
            };
            table.address.insert(ip, entry);
        }

        for neighbor in neighbors.iter().filter(|n| n.ifindex == link.ifindex)
        {
            let entry = Neighbor {
                link_layer_address: neighbor
                    .lladdr
                    .map(|lladdr| lladdr.to_string()),
                origin: if neighbor.permanent {
                    Origin::Static
                } else {
                    Origin::Dynamic
                },
            };
            let table = match neighbor.ip.address_family() {
                AddressFamily::Ipv4 => &mut ipv4,
                AddressFamily::Ipv6 => &mut ipv6,
            };
            table.neighbor.insert(neighbor.ip, entry);
        }

        Interface {
            name: link.name.clone(),
            if_type: link.effective_kind().map(|kind| kind.to_iana()),
            if_index: link.ifindex,
            admin_status: Status::from(link.admin_up()),
            oper_status: Status::from(link.oper_up()),
            phys_address: link.address.map(|address| address.to_string()),
            mtu: link.mtu,
            description: link.alias.clone(),
            bridge_port: link
                .controller
                .and_then(|ifindex| names.get(&ifindex))
                .cloned(),
            statistics: Statistics::from(&link.stats),
            ipv4,
            ipv6,
        }
    }

    // Returns the address table of the given family.
    pub fn family(&self, af: AddressFamily) -> &IpFamily {
        match af {
            AddressFamily::Ipv4 => &self.ipv4,
            AddressFamily::Ipv6 => &self.ipv6,
        }
    }
}

// ===== impl Status =====

impl From<bool> for Status {
    fn from(up: bool) -> Status {
        if up { Status::Up } else { Status::Down }
    }
}

// ===== impl Statistics =====

impl From<&LinkStats> for Statistics {
    fn from(stats: &LinkStats) -> Statistics {
        Statistics {
            in_octets: stats.in_octets,
            in_unicast_pkts: stats.in_pkts,
            in_errors: stats.in_errors,
            in_discards: stats.in_discards,
            out_octets: stats.out_octets,
            out_unicast_pkts: stats.out_pkts,
            out_errors: stats.out_errors,
            out_discards: stats.out_discards,
        }
    }
}

// ===== helper functions =====

fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V6(ip) => (ip.segments()[0] & 0xffc0) == 0xfe80,
        IpAddr::V4(_) => false,
    }
}
