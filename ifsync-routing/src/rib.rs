//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;

use ifsync_southbound::snapshot::{RouteProtocol, RouteSnapshot};
use ifsync_utils::ip::AddressFamily;
use ipnetwork::IpNetwork;
use serde::Serialize;

// Operational view of one kernel routing table of one address family.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Rib {
    pub name: String,
    pub address_family: &'static str,
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Route {
    pub destination_prefix: IpNetwork,
    pub next_hop: NextHop,
    pub source_protocol: &'static str,
    pub active: bool,
    pub route_preference: u32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NextHop {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing_interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hop_address: Option<IpAddr>,
}

// ===== impl Rib =====

impl Rib {
    // Groups the routes of one address family into one RIB per table.
    pub(crate) fn from_kernel(
        af: AddressFamily,
        routes: &[RouteSnapshot],
        names: &BTreeMap<u32, String>,
    ) -> Vec<Rib> {
        let mut tables = BTreeMap::<u32, Vec<Route>>::new();
        for route in routes {
            tables
                .entry(route.table)
                .or_default()
                .push(Route::from_kernel(route, names));
        }

        tables
            .into_iter()
            .map(|(table, routes)| Rib {
                name: format!("{af}-{}", table_name(table)),
                address_family: match af {
                    AddressFamily::Ipv4 => "ietf-routing:ipv4",
                    AddressFamily::Ipv6 => "ietf-routing:ipv6",
                },
                routes,
            })
            .collect()
    }
}

// ===== impl Route =====

impl Route {
    fn from_kernel(
        route: &RouteSnapshot,
        names: &BTreeMap<u32, String>,
    ) -> Route {
        let outgoing_interface = route
            .nexthop
            .ifindex
            .and_then(|ifindex| names.get(&ifindex).cloned());
        let source_protocol = match route.protocol {
            RouteProtocol::Static => "ietf-routing:static",
            RouteProtocol::Kernel | RouteProtocol::Other(_) => {
                "ietf-routing:direct"
            }
        };

        Route {
            destination_prefix: route.prefix,
            next_hop: NextHop {
                outgoing_interface,
                next_hop_address: route.nexthop.addr,
            },
            source_protocol,
            // The kernel only reports installed routes.
            active: true,
            route_preference: route.metric,
        }
    }
}

// ===== helper functions =====

fn table_name(table: u32) -> String {
    match table {
        253 => "default".to_owned(),
        254 => "main".to_owned(),
        255 => "local".to_owned(),
        _ => table.to_string(),
    }
}
