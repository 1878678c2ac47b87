//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_southbound::snapshot::Nexthop;
use ipnetwork::IpNetwork;
use tracing::{debug, debug_span};

// Routing plugin debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    RouteInstall(&'a IpNetwork, &'a Nexthop),
    RouteUpdate(&'a IpNetwork, &'a Nexthop),
    RouteUninstall(&'a IpNetwork),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::RouteInstall(prefix, nexthop)
            | Debug::RouteUpdate(prefix, nexthop) => {
                debug_span!("route", %prefix).in_scope(|| {
                    debug!(
                        addr = ?nexthop.addr, ifindex = ?nexthop.ifindex,
                        "{}", self
                    );
                });
            }
            Debug::RouteUninstall(prefix) => {
                debug_span!("route", %prefix).in_scope(|| {
                    debug!("{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::RouteInstall(..) => {
                write!(f, "installing route")
            }
            Debug::RouteUpdate(..) => {
                write!(f, "updating route next hop")
            }
            Debug::RouteUninstall(..) => {
                write!(f, "uninstalling route")
            }
        }
    }
}
