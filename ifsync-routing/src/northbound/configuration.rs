//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use ifsync_northbound::change::{ChangeOp, ChangeRecord};
use ifsync_northbound::configuration::{
    FieldKind, HandlerArgs, Handlers, HandlersBuilder, Provider, Resolution,
};
use ifsync_northbound::error::Error;
use ifsync_southbound::snapshot::{Nexthop, RT_TABLE_MAIN, RouteSnapshot};
use ifsync_southbound::{Kernel, KernelError};
use ifsync_utils::IFNAMSIZ_MAX;
use ifsync_utils::ip::{self, AddressFamily, IpNetworkKind};
use ifsync_utils::xpath;
use ipnetwork::IpNetwork;

use crate::Master;
use crate::debug::Debug;

static HANDLERS: Lazy<Handlers<Master>> = Lazy::new(load_handlers);

// Next-hop leaves aggregated into a route.
const NEXT_HOP_ADDRESS: &str = "next-hop-address";
const OUTGOING_INTERFACE: &str = "outgoing-interface";

// Kernel session of one static route instance.
pub struct Session {
    kernel: Box<dyn Kernel>,
}

// ===== configuration handlers =====

fn load_handlers() -> Handlers<Master> {
    HandlersBuilder::<Master>::default()
        .path("destination-prefix")
        .kind(FieldKind::Identity)
        .validate(validate_prefix)
        .resolve(resolve_route)
        .create(route_install)
        .delete(route_uninstall)
        .path("next-hop/next-hop-address")
        .validate(validate_nexthop_address)
        .resolve(resolve_nexthop)
        .create(nexthop_update)
        .modify(nexthop_update)
        .delete(nexthop_update)
        .path("next-hop/outgoing-interface")
        .validate(validate_outgoing_interface)
        .resolve(resolve_nexthop)
        .create(nexthop_update)
        .modify(nexthop_update)
        .delete(nexthop_update)
        .build()
}

// ===== impl Master =====

impl Provider for Master {
    type Session = Session;

    fn handlers() -> &'static Handlers<Master> {
        &HANDLERS
    }

    fn open_session(&mut self) -> Result<Session, Error> {
        let kernel = self
            .southbound
            .open()
            .map_err(|error| Error::SessionInit(error.reason()))?;
        Ok(Session { kernel })
    }
}

// ===== impl Session =====

impl Session {
    // Looks up the main-table route to the given prefix.
    fn route(
        &mut self,
        prefix: IpNetwork,
    ) -> Result<Option<RouteSnapshot>, Error> {
        let routes = self
            .kernel
            .routes(prefix.address_family())
            .map_err(resolution_error)?;
        Ok(routes.into_iter().find(|route| {
            route.table == RT_TABLE_MAIN && route.prefix == prefix
        }))
    }

    fn ifindex(&mut self, name: &str) -> Result<Option<u32>, Error> {
        match self.kernel.link_by_name(name) {
            Ok(link) => Ok(Some(link.ifindex)),
            Err(KernelError::NotFound) => Ok(None),
            Err(error) => Err(resolution_error(error)),
        }
    }

    fn ifname(&mut self, ifindex: u32) -> Result<Option<String>, Error> {
        match self.kernel.link(ifindex) {
            Ok(link) => Ok(Some(link.name)),
            Err(KernelError::NotFound) => Ok(None),
            Err(error) => Err(resolution_error(error)),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

// ===== destination prefix =====

fn validate_prefix(change: &ChangeRecord) -> Result<(), Error> {
    record_prefix(change).map(|_| ())
}

fn resolve_route(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let prefix = record_prefix(args.change)?;
    let Some(route) = session.route(prefix)? else {
        return Ok(Resolution::Absent);
    };
    if args.change.operation == ChangeOp::Deleted {
        return Ok(Resolution::Differs);
    }

    // Adopt a route that already matches the configuration.
    let nexthop = desired_nexthop(session, args, Some(&route))?;
    let resolution = if route.nexthop == nexthop {
        Resolution::Unchanged
    } else {
        Resolution::Differs
    };
    Ok(resolution)
}

fn route_install(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let prefix = record_prefix(args.change)?;
    let nexthop = desired_nexthop(session, args, None)?;

    Debug::RouteInstall(&prefix, &nexthop).log();
    session
        .kernel
        .route_add(prefix, nexthop)
        .map_err(kernel_error)
}

fn route_uninstall(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let prefix = record_prefix(args.change)?;

    Debug::RouteUninstall(&prefix).log();
    match session.kernel.route_del(prefix) {
        Ok(()) | Err(KernelError::NotFound) => Ok(()),
        Err(error) => Err(kernel_error(error)),
    }
}

// ===== next hop =====

fn validate_nexthop_address(change: &ChangeRecord) -> Result<(), Error> {
    let value = leaf_value(change)?;
    let af = record_af(change);
    ip::parse_ip(value, af).map(|_| ()).ok_or_else(|| {
        Error::InvalidArgument(format!("{value}: invalid {af} address"))
    })
}

fn validate_outgoing_interface(change: &ChangeRecord) -> Result<(), Error> {
    let name = leaf_value(change)?;
    if name.is_empty() || name.len() > IFNAMSIZ_MAX {
        return Err(Error::InvalidArgument(format!(
            "{name}: interface name must have between 1 and {IFNAMSIZ_MAX} characters"
        )));
    }
    Ok(())
}

fn resolve_nexthop(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let prefix = route_prefix(args)?;
    let Some(route) = session.route(prefix)? else {
        return Ok(Resolution::ParentMissing);
    };

    let nexthop = desired_nexthop(session, args, Some(&route))?;
    let resolution = match (route.nexthop == nexthop, args.change.operation) {
        (true, ChangeOp::Deleted) => Resolution::Absent,
        (true, _) => Resolution::Unchanged,
        (false, _) => Resolution::Differs,
    };
    Ok(resolution)
}

fn nexthop_update(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let prefix = route_prefix(args)?;
    let route = session
        .route(prefix)?
        .ok_or_else(|| Error::ParentNotFound(args.change.path.clone()))?;
    let nexthop = desired_nexthop(session, args, Some(&route))?;

    Debug::RouteUpdate(&prefix, &nexthop).log();
    session
        .kernel
        .route_add(prefix, nexthop)
        .map_err(kernel_error)
}

// ===== helper functions =====

fn leaf_value(change: &ChangeRecord) -> Result<&str, Error> {
    change
        .effective_value()
        .ok_or_else(|| Error::MissingField(change.path.clone()))
}

// Returns the address family of the static route list a record belongs to.
fn record_af(change: &ChangeRecord) -> AddressFamily {
    if xpath::parse(&change.path)
        .iter()
        .any(|node| node.name == "ipv6")
    {
        AddressFamily::Ipv6
    } else {
        AddressFamily::Ipv4
    }
}

fn parse_prefix(
    value: &str,
    af: AddressFamily,
) -> Result<IpNetwork, Error> {
    let prefix = value
        .parse::<IpNetwork>()
        .ok()
        .filter(|prefix| prefix.address_family() == af)
        .ok_or_else(|| {
            Error::InvalidArgument(format!("{value}: invalid {af} prefix"))
        })?;

    // The kernel refuses destinations with host bits set.
    if prefix.ip() != prefix.network() {
        return Err(Error::InvalidArgument(format!(
            "{value}: host bits set in destination prefix"
        )));
    }
    Ok(prefix)
}

fn record_prefix(change: &ChangeRecord) -> Result<IpNetwork, Error> {
    parse_prefix(leaf_value(change)?, record_af(change))
}

// Returns the destination prefix of the route a next-hop record belongs to.
fn route_prefix(args: &HandlerArgs<'_>) -> Result<IpNetwork, Error> {
    let value = args
        .key("route", "destination-prefix")
        .ok_or_else(|| Error::MissingField(args.change.path.clone()))?;
    parse_prefix(value, record_af(args.change))
}

// Aggregates the next hop a route has once the transaction is applied.
//
// Next-hop leaves carried by the transaction take precedence over the ones
// found in the kernel route. A deleted leaf leaves its slot empty.
fn desired_nexthop(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
    route: Option<&RouteSnapshot>,
) -> Result<Nexthop, Error> {
    let change = args.change;
    let changes = args.changes;
    let af = record_af(change);
    let entry = xpath::list_entry_path(&change.path, "route")
        .ok_or_else(|| Error::MissingField(change.path.clone()))?;

    for leaf in [NEXT_HOP_ADDRESS, OUTGOING_INTERFACE] {
        let path = format!("{entry}/next-hop/{leaf}");
        let value = match changes.find(&path) {
            Some(change) => match change.operation {
                ChangeOp::Deleted => None,
                _ => change.value.clone(),
            },
            None => match (leaf, route) {
                (NEXT_HOP_ADDRESS, Some(route)) => {
                    route.nexthop.addr.map(|addr| addr.to_string())
                }
                (OUTGOING_INTERFACE, Some(route)) => {
                    match route.nexthop.ifindex {
                        Some(ifindex) => session.ifname(ifindex)?,
                        None => None,
                    }
                }
                _ => None,
            },
        };
        if let Some(value) = value {
            args.aggregator.set(leaf, value);
        }
    }

    let addr = match args.aggregator.get(NEXT_HOP_ADDRESS) {
        Some(value) => Some(ip::parse_ip(value, af).ok_or_else(|| {
            Error::InvalidArgument(format!("{value}: invalid {af} address"))
        })?),
        None => None,
    };
    let ifindex = match args.aggregator.get(OUTGOING_INTERFACE) {
        Some(name) => {
            let ifindex = session.ifindex(name)?.ok_or_else(|| {
                Error::ParentNotFound(format!(
                    "{entry}/next-hop/{OUTGOING_INTERFACE}"
                ))
            })?;
            Some(ifindex)
        }
        None => None,
    };
    if addr.is_none() && ifindex.is_none() {
        return Err(Error::MissingField(format!("{entry}/next-hop")));
    }

    Ok(Nexthop::new(addr, ifindex))
}

fn resolution_error(error: KernelError) -> Error {
    error.log();
    Error::Resolution(error.reason())
}

fn kernel_error(error: KernelError) -> Error {
    error.log();
    Error::KernelCall(error.reason())
}
