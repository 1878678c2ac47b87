//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::LazyLock as Lazy;

use ifsync_northbound::change::{ChangeOp, ChangeRecord};
use ifsync_northbound::configuration::{
    FieldKind, HandlerArgs, Handlers, HandlersBuilder, Provider, Resolution,
};
use ifsync_northbound::error::Error;
use ifsync_southbound::snapshot::{LinkChange, LinkSnapshot};
use ifsync_utils::IFNAMSIZ_MAX;
use ifsync_utils::ip::{self, AddressFamily, IpAddrExt};
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ifsync_utils::xpath;
use ipnetwork::IpNetwork;

use crate::Master;
use crate::debug::Debug;
use crate::resolver::Session;

// Kernel defaults restored when the corresponding leaf is deleted.
const DFLT_ENABLED: bool = true;
const DFLT_MTU: u32 = 1500;

static HANDLERS: Lazy<Handlers<Master>> = Lazy::new(load_handlers);

// ===== configuration handlers =====

fn load_handlers() -> Handlers<Master> {
    HandlersBuilder::<Master>::default()
        .path("name")
        .kind(FieldKind::Identity)
        .validate(validate_name)
        .resolve(resolve_link)
        .create(link_create)
        .delete(link_delete)
        .path("description")
        .resolve(resolve_description)
        .create(description_set)
        .modify(description_set)
        .delete(description_set)
        .path("type")
        .validate(validate_type)
        .resolve(resolve_type)
        .create(type_change)
        .modify(type_change)
        .path("enabled")
        .resolve(resolve_enabled)
        .create(enabled_set)
        .modify(enabled_set)
        .delete(enabled_set)
        .path("ipv4/mtu")
        .validate(validate_mtu)
        .resolve(resolve_mtu)
        .create(mtu_set)
        .modify(mtu_set)
        .delete(mtu_set)
        .path("ipv4/enabled")
        .validate(validate_boolean)
        .resolve(resolve_ip_enabled)
        .create(ip_flush)
        .modify(ip_flush)
        .path("ipv6/enabled")
        .validate(validate_boolean)
        .resolve(resolve_ip_enabled)
        .create(ip_flush)
        .modify(ip_flush)
        .path("ipv4/address/ip")
        .kind(FieldKind::Identity)
        .validate(validate_ip)
        .resolve(resolve_address)
        .create(address_create)
        .delete(address_delete)
        .path("ipv6/address/ip")
        .kind(FieldKind::Identity)
        .validate(validate_ip)
        .resolve(resolve_address)
        .create(address_create)
        .delete(address_delete)
        .path("ipv4/address/prefix-length")
        .validate(validate_prefix)
        .resolve(resolve_prefix)
        .create(prefix_replace)
        .modify(prefix_replace)
        .path("ipv6/address/prefix-length")
        .validate(validate_prefix)
        .resolve(resolve_prefix)
        .create(prefix_replace)
        .modify(prefix_replace)
        .path("ipv4/address/netmask")
        .validate(validate_prefix)
        .resolve(resolve_prefix)
        .create(prefix_replace)
        .modify(prefix_replace)
        .path("ipv4/neighbor/ip")
        .kind(FieldKind::Identity)
        .validate(validate_ip)
        .resolve(resolve_neighbor)
        .create(neighbor_create)
        .delete(neighbor_delete)
        .path("ipv6/neighbor/ip")
        .kind(FieldKind::Identity)
        .validate(validate_ip)
        .resolve(resolve_neighbor)
        .create(neighbor_create)
        .delete(neighbor_delete)
        .path("ipv4/neighbor/link-layer-address")
        .validate(validate_lladdr)
        .resolve(resolve_lladdr)
        .create(lladdr_set)
        .modify(lladdr_set)
        .path("ipv6/neighbor/link-layer-address")
        .validate(validate_lladdr)
        .resolve(resolve_lladdr)
        .create(lladdr_set)
        .modify(lladdr_set)
        .path("bridge-port/component-name")
        .resolve(resolve_bridge_port)
        .create(bridge_port_set)
        .modify(bridge_port_set)
        .delete(bridge_port_release)
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
        Ok(Session::new(kernel))
    }
}

// ===== link =====

fn validate_name(change: &ChangeRecord) -> Result<(), Error> {
    let name = leaf_value(change)?;
    if name.is_empty() || name.len() > IFNAMSIZ_MAX {
        return Err(Error::InvalidArgument(format!(
            "{name}: interface name must have between 1 and {IFNAMSIZ_MAX} characters"
        )));
    }
    if name.contains(['/', ' ']) {
        return Err(Error::InvalidArgument(format!(
            "{name}: invalid interface name"
        )));
    }
    Ok(())
}

fn resolve_link(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let name = leaf_value(args.change)?;
    let Some(link) = session.link(name)? else {
        return Ok(Resolution::Absent);
    };

    // Existing links are adopted unless their kind contradicts the
    // configured type.
    if let Some(kind) = configured_kind(args)?
        && let Some(current) = link.effective_kind()
        && current != kind
    {
        return Ok(Resolution::Differs);
    }
    Ok(Resolution::Unchanged)
}

fn link_create(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let name = leaf_value(args.change)?;
    let kind = configured_kind(args)?.unwrap_or(LinkKind::DEFAULT);

    Debug::LinkCreate(name, kind).log();
    session.link_add(name, kind)?;
    Ok(())
}

fn link_delete(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let name = leaf_value(args.change)?;
    let Some(link) = session.link(name)? else {
        return Ok(());
    };

    Debug::LinkDelete(name).log();
    session.link_del(&link)
}

// ===== description =====

fn resolve_description(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let desired = match args.change.operation {
        ChangeOp::Deleted => None,
        _ => Some(leaf_value(args.change)?),
    };
    let resolution = match (link.alias.as_deref(), desired) {
        (None, None) => Resolution::Absent,
        (current, desired) if current == desired => Resolution::Unchanged,
        _ => Resolution::Differs,
    };
    Ok(resolution)
}

fn description_set(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let alias = match args.change.operation {
        ChangeOp::Deleted => String::new(),
        _ => leaf_value(args.change)?.to_owned(),
    };
    session.link_set(&link, LinkChange::Alias(alias))
}

// ===== type =====

fn validate_type(change: &ChangeRecord) -> Result<(), Error> {
    record_kind(change).map(|_| ())
}

fn resolve_type(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let kind = record_kind(args.change)?;
    let resolution = match link.effective_kind() {
        // Physical devices report no kind and accept any type.
        None => Resolution::Unchanged,
        Some(current) if current == kind => Resolution::Unchanged,
        Some(_) => Resolution::Differs,
    };
    Ok(resolution)
}

fn type_change(
    _session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    Err(Error::UnsupportedTransition(
        args.change.operation,
        args.change.path.clone(),
    ))
}

// ===== enabled =====

fn resolve_enabled(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let desired = desired_enabled(args.change);
    Ok(attribute_resolution(args.change, link.admin_up() == desired))
}

fn enabled_set(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let desired = desired_enabled(args.change);
    session.link_set(&link, LinkChange::AdminStatus(desired))
}

// ===== mtu =====

fn validate_mtu(change: &ChangeRecord) -> Result<(), Error> {
    record_mtu(change).map(|_| ())
}

fn resolve_mtu(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let desired = desired_mtu(args.change)?;
    Ok(attribute_resolution(args.change, link.mtu == desired))
}

fn mtu_set(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let desired = desired_mtu(args.change)?;
    session.link_set(&link, LinkChange::Mtu(desired))
}

// ===== ipv4/ipv6 enabled =====

fn validate_boolean(change: &ChangeRecord) -> Result<(), Error> {
    record_boolean(change).map(|_| ())
}

fn resolve_ip_enabled(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    // Deleting the leaf restores the default, which leaves addresses
    // untouched.
    if args.change.operation == ChangeOp::Deleted {
        return Ok(Resolution::Absent);
    }
    if record_boolean(args.change)? {
        return Ok(Resolution::Unchanged);
    }

    let af = record_af(args.change);
    let resolution = if session.addresses(&link, af)?.is_empty() {
        Resolution::Unchanged
    } else {
        Resolution::Differs
    };
    Ok(resolution)
}

fn ip_flush(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    if record_boolean(args.change)? {
        return Ok(());
    }

    let link = require_link(session, args.change)?;
    let af = record_af(args.change);
    for addr in session.addresses(&link, af)? {
        session.address_del(&link, addr)?;
    }
    Ok(())
}

// ===== address =====

fn validate_ip(change: &ChangeRecord) -> Result<(), Error> {
    record_ip(change).map(|_| ())
}

fn resolve_address(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let ip = record_ip(args.change)?;
    let Some(current) = session.address(&link, ip)? else {
        return Ok(Resolution::Absent);
    };
    if args.change.operation == ChangeOp::Created {
        let plen = prefix_length(args, ip.address_family())?;
        if current.prefix() != plen {
            return Ok(Resolution::Differs);
        }
    }
    Ok(Resolution::Unchanged)
}

fn address_create(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let ip = record_ip(args.change)?;
    let plen = prefix_length(args, ip.address_family())?;
    session.address_add(&link, network(ip, plen)?)
}

fn address_delete(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let ip = record_ip(args.change)?;

    // Prefer the prefix length deleted along with the address, falling back
    // to the one installed in the kernel.
    let addr = match prefix_length(args, ip.address_family()) {
        Ok(plen) => network(ip, plen)?,
        Err(_) => match session.address(&link, ip)? {
            Some(addr) => addr,
            None => return Ok(()),
        },
    };
    session.address_del(&link, addr)
}

// ===== address prefix =====

fn validate_prefix(change: &ChangeRecord) -> Result<(), Error> {
    record_prefix(change).map(|_| ())
}

fn resolve_prefix(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let ip = list_ip(args.change, "address")?;
    let Some(current) = session.address(&link, ip)? else {
        return Ok(Resolution::Absent);
    };
    let resolution = if current.prefix() == record_prefix(args.change)? {
        Resolution::Unchanged
    } else {
        Resolution::Differs
    };
    Ok(resolution)
}

fn prefix_replace(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let ip = list_ip(args.change, "address")?;
    let plen = record_prefix(args.change)?;

    if let Some(current) = session.address(&link, ip)? {
        session.address_del(&link, current)?;
    }
    session.address_add(&link, network(ip, plen)?)
}

// ===== neighbor =====

fn resolve_neighbor(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let ip = record_ip(args.change)?;
    let Some(current) = session.neighbor(&link, ip)? else {
        return Ok(Resolution::Absent);
    };
    if args.change.operation == ChangeOp::Created {
        let lladdr = neighbor_lladdr(args)?;
        if current.lladdr != Some(lladdr) {
            return Ok(Resolution::Differs);
        }
    }
    Ok(Resolution::Unchanged)
}

fn neighbor_create(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let ip = record_ip(args.change)?;
    let lladdr = neighbor_lladdr(args)?;
    session.neighbor_add(&link, ip, lladdr)
}

fn neighbor_delete(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let ip = record_ip(args.change)?;
    session.neighbor_del(&link, ip)
}

// ===== neighbor link-layer address =====

fn validate_lladdr(change: &ChangeRecord) -> Result<(), Error> {
    record_lladdr(change).map(|_| ())
}

fn resolve_lladdr(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    let ip = list_ip(args.change, "neighbor")?;
    let Some(current) = session.neighbor(&link, ip)? else {
        return Ok(Resolution::Absent);
    };
    let resolution = if current.lladdr == Some(record_lladdr(args.change)?) {
        Resolution::Unchanged
    } else {
        Resolution::Differs
    };
    Ok(resolution)
}

fn lladdr_set(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let ip = list_ip(args.change, "neighbor")?;
    let lladdr = record_lladdr(args.change)?;
    session.neighbor_add(&link, ip, lladdr)
}

// ===== bridge port =====

fn resolve_bridge_port(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = instance_link(session, args.change)? else {
        return Ok(Resolution::ParentMissing);
    };

    if args.change.operation == ChangeOp::Deleted {
        let resolution = match link.controller {
            Some(_) => Resolution::Differs,
            None => Resolution::Absent,
        };
        return Ok(resolution);
    }

    let Some(bridge) = session.link(leaf_value(args.change)?)? else {
        return Ok(Resolution::ParentMissing);
    };
    let resolution = if link.controller == Some(bridge.ifindex) {
        Resolution::Unchanged
    } else {
        Resolution::Differs
    };
    Ok(resolution)
}

fn bridge_port_set(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    let bridge = session
        .link(leaf_value(args.change)?)?
        .ok_or_else(|| Error::ParentNotFound(args.change.path.clone()))?;
    session.link_set(&link, LinkChange::Controller(Some(bridge.ifindex)))
}

fn bridge_port_release(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = require_link(session, args.change)?;
    session.link_set(&link, LinkChange::Controller(None))
}

// ===== helper functions =====

fn leaf_value(change: &ChangeRecord) -> Result<&str, Error> {
    change
        .effective_value()
        .ok_or_else(|| Error::MissingField(change.path.clone()))
}

fn invalid(change: &ChangeRecord, what: &str) -> Error {
    Error::InvalidArgument(format!(
        "{}: invalid {} '{}'",
        change.path,
        what,
        change.effective_value().unwrap_or_default()
    ))
}

// Returns the name of the interface a record belongs to.
fn if_name(change: &ChangeRecord) -> Result<&str, Error> {
    xpath::key_value(&change.path, "interface", "name")
        .ok_or_else(|| Error::MissingField(change.path.clone()))
}

fn instance_link(
    session: &mut Session,
    change: &ChangeRecord,
) -> Result<Option<LinkSnapshot>, Error> {
    session.link(if_name(change)?)
}

fn require_link(
    session: &mut Session,
    change: &ChangeRecord,
) -> Result<LinkSnapshot, Error> {
    instance_link(session, change)?
        .ok_or_else(|| Error::ParentNotFound(change.path.clone()))
}

// Maps the comparison of an attribute against kernel truth into a
// resolution. Deleting an attribute already at its default is a no-op.
fn attribute_resolution(change: &ChangeRecord, equal: bool) -> Resolution {
    match (change.operation, equal) {
        (ChangeOp::Deleted, true) => Resolution::Absent,
        (_, true) => Resolution::Unchanged,
        (_, false) => Resolution::Differs,
    }
}

// Returns the link kind configured through the sibling `type` leaf, if any.
fn configured_kind(
    args: &mut HandlerArgs<'_>,
) -> Result<Option<LinkKind>, Error> {
    let Some(value) = args.aggregate("type", "type") else {
        return Ok(None);
    };
    LinkKind::from_iana(value).map(Some).ok_or_else(|| {
        Error::InvalidArgument(format!("{value}: unsupported interface type"))
    })
}

fn record_kind(change: &ChangeRecord) -> Result<LinkKind, Error> {
    LinkKind::from_iana(leaf_value(change)?)
        .ok_or_else(|| invalid(change, "interface type"))
}

fn record_boolean(change: &ChangeRecord) -> Result<bool, Error> {
    match leaf_value(change)? {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(change, "boolean")),
    }
}

fn desired_enabled(change: &ChangeRecord) -> bool {
    match change.operation {
        ChangeOp::Deleted => DFLT_ENABLED,
        _ => change.value.as_deref() == Some("true"),
    }
}

// `ipv4/mtu` sets the link MTU. `ipv6/mtu` has no handler since the kernel
// IPv6 MTU follows the link MTU.
fn record_mtu(change: &ChangeRecord) -> Result<u32, Error> {
    leaf_value(change)?
        .parse::<u16>()
        .ok()
        .filter(|mtu| *mtu >= 68)
        .map(u32::from)
        .ok_or_else(|| invalid(change, "MTU"))
}

fn desired_mtu(change: &ChangeRecord) -> Result<u32, Error> {
    match change.operation {
        ChangeOp::Deleted => Ok(DFLT_MTU),
        _ => record_mtu(change),
    }
}

// Returns the address family of the `ipv4` or `ipv6` container a record
// belongs to.
fn record_af(change: &ChangeRecord) -> AddressFamily {
    if xpath::parse(&change.path)
        .iter()
        .any(|node| node.name == AddressFamily::Ipv6.container())
    {
        AddressFamily::Ipv6
    } else {
        AddressFamily::Ipv4
    }
}

fn record_ip(change: &ChangeRecord) -> Result<IpAddr, Error> {
    let af = record_af(change);
    ip::parse_ip(leaf_value(change)?, af)
        .ok_or_else(|| invalid(change, &format!("{af} address")))
}

// Returns the IP key of the address or neighbor entry a record belongs to.
fn list_ip(change: &ChangeRecord, list: &str) -> Result<IpAddr, Error> {
    let af = record_af(change);
    let value = xpath::key_value(&change.path, list, "ip")
        .ok_or_else(|| Error::MissingField(format!("{}/ip", change.path)))?;
    ip::parse_ip(value, af).ok_or_else(|| {
        Error::InvalidArgument(format!("{value}: invalid {af} address"))
    })
}

// Parses a `prefix-length` or `netmask` leaf into a prefix length.
fn record_prefix(change: &ChangeRecord) -> Result<u8, Error> {
    let value = leaf_value(change)?;
    let plen = match xpath::node_name(&change.path) {
        Some("netmask") => ip::netmask_to_prefixlen(value),
        _ => ip::parse_prefixlen(value, record_af(change)),
    };
    plen.ok_or_else(|| invalid(change, "prefix"))
}

// Returns the prefix length of the address entry the current record belongs
// to. IPv4 addresses accept a netmask instead.
fn prefix_length(
    args: &mut HandlerArgs<'_>,
    af: AddressFamily,
) -> Result<u8, Error> {
    if args.aggregate("prefix-length", "prefix-length").is_none()
        && af == AddressFamily::Ipv4
        && let Some(netmask) = args.aggregate("netmask", "netmask")
    {
        let plen = ip::netmask_to_prefixlen(netmask).ok_or_else(|| {
            Error::InvalidArgument(format!("{netmask}: invalid netmask"))
        })?;
        args.aggregator.set("prefix-length", plen.to_string());
    }

    let value = args.require("prefix-length")?;
    ip::parse_prefixlen(value, af).ok_or_else(|| {
        Error::InvalidArgument(format!("{value}: invalid prefix length"))
    })
}

fn neighbor_lladdr(args: &mut HandlerArgs<'_>) -> Result<MacAddr, Error> {
    args.aggregate("link-layer-address", "link-layer-address");
    let value = args.require("link-layer-address")?;
    value.parse().map_err(|_| {
        Error::InvalidArgument(format!("{value}: invalid link-layer address"))
    })
}

fn record_lladdr(change: &ChangeRecord) -> Result<MacAddr, Error> {
    leaf_value(change)?
        .parse()
        .map_err(|_| invalid(change, "link-layer address"))
}

fn network(ip: IpAddr, plen: u8) -> Result<IpNetwork, Error> {
    IpNetwork::new(ip, plen)
        .map_err(|error| Error::InvalidArgument(error.to_string()))
}
