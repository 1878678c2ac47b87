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
use ifsync_southbound::snapshot::{LinkChange, LinkSnapshot};
use ifsync_southbound::{Kernel, KernelError};
use ifsync_utils::IFNAMSIZ_MAX;
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ifsync_utils::xpath;

use crate::Master;
use crate::bridge;
use crate::debug::Debug;

static HANDLERS: Lazy<Handlers<Master>> = Lazy::new(load_handlers);

// Kernel session of one bridge instance.
pub struct Session {
    kernel: Box<dyn Kernel>,
}

// ===== configuration handlers =====

fn load_handlers() -> Handlers<Master> {
    HandlersBuilder::<Master>::default()
        .path("component/name")
        .kind(FieldKind::Identity)
        .validate(validate_name)
        .resolve(resolve_bridge)
        .create(bridge_create)
        .delete(bridge_delete)
        .path("component/address")
        .validate(validate_address)
        .resolve(resolve_address)
        .create(address_set)
        .modify(address_set)
        .path("component/type")
        .validate(validate_type)
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
    fn link(&mut self, name: &str) -> Result<Option<LinkSnapshot>, Error> {
        match self.kernel.link_by_name(name) {
            Ok(link) => Ok(Some(link)),
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

// ===== component name =====

fn validate_name(change: &ChangeRecord) -> Result<(), Error> {
    let name = leaf_value(change)?;
    if name.is_empty() || name.len() > IFNAMSIZ_MAX {
        return Err(Error::InvalidArgument(format!(
            "{name}: component name must have between 1 and {IFNAMSIZ_MAX} characters"
        )));
    }
    Ok(())
}

fn resolve_bridge(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let name = leaf_value(args.change)?;
    let resolution = match session.link(name)? {
        None => Resolution::Absent,
        Some(link) if link.kind == Some(LinkKind::Bridge) => {
            Resolution::Unchanged
        }
        // A link of another kind holds the name.
        Some(_) => Resolution::Differs,
    };
    Ok(resolution)
}

fn bridge_create(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let name = leaf_value(args.change)?;

    Debug::BridgeCreate(name).log();
    session
        .kernel
        .link_add(name, LinkKind::Bridge)
        .map_err(kernel_error)?;
    Ok(())
}

fn bridge_delete(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let name = leaf_value(args.change)?;
    let Some(link) = session.link(name)? else {
        return Ok(());
    };

    Debug::BridgeDelete(name).log();
    session.kernel.link_del(link.ifindex).map_err(kernel_error)
}

// ===== component address =====

fn validate_address(change: &ChangeRecord) -> Result<(), Error> {
    record_address(change).map(|_| ())
}

fn resolve_address(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<Resolution, Error> {
    let Some(link) = session.link(component_name(args.change)?)? else {
        return Ok(Resolution::ParentMissing);
    };

    // The kernel keeps the last address in use.
    if args.change.operation == ChangeOp::Deleted {
        return Ok(Resolution::Absent);
    }
    let resolution = if link.address == Some(record_address(args.change)?) {
        Resolution::Unchanged
    } else {
        Resolution::Differs
    };
    Ok(resolution)
}

fn address_set(
    session: &mut Session,
    args: &mut HandlerArgs<'_>,
) -> Result<(), Error> {
    let link = session
        .link(component_name(args.change)?)?
        .ok_or_else(|| Error::ParentNotFound(args.change.path.clone()))?;
    let address = record_address(args.change)?;
    session
        .kernel
        .link_set(link.ifindex, LinkChange::Address(address))
        .map_err(kernel_error)
}

// ===== component type =====

fn validate_type(change: &ChangeRecord) -> Result<(), Error> {
    let value = leaf_value(change)?;
    if !bridge::is_component_type(value) {
        return Err(Error::InvalidArgument(format!(
            "{value}: unsupported component type"
        )));
    }
    Ok(())
}

// ===== helper functions =====

fn leaf_value(change: &ChangeRecord) -> Result<&str, Error> {
    change
        .effective_value()
        .ok_or_else(|| Error::MissingField(change.path.clone()))
}

// Returns the name of the component a record belongs to.
fn component_name(change: &ChangeRecord) -> Result<&str, Error> {
    xpath::key_value(&change.path, "component", "name")
        .ok_or_else(|| Error::MissingField(change.path.clone()))
}

fn record_address(change: &ChangeRecord) -> Result<MacAddr, Error> {
    let value = leaf_value(change)?;
    value.parse().map_err(|_| {
        Error::InvalidArgument(format!("{value}: invalid MAC address"))
    })
}

fn resolution_error(error: KernelError) -> Error {
    error.log();
    Error::Resolution(error.reason())
}

fn kernel_error(error: KernelError) -> Error {
    error.log();
    Error::KernelCall(error.reason())
}
