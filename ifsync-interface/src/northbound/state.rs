//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use ifsync_northbound::error::Error;
use ifsync_northbound::state::Provider;
use ifsync_southbound::snapshot::LinkSnapshot;
use ifsync_southbound::{Kernel, KernelError};

use crate::Master;
use crate::debug::Debug;
use crate::interface::Interface;
use crate::resolver::resolution_error;

// ===== impl Master =====

impl Provider for Master {
    type Snapshot = Interface;

    fn list(&mut self, name: Option<&str>) -> Result<Vec<Interface>, Error> {
        let mut kernel = self
            .southbound
            .open()
            .map_err(|error| Error::SessionInit(error.reason()))?;

        let links = kernel.links().map_err(resolution_error)?;
        let names = links
            .iter()
            .map(|link| (link.ifindex, link.name.clone()))
            .collect::<BTreeMap<_, _>>();

        let mut interfaces = vec![];
        for link in links
            .iter()
            .filter(|link| name.is_none_or(|name| link.name == name))
        {
            match interface(kernel.as_mut(), link, &names) {
                Ok(interface) => interfaces.push(interface),
                Err(KernelError::NotFound) => {
                    Debug::LinkVanished(&link.name).log();
                }
                Err(error) => return Err(resolution_error(error)),
            }
        }

        Ok(interfaces)
    }
}

// ===== helper functions =====

// Fetches the current state of a dumped link, along with its addresses and
// neighbors.
fn interface(
    kernel: &mut dyn Kernel,
    link: &LinkSnapshot,
    names: &BTreeMap<u32, String>,
) -> Result<Interface, KernelError> {
    let link = kernel.link(link.ifindex)?;
    let addresses = kernel.addresses(Some(link.ifindex))?;
    let neighbors = kernel.neighbors(Some(link.ifindex))?;
    Ok(Interface::from_kernel(&link, &addresses, &neighbors, names))
}
