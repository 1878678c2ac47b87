//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Kernel object lookups shared by the field handlers.

use std::collections::BTreeMap;
use std::net::IpAddr;

use ifsync_northbound::error::Error;
use ifsync_southbound::snapshot::{LinkChange, LinkSnapshot, NeighborSnapshot};
use ifsync_southbound::{Kernel, KernelError};
use ifsync_utils::ip::{AddressFamily, IpAddrExt, IpNetworkKind};
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ipnetwork::IpNetwork;

// Kernel session of one interface instance.
//
// Link indexes are cached by name for the lifetime of the session.
pub struct Session {
    kernel: Box<dyn Kernel>,
    ifindexes: BTreeMap<String, u32>,
}

// ===== impl Session =====

impl Session {
    pub(crate) fn new(kernel: Box<dyn Kernel>) -> Session {
        Session {
            kernel,
            ifindexes: Default::default(),
        }
    }

    // Looks up a link by name.
    pub(crate) fn link(
        &mut self,
        name: &str,
    ) -> Result<Option<LinkSnapshot>, Error> {
        if let Some(ifindex) = self.ifindexes.get(name).copied() {
            match self.kernel.link(ifindex) {
                Ok(link) if link.name == name => return Ok(Some(link)),
                Ok(_) | Err(KernelError::NotFound) => {
                    self.ifindexes.remove(name);
                }
                Err(error) => return Err(resolution_error(error)),
            }
        }

        match self.kernel.link_by_name(name) {
            Ok(link) => {
                self.ifindexes.insert(name.to_owned(), link.ifindex);
                Ok(Some(link))
            }
            Err(KernelError::NotFound) => Ok(None),
            Err(error) => Err(resolution_error(error)),
        }
    }

    pub(crate) fn link_add(
        &mut self,
        name: &str,
        kind: LinkKind,
    ) -> Result<u32, Error> {
        let ifindex =
            self.kernel.link_add(name, kind).map_err(kernel_error)?;
        self.ifindexes.insert(name.to_owned(), ifindex);
        Ok(ifindex)
    }

    pub(crate) fn link_set(
        &mut self,
        link: &LinkSnapshot,
        change: LinkChange,
    ) -> Result<(), Error> {
        self.kernel
            .link_set(link.ifindex, change)
            .map_err(kernel_error)
    }

    pub(crate) fn link_del(&mut self, link: &LinkSnapshot) -> Result<(), Error> {
        self.ifindexes.remove(&link.name);
        self.kernel.link_del(link.ifindex).map_err(kernel_error)
    }

    // Returns the addresses of the given family assigned to a link.
    pub(crate) fn addresses(
        &mut self,
        link: &LinkSnapshot,
        af: AddressFamily,
    ) -> Result<Vec<IpNetwork>, Error> {
        let addresses = match self.kernel.addresses(Some(link.ifindex)) {
            Ok(addresses) => addresses,
            Err(KernelError::NotFound) => return Ok(vec![]),
            Err(error) => return Err(resolution_error(error)),
        };
        Ok(addresses
            .into_iter()
            .map(|address| address.addr)
            .filter(|addr| addr.address_family() == af)
            .collect())
    }

    // Looks up the address with the given IP on a link.
    pub(crate) fn address(
        &mut self,
        link: &LinkSnapshot,
        ip: IpAddr,
    ) -> Result<Option<IpNetwork>, Error> {
        Ok(self
            .addresses(link, ip.address_family())?
            .into_iter()
            .find(|addr| addr.ip() == ip))
    }

    pub(crate) fn address_add(
        &mut self,
        link: &LinkSnapshot,
        addr: IpNetwork,
    ) -> Result<(), Error> {
        self.kernel
            .address_add(link.ifindex, addr)
            .map_err(kernel_error)
    }

    pub(crate) fn address_del(
        &mut self,
        link: &LinkSnapshot,
        addr: IpNetwork,
    ) -> Result<(), Error> {
        self.kernel
            .address_del(link.ifindex, addr)
            .map_err(kernel_error)
    }

    // Looks up the statically configured neighbor with the given IP on a
    // link. Dynamic entries are ignored.
    pub(crate) fn neighbor(
        &mut self,
        link: &LinkSnapshot,
        ip: IpAddr,
    ) -> Result<Option<NeighborSnapshot>, Error> {
        let neighbors = match self.kernel.neighbors(Some(link.ifindex)) {
            Ok(neighbors) => neighbors,
            Err(KernelError::NotFound) => return Ok(None),
            Err(error) => return Err(resolution_error(error)),
        };
        Ok(neighbors
            .into_iter()
            .find(|neighbor| neighbor.ip == ip && neighbor.permanent))
    }

    pub(crate) fn neighbor_add(
        &mut self,
        link: &LinkSnapshot,
        ip: IpAddr,
        lladdr: MacAddr,
    ) -> Result<(), Error> {
        self.kernel
            .neighbor_add(link.ifindex, ip, lladdr)
            .map_err(kernel_error)
    }

    pub(crate) fn neighbor_del(
        &mut self,
        link: &LinkSnapshot,
        ip: IpAddr,
    ) -> Result<(), Error> {
        self.kernel
            .neighbor_del(link.ifindex, ip)
            .map_err(kernel_error)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ifindexes", &self.ifindexes)
            .finish()
    }
}

// ===== global functions =====

pub(crate) fn resolution_error(error: KernelError) -> Error {
    error.log();
    Error::Resolution(error.reason())
}

pub(crate) fn kernel_error(error: KernelError) -> Error {
    error.log();
    Error::KernelCall(error.reason())
}
