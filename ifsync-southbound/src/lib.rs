//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Kernel resource access layer.
//!
//! All calls are synchronous and distinguish a missing object
//! ([`KernelError::NotFound`]) from any other failure.

pub mod debug;
pub mod error;
#[cfg(feature = "testing")]
pub mod memory;
pub mod netlink;
pub mod snapshot;

use std::net::IpAddr;

use ifsync_utils::ip::AddressFamily;
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ipnetwork::IpNetwork;

pub use crate::error::KernelError;
use crate::snapshot::{
    AddressSnapshot, LinkChange, LinkSnapshot, NeighborSnapshot, Nexthop,
    RouteSnapshot,
};

// Kernel session: one communication channel plus whatever state it keeps,
// released when dropped.
pub trait Kernel: Send {
    // Enumerates all links.
    fn links(&mut self) -> Result<Vec<LinkSnapshot>, KernelError>;

    // Fetches a single link by index.
    fn link(&mut self, ifindex: u32) -> Result<LinkSnapshot, KernelError>;

    // Fetches a single link by name.
    fn link_by_name(&mut self, name: &str)
    -> Result<LinkSnapshot, KernelError>;

    // Creates a link and returns its index.
    fn link_add(
        &mut self,
        name: &str,
        kind: LinkKind,
    ) -> Result<u32, KernelError>;

    fn link_set(
        &mut self,
        ifindex: u32,
        change: LinkChange,
    ) -> Result<(), KernelError>;

    fn link_del(&mut self, ifindex: u32) -> Result<(), KernelError>;

    // Enumerates addresses, optionally restricted to one link.
    fn addresses(
        &mut self,
        ifindex: Option<u32>,
    ) -> Result<Vec<AddressSnapshot>, KernelError>;

    fn address_add(
        &mut self,
        ifindex: u32,
        addr: IpNetwork,
    ) -> Result<(), KernelError>;

    fn address_del(
        &mut self,
        ifindex: u32,
        addr: IpNetwork,
    ) -> Result<(), KernelError>;

    // Enumerates neighbors, optionally restricted to one link.
    fn neighbors(
        &mut self,
        ifindex: Option<u32>,
    ) -> Result<Vec<NeighborSnapshot>, KernelError>;

    // Installs a permanent neighbor, replacing any existing entry.
    fn neighbor_add(
        &mut self,
        ifindex: u32,
        ip: IpAddr,
        lladdr: MacAddr,
    ) -> Result<(), KernelError>;

    fn neighbor_del(
        &mut self,
        ifindex: u32,
        ip: IpAddr,
    ) -> Result<(), KernelError>;

    // Enumerates the unicast routes of an address family, from all tables.
    fn routes(
        &mut self,
        af: AddressFamily,
    ) -> Result<Vec<RouteSnapshot>, KernelError>;

    // Installs a static route in the main table, replacing any route to the
    // same prefix.
    fn route_add(
        &mut self,
        prefix: IpNetwork,
        nexthop: Nexthop,
    ) -> Result<(), KernelError>;

    // Removes the route to the given prefix from the main table.
    fn route_del(&mut self, prefix: IpNetwork) -> Result<(), KernelError>;
}

// Factory of kernel sessions.
pub trait Southbound {
    fn open(&self) -> Result<Box<dyn Kernel>, KernelError>;
}
