//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! In-memory kernel used by the test suites.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ifsync_utils::ip::{AddressFamily, IpNetworkKind};
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ipnetwork::IpNetwork;

use crate::debug::Debug;
use crate::error::KernelError;
use crate::snapshot::{
    AddressSnapshot, KernelRequest, LinkChange, LinkFlags, LinkSnapshot,
    LinkStats, NeighborSnapshot, Nexthop, RT_TABLE_MAIN, RouteProtocol,
    RouteSnapshot,
};
use crate::{Kernel, Southbound};

const DFLT_MTU: u32 = 1500;

// Shared handle to an in-memory kernel.
//
// Every session opened through it operates on the same state, which
// outlives the sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryKernel {
    state: Arc<Mutex<State>>,
}

// Session opened on a `MemoryKernel`.
#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    last_ifindex: u32,
    links: BTreeMap<u32, LinkSnapshot>,
    addresses: Vec<AddressSnapshot>,
    neighbors: Vec<NeighborSnapshot>,
    routes: Vec<RouteSnapshot>,
    calls: Vec<KernelRequest>,
    open_error: Option<String>,
    request_error: Option<String>,
    vanish_after_dump: Option<String>,
    sessions_open: usize,
    sessions_total: usize,
}

// ===== impl MemoryKernel =====

impl MemoryKernel {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Adds a pre-existing link, without recording a call. Links without a
    // kind stand for physical devices.
    pub fn link_insert(&self, name: &str, kind: Option<LinkKind>) -> u32 {
        let mut state = self.state();
        state.link_insert(name, kind)
    }

    // Adds a pre-existing address, without recording a call.
    pub fn address_insert(&self, ifindex: u32, addr: IpNetwork) {
        let mut state = self.state();
        state.addresses.push(AddressSnapshot::new(ifindex, addr));
    }

    // Adds a pre-existing neighbor, without recording a call.
    pub fn neighbor_insert(&self, neighbor: NeighborSnapshot) {
        let mut state = self.state();
        state.neighbors.push(neighbor);
    }

    // Adds a pre-existing route, without recording a call.
    pub fn route_insert(&self, route: RouteSnapshot) {
        let mut state = self.state();
        state.routes.push(route);
    }

    // Returns the kernel-affecting calls made so far, in order.
    pub fn calls(&self) -> Vec<KernelRequest> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    // Makes subsequent session opens fail with the given reason.
    pub fn fail_open(&self, reason: Option<&str>) {
        self.state().open_error = reason.map(str::to_owned);
    }

    // Makes subsequent kernel-affecting requests fail with the given reason.
    // The requests are still recorded.
    pub fn fail_requests(&self, reason: Option<&str>) {
        self.state().request_error = reason.map(str::to_owned);
    }

    // Removes the named link right after the next link dump.
    pub fn vanish_after_dump(&self, name: &str) {
        self.state().vanish_after_dump = Some(name.to_owned());
    }

    pub fn link_get(&self, name: &str) -> Option<LinkSnapshot> {
        self.state().link_by_name(name).cloned()
    }

    pub fn addresses_get(&self, ifindex: u32) -> Vec<IpNetwork> {
        self.state()
            .addresses
            .iter()
            .filter(|address| address.ifindex == ifindex)
            .map(|address| address.addr)
            .collect()
    }

    pub fn neighbors_get(&self, ifindex: u32) -> Vec<NeighborSnapshot> {
        self.state()
            .neighbors
            .iter()
            .filter(|neighbor| neighbor.ifindex == ifindex)
            .copied()
            .collect()
    }

    pub fn routes_get(&self) -> Vec<RouteSnapshot> {
        self.state().routes.clone()
    }

    // Number of sessions currently open.
    pub fn sessions_open(&self) -> usize {
        self.state().sessions_open
    }

    // Number of sessions opened since creation.
    pub fn sessions_total(&self) -> usize {
        self.state().sessions_total
    }
}

impl Southbound for MemoryKernel {
    fn open(&self) -> Result<Box<dyn Kernel>, KernelError> {
        let mut state = self.state();
        if let Some(reason) = &state.open_error {
            return Err(KernelError::Connection(reason.clone()));
        }
        state.sessions_open += 1;
        state.sessions_total += 1;

        Debug::SessionOpen.log();
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
        }))
    }
}

// ===== impl MemorySession =====

impl MemorySession {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Records and logs a kernel-affecting request.
    fn request(
        &self,
        request: KernelRequest,
    ) -> Result<MutexGuard<'_, State>, KernelError> {
        Debug::RequestTx(&request).log();
        let mut state = self.state();
        state.calls.push(request);
        if let Some(reason) = &state.request_error {
            return Err(KernelError::Operation(reason.clone()));
        }
        Ok(state)
    }
}

impl Kernel for MemorySession {
    fn links(&mut self) -> Result<Vec<LinkSnapshot>, KernelError> {
        let mut state = self.state();
        let links = state.links.values().cloned().collect();
        if let Some(name) = state.vanish_after_dump.take()
            && let Some(ifindex) =
                state.link_by_name(&name).map(|link| link.ifindex)
        {
            state.link_remove(ifindex);
        }
        Ok(links)
    }

    fn link(&mut self, ifindex: u32) -> Result<LinkSnapshot, KernelError> {
        self.state()
            .links
            .get(&ifindex)
            .cloned()
            .ok_or(KernelError::NotFound)
    }

    fn link_by_name(
        &mut self,
        name: &str,
    ) -> Result<LinkSnapshot, KernelError> {
        self.state()
            .link_by_name(name)
            .cloned()
            .ok_or(KernelError::NotFound)
    }

    fn link_add(
        &mut self,
        name: &str,
        kind: LinkKind,
    ) -> Result<u32, KernelError> {
        let mut state = self.request(KernelRequest::LinkAdd {
            name: name.to_owned(),
            kind,
        })?;
        if state.link_by_name(name).is_some() {
            return Err(KernelError::Operation("File exists".to_owned()));
        }
        Ok(state.link_insert(name, Some(kind)))
    }

    fn link_set(
        &mut self,
        ifindex: u32,
        change: LinkChange,
    ) -> Result<(), KernelError> {
        let mut state = self.request(KernelRequest::LinkSet {
            ifindex,
            change: change.clone(),
        })?;
        if let LinkChange::Controller(Some(controller)) = change
            && !state.links.contains_key(&controller)
        {
            return Err(KernelError::NotFound);
        }
        let link =
            state.links.get_mut(&ifindex).ok_or(KernelError::NotFound)?;
        match change {
            LinkChange::AdminStatus(true) => {
                link.flags.insert(LinkFlags::ADMIN_UP | LinkFlags::OPERATIVE)
            }
            LinkChange::AdminStatus(false) => {
                link.flags.remove(LinkFlags::ADMIN_UP | LinkFlags::OPERATIVE)
            }
            LinkChange::Mtu(mtu) => link.mtu = mtu,
            LinkChange::Alias(alias) => {
                link.alias = Some(alias).filter(|alias| !alias.is_empty())
            }
            LinkChange::Address(addr) => link.address = Some(addr),
            LinkChange::Controller(controller) => link.controller = controller,
        }
        Ok(())
    }

    fn link_del(&mut self, ifindex: u32) -> Result<(), KernelError> {
        let mut state = self.request(KernelRequest::LinkDel { ifindex })?;
        if !state.links.contains_key(&ifindex) {
            return Err(KernelError::NotFound);
        }
        state.link_remove(ifindex);
        Ok(())
    }

    fn addresses(
        &mut self,
        ifindex: Option<u32>,
    ) -> Result<Vec<AddressSnapshot>, KernelError> {
        let state = self.state();
        if let Some(ifindex) = ifindex
            && !state.links.contains_key(&ifindex)
        {
            return Err(KernelError::NotFound);
        }
        Ok(state
            .addresses
            .iter()
            .filter(|address| {
                ifindex.is_none_or(|ifindex| address.ifindex == ifindex)
            })
            .copied()
            .collect())
    }

    fn address_add(
        &mut self,
        ifindex: u32,
        addr: IpNetwork,
    ) -> Result<(), KernelError> {
        let mut state =
            self.request(KernelRequest::AddressAdd { ifindex, addr })?;
        if !state.links.contains_key(&ifindex) {
            return Err(KernelError::NotFound);
        }
        if state.addresses.iter().any(|address| {
            address.ifindex == ifindex && address.addr.ip() == addr.ip()
        }) {
            return Err(KernelError::Operation("File exists".to_owned()));
        }
        state.addresses.push(AddressSnapshot::new(ifindex, addr));
        Ok(())
    }

    fn address_del(
        &mut self,
        ifindex: u32,
        addr: IpNetwork,
    ) -> Result<(), KernelError> {
        let mut state =
            self.request(KernelRequest::AddressDel { ifindex, addr })?;
        let pos = state
            .addresses
            .iter()
            .position(|address| {
                address.ifindex == ifindex && address.addr == addr
            })
            .ok_or(KernelError::NotFound)?;
        state.addresses.remove(pos);
        Ok(())
    }

    fn neighbors(
        &mut self,
        ifindex: Option<u32>,
    ) -> Result<Vec<NeighborSnapshot>, KernelError> {
        let state = self.state();
        if let Some(ifindex) = ifindex
            && !state.links.contains_key(&ifindex)
        {
            return Err(KernelError::NotFound);
        }
        Ok(state
            .neighbors
            .iter()
            .filter(|neighbor| {
                ifindex.is_none_or(|ifindex| neighbor.ifindex == ifindex)
            })
            .copied()
            .collect())
    }

    fn neighbor_add(
        &mut self,
        ifindex: u32,
        ip: IpAddr,
        lladdr: MacAddr,
    ) -> Result<(), KernelError> {
        let mut state =
            self.request(KernelRequest::NeighborAdd { ifindex, ip, lladdr })?;
        if !state.links.contains_key(&ifindex) {
            return Err(KernelError::NotFound);
        }
        state.neighbors.retain(|neighbor| {
            !(neighbor.ifindex == ifindex && neighbor.ip == ip)
        });
        state
            .neighbors
            .push(NeighborSnapshot::new(ifindex, ip, Some(lladdr), true));
        Ok(())
    }

    fn neighbor_del(
        &mut self,
        ifindex: u32,
        ip: IpAddr,
    ) -> Result<(), KernelError> {
        let mut state =
            self.request(KernelRequest::NeighborDel { ifindex, ip })?;
        let pos = state
            .neighbors
            .iter()
            .position(|neighbor| {
                neighbor.ifindex == ifindex && neighbor.ip == ip
            })
            .ok_or(KernelError::NotFound)?;
        state.neighbors.remove(pos);
        Ok(())
    }

    fn routes(
        &mut self,
        af: AddressFamily,
    ) -> Result<Vec<RouteSnapshot>, KernelError> {
        Ok(self
            .state()
            .routes
            .iter()
            .filter(|route| route.prefix.address_family() == af)
            .copied()
            .collect())
    }

    fn route_add(
        &mut self,
        prefix: IpNetwork,
        nexthop: Nexthop,
    ) -> Result<(), KernelError> {
        let mut state =
            self.request(KernelRequest::RouteAdd { prefix, nexthop })?;
        if let Some(ifindex) = nexthop.ifindex
            && !state.links.contains_key(&ifindex)
        {
            return Err(KernelError::NotFound);
        }
        if nexthop.addr.is_none() && nexthop.ifindex.is_none() {
            return Err(KernelError::Operation(
                "Invalid argument".to_owned(),
            ));
        }
        state.routes.retain(|route| {
            !(route.table == RT_TABLE_MAIN && route.prefix == prefix)
        });
        state.routes.push(RouteSnapshot {
            prefix,
            nexthop,
            protocol: RouteProtocol::Static,
            table: RT_TABLE_MAIN,
            metric: 0,
        });
        Ok(())
    }

    fn route_del(&mut self, prefix: IpNetwork) -> Result<(), KernelError> {
        let mut state = self.request(KernelRequest::RouteDel { prefix })?;
        let pos = state
            .routes
            .iter()
            .position(|route| {
                route.table == RT_TABLE_MAIN && route.prefix == prefix
            })
            .ok_or(KernelError::NotFound)?;
        state.routes.remove(pos);
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let mut state = self.state();
        state.sessions_open = state.sessions_open.saturating_sub(1);
        Debug::SessionClose.log();
    }
}

// ===== impl State =====

impl State {
    fn link_by_name(&self, name: &str) -> Option<&LinkSnapshot> {
        self.links.values().find(|link| link.name == name)
    }

    fn link_insert(&mut self, name: &str, kind: Option<LinkKind>) -> u32 {
        self.last_ifindex += 1;
        let ifindex = self.last_ifindex;
        let mut flags = LinkFlags::empty();
        if kind == Some(LinkKind::Loopback) {
            flags.insert(LinkFlags::LOOPBACK);
        }
        let address = MacAddr::from([0x02, 0, 0, 0, 0, ifindex as u8]);
        self.links.insert(
            ifindex,
            LinkSnapshot {
                ifindex,
                name: name.to_owned(),
                kind: kind.filter(|kind| *kind != LinkKind::Loopback),
                flags,
                mtu: DFLT_MTU,
                address: Some(address),
                alias: None,
                controller: None,
                stats: LinkStats::default(),
            },
        );
        ifindex
    }

    fn link_remove(&mut self, ifindex: u32) {
        self.links.remove(&ifindex);
        self.addresses.retain(|address| address.ifindex != ifindex);
        self.neighbors.retain(|neighbor| neighbor.ifindex != ifindex);
        self.routes
            .retain(|route| route.nexthop.ifindex != Some(ifindex));
        for link in self.links.values_mut() {
            if link.controller == Some(ifindex) {
                link.controller = None;
            }
        }
    }
}
