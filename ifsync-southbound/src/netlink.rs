//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::single_match)]

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use capctl::caps::CapState;
use futures::TryStreamExt;
use ifsync_utils::IFNAMSIZ_MAX;
use ifsync_utils::ip::AddressFamily;
use ifsync_utils::mac_addr::MacAddr;
use ifsync_utils::southbound::LinkKind;
use ipnetwork::IpNetwork;
use netlink_packet_route::AddressFamily as NlAddressFamily;
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use netlink_packet_route::link::{
    InfoKind, LinkAttribute, LinkFlags as NlLinkFlags, LinkInfo, LinkMessage,
};
use netlink_packet_route::neighbour::{
    NeighbourAddress, NeighbourAttribute, NeighbourMessage, NeighbourState,
};
use netlink_packet_route::route::{
    RouteAddress, RouteAttribute, RouteMessage,
    RouteProtocol as NlRouteProtocol, RouteType,
};
use rtnetlink::{
    Handle, LinkBridge, LinkDummy, LinkUnspec, LinkVeth, RouteMessageBuilder,
    new_connection,
};
use tokio::runtime::Runtime;
use tracing::error;

use crate::debug::Debug;
use crate::error::KernelError;
use crate::snapshot::{
    AddressSnapshot, KernelRequest, LinkChange, LinkFlags, LinkSnapshot,
    LinkStats, NeighborSnapshot, Nexthop, RT_TABLE_MAIN, RouteProtocol,
    RouteSnapshot,
};
use crate::{Kernel, Southbound};

// Suffix appended to a veth name to build the name of its peer.
const VETH_PEER_SUFFIX: &str = "-peer";

// Southbound backed by rtnetlink.
#[derive(Debug)]
pub struct NetlinkSouthbound(());

// Kernel session backed by one rtnetlink connection.
//
// The connection is driven by a single-threaded runtime owned by the
// session, so every request blocks until the kernel replies.
pub struct NetlinkKernel {
    handle: Handle,
    runtime: Runtime,
}

// ===== impl NetlinkSouthbound =====

impl NetlinkSouthbound {
    pub fn init() -> NetlinkSouthbound {
        // Raise capabilities.
        match CapState::get_current() {
            Ok(mut caps) => {
                caps.effective = caps.permitted;
                if let Err(error) = caps.set_current() {
                    error!(%error, "failed to update current capabilities");
                }
            }
            Err(error) => {
                error!(%error, "failed to get current capabilities");
            }
        }

        NetlinkSouthbound(())
    }
}

impl Southbound for NetlinkSouthbound {
    fn open(&self) -> Result<Box<dyn Kernel>, KernelError> {
        let kernel = NetlinkKernel::new()?;
        Ok(Box::new(kernel))
    }
}

// ===== impl NetlinkKernel =====

impl NetlinkKernel {
    pub fn new() -> Result<NetlinkKernel, KernelError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(|error| KernelError::Connection(error.to_string()))?;

        // Create netlink socket.
        let (conn, handle, _) = {
            let _guard = runtime.enter();
            new_connection()
                .map_err(|error| KernelError::Connection(error.to_string()))?
        };
        runtime.spawn(conn);

        Debug::SessionOpen.log();
        Ok(NetlinkKernel { handle, runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn link_msgs(
        &self,
        ifindex: Option<u32>,
        name: Option<&str>,
    ) -> Result<Vec<LinkMessage>, KernelError> {
        let mut request = self.handle.link().get();
        if let Some(ifindex) = ifindex {
            request = request.match_index(ifindex);
        }
        if let Some(name) = name {
            request = request.match_name(name.to_owned());
        }
        let msgs = self.block_on(request.execute().try_collect::<Vec<_>>())?;
        Ok(msgs)
    }

    fn address_msgs(
        &self,
        ifindex: Option<u32>,
    ) -> Result<Vec<AddressMessage>, KernelError> {
        let mut request = self.handle.address().get();
        if let Some(ifindex) = ifindex {
            request = request.set_link_index_filter(ifindex);
        }
        let msgs = self.block_on(request.execute().try_collect::<Vec<_>>())?;
        Ok(msgs)
    }

    fn neighbor_msgs(
        &self,
        ifindex: Option<u32>,
    ) -> Result<Vec<NeighbourMessage>, KernelError> {
        let request = self.handle.neighbours().get();
        let msgs = self.block_on(request.execute().try_collect::<Vec<_>>())?;
        Ok(msgs
            .into_iter()
            .filter(|msg| {
                ifindex.is_none_or(|ifindex| msg.header.ifindex == ifindex)
            })
            .collect())
    }

    fn route_msgs(
        &self,
        af: AddressFamily,
    ) -> Result<Vec<RouteMessage>, KernelError> {
        let msg = match af {
            AddressFamily::Ipv4 => {
                RouteMessageBuilder::<Ipv4Addr>::new().build()
            }
            AddressFamily::Ipv6 => {
                RouteMessageBuilder::<Ipv6Addr>::new().build()
            }
        };
        let request = self.handle.route().get(msg);
        let msgs = self.block_on(request.execute().try_collect::<Vec<_>>())?;
        Ok(msgs)
    }

    fn single_link(
        &self,
        msgs: Vec<LinkMessage>,
    ) -> Result<LinkSnapshot, KernelError> {
        msgs.into_iter()
            .find_map(parse_link)
            .ok_or(KernelError::NotFound)
    }
}

impl Kernel for NetlinkKernel {
    fn links(&mut self) -> Result<Vec<LinkSnapshot>, KernelError> {
        let msgs = self.link_msgs(None, None)?;
        Ok(msgs.into_iter().filter_map(parse_link).collect())
    }

    fn link(&mut self, ifindex: u32) -> Result<LinkSnapshot, KernelError> {
        let msgs = self.link_msgs(Some(ifindex), None)?;
        self.single_link(msgs)
    }

    fn link_by_name(
        &mut self,
        name: &str,
    ) -> Result<LinkSnapshot, KernelError> {
        let msgs = self.link_msgs(None, Some(name))?;
        self.single_link(msgs)
    }

    fn link_add(
        &mut self,
        name: &str,
        kind: LinkKind,
    ) -> Result<u32, KernelError> {
        Debug::RequestTx(&KernelRequest::LinkAdd {
            name: name.to_owned(),
            kind,
        })
        .log();

        let msg = match kind {
            LinkKind::Dummy => LinkDummy::new(name).build(),
            LinkKind::Bridge => LinkBridge::new(name).build(),
            LinkKind::Veth => {
                LinkVeth::new(name, &veth_peer_name(name)).build()
            }
            LinkKind::Loopback | LinkKind::Vlan => {
                return Err(KernelError::Operation(format!(
                    "{kind} links can't be created without a lower device"
                )));
            }
        };
        self.block_on(self.handle.link().add(msg).execute())?;

        // Fetch the index assigned by the kernel.
        let link = self.link_by_name(name)?;
        Ok(link.ifindex)
    }

    fn link_set(
        &mut self,
        ifindex: u32,
        change: LinkChange,
    ) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::LinkSet {
            ifindex,
            change: change.clone(),
        })
        .log();

        let builder = LinkUnspec::new_with_index(ifindex);
        let msg = match change {
            LinkChange::AdminStatus(true) => builder.up().build(),
            LinkChange::AdminStatus(false) => builder.down().build(),
            LinkChange::Mtu(mtu) => builder.mtu(mtu).build(),
            LinkChange::Address(addr) => {
                builder.address(addr.as_bytes().to_vec()).build()
            }
            LinkChange::Controller(Some(controller)) => {
                builder.controller(controller).build()
            }
            LinkChange::Controller(None) => builder.nocontroller().build(),
            LinkChange::Alias(alias) => {
                let mut msg = builder.build();
                msg.attributes.push(LinkAttribute::IfAlias(alias));
                msg
            }
        };
        self.block_on(self.handle.link().set(msg).execute())?;
        Ok(())
    }

    fn link_del(&mut self, ifindex: u32) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::LinkDel { ifindex }).log();

        self.block_on(self.handle.link().del(ifindex).execute())?;
        Ok(())
    }

    fn addresses(
        &mut self,
        ifindex: Option<u32>,
    ) -> Result<Vec<AddressSnapshot>, KernelError> {
        let msgs = self.address_msgs(ifindex)?;
        Ok(msgs.into_iter().filter_map(parse_address).collect())
    }

    fn address_add(
        &mut self,
        ifindex: u32,
        addr: IpNetwork,
    ) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::AddressAdd { ifindex, addr }).log();

        let request =
            self.handle.address().add(ifindex, addr.ip(), addr.prefix());
        self.block_on(request.execute())?;
        Ok(())
    }

    fn address_del(
        &mut self,
        ifindex: u32,
        addr: IpNetwork,
    ) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::AddressDel { ifindex, addr }).log();

        let msg = self
            .address_msgs(Some(ifindex))?
            .into_iter()
            .find(|msg| {
                parse_address(msg.clone())
                    .is_some_and(|address| address.addr == addr)
            })
            .ok_or(KernelError::NotFound)?;
        self.block_on(self.handle.address().del(msg).execute())?;
        Ok(())
    }

    fn neighbors(
        &mut self,
        ifindex: Option<u32>,
    ) -> Result<Vec<NeighborSnapshot>, KernelError> {
        let msgs = self.neighbor_msgs(ifindex)?;
        Ok(msgs.into_iter().filter_map(parse_neighbor).collect())
    }

    fn neighbor_add(
        &mut self,
        ifindex: u32,
        ip: IpAddr,
        lladdr: MacAddr,
    ) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::NeighborAdd { ifindex, ip, lladdr })
            .log();

        let request = self
            .handle
            .neighbours()
            .add(ifindex, ip)
            .link_local_address(&lladdr.as_bytes())
            .state(NeighbourState::Permanent)
            .replace();
        self.block_on(request.execute())?;
        Ok(())
    }

    fn neighbor_del(
        &mut self,
        ifindex: u32,
        ip: IpAddr,
    ) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::NeighborDel { ifindex, ip }).log();

        let msg = self
            .neighbor_msgs(Some(ifindex))?
            .into_iter()
            .find(|msg| {
                parse_neighbor(msg.clone())
                    .is_some_and(|neighbor| neighbor.ip == ip)
            })
            .ok_or(KernelError::NotFound)?;
        self.block_on(self.handle.neighbours().del(msg).execute())?;
        Ok(())
    }

    fn routes(
        &mut self,
        af: AddressFamily,
    ) -> Result<Vec<RouteSnapshot>, KernelError> {
        let msgs = self.route_msgs(af)?;
        Ok(msgs.into_iter().filter_map(parse_route).collect())
    }

    fn route_add(
        &mut self,
        prefix: IpNetwork,
        nexthop: Nexthop,
    ) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::RouteAdd { prefix, nexthop }).log();

        let msg = route_message(prefix, Some(nexthop))?;
        let request = self.handle.route().add(msg).replace();
        self.block_on(request.execute())?;
        Ok(())
    }

    fn route_del(&mut self, prefix: IpNetwork) -> Result<(), KernelError> {
        Debug::RequestTx(&KernelRequest::RouteDel { prefix }).log();

        let msg = route_message(prefix, None)?;
        self.block_on(self.handle.route().del(msg).execute())?;
        Ok(())
    }
}

impl Drop for NetlinkKernel {
    fn drop(&mut self) {
        Debug::SessionClose.log();
    }
}

// ===== helper functions =====

fn parse_link(msg: LinkMessage) -> Option<LinkSnapshot> {
    let mut flags = LinkFlags::empty();
    if msg.header.flags.contains(NlLinkFlags::Up) {
        flags.insert(LinkFlags::ADMIN_UP);
    }
    if msg.header.flags.contains(NlLinkFlags::Running) {
        flags.insert(LinkFlags::OPERATIVE);
    }
    if msg.header.flags.contains(NlLinkFlags::Loopback) {
        flags.insert(LinkFlags::LOOPBACK);
    }

    let mut name = None;
    let mut kind = None;
    let mut mtu = 0;
    let mut address = None;
    let mut alias = None;
    let mut controller = None;
    let mut stats = LinkStats::default();
    for attr in msg.attributes.into_iter() {
        match attr {
            LinkAttribute::IfName(attr) => name = Some(attr),
            LinkAttribute::Mtu(attr) => mtu = attr,
            LinkAttribute::Address(attr) => {
                address = MacAddr::from_slice(&attr)
            }
            LinkAttribute::IfAlias(attr) if !attr.is_empty() => {
                alias = Some(attr)
            }
            LinkAttribute::Controller(attr) => controller = Some(attr),
            LinkAttribute::LinkInfo(infos) => {
                for info in infos {
                    if let LinkInfo::Kind(info_kind) = info {
                        kind = parse_kind(&info_kind);
                    }
                }
            }
            LinkAttribute::Stats64(attr) => {
                stats = LinkStats {
                    in_octets: attr.rx_bytes,
                    in_pkts: attr.rx_packets,
                    in_errors: attr.rx_errors,
                    in_discards: attr.rx_dropped,
                    out_octets: attr.tx_bytes,
                    out_pkts: attr.tx_packets,
                    out_errors: attr.tx_errors,
                    out_discards: attr.tx_dropped,
                }
            }
            _ => (),
        }
    }

    Some(LinkSnapshot {
        ifindex: msg.header.index,
        name: name?,
        kind,
        flags,
        mtu,
        address,
        alias,
        controller,
        stats,
    })
}

fn parse_kind(kind: &InfoKind) -> Option<LinkKind> {
    match kind {
        InfoKind::Veth => Some(LinkKind::Veth),
        InfoKind::Vlan => Some(LinkKind::Vlan),
        InfoKind::Dummy => Some(LinkKind::Dummy),
        InfoKind::Bridge => Some(LinkKind::Bridge),
        _ => None,
    }
}

fn parse_address(msg: AddressMessage) -> Option<AddressSnapshot> {
    let mut local = None;
    let mut address = None;
    for attr in msg.attributes.into_iter() {
        match attr {
            AddressAttribute::Local(attr) => local = Some(attr),
            AddressAttribute::Address(attr) => address = Some(attr),
            _ => (),
        }
    }

    // On point-to-point links IFA_ADDRESS holds the peer address.
    let addr = local.or(address)?;
    let addr = IpNetwork::new(addr, msg.header.prefix_len).ok()?;
    Some(AddressSnapshot::new(msg.header.index, addr))
}

fn parse_neighbor(msg: NeighbourMessage) -> Option<NeighborSnapshot> {
    let mut ip = None;
    let mut lladdr = None;
    for attr in msg.attributes.into_iter() {
        match attr {
            NeighbourAttribute::Destination(NeighbourAddress::Inet(attr)) => {
                ip = Some(IpAddr::from(attr))
            }
            NeighbourAttribute::Destination(NeighbourAddress::Inet6(attr)) => {
                ip = Some(IpAddr::from(attr))
            }
            NeighbourAttribute::LinkLocalAddress(attr) => {
                lladdr = MacAddr::from_slice(&attr)
            }
            _ => (),
        }
    }

    let permanent = msg.header.state == NeighbourState::Permanent;
    Some(NeighborSnapshot::new(msg.header.ifindex, ip?, lladdr, permanent))
}

fn parse_route(msg: RouteMessage) -> Option<RouteSnapshot> {
    if msg.header.kind != RouteType::Unicast {
        return None;
    }

    let mut destination = None;
    let mut nexthop = Nexthop::default();
    let mut table = u32::from(msg.header.table);
    let mut metric = 0;
    for attr in msg.attributes.into_iter() {
        match attr {
            RouteAttribute::Destination(attr) => {
                destination = route_address(attr)
            }
            RouteAttribute::Gateway(attr) => {
                nexthop.addr = route_address(attr)
            }
            RouteAttribute::Oif(attr) => nexthop.ifindex = Some(attr),
            RouteAttribute::Table(attr) => table = attr,
            RouteAttribute::Priority(attr) => metric = attr,
            _ => (),
        }
    }

    // Default routes carry no RTA_DST.
    let destination = match (destination, msg.header.address_family) {
        (Some(destination), _) => destination,
        (None, NlAddressFamily::Inet) => Ipv4Addr::UNSPECIFIED.into(),
        (None, NlAddressFamily::Inet6) => Ipv6Addr::UNSPECIFIED.into(),
        (None, _) => return None,
    };
    let prefix =
        IpNetwork::new(destination, msg.header.destination_prefix_length)
            .ok()?;
    let protocol = match msg.header.protocol {
        NlRouteProtocol::Kernel => RouteProtocol::Kernel,
        NlRouteProtocol::Static | NlRouteProtocol::Boot => {
            RouteProtocol::Static
        }
        protocol => RouteProtocol::Other(u8::from(protocol)),
    };

    Some(RouteSnapshot {
        prefix,
        nexthop,
        protocol,
        table,
        metric,
    })
}

fn route_address(addr: RouteAddress) -> Option<IpAddr> {
    match addr {
        RouteAddress::Inet(addr) => Some(addr.into()),
        RouteAddress::Inet6(addr) => Some(addr.into()),
        _ => None,
    }
}

// Builds a static route message for the main table.
fn route_message(
    prefix: IpNetwork,
    nexthop: Option<Nexthop>,
) -> Result<RouteMessage, KernelError> {
    let nexthop = nexthop.unwrap_or_default();
    let msg = match (prefix, nexthop.addr) {
        (IpNetwork::V4(prefix), None | Some(IpAddr::V4(_))) => {
            let mut builder = RouteMessageBuilder::<Ipv4Addr>::new()
                .destination_prefix(prefix.ip(), prefix.prefix())
                .protocol(NlRouteProtocol::Static)
                .table_id(RT_TABLE_MAIN);
            if let Some(IpAddr::V4(addr)) = nexthop.addr {
                builder = builder.gateway(addr);
            }
            if let Some(ifindex) = nexthop.ifindex {
                builder = builder.output_interface(ifindex);
            }
            builder.build()
        }
        (IpNetwork::V6(prefix), None | Some(IpAddr::V6(_))) => {
            let mut builder = RouteMessageBuilder::<Ipv6Addr>::new()
                .destination_prefix(prefix.ip(), prefix.prefix())
                .protocol(NlRouteProtocol::Static)
                .table_id(RT_TABLE_MAIN);
            if let Some(IpAddr::V6(addr)) = nexthop.addr {
                builder = builder.gateway(addr);
            }
            if let Some(ifindex) = nexthop.ifindex {
                builder = builder.output_interface(ifindex);
            }
            builder.build()
        }
        _ => {
            return Err(KernelError::Operation(format!(
                "{prefix}: next hop address family mismatch"
            )));
        }
    };
    Ok(msg)
}

// Builds the name of the peer of a veth link, within the kernel limit.
fn veth_peer_name(name: &str) -> String {
    let base = name
        .chars()
        .take(IFNAMSIZ_MAX - VETH_PEER_SUFFIX.len())
        .collect::<String>();
    format!("{base}{VETH_PEER_SUFFIX}")
}
