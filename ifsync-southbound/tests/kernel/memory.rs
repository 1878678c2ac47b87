//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_southbound::memory::MemoryKernel;
use ifsync_southbound::snapshot::{
    KernelRequest, LinkChange, Nexthop, RT_TABLE_MAIN, RouteProtocol,
};
use ifsync_southbound::{Kernel, KernelError, Southbound};
use ifsync_utils::ip::AddressFamily;
use ifsync_utils::southbound::LinkKind;
use ipnetwork::IpNetwork;

#[test]
fn sessions_share_state() {
    let kernel = MemoryKernel::default();
    let ifindex = {
        let mut session = kernel.open().unwrap();
        session.link_add("dummy0", LinkKind::Dummy).unwrap()
    };
    assert_eq!(kernel.sessions_open(), 0);

    let mut session = kernel.open().unwrap();
    let link = session.link_by_name("dummy0").unwrap();
    assert_eq!(link.ifindex, ifindex);
    assert_eq!(link.kind, Some(LinkKind::Dummy));
    assert!(!link.admin_up());
    assert_eq!(kernel.sessions_open(), 1);
    assert_eq!(kernel.sessions_total(), 2);
}

#[test]
fn missing_objects_report_not_found() {
    let kernel = MemoryKernel::default();
    let mut session = kernel.open().unwrap();

    assert_eq!(session.link_by_name("eth9"), Err(KernelError::NotFound));
    assert_eq!(session.link_del(42), Err(KernelError::NotFound));

    let ifindex = kernel.link_insert("eth0", None);
    let addr: IpNetwork = "10.0.0.1/24".parse().unwrap();
    assert_eq!(session.address_del(ifindex, addr), Err(KernelError::NotFound));
}

#[test]
fn calls_are_logged_in_order() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let addr: IpNetwork = "10.0.0.1/24".parse().unwrap();

    let mut session = kernel.open().unwrap();
    session
        .link_set(ifindex, LinkChange::AdminStatus(true))
        .unwrap();
    session.address_add(ifindex, addr).unwrap();

    assert_eq!(
        kernel.calls(),
        vec![
            KernelRequest::LinkSet {
                ifindex,
                change: LinkChange::AdminStatus(true),
            },
            KernelRequest::AddressAdd { ifindex, addr },
        ]
    );
    assert!(kernel.link_get("eth0").unwrap().admin_up());
    assert_eq!(kernel.addresses_get(ifindex), vec![addr]);
}

#[test]
fn link_removal_cascades() {
    let kernel = MemoryKernel::default();
    let bridge = kernel.link_insert("br0", Some(LinkKind::Bridge));
    let port = kernel.link_insert("eth0", None);
    kernel.address_insert(bridge, "192.0.2.1/24".parse().unwrap());

    let mut session = kernel.open().unwrap();
    session
        .link_set(port, LinkChange::Controller(Some(bridge)))
        .unwrap();
    session.link_del(bridge).unwrap();

    assert_eq!(kernel.link_get("eth0").unwrap().controller, None);
    assert!(session.addresses(None).unwrap().is_empty());
}

#[test]
fn open_failure_injection() {
    let kernel = MemoryKernel::default();
    kernel.fail_open(Some("socket unavailable"));
    assert!(matches!(
        kernel.open(),
        Err(KernelError::Connection(reason)) if reason == "socket unavailable"
    ));
    assert_eq!(kernel.sessions_total(), 0);

    kernel.fail_open(None);
    assert!(kernel.open().is_ok());
}

#[test]
fn link_vanishes_after_dump() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("eth0", None);
    let ifindex = kernel.link_insert("eth1", None);
    kernel.vanish_after_dump("eth1");

    let mut session = kernel.open().unwrap();
    let links = session.links().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(session.link(ifindex), Err(KernelError::NotFound));
    assert_eq!(session.links().unwrap().len(), 1);
}

#[test]
fn loopback_kind() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("lo", Some(LinkKind::Loopback));

    let link = kernel.link_get("lo").unwrap();
    assert_eq!(link.kind, None);
    assert_eq!(link.effective_kind(), Some(LinkKind::Loopback));
}

#[test]
fn routes_are_replaced_per_prefix() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let prefix: IpNetwork = "198.51.100.0/24".parse().unwrap();

    let mut session = kernel.open().unwrap();
    let first = Nexthop::new(Some("192.0.2.1".parse().unwrap()), None);
    let second = Nexthop::new(None, Some(ifindex));
    session.route_add(prefix, first).unwrap();
    session.route_add(prefix, second).unwrap();

    let routes = session.routes(AddressFamily::Ipv4).unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].nexthop, second);
    assert_eq!(routes[0].protocol, RouteProtocol::Static);
    assert_eq!(routes[0].table, RT_TABLE_MAIN);
    assert!(session.routes(AddressFamily::Ipv6).unwrap().is_empty());

    // Routes through a deleted link go away with it.
    session.link_del(ifindex).unwrap();
    assert!(kernel.routes_get().is_empty());
    assert_eq!(session.route_del(prefix), Err(KernelError::NotFound));
}

#[test]
fn route_requires_next_hop() {
    let kernel = MemoryKernel::default();
    let prefix: IpNetwork = "2001:db8::/64".parse().unwrap();

    let mut session = kernel.open().unwrap();
    assert!(matches!(
        session.route_add(prefix, Nexthop::default()),
        Err(KernelError::Operation(..))
    ));
    assert_eq!(
        session.route_add(prefix, Nexthop::new(None, Some(9))),
        Err(KernelError::NotFound)
    );
    assert_eq!(
        kernel.calls(),
        vec![
            KernelRequest::RouteAdd {
                prefix,
                nexthop: Nexthop::default(),
            },
            KernelRequest::RouteAdd {
                prefix,
                nexthop: Nexthop::new(None, Some(9)),
            },
        ]
    );
}

#[test]
fn failed_requests_are_recorded() {
    let kernel = MemoryKernel::default();
    kernel.fail_requests(Some("Operation not permitted"));

    let mut session = kernel.open().unwrap();
    assert_eq!(
        session.link_add("dummy0", LinkKind::Dummy),
        Err(KernelError::Operation("Operation not permitted".to_owned()))
    );
    assert!(kernel.link_get("dummy0").is_none());
    assert_eq!(kernel.calls().len(), 1);

    kernel.fail_requests(None);
    assert!(session.link_add("dummy0", LinkKind::Dummy).is_ok());
}
