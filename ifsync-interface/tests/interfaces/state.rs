//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ifsync_interface::interface::{Origin, Status};
use ifsync_interface::state_cb;
use ifsync_northbound::change::ChangeRecord;
use ifsync_southbound::memory::MemoryKernel;
use ifsync_southbound::snapshot::NeighborSnapshot;
use ifsync_utils::ip::AddressFamily;
use ifsync_utils::southbound::LinkKind;

use crate::common::{self, address, apply, leaf, neighbor};

#[test]
fn configured_attributes_are_reported() {
    let kernel = MemoryKernel::default();
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf("veth0", "name"), "veth0"),
            ChangeRecord::created(
                leaf("veth0", "type"),
                "iana-if-type:ethernetCsmacd",
            ),
            ChangeRecord::created(leaf("veth0", "description"), "uplink"),
            ChangeRecord::created(leaf("veth0", "enabled"), "true"),
            ChangeRecord::created(
                format!("{}/ietf-ip:ipv4/mtu", common::interface("veth0")),
                "9000",
            ),
            ChangeRecord::created(
                address("veth0", "ipv4", "10.0.0.1", "ip"),
                "10.0.0.1",
            ),
            ChangeRecord::created(
                address("veth0", "ipv4", "10.0.0.1", "prefix-length"),
                "24",
            ),
            ChangeRecord::created(
                neighbor("veth0", "ipv4", "10.0.0.2", "ip"),
                "10.0.0.2",
            ),
            ChangeRecord::created(
                neighbor("veth0", "ipv4", "10.0.0.2", "link-layer-address"),
                "00:11:22:33:44:55",
            ),
        ],
    );
    assert!(report.is_success());

    let mut master = common::master(&kernel);
    let interfaces = state_cb(&mut master, Some("veth0")).unwrap();
    assert_eq!(interfaces.len(), 1);

    let interface = &interfaces[0];
    assert_eq!(interface.name, "veth0");
    assert_eq!(interface.if_type, Some("iana-if-type:ethernetCsmacd"));
    assert_eq!(interface.description.as_deref(), Some("uplink"));
    assert_eq!(interface.admin_status, Status::Up);
    assert_eq!(interface.mtu, 9000);

    let ipv4 = interface.family(AddressFamily::Ipv4);
    let address = &ipv4.address[&"10.0.0.1".parse::<IpAddr>().unwrap()];
    assert_eq!(address.prefix_length, 24);
    assert_eq!(address.origin, Origin::Static);
    let neighbor = &ipv4.neighbor[&"10.0.0.2".parse::<IpAddr>().unwrap()];
    assert_eq!(
        neighbor.link_layer_address.as_deref(),
        Some("00:11:22:33:44:55")
    );
    assert_eq!(neighbor.origin, Origin::Static);
    assert!(interface.ipv6.address.is_empty());
}

#[test]
fn vanished_links_are_skipped() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("eth0", None);
    kernel.link_insert("eth1", None);
    kernel.link_insert("eth2", None);
    kernel.vanish_after_dump("eth1");

    let mut master = common::master(&kernel);
    let interfaces = state_cb(&mut master, None).unwrap();
    let names = interfaces
        .iter()
        .map(|interface| interface.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["eth0", "eth2"]);
    assert_eq!(kernel.sessions_open(), 0);
}

#[test]
fn unknown_name_yields_nothing() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("eth0", None);

    let mut master = common::master(&kernel);
    assert!(state_cb(&mut master, Some("eth9")).unwrap().is_empty());
}

#[test]
fn kernel_only_objects() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("lo", Some(LinkKind::Loopback));
    let bridge = kernel.link_insert("br0", Some(LinkKind::Bridge));
    let ifindex = kernel.link_insert("eth0", None);
    kernel.address_insert(ifindex, "fe80::1/64".parse().unwrap());
    kernel.neighbor_insert(NeighborSnapshot::new(
        ifindex,
        "10.0.0.9".parse().unwrap(),
        None,
        false,
    ));

    let mut master = common::master(&kernel);
    let bridge_port = "ieee802-dot1q-bridge:bridge-port/component-name";
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("eth0", bridge_port), "br0")],
    );
    assert!(report.is_success());
    assert_eq!(kernel.link_get("eth0").unwrap().controller, Some(bridge));

    let interfaces = state_cb(&mut master, None).unwrap();
    assert_eq!(interfaces.len(), 3);
    assert_eq!(
        interfaces[0].if_type,
        Some("iana-if-type:softwareLoopback")
    );

    let eth0 = &interfaces[2];
    assert_eq!(eth0.if_type, None);
    assert_eq!(eth0.oper_status, Status::Down);
    assert_eq!(eth0.bridge_port.as_deref(), Some("br0"));
    assert_eq!(
        eth0.ipv6.address[&"fe80::1".parse::<IpAddr>().unwrap()].origin,
        Origin::LinkLayer
    );
    assert_eq!(
        eth0.ipv4.neighbor[&"10.0.0.9".parse::<IpAddr>().unwrap()].origin,
        Origin::Dynamic
    );

    let value = serde_json::to_value(eth0).unwrap();
    assert_eq!(value["admin-status"], "down");
    assert_eq!(value["bridge-port"], "br0");
    assert_eq!(value["statistics"]["in-octets"], 0);
    assert_eq!(
        value["ipv6"]["address"]["fe80::1"]["prefix-length"],
        64
    );
}
