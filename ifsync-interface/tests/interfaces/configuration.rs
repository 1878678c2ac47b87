//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_interface::change_cb;
use ifsync_northbound::change::{ChangeOp, ChangeRecord, ChangeSet};
use ifsync_northbound::configuration::{CommitPhase, Outcome};
use ifsync_northbound::error::Error;
use ifsync_southbound::memory::MemoryKernel;
use ifsync_southbound::snapshot::{
    KernelRequest, LinkChange, NeighborSnapshot,
};
use ifsync_utils::southbound::LinkKind;

use crate::common::{self, address, apply, leaf, neighbor};

fn link_set(ifindex: u32, change: LinkChange) -> KernelRequest {
    KernelRequest::LinkSet { ifindex, change }
}

#[test]
fn veth_with_address() {
    let kernel = MemoryKernel::default();
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf("veth0", "name"), "veth0"),
            ChangeRecord::created(
                leaf("veth0", "type"),
                "iana-if-type:ethernetCsmacd",
            ),
            ChangeRecord::created(
                address("veth0", "ipv4", "10.0.0.1", "ip"),
                "10.0.0.1",
            ),
            ChangeRecord::created(
                address("veth0", "ipv4", "10.0.0.1", "prefix-length"),
                "24",
            ),
        ],
    );

    assert!(report.is_success());
    let ifindex = kernel.link_get("veth0").unwrap().ifindex;
    assert_eq!(
        kernel.calls(),
        vec![
            KernelRequest::LinkAdd {
                name: "veth0".to_owned(),
                kind: LinkKind::Veth,
            },
            KernelRequest::AddressAdd {
                ifindex,
                addr: "10.0.0.1/24".parse().unwrap(),
            },
        ]
    );
}

#[test]
fn link_kind_defaults_to_dummy() {
    let kernel = MemoryKernel::default();
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("dummy0", "name"), "dummy0")],
    );

    assert!(report.is_success());
    assert_eq!(
        kernel.calls(),
        vec![KernelRequest::LinkAdd {
            name: "dummy0".to_owned(),
            kind: LinkKind::Dummy,
        }]
    );
}

#[test]
fn name_length_limit() {
    let kernel = MemoryKernel::default();
    let name = "a".repeat(15);
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf(&name, "name"), name.as_str())],
    );
    assert!(report.is_success());
    assert!(kernel.link_get(&name).is_some());

    let kernel = MemoryKernel::default();
    let name = "a".repeat(16);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf(&name, "name"), name.as_str()),
            ChangeRecord::created(leaf(&name, "enabled"), "true"),
        ],
    );
    assert!(matches!(
        report.first_failure(),
        Some(Error::InvalidArgument(_))
    ));
    assert!(report.instance(&common::interface(&name)).unwrap().fatal.is_some());
    assert!(kernel.calls().is_empty());
}

#[test]
fn verify_runs_no_kernel_calls() {
    let kernel = MemoryKernel::default();
    let name = "a".repeat(16);
    let report = common::commit(
        &kernel,
        CommitPhase::Verify,
        vec![
            ChangeRecord::created(leaf(&name, "name"), name.as_str()),
            ChangeRecord::created(leaf("eth0", "type"), "iana-if-type:fddi"),
        ],
    );

    assert!(!report.is_success());
    assert_eq!(report.instances.len(), 2);
    assert!(report.instances.iter().all(|instance| !instance.is_success()));
    assert_eq!(kernel.sessions_total(), 0);
    assert!(kernel.calls().is_empty());
}

#[test]
fn existing_link_is_adopted() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("eth0", None);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf("eth0", "name"), "eth0"),
            ChangeRecord::created(
                leaf("eth0", "type"),
                "iana-if-type:ethernetCsmacd",
            ),
        ],
    );

    assert!(report.is_success());
    assert_eq!(report.instances[0].applied(), 0);
    assert!(kernel.calls().is_empty());
}

#[test]
fn link_delete_is_idempotent() {
    let kernel = MemoryKernel::default();
    let changes = || {
        vec![
            ChangeRecord::deleted(leaf("dummy0", "name"), "dummy0"),
            ChangeRecord::deleted(leaf("dummy0", "mtu"), "9000"),
            ChangeRecord::deleted(
                address("dummy0", "ipv4", "10.0.0.1", "ip"),
                "10.0.0.1",
            ),
        ]
    };

    let ifindex = kernel.link_insert("dummy0", Some(LinkKind::Dummy));
    kernel.address_insert(ifindex, "10.0.0.1/24".parse().unwrap());
    let report = apply(&kernel, changes());
    assert!(report.is_success());
    assert_eq!(kernel.calls(), vec![KernelRequest::LinkDel { ifindex }]);

    kernel.clear_calls();
    let report = apply(&kernel, changes());
    assert!(report.is_success());
    assert!(
        report.instances[0]
            .records
            .iter()
            .all(|record| record.outcome == Outcome::NoOp)
    );
    assert!(kernel.calls().is_empty());
}

#[test]
fn address_prefix_aggregation() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);

    // The prefix-length record comes first in diff order.
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(
                address("eth0", "ipv6", "2001:db8::1", "prefix-length"),
                "64",
            ),
            ChangeRecord::created(
                address("eth0", "ipv6", "2001:db8::1", "ip"),
                "2001:db8::1",
            ),
        ],
    );

    assert!(report.is_success());
    assert_eq!(
        kernel.calls(),
        vec![KernelRequest::AddressAdd {
            ifindex,
            addr: "2001:db8::1/64".parse().unwrap(),
        }]
    );
}

#[test]
fn address_netmask() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(
                address("eth0", "ipv4", "192.168.1.1", "ip"),
                "192.168.1.1",
            ),
            ChangeRecord::created(
                address("eth0", "ipv4", "192.168.1.1", "netmask"),
                "255.255.255.0",
            ),
        ],
    );

    assert!(report.is_success());
    assert_eq!(
        kernel.addresses_get(ifindex),
        vec!["192.168.1.1/24".parse().unwrap()]
    );
}

#[test]
fn address_missing_prefix() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("eth0", None);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(
                address("eth0", "ipv4", "10.0.0.1", "ip"),
                "10.0.0.1",
            ),
            ChangeRecord::created(
                neighbor("eth0", "ipv4", "10.0.0.2", "ip"),
                "10.0.0.2",
            ),
        ],
    );

    assert!(matches!(
        report.first_failure(),
        Some(Error::MissingField(_))
    ));
    // The failure aborts the remaining handlers.
    assert_eq!(report.instances[0].records.len(), 1);
    assert!(kernel.calls().is_empty());
}

#[test]
fn address_conflict() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    kernel.address_insert(ifindex, "10.0.0.1/16".parse().unwrap());
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(
                address("eth0", "ipv4", "10.0.0.1", "ip"),
                "10.0.0.1",
            ),
            ChangeRecord::created(
                address("eth0", "ipv4", "10.0.0.1", "prefix-length"),
                "24",
            ),
        ],
    );

    assert!(matches!(report.first_failure(), Some(Error::Conflict(_))));
    assert!(kernel.calls().is_empty());
}

#[test]
fn address_prefix_modified() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    kernel.address_insert(ifindex, "10.0.0.1/16".parse().unwrap());
    let report = apply(
        &kernel,
        vec![ChangeRecord::modified(
            address("eth0", "ipv4", "10.0.0.1", "prefix-length"),
            "16",
            "24",
        )],
    );

    assert!(report.is_success());
    assert_eq!(
        kernel.calls(),
        vec![
            KernelRequest::AddressDel {
                ifindex,
                addr: "10.0.0.1/16".parse().unwrap(),
            },
            KernelRequest::AddressAdd {
                ifindex,
                addr: "10.0.0.1/24".parse().unwrap(),
            },
        ]
    );
}

#[test]
fn address_deleted_with_sibling_prefix() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    kernel.address_insert(ifindex, "10.0.0.1/24".parse().unwrap());
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::deleted(
                address("eth0", "ipv4", "10.0.0.1", "ip"),
                "10.0.0.1",
            ),
            ChangeRecord::deleted(
                address("eth0", "ipv4", "10.0.0.1", "prefix-length"),
                "24",
            ),
        ],
    );

    assert!(report.is_success());
    assert_eq!(
        kernel.calls(),
        vec![KernelRequest::AddressDel {
            ifindex,
            addr: "10.0.0.1/24".parse().unwrap(),
        }]
    );
}

#[test]
fn ip_disabled_flushes_family() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    kernel.address_insert(ifindex, "10.0.0.1/24".parse().unwrap());
    kernel.address_insert(ifindex, "10.0.1.1/24".parse().unwrap());
    kernel.address_insert(ifindex, "2001:db8::1/64".parse().unwrap());
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(
            format!("{}/ietf-ip:ipv4/enabled", common::interface("eth0")),
            "false",
        )],
    );

    assert!(report.is_success());
    assert_eq!(
        kernel.addresses_get(ifindex),
        vec!["2001:db8::1/64".parse().unwrap()]
    );
}

#[test]
fn enabled_mapping() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);

    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("eth0", "enabled"), "true")],
    );
    assert!(report.is_success());
    assert!(kernel.link_get("eth0").unwrap().admin_up());

    let report = apply(
        &kernel,
        vec![ChangeRecord::modified(leaf("eth0", "enabled"), "true", "no")],
    );
    assert!(report.is_success());
    assert!(!kernel.link_get("eth0").unwrap().admin_up());

    // Deleting the leaf restores the default.
    let report = apply(
        &kernel,
        vec![ChangeRecord::deleted(leaf("eth0", "enabled"), "false")],
    );
    assert!(report.is_success());
    assert_eq!(
        kernel.calls(),
        vec![
            link_set(ifindex, LinkChange::AdminStatus(true)),
            link_set(ifindex, LinkChange::AdminStatus(false)),
            link_set(ifindex, LinkChange::AdminStatus(true)),
        ]
    );

    // Unchanged attributes result in no kernel calls.
    kernel.clear_calls();
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("eth0", "enabled"), "true")],
    );
    assert!(report.is_success());
    assert!(kernel.calls().is_empty());
}

#[test]
fn mtu_and_description() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf("eth0", "description"), "uplink"),
            ChangeRecord::created(
                format!("{}/ietf-ip:ipv4/mtu", common::interface("eth0")),
                "9000",
            ),
        ],
    );
    assert!(report.is_success());
    let link = kernel.link_get("eth0").unwrap();
    assert_eq!(link.alias.as_deref(), Some("uplink"));
    assert_eq!(link.mtu, 9000);

    let report = apply(
        &kernel,
        vec![
            ChangeRecord::deleted(leaf("eth0", "description"), "uplink"),
            ChangeRecord::deleted(
                format!("{}/ietf-ip:ipv4/mtu", common::interface("eth0")),
                "9000",
            ),
        ],
    );
    assert!(report.is_success());
    let link = kernel.link_get("eth0").unwrap();
    assert_eq!(link.alias, None);
    assert_eq!(link.mtu, 1500);
    assert_eq!(kernel.calls().len(), 4);
    assert_eq!(
        kernel.calls()[2],
        link_set(ifindex, LinkChange::Alias(String::new()))
    );
}

#[test]
fn ipv6_mtu_leaves_link_mtu() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let mtu = |af: &str| {
        format!("{}/ietf-ip:{af}/mtu", common::interface("eth0"))
    };
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(mtu("ipv4"), "9000"),
            ChangeRecord::created(mtu("ipv6"), "1500"),
        ],
    );
    assert!(report.is_success());
    assert_eq!(kernel.link_get("eth0").unwrap().mtu, 9000);
    assert_eq!(
        kernel.calls(),
        vec![link_set(ifindex, LinkChange::Mtu(9000))]
    );

    // Removing the IPv6 MTU doesn't touch the link.
    kernel.clear_calls();
    let report =
        apply(&kernel, vec![ChangeRecord::deleted(mtu("ipv6"), "1500")]);
    assert!(report.is_success());
    assert_eq!(kernel.link_get("eth0").unwrap().mtu, 9000);
    assert!(kernel.calls().is_empty());
}

#[test]
fn invalid_attribute_is_recoverable() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("eth0", None);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(
                format!("{}/ietf-ip:ipv4/mtu", common::interface("eth0")),
                "70000",
            ),
            ChangeRecord::created(leaf("eth0", "description"), "uplink"),
        ],
    );

    assert!(matches!(
        report.first_failure(),
        Some(Error::InvalidArgument(_))
    ));
    assert!(report.instances[0].fatal.is_none());
    assert_eq!(
        kernel.link_get("eth0").unwrap().alias.as_deref(),
        Some("uplink")
    );
}

#[test]
fn type_change_is_unsupported() {
    let kernel = MemoryKernel::default();
    kernel.link_insert("dummy0", Some(LinkKind::Dummy));
    let report = apply(
        &kernel,
        vec![ChangeRecord::modified(
            leaf("dummy0", "type"),
            "iana-if-type:other",
            "iana-if-type:ethernetCsmacd",
        )],
    );

    assert!(matches!(
        report.first_failure(),
        Some(Error::UnsupportedTransition(ChangeOp::Modified, _))
    ));
    assert!(kernel.calls().is_empty());
}

#[test]
fn unknown_type_blocks_creation() {
    let kernel = MemoryKernel::default();
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf("tun0", "name"), "tun0"),
            ChangeRecord::created(leaf("tun0", "type"), "iana-if-type:tunnel"),
        ],
    );

    assert!(matches!(
        report.first_failure(),
        Some(Error::InvalidArgument(_))
    ));
    assert!(kernel.calls().is_empty());
}

#[test]
fn attribute_without_link() {
    let kernel = MemoryKernel::default();
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("eth9", "enabled"), "true")],
    );

    assert!(matches!(
        report.first_failure(),
        Some(Error::ParentNotFound(_))
    ));
    assert!(kernel.calls().is_empty());
}

#[test]
fn neighbor_create_and_modify() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(
                neighbor("eth0", "ipv4", "10.0.0.2", "ip"),
                "10.0.0.2",
            ),
            ChangeRecord::created(
                neighbor("eth0", "ipv4", "10.0.0.2", "link-layer-address"),
                "00:11:22:33:44:55",
            ),
        ],
    );
    assert!(report.is_success());
    assert_eq!(
        kernel.neighbors_get(ifindex),
        vec![NeighborSnapshot::new(
            ifindex,
            "10.0.0.2".parse().unwrap(),
            Some("00:11:22:33:44:55".parse().unwrap()),
            true
        )]
    );

    let report = apply(
        &kernel,
        vec![ChangeRecord::modified(
            neighbor("eth0", "ipv4", "10.0.0.2", "link-layer-address"),
            "00:11:22:33:44:55",
            "00:11:22:33:44:66",
        )],
    );
    assert!(report.is_success());
    assert_eq!(
        kernel.neighbors_get(ifindex)[0].lladdr,
        Some("00:11:22:33:44:66".parse().unwrap())
    );

    let report = apply(
        &kernel,
        vec![
            ChangeRecord::deleted(
                neighbor("eth0", "ipv4", "10.0.0.2", "ip"),
                "10.0.0.2",
            ),
            ChangeRecord::deleted(
                neighbor("eth0", "ipv4", "10.0.0.2", "link-layer-address"),
                "00:11:22:33:44:66",
            ),
        ],
    );
    assert!(report.is_success());
    assert!(kernel.neighbors_get(ifindex).is_empty());
}

#[test]
fn bridge_port() {
    let kernel = MemoryKernel::default();
    let ifindex = kernel.link_insert("eth0", None);
    let path = leaf("eth0", "ieee802-dot1q-bridge:bridge-port/component-name");

    let report = apply(&kernel, vec![ChangeRecord::created(&path, "br0")]);
    assert!(matches!(
        report.first_failure(),
        Some(Error::ParentNotFound(_))
    ));

    let bridge = kernel.link_insert("br0", Some(LinkKind::Bridge));
    let report = apply(&kernel, vec![ChangeRecord::created(&path, "br0")]);
    assert!(report.is_success());
    assert_eq!(kernel.link_get("eth0").unwrap().controller, Some(bridge));

    let report = apply(&kernel, vec![ChangeRecord::deleted(&path, "br0")]);
    assert!(report.is_success());
    assert_eq!(
        kernel.calls(),
        vec![
            link_set(ifindex, LinkChange::Controller(Some(bridge))),
            link_set(ifindex, LinkChange::Controller(None)),
        ]
    );
}

#[test]
fn session_failure() {
    let kernel = MemoryKernel::default();
    kernel.fail_open(Some("permission denied"));
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("dummy0", "name"), "dummy0")],
    );

    assert_eq!(
        report.first_failure(),
        Some(&Error::SessionInit("permission denied".to_owned()))
    );
    assert!(report.instances[0].records.is_empty());
    assert!(kernel.calls().is_empty());
}

#[test]
fn sessions_are_released() {
    let kernel = MemoryKernel::default();
    let report = apply(
        &kernel,
        vec![
            ChangeRecord::created(leaf("dummy0", "name"), "dummy0"),
            ChangeRecord::created(leaf("dummy1", "name"), "dummy1"),
            ChangeRecord::created(leaf("dummy2", "enabled"), "true"),
        ],
    );

    assert!(!report.is_success());
    assert_eq!(kernel.sessions_total(), 3);
    assert_eq!(kernel.sessions_open(), 0);
    // Instances are independent of each other.
    assert!(kernel.link_get("dummy0").is_some());
    assert!(kernel.link_get("dummy1").is_some());
}

#[test]
fn change_callback_result() {
    let kernel = MemoryKernel::default();
    let mut master = common::master(&kernel);

    let changes = ChangeSet::new(vec![ChangeRecord::created(
        leaf("dummy0", "name"),
        "dummy0",
    )]);
    assert!(change_cb(&mut master, CommitPhase::Apply, &changes).is_ok());

    let changes = ChangeSet::new(vec![ChangeRecord::modified(
        leaf("dummy0", "name"),
        "dummy0",
        "dummy1",
    )]);
    assert!(matches!(
        change_cb(&mut master, CommitPhase::Apply, &changes),
        Err(Error::UnsupportedTransition(ChangeOp::Modified, _))
    ));

    // Nothing happens on abort.
    let changes = ChangeSet::new(vec![ChangeRecord::deleted(
        leaf("dummy0", "name"),
        "dummy0",
    )]);
    assert!(change_cb(&mut master, CommitPhase::Abort, &changes).is_ok());
    assert!(kernel.link_get("dummy0").is_some());
}

#[test]
fn link_creation_refused() {
    let kernel = MemoryKernel::default();
    kernel.fail_requests(Some("Operation not permitted"));
    let report = apply(
        &kernel,
        vec![ChangeRecord::created(leaf("dummy0", "name"), "dummy0")],
    );

    match report.first_failure() {
        Some(Error::KernelCall(reason)) => {
            assert_eq!(reason, "Operation not permitted")
        }
        error => panic!("unexpected result: {error:?}"),
    }
    assert!(report.instances[0].fatal.is_some());
    assert!(kernel.link_get("dummy0").is_none());
}
