//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_southbound::snapshot::LinkSnapshot;
use serde::Serialize;

// Component types accepted by the `type` leaf.
pub const COMPONENT_TYPES: [&str; 4] = [
    "c-vlan-component",
    "s-vlan-component",
    "d-bridge-component",
    "edge-relay-component",
];

// Operational view of a bridge component, backed by a Linux bridge link.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Component {
    pub name: String,
    pub if_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    // Names of the enslaved links.
    pub ports: Vec<String>,
}

// ===== impl Component =====

impl Component {
    pub(crate) fn from_kernel(
        bridge: &LinkSnapshot,
        links: &[LinkSnapshot],
    ) -> Component {
        Component {
            name: bridge.name.clone(),
            if_index: bridge.ifindex,
            address: bridge.address.map(|address| address.to_string()),
            ports: links
                .iter()
                .filter(|link| link.controller == Some(bridge.ifindex))
                .map(|link| link.name.clone())
                .collect(),
        }
    }
}

// ===== global functions =====

// Tells whether the given identity names a supported component type.
pub fn is_component_type(value: &str) -> bool {
    let value = value.rsplit(':').next().unwrap_or(value);
    COMPONENT_TYPES.contains(&value)
}
