//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

// Linux link kinds managed through the interfaces plugin.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    Veth,
    Loopback,
    Vlan,
    Dummy,
    Bridge,
}

// Mapping between iana-if-type identities and link kinds.
const IANA_IF_TYPES: [(&str, LinkKind); 5] = [
    ("iana-if-type:ethernetCsmacd", LinkKind::Veth),
    ("iana-if-type:softwareLoopback", LinkKind::Loopback),
    ("iana-if-type:l2vlan", LinkKind::Vlan),
    ("iana-if-type:other", LinkKind::Dummy),
    ("iana-if-type:bridge", LinkKind::Bridge),
];

// ===== impl LinkKind =====

impl LinkKind {
    // Link kind given to links created without an explicit type.
    pub const DEFAULT: LinkKind = LinkKind::Dummy;

    // Parses an iana-if-type identity, with or without its module prefix.
    pub fn from_iana(value: &str) -> Option<LinkKind> {
        let value = value.rsplit(':').next().unwrap_or(value);
        IANA_IF_TYPES
            .iter()
            .find(|(identity, _)| identity.ends_with(&format!(":{value}")))
            .map(|(_, kind)| *kind)
    }

    // Returns the iana-if-type identity for this link kind.
    pub fn to_iana(&self) -> &'static str {
        IANA_IF_TYPES
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(identity, _)| *identity)
            .unwrap_or("iana-if-type:other")
    }

    // Returns the rtnetlink IFLA_INFO_KIND string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Veth => "veth",
            LinkKind::Loopback => "lo",
            LinkKind::Vlan => "vlan",
            LinkKind::Dummy => "dummy",
            LinkKind::Bridge => "bridge",
        }
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
