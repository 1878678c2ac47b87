//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod configuration;
pub mod state;

use ifsync_northbound::ProviderBase;

use crate::Master;

const IPV4_ROUTES: &str = "/ietf-routing:routing/control-plane-protocols/control-plane-protocol/static-routes/ietf-ipv4-unicast-routing:ipv4/route";
const IPV6_ROUTES: &str = "/ietf-routing:routing/control-plane-protocols/control-plane-protocol/static-routes/ietf-ipv6-unicast-routing:ipv6/route";

// ===== impl Master =====

impl ProviderBase for Master {
    fn top_level_node(&self) -> String {
        IPV4_ROUTES.to_owned()
    }

    fn top_level_nodes(&self) -> Vec<String> {
        vec![IPV4_ROUTES.to_owned(), IPV6_ROUTES.to_owned()]
    }
}
