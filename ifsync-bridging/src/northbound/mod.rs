//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod configuration;
pub mod state;

use ifsync_northbound::ProviderBase;

use crate::Master;

// ===== impl Master =====

impl ProviderBase for Master {
    fn top_level_node(&self) -> String {
        "/ieee802-dot1q-bridge:bridges/bridge".to_owned()
    }
}
