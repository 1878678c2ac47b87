//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span};

// Bridging plugin debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    BridgeCreate(&'a str),
    BridgeDelete(&'a str),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::BridgeCreate(name) | Debug::BridgeDelete(name) => {
                debug_span!("bridge", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::BridgeCreate(..) => {
                write!(f, "creating bridge")
            }
            Debug::BridgeDelete(..) => {
                write!(f, "deleting bridge")
            }
        }
    }
}
