//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_utils::southbound::LinkKind;
use tracing::{debug, debug_span};

// Interfaces plugin debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    LinkCreate(&'a str, LinkKind),
    LinkDelete(&'a str),
    LinkVanished(&'a str),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::LinkCreate(name, kind) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%kind, "{}", self);
                });
            }
            Debug::LinkDelete(name) | Debug::LinkVanished(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::LinkCreate(..) => {
                write!(f, "creating link")
            }
            Debug::LinkDelete(..) => {
                write!(f, "deleting link")
            }
            Debug::LinkVanished(..) => {
                write!(f, "link vanished while building snapshot")
            }
        }
    }
}
