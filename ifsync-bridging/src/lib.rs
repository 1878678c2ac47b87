//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Bridging plugin: reconciles `ieee802-dot1q-bridge` components against
//! Linux bridge links.

pub mod bridge;
mod debug;
pub mod northbound;

use ifsync_northbound::change::ChangeSource;
use ifsync_northbound::configuration::{CommitPhase, CommitReport};
use ifsync_northbound::error::Error;
use ifsync_northbound::{configuration, state};
use ifsync_southbound::Southbound;

use crate::bridge::Component;

pub struct Master {
    // Kernel session factory.
    pub southbound: Box<dyn Southbound>,
}

// ===== impl Master =====

impl Master {
    pub fn new(southbound: Box<dyn Southbound>) -> Master {
        Master { southbound }
    }
}

impl std::fmt::Debug for Master {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master").finish_non_exhaustive()
    }
}

// ===== global functions =====

// Processes the changes made to the bridge list in one commit phase.
pub fn change_cb(
    master: &mut Master,
    phase: CommitPhase,
    changes: &dyn ChangeSource,
) -> Result<CommitReport, Error> {
    configuration::process_commit(master, phase, changes).into_result()
}

// Returns the operational state of all bridge components, or of the named
// one.
pub fn state_cb(
    master: &mut Master,
    component: Option<&str>,
) -> Result<Vec<Component>, Error> {
    state::process_get(master, component)
}
