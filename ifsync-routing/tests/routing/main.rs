//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//


use ifsync_northbound::change::{ChangeRecord, ChangeSet};
use ifsync_northbound::configuration::{self as nb_configuration, CommitPhase, CommitReport};
use ifsync_routing::Master;
use ifsync_southbound::memory::MemoryKernel;

fn route(af: &str, prefix: &str, leaf: &str) -> String {
    format!(
        "/ietf-routing:routing/control-plane-protocols/control-plane-protocol[type='ietf-routing:static'][name='static']/static-routes/ietf-{af}-unicast-routing:{af}/route[destination-prefix='{prefix}']/{leaf}"
    )
}

fn master(kernel: &MemoryKernel) -> Master {
    Master::new(Box::new(kernel.clone()))
}

fn commit(
    kernel: &MemoryKernel,
    phase: CommitPhase,
    changes: Vec<ChangeRecord>,
) -> CommitReport {
    nb_configuration::process_commit(
        &mut master(kernel),
        phase,
        &ChangeSet::new(changes),
    )
}
