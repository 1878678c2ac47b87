//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, trace, trace_span};

use crate::change::ChangeRecord;
use crate::configuration::{CommitPhase, Outcome};
use crate::error::Error;

#[derive(Debug)]
pub enum Debug<'a> {
    CommitStart(CommitPhase, &'a str, usize),
    SessionOpen(&'a str),
    SessionClose(&'a str),
    HandlerCallback(CommitPhase, &'a ChangeRecord),
    HandlerOutcome(&'a str, &'a Outcome),
    InstanceAbort(&'a str, &'a Error),
    StateRequest(&'a str, Option<&'a str>),
}

// ===== impl Debug =====

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::CommitStart(phase, root, instances) => {
                trace_span!("northbound").in_scope(|| {
                    debug!(?phase, %root, %instances, "{}", self);
                });
            }
            Debug::SessionOpen(instance) | Debug::SessionClose(instance) => {
                trace_span!("northbound").in_scope(|| {
                    trace!(%instance, "{}", self);
                });
            }
            Debug::HandlerCallback(phase, change) => {
                trace_span!("northbound").in_scope(|| {
                    trace!(
                        ?phase, operation = ?change.operation, path = %change.path,
                        value = ?change.value, "{}", self
                    )
                });
            }
            Debug::HandlerOutcome(path, outcome) => {
                trace_span!("northbound").in_scope(|| {
                    trace!(%path, %outcome, "{}", self);
                });
            }
            Debug::InstanceAbort(instance, error) => {
                trace_span!("northbound").in_scope(|| {
                    debug!(%instance, %error, "{}", self);
                });
            }
            Debug::StateRequest(root, parent) => {
                trace_span!("northbound").in_scope(|| {
                    trace!(%root, ?parent, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::CommitStart(..) => {
                write!(f, "commit phase")
            }
            Debug::SessionOpen(..) => {
                write!(f, "kernel session opened")
            }
            Debug::SessionClose(..) => {
                write!(f, "kernel session closed")
            }
            Debug::HandlerCallback(..) => {
                write!(f, "field handler")
            }
            Debug::HandlerOutcome(..) => {
                write!(f, "field handler outcome")
            }
            Debug::InstanceAbort(..) => {
                write!(f, "instance aborted")
            }
            Debug::StateRequest(..) => {
                write!(f, "operational data request")
            }
        }
    }
}
