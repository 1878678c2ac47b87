//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span};

use crate::snapshot::KernelRequest;

// Debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    SessionOpen,
    SessionClose,
    RequestTx(&'a KernelRequest),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub fn log(&self) {
        match self {
            Debug::SessionOpen | Debug::SessionClose => {
                debug_span!("southbound").in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::RequestTx(request) => {
                debug_span!("southbound").in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        debug!(?request, "{}", self);
                    });
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::SessionOpen => {
                write!(f, "kernel session opened")
            }
            Debug::SessionClose => {
                write!(f, "kernel session closed")
            }
            Debug::RequestTx(..) => {
                write!(f, "request")
            }
        }
    }
}
