//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

use crate::change::ChangeOp;
use crate::configuration::FieldKind;

// Reconciliation errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidArgument(String),
    UnsupportedTransition(ChangeOp, String),
    Conflict(String),
    ParentNotFound(String),
    MissingField(String),
    AggregationOpen(String),
    Resolution(String),
    KernelCall(String),
    SessionInit(String),
    ValidationFailed(String),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::InvalidArgument(error)
            | Error::Conflict(error)
            | Error::ParentNotFound(error)
            | Error::ValidationFailed(error) => {
                warn!(%error, "{}", self);
            }
            Error::UnsupportedTransition(operation, path) => {
                warn!(?operation, %path, "{}", self);
            }
            Error::MissingField(field) | Error::AggregationOpen(field) => {
                error!(%field, "{}", self);
            }
            Error::Resolution(error)
            | Error::KernelCall(error)
            | Error::SessionInit(error) => {
                error!(%error, "{}", self);
            }
        }
    }

    // Tells whether the error aborts the whole instance, given the kind of
    // field whose handler raised it.
    pub fn is_fatal(&self, kind: FieldKind) -> bool {
        match self {
            Error::InvalidArgument(..) | Error::ValidationFailed(..) => {
                kind == FieldKind::Identity
            }
            _ => true,
        }
    }

    // Returns the underlying reason string.
    pub fn reason(&self) -> &str {
        match self {
            Error::UnsupportedTransition(_, reason)
            | Error::InvalidArgument(reason)
            | Error::Conflict(reason)
            | Error::ParentNotFound(reason)
            | Error::MissingField(reason)
            | Error::AggregationOpen(reason)
            | Error::Resolution(reason)
            | Error::KernelCall(reason)
            | Error::SessionInit(reason)
            | Error::ValidationFailed(reason) => reason,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(..) => {
                write!(f, "invalid argument")
            }
            Error::UnsupportedTransition(operation, ..) => {
                write!(f, "unsupported operation: {operation}")
            }
            Error::Conflict(..) => {
                write!(f, "conflicting kernel object already exists")
            }
            Error::ParentNotFound(..) => {
                write!(f, "parent kernel object not found")
            }
            Error::MissingField(..) => {
                write!(f, "required field missing")
            }
            Error::AggregationOpen(..) => {
                write!(f, "field aggregation already open for another object")
            }
            Error::Resolution(..) => {
                write!(f, "failed to resolve kernel object")
            }
            Error::KernelCall(..) => {
                write!(f, "kernel call failed")
            }
            Error::SessionInit(..) => {
                write!(f, "failed to open kernel session")
            }
            Error::ValidationFailed(..) => {
                write!(f, "validation failed")
            }
        }
    }
}

impl std::error::Error for Error {}
