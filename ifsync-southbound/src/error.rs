//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

// Kernel resource access errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KernelError {
    NotFound,
    Operation(String),
    Connection(String),
}

// ===== impl KernelError =====

impl KernelError {
    pub fn log(&self) {
        match self {
            KernelError::NotFound => {
                warn!("{}", self);
            }
            KernelError::Operation(error) => {
                warn!(%error, "{}", self);
            }
            KernelError::Connection(error) => {
                error!(%error, "{}", self);
            }
        }
    }

    // Returns the underlying reason string.
    pub fn reason(&self) -> String {
        match self {
            KernelError::NotFound => self.to_string(),
            KernelError::Operation(error) | KernelError::Connection(error) => {
                error.clone()
            }
        }
    }
}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::NotFound => {
                write!(f, "kernel object not found")
            }
            KernelError::Operation(..) => {
                write!(f, "kernel operation failed")
            }
            KernelError::Connection(..) => {
                write!(f, "failed to communicate with the kernel")
            }
        }
    }
}

impl std::error::Error for KernelError {}

impl From<rtnetlink::Error> for KernelError {
    fn from(error: rtnetlink::Error) -> KernelError {
        match &error {
            rtnetlink::Error::NetlinkError(msg) => {
                let code = -msg.raw_code();
                if [libc::ENODEV, libc::ENOENT, libc::EADDRNOTAVAIL, libc::ESRCH]
                    .contains(&code)
                {
                    KernelError::NotFound
                } else {
                    KernelError::Operation(error.to_string())
                }
            }
            rtnetlink::Error::RequestFailed => {
                KernelError::Connection(error.to_string())
            }
            _ => KernelError::Operation(error.to_string()),
        }
    }
}
