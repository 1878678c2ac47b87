//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod ip;
pub mod mac_addr;
pub mod southbound;
pub mod xpath;

// Maximum length of a Linux interface name (IFNAMSIZ minus the trailing NUL).
pub const IFNAMSIZ_MAX: usize = 15;
