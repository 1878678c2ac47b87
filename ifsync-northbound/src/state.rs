//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Serialize;

use crate::ProviderBase;
use crate::debug::Debug;
use crate::error::Error;

//
// Provider northbound.
//

pub trait Provider: ProviderBase {
    type Snapshot: std::fmt::Debug + Serialize;

    // Enumerates the live kernel objects, optionally restricted to the
    // object identified by `parent`.
    //
    // Every call queries the kernel anew. Objects that disappear while the
    // enumeration is in progress are skipped.
    fn list(&mut self, parent: Option<&str>)
    -> Result<Vec<Self::Snapshot>, Error>;
}

// ===== global functions =====

pub fn process_get<P>(
    provider: &mut P,
    parent: Option<&str>,
) -> Result<Vec<P::Snapshot>, Error>
where
    P: Provider,
{
    let root = provider.top_level_node();
    Debug::StateRequest(&root, parent).log();

    provider.list(parent)
}
