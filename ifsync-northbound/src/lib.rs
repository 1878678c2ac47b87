//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Reconciliation engine between datastore changes and kernel state.

#![allow(type_alias_bounds)]

mod debug;

pub mod aggregator;
pub mod change;
pub mod configuration;
pub mod error;
pub mod state;

/// Base northbound provider trait.
pub trait ProviderBase
where
    Self: 'static + Sized,
{
    // Returns the data path of the list whose entries are reconciled as
    // independent instances.
    fn top_level_node(&self) -> String;

    // Returns the data paths of every list reconciled by the provider, in
    // processing order.
    fn top_level_nodes(&self) -> Vec<String> {
        vec![self.top_level_node()]
    }
}
