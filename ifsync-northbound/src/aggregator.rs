//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use crate::error::Error;

// Scratch state for one kernel object, assembled out of several related
// change records before the object-level kernel call is issued.
//
// Only one object can be aggregated at a time, and all slots are released
// when the aggregation ends.
#[derive(Debug, Default)]
pub struct FieldAggregator {
    key: Option<String>,
    slots: BTreeMap<&'static str, String>,
}

// ===== impl FieldAggregator =====

impl FieldAggregator {
    // Opens the aggregation for the given object.
    //
    // Reopening the object being aggregated resets its slots.
    pub fn begin(&mut self, key: &str) -> Result<(), Error> {
        if let Some(open) = &self.key
            && open != key
        {
            return Err(Error::AggregationOpen(open.clone()));
        }

        self.key = Some(key.to_owned());
        self.slots.clear();
        Ok(())
    }

    // Stores a slot value, replacing any previous one.
    pub fn set(&mut self, slot: &'static str, value: impl Into<String>) {
        self.slots.insert(slot, value.into());
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.slots.get(slot).map(String::as_str)
    }

    // Returns the slot value, failing if it was never populated.
    pub fn require(&self, slot: &str) -> Result<&str, Error> {
        self.get(slot).ok_or_else(|| {
            let object = self.key.as_deref().unwrap_or_default();
            Error::MissingField(format!("{object}/{slot}"))
        })
    }

    // Closes the aggregation and releases all slots.
    pub fn end(&mut self) {
        self.key = None;
        self.slots.clear();
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.key.is_some()
    }
}
