//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Datastore change records.

use ifsync_utils::xpath;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

// Datastore edit operation.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Created,
    Modified,
    Deleted,
    Moved,
}

// A single datastore edit.
//
// `Created` records carry no previous value and `Deleted` records carry no
// value.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(try_from = "ChangeRecordDef")]
pub struct ChangeRecord {
    pub path: String,
    pub operation: ChangeOp,
    pub previous_value: Option<String>,
    pub value: Option<String>,
}

// Unchecked form of `ChangeRecord`, used for deserialization.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangeRecordDef {
    path: String,
    operation: ChangeOp,
    #[serde(default)]
    previous_value: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

// Ordered sequence of edits of one transaction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeSet {
    changes: Vec<ChangeRecord>,
}

// Source of change records for one transaction.
pub trait ChangeSource {
    // Returns all records, in diff order.
    fn records<'a>(&'a self) -> Box<dyn Iterator<Item = &'a ChangeRecord> + 'a>;

    // Returns the records matching the given selector, in diff order.
    //
    // A record matches when its schema path equals the selector's and every
    // key predicate present in the selector has the same value in the
    // record path.
    fn changes<'a>(
        &'a self,
        selector: &str,
    ) -> Box<dyn Iterator<Item = &'a ChangeRecord> + 'a> {
        let selector = selector.to_owned();
        Box::new(
            self.records()
                .filter(move |change| xpath::matches(&selector, &change.path)),
        )
    }

    // Returns the record at the given data path.
    fn find(&self, path: &str) -> Option<&ChangeRecord> {
        let path = xpath::normalize(path);
        self.records()
            .find(|change| xpath::normalize(&change.path) == path)
    }

    // Returns the distinct instance paths under the given list, in order of
    // first appearance.
    //
    // Example: `instances("/ietf-interfaces:interfaces/interface")` returns
    // `["/interfaces/interface[name='eth0']", ...]`.
    fn instances(&self, root: &str) -> Vec<String> {
        let Some(list) = xpath::node_name(root) else {
            return vec![];
        };
        let root = xpath::schema_path(root);
        self.records()
            .filter_map(|change| xpath::list_entry_path(&change.path, list))
            .filter(|entry| xpath::schema_path(entry) == root)
            .map(xpath::normalize)
            .unique()
            .collect()
    }
}

// ===== impl ChangeOp =====

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeOp::Created => write!(f, "created"),
            ChangeOp::Modified => write!(f, "modified"),
            ChangeOp::Deleted => write!(f, "deleted"),
            ChangeOp::Moved => write!(f, "moved"),
        }
    }
}

// ===== impl ChangeRecord =====

impl ChangeRecord {
    pub fn created(path: impl Into<String>, value: impl Into<String>) -> Self {
        ChangeRecord {
            path: path.into(),
            operation: ChangeOp::Created,
            previous_value: None,
            value: Some(value.into()),
        }
    }

    pub fn modified(
        path: impl Into<String>,
        previous_value: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        ChangeRecord {
            path: path.into(),
            operation: ChangeOp::Modified,
            previous_value: Some(previous_value.into()),
            value: Some(value.into()),
        }
    }

    pub fn deleted(
        path: impl Into<String>,
        previous_value: impl Into<String>,
    ) -> Self {
        ChangeRecord {
            path: path.into(),
            operation: ChangeOp::Deleted,
            previous_value: Some(previous_value.into()),
            value: None,
        }
    }

    pub fn moved(path: impl Into<String>, value: impl Into<String>) -> Self {
        ChangeRecord {
            path: path.into(),
            operation: ChangeOp::Moved,
            previous_value: None,
            value: Some(value.into()),
        }
    }

    // Returns the value that describes the record's target state: the new
    // value, or the last known one for deletions.
    pub fn effective_value(&self) -> Option<&str> {
        match self.operation {
            ChangeOp::Deleted => self.previous_value.as_deref(),
            _ => self.value.as_deref(),
        }
    }

    // Returns the path of the object this leaf belongs to.
    pub fn object_path(&self) -> &str {
        xpath::parent(&self.path).unwrap_or(&self.path)
    }
}

impl TryFrom<ChangeRecordDef> for ChangeRecord {
    type Error = String;

    fn try_from(def: ChangeRecordDef) -> Result<Self, Self::Error> {
        match def.operation {
            ChangeOp::Created if def.previous_value.is_some() => {
                return Err(format!(
                    "{}: created record carries a previous value",
                    def.path
                ));
            }
            ChangeOp::Deleted if def.value.is_some() => {
                return Err(format!(
                    "{}: deleted record carries a value",
                    def.path
                ));
            }
            _ => (),
        }

        Ok(ChangeRecord {
            path: def.path,
            operation: def.operation,
            previous_value: def.previous_value,
            value: def.value,
        })
    }
}

// ===== impl ChangeSet =====

impl ChangeSet {
    pub fn new(changes: Vec<ChangeRecord>) -> ChangeSet {
        ChangeSet { changes }
    }

    pub fn push(&mut self, change: ChangeRecord) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl ChangeSource for ChangeSet {
    fn records<'a>(&'a self) -> Box<dyn Iterator<Item = &'a ChangeRecord> + 'a> {
        Box::new(self.changes.iter())
    }
}

impl FromIterator<ChangeRecord> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ChangeRecord>>(iter: I) -> Self {
        ChangeSet::new(iter.into_iter().collect())
    }
}
