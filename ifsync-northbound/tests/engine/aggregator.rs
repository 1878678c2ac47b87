//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_northbound::aggregator::FieldAggregator;
use ifsync_northbound::error::Error;

#[test]
fn slots_are_scoped_to_one_object() {
    let mut aggregator = FieldAggregator::default();
    aggregator.begin("/a[x='1']").unwrap();
    aggregator.set("plen", "24");
    assert_eq!(aggregator.require("plen"), Ok("24"));

    // Last write wins.
    aggregator.set("plen", "16");
    assert_eq!(aggregator.get("plen"), Some("16"));

    aggregator.end();
    assert!(!aggregator.is_open());

    aggregator.begin("/a[x='2']").unwrap();
    assert_eq!(
        aggregator.require("plen"),
        Err(Error::MissingField("/a[x='2']/plen".to_owned()))
    );
}

#[test]
fn begin_rejects_another_open_object() {
    let mut aggregator = FieldAggregator::default();
    aggregator.begin("/a[x='1']").unwrap();
    assert_eq!(
        aggregator.begin("/a[x='2']"),
        Err(Error::AggregationOpen("/a[x='1']".to_owned()))
    );

    // Reopening the same object resets it.
    aggregator.set("plen", "24");
    aggregator.begin("/a[x='1']").unwrap();
    assert_eq!(aggregator.get("plen"), None);
    assert_eq!(aggregator.key(), Some("/a[x='1']"));
}
