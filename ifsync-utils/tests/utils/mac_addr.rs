//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use ifsync_utils::mac_addr::MacAddr;

#[test]
fn parse_and_display() {
    let mac = MacAddr::from_str("AA-bb-0c-dd-ee-01").unwrap();
    assert_eq!(mac.as_bytes(), [0xaa, 0xbb, 0x0c, 0xdd, 0xee, 0x01]);
    assert_eq!(mac.to_string(), "aa:bb:0c:dd:ee:01");
}

#[test]
fn parse_rejects_malformed() {
    for input in ["", "aa:bb:cc", "aa:bb:cc:dd:ee:gg", "aabbccddeeff", "aa:bb:cc:dd:ee:fff"] {
        assert!(MacAddr::from_str(input).is_err(), "{input}");
    }
}

#[test]
fn from_slice_requires_six_bytes() {
    assert!(MacAddr::from_slice(&[0; 6]).is_some());
    assert!(MacAddr::from_slice(&[0; 4]).is_none());
}
