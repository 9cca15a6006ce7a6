// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod mde;
pub mod rsn;
pub mod rsnxe;
pub mod wpa;

pub use rsn::{akm, cipher, pmkid, rsne, suite_selector};

/// Element IDs used by key management.
/// IEEE Std 802.11-2020, 9.4.2.1, Table 9-92
pub mod id {
    pub const RSNE: u8 = 48;
    pub const MOBILITY_DOMAIN: u8 = 54;
    pub const FAST_BSS_TRANSITION: u8 = 55;
    pub const TIMEOUT_INTERVAL: u8 = 56;
    pub const VENDOR_SPECIFIC: u8 = 221;
    pub const RSNXE: u8 = 244;
}

/// Iterates over a chain of elements, yielding each element's ID and body.
/// Iteration ends at the first truncated element.
pub struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes }
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.len() < 2 {
            return None;
        }
        let body_len = self.bytes[1] as usize;
        if self.bytes.len() < 2 + body_len {
            self.bytes = &[];
            return None;
        }
        let id = self.bytes[0];
        let body = &self.bytes[2..2 + body_len];
        self.bytes = &self.bytes[2 + body_len..];
        Some((id, body))
    }
}

/// Returns the complete element, header included, of the first element with the given ID.
pub fn find_element(bytes: &[u8], element_id: u8) -> Option<&[u8]> {
    let mut offset = 0;
    for (id, body) in Reader::new(bytes) {
        let len = 2 + body.len();
        if id == element_id {
            return Some(&bytes[offset..offset + len]);
        }
        offset += len;
    }
    None
}
