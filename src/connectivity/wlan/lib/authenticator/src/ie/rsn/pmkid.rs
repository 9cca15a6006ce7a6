// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::rsne::Error;
use anyhow::ensure;
use std::convert::TryInto;

pub const PMKID_LEN: usize = 16;

pub type Pmkid = [u8; PMKID_LEN];

pub fn new(pmkid: &[u8]) -> Result<Pmkid, anyhow::Error> {
    ensure!(pmkid.len() == PMKID_LEN, Error::InvalidPmkidLength(pmkid.len()));
    Ok(pmkid.try_into()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmkid_length_enforced() {
        assert!(new(&[0u8; 16][..]).is_ok());
        assert!(new(&[0u8; 15][..]).is_err());
    }
}
