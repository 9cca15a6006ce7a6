// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::kdf_sha256;
use crate::crypto_utils::nonce::{random_bytes, Nonce};
use crate::mac::MacAddr;
use crate::Error;

pub const GMK_LEN: usize = 32;

pub const GTK_LABEL: &str = "Group key expansion";
pub const IGTK_LABEL: &str = "IGTK key expansion";
pub const BIGTK_LABEL: &str = "BIGTK key expansion";

/// IEEE Std 802.11-2020, 12.7.1.5
/// Key = PRF(GMK, label, AA || GNonce), with fresh randomness mixed into the data so the key
/// does not depend solely on the GMK.
pub fn derive_group_key(
    gmk: &[u8],
    label: &str,
    aa: &MacAddr,
    gnonce: &Nonce,
    key_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut data = Vec::with_capacity(6 + gnonce.len() + key_len);
    data.extend_from_slice(&aa[..]);
    data.extend_from_slice(&gnonce[..]);
    data.extend_from_slice(&random_bytes(key_len)[..]);
    kdf_sha256(gmk, label, &data[..], key_len * 8)
}
