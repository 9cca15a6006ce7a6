// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::ensure;
use hmac::Hmac;
use sha1::Sha1;
use std::convert::TryInto;
use thiserror::Error;

pub const PSK_LEN: usize = 32;
const ITERATIONS: u32 = 4096;

pub type Psk = [u8; PSK_LEN];

#[derive(Debug, Error)]
pub enum PskError {
    #[error("passphrase must be 8 to 63 printable ASCII characters, was {} bytes", _0)]
    InvalidPassphrase(usize),
    #[error("SSID must be at most 32 bytes, was {}", _0)]
    InvalidSsid(usize),
    #[error("PSK must be {} bytes, was {}", PSK_LEN, _0)]
    InvalidPskLength(usize),
}

/// IEEE Std 802.11-2020, J.4.1
/// PSK = PBKDF2(passphrase, SSID, 4096, 256)
pub fn compute(passphrase: &[u8], ssid: &[u8]) -> Result<Psk, anyhow::Error> {
    ensure!(
        passphrase.len() >= 8
            && passphrase.len() <= 63
            && passphrase.iter().all(|c| (32..=126).contains(c)),
        PskError::InvalidPassphrase(passphrase.len())
    );
    ensure!(ssid.len() <= 32, PskError::InvalidSsid(ssid.len()));

    let mut psk = [0u8; PSK_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha1>>(passphrase, ssid, ITERATIONS, &mut psk[..]);
    Ok(psk)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Psk, anyhow::Error> {
    ensure!(bytes.len() == PSK_LEN, PskError::InvalidPskLength(bytes.len()));
    Ok(bytes.try_into()?)
}
