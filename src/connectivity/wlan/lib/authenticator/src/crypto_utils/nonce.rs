// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::prf;
use crate::mac::MacAddr;
use crate::Error;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

pub const NONCE_LEN: usize = 32;

pub type Nonce = [u8; NONCE_LEN];

/// Fills a fresh nonce from the system RNG.
pub fn random_nonce() -> Nonce {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce[..]);
    nonce
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes[..]);
    bytes
}

/// The 256 bit global key counter of IEEE Std 802.11-2020, 12.7.5.
/// Every call to `next()` yields the current value and advances the counter.
#[derive(Clone, PartialEq, Eq)]
pub struct NonceReader {
    counter: Nonce,
}

impl std::fmt::Debug for NonceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NonceReader")
    }
}

impl NonceReader {
    /// Counter = PRF-256(Random number, "Init Counter", Local MAC Address || Time)
    pub fn new(addr: &MacAddr) -> Result<NonceReader, Error> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut data = addr.to_vec();
        data.extend_from_slice(&time.to_be_bytes()[..]);
        let key = random_bytes(NONCE_LEN);
        let init = prf(&key[..], "Init Counter", &data[..], NONCE_LEN * 8)?;
        let mut counter = [0u8; NONCE_LEN];
        counter.copy_from_slice(&init[..]);
        Ok(NonceReader { counter })
    }

    #[cfg(test)]
    pub fn from_counter(counter: Nonce) -> NonceReader {
        NonceReader { counter }
    }

    pub fn next(&mut self) -> Nonce {
        let current = self.counter;
        for byte in self.counter.iter_mut().rev() {
            let (value, overflow) = byte.overflowing_add(1);
            *byte = value;
            if !overflow {
                break;
            }
        }
        current
    }
}
