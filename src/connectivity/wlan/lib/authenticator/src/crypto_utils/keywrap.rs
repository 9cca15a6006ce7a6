// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! NIST AES Key Wrap (RFC 3394) as used for EAPOL-Key key data and FT RRB bodies.

use crate::Error;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, NewBlockCipher};
use aes::{Aes128, Aes256};
use std::convert::TryInto;

const IV: u64 = 0xA6A6_A6A6_A6A6_A6A6;
const SEMIBLOCK: usize = 8;

enum Kek {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl Kek {
    fn new(kek: &[u8]) -> Result<Self, Error> {
        match kek.len() {
            16 => Aes128::new_from_slice(kek)
                .map(Kek::Aes128)
                .map_err(|_| Error::InvalidKekLength(kek.len())),
            32 => Aes256::new_from_slice(kek)
                .map(Kek::Aes256)
                .map_err(|_| Error::InvalidKekLength(kek.len())),
            n => Err(Error::InvalidKekLength(n)),
        }
    }

    fn encrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Kek::Aes128(c) => c.encrypt_block(block),
            Kek::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Kek::Aes128(c) => c.decrypt_block(block),
            Kek::Aes256(c) => c.decrypt_block(block),
        }
    }
}

fn semiblocks(data: &[u8]) -> Vec<[u8; SEMIBLOCK]> {
    data.chunks_exact(SEMIBLOCK)
        .map(|c| {
            let mut block = [0u8; SEMIBLOCK];
            block.copy_from_slice(c);
            block
        })
        .collect()
}

fn read_u64(bytes: &[u8]) -> u64 {
    // Callers always pass exactly eight bytes.
    u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8]))
}

/// Wraps `data`, which must be a multiple of 8 octets and at least 16 octets long.
pub fn wrap(kek: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() < 2 * SEMIBLOCK || data.len() % SEMIBLOCK != 0 {
        return Err(Error::InvalidKeyWrapInput(data.len()));
    }
    let kek = Kek::new(kek)?;
    let n = data.len() / SEMIBLOCK;
    let mut r = semiblocks(data);
    let mut a = IV;
    let mut b = [0u8; 16];
    for j in 0..6 {
        for i in 0..n {
            b[..8].copy_from_slice(&a.to_be_bytes()[..]);
            b[8..].copy_from_slice(&r[i][..]);
            kek.encrypt(&mut b);
            let t = (n * j + i + 1) as u64;
            a = read_u64(&b[..8]) ^ t;
            r[i].copy_from_slice(&b[8..]);
        }
    }
    let mut out = Vec::with_capacity(data.len() + SEMIBLOCK);
    out.extend_from_slice(&a.to_be_bytes()[..]);
    for block in r {
        out.extend_from_slice(&block[..]);
    }
    Ok(out)
}

/// Unwraps `data` and verifies the integrity check value.
pub fn unwrap(kek: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() < 3 * SEMIBLOCK || data.len() % SEMIBLOCK != 0 {
        return Err(Error::InvalidKeyWrapInput(data.len()));
    }
    let kek = Kek::new(kek)?;
    let n = data.len() / SEMIBLOCK - 1;
    let mut a = read_u64(&data[..SEMIBLOCK]);
    let mut r = semiblocks(&data[SEMIBLOCK..]);
    let mut b = [0u8; 16];
    for j in (0..6).rev() {
        for i in (0..n).rev() {
            let t = (n * j + i + 1) as u64;
            b[..8].copy_from_slice(&(a ^ t).to_be_bytes()[..]);
            b[8..].copy_from_slice(&r[i][..]);
            kek.decrypt(&mut b);
            a = read_u64(&b[..8]);
            r[i].copy_from_slice(&b[8..]);
        }
    }
    if a != IV {
        return Err(Error::KeyUnwrapFailed);
    }
    Ok(r.iter().flat_map(|block| block.iter().copied()).collect())
}
