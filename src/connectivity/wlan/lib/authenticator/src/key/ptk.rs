// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::nonce::Nonce;
use crate::crypto_utils::{kdf_sha256, kdf_sha384, prf};
use crate::ie::rsn::akm::Akm;
use crate::ie::rsn::cipher::Cipher;
use crate::mac::MacAddr;
use crate::Error;
use std::cmp::{max, min};
use std::fmt;

/// A PTK is derived from a PMK and provides access to the PTK's key-hierarchy which is the KCK,
/// KEK, and the TK.
#[derive(Clone, PartialEq, Eq)]
pub struct Ptk {
    ptk: Vec<u8>,
    kck_len: usize,
    kek_len: usize,
    tk_len: usize,
    pub akm: Akm,
    pub cipher: Cipher,
}

impl fmt::Debug for Ptk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ptk").field("akm", &self.akm).field("cipher", &self.cipher).finish()
    }
}

fn lengths(akm: &Akm, cipher: &Cipher) -> Result<(usize, usize, usize), Error> {
    let kck_len = akm.kck_bytes().ok_or(Error::UnsupportedAkm(*akm))? as usize;
    let kek_len = akm.kek_bytes().ok_or(Error::UnsupportedAkm(*akm))? as usize;
    let tk_len = cipher.tk_bytes().ok_or(Error::UnsupportedCipher(*cipher))?;
    Ok((kck_len, kek_len, tk_len))
}

impl Ptk {
    // IEEE 802.11-2020, 12.7.1.3
    pub fn new(
        pmk: &[u8],
        aa: &MacAddr,
        spa: &MacAddr,
        anonce: &Nonce,
        snonce: &Nonce,
        akm: &Akm,
        cipher: &Cipher,
    ) -> Result<Ptk, Error> {
        let (kck_len, kek_len, tk_len) = lengths(akm, cipher)?;
        let bits = (kck_len + kek_len + tk_len) * 8;

        let mut data: Vec<u8> = Vec::with_capacity(2 * 6 + 2 * 32);
        data.extend_from_slice(&min(aa, spa)[..]);
        data.extend_from_slice(&max(aa, spa)[..]);
        data.extend_from_slice(&min(anonce, snonce)[..]);
        data.extend_from_slice(&max(anonce, snonce)[..]);

        let label = "Pairwise key expansion";
        let ptk = if akm.uses_sha384() {
            kdf_sha384(pmk, label, &data[..], bits)?
        } else if akm.uses_sha256() {
            kdf_sha256(pmk, label, &data[..], bits)?
        } else {
            prf(pmk, label, &data[..], bits)?
        };
        Ok(Ptk { ptk, kck_len, kek_len, tk_len, akm: *akm, cipher: *cipher })
    }

    // IEEE 802.11-2020, 12.7.1.7.5
    // PTK = KDF-Hash-Length(PMK-R1, "FT-PTK", SNonce || ANonce || BSSID || STA-ADDR)
    pub fn new_ft(
        pmk_r1: &[u8],
        bssid: &MacAddr,
        sta_addr: &MacAddr,
        anonce: &Nonce,
        snonce: &Nonce,
        akm: &Akm,
        cipher: &Cipher,
    ) -> Result<Ptk, Error> {
        let (kck_len, kek_len, tk_len) = lengths(akm, cipher)?;
        let bits = (kck_len + kek_len + tk_len) * 8;

        let mut data: Vec<u8> = Vec::with_capacity(2 * 32 + 2 * 6);
        data.extend_from_slice(&snonce[..]);
        data.extend_from_slice(&anonce[..]);
        data.extend_from_slice(&bssid[..]);
        data.extend_from_slice(&sta_addr[..]);

        let ptk = kdf_sha256(pmk_r1, "FT-PTK", &data[..], bits)?;
        Ok(Ptk { ptk, kck_len, kek_len, tk_len, akm: *akm, cipher: *cipher })
    }

    pub fn ptk(&self) -> &[u8] {
        &self.ptk[..]
    }

    pub fn kck(&self) -> &[u8] {
        &self.ptk[0..self.kck_len]
    }

    pub fn kek(&self) -> &[u8] {
        let start = self.kck_len;
        &self.ptk[start..start + self.kek_len]
    }

    pub fn tk(&self) -> &[u8] {
        let start = self.kck_len + self.kek_len;
        &self.ptk[start..start + self.tk_len]
    }
}
