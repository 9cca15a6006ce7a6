// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::{kdf_sha256, sha256_128};
use crate::mac::MacAddr;
use crate::Error;
use std::convert::TryInto;

pub const PMK_R0_LEN: usize = 32;
pub const PMK_R1_LEN: usize = 32;
pub const KEY_NAME_LEN: usize = 16;

pub type PmkR0 = [u8; PMK_R0_LEN];
pub type PmkR1 = [u8; PMK_R1_LEN];
pub type PmkR0Name = [u8; KEY_NAME_LEN];
pub type PmkR1Name = [u8; KEY_NAME_LEN];

/// IEEE Std 802.11-2020, 12.7.1.7.3
///
/// R0-Key-Data = KDF-384(XXKey, "FT-R0",
///                       SSIDlength || SSID || MDID || R0KHlength || R0KH-ID || S0KH-ID)
/// PMK-R0 = L(R0-Key-Data, 0, 256)
/// PMK-R0Name-Salt = L(R0-Key-Data, 256, 128)
/// PMKR0Name = Truncate-128(SHA-256("FT-R0N" || PMK-R0Name-Salt))
pub fn derive_pmk_r0(
    xxkey: &[u8],
    ssid: &[u8],
    mdid: &[u8; 2],
    r0kh_id: &[u8],
    s0kh_id: &MacAddr,
) -> Result<(PmkR0, PmkR0Name), Error> {
    let mut context = Vec::with_capacity(1 + ssid.len() + 2 + 1 + r0kh_id.len() + 6);
    context.push(ssid.len() as u8);
    context.extend_from_slice(ssid);
    context.extend_from_slice(&mdid[..]);
    context.push(r0kh_id.len() as u8);
    context.extend_from_slice(r0kh_id);
    context.extend_from_slice(&s0kh_id[..]);

    let r0_key_data = kdf_sha256(xxkey, "FT-R0", &context[..], (PMK_R0_LEN + KEY_NAME_LEN) * 8)?;
    let pmk_r0: PmkR0 = r0_key_data[..PMK_R0_LEN]
        .try_into()
        .map_err(|_| Error::InvalidKeyLength(r0_key_data.len(), "PMK-R0"))?;
    let salt = &r0_key_data[PMK_R0_LEN..];
    let pmk_r0_name = sha256_128(&[&b"FT-R0N"[..], salt]);
    Ok((pmk_r0, pmk_r0_name))
}

/// PMKR1Name = Truncate-128(SHA-256("FT-R1N" || PMKR0Name || R1KH-ID || S1KH-ID))
pub fn pmk_r1_name(pmk_r0_name: &PmkR0Name, r1kh_id: &MacAddr, s1kh_id: &MacAddr) -> PmkR1Name {
    sha256_128(&[&b"FT-R1N"[..], &pmk_r0_name[..], &r1kh_id[..], &s1kh_id[..]])
}

/// IEEE Std 802.11-2020, 12.7.1.7.4
/// PMK-R1 = KDF-256(PMK-R0, "FT-R1", R1KH-ID || S1KH-ID)
pub fn derive_pmk_r1(
    pmk_r0: &PmkR0,
    pmk_r0_name: &PmkR0Name,
    r1kh_id: &MacAddr,
    s1kh_id: &MacAddr,
) -> Result<(PmkR1, PmkR1Name), Error> {
    let mut context = Vec::with_capacity(12);
    context.extend_from_slice(&r1kh_id[..]);
    context.extend_from_slice(&s1kh_id[..]);
    let key = kdf_sha256(&pmk_r0[..], "FT-R1", &context[..], PMK_R1_LEN * 8)?;
    let pmk_r1: PmkR1 =
        key[..].try_into().map_err(|_| Error::InvalidKeyLength(key.len(), "PMK-R1"))?;
    Ok((pmk_r1, pmk_r1_name(pmk_r0_name, r1kh_id, s1kh_id)))
}

/// XXKey for FT-PSK is the PSK. For 802.1X based AKMs it is the second 256 bits of the MSK.
pub fn xxkey_from_msk(msk: &[u8]) -> Option<&[u8]> {
    msk.get(32..64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSID: &[u8] = b"test-ft";
    const MDID: [u8; 2] = [0xa1, 0xb2];
    const R0KH_ID: &[u8] = b"nas1.w1.fi";
    const STA: MacAddr = [0x02, 0, 0, 0, 0x02, 0];
    const R1KH_A: MacAddr = [0x02, 0, 0, 0, 0x03, 0];
    const R1KH_B: MacAddr = [0x02, 0, 0, 0, 0x04, 0];

    #[test]
    fn pmk_r0_is_deterministic() {
        let (r0_a, name_a) = derive_pmk_r0(&[1; 32], SSID, &MDID, R0KH_ID, &STA).expect("PMK-R0");
        let (r0_b, name_b) = derive_pmk_r0(&[1; 32], SSID, &MDID, R0KH_ID, &STA).expect("PMK-R0");
        assert_eq!(r0_a, r0_b);
        assert_eq!(name_a, name_b);

        let (r0_c, name_c) =
            derive_pmk_r0(&[1; 32], SSID, &[0xa1, 0xb3], R0KH_ID, &STA).expect("PMK-R0");
        assert_ne!(r0_a, r0_c);
        assert_ne!(name_a, name_c);
    }

    #[test]
    fn pmk_r1_bound_to_r1kh() {
        let (r0, r0_name) = derive_pmk_r0(&[1; 32], SSID, &MDID, R0KH_ID, &STA).expect("PMK-R0");
        let (r1_a, r1_name_a) = derive_pmk_r1(&r0, &r0_name, &R1KH_A, &STA).expect("PMK-R1");
        let (r1_b, r1_name_b) = derive_pmk_r1(&r0, &r0_name, &R1KH_B, &STA).expect("PMK-R1");
        assert_ne!(r1_a, r1_b);
        assert_ne!(r1_name_a, r1_name_b);
        assert_eq!(r1_name_a, pmk_r1_name(&r0_name, &R1KH_A, &STA));
    }

    #[test]
    fn xxkey_of_msk() {
        let msk: Vec<u8> = (0..64).collect();
        assert_eq!(xxkey_from_msk(&msk[..]), Some(&msk[32..64]));
        assert_eq!(xxkey_from_msk(&msk[..40]), None);
    }
}
