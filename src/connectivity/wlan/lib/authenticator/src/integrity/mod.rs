// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::ie::rsn::akm::{self, Akm};
use crate::Error;
use aes::Aes128;
use cmac::Cmac;
use hmac::{Hmac, Mac, NewMac};
use sha1::Sha1;
use sha2::Sha384;
use subtle::ConstantTimeEq;

pub trait Algorithm {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool;
    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
}

fn truncated_eq(mic: Result<Vec<u8>, Error>, expected: &[u8]) -> bool {
    mic.map_or(false, |mic| mic[..].ct_eq(expected).into())
}

/// HMAC-SHA1-128, key descriptor version 2.
pub struct HmacSha1;

impl Algorithm for HmacSha1 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        truncated_eq(self.compute(key, data), expected)
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut hmac = Hmac::<Sha1>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength(key.len(), "HMAC-SHA1"))?;
        hmac.update(data);
        let mut mic = hmac.finalize().into_bytes().to_vec();
        mic.truncate(16);
        Ok(mic)
    }
}

/// AES-128-CMAC, key descriptor version 3 and the SAE AKMs.
pub struct CmacAes128;

impl CmacAes128 {
    fn mac(key: &[u8], data: &[u8]) -> Result<Cmac<Aes128>, Error> {
        let mut cmac = Cmac::<Aes128>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength(key.len(), "AES-128-CMAC"))?;
        cmac.update(data);
        Ok(cmac)
    }
}

impl Algorithm for CmacAes128 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        Self::mac(key, data).map_or(false, |cmac| cmac.verify(expected).is_ok())
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(Self::mac(key, data)?.finalize().into_bytes().to_vec())
    }
}

/// HMAC-SHA-384 truncated to 192 bits, Suite B 192-bit.
pub struct HmacSha384;

impl Algorithm for HmacSha384 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        truncated_eq(self.compute(key, data), expected)
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut hmac = Hmac::<Sha384>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength(key.len(), "HMAC-SHA384"))?;
        hmac.update(data);
        let mut mic = hmac.finalize().into_bytes().to_vec();
        mic.truncate(24);
        Ok(mic)
    }
}

pub fn integrity_algorithm(akm: &Akm) -> Option<Box<dyn Algorithm>> {
    if akm.uses_sha384() {
        return Some(Box::new(HmacSha384));
    }
    // IEEE Std 802.11-2020, 12.7.3, Table 12-11
    match akm.key_descriptor_version()? {
        akm::KEY_DESCRIPTOR_VERSION_HMAC_SHA1_AES => Some(Box::new(HmacSha1)),
        akm::KEY_DESCRIPTOR_VERSION_AES_CMAC | akm::KEY_DESCRIPTOR_VERSION_AKM_DEFINED => {
            Some(Box::new(CmacAes128))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4493, Example 2
    #[test]
    fn cmac_rfc4493_example_2() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").expect("hex");
        let msg = hex::decode("6bc1bee22e409f96e93d7e117393172a").expect("hex");
        let mic = CmacAes128.compute(&key[..], &msg[..]).expect("CMAC");
        assert_eq!(mic, hex::decode("070a16b46b4d4144f79bdd9dd04a287c").expect("hex"));
        assert!(CmacAes128.verify(&key[..], &msg[..], &mic[..]));
    }

    // RFC 2202, test case 2, truncated to 128 bits.
    #[test]
    fn hmac_sha1_rfc2202_test_case_2() {
        let mic = HmacSha1.compute(b"Jefe", b"what do ya want for nothing?").expect("HMAC");
        assert_eq!(mic, hex::decode("effcdf6ae5eb2fa2d27416d5f184df9c").expect("hex"));
    }

    #[test]
    fn verify_rejects_wrong_mic() {
        let key = [1u8; 16];
        let mut mic = HmacSha1.compute(&key[..], b"data").expect("HMAC");
        mic[0] ^= 1;
        assert!(!HmacSha1.verify(&key[..], b"data", &mic[..]));
        assert!(!HmacSha1.verify(&key[..], b"data", &mic[..8]));
    }

    #[test]
    fn cmac_verify_rejects_wrong_or_short_mic() {
        let key = [2u8; 16];
        let mut mic = CmacAes128.compute(&key[..], b"data").expect("CMAC");
        assert!(CmacAes128.verify(&key[..], b"data", &mic[..]));
        assert!(!CmacAes128.verify(&key[..], b"data", &mic[..15]));
        mic[15] ^= 0x80;
        assert!(!CmacAes128.verify(&key[..], b"data", &mic[..]));
    }

    // RFC 4231, test case 2, truncated to 192 bits.
    #[test]
    fn hmac_sha384_rfc4231_test_case_2() {
        let mic = HmacSha384.compute(b"Jefe", b"what do ya want for nothing?").expect("HMAC");
        assert_eq!(
            mic,
            hex::decode("af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47").expect("hex")
        );
        assert!(HmacSha384.verify(b"Jefe", b"what do ya want for nothing?", &mic[..]));
        assert!(!HmacSha384.verify(b"Jefe", b"what do ya want for nothing?", &mic[..16]));
    }

    #[test]
    fn algorithm_per_akm() {
        assert!(integrity_algorithm(&Akm::new_dot11(akm::PSK)).is_some());
        assert!(integrity_algorithm(&Akm::new_dot11(akm::SAE)).is_some());
        assert!(integrity_algorithm(&Akm::new_dot11(akm::EAP_SUITEB_SHA384)).is_some());
        assert!(integrity_algorithm(&Akm::new_dot11(akm::EAP_SUITEB)).is_none());
    }
}
