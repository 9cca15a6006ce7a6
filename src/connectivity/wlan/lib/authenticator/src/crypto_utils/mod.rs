// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod keywrap;
pub mod nonce;

use crate::ie::rsn::akm::Akm;
use crate::ie::rsn::pmkid::{Pmkid, PMKID_LEN};
use crate::mac::MacAddr;
use crate::Error;
use hmac::{Hmac, Mac, NewMac};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;

const SHA1_OUTPUT_BITS: usize = 160;

/// IEEE Std 802.11-2020, 12.7.1.2
/// PRF-n built on HMAC-SHA-1. `bits` must be a multiple of 8.
pub fn prf(k: &[u8], a: &str, b: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    if bits % 8 != 0 || bits == 0 {
        return Err(Error::InvalidBitSize(bits));
    }
    let iterations = (bits + SHA1_OUTPUT_BITS - 1) / SHA1_OUTPUT_BITS;
    let mut result = Vec::with_capacity(iterations * SHA1_OUTPUT_BITS / 8);
    for i in 0..iterations {
        let mut hmac =
            HmacSha1::new_from_slice(k).map_err(|_| Error::InvalidKeyLength(k.len(), "PRF"))?;
        hmac.update(a.as_bytes());
        hmac.update(&[0u8]);
        hmac.update(b);
        hmac.update(&[i as u8]);
        result.extend_from_slice(&hmac.finalize().into_bytes()[..]);
    }
    result.truncate(bits / 8);
    Ok(result)
}

/// IEEE Std 802.11-2020, 12.7.1.6.2
/// KDF-Hash-Length built on HMAC-SHA-256. `bits` must be a multiple of 8.
pub fn kdf_sha256(k: &[u8], label: &str, context: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    kdf::<HmacSha256>(k, label, context, bits)
}

/// KDF-Hash-Length built on HMAC-SHA-384, used by the Suite B 192-bit AKM.
pub fn kdf_sha384(k: &[u8], label: &str, context: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    kdf::<HmacSha384>(k, label, context, bits)
}

fn kdf<M: Mac + NewMac>(k: &[u8], label: &str, context: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    if bits % 8 != 0 || bits == 0 || bits > u16::max_value() as usize {
        return Err(Error::InvalidBitSize(bits));
    }
    let len = bits / 8;
    let mut result = Vec::with_capacity(len);
    let mut i: u16 = 1;
    while result.len() < len {
        let mut hmac =
            M::new_from_slice(k).map_err(|_| Error::InvalidKeyLength(k.len(), "KDF"))?;
        hmac.update(&i.to_le_bytes()[..]);
        hmac.update(label.as_bytes());
        hmac.update(context);
        hmac.update(&(bits as u16).to_le_bytes()[..]);
        result.extend_from_slice(&hmac.finalize().into_bytes()[..]);
        i += 1;
    }
    result.truncate(len);
    Ok(result)
}

/// Truncate-128(SHA-256(parts...)), used to name FT keys.
pub fn sha256_128(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

/// IEEE Std 802.11-2020, 12.7.1.3
/// PMKID = Truncate-128(HMAC-Hash(PMK, "PMK Name" || AA || SPA))
/// The Suite B 192-bit AKM names its PMKSA with the KCK, which this cache does not hold.
pub fn pmkid(pmk: &[u8], aa: &MacAddr, spa: &MacAddr, akm: &Akm) -> Result<Pmkid, Error> {
    if akm.uses_sha384() {
        return Err(Error::UnsupportedAkm(*akm));
    }
    let mut out = [0u8; PMKID_LEN];
    if akm.uses_sha256() {
        let mut hmac = HmacSha256::new_from_slice(pmk)
            .map_err(|_| Error::InvalidKeyLength(pmk.len(), "PMKID"))?;
        hmac.update(b"PMK Name");
        hmac.update(&aa[..]);
        hmac.update(&spa[..]);
        out.copy_from_slice(&hmac.finalize().into_bytes()[..PMKID_LEN]);
    } else {
        let mut hmac = HmacSha1::new_from_slice(pmk)
            .map_err(|_| Error::InvalidKeyLength(pmk.len(), "PMKID"))?;
        hmac.update(b"PMK Name");
        hmac.update(&aa[..]);
        hmac.update(&spa[..]);
        out.copy_from_slice(&hmac.finalize().into_bytes()[..PMKID_LEN]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::rsn::akm;

    // IEEE Std 802.11-2016, J.3.2, Test case 1
    #[test]
    fn prf_test_case_1() {
        let key = [0x0b; 20];
        let data = "Hi There".as_bytes();
        let actual = prf(&key[..], "prefix", data, 512).expect("PRF");
        let expected = hex::decode(
            "bcd4c650b30b9684951829e0d75f9d54b862175ed9f00606e17d8da35402ffee75df78c3d31e0f889f012120c0862beb67753e7439ae242edb8373698356cf5a",
        )
        .expect("valid hex");
        assert_eq!(actual, expected);
    }

    #[test]
    fn prf_truncates_to_requested_length() {
        let key = [0x0b; 20];
        let long = prf(&key[..], "prefix", b"data", 512).expect("PRF");
        let short = prf(&key[..], "prefix", b"data", 384).expect("PRF");
        assert_eq!(short.len(), 48);
        assert_eq!(&long[..48], &short[..]);
    }

    #[test]
    fn invalid_bit_sizes() {
        assert!(prf(&[1u8; 16][..], "x", b"", 0).is_err());
        assert!(prf(&[1u8; 16][..], "x", b"", 7).is_err());
        assert!(kdf_sha256(&[1u8; 16][..], "x", b"", 65).is_err());
    }

    #[test]
    fn kdf_sha256_lengths() {
        let key = [7u8; 32];
        let a = kdf_sha256(&key[..], "label", b"context", 256).expect("KDF");
        let b = kdf_sha256(&key[..], "label", b"context", 384).expect("KDF");
        assert_eq!(a.len(), 32);
        assert_eq!(b.len(), 48);
        // The encoded length differs so the prefixes differ too.
        assert_ne!(&a[..], &b[..32]);
    }

    #[test]
    fn kdf_sha256_is_deterministic() {
        let key = [3u8; 32];
        assert_eq!(
            kdf_sha256(&key[..], "FT-R1", b"ctx", 256).expect("KDF"),
            kdf_sha256(&key[..], "FT-R1", b"ctx", 256).expect("KDF")
        );
    }

    #[test]
    fn kdf_sha384_lengths() {
        let key = [7u8; 48];
        let ptk = kdf_sha384(&key[..], "Pairwise key expansion", b"context", 704).expect("KDF");
        assert_eq!(ptk.len(), 88);
        let sha256 = kdf_sha256(&key[..], "Pairwise key expansion", b"context", 704).expect("KDF");
        assert_ne!(ptk, sha256);
    }

    #[test]
    fn suite_b_192_has_no_pmk_based_pmkid() {
        let akm = Akm::new_dot11(akm::EAP_SUITEB_SHA384);
        assert!(pmkid(&[1u8; 48][..], &[2u8; 6], &[3u8; 6], &akm).is_err());
    }

    #[test]
    fn pmkid_depends_on_akm_hash() {
        let pmk = [1u8; 32];
        let aa = [2u8; 6];
        let spa = [3u8; 6];
        let sha1 = pmkid(&pmk[..], &aa, &spa, &Akm::new_dot11(akm::PSK)).expect("PMKID");
        let sha256 = pmkid(&pmk[..], &aa, &spa, &Akm::new_dot11(akm::PSK_SHA256)).expect("PMKID");
        assert_ne!(sha1, sha256);
        let swapped = pmkid(&pmk[..], &spa, &aa, &Akm::new_dot11(akm::PSK)).expect("PMKID");
        assert_ne!(sha1, swapped);
    }
}
