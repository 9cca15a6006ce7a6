// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::id;

// IEEE Std 802.11-2020, 9.4.2.241, Table 9-341
pub const PROTECTED_TWT: u8 = 4;
pub const SAE_H2E: u8 = 5;
pub const SAE_PK: u8 = 6;
pub const SECURE_LTF: u8 = 8;
pub const SECURE_RTT: u8 = 9;
pub const PROT_RANGE_NEG: u8 = 10;

/// RSN Extension element. The raw bytes are retained so that the copy carried in message 2 can
/// be compared bit for bit against the association request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rsnxe {
    bytes: Vec<u8>,
}

impl Rsnxe {
    /// Builds an element advertising the given capability bits.
    pub fn with_capabilities(bits: &[u8]) -> Self {
        let highest = bits.iter().copied().max().unwrap_or(0);
        let field_len = (highest as usize / 8) + 1;
        let mut field = vec![0u8; field_len];
        field[0] = (field_len - 1) as u8;
        for bit in bits {
            field[*bit as usize / 8] |= 1 << (*bit % 8);
        }
        let mut bytes = vec![id::RSNXE, field_len as u8];
        bytes.extend_from_slice(&field[..]);
        Rsnxe { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Capability field without the header.
    fn field(&self) -> &[u8] {
        &self.bytes[2..]
    }

    pub fn has_capability(&self, bit: u8) -> bool {
        // The low four bits of the first octet carry the field length and are never capabilities.
        if bit < 4 {
            return false;
        }
        let idx = bit as usize / 8;
        self.field().get(idx).map_or(false, |b| b & (1 << (bit % 8)) != 0)
    }

    pub fn sae_h2e(&self) -> bool {
        self.has_capability(SAE_H2E)
    }

    pub fn secure_ltf(&self) -> bool {
        self.has_capability(SECURE_LTF)
    }
}

/// Parses a complete RSNXE, header included.
pub fn from_bytes(data: &[u8]) -> Option<Rsnxe> {
    if data.len() < 3 || data[0] != id::RSNXE || data[1] as usize != data.len() - 2 {
        return None;
    }
    Some(Rsnxe { bytes: data.to_vec() })
}
