// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::suite_selector::{self, Factory, Known};
use crate::organization::Oui;
use std::fmt;

// IEEE Std 802.11-2020, 9.4.2.24.3, Table 9-186
// 0 - Reserved.
pub const EAP: u8 = 1;
pub const PSK: u8 = 2;
pub const FT_EAP: u8 = 3;
pub const FT_PSK: u8 = 4;
pub const EAP_SHA256: u8 = 5;
pub const PSK_SHA256: u8 = 6;
pub const TDLS: u8 = 7;
pub const SAE: u8 = 8;
pub const FT_SAE: u8 = 9;
pub const AP_PEERKEY: u8 = 10;
pub const EAP_SUITEB: u8 = 11;
pub const EAP_SUITEB_SHA384: u8 = 12;
pub const FT_EAP_SHA384: u8 = 13;
// 14-255 - Reserved.

// Shorthands for the key descriptor versions an AKM implies.
// IEEE Std 802.11-2020, 12.7.2 b.1)
pub const KEY_DESCRIPTOR_VERSION_AKM_DEFINED: u16 = 0;
pub const KEY_DESCRIPTOR_VERSION_HMAC_SHA1_AES: u16 = 2;
pub const KEY_DESCRIPTOR_VERSION_AES_CMAC: u16 = 3;

#[derive(PartialOrd, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Akm {
    pub oui: Oui,
    pub suite_type: u8,
}

impl Akm {
    pub fn new_dot11(suite_type: u8) -> Self {
        Akm { oui: suite_selector::OUI, suite_type }
    }

    /// Maps the WPA1 vendor selectors (EAP and PSK) onto their RSN equivalent.
    pub fn normalized(&self) -> Self {
        if self.oui == Oui::MSFT {
            Akm::new_dot11(self.suite_type)
        } else {
            *self
        }
    }

    fn dot11_type(&self) -> Option<u8> {
        if self.oui == suite_selector::OUI {
            Some(self.suite_type)
        } else if self.oui == Oui::MSFT && (self.suite_type == EAP || self.suite_type == PSK) {
            Some(self.suite_type)
        } else {
            None
        }
    }

    pub fn is_ft(&self) -> bool {
        matches!(self.dot11_type(), Some(FT_EAP) | Some(FT_PSK) | Some(FT_SAE))
    }

    /// AKMs for which the PMK is a pre-shared key rather than the result of an authentication.
    pub fn is_psk(&self) -> bool {
        matches!(self.dot11_type(), Some(PSK) | Some(FT_PSK) | Some(PSK_SHA256))
    }

    pub fn is_sae(&self) -> bool {
        matches!(self.dot11_type(), Some(SAE) | Some(FT_SAE))
    }

    pub fn is_ieee8021x(&self) -> bool {
        matches!(
            self.dot11_type(),
            Some(EAP) | Some(FT_EAP) | Some(EAP_SHA256) | Some(EAP_SUITEB_SHA384)
        )
    }

    /// Whether the AKM's key hierarchy uses the SHA-256 based KDF rather than the SHA-1 PRF.
    pub fn uses_sha256(&self) -> bool {
        matches!(
            self.dot11_type(),
            Some(FT_EAP) | Some(FT_PSK) | Some(EAP_SHA256) | Some(PSK_SHA256) | Some(SAE)
                | Some(FT_SAE)
        )
    }

    /// Suite B 192-bit: SHA-384 KDF and HMAC-SHA-384 MIC.
    pub fn uses_sha384(&self) -> bool {
        self.dot11_type() == Some(EAP_SUITEB_SHA384)
    }

    pub fn is_supported(&self) -> bool {
        self.mic_bytes().is_some()
    }

    /// IEEE Std 802.11-2020, 12.7.3, Table 12-11
    pub fn mic_bytes(&self) -> Option<u16> {
        match self.dot11_type()? {
            EAP | PSK | FT_EAP | FT_PSK | EAP_SHA256 | PSK_SHA256 | SAE | FT_SAE => Some(16),
            EAP_SUITEB_SHA384 => Some(24),
            _ => None,
        }
    }

    pub fn kck_bytes(&self) -> Option<u16> {
        self.mic_bytes()
    }

    pub fn kek_bytes(&self) -> Option<u16> {
        match self.mic_bytes()? {
            24 => Some(32),
            _ => Some(16),
        }
    }

    pub fn key_descriptor_version(&self) -> Option<u16> {
        match self.dot11_type()? {
            EAP | PSK => Some(KEY_DESCRIPTOR_VERSION_HMAC_SHA1_AES),
            FT_EAP | FT_PSK | EAP_SHA256 | PSK_SHA256 => Some(KEY_DESCRIPTOR_VERSION_AES_CMAC),
            SAE | FT_SAE | EAP_SUITEB_SHA384 => Some(KEY_DESCRIPTOR_VERSION_AKM_DEFINED),
            _ => None,
        }
    }

    /// Preference rank used to pick one AKM out of several acceptable ones. Lower is preferred.
    pub fn preference(&self) -> u8 {
        match self.dot11_type() {
            Some(FT_EAP) => 0,
            Some(FT_SAE) => 1,
            Some(FT_PSK) => 2,
            Some(EAP_SUITEB_SHA384) => 3,
            Some(SAE) => 4,
            Some(EAP_SHA256) => 5,
            Some(PSK_SHA256) => 6,
            Some(EAP) => 7,
            Some(PSK) => 8,
            _ => u8::max_value(),
        }
    }
}

impl Factory for Akm {
    type Suite = Akm;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite {
        Akm { oui, suite_type }
    }
}

impl Known for Akm {
    fn oui(&self) -> Oui {
        self.oui
    }

    fn suite_type(&self) -> u8 {
        self.suite_type
    }
}

impl fmt::Debug for Akm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.dot11_type() {
            Some(EAP) => "802.1X",
            Some(PSK) => "PSK",
            Some(FT_EAP) => "FT-802.1X",
            Some(FT_PSK) => "FT-PSK",
            Some(EAP_SHA256) => "802.1X-SHA256",
            Some(PSK_SHA256) => "PSK-SHA256",
            Some(TDLS) => "TDLS",
            Some(SAE) => "SAE",
            Some(FT_SAE) => "FT-SAE",
            Some(AP_PEERKEY) => "AP-PEERKEY",
            Some(EAP_SUITEB) => "802.1X-SUITE-B",
            Some(EAP_SUITEB_SHA384) => "802.1X-SUITE-B-192",
            Some(FT_EAP_SHA384) => "FT-802.1X-SHA384",
            _ => return write!(f, "{:?}:{}", self.oui, self.suite_type),
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ft_akms() {
        assert!(Akm::new_dot11(FT_PSK).is_ft());
        assert!(Akm::new_dot11(FT_SAE).is_ft());
        assert!(!Akm::new_dot11(PSK).is_ft());
        assert!(!Akm { oui: Oui::MSFT, suite_type: FT_PSK }.is_ft());
    }

    #[test]
    fn descriptor_versions() {
        assert_eq!(Akm::new_dot11(PSK).key_descriptor_version(), Some(2));
        assert_eq!(Akm::new_dot11(FT_PSK).key_descriptor_version(), Some(3));
        assert_eq!(Akm::new_dot11(SAE).key_descriptor_version(), Some(0));
        assert_eq!(Akm { oui: Oui::MSFT, suite_type: PSK }.key_descriptor_version(), Some(2));
        assert_eq!(Akm::new_dot11(EAP_SUITEB_SHA384).key_descriptor_version(), Some(0));
        assert_eq!(Akm::new_dot11(EAP_SUITEB).key_descriptor_version(), None);
    }

    #[test]
    fn unsupported_akm_has_no_mic() {
        assert_eq!(Akm::new_dot11(TDLS).mic_bytes(), None);
        assert!(!Akm::new_dot11(FT_EAP_SHA384).is_supported());
        assert_eq!(Akm::new_dot11(PSK_SHA256).mic_bytes(), Some(16));
    }

    #[test]
    fn suite_b_192_key_lengths() {
        let akm = Akm::new_dot11(EAP_SUITEB_SHA384);
        assert!(akm.uses_sha384());
        assert!(!akm.uses_sha256());
        assert_eq!(akm.mic_bytes(), Some(24));
        assert_eq!(akm.kck_bytes(), Some(24));
        assert_eq!(akm.kek_bytes(), Some(32));
        assert_eq!(Akm::new_dot11(PSK).kek_bytes(), Some(16));
    }

    #[test]
    fn preference_orders_ft_first() {
        let mut akms = vec![Akm::new_dot11(PSK), Akm::new_dot11(FT_PSK), Akm::new_dot11(SAE)];
        akms.sort_by_key(|a| a.preference());
        assert_eq!(akms[0], Akm::new_dot11(FT_PSK));
        assert_eq!(akms[2], Akm::new_dot11(PSK));
    }
}
