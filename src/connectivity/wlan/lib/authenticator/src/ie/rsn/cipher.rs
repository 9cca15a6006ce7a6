// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::suite_selector::{self, Factory, Known};
use crate::organization::Oui;
use std::fmt;

// IEEE Std 802.11-2020, 9.4.2.24.2, Table 9-180
pub const GROUP_CIPHER_SUITE: u8 = 0;
pub const WEP_40: u8 = 1;
pub const TKIP: u8 = 2;
// 3 - Reserved.
pub const CCMP_128: u8 = 4;
pub const WEP_104: u8 = 5;
pub const BIP_CMAC_128: u8 = 6;
pub const GROUP_ADDRESSED_TRAFFIC_NOT_ALLOWED: u8 = 7;
pub const GCMP_128: u8 = 8;
pub const GCMP_256: u8 = 9;
pub const CCMP_256: u8 = 10;
pub const BIP_GMAC_128: u8 = 11;
pub const BIP_GMAC_256: u8 = 12;
pub const BIP_CMAC_256: u8 = 13;

#[derive(PartialOrd, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Cipher {
    pub oui: Oui,
    pub suite_type: u8,
}

impl Cipher {
    pub fn new_dot11(suite_type: u8) -> Self {
        Cipher { oui: suite_selector::OUI, suite_type }
    }

    /// Maps WPA1 vendor selectors onto their RSN equivalent. WPA1 uses the same suite type values
    /// under the Microsoft OUI.
    pub fn normalized(&self) -> Self {
        if self.oui == Oui::MSFT {
            Cipher::new_dot11(self.suite_type)
        } else {
            *self
        }
    }

    fn is_dot11(&self) -> bool {
        self.oui == suite_selector::OUI || self.oui == Oui::MSFT
    }

    /// Length of the temporal key in octets.
    /// IEEE Std 802.11-2020, 12.7.2, Table 12-8
    pub fn tk_bytes(&self) -> Option<usize> {
        if !self.is_dot11() {
            return None;
        }
        match self.suite_type {
            WEP_40 => Some(5),
            WEP_104 => Some(13),
            TKIP | GCMP_256 | CCMP_256 | BIP_GMAC_256 | BIP_CMAC_256 => Some(32),
            CCMP_128 | GCMP_128 | BIP_CMAC_128 | BIP_GMAC_128 => Some(16),
            _ => None,
        }
    }

    /// Whether the cipher may protect individually or group addressed data frames.
    pub fn is_data_cipher(&self) -> bool {
        self.is_dot11()
            && matches!(self.suite_type, TKIP | CCMP_128 | GCMP_128 | GCMP_256 | CCMP_256)
    }

    pub fn is_mgmt_group_cipher(&self) -> bool {
        self.oui == suite_selector::OUI
            && matches!(self.suite_type, BIP_CMAC_128 | BIP_GMAC_128 | BIP_GMAC_256 | BIP_CMAC_256)
    }

    pub fn is_tkip(&self) -> bool {
        self.is_dot11() && self.suite_type == TKIP
    }

    /// Preference rank used when several pairwise ciphers are acceptable. Lower is preferred.
    pub fn preference(&self) -> u8 {
        match self.suite_type {
            CCMP_256 => 0,
            GCMP_256 => 1,
            CCMP_128 => 2,
            GCMP_128 => 3,
            TKIP => 4,
            _ => u8::max_value(),
        }
    }
}

impl Factory for Cipher {
    type Suite = Cipher;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite {
        Cipher { oui, suite_type }
    }
}

impl Known for Cipher {
    fn oui(&self) -> Oui {
        self.oui
    }

    fn suite_type(&self) -> u8 {
        self.suite_type
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.is_dot11(), self.suite_type) {
            (true, GROUP_CIPHER_SUITE) => "GROUP",
            (true, WEP_40) => "WEP-40",
            (true, TKIP) => "TKIP",
            (true, CCMP_128) => "CCMP-128",
            (true, WEP_104) => "WEP-104",
            (true, BIP_CMAC_128) => "BIP-CMAC-128",
            (true, GCMP_128) => "GCMP-128",
            (true, GCMP_256) => "GCMP-256",
            (true, CCMP_256) => "CCMP-256",
            (true, BIP_GMAC_128) => "BIP-GMAC-128",
            (true, BIP_GMAC_256) => "BIP-GMAC-256",
            (true, BIP_CMAC_256) => "BIP-CMAC-256",
            _ => return write!(f, "{:?}:{}", self.oui, self.suite_type),
        };
        f.write_str(name)
    }
}
