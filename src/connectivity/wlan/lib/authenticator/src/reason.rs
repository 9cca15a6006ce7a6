// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct ReasonCode(pub u16);

/// IEEE Std 802.11-2020, 9.4.1.7
impl ReasonCode {
    // 0 Reserved
    pub const UNSPECIFIED_REASON: Self = Self(1);
    pub const INVALID_AUTHENTICATION: Self = Self(2);
    pub const LEAVING_NETWORK_DEAUTH: Self = Self(3);
    pub const REASON_INACTIVITY: Self = Self(4);
    pub const NO_MORE_STAS: Self = Self(5);
    pub const INVALID_CLASS2FRAME: Self = Self(6);
    pub const INVALID_CLASS3FRAME: Self = Self(7);
    pub const LEAVING_NETWORK_DISASSOC: Self = Self(8);
    pub const NOT_AUTHENTICATED: Self = Self(9);
    pub const UNACCEPTABLE_POWER_CAPABILITY: Self = Self(10);
    pub const UNACCEPTABLE_SUPPORTED_CHANNELS: Self = Self(11);
    pub const BSS_TRANSITION_DISASSOC: Self = Self(12);
    pub const REASON_INVALID_ELEMENT: Self = Self(13);
    pub const MIC_FAILURE: Self = Self(14);
    pub const FOURWAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const GK_HANDSHAKE_TIMEOUT: Self = Self(16);
    pub const HANDSHAKE_ELEMENT_MISMATCH: Self = Self(17);
    pub const REASON_INVALID_GROUP_CIPHER: Self = Self(18);
    pub const REASON_INVALID_PAIRWISE_CIPHER: Self = Self(19);
    pub const REASON_INVALID_AKMP: Self = Self(20);
    pub const UNSUPPORTED_RSNE_VERSION: Self = Self(21);
    pub const INVALID_RSNE_CAPABILITIES: Self = Self(22);
    pub const IEEE802_1_X_AUTH_FAILED: Self = Self(23);
    pub const REASON_CIPHER_OUT_OF_POLICY: Self = Self(24);
    // 25 - 33 not used by key management.
    pub const STA_LEAVING: Self = Self(36);
    pub const TIMEOUT: Self = Self(39);
    pub const PEER_INITIATED: Self = Self(46);
    pub const AP_INITIATED: Self = Self(47);
    pub const REASON_INVALID_PMKID: Self = Self(49);
    pub const REASON_INVALID_MDE: Self = Self(50);
    pub const REASON_INVALID_FTE: Self = Self(51);
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct StatusCode(pub u16);

/// IEEE Std 802.11-2020, 9.4.1.9, Table 9-50
impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const REFUSED_REASON_UNSPECIFIED: Self = Self(1);
    pub const ROBUST_MGMT_POLICY_VIOLATION: Self = Self(31);
    pub const INVALID_ELEMENT: Self = Self(40);
    pub const INVALID_GROUP_CIPHER: Self = Self(41);
    pub const INVALID_PAIRWISE_CIPHER: Self = Self(42);
    pub const INVALID_AKMP: Self = Self(43);
    pub const UNSUPPORTED_RSNE_VERSION: Self = Self(44);
    pub const INVALID_RSNE_CAPABILITIES: Self = Self(45);
    pub const CIPHER_OUT_OF_POLICY: Self = Self(46);
    pub const INVALID_PMKID: Self = Self(53);
    pub const INVALID_MDE: Self = Self(54);
    pub const INVALID_FTE: Self = Self(55);
}
