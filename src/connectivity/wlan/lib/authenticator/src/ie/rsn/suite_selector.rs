// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::organization::Oui;

pub const OUI: Oui = Oui::DOT11;

/// Octets taken by a single suite selector.
pub const SUITE_SELECTOR_LEN: usize = 4;

pub trait Factory {
    type Suite;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite;
}

/// Suite selectors which map onto a fixed set of well known values in the IEEE 802.11 OUI.
pub trait Known {
    fn oui(&self) -> Oui;
    fn suite_type(&self) -> u8;

    fn to_bytes(&self) -> [u8; SUITE_SELECTOR_LEN] {
        let oui = self.oui();
        [oui[0], oui[1], oui[2], self.suite_type()]
    }
}
