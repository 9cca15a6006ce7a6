// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::ops::Deref;

/// An Organizationally Unique Identifier as carried in suite selectors, KDEs and vendor IEs.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oui([u8; 3]);

impl Oui {
    pub const DOT11: Self = Self([0x00, 0x0F, 0xAC]);
    pub const MSFT: Self = Self([0x00, 0x50, 0xF2]);
    pub const WFA: Self = Self([0x50, 0x6F, 0x9A]);

    pub const fn new(oui: [u8; 3]) -> Self {
        Self(oui)
    }
}

impl Deref for Oui {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Oui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}-{:02X}-{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oui_as_slice() {
        assert_eq!(&Oui::DOT11[..], &[0x00, 0x0F, 0xAC][..]);
        assert_eq!(format!("{:?}", Oui::MSFT), "00-50-F2");
    }
}
