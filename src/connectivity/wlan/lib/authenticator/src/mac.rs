// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

pub type MacAddr = [u8; 6];

pub const BCAST_ADDR: MacAddr = [0xFF; 6];
pub const ZERO_ADDR: MacAddr = [0x00; 6];

/// Formats a MAC address as `aa:bb:cc:dd:ee:ff` in log lines.
pub struct MacFmt<'a>(pub &'a MacAddr);

impl fmt::Display for MacFmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a[0], a[1], a[2], a[3], a[4], a[5])
    }
}

impl fmt::Debug for MacFmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Parses `aa:bb:cc:dd:ee:ff` or a bare 12 digit hex string.
pub fn parse_mac_addr(s: &str) -> Option<MacAddr> {
    let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
    if digits.len() != 12 || !digits.is_ascii() {
        return None;
    }
    let mut addr = [0u8; 6];
    for (i, byte) in addr.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        let addr = parse_mac_addr("02:00:00:00:03:0a").expect("valid address");
        assert_eq!(addr, [0x02, 0, 0, 0, 0x03, 0x0a]);
        assert_eq!(format!("{}", MacFmt(&addr)), "02:00:00:00:03:0a");
        assert_eq!(parse_mac_addr("000102030405"), Some([0, 1, 2, 3, 4, 5]));
    }

    #[test]
    fn debug_matches_display() {
        let addr = [0x02, 0, 0, 0, 0x03, 0x0a];
        assert_eq!(format!("{:?}", MacFmt(&addr)), "02:00:00:00:03:0a");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_mac_addr("02:00:00"), None);
        assert_eq!(parse_mac_addr("zz:00:00:00:00:00"), None);
    }
}
