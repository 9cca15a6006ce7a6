// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::id;
use crate::appendable::{Appendable, BufferTooSmall};
use bitfield::bitfield;

pub const MDID_LEN: usize = 2;
const BODY_LEN: usize = 3;

bitfield! {
    /// IEEE Std 802.11-2020, 9.4.2.46, Figure 9-479
    #[derive(PartialEq, Eq, Clone, Copy, Default)]
    pub struct FtCapabilityAndPolicy(u8);
    impl Debug;
    pub ft_over_ds, set_ft_over_ds: 0;
    pub resource_request_protocol, set_resource_request_protocol: 1;
    pub raw, _: 7, 0;
}

/// Mobility Domain element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mde {
    pub mdid: [u8; MDID_LEN],
    pub ft_capability: FtCapabilityAndPolicy,
}

impl Mde {
    pub fn len(&self) -> usize {
        2 + BODY_LEN
    }

    pub fn write_into<A: Appendable>(&self, buf: &mut A) -> Result<(), BufferTooSmall> {
        if !buf.can_append(self.len()) {
            return Err(BufferTooSmall);
        }
        buf.append_byte(id::MOBILITY_DOMAIN)?;
        buf.append_byte(BODY_LEN as u8)?;
        buf.append_bytes(&self.mdid[..])?;
        buf.append_byte(self.ft_capability.raw())
    }
}

/// Parses a complete MDE, header included. Returns None for anything malformed.
pub fn from_bytes(data: &[u8]) -> Option<Mde> {
    match data {
        [id::MOBILITY_DOMAIN, 3, mdid0, mdid1, caps] => {
            Some(Mde { mdid: [*mdid0, *mdid1], ft_capability: FtCapabilityAndPolicy(*caps) })
        }
        _ => None,
    }
}
