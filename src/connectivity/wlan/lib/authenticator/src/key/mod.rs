// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod gtk;
pub mod psk;
pub mod ptk;

use crate::ie::rsn::cipher::Cipher;
use crate::mac::MacAddr;
use std::fmt;

pub const PMK_LEN: usize = 32;

pub type Pmk = [u8; PMK_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Pairwise,
    Group,
    Igtk,
    Bigtk,
}

/// Everything the driver needs to install one key.
#[derive(Clone, PartialEq, Eq)]
pub struct SetKeyDescriptor {
    pub key_type: KeyType,
    /// Peer address for pairwise keys, the broadcast address otherwise.
    pub address: MacAddr,
    pub key_id: u16,
    pub key: Vec<u8>,
    pub rsc: u64,
    pub cipher: Cipher,
}

impl fmt::Debug for SetKeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetKeyDescriptor")
            .field("key_type", &self.key_type)
            .field("address", &self.address)
            .field("key_id", &self.key_id)
            .field("cipher", &self.cipher)
            .finish()
    }
}
