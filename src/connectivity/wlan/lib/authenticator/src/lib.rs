// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Authenticator side key management of an IEEE Std 802.11 access point.
//!
//! The crate drives the 4-Way and Group Key Handshakes of every associated station, maintains the
//! group keys of each VLAN and implements the Fast BSS Transition key hierarchy together with the
//! inter-AP key distribution protocol. It is single threaded: every entry point of
//! [`Authenticator`] runs to completion and all side effects leave through [`AuthenticatorOps`].

pub mod appendable;
pub mod authenticator;
pub mod config;
pub mod crypto_utils;
pub mod eapol;
pub mod ft;
pub mod group;
pub mod ie;
pub mod integrity;
pub mod key;
pub mod key_data;
pub mod mac;
pub mod ops;
pub mod organization;
pub mod pmksa;
pub mod reason;
mod replay;
pub mod station;
pub mod timer;
pub mod validate;

#[cfg(test)]
mod test_util;

pub use crate::authenticator::{Authenticator, Counters};
pub use crate::config::AuthenticatorConfig;
pub use crate::ops::AuthenticatorOps;
pub use crate::validate::IeValidation;

use crate::ie::rsn::akm::Akm;
use crate::ie::rsn::cipher::Cipher;
use crate::mac::MacAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid bit size for key derivation: {}", _0)]
    InvalidBitSize(usize),
    #[error("invalid key length {} for {}", _0, _1)]
    InvalidKeyLength(usize, &'static str),
    #[error("invalid KEK length: {}", _0)]
    InvalidKekLength(usize),
    #[error("invalid key wrap input length: {}", _0)]
    InvalidKeyWrapInput(usize),
    #[error("AES key unwrap integrity check failed")]
    KeyUnwrapFailed,
    #[error("unsupported AKM: {:?}", _0)]
    UnsupportedAkm(Akm),
    #[error("unsupported cipher: {:?}", _0)]
    UnsupportedCipher(Cipher),
    #[error("buffer too small")]
    BufferTooSmall(#[from] appendable::BufferTooSmall),
    #[error("invalid configuration: {}", _0)]
    Config(#[from] config::ConfigError),
    #[error("invalid EAPOL-Key frame: {}", _0)]
    Eapol(#[from] eapol::Error),
    #[error("invalid key data: {}", _0)]
    KeyData(#[from] key_data::Error),
    #[error("invalid RRB frame: {}", _0)]
    Rrb(#[from] ft::rrb::Error),
    #[error("unknown station {:02x?}", _0)]
    UnknownStation(MacAddr),
    #[error("fast BSS transition is not enabled")]
    FtNotEnabled,
    #[error("no R0KH configured for R0KH-ID {:02x?}", _0)]
    UnknownR0kh(Vec<u8>),
    #[error("no PMK-R0 named {:02x?}", _0)]
    UnknownPmkR0Name([u8; 16]),
    #[error("no group for VLAN {}", _0)]
    NoGroup(u16),
    #[error("operating channel information unavailable")]
    NoChannelInfo,
    #[error("random pool not ready")]
    EntropyNotReady,
    #[error("station {:02x?} has no negotiated RSN", _0)]
    NotNegotiated(MacAddr),
    #[error("failed to install key: {}", _0)]
    SetKey(anyhow::Error),
    #[error("failed to send RRB frame: {}", _0)]
    SendRrb(anyhow::Error),
}

/// Asserts that an expression matches a pattern and optionally evaluates an expression with the
/// pattern's bindings.
#[cfg(test)]
#[macro_export]
macro_rules! assert_variant {
    ($test:expr, $variant:pat => $e:expr) => {
        match $test {
            $variant => $e,
            other => panic!("unexpected variant: {:?}", other),
        }
    };
    ($test:expr, $variant:pat) => {
        $crate::assert_variant!($test, $variant => {})
    };
    ($test:expr, $variant:pat,) => {
        $crate::assert_variant!($test, $variant => {})
    };
}
