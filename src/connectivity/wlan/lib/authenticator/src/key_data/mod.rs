// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod kde;

use crate::ie::mde::{self, Mde};
use crate::ie::rsn::pmkid::Pmkid;
use crate::ie::rsn::rsne::{self, Rsne};
use crate::ie::rsnxe::{self, Rsnxe};
use crate::ie::wpa::WpaIe;
use crate::ie::{id, Reader};
use crate::mac::MacAddr;
use thiserror::Error;

/// An element carried in the Key Data field of an EAPOL-Key frame. Both KDEs and regular
/// information elements may be present.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Element {
    Gtk(kde::Header, kde::Gtk),
    Igtk(kde::Header, kde::Igtk),
    Bigtk(kde::Header, kde::Igtk),
    Pmkid(kde::Header, Pmkid),
    MacAddr(kde::Header, MacAddr),
    Oci(kde::Header, kde::Oci),
    MloLink(kde::Header, kde::MloLink),
    TransitionDisable(kde::Header, u8),
    IpAddrReq(kde::Header),
    IpAddrAlloc(kde::Header, kde::IpAddrAlloc),
    Rsne(Rsne),
    Rsnxe(Rsnxe),
    LegacyWpa1(WpaIe),
    Mde(Mde),
    /// A complete Fast BSS Transition element, header included.
    Fte(Vec<u8>),
    Padding,
    UnsupportedKde(kde::Header),
    UnsupportedIe(u8, u8),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("key data truncated at offset {}", _0)]
    Truncated(usize),
    #[error("malformed KDE at offset {}", _0)]
    InvalidKde(usize),
    #[error("malformed element {} at offset {}", _0, _1)]
    InvalidElement(u8, usize),
}

/// Splits decrypted or plaintext Key Data into its elements.
/// Parsing stops at the padding KDE which may only appear at the end of the field.
pub fn extract_elements(key_data: &[u8]) -> Result<Vec<Element>, Error> {
    let mut elements = vec![];
    let mut offset = 0;
    while offset < key_data.len() {
        let remaining = &key_data[offset..];
        if remaining[0] == kde::TYPE {
            match kde::parse(remaining) {
                Ok((rest, element)) => {
                    let done = element == Element::Padding;
                    elements.push(element);
                    if done {
                        break;
                    }
                    offset = key_data.len() - rest.len();
                }
                Err(_) => return Err(Error::InvalidKde(offset)),
            }
            continue;
        }

        let (element_id, body) = match Reader::new(remaining).next() {
            Some(element) => element,
            None => return Err(Error::Truncated(offset)),
        };
        let full = &remaining[..2 + body.len()];
        let element = match element_id {
            id::RSNE => Element::Rsne(
                rsne::from_bytes(full).map_err(|_| Error::InvalidElement(element_id, offset))?,
            ),
            id::RSNXE => Element::Rsnxe(
                rsnxe::from_bytes(full).ok_or(Error::InvalidElement(element_id, offset))?,
            ),
            id::MOBILITY_DOMAIN => Element::Mde(
                mde::from_bytes(full).ok_or(Error::InvalidElement(element_id, offset))?,
            ),
            id::FAST_BSS_TRANSITION => Element::Fte(full.to_vec()),
            _ => Element::UnsupportedIe(element_id, body.len() as u8),
        };
        elements.push(element);
        offset += full.len();
    }
    Ok(elements)
}
