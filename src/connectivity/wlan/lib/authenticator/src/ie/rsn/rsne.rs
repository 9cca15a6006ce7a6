// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::akm::Akm;
use super::cipher::Cipher;
use super::pmkid::{Pmkid, PMKID_LEN};
use super::suite_selector::{self, Factory, Known, SUITE_SELECTOR_LEN};
use crate::appendable::{Appendable, BufferTooSmall};
use crate::organization::Oui;
use bitfield::bitfield;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use thiserror::Error;

pub const ID: u8 = 48;
pub const VERSION: u16 = 1;

// Element ID, length and version.
const MIN_LEN: usize = 4;
const MAX_LEN: usize = 257;

macro_rules! return_ok_on_empty {
    ( $rdr:expr, $result:expr ) => {{
        if remaining(&$rdr) == 0 {
            return Ok($result);
        }
    }};
}

#[derive(Debug, Error)]
pub enum Error {
    // When parsing an RSNE all reads are guarded by sufficient length checks. However, read(...)
    // could throw arbitrary errors which we want to catch and not ignore or panic on. This variant
    // will wrap these errors.
    #[error("unexpected io error while parsing RSNE: {}", _0)]
    UnexpectedIoError(#[from] io::Error),
    #[error("invalid RSNE; too short")]
    TooShort,
    #[error("invalid RSNE; too long")]
    TooLong,
    #[error("invalid RSNE; element id {} is not an RSNE", _0)]
    WrongElementId(u8),
    #[error("invalid RSNE; length field {} does not match {} bytes of body", _0, _1)]
    LengthMismatch(u8, usize),
    #[error("invalid RSNE; expected suite selector (pairwise or AKM) but was too short")]
    ExpectedSuiteSelector,
    #[error("invalid RSNE; expected pairwise cipher suite list count but failed with: {}", _0)]
    ExpectedPairwiseListCount(io::Error),
    #[error("invalid RSNE; expected AKM suite list count but failed with: {}", _0)]
    ExpectedAkmListCount(io::Error),
    #[error("invalid RSNE; expected PMKID list count but failed with: {}", _0)]
    ExpectedPmkidListCount(io::Error),
    #[error("invalid RSNE; expected PMKID but was too short")]
    ExpectedPmkid,
    #[error("invalid RSNE; expected RSN capabilities but failed with: {}", _0)]
    ExpectedCapabilities(io::Error),
    #[error("invalid PMKID length: {}", _0)]
    InvalidPmkidLength(usize),
}

// IEEE Std 802.11-2020, 9.4.2.24.4, Figure 9-333
bitfield! {
    #[derive(PartialEq, Eq, Clone, Copy, Default)]
    pub struct RsnCapabilities(u16);
    impl Debug;
    pub preauth, set_preauth: 0;
    pub no_pairwise, set_no_pairwise: 1;
    pub ptksa_replay_counter, set_ptksa_replay_counter: 3, 2;
    pub gtksa_replay_counter, set_gtksa_replay_counter: 5, 4;
    pub mgmt_frame_protection_req, set_mgmt_frame_protection_req: 6;
    pub mgmt_frame_protection_cap, set_mgmt_frame_protection_cap: 7;
    pub joint_multiband, set_joint_multiband: 8;
    pub peerkey_enabled, set_peerkey_enabled: 9;
    pub ssp_amsdu_cap, set_ssp_amsdu_cap: 10;
    pub ssp_amsdu_req, set_ssp_amsdu_req: 11;
    pub pbac, set_pbac: 12;
    pub extended_key_id, set_extended_key_id: 13;
    pub ocvc, set_ocvc: 14;
    // Bit 15 reserved.
    pub raw, _: 15, 0;
}

// IEEE Std 802.11-2020, 9.4.2.24.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rsne {
    pub version: u16,
    pub group_data_cipher_suite: Option<Cipher>,
    pub pairwise_cipher_suites: Vec<Cipher>,
    pub akm_suites: Vec<Akm>,
    pub rsn_capabilities: Option<RsnCapabilities>,
    pub pmkids: Vec<Pmkid>,
    pub group_mgmt_cipher_suite: Option<Cipher>,
}

impl Default for Rsne {
    fn default() -> Self {
        Rsne {
            version: VERSION,
            group_data_cipher_suite: None,
            pairwise_cipher_suites: vec![],
            akm_suites: vec![],
            rsn_capabilities: None,
            pmkids: vec![],
            group_mgmt_cipher_suite: None,
        }
    }
}

impl Rsne {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caps(&self) -> RsnCapabilities {
        self.rsn_capabilities.unwrap_or_default()
    }

    /// Length of the body, i.e. everything following the length octet.
    fn body_len(&self) -> usize {
        // Every optional field requires all preceding fields to be present.
        let mut len = 2;
        let pmkids = !self.pmkids.is_empty() || self.group_mgmt_cipher_suite.is_some();
        let caps = self.rsn_capabilities.is_some() || pmkids;
        let akms = !self.akm_suites.is_empty() || caps;
        let pairwise = !self.pairwise_cipher_suites.is_empty() || akms;
        let group = self.group_data_cipher_suite.is_some() || pairwise;
        if group {
            len += SUITE_SELECTOR_LEN;
        }
        if pairwise {
            len += 2 + SUITE_SELECTOR_LEN * self.pairwise_cipher_suites.len();
        }
        if akms {
            len += 2 + SUITE_SELECTOR_LEN * self.akm_suites.len();
        }
        if caps {
            len += 2;
        }
        if pmkids {
            len += 2 + PMKID_LEN * self.pmkids.len();
        }
        if self.group_mgmt_cipher_suite.is_some() {
            len += SUITE_SELECTOR_LEN;
        }
        len
    }

    pub fn len(&self) -> usize {
        2 + self.body_len()
    }

    pub fn write_into<A: Appendable>(&self, buf: &mut A) -> Result<(), BufferTooSmall> {
        let body_len = self.body_len();
        if !buf.can_append(2 + body_len) {
            return Err(BufferTooSmall);
        }
        let pmkids = !self.pmkids.is_empty() || self.group_mgmt_cipher_suite.is_some();
        let caps = self.rsn_capabilities.is_some() || pmkids;
        let akms = !self.akm_suites.is_empty() || caps;
        let pairwise = !self.pairwise_cipher_suites.is_empty() || akms;
        let group = self.group_data_cipher_suite.is_some() || pairwise;

        buf.append_byte(ID)?;
        buf.append_byte(body_len as u8)?;
        buf.append_le_u16(self.version)?;
        if group {
            let cipher = self
                .group_data_cipher_suite
                .unwrap_or_else(|| Cipher::new_dot11(super::cipher::CCMP_128));
            buf.append_bytes(&cipher.to_bytes()[..])?;
        }
        if pairwise {
            buf.append_le_u16(self.pairwise_cipher_suites.len() as u16)?;
            for cipher in &self.pairwise_cipher_suites {
                buf.append_bytes(&cipher.to_bytes()[..])?;
            }
        }
        if akms {
            buf.append_le_u16(self.akm_suites.len() as u16)?;
            for akm in &self.akm_suites {
                buf.append_bytes(&akm.to_bytes()[..])?;
            }
        }
        if caps {
            buf.append_le_u16(self.caps().raw())?;
        }
        if pmkids {
            buf.append_le_u16(self.pmkids.len() as u16)?;
            for pmkid in &self.pmkids {
                buf.append_bytes(&pmkid[..])?;
            }
        }
        if let Some(cipher) = self.group_mgmt_cipher_suite.as_ref() {
            buf.append_bytes(&cipher.to_bytes()[..])?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        // Writing into a Vec never runs out of space.
        let _ = self.write_into(&mut buf);
        buf
    }
}

fn remaining(rdr: &Cursor<&[u8]>) -> usize {
    rdr.get_ref().len().saturating_sub(rdr.position() as usize)
}

/// Parses a complete RSNE including its element ID and length octets.
pub fn from_bytes(data: &[u8]) -> Result<Rsne, Error> {
    if data.len() > MAX_LEN {
        return Err(Error::TooLong);
    }
    if data.len() < MIN_LEN {
        return Err(Error::TooShort);
    }

    let mut rdr = Cursor::new(data);
    let element_id = rdr.read_u8()?;
    if element_id != ID {
        return Err(Error::WrongElementId(element_id));
    }
    let length = rdr.read_u8()?;
    if length as usize != data.len() - 2 {
        return Err(Error::LengthMismatch(length, data.len() - 2));
    }

    let mut rsne = Rsne { version: rdr.read_u16::<LittleEndian>()?, ..Default::default() };

    // Read group data cipher suite.
    return_ok_on_empty!(rdr, rsne);
    rsne.group_data_cipher_suite = Some(read_suite_selector::<Cipher>(&mut rdr)?);

    // Read pairwise cipher suites.
    return_ok_on_empty!(rdr, rsne);
    let count = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedPairwiseListCount)?;
    for _ in 0..count {
        rsne.pairwise_cipher_suites.push(read_suite_selector::<Cipher>(&mut rdr)?);
    }

    // Read AKM suites.
    return_ok_on_empty!(rdr, rsne);
    let count = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedAkmListCount)?;
    for _ in 0..count {
        rsne.akm_suites.push(read_suite_selector::<Akm>(&mut rdr)?)
    }

    // Read RSN capabilities.
    return_ok_on_empty!(rdr, rsne);
    let caps = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedCapabilities)?;
    rsne.rsn_capabilities = Some(RsnCapabilities(caps));

    // Read PMKIDs.
    return_ok_on_empty!(rdr, rsne);
    let count = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedPmkidListCount)?;
    for _ in 0..count {
        rsne.pmkids.push(read_pmkid(&mut rdr)?);
    }

    // Read group mgmt cipher suite.
    return_ok_on_empty!(rdr, rsne);
    rsne.group_mgmt_cipher_suite = Some(read_suite_selector::<Cipher>(&mut rdr)?);

    Ok(rsne)
}

fn read_suite_selector<T>(rdr: &mut Cursor<&[u8]>) -> Result<T, Error>
where
    T: Factory<Suite = T>,
{
    if remaining(rdr) < SUITE_SELECTOR_LEN {
        Err(Error::ExpectedSuiteSelector)
    } else {
        let mut oui = [0; 3];
        rdr.read_exact(&mut oui)?;
        let suite_type = rdr.read_u8()?;
        Ok(T::new(Oui::new(oui), suite_type))
    }
}

fn read_pmkid(rdr: &mut Cursor<&[u8]>) -> Result<Pmkid, Error> {
    if remaining(rdr) < PMKID_LEN {
        Err(Error::ExpectedPmkid)
    } else {
        let mut pmkid = [0; PMKID_LEN];
        rdr.read_exact(&mut pmkid)?;
        Ok(pmkid)
    }
}

/// Convenience for building an RSNE entirely out of IEEE 802.11 suites.
pub fn dot11_suites(group: u8, pairwise: &[u8], akms: &[u8]) -> Rsne {
    Rsne {
        group_data_cipher_suite: Some(Cipher::new(suite_selector::OUI, group)),
        pairwise_cipher_suites: pairwise.iter().map(|t| Cipher::new_dot11(*t)).collect(),
        akm_suites: akms.iter().map(|t| Akm::new_dot11(*t)).collect(),
        ..Default::default()
    }
}
