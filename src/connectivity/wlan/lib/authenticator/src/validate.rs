// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::{AuthenticatorConfig, MfpPolicy};
use crate::ie::mde::{self, Mde};
use crate::ie::rsn::akm::Akm;
use crate::ie::rsn::cipher::{self, Cipher};
use crate::ie::rsn::pmkid::Pmkid;
use crate::ie::rsn::rsne::{self, Rsne};
use crate::ie::rsnxe::{self, Rsnxe};
use crate::ie::wpa::{self, WpaIe};
use crate::ie::id;
use crate::pmksa::PmksaEntry;
use crate::reason::StatusCode;
use log::debug;

/// Outcome of validating the security elements of an association request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IeValidation {
    Ok,
    InvalidIe,
    InvalidProtocolVersion,
    InvalidGroup,
    InvalidPairwise,
    InvalidAkmp,
    InvalidPmkid,
    InvalidMdie,
    MgmtFrameProtectionViolation,
    InvalidMgmtGroupCipher,
    InvalidOcv,
    NotEnabled,
    AllocFail,
}

impl IeValidation {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IeValidation::Ok => StatusCode::SUCCESS,
            IeValidation::InvalidIe | IeValidation::NotEnabled => StatusCode::INVALID_ELEMENT,
            IeValidation::InvalidProtocolVersion => StatusCode::UNSUPPORTED_RSNE_VERSION,
            IeValidation::InvalidGroup => StatusCode::INVALID_GROUP_CIPHER,
            IeValidation::InvalidPairwise => StatusCode::INVALID_PAIRWISE_CIPHER,
            IeValidation::InvalidAkmp => StatusCode::INVALID_AKMP,
            IeValidation::InvalidPmkid => StatusCode::INVALID_PMKID,
            IeValidation::InvalidMdie => StatusCode::INVALID_MDE,
            IeValidation::MgmtFrameProtectionViolation => {
                StatusCode::ROBUST_MGMT_POLICY_VIOLATION
            }
            IeValidation::InvalidMgmtGroupCipher => StatusCode::CIPHER_OUT_OF_POLICY,
            IeValidation::InvalidOcv => StatusCode::INVALID_RSNE_CAPABILITIES,
            IeValidation::AllocFail => StatusCode::REFUSED_REASON_UNSPECIFIED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rsn,
    Wpa,
}

/// Security elements of a station's (Re)Association Request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerIes<'a> {
    /// The complete RSNE or WPA vendor element.
    pub wpa_ie: &'a [u8],
    pub rsnxe: Option<&'a [u8]>,
    pub mde: Option<&'a [u8]>,
}

/// The security association parameters agreed with a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIe {
    pub protocol: Protocol,
    pub akm: Akm,
    pub pairwise: Cipher,
    pub group: Cipher,
    pub group_mgmt: Option<Cipher>,
    pub mfp: bool,
    pub ocv: bool,
    pub pmkids: Vec<Pmkid>,
    /// PMKSA cached for one of the station's PMKIDs, if any.
    pub pmksa: Option<PmksaEntry>,
    /// The station's element as received, compared against message 2.
    pub ie: Vec<u8>,
    pub rsnxe: Option<Rsnxe>,
    pub mde: Option<Mde>,
}

enum PeerIe {
    Rsn(Rsne),
    Wpa(WpaIe),
}

fn select_akm(config: &AuthenticatorConfig, offered: &[Akm]) -> Option<Akm> {
    offered
        .iter()
        .map(Akm::normalized)
        .filter(|akm| config.akms.contains(akm))
        .min_by_key(Akm::preference)
}

/// Validates a station's security elements against the BSS policy.
///
/// `resolve_pmksa` is handed the PMKIDs listed by the station and returns a cached PMKSA for one
/// of them. Validation depends on nothing but the policy, the element bytes and that lookup.
pub fn validate_ie(
    config: &AuthenticatorConfig,
    ies: &PeerIes<'_>,
    resolve_pmksa: &mut dyn FnMut(&[Pmkid]) -> Option<PmksaEntry>,
) -> Result<ValidatedIe, IeValidation> {
    // Parse.
    let peer = match ies.wpa_ie.first() {
        Some(&id::RSNE) => {
            if !config.wpa_mode.rsn_enabled() {
                debug!("RSN not enabled but station sent an RSNE");
                return Err(IeValidation::NotEnabled);
            }
            match rsne::from_bytes(ies.wpa_ie) {
                Ok(rsne) => PeerIe::Rsn(rsne),
                Err(e) => {
                    debug!("invalid RSNE: {}", e);
                    return Err(IeValidation::InvalidIe);
                }
            }
        }
        Some(&id::VENDOR_SPECIFIC) if wpa::is_wpa_element(ies.wpa_ie) => {
            if !config.wpa_mode.wpa1_enabled() {
                debug!("WPA not enabled but station sent a WPA IE");
                return Err(IeValidation::NotEnabled);
            }
            match wpa::from_element(ies.wpa_ie) {
                Some(wpa) => PeerIe::Wpa(wpa),
                None => return Err(IeValidation::InvalidIe),
            }
        }
        _ => return Err(IeValidation::InvalidIe),
    };
    let rsnxe = match ies.rsnxe {
        Some(bytes) => Some(rsnxe::from_bytes(bytes).ok_or(IeValidation::InvalidIe)?),
        None => None,
    };

    let (protocol, group, pairwise_offered, akms_offered, rsne) = match &peer {
        PeerIe::Rsn(rsne) => {
            // Version.
            if rsne.version != rsne::VERSION {
                return Err(IeValidation::InvalidProtocolVersion);
            }
            let group = rsne
                .group_data_cipher_suite
                .unwrap_or_else(|| Cipher::new_dot11(cipher::CCMP_128));
            let pairwise = if rsne.pairwise_cipher_suites.is_empty() {
                vec![Cipher::new_dot11(cipher::CCMP_128)]
            } else {
                rsne.pairwise_cipher_suites.clone()
            };
            (Protocol::Rsn, group, pairwise, rsne.akm_suites.clone(), Some(rsne))
        }
        PeerIe::Wpa(wpa) => (
            Protocol::Wpa,
            wpa.multicast_cipher.normalized(),
            wpa.unicast_cipher_list.iter().map(Cipher::normalized).collect(),
            wpa.akm_list.clone(),
            None,
        ),
    };
    let wpa1 = protocol == Protocol::Wpa;

    // Group cipher.
    if group != config.group_cipher {
        debug!("group cipher {:?} does not match policy {:?}", group, config.group_cipher);
        return Err(IeValidation::InvalidGroup);
    }

    // AKM.
    let akm = select_akm(config, &akms_offered[..]).ok_or(IeValidation::InvalidAkmp)?;
    if wpa1 && !(akm.is_psk() || akm.is_ieee8021x()) {
        return Err(IeValidation::InvalidAkmp);
    }

    // Pairwise cipher.
    let allowed = config.pairwise_for(wpa1);
    let accepted: Vec<Cipher> =
        pairwise_offered.iter().copied().filter(|c| allowed.contains(c)).collect();
    let pairwise =
        accepted.iter().copied().min_by_key(Cipher::preference).ok_or(IeValidation::InvalidPairwise)?;

    // Management frame protection.
    let caps = rsne.map(|r| r.caps()).unwrap_or_default();
    let mfpc = caps.mgmt_frame_protection_cap();
    let mfpr = caps.mgmt_frame_protection_req();
    if config.mfp == MfpPolicy::Required && !mfpc {
        debug!("MFP required but station does not support it");
        return Err(IeValidation::MgmtFrameProtectionViolation);
    }
    if mfpr && !mfpc {
        return Err(IeValidation::MgmtFrameProtectionViolation);
    }
    if config.mfp == MfpPolicy::Disabled && mfpr {
        debug!("station requires MFP which is disabled");
        return Err(IeValidation::MgmtFrameProtectionViolation);
    }
    let mfp = !wpa1 && config.mfp != MfpPolicy::Disabled && mfpc;
    if mfp && accepted.iter().any(Cipher::is_tkip) {
        debug!("MFP cannot be used with TKIP");
        return Err(IeValidation::InvalidPairwise);
    }

    // Management group cipher.
    let group_mgmt = if mfp {
        let offered = rsne
            .and_then(|r| r.group_mgmt_cipher_suite)
            .unwrap_or_else(|| Cipher::new_dot11(cipher::BIP_CMAC_128));
        if offered != config.group_mgmt_cipher {
            debug!("unsupported group management cipher {:?}", offered);
            return Err(IeValidation::InvalidMgmtGroupCipher);
        }
        Some(offered)
    } else {
        None
    };

    // Operating channel validation.
    if config.ocv && caps.ocvc() && !mfpc {
        debug!("OCV requires MFP but station did not enable it");
        return Err(IeValidation::InvalidOcv);
    }
    let ocv = config.ocv && mfp && caps.ocvc();

    // Mobility domain.
    let mde = match ies.mde {
        Some(bytes) => mde::from_bytes(bytes),
        None => None,
    };
    if akm.is_ft() {
        let expected = config.ft.as_ref().map(|ft| ft.mobility_domain);
        match (mde.as_ref(), expected) {
            (Some(mde), Some(mdid)) if mde.mdid == mdid => (),
            _ => {
                debug!("FT AKM without matching MDE");
                return Err(IeValidation::InvalidMdie);
            }
        }
    }

    // PMKID.
    let pmkids = rsne.map(|r| r.pmkids.clone()).unwrap_or_default();
    let pmksa = if akm.is_ft() || pmkids.is_empty() { None } else { resolve_pmksa(&pmkids[..]) };
    if akm.is_sae() && !akm.is_ft() && !pmkids.is_empty() && pmksa.is_none() {
        debug!("no PMKSA cache entry found for SAE");
        return Err(IeValidation::InvalidPmkid);
    }

    Ok(ValidatedIe {
        protocol,
        akm,
        pairwise,
        group,
        group_mgmt,
        mfp,
        ocv,
        pmkids,
        pmksa,
        ie: ies.wpa_ie.to_vec(),
        rsnxe,
        mde,
    })
}
