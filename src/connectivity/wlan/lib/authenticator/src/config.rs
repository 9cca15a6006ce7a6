// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::ie::rsn::akm::{self, Akm};
use crate::ie::rsn::cipher::{self, Cipher};
use crate::ie::wpa;
use crate::key::psk::{self, Psk};
use crate::mac::{parse_mac_addr, MacAddr};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PAIRWISE_UPDATE_COUNT: u32 = 4;
pub const DEFAULT_GROUP_UPDATE_COUNT: u32 = 4;
pub const DEFAULT_GROUP_REKEY_SECS: u64 = 86400;
pub const DEFAULT_PMKSA_CACHE_SIZE: usize = 32;
pub const DEFAULT_EAPOL_TIMEOUT_FIRST_MS: u64 = 100;
pub const DEFAULT_EAPOL_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_GROUP_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_FT_PULL_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_FT_PUSH_MAX_AGE_SECS: u32 = 2;
pub const DEFAULT_REASSOCIATION_DEADLINE_TU: u32 = 1000;

const MAX_NAS_IDENTIFIER_LEN: usize = 48;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {}", _0)]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {:?} for {}", value, field)]
    InvalidValue { field: &'static str, value: String },
    #[error("inconsistent configuration: {}", _0)]
    Inconsistent(&'static str),
}

fn invalid(field: &'static str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue { field, value: value.into() }
}

/// Which WPA generations are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WpaMode {
    Wpa1,
    Rsn,
    Mixed,
}

impl WpaMode {
    pub fn wpa1_enabled(&self) -> bool {
        matches!(self, WpaMode::Wpa1 | WpaMode::Mixed)
    }

    pub fn rsn_enabled(&self) -> bool {
        matches!(self, WpaMode::Rsn | WpaMode::Mixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfpPolicy {
    Disabled,
    Optional,
    Required,
}

/// A remote R0 key holder this authenticator may pull PMK-R1s from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R0kh {
    pub addr: MacAddr,
    pub id: Vec<u8>,
    pub key: Vec<u8>,
}

/// A remote R1 key holder which receives pushed PMK-R1s and answers pulls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R1kh {
    pub addr: MacAddr,
    pub id: MacAddr,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtConfig {
    pub mobility_domain: [u8; 2],
    /// R0KH-ID of this authenticator.
    pub nas_identifier: Vec<u8>,
    /// R1KH-ID of this authenticator.
    pub r1_key_holder: MacAddr,
    pub ft_over_ds: bool,
    pub pmk_r1_push: bool,
    pub reassociation_deadline_tu: u32,
    pub pull_timeout: Duration,
    pub push_max_age_secs: u32,
    pub r0khs: Vec<R0kh>,
    pub r1khs: Vec<R1kh>,
}

impl FtConfig {
    pub fn find_r0kh(&self, id: &[u8]) -> Option<&R0kh> {
        self.r0khs.iter().find(|r0kh| &r0kh.id[..] == id)
    }

    pub fn find_r0kh_by_addr(&self, addr: &MacAddr) -> Option<&R0kh> {
        self.r0khs.iter().find(|r0kh| &r0kh.addr == addr)
    }

    pub fn find_r1kh_by_addr(&self, addr: &MacAddr) -> Option<&R1kh> {
        self.r1khs.iter().find(|r1kh| &r1kh.addr == addr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorConfig {
    pub ssid: Vec<u8>,
    pub wpa_mode: WpaMode,
    pub akms: Vec<Akm>,
    pub rsn_pairwise: Vec<Cipher>,
    pub wpa_pairwise: Vec<Cipher>,
    pub group_cipher: Cipher,
    pub group_mgmt_cipher: Cipher,
    pub mfp: MfpPolicy,
    pub ocv: bool,
    pub beacon_prot: bool,
    pub okc: bool,
    /// PSK shared by every station. Per-station PSKs come from `AuthenticatorOps::get_psk`.
    pub psk: Option<Psk>,
    pub wpa_pairwise_update_count: u32,
    pub wpa_group_update_count: u32,
    pub eapol_timeout_first: Duration,
    pub eapol_timeout: Duration,
    pub group_timeout: Duration,
    pub wpa_group_rekey: Option<Duration>,
    pub wpa_gmk_rekey: Option<Duration>,
    pub wpa_ptk_rekey: Option<Duration>,
    pub wpa_strict_rekey: bool,
    pub wpa_disable_disconnect_on_group_failure: bool,
    pub pmksa_cache_size: usize,
    /// Bitmap carried in the transition disable KDE of message 3. Zero omits the KDE.
    pub transition_disable: u8,
    pub ft: Option<FtConfig>,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        AuthenticatorConfig {
            ssid: vec![],
            wpa_mode: WpaMode::Rsn,
            akms: vec![Akm::new_dot11(akm::PSK)],
            rsn_pairwise: vec![Cipher::new_dot11(cipher::CCMP_128)],
            wpa_pairwise: vec![],
            group_cipher: Cipher::new_dot11(cipher::CCMP_128),
            group_mgmt_cipher: Cipher::new_dot11(cipher::BIP_CMAC_128),
            mfp: MfpPolicy::Disabled,
            ocv: false,
            beacon_prot: false,
            okc: false,
            psk: None,
            wpa_pairwise_update_count: DEFAULT_PAIRWISE_UPDATE_COUNT,
            wpa_group_update_count: DEFAULT_GROUP_UPDATE_COUNT,
            eapol_timeout_first: Duration::from_millis(DEFAULT_EAPOL_TIMEOUT_FIRST_MS),
            eapol_timeout: Duration::from_millis(DEFAULT_EAPOL_TIMEOUT_MS),
            group_timeout: Duration::from_millis(DEFAULT_GROUP_TIMEOUT_MS),
            wpa_group_rekey: Some(Duration::from_secs(DEFAULT_GROUP_REKEY_SECS)),
            wpa_gmk_rekey: None,
            wpa_ptk_rekey: None,
            wpa_strict_rekey: false,
            wpa_disable_disconnect_on_group_failure: false,
            pmksa_cache_size: DEFAULT_PMKSA_CACHE_SIZE,
            transition_disable: 0,
            ft: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParseConfig {
    ssid: String,
    wpa: Option<u8>,
    wpa_key_mgmt: Option<Vec<String>>,
    rsn_pairwise: Option<Vec<String>>,
    wpa_pairwise: Option<Vec<String>>,
    group_cipher: Option<String>,
    group_mgmt_cipher: Option<String>,
    ieee80211w: Option<u8>,
    ocv: Option<bool>,
    beacon_prot: Option<bool>,
    okc: Option<bool>,
    wpa_passphrase: Option<String>,
    wpa_psk: Option<String>,
    wpa_pairwise_update_count: Option<u32>,
    wpa_group_update_count: Option<u32>,
    eapol_timeout_first_ms: Option<u64>,
    eapol_timeout_ms: Option<u64>,
    group_timeout_ms: Option<u64>,
    wpa_group_rekey: Option<u64>,
    wpa_gmk_rekey: Option<u64>,
    wpa_ptk_rekey: Option<u64>,
    wpa_strict_rekey: Option<bool>,
    wpa_disable_disconnect_on_group_failure: Option<bool>,
    pmksa_cache_size: Option<usize>,
    transition_disable: Option<u8>,
    ft: Option<ParseFtConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParseFtConfig {
    mobility_domain: String,
    nas_identifier: String,
    r1_key_holder: String,
    ft_over_ds: Option<bool>,
    pmk_r1_push: Option<bool>,
    reassociation_deadline: Option<u32>,
    ft_pull_timeout_ms: Option<u64>,
    ft_push_max_age: Option<u32>,
    r0kh: Option<Vec<String>>,
    r1kh: Option<Vec<String>>,
}

fn parse_akm(name: &str) -> Result<Akm, ConfigError> {
    let suite_type = match name {
        "WPA-EAP" => akm::EAP,
        "WPA-PSK" => akm::PSK,
        "FT-EAP" => akm::FT_EAP,
        "FT-PSK" => akm::FT_PSK,
        "WPA-EAP-SHA256" => akm::EAP_SHA256,
        "WPA-PSK-SHA256" => akm::PSK_SHA256,
        "SAE" => akm::SAE,
        "FT-SAE" => akm::FT_SAE,
        "WPA-EAP-SUITE-B-192" => akm::EAP_SUITEB_SHA384,
        _ => return Err(invalid("wpa_key_mgmt", name)),
    };
    Ok(Akm::new_dot11(suite_type))
}

fn parse_cipher(field: &'static str, name: &str) -> Result<Cipher, ConfigError> {
    let suite_type = match name {
        "TKIP" => cipher::TKIP,
        "CCMP" => cipher::CCMP_128,
        "GCMP" => cipher::GCMP_128,
        "GCMP-256" => cipher::GCMP_256,
        "CCMP-256" => cipher::CCMP_256,
        "AES-128-CMAC" => cipher::BIP_CMAC_128,
        "BIP-GMAC-128" => cipher::BIP_GMAC_128,
        "BIP-GMAC-256" => cipher::BIP_GMAC_256,
        "BIP-CMAC-256" => cipher::BIP_CMAC_256,
        _ => return Err(invalid(field, name)),
    };
    Ok(Cipher::new_dot11(suite_type))
}

fn parse_ciphers(field: &'static str, names: &[String]) -> Result<Vec<Cipher>, ConfigError> {
    names.iter().map(|name| parse_cipher(field, name)).collect()
}

fn parse_mac(field: &'static str, value: &str) -> Result<MacAddr, ConfigError> {
    parse_mac_addr(value).ok_or_else(|| invalid(field, value))
}

fn parse_hex(field: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    hex::decode(value).map_err(|_| invalid(field, value))
}

fn parse_key_holder_key(field: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    let key = parse_hex(field, value)?;
    match key.len() {
        16 | 32 => Ok(key),
        _ => Err(invalid(field, value)),
    }
}

// "<MAC address> <NAS Identifier> <hex key>"
fn parse_r0kh(line: &str) -> Result<R0kh, ConfigError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match &parts[..] {
        [addr, id, key] => Ok(R0kh {
            addr: parse_mac("r0kh", addr)?,
            id: id.as_bytes().to_vec(),
            key: parse_key_holder_key("r0kh", key)?,
        }),
        _ => Err(invalid("r0kh", line)),
    }
}

// "<MAC address> <R1KH-ID> <hex key>"
fn parse_r1kh(line: &str) -> Result<R1kh, ConfigError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match &parts[..] {
        [addr, id, key] => Ok(R1kh {
            addr: parse_mac("r1kh", addr)?,
            id: parse_mac("r1kh", id)?,
            key: parse_key_holder_key("r1kh", key)?,
        }),
        _ => Err(invalid("r1kh", line)),
    }
}

/// Picks the group cipher when none is configured: the weakest pairwise
/// cipher on offer so that every station can decrypt group traffic.
fn select_group_cipher(pairwise: &[Cipher]) -> Cipher {
    [cipher::TKIP, cipher::CCMP_128, cipher::GCMP_128, cipher::GCMP_256, cipher::CCMP_256]
        .iter()
        .map(|t| Cipher::new_dot11(*t))
        .find(|c| pairwise.iter().any(|p| p.normalized() == *c))
        .unwrap_or_else(|| Cipher::new_dot11(cipher::CCMP_128))
}

fn secs(value: Option<u64>, default: Option<Duration>) -> Option<Duration> {
    match value {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => default,
    }
}

impl ParseFtConfig {
    fn convert(self) -> Result<FtConfig, ConfigError> {
        let mdid = parse_hex("mobility_domain", &self.mobility_domain)?;
        if mdid.len() != 2 {
            return Err(invalid("mobility_domain", self.mobility_domain));
        }
        Ok(FtConfig {
            mobility_domain: [mdid[0], mdid[1]],
            nas_identifier: self.nas_identifier.into_bytes(),
            r1_key_holder: parse_mac("r1_key_holder", &self.r1_key_holder)?,
            ft_over_ds: self.ft_over_ds.unwrap_or(true),
            pmk_r1_push: self.pmk_r1_push.unwrap_or(false),
            reassociation_deadline_tu: self
                .reassociation_deadline
                .unwrap_or(DEFAULT_REASSOCIATION_DEADLINE_TU),
            pull_timeout: Duration::from_millis(
                self.ft_pull_timeout_ms.unwrap_or(DEFAULT_FT_PULL_TIMEOUT_MS),
            ),
            push_max_age_secs: self.ft_push_max_age.unwrap_or(DEFAULT_FT_PUSH_MAX_AGE_SECS),
            r0khs: self
                .r0kh
                .unwrap_or_default()
                .iter()
                .map(|l| parse_r0kh(l))
                .collect::<Result<_, _>>()?,
            r1khs: self
                .r1kh
                .unwrap_or_default()
                .iter()
                .map(|l| parse_r1kh(l))
                .collect::<Result<_, _>>()?,
        })
    }
}

impl AuthenticatorConfig {
    /// Loads a configuration from its TOML representation and validates it.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let parsed: ParseConfig = toml::from_str(s)?;
        let defaults = AuthenticatorConfig::default();

        let wpa_mode = match parsed.wpa.unwrap_or(2) {
            1 => WpaMode::Wpa1,
            2 => WpaMode::Rsn,
            3 => WpaMode::Mixed,
            other => return Err(invalid("wpa", other.to_string())),
        };
        let akms = match parsed.wpa_key_mgmt {
            Some(names) => names.iter().map(|n| parse_akm(n)).collect::<Result<_, _>>()?,
            None => defaults.akms.clone(),
        };
        let rsn_pairwise = match parsed.rsn_pairwise {
            Some(names) => parse_ciphers("rsn_pairwise", &names[..])?,
            None if wpa_mode.rsn_enabled() => defaults.rsn_pairwise.clone(),
            None => vec![],
        };
        let wpa_pairwise = match parsed.wpa_pairwise {
            Some(names) => parse_ciphers("wpa_pairwise", &names[..])?
                .into_iter()
                .map(|c| Cipher { oui: wpa::OUI, suite_type: c.suite_type })
                .collect(),
            None if wpa_mode.wpa1_enabled() => {
                vec![Cipher { oui: wpa::OUI, suite_type: cipher::TKIP }]
            }
            None => vec![],
        };
        let group_cipher = match parsed.group_cipher {
            Some(name) => parse_cipher("group_cipher", &name)?,
            None => {
                let mut all = rsn_pairwise.clone();
                all.extend(wpa_pairwise.iter().map(|c| c.normalized()));
                select_group_cipher(&all[..])
            }
        };
        let group_mgmt_cipher = match parsed.group_mgmt_cipher {
            Some(name) => parse_cipher("group_mgmt_cipher", &name)?,
            None => defaults.group_mgmt_cipher,
        };
        let mfp = match parsed.ieee80211w.unwrap_or(0) {
            0 => MfpPolicy::Disabled,
            1 => MfpPolicy::Optional,
            2 => MfpPolicy::Required,
            other => return Err(invalid("ieee80211w", other.to_string())),
        };
        let ssid = parsed.ssid.into_bytes();
        let psk = match (parsed.wpa_psk, parsed.wpa_passphrase) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Inconsistent("both wpa_psk and wpa_passphrase are set"))
            }
            (Some(hex_psk), None) => {
                let bytes = parse_hex("wpa_psk", &hex_psk)?;
                Some(psk::from_bytes(&bytes[..]).map_err(|_| invalid("wpa_psk", hex_psk))?)
            }
            (None, Some(passphrase)) => Some(
                psk::compute(passphrase.as_bytes(), &ssid[..])
                    .map_err(|_| invalid("wpa_passphrase", passphrase))?,
            ),
            (None, None) => None,
        };

        let config = AuthenticatorConfig {
            ssid,
            wpa_mode,
            akms,
            rsn_pairwise,
            wpa_pairwise,
            group_cipher,
            group_mgmt_cipher,
            mfp,
            ocv: parsed.ocv.unwrap_or(false),
            beacon_prot: parsed.beacon_prot.unwrap_or(false),
            okc: parsed.okc.unwrap_or(false),
            psk,
            wpa_pairwise_update_count: parsed
                .wpa_pairwise_update_count
                .unwrap_or(DEFAULT_PAIRWISE_UPDATE_COUNT),
            wpa_group_update_count: parsed
                .wpa_group_update_count
                .unwrap_or(DEFAULT_GROUP_UPDATE_COUNT),
            eapol_timeout_first: parsed
                .eapol_timeout_first_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.eapol_timeout_first),
            eapol_timeout: parsed
                .eapol_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.eapol_timeout),
            group_timeout: parsed
                .group_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.group_timeout),
            wpa_group_rekey: secs(parsed.wpa_group_rekey, defaults.wpa_group_rekey),
            wpa_gmk_rekey: secs(parsed.wpa_gmk_rekey, None),
            wpa_ptk_rekey: secs(parsed.wpa_ptk_rekey, None),
            wpa_strict_rekey: parsed.wpa_strict_rekey.unwrap_or(false),
            wpa_disable_disconnect_on_group_failure: parsed
                .wpa_disable_disconnect_on_group_failure
                .unwrap_or(false),
            pmksa_cache_size: parsed.pmksa_cache_size.unwrap_or(DEFAULT_PMKSA_CACHE_SIZE),
            transition_disable: parsed.transition_disable.unwrap_or(0),
            ft: parsed.ft.map(ParseFtConfig::convert).transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations the key management core cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.akms.is_empty() {
            return Err(ConfigError::Inconsistent("no AKM configured"));
        }
        if let Some(akm) = self.akms.iter().find(|a| !a.is_supported()) {
            return Err(invalid("wpa_key_mgmt", format!("{:?}", akm)));
        }
        if self.ssid.is_empty() || self.ssid.len() > 32 {
            return Err(invalid("ssid", String::from_utf8_lossy(&self.ssid[..])));
        }
        if self.wpa_mode.rsn_enabled() && self.rsn_pairwise.is_empty() {
            return Err(ConfigError::Inconsistent("RSN enabled without pairwise ciphers"));
        }
        if self.wpa_mode.wpa1_enabled() {
            if self.wpa_pairwise.is_empty() {
                return Err(ConfigError::Inconsistent("WPA enabled without pairwise ciphers"));
            }
            if self
                .akms
                .iter()
                .any(|a| a.is_ft() || a.is_sae() || a.uses_sha256() || a.uses_sha384())
            {
                return Err(ConfigError::Inconsistent("WPA only supports PSK and EAP"));
            }
        }
        let all_pairwise = self.rsn_pairwise.iter().chain(self.wpa_pairwise.iter());
        if let Some(c) = all_pairwise.clone().find(|c| !c.is_data_cipher()) {
            return Err(invalid("pairwise", format!("{:?}", c)));
        }
        if !self.group_cipher.is_data_cipher() {
            return Err(invalid("group_cipher", format!("{:?}", self.group_cipher)));
        }
        if !self.group_mgmt_cipher.is_mgmt_group_cipher() {
            return Err(invalid("group_mgmt_cipher", format!("{:?}", self.group_mgmt_cipher)));
        }
        if self.mfp == MfpPolicy::Required && self.rsn_pairwise.iter().all(|c| c.is_tkip()) {
            return Err(ConfigError::Inconsistent("MFP required with TKIP only"));
        }
        if self.beacon_prot && self.mfp == MfpPolicy::Disabled {
            return Err(ConfigError::Inconsistent("beacon protection requires MFP"));
        }
        if self.ocv && self.mfp == MfpPolicy::Disabled {
            return Err(ConfigError::Inconsistent("OCV requires MFP"));
        }
        if self.wpa_pairwise_update_count == 0 || self.wpa_group_update_count == 0 {
            return Err(ConfigError::Inconsistent("update counts must be at least 1"));
        }
        if self.pmksa_cache_size == 0 {
            return Err(invalid("pmksa_cache_size", "0"));
        }
        let has_ft_akm = self.akms.iter().any(|a| a.is_ft());
        match self.ft.as_ref() {
            None if has_ft_akm => {
                return Err(ConfigError::Inconsistent("FT AKM configured without [ft] section"))
            }
            Some(ft) => {
                if ft.nas_identifier.is_empty() || ft.nas_identifier.len() > MAX_NAS_IDENTIFIER_LEN
                {
                    return Err(invalid(
                        "nas_identifier",
                        String::from_utf8_lossy(&ft.nas_identifier[..]),
                    ));
                }
                if ft.pull_timeout == Duration::from_millis(0) {
                    return Err(invalid("ft_pull_timeout_ms", "0"));
                }
            }
            None => (),
        }
        Ok(())
    }

    pub fn pairwise_for(&self, wpa1: bool) -> &[Cipher] {
        if wpa1 {
            &self.wpa_pairwise[..]
        } else {
            &self.rsn_pairwise[..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const FT_CONFIG: &str = r#"
        ssid = "test-ft"
        wpa = 2
        wpa_key_mgmt = ["FT-PSK", "WPA-PSK"]
        rsn_pairwise = ["CCMP"]
        wpa_passphrase = "12345678"
        ieee80211w = 1

        [ft]
        mobility_domain = "a1b2"
        nas_identifier = "nas1.w1.fi"
        r1_key_holder = "02:00:00:00:03:00"
        pmk_r1_push = true
        r0kh = [
            "02:00:00:00:03:00 nas1.w1.fi 100102030405060708090a0b0c0d0e0f",
            "02:00:00:00:04:00 nas2.w1.fi 300102030405060708090a0b0c0d0e0f",
        ]
        r1kh = ["02:00:00:00:04:00 00:01:02:03:04:06 200102030405060708090a0b0c0d0e0f"]
    "#;

    #[test]
    fn load_ft_config() {
        let config = AuthenticatorConfig::from_toml_str(FT_CONFIG).expect("valid config");
        assert_eq!(config.ssid, b"test-ft".to_vec());
        assert_eq!(config.akms, vec![Akm::new_dot11(akm::FT_PSK), Akm::new_dot11(akm::PSK)]);
        assert_eq!(config.group_cipher, Cipher::new_dot11(cipher::CCMP_128));
        assert_eq!(config.mfp, MfpPolicy::Optional);
        assert!(config.psk.is_some());

        let ft = config.ft.expect("FT config");
        assert_eq!(ft.mobility_domain, [0xa1, 0xb2]);
        assert_eq!(ft.nas_identifier, b"nas1.w1.fi".to_vec());
        assert_eq!(ft.r1_key_holder, [2, 0, 0, 0, 3, 0]);
        assert!(ft.pmk_r1_push);
        assert_eq!(ft.pull_timeout, Duration::from_millis(DEFAULT_FT_PULL_TIMEOUT_MS));
        assert_eq!(ft.r0khs.len(), 2);
        assert_eq!(ft.find_r0kh(b"nas2.w1.fi").map(|r| r.addr), Some([2, 0, 0, 0, 4, 0]));
        assert_eq!(ft.r1khs[0].id, [0, 1, 2, 3, 4, 6]);
        assert_eq!(ft.r1khs[0].key.len(), 16);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = AuthenticatorConfig::from_toml_str(
            r#"
            ssid = "plain"
            wpa_psk = "0101010101010101010101010101010101010101010101010101010101010101"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.wpa_mode, WpaMode::Rsn);
        assert_eq!(config.wpa_pairwise_update_count, 4);
        assert_eq!(config.wpa_group_update_count, 4);
        assert_eq!(config.wpa_group_rekey, Some(Duration::from_secs(86400)));
        assert_eq!(config.wpa_gmk_rekey, None);
        assert_eq!(config.eapol_timeout_first, Duration::from_millis(100));
        assert_eq!(config.pmksa_cache_size, 32);
        assert_eq!(config.psk, Some([1u8; 32]));
        assert!(config.ft.is_none());
    }

    #[test]
    fn mixed_mode_selects_tkip_group() {
        let config = AuthenticatorConfig::from_toml_str(
            r#"
            ssid = "mixed"
            wpa = 3
            wpa_pairwise = ["TKIP"]
            rsn_pairwise = ["CCMP"]
            "#,
        )
        .expect("valid config");
        assert_eq!(config.group_cipher, Cipher::new_dot11(cipher::TKIP));
        assert_eq!(config.wpa_pairwise, vec![Cipher { oui: wpa::OUI, suite_type: cipher::TKIP }]);
    }

    #[test]
    fn zero_group_rekey_disables_timer() {
        let config = AuthenticatorConfig::from_toml_str("ssid = \"a\"\nwpa_group_rekey = 0")
            .expect("valid config");
        assert_eq!(config.wpa_group_rekey, None);
    }

    #[test]
    fn reject_unknown_fields() {
        assert_matches!(
            AuthenticatorConfig::from_toml_str("ssid = \"a\"\nbogus = 1"),
            Err(ConfigError::Parse(_))
        );
    }

    #[test]
    fn reject_unknown_akm() {
        assert_matches!(
            AuthenticatorConfig::from_toml_str("ssid = \"a\"\nwpa_key_mgmt = [\"OWE\"]"),
            Err(ConfigError::InvalidValue { field: "wpa_key_mgmt", .. })
        );
    }

    #[test]
    fn reject_ft_akm_without_ft_section() {
        assert_matches!(
            AuthenticatorConfig::from_toml_str("ssid = \"a\"\nwpa_key_mgmt = [\"FT-PSK\"]"),
            Err(ConfigError::Inconsistent(_))
        );
    }

    #[test]
    fn reject_beacon_protection_without_mfp() {
        assert_matches!(
            AuthenticatorConfig::from_toml_str("ssid = \"a\"\nbeacon_prot = true"),
            Err(ConfigError::Inconsistent(_))
        );
    }

    #[test]
    fn reject_short_r0kh_key() {
        let config = FT_CONFIG.replace("100102030405060708090a0b0c0d0e0f", "1001");
        assert_matches!(
            AuthenticatorConfig::from_toml_str(&config),
            Err(ConfigError::InvalidValue { field: "r0kh", .. })
        );
    }

    #[test]
    fn reject_sae_in_wpa1() {
        assert_matches!(
            AuthenticatorConfig::from_toml_str(
                "ssid = \"a\"\nwpa = 1\nwpa_key_mgmt = [\"SAE\"]"
            ),
            Err(ConfigError::Inconsistent(_))
        );
    }

    #[test]
    fn suite_b_192_is_rsn_only() {
        let config = AuthenticatorConfig::from_toml_str(
            "ssid = \"a\"\nwpa = 2\nwpa_key_mgmt = [\"WPA-EAP-SUITE-B-192\"]\nrsn_pairwise = [\"GCMP-256\"]",
        )
        .expect("valid config");
        assert_eq!(config.akms, vec![Akm::new_dot11(akm::EAP_SUITEB_SHA384)]);
        assert_matches!(
            AuthenticatorConfig::from_toml_str(
                "ssid = \"a\"\nwpa = 3\nwpa_key_mgmt = [\"WPA-EAP-SUITE-B-192\"]"
            ),
            Err(ConfigError::Inconsistent(_))
        );
    }

    #[test]
    fn group_failure_and_strict_rekey_are_independent() {
        let config = AuthenticatorConfig::from_toml_str(
            "ssid = \"a\"\nwpa_strict_rekey = true\nwpa_disable_disconnect_on_group_failure = false",
        )
        .expect("valid config");
        assert!(config.wpa_strict_rekey);
        assert!(!config.wpa_disable_disconnect_on_group_failure);
    }
}
