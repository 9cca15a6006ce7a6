// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils;
use crate::ie::rsn::akm::Akm;
use crate::ie::rsn::pmkid::Pmkid;
use crate::mac::{MacAddr, MacFmt};
use crate::Error;
use log::debug;
use std::collections::VecDeque;

/// A cached PMK security association, IEEE Std 802.11-2020, 12.6.14.
#[derive(Clone, PartialEq, Eq)]
pub struct PmksaEntry {
    pub pmk: Vec<u8>,
    pub pmkid: Pmkid,
    pub akm: Akm,
    pub aa: MacAddr,
    pub spa: MacAddr,
    pub vlan_id: Option<u16>,
    /// Whether the entry was created by RSN pre-authentication.
    pub preauth: bool,
}

impl std::fmt::Debug for PmksaEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmksaEntry")
            .field("pmkid", &self.pmkid)
            .field("akm", &self.akm)
            .field("spa", &MacFmt(&self.spa))
            .field("vlan_id", &self.vlan_id)
            .finish()
    }
}

/// A bounded PMKSA cache. When full, the oldest entry is evicted.
pub struct PmksaCache {
    entries: VecDeque<PmksaEntry>,
    capacity: usize,
}

impl PmksaCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Caches a PMK from a completed 802.1X or SAE authentication and returns its PMKID.
    pub fn add(
        &mut self,
        aa: &MacAddr,
        spa: &MacAddr,
        pmk: &[u8],
        akm: &Akm,
        vlan_id: Option<u16>,
    ) -> Result<Pmkid, Error> {
        self.insert(aa, spa, pmk, akm, vlan_id, false)
    }

    /// Caches a PMK obtained through RSN pre-authentication.
    pub fn add_preauth(
        &mut self,
        aa: &MacAddr,
        spa: &MacAddr,
        pmk: &[u8],
        akm: &Akm,
    ) -> Result<Pmkid, Error> {
        self.insert(aa, spa, pmk, akm, None, true)
    }

    fn insert(
        &mut self,
        aa: &MacAddr,
        spa: &MacAddr,
        pmk: &[u8],
        akm: &Akm,
        vlan_id: Option<u16>,
        preauth: bool,
    ) -> Result<Pmkid, Error> {
        let pmkid = crypto_utils::pmkid(pmk, aa, spa, akm)?;
        // A station holds a single PMKSA per authenticator.
        self.entries.retain(|e| !(e.spa == *spa && e.aa == *aa));
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                debug!("PMKSA cache full, evicting entry for {}", MacFmt(&evicted.spa));
            }
        }
        self.entries.push_back(PmksaEntry {
            pmk: pmk.to_vec(),
            pmkid,
            akm: *akm,
            aa: *aa,
            spa: *spa,
            vlan_id,
            preauth,
        });
        Ok(pmkid)
    }

    pub fn get(&self, spa: &MacAddr, pmkid: &Pmkid) -> Option<&PmksaEntry> {
        self.entries.iter().find(|e| e.spa == *spa && e.pmkid == *pmkid)
    }

    /// Looks up the first PMKID of the list that is cached for the station.
    pub fn find_any(&self, spa: &MacAddr, pmkids: &[Pmkid]) -> Option<&PmksaEntry> {
        pmkids.iter().find_map(|pmkid| self.get(spa, pmkid))
    }

    /// Looks up an entry by PMKID alone. Used to serve opportunistic key caching requests of
    /// other authenticators of the ESS.
    pub fn get_by_pmkid(&self, pmkid: &Pmkid) -> Option<&PmksaEntry> {
        self.entries.iter().find(|e| e.pmkid == *pmkid)
    }

    pub fn remove(&mut self, spa: &MacAddr) {
        self.entries.retain(|e| e.spa != *spa);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::rsn::akm;

    const AA: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x01, 0x00];

    fn sta(i: u8) -> MacAddr {
        [0x02, 0x00, 0x00, 0x00, 0x02, i]
    }

    #[test]
    fn add_and_lookup() {
        let mut cache = PmksaCache::new(4);
        let psk = Akm::new_dot11(akm::EAP);
        let pmkid = cache.add(&AA, &sta(1), &[7; 32], &psk, Some(3)).expect("add PMKSA");
        let expected = crypto_utils::pmkid(&[7; 32], &AA, &sta(1), &psk).expect("PMKID");
        assert_eq!(pmkid, expected);

        let entry = cache.get(&sta(1), &pmkid).expect("cached entry");
        assert_eq!(entry.pmk, vec![7; 32]);
        assert_eq!(entry.vlan_id, Some(3));
        assert!(!entry.preauth);
        assert!(cache.get(&sta(2), &pmkid).is_none());
        assert_eq!(cache.find_any(&sta(1), &[[0; 16], pmkid]).map(|e| e.pmkid), Some(pmkid));
    }

    #[test]
    fn sha256_akm_pmkid_differs() {
        let mut cache = PmksaCache::new(4);
        let a = cache.add(&AA, &sta(1), &[7; 32], &Akm::new_dot11(akm::EAP), None).expect("add");
        let b = cache
            .add(&AA, &sta(1), &[7; 32], &Akm::new_dot11(akm::EAP_SHA256), None)
            .expect("add");
        assert_ne!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_oldest() {
        let mut cache = PmksaCache::new(2);
        let eap = Akm::new_dot11(akm::EAP);
        let first = cache.add(&AA, &sta(1), &[1; 32], &eap, None).expect("add");
        cache.add(&AA, &sta(2), &[2; 32], &eap, None).expect("add");
        cache.add_preauth(&AA, &sta(3), &[3; 32], &eap).expect("add");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&sta(1), &first).is_none());
        assert!(cache.get_by_pmkid(&first).is_none());
    }

    #[test]
    fn remove_station() {
        let mut cache = PmksaCache::new(2);
        let pmkid = cache.add(&AA, &sta(1), &[1; 32], &Akm::new_dot11(akm::EAP), None).expect("add");
        cache.remove(&sta(1));
        assert!(cache.get(&sta(1), &pmkid).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn debug_hides_pmk() {
        let mut cache = PmksaCache::new(2);
        let pmkid = cache.add(&AA, &sta(1), &[9; 32], &Akm::new_dot11(akm::EAP), None).expect("add");
        let debug = format!("{:?}", cache.get(&sta(1), &pmkid).expect("cached entry"));
        assert!(debug.contains("02:00:00:00:02:01"));
        assert!(!debug.contains("pmk:"));
    }
}
