// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::keys::{PmkR0, PmkR0Name, PmkR1, PmkR1Name};
use crate::ie::rsn::cipher::Cipher;
use crate::mac::MacAddr;
use std::collections::HashMap;

#[derive(Clone, PartialEq, Eq)]
pub struct PmkR0Entry {
    pub pmk_r0: PmkR0,
    pub pmk_r0_name: PmkR0Name,
    pub pairwise: Cipher,
    pub vlan_id: u16,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PmkR1Entry {
    pub pmk_r1: PmkR1,
    pub pmk_r1_name: PmkR1Name,
    pub pmk_r0_name: PmkR0Name,
    pub pairwise: Cipher,
    pub vlan_id: u16,
}

impl std::fmt::Debug for PmkR1Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmkR1Entry")
            .field("pmk_r1_name", &self.pmk_r1_name)
            .field("pairwise", &self.pairwise)
            .field("vlan_id", &self.vlan_id)
            .finish()
    }
}

/// PMK-R0s held as R0KH and PMK-R1s held as R1KH. Entries never expire.
#[derive(Default)]
pub struct FtKeyCache {
    r0: HashMap<(MacAddr, PmkR0Name), PmkR0Entry>,
    r1: HashMap<(MacAddr, PmkR1Name), PmkR1Entry>,
}

impl FtKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_pmk_r0(&mut self, sta: &MacAddr, entry: PmkR0Entry) {
        self.r0.insert((*sta, entry.pmk_r0_name), entry);
    }

    pub fn get_pmk_r0(&self, sta: &MacAddr, pmk_r0_name: &PmkR0Name) -> Option<&PmkR0Entry> {
        self.r0.get(&(*sta, *pmk_r0_name))
    }

    pub fn store_pmk_r1(&mut self, sta: &MacAddr, entry: PmkR1Entry) {
        self.r1.insert((*sta, entry.pmk_r1_name), entry);
    }

    pub fn get_pmk_r1(&self, sta: &MacAddr, pmk_r1_name: &PmkR1Name) -> Option<&PmkR1Entry> {
        self.r1.get(&(*sta, *pmk_r1_name))
    }

    pub fn r0_len(&self) -> usize {
        self.r0.len()
    }

    pub fn r1_len(&self) -> usize {
        self.r1.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::rsn::cipher;

    const STA: MacAddr = [2, 0, 0, 0, 2, 0];

    #[test]
    fn keyed_by_station_and_name() {
        let mut cache = FtKeyCache::new();
        let entry = PmkR1Entry {
            pmk_r1: [1; 32],
            pmk_r1_name: [2; 16],
            pmk_r0_name: [3; 16],
            pairwise: Cipher::new_dot11(cipher::CCMP_128),
            vlan_id: 0,
        };
        cache.store_pmk_r1(&STA, entry.clone());
        assert_eq!(cache.get_pmk_r1(&STA, &[2; 16]), Some(&entry));
        assert_eq!(cache.get_pmk_r1(&[2, 0, 0, 0, 2, 1], &[2; 16]), None);
        assert_eq!(cache.get_pmk_r1(&STA, &[3; 16]), None);

        cache.store_pmk_r0(
            &STA,
            PmkR0Entry {
                pmk_r0: [4; 32],
                pmk_r0_name: [3; 16],
                pairwise: Cipher::new_dot11(cipher::CCMP_128),
                vlan_id: 0,
            },
        );
        assert_eq!(cache.get_pmk_r0(&STA, &[3; 16]).map(|e| e.pmk_r0), Some([4; 32]));
        assert_eq!((cache.r0_len(), cache.r1_len()), (1, 1));
    }
}
