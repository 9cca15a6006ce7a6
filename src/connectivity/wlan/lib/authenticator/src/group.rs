// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::{AuthenticatorConfig, MfpPolicy};
use crate::crypto_utils::nonce::{random_bytes, Nonce, NonceReader};
use crate::ie::rsn::cipher::Cipher;
use crate::key::gtk::{derive_group_key, BIGTK_LABEL, GMK_LEN, GTK_LABEL, IGTK_LABEL};
use crate::key::{KeyType, SetKeyDescriptor};
use crate::mac::{MacAddr, BCAST_ADDR};
use crate::ops::AuthenticatorOps;
use crate::Error;
use log::{error, info};
use std::collections::hash_map::{Entry, HashMap};
use std::mem;

pub const DEFAULT_VLAN_ID: u16 = 0;

const GTK_KEY_IDS: [u16; 2] = [1, 2];
const IGTK_KEY_IDS: [u16; 2] = [4, 5];
const BIGTK_KEY_IDS: [u16; 2] = [6, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    GtkInit,
    SetKeys,
    SetKeysDone,
    FatalFailure,
}

/// What the owner of the group has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStep {
    /// The state changed, step again.
    Changed,
    /// New keys were generated and must be delivered to every station holding a PTK.
    Distribute,
    /// Installing the group keys failed. Every station of the group must be disconnected.
    Fatal,
}

/// A pair of key slots addressed by key ID. GN names the slot holding the current key and GM
/// the one holding the previous key.
#[derive(Debug)]
struct KeySlots {
    ids: [u16; 2],
    keys: [Vec<u8>; 2],
    gn: u16,
    gm: u16,
}

impl KeySlots {
    fn new(ids: [u16; 2]) -> Self {
        Self { ids, keys: [vec![], vec![]], gn: ids[0], gm: ids[1] }
    }

    fn reset(&mut self) {
        self.keys = [vec![], vec![]];
        self.gn = self.ids[0];
        self.gm = self.ids[1];
    }

    fn swap(&mut self) {
        mem::swap(&mut self.gn, &mut self.gm);
    }

    fn slot(&self, id: u16) -> usize {
        if id == self.ids[0] {
            0
        } else {
            1
        }
    }

    fn current(&self) -> &[u8] {
        &self.keys[self.slot(self.gn)][..]
    }

    fn set_current(&mut self, key: Vec<u8>) {
        let slot = self.slot(self.gn);
        self.keys[slot] = key;
    }
}

/// Group key state of one VLAN.
pub struct Group {
    pub vlan_id: u16,
    state: GroupState,
    g_init: bool,
    gtk_authenticator: bool,
    /// Requests a rekey on the next step.
    pub gtk_rekey: bool,
    gtk: KeySlots,
    igtk: Option<KeySlots>,
    bigtk: Option<KeySlots>,
    gmk: Vec<u8>,
    counter: NonceReader,
    gnonce: Nonce,
    cipher: Cipher,
    mgmt_cipher: Cipher,
    /// Stations which still have to acknowledge the current rekey.
    pub gkey_done_stations: usize,
    /// Stations holding the current GTK.
    pub gno_stations: usize,
    ref_count: usize,
    pub first_sta_seen: bool,
    pub reject_4way_hs_for_entropy: bool,
}

impl Group {
    pub fn new(vlan_id: u16, aa: &MacAddr, config: &AuthenticatorConfig) -> Result<Self, Error> {
        let mgmt = config.mfp != MfpPolicy::Disabled;
        Ok(Self {
            vlan_id,
            state: GroupState::GtkInit,
            g_init: true,
            gtk_authenticator: false,
            gtk_rekey: false,
            gtk: KeySlots::new(GTK_KEY_IDS),
            igtk: if mgmt { Some(KeySlots::new(IGTK_KEY_IDS)) } else { None },
            bigtk: if mgmt && config.beacon_prot { Some(KeySlots::new(BIGTK_KEY_IDS)) } else { None },
            gmk: random_bytes(GMK_LEN),
            counter: NonceReader::new(aa)?,
            gnonce: [0u8; 32],
            cipher: config.group_cipher,
            mgmt_cipher: config.group_mgmt_cipher,
            gkey_done_stations: 0,
            gno_stations: 0,
            ref_count: 0,
            first_sta_seen: false,
            reject_4way_hs_for_entropy: false,
        })
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    pub fn mgmt_cipher(&self) -> Cipher {
        self.mgmt_cipher
    }

    pub fn gn(&self) -> u16 {
        self.gtk.gn
    }

    pub fn gm(&self) -> u16 {
        self.gtk.gm
    }

    pub fn gtk(&self) -> &[u8] {
        self.gtk.current()
    }

    /// Current IGTK and its key ID, if management frame protection is enabled.
    pub fn igtk(&self) -> Option<(u16, &[u8])> {
        self.igtk.as_ref().map(|slots| (slots.gn, slots.current()))
    }

    /// Current BIGTK and its key ID, if beacon protection is enabled.
    pub fn bigtk(&self) -> Option<(u16, &[u8])> {
        self.bigtk.as_ref().map(|slots| (slots.gn, slots.current()))
    }

    pub fn gnonce(&self) -> &Nonce {
        &self.gnonce
    }

    fn init_gmk_and_counter(&mut self, aa: &MacAddr) -> Result<(), Error> {
        self.gmk = random_bytes(GMK_LEN);
        self.counter = NonceReader::new(aa)?;
        Ok(())
    }

    /// Replaces the GMK. Keys derived afterwards use the new GMK.
    pub fn rekey_gmk(&mut self) {
        self.gmk = random_bytes(GMK_LEN);
    }

    fn gtk_update(&mut self, aa: &MacAddr) -> Result<(), Error> {
        self.gnonce = self.counter.next();
        let gtk_len = self.cipher.tk_bytes().ok_or(Error::UnsupportedCipher(self.cipher))?;
        let gtk = derive_group_key(&self.gmk[..], GTK_LABEL, aa, &self.gnonce, gtk_len)?;
        self.gtk.set_current(gtk);
        if self.igtk.is_none() {
            return Ok(());
        }
        let mgmt_len =
            self.mgmt_cipher.tk_bytes().ok_or(Error::UnsupportedCipher(self.mgmt_cipher))?;
        if let Some(igtk) = self.igtk.as_mut() {
            let key = derive_group_key(&self.gmk[..], IGTK_LABEL, aa, &self.gnonce, mgmt_len)?;
            igtk.set_current(key);
        }
        if let Some(bigtk) = self.bigtk.as_mut() {
            let key = derive_group_key(&self.gmk[..], BIGTK_LABEL, aa, &self.gnonce, mgmt_len)?;
            bigtk.set_current(key);
        }
        Ok(())
    }

    fn install_keys(&self, ops: &mut dyn AuthenticatorOps) -> Result<(), Error> {
        let mut keys = vec![SetKeyDescriptor {
            key_type: KeyType::Group,
            address: BCAST_ADDR,
            key_id: self.gtk.gn,
            key: self.gtk.current().to_vec(),
            rsc: 0,
            cipher: self.cipher,
        }];
        if let Some(igtk) = self.igtk.as_ref() {
            keys.push(SetKeyDescriptor {
                key_type: KeyType::Igtk,
                address: BCAST_ADDR,
                key_id: igtk.gn,
                key: igtk.current().to_vec(),
                rsc: 0,
                cipher: self.mgmt_cipher,
            });
        }
        if let Some(bigtk) = self.bigtk.as_ref() {
            keys.push(SetKeyDescriptor {
                key_type: KeyType::Bigtk,
                address: BCAST_ADDR,
                key_id: bigtk.gn,
                key: bigtk.current().to_vec(),
                rsc: 0,
                cipher: self.mgmt_cipher,
            });
        }
        for key in keys.iter() {
            ops.set_key(self.vlan_id, key).map_err(Error::SetKey)?;
        }
        Ok(())
    }

    /// Refreshes GMK and counter from fresh randomness when the first station shows up, since
    /// the entropy available at start up may have been poor.
    pub fn first_station(
        &mut self,
        aa: &MacAddr,
        ops: &mut dyn AuthenticatorOps,
    ) -> Result<(), Error> {
        info!("re-initializing GMK and counter of VLAN {} on first station", self.vlan_id);
        if !ops.random_pool_ready() {
            self.reject_4way_hs_for_entropy = true;
            return Err(Error::EntropyNotReady);
        }
        let result = self
            .init_gmk_and_counter(aa)
            .and_then(|()| self.gtk_update(aa))
            .and_then(|()| self.install_keys(ops));
        match result {
            Ok(()) => {
                self.first_sta_seen = true;
                self.reject_4way_hs_for_entropy = false;
                Ok(())
            }
            Err(e) => {
                self.first_sta_seen = false;
                self.reject_4way_hs_for_entropy = true;
                Err(e)
            }
        }
    }

    /// Runs a single transition of the group state machine. Returns None once idle.
    pub fn step(
        &mut self,
        aa: &MacAddr,
        ops: &mut dyn AuthenticatorOps,
    ) -> Result<Option<GroupStep>, Error> {
        if self.g_init {
            self.gtk_init(aa)?;
            return Ok(Some(GroupStep::Changed));
        }
        match self.state {
            GroupState::FatalFailure => Ok(None),
            GroupState::GtkInit if self.gtk_authenticator => Ok(Some(self.setkeysdone(ops))),
            GroupState::SetKeysDone if self.gtk_rekey => {
                self.setkeys(aa)?;
                Ok(Some(GroupStep::Distribute))
            }
            GroupState::SetKeys if self.gkey_done_stations == 0 => Ok(Some(self.setkeysdone(ops))),
            GroupState::SetKeys if self.gtk_rekey => {
                self.setkeys(aa)?;
                Ok(Some(GroupStep::Distribute))
            }
            _ => Ok(None),
        }
    }

    fn gtk_init(&mut self, aa: &MacAddr) -> Result<(), Error> {
        self.state = GroupState::GtkInit;
        self.g_init = false;
        self.gtk.reset();
        if let Some(igtk) = self.igtk.as_mut() {
            igtk.reset();
        }
        if let Some(bigtk) = self.bigtk.as_mut() {
            bigtk.reset();
        }
        self.gtk_update(aa)?;
        self.gtk_authenticator = true;
        Ok(())
    }

    fn setkeys(&mut self, aa: &MacAddr) -> Result<(), Error> {
        self.state = GroupState::SetKeys;
        self.gtk_rekey = false;
        self.gtk.swap();
        if let Some(igtk) = self.igtk.as_mut() {
            igtk.swap();
        }
        if let Some(bigtk) = self.bigtk.as_mut() {
            bigtk.swap();
        }
        self.gtk_update(aa)?;
        self.gkey_done_stations = 0;
        info!("VLAN {}: new GTK with key ID {}", self.vlan_id, self.gtk.gn);
        Ok(())
    }

    fn setkeysdone(&mut self, ops: &mut dyn AuthenticatorOps) -> GroupStep {
        match self.install_keys(ops) {
            Ok(()) => {
                self.state = GroupState::SetKeysDone;
                GroupStep::Changed
            }
            Err(e) => {
                error!("VLAN {}: failed to install group keys: {}", self.vlan_id, e);
                self.state = GroupState::FatalFailure;
                GroupStep::Fatal
            }
        }
    }

    /// Called when a station finished (or gave up on) the current group key handshake.
    pub fn station_done(&mut self) {
        self.gkey_done_stations = self.gkey_done_stations.saturating_sub(1);
    }
}

/// Groups keyed by VLAN ID. Groups are created on first use and freed with their last
/// reference, except for the default group.
#[derive(Default)]
pub struct GroupArena {
    groups: HashMap<u16, Group>,
}

impl GroupArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reference on the group of a VLAN, creating it if needed.
    pub fn acquire(
        &mut self,
        vlan_id: u16,
        aa: &MacAddr,
        config: &AuthenticatorConfig,
    ) -> Result<&mut Group, Error> {
        let group = match self.groups.entry(vlan_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                info!("creating group for VLAN {}", vlan_id);
                e.insert(Group::new(vlan_id, aa, config)?)
            }
        };
        group.ref_count += 1;
        Ok(group)
    }

    /// Drops a reference. Returns true if the group was freed.
    pub fn release(&mut self, vlan_id: u16) -> bool {
        let free = match self.groups.get_mut(&vlan_id) {
            Some(group) => {
                group.ref_count = group.ref_count.saturating_sub(1);
                group.ref_count == 0 && vlan_id != DEFAULT_VLAN_ID
            }
            None => false,
        };
        if free {
            info!("freeing group of VLAN {}", vlan_id);
            self.groups.remove(&vlan_id);
        }
        free
    }

    pub fn get(&self, vlan_id: u16) -> Option<&Group> {
        self.groups.get(&vlan_id)
    }

    pub fn get_mut(&mut self, vlan_id: u16) -> Option<&mut Group> {
        self.groups.get_mut(&vlan_id)
    }

    pub fn vlan_ids(&self) -> Vec<u16> {
        self.groups.keys().copied().collect()
    }

    pub fn ref_count(&self, vlan_id: u16) -> usize {
        self.groups.get(&vlan_id).map_or(0, |g| g.ref_count)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{self, RecordingOps};

    const AA: MacAddr = [0x02, 0, 0, 0, 0x01, 0];

    fn run_to_idle(group: &mut Group, ops: &mut RecordingOps) -> Vec<GroupStep> {
        let mut steps = vec![];
        while let Some(step) = group.step(&AA, ops).expect("group step") {
            steps.push(step);
            if step == GroupStep::Fatal {
                break;
            }
        }
        steps
    }

    #[test]
    fn init_installs_keys() {
        let mut config = test_util::psk_config();
        config.mfp = MfpPolicy::Optional;
        config.beacon_prot = true;
        let mut ops = RecordingOps::new();
        let mut group = Group::new(0, &AA, &config).expect("group");
        run_to_idle(&mut group, &mut ops);
        assert_eq!(group.state(), GroupState::SetKeysDone);
        assert_eq!(group.gn(), 1);
        assert_eq!(group.gm(), 2);
        assert_eq!(group.gtk().len(), 16);
        assert_eq!(group.igtk().map(|(id, k)| (id, k.len())), Some((4, 16)));
        assert_eq!(group.bigtk().map(|(id, _)| id), Some(6));
        let ids: Vec<(KeyType, u16)> = ops.keys.iter().map(|(_, k)| (k.key_type, k.key_id)).collect();
        assert_eq!(ids, vec![(KeyType::Group, 1), (KeyType::Igtk, 4), (KeyType::Bigtk, 6)]);
    }

    #[test]
    fn rekey_swaps_slots() {
        let config = test_util::psk_config();
        let mut ops = RecordingOps::new();
        let mut group = Group::new(0, &AA, &config).expect("group");
        run_to_idle(&mut group, &mut ops);
        let first_gtk = group.gtk().to_vec();

        group.gtk_rekey = true;
        assert_eq!(group.step(&AA, &mut ops).expect("step"), Some(GroupStep::Distribute));
        assert_eq!(group.state(), GroupState::SetKeys);
        assert_eq!((group.gn(), group.gm()), (2, 1));
        assert_ne!(group.gn(), group.gm());
        assert_ne!(group.gtk(), &first_gtk[..]);

        // Two stations still have to acknowledge the new key.
        group.gkey_done_stations = 2;
        assert_eq!(group.step(&AA, &mut ops).expect("step"), None);
        group.station_done();
        assert_eq!(group.step(&AA, &mut ops).expect("step"), None);
        group.station_done();
        assert_eq!(group.step(&AA, &mut ops).expect("step"), Some(GroupStep::Changed));
        assert_eq!(group.state(), GroupState::SetKeysDone);
        assert_eq!(ops.keys.last().map(|(_, k)| k.key_id), Some(2));
    }

    #[test]
    fn install_failure_is_fatal() {
        let config = test_util::psk_config();
        let mut ops = RecordingOps::new();
        ops.fail_set_key = true;
        let mut group = Group::new(0, &AA, &config).expect("group");
        assert_eq!(run_to_idle(&mut group, &mut ops), vec![GroupStep::Changed, GroupStep::Fatal]);
        assert_eq!(group.state(), GroupState::FatalFailure);
        group.gtk_rekey = true;
        assert_eq!(group.step(&AA, &mut ops).expect("step"), None);
    }

    #[test]
    fn first_station_requires_entropy() {
        let config = test_util::psk_config();
        let mut ops = RecordingOps::new();
        let mut group = Group::new(0, &AA, &config).expect("group");
        run_to_idle(&mut group, &mut ops);

        ops.random_ready = false;
        assert!(group.first_station(&AA, &mut ops).is_err());
        assert!(group.reject_4way_hs_for_entropy);
        assert!(!group.first_sta_seen);

        ops.random_ready = true;
        let gtk = group.gtk().to_vec();
        group.first_station(&AA, &mut ops).expect("first station");
        assert!(group.first_sta_seen);
        assert!(!group.reject_4way_hs_for_entropy);
        assert_ne!(group.gtk(), &gtk[..]);
    }

    #[test]
    fn arena_refcounting() {
        let config = test_util::psk_config();
        let mut arena = GroupArena::new();
        arena.acquire(DEFAULT_VLAN_ID, &AA, &config).expect("default group");
        arena.acquire(7, &AA, &config).expect("VLAN group");
        arena.acquire(7, &AA, &config).expect("VLAN group");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.ref_count(7), 2);

        assert!(!arena.release(7));
        assert!(arena.release(7));
        assert!(arena.get(7).is_none());

        // The default group outlives its last reference.
        assert!(!arena.release(DEFAULT_VLAN_ID));
        assert!(arena.get(DEFAULT_VLAN_ID).is_some());
    }
}
