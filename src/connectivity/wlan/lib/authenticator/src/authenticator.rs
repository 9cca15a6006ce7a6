// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::{AuthenticatorConfig, MfpPolicy};
use crate::crypto_utils::nonce::Nonce;
use crate::eapol::{key_type, KeyFrame};
use crate::ft::keys::xxkey_from_msk;
use crate::ft::{FtAuthOutcome, FtAuthRequest, FtState};
use crate::group::{Group, GroupArena, GroupStep, DEFAULT_VLAN_ID};
use crate::ie::mde::{FtCapabilityAndPolicy, Mde};
use crate::ie::rsn::akm::Akm;
use crate::ie::rsn::cipher::Cipher;
use crate::ie::rsn::pmkid::Pmkid;
use crate::ie::rsn::rsne::{RsnCapabilities, Rsne};
use crate::ie::rsnxe::{self, Rsnxe};
use crate::ie::wpa::WpaIe;
use crate::key::ptk::Ptk;
use crate::key::{KeyType, Pmk, SetKeyDescriptor};
use crate::mac::{MacAddr, MacFmt};
use crate::ops::AuthenticatorOps;
use crate::organization::Oui;
use crate::pmksa::{PmksaCache, PmksaEntry};
use crate::reason::ReasonCode;
use crate::station::{MloLink, PtkState, Received, Station, StationCounters, StepCtx};
use crate::timer::{EventId, Scheduler, Timer, TimerEvent};
use crate::validate::{validate_ie, IeValidation, PeerIes};
use crate::Error;
use log::{debug, error, info, warn};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Window in which a second Michael MIC failure activates countermeasures, and the time they
/// stay active. IEEE Std 802.11-2020, 12.5.2.4.
const MIC_FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// An entry of the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Work {
    /// Step a station. Items of a replaced or removed station are skipped.
    Station { addr: MacAddr, generation: u64 },
    Group(u16),
}

/// Security elements the BSS advertises. They are repeated in message 3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnIes {
    pub rsne: Option<Rsne>,
    pub wpa: Option<WpaIe>,
    pub rsnxe: Option<Rsnxe>,
    pub mde: Option<Mde>,
}

impl OwnIes {
    pub fn from_config(config: &AuthenticatorConfig) -> Self {
        let mfp = config.mfp != MfpPolicy::Disabled;
        let rsne = if config.wpa_mode.rsn_enabled() {
            let mut caps = RsnCapabilities(0);
            caps.set_mgmt_frame_protection_cap(mfp);
            caps.set_mgmt_frame_protection_req(config.mfp == MfpPolicy::Required);
            caps.set_ocvc(config.ocv);
            Some(Rsne {
                group_data_cipher_suite: Some(config.group_cipher),
                pairwise_cipher_suites: config.rsn_pairwise.clone(),
                akm_suites: config.akms.clone(),
                rsn_capabilities: Some(caps),
                group_mgmt_cipher_suite: if mfp { Some(config.group_mgmt_cipher) } else { None },
                ..Rsne::new()
            })
        } else {
            None
        };

        // WPA reuses the IEEE suite types under the Microsoft OUI.
        let wpa = if config.wpa_mode.wpa1_enabled() {
            let vendor_cipher = |c: &Cipher| Cipher { oui: Oui::MSFT, suite_type: c.suite_type };
            Some(WpaIe {
                multicast_cipher: vendor_cipher(&config.group_cipher),
                unicast_cipher_list: config.wpa_pairwise.iter().map(vendor_cipher).collect(),
                akm_list: config
                    .akms
                    .iter()
                    .map(|a| Akm { oui: Oui::MSFT, suite_type: a.suite_type })
                    .collect(),
            })
        } else {
            None
        };

        let rsnxe = if config.wpa_mode.rsn_enabled() && config.akms.iter().any(Akm::is_sae) {
            Some(Rsnxe::with_capabilities(&[rsnxe::SAE_H2E]))
        } else {
            None
        };

        let mde = config.ft.as_ref().map(|ft| {
            let mut ft_capability = FtCapabilityAndPolicy(0);
            ft_capability.set_ft_over_ds(ft.ft_over_ds);
            Mde { mdid: ft.mobility_domain, ft_capability }
        });

        Self { rsne, wpa, rsnxe, mde }
    }
}

/// Authenticator-wide counters of the RSNA MIB.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// dot11RSNA4WayHandshakeFailures
    pub four_way_handshake_failures: u64,
    /// dot11RSNATKIPCounterMeasuresInvoked
    pub tkip_countermeasures_invoked: u64,
    pub gtk_rekeys: u64,
}

/// Key management of a BSS.
///
/// Every entry point runs the affected state machines until they settle and reports side
/// effects through `O`. The owner calls [`Authenticator::on_timeout`] for every event ID handed
/// out by the scheduler.
pub struct Authenticator<O: AuthenticatorOps> {
    config: AuthenticatorConfig,
    addr: MacAddr,
    own_ies: OwnIes,
    ops: O,
    timer: Timer<TimerEvent>,
    groups: GroupArena,
    pmksa: PmksaCache,
    ft: FtState,
    stations: HashMap<MacAddr, Station>,
    work: VecDeque<Work>,
    next_generation: u64,
    counters: Counters,
    mic_failure_window: Option<EventId>,
    countermeasures: Option<EventId>,
}

impl<O: AuthenticatorOps> Authenticator<O> {
    pub fn new(
        config: AuthenticatorConfig,
        addr: MacAddr,
        ops: O,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let own_ies = OwnIes::from_config(&config);
        let pmksa = PmksaCache::new(config.pmksa_cache_size);
        let mut auth = Self {
            config,
            addr,
            own_ies,
            ops,
            timer: Timer::new(scheduler),
            groups: GroupArena::new(),
            pmksa,
            ft: FtState::new(),
            stations: HashMap::new(),
            work: VecDeque::new(),
            next_generation: 0,
            counters: Counters::default(),
            mic_failure_window: None,
            countermeasures: None,
        };
        auth.groups.acquire(DEFAULT_VLAN_ID, &auth.addr, &auth.config)?;
        auth.work.push_back(Work::Group(DEFAULT_VLAN_ID));
        if let Some(after) = auth.config.wpa_group_rekey {
            auth.timer.schedule_after(after, TimerEvent::GroupRekey);
        }
        if let Some(after) = auth.config.wpa_gmk_rekey {
            auth.timer.schedule_after(after, TimerEvent::GmkRekey);
        }
        auth.drive();
        info!("authenticator {} started", MacFmt(&auth.addr));
        Ok(auth)
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    pub fn own_ies(&self) -> &OwnIes {
        &self.own_ies
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut O {
        &mut self.ops
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn station(&self, addr: &MacAddr) -> Option<&Station> {
        self.stations.get(addr)
    }

    pub fn station_counters(&self, addr: &MacAddr) -> Option<StationCounters> {
        self.stations.get(addr).map(Station::counters)
    }

    pub fn group(&self, vlan_id: u16) -> Option<&Group> {
        self.groups.get(vlan_id)
    }

    pub fn pmksa(&self) -> &PmksaCache {
        &self.pmksa
    }

    pub fn ft(&self) -> &FtState {
        &self.ft
    }

    pub fn countermeasures_active(&self) -> bool {
        self.countermeasures.is_some()
    }

    /// Validates the security elements of a (Re)Association Request and, if they are acceptable,
    /// creates or updates the station's key state on the given VLAN.
    pub fn validate_sta_ie(
        &mut self,
        addr: MacAddr,
        ies: &PeerIes<'_>,
        vlan_id: u16,
    ) -> IeValidation {
        let pmksa = &self.pmksa;
        let ops = &mut self.ops;
        let okc = self.config.okc;
        let mut resolve = |pmkids: &[Pmkid]| -> Option<PmksaEntry> {
            if let Some(entry) = pmksa.find_any(&addr, pmkids) {
                return Some(entry.clone());
            }
            if okc {
                return pmkids.iter().find_map(|pmkid| ops.find_okc_pmksa(&addr, pmkid));
            }
            None
        };
        let ie = match validate_ie(&self.config, ies, &mut resolve) {
            Ok(ie) => ie,
            Err(result) => {
                info!("rejecting security elements of {}: {:?}", MacFmt(&addr), result);
                return result;
            }
        };

        if let Some(entry) = ie.pmksa.as_ref() {
            if entry.aa != self.addr {
                // Opportunistic key caching: the PMK moves over from another authenticator.
                debug!("PMKSA of {} taken over from {}", MacFmt(&addr), MacFmt(&entry.aa));
                if let Err(e) =
                    self.pmksa.add(&self.addr, &addr, &entry.pmk[..], &entry.akm, entry.vlan_id)
                {
                    warn!("failed to cache PMKSA of {}: {}", MacFmt(&addr), e);
                }
            }
        }

        if let Err(e) = self.groups.acquire(vlan_id, &self.addr, &self.config) {
            error!("no group for {} on VLAN {}: {}", MacFmt(&addr), vlan_id, e);
            return IeValidation::AllocFail;
        }
        self.work.push_back(Work::Group(vlan_id));

        match self.stations.get_mut(&addr) {
            Some(sta) => {
                debug!("updating security elements of {}", MacFmt(&addr));
                let old_vlan = sta.vlan_id;
                if old_vlan != vlan_id && sta.has_gtk {
                    sta.has_gtk = false;
                    if let Some(group) = self.groups.get_mut(old_vlan) {
                        group.gno_stations = group.gno_stations.saturating_sub(1);
                    }
                }
                sta.ie = ie;
                sta.vlan_id = vlan_id;
                self.groups.release(old_vlan);
            }
            None => {
                let generation = self.next_generation;
                self.next_generation += 1;
                self.stations.insert(addr, Station::new(addr, generation, vlan_id, ie));
            }
        }
        self.drive();
        IeValidation::Ok
    }

    /// Starts or restarts key management once the station is associated.
    pub fn sta_associated(&mut self, addr: MacAddr) -> Result<(), Error> {
        let sta = self.stations.get_mut(&addr).ok_or(Error::UnknownStation(addr))?;
        if sta.started {
            sta.ev.reauthentication_request = true;
        } else {
            sta.started = true;
            sta.ev.init = true;
            sta.ev.authentication_request = true;
        }
        self.work.push_back(sta.work());
        self.drive();
        Ok(())
    }

    /// The station disassociated or was deauthenticated. Its key state is kept until
    /// [`Authenticator::sta_deinit`].
    pub fn sta_disassociated(&mut self, addr: MacAddr) -> Result<(), Error> {
        let sta = self.stations.get_mut(&addr).ok_or(Error::UnknownStation(addr))?;
        sta.ev.deauthentication_request = true;
        self.work.push_back(sta.work());
        self.drive();
        Ok(())
    }

    /// Removes the station's key state.
    pub fn sta_deinit(&mut self, addr: MacAddr) -> Result<(), Error> {
        let sta = self.stations.remove(&addr).ok_or(Error::UnknownStation(addr))?;
        self.free_station(sta);
        self.drive();
        Ok(())
    }

    /// Completes an asynchronous PSK lookup.
    pub fn psk_lookup_done(&mut self, addr: MacAddr, psks: Vec<Pmk>) -> Result<(), Error> {
        let sta = self.stations.get_mut(&addr).ok_or(Error::UnknownStation(addr))?;
        if !sta.psk_pending {
            debug!("unexpected PSK lookup result for {}", MacFmt(&addr));
            return Ok(());
        }
        sta.psk_pending = false;
        sta.pmk_candidates.extend(psks.iter().map(|psk| psk.to_vec()));
        self.work.push_back(sta.work());
        self.drive();
        Ok(())
    }

    /// Hands in the PMK of a completed 802.1X or SAE authentication. For FT over 802.1X this is
    /// the MSK, whose second 256 bits are the XXKey. For FT-SAE it is the XXKey.
    pub fn set_pmk(&mut self, addr: MacAddr, pmk: &[u8], pmkid: Option<Pmkid>) -> Result<(), Error> {
        let sta = self.stations.get_mut(&addr).ok_or(Error::UnknownStation(addr))?;
        let pmk = if sta.ie.akm.is_ft() && sta.ie.akm.is_ieee8021x() {
            xxkey_from_msk(pmk).ok_or(Error::InvalidKeyLength(pmk.len(), "MSK"))?
        } else {
            pmk
        };
        sta.pmk = Some(pmk.to_vec());
        sta.pmkid = pmkid;
        self.work.push_back(sta.work());
        self.drive();
        Ok(())
    }

    /// Caches the PMKSA of a completed authentication and returns its PMKID.
    pub fn add_pmksa(&mut self, addr: MacAddr, pmk: &[u8], akm: &Akm) -> Result<Pmkid, Error> {
        let vlan_id = self.stations.get(&addr).map(|sta| sta.vlan_id);
        self.pmksa.add(&self.addr, &addr, pmk, akm, vlan_id)
    }

    pub fn pmksa_add_preauth(
        &mut self,
        addr: MacAddr,
        pmk: &[u8],
        akm: &Akm,
    ) -> Result<Pmkid, Error> {
        self.pmksa.add_preauth(&self.addr, &addr, pmk, akm)
    }

    /// Handles an EAPOL-Key frame. Invalid frames are dropped.
    pub fn on_eapol_frame(&mut self, addr: MacAddr, frame: &[u8]) -> Result<(), Error> {
        let mut sta = self.stations.remove(&addr).ok_or(Error::UnknownStation(addr))?;
        let received = self.with_ctx(|ctx| sta.receive(ctx, frame));
        let work = sta.work();
        self.stations.insert(addr, sta);
        match received {
            Received::Step => self.work.push_back(work),
            Received::Request(frame) => self.handle_request(addr, &frame),
            Received::Dropped => (),
        }
        self.drive();
        Ok(())
    }

    // IEEE Std 802.11-2020, 12.7.2, EAPOL-Key request
    fn handle_request(&mut self, addr: MacAddr, frame: &KeyFrame) {
        let pairwise = frame.key_info.key_type() == key_type::PAIRWISE;
        if frame.key_info.error() {
            warn!("{} reported a Michael MIC failure", MacFmt(&addr));
            self.michael_mic_failure();
            if pairwise {
                self.request_new_ptk(&addr);
            }
        } else if pairwise {
            info!("{} requested a new 4-Way Handshake", MacFmt(&addr));
            self.request_new_ptk(&addr);
        } else if let Some(vlan_id) = self.stations.get(&addr).map(|sta| sta.vlan_id) {
            info!("{} requested a group rekey", MacFmt(&addr));
            if let Some(group) = self.groups.get_mut(vlan_id) {
                group.gtk_rekey = true;
                self.work.push_back(Work::Group(vlan_id));
            }
        }
    }

    fn request_new_ptk(&mut self, addr: &MacAddr) {
        if let Some(sta) = self.stations.get_mut(addr) {
            sta.ev.ptk_request = true;
            self.work.push_back(sta.work());
        }
    }

    fn michael_mic_failure(&mut self) {
        if self.countermeasures.is_some() {
            return;
        }
        match self.mic_failure_window.take() {
            Some(id) => {
                self.timer.cancel_event(id);
                self.start_countermeasures();
            }
            None => {
                self.mic_failure_window =
                    Some(self.timer.schedule_after(MIC_FAILURE_WINDOW, TimerEvent::MicFailureWindow));
            }
        }
    }

    fn start_countermeasures(&mut self) {
        warn!("second MIC failure within {:?}, starting countermeasures", MIC_FAILURE_WINDOW);
        self.counters.tkip_countermeasures_invoked += 1;
        for sta in self.stations.values_mut() {
            sta.request_disconnect(ReasonCode::MIC_FAILURE);
            self.work.push_back(sta.work());
        }
        self.rekey_all_groups();
        self.countermeasures =
            Some(self.timer.schedule_after(MIC_FAILURE_WINDOW, TimerEvent::CountermeasuresEnd));
    }

    fn rekey_all_groups(&mut self) {
        for vlan_id in self.groups.vlan_ids() {
            if let Some(group) = self.groups.get_mut(vlan_id) {
                group.gtk_rekey = true;
                self.work.push_back(Work::Group(vlan_id));
            }
        }
    }

    /// Handles an event scheduled through the scheduler.
    pub fn on_timeout(&mut self, event_id: EventId) {
        let event = match self.timer.triggered(&event_id) {
            Some(event) => event,
            None => return,
        };
        match event {
            TimerEvent::EapolRetransmit { addr, generation } => {
                if let Some(sta) = self.stations.get_mut(&addr) {
                    if sta.generation == generation && sta.retransmit == Some(event_id) {
                        sta.retransmit = None;
                        sta.ev.timeout_evt = true;
                        sta.counters.timeouts += 1;
                        self.work.push_back(sta.work());
                    }
                }
            }
            TimerEvent::GroupRekey => {
                info!("group rekey timer expired");
                self.rekey_all_groups();
                if let Some(after) = self.config.wpa_group_rekey {
                    self.timer.schedule_after(after, TimerEvent::GroupRekey);
                }
            }
            TimerEvent::GmkRekey => {
                info!("GMK rekey timer expired");
                for vlan_id in self.groups.vlan_ids() {
                    if let Some(group) = self.groups.get_mut(vlan_id) {
                        group.rekey_gmk();
                    }
                }
                if let Some(after) = self.config.wpa_gmk_rekey {
                    self.timer.schedule_after(after, TimerEvent::GmkRekey);
                }
            }
            TimerEvent::PtkRekey { addr, generation } => {
                if let Some(sta) = self.stations.get_mut(&addr) {
                    if sta.generation == generation {
                        info!("PTK rekey timer of {} expired", MacFmt(&addr));
                        sta.ptk_rekey = None;
                        sta.ev.ptk_request = true;
                        self.work.push_back(sta.work());
                    }
                }
            }
            TimerEvent::FtPullTimeout { addr, nonce } => {
                self.ft.pull_timeout(&addr, &nonce, &mut self.ops);
            }
            TimerEvent::CountermeasuresEnd => {
                info!("countermeasures ended");
                self.countermeasures = None;
            }
            TimerEvent::MicFailureWindow => self.mic_failure_window = None,
        }
        self.drive();
    }

    /// Rekeys the group keys of every VLAN.
    pub fn rekey_gtk(&mut self) {
        self.rekey_all_groups();
        self.drive();
    }

    /// Starts a new 4-Way Handshake with an associated station.
    pub fn request_ptk_rekey(&mut self, addr: MacAddr) -> Result<(), Error> {
        if !self.stations.contains_key(&addr) {
            return Err(Error::UnknownStation(addr));
        }
        self.request_new_ptk(&addr);
        self.drive();
        Ok(())
    }

    /// Resolves the PMK-R1 of a station's FT authentication. A `Pending` outcome completes
    /// through `AuthenticatorOps::ft_pull_done`.
    pub fn ft_authenticate(
        &mut self,
        addr: MacAddr,
        req: &FtAuthRequest,
    ) -> Result<FtAuthOutcome, Error> {
        let ft = self.config.ft.as_ref().ok_or(Error::FtNotEnabled)?;
        self.ft.authenticate(ft, &self.addr, &addr, req, &mut self.ops, &mut self.timer)
    }

    /// Installs the PTK of a station that reassociated through FT. The handshake itself ran in
    /// the authentication and reassociation frames, so the station goes straight to PTKINITDONE.
    /// Returns the PTK so the caller can protect the Reassociation Response.
    pub fn ft_reassociated(
        &mut self,
        addr: MacAddr,
        anonce: Nonce,
        snonce: Nonce,
    ) -> Result<Ptk, Error> {
        let mut sta = self.stations.remove(&addr).ok_or(Error::UnknownStation(addr))?;
        let result = self.ft_install(&mut sta, anonce, snonce);
        let work = sta.work();
        self.stations.insert(addr, sta);
        if result.is_ok() {
            self.work.push_back(work);
        }
        self.drive();
        result
    }

    fn ft_install(&mut self, sta: &mut Station, anonce: Nonce, snonce: Nonce) -> Result<Ptk, Error> {
        if !sta.ie.akm.is_ft() {
            return Err(Error::NotNegotiated(sta.addr));
        }
        let r1_name = sta.ie.pmkids.first().copied().ok_or(Error::NotNegotiated(sta.addr))?;
        let entry = self
            .ft
            .cache
            .get_pmk_r1(&sta.addr, &r1_name)
            .cloned()
            .ok_or(Error::NotNegotiated(sta.addr))?;
        let ptk = Ptk::new_ft(
            &entry.pmk_r1[..],
            &self.addr,
            &sta.addr,
            &anonce,
            &snonce,
            &sta.ie.akm,
            &sta.ie.pairwise,
        )?;
        let key = SetKeyDescriptor {
            key_type: KeyType::Pairwise,
            address: sta.addr,
            key_id: 0,
            key: ptk.tk().to_vec(),
            rsc: 0,
            cipher: ptk.cipher,
        };
        self.ops.set_key(sta.vlan_id, &key).map_err(Error::SetKey)?;
        info!("installed FT PTK for {}", MacFmt(&sta.addr));
        sta.started = true;
        sta.anonce = anonce;
        sta.snonce = snonce;
        sta.ptk = Some(ptk.clone());
        sta.ptk_installed = true;
        sta.pmk_r1 = Some(entry);
        self.with_ctx(|ctx| sta.install_done(ctx));
        Ok(ptk)
    }

    /// Handles a frame of the inter-AP key distribution protocol.
    pub fn process_rrb(&mut self, frame: &[u8]) -> Result<(), Error> {
        let ft = self.config.ft.as_ref().ok_or(Error::FtNotEnabled)?;
        let now = self.ops.now_secs();
        self.ft.process_rrb(ft, &self.addr, frame, now, &mut self.ops, &mut self.timer)
    }

    /// Tracks WNM sleep mode. A station leaving sleep mode is sent the current group keys.
    pub fn set_wnm_sleep(&mut self, addr: MacAddr, sleeping: bool) -> Result<(), Error> {
        let sta = self.stations.get_mut(&addr).ok_or(Error::UnknownStation(addr))?;
        sta.sleeping = sleeping;
        if !sleeping && sta.ptk_state == PtkState::PtkInitDone {
            sta.send_group_keys = true;
            self.work.push_back(sta.work());
        }
        self.drive();
        Ok(())
    }

    /// Adds an affiliated link to a multi-link station. The link's group keys are delivered in
    /// message 3.
    pub fn add_mlo_link(&mut self, addr: MacAddr, link: MloLink) -> Result<(), Error> {
        if !self.stations.contains_key(&addr) {
            return Err(Error::UnknownStation(addr));
        }
        self.groups.acquire(link.vlan_id, &self.addr, &self.config)?;
        self.work.push_back(Work::Group(link.vlan_id));
        if let Some(sta) = self.stations.get_mut(&addr) {
            sta.mlo_links.push(link);
        }
        self.drive();
        Ok(())
    }

    fn with_ctx<R>(&mut self, f: impl FnOnce(&mut StepCtx<'_>) -> R) -> R {
        let mut ctx = StepCtx {
            config: &self.config,
            aa: &self.addr,
            own_ies: &self.own_ies,
            ops: &mut self.ops,
            timer: &mut self.timer,
            groups: &mut self.groups,
            ft: &mut self.ft,
            work: &mut self.work,
            counters: &mut self.counters,
        };
        f(&mut ctx)
    }

    /// Runs the work queue until every state machine settled.
    fn drive(&mut self) {
        while let Some(work) = self.work.pop_front() {
            match work {
                Work::Station { addr, generation } => self.step_station(addr, generation),
                Work::Group(vlan_id) => self.step_group(vlan_id),
            }
        }
        for sta in self.stations.values_mut() {
            sta.clear_events();
        }
    }

    fn step_station(&mut self, addr: MacAddr, generation: u64) {
        let mut sta = match self.stations.remove(&addr) {
            Some(sta) if sta.generation == generation => sta,
            Some(sta) => {
                self.stations.insert(addr, sta);
                return;
            }
            None => return,
        };
        let changed = self.with_ctx(|ctx| sta.step(ctx));
        if sta.pending_destroy {
            self.free_station(sta);
            return;
        }
        if changed {
            self.work.push_back(sta.work());
        }
        self.stations.insert(addr, sta);
    }

    fn step_group(&mut self, vlan_id: u16) {
        let result = match self.groups.get_mut(vlan_id) {
            Some(group) => group.step(&self.addr, &mut self.ops),
            None => return,
        };
        match result {
            Ok(None) => (),
            Ok(Some(GroupStep::Changed)) => self.work.push_back(Work::Group(vlan_id)),
            Ok(Some(GroupStep::Distribute)) => {
                self.distribute(vlan_id);
                self.work.push_back(Work::Group(vlan_id));
            }
            Ok(Some(GroupStep::Fatal)) => self.group_failed(vlan_id),
            Err(e) => {
                error!("VLAN {}: group key derivation failed: {}", vlan_id, e);
                self.group_failed(vlan_id);
            }
        }
    }

    /// Hands the new group keys to every station of the VLAN holding a PTK.
    fn distribute(&mut self, vlan_id: u16) {
        self.counters.gtk_rekeys += 1;
        let mut pending = 0;
        for sta in self.stations.values_mut() {
            if sta.vlan_id != vlan_id || sta.ptk_state != PtkState::PtkInitDone {
                continue;
            }
            if sta.sleeping {
                debug!("{} is sleeping, skipping group rekey", MacFmt(&sta.addr));
                continue;
            }
            sta.gupdate_station_keys = true;
            pending += 1;
            self.work.push_back(sta.work());
        }
        if let Some(group) = self.groups.get_mut(vlan_id) {
            group.gkey_done_stations = pending;
        }
        info!("VLAN {}: distributing group keys to {} stations", vlan_id, pending);
    }

    fn group_failed(&mut self, vlan_id: u16) {
        error!("VLAN {}: group failed, disconnecting its stations", vlan_id);
        for sta in self.stations.values_mut().filter(|sta| sta.vlan_id == vlan_id) {
            sta.request_disconnect(ReasonCode::UNSPECIFIED_REASON);
            self.work.push_back(sta.work());
        }
    }

    /// Releases everything a removed station holds.
    fn free_station(&mut self, mut sta: Station) {
        debug!("freeing key state of {}", MacFmt(&sta.addr));
        sta.cancel_timers(&mut self.timer);
        self.ft.cancel_pull(&sta.addr, &mut self.timer, &mut self.ops);
        if let Some(group) = self.groups.get_mut(sta.vlan_id) {
            if sta.gupdate_station_keys {
                group.station_done();
                self.work.push_back(Work::Group(sta.vlan_id));
            }
            if sta.has_gtk {
                group.gno_stations = group.gno_stations.saturating_sub(1);
                if self.config.wpa_strict_rekey {
                    let remaining = self.ops.get_sta_count().unwrap_or(self.stations.len());
                    info!(
                        "VLAN {}: rekeying after {} left, {} stations remain",
                        sta.vlan_id,
                        MacFmt(&sta.addr),
                        remaining
                    );
                    group.gtk_rekey = true;
                    self.work.push_back(Work::Group(sta.vlan_id));
                }
            }
        }
        self.groups.release(sta.vlan_id);
        for link in sta.mlo_links.iter() {
            self.groups.release(link.vlan_id);
        }
    }
}
