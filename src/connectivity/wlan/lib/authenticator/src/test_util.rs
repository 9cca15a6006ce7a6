// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::{AuthenticatorConfig, FtConfig};
use crate::crypto_utils::keywrap;
use crate::crypto_utils::nonce::{random_nonce, Nonce};
use crate::eapol::{
    self, key_type, KeyFrame, KeyInformation, DESCRIPTOR_TYPE_IEEE802DOT11, DESCRIPTOR_TYPE_WPA,
};
use crate::ft::keys::{derive_pmk_r0, derive_pmk_r1};
use crate::ft::FtPullError;
use crate::ie::rsn::akm::{self, Akm};
use crate::ie::rsn::cipher::{self, Cipher};
use crate::ie::rsn::pmkid::Pmkid;
use crate::ie::rsn::rsne;
use crate::ie::wpa::{self, WpaIe};
use crate::key::ptk::Ptk;
use crate::key::{psk, Pmk, SetKeyDescriptor};
use crate::key_data::{self, kde::Oci, Element};
use crate::mac::MacAddr;
use crate::ops::{AuthenticatorOps, PskLookup};
use crate::organization::Oui;
use crate::pmksa::PmksaEntry;
use crate::reason::ReasonCode;
use crate::timer::{EventId, Scheduler};
use anyhow::format_err;
use bytes::Bytes;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub const SSID: &[u8] = b"ThisIsASSID";
pub const PASSPHRASE: &[u8] = b"ThisIsAPassword";

pub fn psk_config() -> AuthenticatorConfig {
    AuthenticatorConfig {
        ssid: SSID.to_vec(),
        psk: Some(psk::compute(PASSPHRASE, SSID).expect("error computing PSK")),
        ..Default::default()
    }
}

/// A WPA1 station offering TKIP and PSK.
pub fn wpa1_ie() -> WpaIe {
    WpaIe {
        multicast_cipher: Cipher { oui: Oui::MSFT, suite_type: cipher::TKIP },
        unicast_cipher_list: vec![Cipher { oui: Oui::MSFT, suite_type: cipher::TKIP }],
        akm_list: vec![Akm { oui: Oui::MSFT, suite_type: akm::PSK }],
    }
}

pub fn ft_config() -> FtConfig {
    FtConfig {
        mobility_domain: [0xa1, 0xb2],
        nas_identifier: b"nas1.example.com".to_vec(),
        r1_key_holder: [0x02, 0, 0, 0, 0x01, 0],
        ft_over_ds: false,
        pmk_r1_push: false,
        reassociation_deadline_tu: 1000,
        pull_timeout: Duration::from_millis(1000),
        push_max_age_secs: 2,
        r0khs: vec![],
        r1khs: vec![],
    }
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    scheduled: Vec<(EventId, Duration)>,
    canceled: Vec<EventId>,
}

/// Hands out increasing event IDs. Clones share their state so a test can inspect what the
/// authenticator scheduled through its boxed copy.
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<(EventId, Duration)> {
        self.state.borrow().scheduled.clone()
    }

    pub fn canceled(&self) -> Vec<EventId> {
        self.state.borrow().canceled.clone()
    }

    /// The most recently scheduled event.
    pub fn last_scheduled(&self) -> Option<EventId> {
        self.state.borrow().scheduled.last().map(|(id, _)| *id)
    }
}

impl Scheduler for FakeScheduler {
    fn schedule(&mut self, after: Duration) -> EventId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = EventId(state.next_id);
        state.scheduled.push((id, after));
        id
    }

    fn cancel(&mut self, id: EventId) {
        self.state.borrow_mut().canceled.push(id);
    }
}

/// Records every side effect of the authenticator.
pub struct RecordingOps {
    pub sent: Vec<(MacAddr, Vec<u8>, bool)>,
    pub keys: Vec<(u16, SetKeyDescriptor)>,
    pub fail_set_key: bool,
    pub random_ready: bool,
    pub disconnects: Vec<(MacAddr, ReasonCode)>,
    pub authorized: Vec<(MacAddr, bool)>,
    pub removed_ptks: Vec<MacAddr>,
    pub rrb_sent: Vec<(MacAddr, Vec<u8>)>,
    pub pull_done: Vec<(MacAddr, Result<(), FtPullError>)>,
    pub relays: Vec<(MacAddr, bool, Vec<u8>)>,
    /// Additional PSKs handed out per station. None keeps lookups pending.
    pub psk: Option<Vec<Pmk>>,
    pub okc: Vec<PmksaEntry>,
    pub sta_count: Option<usize>,
    pub now: u32,
    pub channel: Option<Oci>,
}

impl RecordingOps {
    pub fn new() -> Self {
        Self {
            sent: vec![],
            keys: vec![],
            fail_set_key: false,
            random_ready: true,
            disconnects: vec![],
            authorized: vec![],
            removed_ptks: vec![],
            rrb_sent: vec![],
            pull_done: vec![],
            relays: vec![],
            psk: Some(vec![]),
            okc: vec![],
            sta_count: None,
            now: 0,
            channel: None,
        }
    }
}

impl AuthenticatorOps for RecordingOps {
    fn send_eapol(&mut self, addr: &MacAddr, frame: &[u8], encrypt: bool) {
        self.sent.push((*addr, frame.to_vec(), encrypt));
    }

    fn set_key(&mut self, vlan_id: u16, key: &SetKeyDescriptor) -> Result<(), anyhow::Error> {
        if self.fail_set_key {
            return Err(format_err!("driver rejected key"));
        }
        self.keys.push((vlan_id, key.clone()));
        Ok(())
    }

    fn get_psk(&mut self, _addr: &MacAddr) -> PskLookup {
        match self.psk.as_ref() {
            Some(psks) => PskLookup::Ready(psks.clone()),
            None => PskLookup::Pending,
        }
    }

    fn disconnect(&mut self, addr: &MacAddr, reason: ReasonCode) {
        self.disconnects.push((*addr, reason));
    }

    fn set_port_authorized(&mut self, addr: &MacAddr, authorized: bool) {
        self.authorized.push((*addr, authorized));
    }

    fn remove_ptk(&mut self, addr: &MacAddr) {
        self.removed_ptks.push(*addr);
    }

    fn channel_info(&mut self) -> Option<Oci> {
        self.channel
    }

    fn random_pool_ready(&mut self) -> bool {
        self.random_ready
    }

    fn find_okc_pmksa(&mut self, addr: &MacAddr, pmkid: &Pmkid) -> Option<PmksaEntry> {
        self.okc.iter().find(|e| &e.spa == addr && &e.pmkid == pmkid).cloned()
    }

    fn send_rrb(&mut self, dst: &MacAddr, frame: &[u8]) -> Result<(), anyhow::Error> {
        self.rrb_sent.push((*dst, frame.to_vec()));
        Ok(())
    }

    fn ft_pull_done(&mut self, addr: &MacAddr, result: Result<(), FtPullError>) {
        self.pull_done.push((*addr, result));
    }

    fn ft_action_relay(&mut self, ap_addr: &MacAddr, request: bool, action: &[u8]) {
        self.relays.push((*ap_addr, request, action.to_vec()));
    }

    fn get_sta_count(&self) -> Option<usize> {
        self.sta_count
    }

    fn now_secs(&self) -> u32 {
        self.now
    }
}

/// The station side of the handshakes, just enough to answer the authenticator's messages.
pub struct Supplicant {
    pub aa: MacAddr,
    pub spa: MacAddr,
    pub pmk: Vec<u8>,
    pub ssid: Vec<u8>,
    /// RSNE or WPA IE of the association request, repeated in message 2.
    pub ie: Vec<u8>,
    /// Set for FT AKMs.
    pub ft: Option<FtConfig>,
    pub snonce: Nonce,
    pub ptk: Option<Ptk>,
    pub gtk: Option<Vec<u8>>,
    akm: Akm,
    pairwise: Cipher,
    wpa1: bool,
    request_counter: u64,
}

impl Supplicant {
    pub fn new(aa: MacAddr, spa: MacAddr, pmk: Vec<u8>, ie: Vec<u8>) -> Self {
        let (akm, pairwise, wpa1) = if wpa::is_wpa_element(&ie[..]) {
            let wpa = wpa::from_element(&ie[..]).expect("valid WPA IE");
            (wpa.akm_list[0].normalized(), wpa.unicast_cipher_list[0].normalized(), true)
        } else {
            let rsne = rsne::from_bytes(&ie[..]).expect("valid RSNE");
            (rsne.akm_suites[0], rsne.pairwise_cipher_suites[0], false)
        };
        Self {
            aa,
            spa,
            pmk,
            ssid: SSID.to_vec(),
            ie,
            ft: None,
            snonce: random_nonce(),
            ptk: None,
            gtk: None,
            akm,
            pairwise,
            wpa1,
            request_counter: 0,
        }
    }

    fn mic_len(&self) -> usize {
        self.akm.mic_bytes().expect("AKM has no known MIC size") as usize
    }

    fn parse(&self, bytes: &[u8]) -> KeyFrame {
        eapol::parse(bytes, self.mic_len()).expect("valid EAPOL-Key frame")
    }

    fn ptk(&self) -> &Ptk {
        self.ptk.as_ref().expect("no PTK derived yet")
    }

    fn derive_ptk(&self, anonce: &Nonce) -> Ptk {
        match self.ft.as_ref() {
            Some(ft) if self.akm.is_ft() => {
                let (r0, r0_name) = derive_pmk_r0(
                    &self.pmk[..],
                    &self.ssid[..],
                    &ft.mobility_domain,
                    &ft.nas_identifier[..],
                    &self.spa,
                )
                .expect("PMK-R0");
                let (r1, _) =
                    derive_pmk_r1(&r0, &r0_name, &ft.r1_key_holder, &self.spa).expect("PMK-R1");
                Ptk::new_ft(&r1[..], &self.aa, &self.spa, anonce, &self.snonce, &self.akm, &self.pairwise)
                    .expect("FT PTK")
            }
            _ => Ptk::new(
                &self.pmk[..],
                &self.aa,
                &self.spa,
                anonce,
                &self.snonce,
                &self.akm,
                &self.pairwise,
            )
            .expect("PTK"),
        }
    }

    fn frame(&self, key_type: u16) -> KeyFrame {
        let mut key_info = KeyInformation(0);
        key_info.set_key_descriptor_version(
            self.akm.key_descriptor_version().expect("AKM has no descriptor version"),
        );
        key_info.set_key_type(key_type);
        key_info.set_key_mic(true);
        let descriptor_type =
            if self.wpa1 { DESCRIPTOR_TYPE_WPA } else { DESCRIPTOR_TYPE_IEEE802DOT11 };
        KeyFrame::new(descriptor_type, key_info, self.mic_len())
    }

    fn seal(&self, mut frame: KeyFrame, kck: &[u8]) -> Vec<u8> {
        frame.key_mic = Bytes::from(eapol::compute_mic(kck, &self.akm, &frame).expect("MIC"));
        frame.to_bytes(false)
    }

    fn take_gtk(&mut self, bytes: &[u8]) {
        let elements = key_data::extract_elements(bytes).expect("valid key data");
        for element in elements {
            if let Element::Gtk(_, gtk) = element {
                self.gtk = Some(gtk.gtk);
            }
        }
    }

    /// Answers message 1 with a fresh PTK.
    pub fn msg2(&mut self, msg1: &[u8]) -> Vec<u8> {
        let msg1 = self.parse(msg1);
        let ptk = self.derive_ptk(&msg1.key_nonce);
        let mut frame = self.frame(key_type::PAIRWISE);
        frame.key_replay_counter = msg1.key_replay_counter;
        frame.key_nonce = self.snonce;
        frame.set_key_data(self.ie.clone());
        let bytes = self.seal(frame, ptk.kck());
        self.ptk = Some(ptk);
        bytes
    }

    /// Verifies message 3, takes the GTK and answers with message 4.
    pub fn msg4(&mut self, msg3: &[u8]) -> Vec<u8> {
        let msg3 = self.parse(msg3);
        assert!(eapol::verify_mic(self.ptk().kck(), &self.akm, &msg3), "invalid MIC in message 3");
        if msg3.key_info.encrypted_key_data() {
            let key_data =
                keywrap::unwrap(self.ptk().kek(), &msg3.key_data[..]).expect("unwrap key data");
            self.take_gtk(&key_data[..]);
        }
        let mut frame = self.frame(key_type::PAIRWISE);
        frame.key_info.set_secure(!self.wpa1);
        frame.key_replay_counter = msg3.key_replay_counter;
        let kck = self.ptk().kck().to_vec();
        self.seal(frame, &kck[..])
    }

    /// Verifies group message 1, takes the GTK and acknowledges it.
    pub fn group_msg2(&mut self, msg1: &[u8]) -> Vec<u8> {
        let msg1 = self.parse(msg1);
        assert!(eapol::verify_mic(self.ptk().kck(), &self.akm, &msg1), "invalid MIC in group message 1");
        let key_data =
            keywrap::unwrap(self.ptk().kek(), &msg1.key_data[..]).expect("unwrap key data");
        if self.wpa1 {
            self.gtk = Some(key_data[..msg1.key_len as usize].to_vec());
        } else {
            self.take_gtk(&key_data[..]);
        }
        let mut frame = self.frame(key_type::GROUP_SMK);
        frame.key_info.set_secure(true);
        frame.key_replay_counter = msg1.key_replay_counter;
        let kck = self.ptk().kck().to_vec();
        self.seal(frame, &kck[..])
    }

    /// An EAPOL-Key request for a new PTK or GTK, optionally reporting a Michael MIC failure.
    pub fn request(&mut self, pairwise: bool, mic_failure: bool) -> Vec<u8> {
        let key_type = if pairwise { key_type::PAIRWISE } else { key_type::GROUP_SMK };
        let mut frame = self.frame(key_type);
        frame.key_info.set_request(true);
        frame.key_info.set_secure(true);
        frame.key_info.set_error(mic_failure);
        self.request_counter += 1;
        frame.key_replay_counter = self.request_counter;
        let kck = self.ptk().kck().to_vec();
        self.seal(frame, &kck[..])
    }
}
