// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Key management state of a single associated station.
//!
//! A station runs two state machines, IEEE Std 802.11-2020, 12.7.6 and 12.7.7: the pairwise
//! handshake in [`pairwise`] and the per-station side of the group key handshake in
//! [`group_key`]. Both are driven by the flags in [`Events`]. A call to [`Station::step`] performs
//! at most one transition and reports whether anything changed, the owning authenticator keeps
//! stepping until the station settles.

pub mod group_key;
mod messages;
pub mod pairwise;
mod receive;

pub use self::group_key::GroupKeyState;
pub use self::pairwise::PtkState;
pub(crate) use self::receive::Received;

use crate::authenticator::{Counters, OwnIes, Work};
use crate::config::AuthenticatorConfig;
use crate::crypto_utils::nonce::Nonce;
use crate::eapol::{KeyFrame, MessageClass};
use crate::ft::cache::PmkR1Entry;
use crate::ft::FtState;
use crate::group::GroupArena;
use crate::ie::rsn::pmkid::Pmkid;
use crate::key::ptk::Ptk;
use crate::mac::MacAddr;
use crate::ops::AuthenticatorOps;
use crate::reason::ReasonCode;
use crate::replay::ReplayCounterRing;
use crate::timer::{EventId, Timer, TimerEvent};
use crate::validate::{Protocol, ValidatedIe};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StationCounters {
    pub handshakes_completed: u64,
    pub mic_failures: u64,
    pub replayed_frames: u64,
    pub timeouts: u64,
}

/// An affiliated link of a multi-link station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MloLink {
    pub link_id: u8,
    pub link_addr: MacAddr,
    pub vlan_id: u16,
}

/// Inputs of the state machines, IEEE Std 802.11-2020, 12.7.10.
#[derive(Debug, Default)]
pub(crate) struct Events {
    pub init: bool,
    pub disconnect: bool,
    pub deauthentication_request: bool,
    pub authentication_request: bool,
    pub reauthentication_request: bool,
    pub ptk_request: bool,
    pub eapol_key_received: bool,
    pub timeout_evt: bool,
}

/// Everything a station may touch while stepping. The station itself is not part of the
/// authenticator's table for the duration of a step.
pub(crate) struct StepCtx<'a> {
    pub config: &'a AuthenticatorConfig,
    pub aa: &'a MacAddr,
    pub own_ies: &'a OwnIes,
    pub ops: &'a mut dyn AuthenticatorOps,
    pub timer: &'a mut Timer<TimerEvent>,
    pub groups: &'a mut GroupArena,
    pub ft: &'a mut FtState,
    pub work: &'a mut VecDeque<Work>,
    pub counters: &'a mut Counters,
}

pub struct Station {
    pub addr: MacAddr,
    pub(crate) generation: u64,
    pub(crate) vlan_id: u16,
    pub(crate) started: bool,
    pub(crate) ptk_state: PtkState,
    pub(crate) group_state: GroupKeyState,
    pub(crate) ev: Events,
    pub(crate) ie: ValidatedIe,

    pub(crate) anonce: Nonce,
    pub(crate) snonce: Nonce,
    /// SNonce of the previous message 2, kept when the station answered a retransmitted
    /// message 1 with a new SNonce.
    pub(crate) alt_snonce: Option<Nonce>,
    pub(crate) update_snonce: bool,

    /// PMK handed in by 802.1X or SAE. For FT AKMs this is the XXKey.
    pub(crate) pmk: Option<Vec<u8>>,
    pub(crate) pmkid: Option<Pmkid>,
    pub(crate) pmk_candidates: Vec<Vec<u8>>,
    /// The candidate message 2 verified against.
    pub(crate) pmk_selected: Option<Vec<u8>>,
    pub(crate) psk_pending: bool,

    pub(crate) ptk: Option<Ptk>,
    pub(crate) tptk: Option<Ptk>,
    pub(crate) ptk_installed: bool,
    pub(crate) mic_verified: bool,
    pub(crate) rx: Option<(MessageClass, KeyFrame)>,
    pub(crate) replay: ReplayCounterRing,
    pub(crate) timeout_ctr: u32,
    pub(crate) g_timeout_ctr: u32,
    pub(crate) retransmit: Option<EventId>,
    pub(crate) ptk_rekey: Option<EventId>,

    pub(crate) gupdate_station_keys: bool,
    /// Deliver the current group keys outside of a group rekey: after the WPA1 pairwise
    /// handshake and when leaving WNM sleep.
    pub(crate) send_group_keys: bool,
    pub(crate) has_gtk: bool,
    pub(crate) sleeping: bool,

    pub(crate) disconnect_reason: ReasonCode,
    pub(crate) pending_destroy: bool,

    pub(crate) pmk_r1: Option<PmkR1Entry>,
    pub(crate) mlo_links: Vec<MloLink>,
    pub(crate) counters: StationCounters,
}

impl Station {
    pub(crate) fn new(addr: MacAddr, generation: u64, vlan_id: u16, ie: ValidatedIe) -> Self {
        Self {
            addr,
            generation,
            vlan_id,
            started: false,
            ptk_state: PtkState::Initialize,
            group_state: GroupKeyState::Idle,
            ev: Events::default(),
            ie,
            anonce: [0u8; 32],
            snonce: [0u8; 32],
            alt_snonce: None,
            update_snonce: false,
            pmk: None,
            pmkid: None,
            pmk_candidates: vec![],
            pmk_selected: None,
            psk_pending: false,
            ptk: None,
            tptk: None,
            ptk_installed: false,
            mic_verified: false,
            rx: None,
            replay: ReplayCounterRing::default(),
            timeout_ctr: 0,
            g_timeout_ctr: 0,
            retransmit: None,
            ptk_rekey: None,
            gupdate_station_keys: false,
            send_group_keys: false,
            has_gtk: false,
            sleeping: false,
            disconnect_reason: ReasonCode::UNSPECIFIED_REASON,
            pending_destroy: false,
            pmk_r1: None,
            mlo_links: vec![],
            counters: StationCounters::default(),
        }
    }

    pub fn ptk_state(&self) -> PtkState {
        self.ptk_state
    }

    pub fn group_state(&self) -> GroupKeyState {
        self.group_state
    }

    pub fn vlan_id(&self) -> u16 {
        self.vlan_id
    }

    pub fn counters(&self) -> StationCounters {
        self.counters
    }

    pub fn ptk_installed(&self) -> bool {
        self.ptk_installed
    }

    pub(crate) fn is_wpa1(&self) -> bool {
        self.ie.protocol == Protocol::Wpa
    }

    /// Runs a single transition of either state machine. Returns true if the station changed
    /// and has to be stepped again.
    pub(crate) fn step(&mut self, ctx: &mut StepCtx<'_>) -> bool {
        if self.step_ptk(ctx) {
            return true;
        }
        if self.pending_destroy {
            return false;
        }
        self.step_group(ctx)
    }

    /// Forgets the inputs of an event once the station settled.
    pub(crate) fn clear_events(&mut self) {
        self.ev.eapol_key_received = false;
        self.ev.timeout_evt = false;
    }

    /// Requests a forced disconnect on the next step.
    pub(crate) fn request_disconnect(&mut self, reason: ReasonCode) {
        self.disconnect_reason = reason;
        self.ev.disconnect = true;
    }

    pub(crate) fn cancel_retransmit(&mut self, ctx: &mut StepCtx<'_>) {
        if let Some(id) = self.retransmit.take() {
            ctx.timer.cancel_event(id);
        }
    }

    /// Arms the EAPOL-Key retransmission timer, replacing a pending one.
    pub(crate) fn schedule_retransmit(&mut self, ctx: &mut StepCtx<'_>, after: Duration) {
        self.cancel_retransmit(ctx);
        let event = TimerEvent::EapolRetransmit { addr: self.addr, generation: self.generation };
        self.retransmit = Some(ctx.timer.schedule_after(after, event));
    }

    pub(crate) fn cancel_timers(&mut self, timer: &mut Timer<TimerEvent>) {
        if let Some(id) = self.retransmit.take() {
            timer.cancel_event(id);
        }
        if let Some(id) = self.ptk_rekey.take() {
            timer.cancel_event(id);
        }
    }

    pub(crate) fn work(&self) -> Work {
        Work::Station { addr: self.addr, generation: self.generation }
    }
}
