// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::messages::{self, FtMsg3};
use super::{StepCtx, Station};
use crate::config::AuthenticatorConfig;
use crate::crypto_utils::nonce::{random_nonce, Nonce};
use crate::eapol::{self, MessageClass};
use crate::ft::keys::{derive_pmk_r0, derive_pmk_r1, pmk_r1_name};
use crate::ie::{find_element, id, wpa, Reader};
use crate::key::ptk::Ptk;
use crate::key::{KeyType, SetKeyDescriptor};
use crate::mac::MacFmt;
use crate::ops::PskLookup;
use crate::reason::ReasonCode;
use crate::Error;
use log::{debug, error, info, warn};
use std::time::Duration;

/// States of the per-station 4-Way Handshake state machine, IEEE Std 802.11-2020, 12.7.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtkState {
    Initialize,
    Disconnect,
    Disconnected,
    Authentication,
    Authentication2,
    InitPmk,
    InitPsk,
    PtkStart,
    PtkCalcNegotiating,
    PtkCalcNegotiating2,
    PtkInitNegotiating,
    PtkInitDone,
}

pub(super) fn eapol_timeout(config: &AuthenticatorConfig, timeout_ctr: u32) -> Duration {
    if timeout_ctr <= 1 {
        config.eapol_timeout_first
    } else {
        config.eapol_timeout
    }
}

fn find_wpa_element(key_data: &[u8]) -> Option<&[u8]> {
    let mut offset = 0;
    for (_, body) in Reader::new(key_data) {
        let element = &key_data[offset..offset + 2 + body.len()];
        offset += element.len();
        if wpa::is_wpa_element(element) {
            return Some(element);
        }
    }
    None
}

impl Station {
    pub(super) fn step_ptk(&mut self, ctx: &mut StepCtx<'_>) -> bool {
        if self.ev.init {
            self.enter_initialize(ctx);
            return true;
        }
        if self.ev.disconnect {
            self.enter_disconnect(ctx);
            return true;
        }
        if self.ev.deauthentication_request {
            self.enter_disconnected();
            return true;
        }
        if self.ev.authentication_request {
            self.enter_authentication(ctx);
            return true;
        }
        if self.ev.reauthentication_request {
            self.enter_authentication2(ctx);
            return true;
        }
        if self.ev.ptk_request {
            // A new handshake with a fresh ANonce.
            self.anonce = random_nonce();
            self.timeout_ctr = 0;
            self.enter_ptk_start(ctx);
            return true;
        }

        let limit = ctx.config.wpa_pairwise_update_count;
        match self.ptk_state {
            PtkState::Initialize | PtkState::Disconnect => false,
            PtkState::Disconnected => {
                self.enter_initialize(ctx);
                true
            }
            PtkState::Authentication => {
                self.enter_authentication2(ctx);
                true
            }
            PtkState::Authentication2 => {
                if self.ie.akm.is_psk() && self.ie.pmksa.is_none() {
                    self.enter_init_psk(ctx);
                    true
                } else if self.pmk.is_some() || self.ie.pmksa.is_some() {
                    self.enter_init_pmk();
                    true
                } else {
                    false
                }
            }
            PtkState::InitPmk => {
                if self.pmk_candidates.is_empty() {
                    warn!("no PMK available for {}", MacFmt(&self.addr));
                    self.request_disconnect(ReasonCode::IEEE802_1_X_AUTH_FAILED);
                } else {
                    self.enter_ptk_start(ctx);
                }
                true
            }
            PtkState::InitPsk => {
                if self.psk_pending {
                    false
                } else if self.pmk_candidates.is_empty() {
                    warn!("no PSK configured for {}", MacFmt(&self.addr));
                    self.request_disconnect(ReasonCode::INVALID_AUTHENTICATION);
                    true
                } else {
                    self.enter_ptk_start(ctx);
                    true
                }
            }
            PtkState::PtkStart => {
                if self.ev.eapol_key_received && self.rx_class() == Some(MessageClass::Pairwise2) {
                    self.enter_calc_negotiating(ctx);
                    true
                } else if self.timeout_ctr > limit {
                    self.handshake_timed_out(ctx);
                    true
                } else if self.ev.timeout_evt {
                    self.enter_ptk_start(ctx);
                    true
                } else {
                    false
                }
            }
            PtkState::PtkCalcNegotiating => {
                if self.mic_verified {
                    self.timeout_ctr = 0;
                    self.ptk_state = PtkState::PtkCalcNegotiating2;
                    true
                } else if self.ev.eapol_key_received
                    && self.rx_class() == Some(MessageClass::Pairwise2)
                {
                    self.enter_calc_negotiating(ctx);
                    true
                } else if self.ev.timeout_evt {
                    self.enter_ptk_start(ctx);
                    true
                } else {
                    false
                }
            }
            PtkState::PtkCalcNegotiating2 => {
                self.enter_init_negotiating(ctx);
                true
            }
            PtkState::PtkInitNegotiating => {
                if self.update_snonce {
                    self.enter_calc_negotiating(ctx);
                    true
                } else if self.ev.eapol_key_received
                    && self.rx_class() == Some(MessageClass::Pairwise4)
                    && self.mic_verified
                {
                    self.enter_ptk_init_done(ctx);
                    true
                } else if self.timeout_ctr > limit {
                    self.handshake_timed_out(ctx);
                    true
                } else if self.ev.timeout_evt {
                    self.enter_init_negotiating(ctx);
                    true
                } else {
                    false
                }
            }
            PtkState::PtkInitDone => false,
        }
    }

    fn rx_class(&self) -> Option<MessageClass> {
        self.rx.as_ref().map(|(class, _)| *class)
    }

    fn handshake_timed_out(&mut self, ctx: &mut StepCtx<'_>) {
        info!(
            "4-Way Handshake with {} timed out in {:?} after {} attempts",
            MacFmt(&self.addr),
            self.ptk_state,
            self.timeout_ctr - 1
        );
        ctx.counters.four_way_handshake_failures += 1;
        self.request_disconnect(ReasonCode::FOURWAY_HANDSHAKE_TIMEOUT);
    }

    fn enter_initialize(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::Initialize;
        self.ev.init = false;
        if self.gupdate_station_keys {
            if let Some(group) = ctx.groups.get_mut(self.vlan_id) {
                group.station_done();
            }
            self.gupdate_station_keys = false;
            ctx.work.push_back(crate::authenticator::Work::Group(self.vlan_id));
        }
        self.group_state = super::GroupKeyState::Idle;
        self.send_group_keys = false;
        self.cancel_retransmit(ctx);
        if self.ptk_installed {
            ctx.ops.remove_ptk(&self.addr);
            self.ptk_installed = false;
        }
        self.ptk = None;
        self.tptk = None;
        self.timeout_ctr = 0;
        ctx.ops.set_port_authorized(&self.addr, false);
    }

    fn enter_disconnect(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::Disconnect;
        self.ev.disconnect = false;
        self.cancel_retransmit(ctx);
        info!("disconnecting {}: reason {}", MacFmt(&self.addr), self.disconnect_reason.0);
        ctx.ops.disconnect(&self.addr, self.disconnect_reason);
        self.pending_destroy = true;
    }

    fn enter_disconnected(&mut self) {
        self.ptk_state = PtkState::Disconnected;
        self.ev.deauthentication_request = false;
    }

    fn enter_authentication(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::Authentication;
        self.ev.authentication_request = false;
        self.tptk = None;
        ctx.ops.set_port_authorized(&self.addr, false);
    }

    fn enter_authentication2(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::Authentication2;
        self.ev.reauthentication_request = false;
        self.anonce = random_nonce();
        self.timeout_ctr = 0;
        if let Some(group) = ctx.groups.get_mut(self.vlan_id) {
            if !group.first_sta_seen {
                if let Err(e) = group.first_station(ctx.aa, &mut *ctx.ops) {
                    warn!("VLAN {}: group not ready for first station: {}", self.vlan_id, e);
                }
            }
        }
    }

    fn enter_init_pmk(&mut self) {
        self.ptk_state = PtkState::InitPmk;
        self.pmk_candidates.clear();
        if let Some(pmksa) = self.ie.pmksa.as_ref() {
            debug!("PMK for {} from PMKSA cache", MacFmt(&self.addr));
            self.pmk_candidates.push(pmksa.pmk.clone());
            self.pmkid = Some(pmksa.pmkid);
        } else if let Some(pmk) = self.pmk.as_ref() {
            self.pmk_candidates.push(pmk.clone());
        }
    }

    fn enter_init_psk(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::InitPsk;
        self.pmk_candidates.clear();
        self.pmkid = None;
        if let Some(psk) = ctx.config.psk.as_ref() {
            self.pmk_candidates.push(psk.to_vec());
        }
        match ctx.ops.get_psk(&self.addr) {
            PskLookup::Ready(psks) => {
                self.pmk_candidates.extend(psks.iter().map(|psk| psk.to_vec()));
            }
            PskLookup::Pending => {
                debug!("waiting for PSK lookup of {}", MacFmt(&self.addr));
                self.psk_pending = true;
            }
        }
    }

    /// PMKID announced in message 1. For FT this is the PMKR1Name, which is only known up front
    /// if the XXKey is.
    fn msg1_pmkid(&self, ctx: &StepCtx<'_>) -> Option<[u8; 16]> {
        if self.is_wpa1() {
            return None;
        }
        if self.ie.akm.is_ft() {
            let ft = ctx.config.ft.as_ref()?;
            let xxkey = match &self.pmk_candidates[..] {
                [xxkey] => xxkey,
                _ => return None,
            };
            let (_, r0_name) = derive_pmk_r0(
                &xxkey[..],
                &ctx.config.ssid[..],
                &ft.mobility_domain,
                &ft.nas_identifier[..],
                &self.addr,
            )
            .ok()?;
            return Some(pmk_r1_name(&r0_name, &ft.r1_key_holder, &self.addr));
        }
        self.pmkid
    }

    fn enter_ptk_start(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::PtkStart;
        self.ev.ptk_request = false;
        self.ev.timeout_evt = false;
        self.alt_snonce = None;
        self.timeout_ctr += 1;
        if self.timeout_ctr > ctx.config.wpa_pairwise_update_count {
            // The station is disconnected on the next step.
            return;
        }

        let pmkid = self.msg1_pmkid(ctx);
        let result = messages::pairwise_msg1(self, pmkid.as_ref())
            .and_then(|frame| messages::send(self, ctx, frame, None));
        match result {
            Ok(()) => debug!("sent message 1 to {} (attempt {})", MacFmt(&self.addr), self.timeout_ctr),
            Err(e) => error!("failed to send message 1 to {}: {}", MacFmt(&self.addr), e),
        }
        let timeout = eapol_timeout(ctx.config, self.timeout_ctr);
        self.schedule_retransmit(ctx, timeout);
    }

    pub(super) fn derive_ptk(
        &self,
        ctx: &StepCtx<'_>,
        pmk: &[u8],
        snonce: &Nonce,
    ) -> Result<Ptk, Error> {
        if self.ie.akm.is_ft() {
            let ft = ctx.config.ft.as_ref().ok_or(Error::FtNotEnabled)?;
            let (pmk_r0, pmk_r0_name) = derive_pmk_r0(
                pmk,
                &ctx.config.ssid[..],
                &ft.mobility_domain,
                &ft.nas_identifier[..],
                &self.addr,
            )?;
            let (pmk_r1, _) = derive_pmk_r1(&pmk_r0, &pmk_r0_name, &ft.r1_key_holder, &self.addr)?;
            Ptk::new_ft(
                &pmk_r1[..],
                ctx.aa,
                &self.addr,
                &self.anonce,
                snonce,
                &self.ie.akm,
                &self.ie.pairwise,
            )
        } else {
            Ptk::new(
                pmk,
                ctx.aa,
                &self.addr,
                &self.anonce,
                snonce,
                &self.ie.akm,
                &self.ie.pairwise,
            )
        }
    }

    /// Whether the elements of message 2 repeat those of the (Re)Association Request.
    fn msg2_elements_match(&self, key_data: &[u8]) -> bool {
        let element = if self.is_wpa1() {
            find_wpa_element(key_data)
        } else {
            find_element(key_data, id::RSNE)
        };
        if element != Some(&self.ie.ie[..]) {
            return false;
        }
        if self.is_wpa1() {
            return true;
        }
        let rsnxe = find_element(key_data, id::RSNXE);
        rsnxe == self.ie.rsnxe.as_ref().map(|rsnxe| rsnxe.as_bytes())
    }

    fn enter_calc_negotiating(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::PtkCalcNegotiating;
        self.ev.eapol_key_received = false;
        self.mic_verified = false;
        self.update_snonce = false;
        let frame = match self.rx.take() {
            Some((MessageClass::Pairwise2, frame)) => frame,
            _ => return,
        };

        let mut verified = None;
        for pmk in self.pmk_candidates.iter() {
            match self.derive_ptk(ctx, &pmk[..], &self.snonce) {
                Ok(ptk) if eapol::verify_mic(ptk.kck(), &self.ie.akm, &frame) => {
                    verified = Some((pmk.clone(), ptk));
                    break;
                }
                Ok(_) => (),
                Err(e) => {
                    error!("PTK derivation for {} failed: {}", MacFmt(&self.addr), e);
                    break;
                }
            }
        }
        let (pmk, ptk) = match verified {
            Some(verified) => verified,
            None => {
                warn!("invalid MIC in message 2 from {}", MacFmt(&self.addr));
                self.counters.mic_failures += 1;
                return;
            }
        };

        if !self.msg2_elements_match(&frame.key_data[..]) {
            warn!("elements in message 2 from {} differ from association", MacFmt(&self.addr));
            self.request_disconnect(ReasonCode::HANDSHAKE_ELEMENT_MISMATCH);
            return;
        }

        if self.ie.akm.is_ft() {
            if let Some(ft) = ctx.config.ft.as_ref() {
                let result = ctx.ft.initial_association(
                    &ctx.config.ssid[..],
                    ft,
                    ctx.aa,
                    &pmk[..],
                    &self.addr,
                    self.ie.pairwise,
                    self.vlan_id,
                    &mut *ctx.ops,
                );
                match result {
                    Ok(entry) => self.pmk_r1 = Some(entry),
                    Err(e) => {
                        error!("FT key hierarchy for {} failed: {}", MacFmt(&self.addr), e);
                        self.request_disconnect(ReasonCode::UNSPECIFIED_REASON);
                        return;
                    }
                }
            }
        }

        self.replay.mark_invalid();
        self.cancel_retransmit(ctx);
        self.pmk_selected = Some(pmk);
        self.tptk = Some(ptk);
        self.mic_verified = true;
    }

    fn enter_init_negotiating(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::PtkInitNegotiating;
        self.ev.timeout_evt = false;
        self.timeout_ctr += 1;
        if self.timeout_ctr > ctx.config.wpa_pairwise_update_count {
            return;
        }
        let ptk = match self.tptk.clone() {
            Some(ptk) => ptk,
            None => return,
        };
        let config = ctx.config;
        let ft = match (config.ft.as_ref(), self.pmk_r1.as_ref()) {
            (Some(ft), Some(r1)) if self.ie.akm.is_ft() => Some(FtMsg3 {
                pmk_r1_name: r1.pmk_r1_name,
                r0kh_id: &ft.nas_identifier[..],
                r1kh_id: ft.r1_key_holder,
            }),
            _ => None,
        };
        let result = messages::pairwise_msg3(self, ctx, &ptk, ft)
            .and_then(|frame| messages::send(self, ctx, frame, Some(ptk.kck())));
        match result {
            Ok(()) => debug!("sent message 3 to {} (attempt {})", MacFmt(&self.addr), self.timeout_ctr),
            Err(e) => error!("failed to send message 3 to {}: {}", MacFmt(&self.addr), e),
        }
        self.schedule_retransmit(ctx, eapol_timeout(config, self.timeout_ctr));
    }

    fn enter_ptk_init_done(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::PtkInitDone;
        self.ev.eapol_key_received = false;
        self.rx = None;
        self.alt_snonce = None;
        if let Some(ptk) = self.tptk.take() {
            if self.ptk_installed && self.ptk.as_ref() == Some(&ptk) {
                debug!("not reinstalling identical PTK for {}", MacFmt(&self.addr));
            } else {
                let key = SetKeyDescriptor {
                    key_type: KeyType::Pairwise,
                    address: self.addr,
                    key_id: 0,
                    key: ptk.tk().to_vec(),
                    rsc: 0,
                    cipher: ptk.cipher,
                };
                if let Err(e) = ctx.ops.set_key(self.vlan_id, &key) {
                    error!("failed to install PTK for {}: {}", MacFmt(&self.addr), e);
                    self.request_disconnect(ReasonCode::UNSPECIFIED_REASON);
                    return;
                }
                self.ptk_installed = true;
            }
            self.ptk = Some(ptk);
        }
        self.install_done(ctx);
        info!("pairwise key handshake with {} completed", MacFmt(&self.addr));
    }

    /// Bookkeeping once a PTK is in place, shared with the FT reassociation shortcut.
    pub(crate) fn install_done(&mut self, ctx: &mut StepCtx<'_>) {
        self.ptk_state = PtkState::PtkInitDone;
        self.timeout_ctr = 0;
        if self.is_wpa1() {
            self.send_group_keys = true;
        } else {
            ctx.ops.set_port_authorized(&self.addr, true);
            if !self.has_gtk {
                self.has_gtk = true;
                if let Some(group) = ctx.groups.get_mut(self.vlan_id) {
                    group.gno_stations += 1;
                }
            }
        }
        self.counters.handshakes_completed += 1;
        if let Some(after) = ctx.config.wpa_ptk_rekey {
            if let Some(id) = self.ptk_rekey.take() {
                ctx.timer.cancel_event(id);
            }
            let event = crate::timer::TimerEvent::PtkRekey {
                addr: self.addr,
                generation: self.generation,
            };
            self.ptk_rekey = Some(ctx.timer.schedule_after(after, event));
        }
    }
}
