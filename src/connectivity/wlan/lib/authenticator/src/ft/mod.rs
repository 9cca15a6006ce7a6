// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fast BSS Transition key holders.
//!
//! As R0KH this authenticator derives PMK-R0 from the XXKey of an initial mobility domain
//! association, derives PMK-R1s for itself and its peer R1KHs and answers their pulls. As R1KH
//! it resolves the PMK-R1 of a transitioning station from its cache or pulls it from the R0KH
//! that holds the station's PMK-R0.

pub mod cache;
pub mod keys;
pub mod rrb;

use self::cache::{FtKeyCache, PmkR0Entry, PmkR1Entry};
use self::keys::{derive_pmk_r0, derive_pmk_r1, pmk_r1_name, PmkR0Name};
use self::rrb::{PullRequest, PullResponse, PushMessage, RrbFrame, NONCE_LEN};
use crate::config::FtConfig;
use crate::crypto_utils::nonce::random_bytes;
use crate::eapol::to_array;
use crate::ie::rsn::cipher::Cipher;
use crate::mac::{MacAddr, MacFmt};
use crate::ops::AuthenticatorOps;
use crate::timer::{EventId, Timer, TimerEvent};
use crate::Error;
use log::{debug, info, warn};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FtPullError {
    #[error("no response from R0KH")]
    Timeout,
    #[error("station left before the pull completed")]
    StationRemoved,
}

/// Key material named by a station's FT authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtAuthRequest {
    pub pmk_r0_name: PmkR0Name,
    pub r0kh_id: Vec<u8>,
    pub pairwise: Cipher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtAuthOutcome {
    Ready(PmkR1Entry),
    /// A pull was sent to the R0KH. `AuthenticatorOps::ft_pull_done` reports the result.
    Pending,
}

#[derive(Debug)]
struct PendingPull {
    nonce: [u8; NONCE_LEN],
    r0kh_addr: MacAddr,
    pmk_r0_name: PmkR0Name,
    event_id: EventId,
}

#[derive(Default)]
pub struct FtState {
    pub cache: FtKeyCache,
    pending: HashMap<MacAddr, PendingPull>,
}

impl FtState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pull_pending(&self, sta: &MacAddr) -> bool {
        self.pending.contains_key(sta)
    }

    /// Derives and caches PMK-R0 and this AP's PMK-R1 for a station completing its initial
    /// mobility domain association. Pushes PMK-R1s to the configured R1KHs if requested.
    pub fn initial_association(
        &mut self,
        ssid: &[u8],
        ft: &FtConfig,
        own_addr: &MacAddr,
        xxkey: &[u8],
        sta: &MacAddr,
        pairwise: Cipher,
        vlan_id: u16,
        ops: &mut dyn AuthenticatorOps,
    ) -> Result<PmkR1Entry, Error> {
        let (pmk_r0, pmk_r0_name) =
            derive_pmk_r0(xxkey, ssid, &ft.mobility_domain, &ft.nas_identifier[..], sta)?;
        let r0 = PmkR0Entry { pmk_r0, pmk_r0_name, pairwise, vlan_id };
        let r1 = derive_r1_entry(&r0, &ft.r1_key_holder, sta)?;
        self.cache.store_pmk_r1(sta, r1.clone());
        if ft.pmk_r1_push {
            push_pmk_r1(ft, own_addr, sta, &r0, ops);
        }
        self.cache.store_pmk_r0(sta, r0);
        Ok(r1)
    }

    /// Resolves the PMK-R1 a station's FT authentication refers to.
    pub fn authenticate(
        &mut self,
        ft: &FtConfig,
        own_addr: &MacAddr,
        sta: &MacAddr,
        req: &FtAuthRequest,
        ops: &mut dyn AuthenticatorOps,
        timer: &mut Timer<TimerEvent>,
    ) -> Result<FtAuthOutcome, Error> {
        let r1_name = pmk_r1_name(&req.pmk_r0_name, &ft.r1_key_holder, sta);
        if let Some(entry) = self.cache.get_pmk_r1(sta, &r1_name) {
            debug!("PMK-R1 for {} found in cache", MacFmt(sta));
            return Ok(FtAuthOutcome::Ready(entry.clone()));
        }

        if req.r0kh_id == ft.nas_identifier {
            let r0 = self
                .cache
                .get_pmk_r0(sta, &req.pmk_r0_name)
                .ok_or(Error::UnknownPmkR0Name(req.pmk_r0_name))?;
            let r1 = derive_r1_entry(r0, &ft.r1_key_holder, sta)?;
            self.cache.store_pmk_r1(sta, r1.clone());
            return Ok(FtAuthOutcome::Ready(r1));
        }

        let r0kh = ft
            .find_r0kh(&req.r0kh_id[..])
            .ok_or_else(|| Error::UnknownR0kh(req.r0kh_id.clone()))?;
        let nonce: [u8; NONCE_LEN] = to_array(&random_bytes(NONCE_LEN)[..]);
        let pull = PullRequest {
            nonce,
            pmk_r0_name: req.pmk_r0_name,
            r1kh_id: ft.r1_key_holder,
            s1kh_id: *sta,
        };
        let frame = pull.seal(own_addr, &r0kh.key[..])?;
        ops.send_rrb(&r0kh.addr, &frame[..]).map_err(Error::SendRrb)?;
        info!("sent PMK-R1 pull for {} to R0KH {}", MacFmt(sta), MacFmt(&r0kh.addr));

        let event_id =
            timer.schedule_after(ft.pull_timeout, TimerEvent::FtPullTimeout { addr: *sta, nonce });
        let pending = PendingPull {
            nonce,
            r0kh_addr: r0kh.addr,
            pmk_r0_name: req.pmk_r0_name,
            event_id,
        };
        if let Some(old) = self.pending.insert(*sta, pending) {
            timer.cancel_event(old.event_id);
        }
        Ok(FtAuthOutcome::Pending)
    }

    /// Drops an expired pull and releases the waiting authentication with a failure.
    pub fn pull_timeout(
        &mut self,
        sta: &MacAddr,
        nonce: &[u8; NONCE_LEN],
        ops: &mut dyn AuthenticatorOps,
    ) {
        match self.pending.get(sta) {
            Some(pending) if &pending.nonce == nonce => {
                self.pending.remove(sta);
                warn!("PMK-R1 pull for {} timed out", MacFmt(sta));
                ops.ft_pull_done(sta, Err(FtPullError::Timeout));
            }
            _ => (),
        }
    }

    /// Forgets a pull of a station that left.
    pub fn cancel_pull(
        &mut self,
        sta: &MacAddr,
        timer: &mut Timer<TimerEvent>,
        ops: &mut dyn AuthenticatorOps,
    ) {
        if let Some(pending) = self.pending.remove(sta) {
            timer.cancel_event(pending.event_id);
            ops.ft_pull_done(sta, Err(FtPullError::StationRemoved));
        }
    }

    /// Handles a frame received from a peer key holder.
    pub fn process_rrb(
        &mut self,
        ft: &FtConfig,
        own_addr: &MacAddr,
        bytes: &[u8],
        now_secs: u32,
        ops: &mut dyn AuthenticatorOps,
        timer: &mut Timer<TimerEvent>,
    ) -> Result<(), Error> {
        let frame = rrb::parse_frame(bytes)?;
        match frame.packet_type {
            rrb::PACKET_TYPE_REQUEST | rrb::PACKET_TYPE_RESPONSE => {
                let request = frame.packet_type == rrb::PACKET_TYPE_REQUEST;
                ops.ft_action_relay(&frame.ap_addr, request, frame.payload);
                Ok(())
            }
            rrb::PACKET_TYPE_PULL => self.answer_pull(ft, own_addr, &frame, ops),
            rrb::PACKET_TYPE_RESP => self.pull_response(ft, &frame, ops, timer),
            rrb::PACKET_TYPE_PUSH => self.pushed(ft, &frame, now_secs),
            other => Err(rrb::Error::UnknownPacketType(other).into()),
        }
    }

    fn answer_pull(
        &mut self,
        ft: &FtConfig,
        own_addr: &MacAddr,
        frame: &RrbFrame<'_>,
        ops: &mut dyn AuthenticatorOps,
    ) -> Result<(), Error> {
        let r1kh =
            ft.find_r1kh_by_addr(&frame.ap_addr).ok_or(rrb::Error::UnknownPeer(frame.ap_addr))?;
        let pull = PullRequest::open(frame, &r1kh.key[..])?;
        if pull.r1kh_id != r1kh.id {
            return Err(rrb::Error::WrongKeyHolder(pull.r1kh_id).into());
        }
        let r0 = self
            .cache
            .get_pmk_r0(&pull.s1kh_id, &pull.pmk_r0_name)
            .ok_or(rrb::Error::UnknownPmkR0(pull.s1kh_id))?;
        let r1 = derive_r1_entry(r0, &pull.r1kh_id, &pull.s1kh_id)?;
        let resp = PullResponse {
            nonce: pull.nonce,
            r1kh_id: pull.r1kh_id,
            s1kh_id: pull.s1kh_id,
            pmk_r1: r1.pmk_r1,
            pmk_r1_name: r1.pmk_r1_name,
            pairwise: r1.pairwise,
            vlan_id: r1.vlan_id,
        };
        let bytes = resp.seal(own_addr, &r1kh.key[..])?;
        ops.send_rrb(&r1kh.addr, &bytes[..]).map_err(Error::SendRrb)?;
        info!(
            "answered PMK-R1 pull of {} for {}",
            MacFmt(&r1kh.addr),
            MacFmt(&pull.s1kh_id)
        );
        Ok(())
    }

    fn pull_response(
        &mut self,
        ft: &FtConfig,
        frame: &RrbFrame<'_>,
        ops: &mut dyn AuthenticatorOps,
        timer: &mut Timer<TimerEvent>,
    ) -> Result<(), Error> {
        let r0kh =
            ft.find_r0kh_by_addr(&frame.ap_addr).ok_or(rrb::Error::UnknownPeer(frame.ap_addr))?;
        let resp = PullResponse::open(frame, &r0kh.key[..])?;
        if resp.r1kh_id != ft.r1_key_holder {
            return Err(rrb::Error::WrongKeyHolder(resp.r1kh_id).into());
        }
        let sta = resp.s1kh_id;
        let pmk_r0_name = match self.pending.get(&sta) {
            Some(p) if p.nonce == resp.nonce && p.r0kh_addr == r0kh.addr => p.pmk_r0_name,
            _ => return Err(rrb::Error::UnsolicitedResponse(sta).into()),
        };
        if let Some(pending) = self.pending.remove(&sta) {
            timer.cancel_event(pending.event_id);
        }
        self.cache.store_pmk_r1(
            &sta,
            PmkR1Entry {
                pmk_r1: resp.pmk_r1,
                pmk_r1_name: resp.pmk_r1_name,
                pmk_r0_name,
                pairwise: resp.pairwise,
                vlan_id: resp.vlan_id,
            },
        );
        info!("received PMK-R1 for {} from R0KH {}", MacFmt(&sta), MacFmt(&r0kh.addr));
        ops.ft_pull_done(&sta, Ok(()));
        Ok(())
    }

    fn pushed(&mut self, ft: &FtConfig, frame: &RrbFrame<'_>, now_secs: u32) -> Result<(), Error> {
        let r0kh =
            ft.find_r0kh_by_addr(&frame.ap_addr).ok_or(rrb::Error::UnknownPeer(frame.ap_addr))?;
        let push = PushMessage::open(frame, &r0kh.key[..])?;
        if push.r1kh_id != ft.r1_key_holder {
            return Err(rrb::Error::WrongKeyHolder(push.r1kh_id).into());
        }
        let age = now_secs.saturating_sub(push.timestamp);
        if age > ft.push_max_age_secs {
            return Err(rrb::Error::StalePush(age).into());
        }
        self.cache.store_pmk_r1(
            &push.s1kh_id,
            PmkR1Entry {
                pmk_r1: push.pmk_r1,
                pmk_r1_name: push.pmk_r1_name,
                pmk_r0_name: push.pmk_r0_name,
                pairwise: push.pairwise,
                vlan_id: push.vlan_id,
            },
        );
        debug!("stored pushed PMK-R1 for {}", MacFmt(&push.s1kh_id));
        Ok(())
    }
}

fn derive_r1_entry(r0: &PmkR0Entry, r1kh_id: &MacAddr, sta: &MacAddr) -> Result<PmkR1Entry, Error> {
    let (pmk_r1, pmk_r1_name) = derive_pmk_r1(&r0.pmk_r0, &r0.pmk_r0_name, r1kh_id, sta)?;
    Ok(PmkR1Entry {
        pmk_r1,
        pmk_r1_name,
        pmk_r0_name: r0.pmk_r0_name,
        pairwise: r0.pairwise,
        vlan_id: r0.vlan_id,
    })
}

fn push_pmk_r1(
    ft: &FtConfig,
    own_addr: &MacAddr,
    sta: &MacAddr,
    r0: &PmkR0Entry,
    ops: &mut dyn AuthenticatorOps,
) {
    let timestamp = ops.now_secs();
    for r1kh in ft.r1khs.iter() {
        let result = derive_r1_entry(r0, &r1kh.id, sta).and_then(|r1| {
            let push = PushMessage {
                timestamp,
                r1kh_id: r1kh.id,
                s1kh_id: *sta,
                pmk_r0_name: r0.pmk_r0_name,
                pmk_r1: r1.pmk_r1,
                pmk_r1_name: r1.pmk_r1_name,
                pairwise: r1.pairwise,
                vlan_id: r1.vlan_id,
            };
            let bytes = push.seal(own_addr, &r1kh.key[..])?;
            ops.send_rrb(&r1kh.addr, &bytes[..]).map_err(Error::SendRrb)
        });
        if let Err(e) = result {
            warn!("failed to push PMK-R1 to {}: {}", MacFmt(&r1kh.addr), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{R0kh, R1kh};
    use crate::ie::rsn::cipher;
    use crate::test_util::{self, FakeScheduler, RecordingOps};
    use assert_matches::assert_matches;

    const STA: MacAddr = [0x02, 0, 0, 0, 0x09, 0];
    const R0_AP: MacAddr = [0x02, 0, 0, 0, 0x0a, 0];
    const R1_AP: MacAddr = [0x02, 0, 0, 0, 0x0b, 0];
    const KEY: [u8; 16] = [0x42; 16];
    const XXKEY: [u8; 32] = [0x77; 32];

    /// A pair of key holders which know each other.
    fn r0_config() -> FtConfig {
        FtConfig {
            nas_identifier: b"r0kh.example.com".to_vec(),
            r1_key_holder: R0_AP,
            r1khs: vec![R1kh { addr: R1_AP, id: R1_AP, key: KEY.to_vec() }],
            r0khs: vec![],
            ..test_util::ft_config()
        }
    }

    fn r1_config() -> FtConfig {
        FtConfig {
            nas_identifier: b"r1kh.example.com".to_vec(),
            r1_key_holder: R1_AP,
            r0khs: vec![R0kh { addr: R0_AP, id: b"r0kh.example.com".to_vec(), key: KEY.to_vec() }],
            r1khs: vec![],
            ..test_util::ft_config()
        }
    }

    fn ccmp() -> Cipher {
        Cipher::new_dot11(cipher::CCMP_128)
    }

    fn timer() -> Timer<TimerEvent> {
        Timer::new(Box::new(FakeScheduler::new()))
    }

    fn request(r0_name: PmkR0Name) -> FtAuthRequest {
        FtAuthRequest {
            pmk_r0_name: r0_name,
            r0kh_id: b"r0kh.example.com".to_vec(),
            pairwise: ccmp(),
        }
    }

    #[test]
    fn local_r0kh_resolves_immediately() {
        let ft = r0_config();
        let mut ops = RecordingOps::new();
        let mut state = FtState::new();
        let r1 = state
            .initial_association(b"ssid", &ft, &R0_AP, &XXKEY[..], &STA, ccmp(), 0, &mut ops)
            .expect("initial association");
        assert_eq!(state.cache.r0_len(), 1);

        let outcome = state
            .authenticate(&ft, &R0_AP, &STA, &request(r1.pmk_r0_name), &mut ops, &mut timer())
            .expect("authenticate");
        assert_eq!(outcome, FtAuthOutcome::Ready(r1));
        assert!(ops.rrb_sent.is_empty());
    }

    #[test]
    fn unknown_r0kh_is_rejected() {
        let ft = r1_config();
        let mut ops = RecordingOps::new();
        let mut state = FtState::new();
        let req = FtAuthRequest { r0kh_id: b"nobody".to_vec(), ..request([1; 16]) };
        assert_matches!(
            state.authenticate(&ft, &R1_AP, &STA, &req, &mut ops, &mut timer()),
            Err(Error::UnknownR0kh(_))
        );
    }

    #[test]
    fn pull_round_trip() {
        let (r0_ft, r1_ft) = (r0_config(), r1_config());
        let mut r0_ops = RecordingOps::new();
        let mut r1_ops = RecordingOps::new();
        let mut r0 = FtState::new();
        let mut r1 = FtState::new();
        let mut r1_timer = timer();

        let r0_name = r0
            .initial_association(b"ssid", &r0_ft, &R0_AP, &XXKEY[..], &STA, ccmp(), 5, &mut r0_ops)
            .expect("initial association")
            .pmk_r0_name;

        let outcome = r1
            .authenticate(&r1_ft, &R1_AP, &STA, &request(r0_name), &mut r1_ops, &mut r1_timer)
            .expect("authenticate");
        assert_eq!(outcome, FtAuthOutcome::Pending);
        assert!(r1.pull_pending(&STA));
        assert_eq!(r1_timer.pending(), 1);
        let (dst, pull) = r1_ops.rrb_sent.remove(0);
        assert_eq!(dst, R0_AP);

        r0.process_rrb(&r0_ft, &R0_AP, &pull[..], 0, &mut r0_ops, &mut timer()).expect("answer pull");
        let (dst, resp) = r0_ops.rrb_sent.remove(0);
        assert_eq!(dst, R1_AP);

        r1.process_rrb(&r1_ft, &R1_AP, &resp[..], 0, &mut r1_ops, &mut r1_timer).expect("response");
        assert!(!r1.pull_pending(&STA));
        assert_eq!(r1_timer.pending(), 0);
        assert_eq!(r1_ops.pull_done, vec![(STA, Ok(()))]);

        // The pulled PMK-R1 is the one the R0KH derives for this R1KH.
        let expected = derive_r1_entry(
            r0.cache.get_pmk_r0(&STA, &r0_name).expect("PMK-R0"),
            &R1_AP,
            &STA,
        )
        .expect("derive PMK-R1");
        let pulled = r1.cache.get_pmk_r1(&STA, &expected.pmk_r1_name).expect("PMK-R1 cached");
        assert_eq!(pulled.pmk_r1, expected.pmk_r1);
        assert_eq!(pulled.vlan_id, 5);
    }

    #[test]
    fn mismatched_nonce_is_ignored() {
        let r1_ft = r1_config();
        let mut ops = RecordingOps::new();
        let mut state = FtState::new();
        let mut timer = timer();
        state
            .authenticate(&r1_ft, &R1_AP, &STA, &request([3; 16]), &mut ops, &mut timer)
            .expect("authenticate");

        let resp = PullResponse {
            nonce: [0xff; 16],
            r1kh_id: R1_AP,
            s1kh_id: STA,
            pmk_r1: [1; 32],
            pmk_r1_name: [2; 16],
            pairwise: ccmp(),
            vlan_id: 0,
        };
        let bytes = resp.seal(&R0_AP, &KEY[..]).expect("seal");
        assert_matches!(
            state.process_rrb(&r1_ft, &R1_AP, &bytes[..], 0, &mut ops, &mut timer),
            Err(Error::Rrb(rrb::Error::UnsolicitedResponse(STA)))
        );
        assert!(state.pull_pending(&STA));
        assert_eq!(state.cache.r1_len(), 0);
        assert!(ops.pull_done.is_empty());
    }

    #[test]
    fn pull_timeout_releases_failure() {
        let r1_ft = r1_config();
        let mut ops = RecordingOps::new();
        let mut state = FtState::new();
        let mut timer = timer();
        state
            .authenticate(&r1_ft, &R1_AP, &STA, &request([3; 16]), &mut ops, &mut timer)
            .expect("authenticate");
        let nonce = state.pending.get(&STA).map(|p| p.nonce).expect("pending pull");

        state.pull_timeout(&STA, &[0; 16], &mut ops);
        assert!(state.pull_pending(&STA));

        state.pull_timeout(&STA, &nonce, &mut ops);
        assert!(!state.pull_pending(&STA));
        assert_eq!(ops.pull_done, vec![(STA, Err(FtPullError::Timeout))]);
    }

    #[test]
    fn push_distributes_and_ages_out() {
        let r0_ft = FtConfig { pmk_r1_push: true, ..r0_config() };
        let r1_ft = r1_config();
        let mut r0_ops = RecordingOps::new();
        r0_ops.now = 1000;
        let mut r0 = FtState::new();
        let r0_name = r0
            .initial_association(b"ssid", &r0_ft, &R0_AP, &XXKEY[..], &STA, ccmp(), 9, &mut r0_ops)
            .expect("initial association")
            .pmk_r0_name;
        assert_eq!(r0_ops.rrb_sent.len(), 1);
        let (dst, push) = r0_ops.rrb_sent.remove(0);
        assert_eq!(dst, R1_AP);

        let mut ops = RecordingOps::new();
        let mut r1 = FtState::new();
        let stale = 1000 + r1_ft.push_max_age_secs + 1;
        assert_matches!(
            r1.process_rrb(&r1_ft, &R1_AP, &push[..], stale, &mut ops, &mut timer()),
            Err(Error::Rrb(rrb::Error::StalePush(_)))
        );
        assert_eq!(r1.cache.r1_len(), 0);

        r1.process_rrb(&r1_ft, &R1_AP, &push[..], 1001, &mut ops, &mut timer()).expect("push");
        assert_eq!(r1.cache.r1_len(), 1);
        let r1_name = pmk_r1_name(&r0_name, &R1_AP, &STA);
        let pushed = r1.cache.get_pmk_r1(&STA, &r1_name).expect("pushed PMK-R1");
        assert_eq!(pushed.vlan_id, 9);
    }

    #[test]
    fn relay_frames_reach_ops() {
        let ft = r1_config();
        let mut ops = RecordingOps::new();
        let mut state = FtState::new();
        let bytes = rrb::write_relay(false, &R0_AP, &[6, 2, 1]).expect("relay");
        state.process_rrb(&ft, &R1_AP, &bytes[..], 0, &mut ops, &mut timer()).expect("relay");
        assert_eq!(ops.relays, vec![(R0_AP, false, vec![6, 2, 1])]);
    }

    #[test]
    fn unknown_peer_is_dropped() {
        let ft = r0_config();
        let mut ops = RecordingOps::new();
        let mut state = FtState::new();
        let pull = PullRequest { nonce: [1; 16], pmk_r0_name: [2; 16], r1kh_id: STA, s1kh_id: STA };
        let bytes = pull.seal(&STA, &KEY[..]).expect("seal");
        assert_matches!(
            state.process_rrb(&ft, &R0_AP, &bytes[..], 0, &mut ops, &mut timer()),
            Err(Error::Rrb(rrb::Error::UnknownPeer(STA)))
        );
    }
}
