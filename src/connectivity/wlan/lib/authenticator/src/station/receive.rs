// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Validation of EAPOL-Key frames received from a station, IEEE Std 802.11-2020, 12.7.2 and
//! 12.7.10. Frames failing any check are dropped without affecting the state machines.

use super::{GroupKeyState, PtkState, StepCtx, Station};
use crate::eapol::{self, KeyFrame, MessageClass, DESCRIPTOR_TYPE_IEEE802DOT11, DESCRIPTOR_TYPE_WPA};
use crate::mac::MacFmt;
use crate::reason::ReasonCode;
use log::{debug, warn};

#[derive(Debug)]
pub(crate) enum Received {
    /// The frame was accepted. The station has to be stepped.
    Step,
    /// An authenticated EAPOL-Key request.
    Request(KeyFrame),
    Dropped,
}

impl Station {
    pub(crate) fn receive(&mut self, ctx: &mut StepCtx<'_>, bytes: &[u8]) -> Received {
        let mic_len = match self.ie.akm.mic_bytes() {
            Some(mic_len) => mic_len as usize,
            None => return Received::Dropped,
        };
        let frame = match eapol::parse(bytes, mic_len) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("malformed EAPOL-Key frame from {}: {}", MacFmt(&self.addr), e);
                return Received::Dropped;
            }
        };

        let expected_type =
            if self.is_wpa1() { DESCRIPTOR_TYPE_WPA } else { DESCRIPTOR_TYPE_IEEE802DOT11 };
        if frame.descriptor_type != expected_type {
            debug!(
                "unexpected descriptor type {} from {}",
                frame.descriptor_type,
                MacFmt(&self.addr)
            );
            return Received::Dropped;
        }
        if Some(frame.key_info.key_descriptor_version()) != self.ie.akm.key_descriptor_version() {
            debug!(
                "unexpected descriptor version {} from {}",
                frame.key_info.key_descriptor_version(),
                MacFmt(&self.addr)
            );
            return Received::Dropped;
        }
        if frame.key_info.key_ack() || !frame.key_info.key_mic() {
            debug!("invalid key information {:?} from {}", frame.key_info, MacFmt(&self.addr));
            return Received::Dropped;
        }

        match frame.classify() {
            MessageClass::Request => self.receive_request(frame),
            MessageClass::Pairwise2 => self.receive_msg2(ctx, frame),
            MessageClass::Pairwise4 => self.receive_msg4(ctx, frame),
            MessageClass::Group2 => self.receive_group2(ctx, frame),
        }
    }

    fn replayed(&mut self, frame: &KeyFrame) -> Received {
        debug!(
            "replayed counter {} from {} dropped",
            frame.key_replay_counter,
            MacFmt(&self.addr)
        );
        self.counters.replayed_frames += 1;
        Received::Dropped
    }

    fn invalid_mic(&mut self, what: &str) -> Received {
        warn!("invalid MIC in {} from {}", what, MacFmt(&self.addr));
        self.counters.mic_failures += 1;
        Received::Dropped
    }

    fn accept(&mut self, class: MessageClass, frame: KeyFrame) -> Received {
        self.rx = Some((class, frame));
        self.ev.eapol_key_received = true;
        Received::Step
    }

    fn receive_request(&mut self, frame: KeyFrame) -> Received {
        let verified = match self.ptk.as_ref() {
            Some(ptk) if self.ptk_installed => {
                eapol::verify_mic(ptk.kck(), &self.ie.akm, &frame)
            }
            _ => {
                debug!("EAPOL-Key request from {} before PTK", MacFmt(&self.addr));
                return Received::Dropped;
            }
        };
        if !verified {
            return self.invalid_mic("request");
        }
        if !self.replay.accept_request(frame.key_replay_counter) {
            return self.replayed(&frame);
        }
        Received::Request(frame)
    }

    fn receive_msg2(&mut self, ctx: &mut StepCtx<'_>, frame: KeyFrame) -> Received {
        if !self.replay.is_valid(frame.key_replay_counter) {
            // Some stations answer every retransmitted message 1 with a new SNonce, possibly after
            // message 3 went out.
            let new_snonce = self.ptk_state == PtkState::PtkInitNegotiating
                && self.replay.was_sent(frame.key_replay_counter)
                && frame.key_nonce != self.snonce;
            if !new_snonce {
                return self.replayed(&frame);
            }
            debug!("{} updated its SNonce", MacFmt(&self.addr));
            self.alt_snonce = Some(self.snonce);
            self.update_snonce = true;
        }

        let expected = match self.ptk_state {
            PtkState::PtkStart | PtkState::PtkCalcNegotiating | PtkState::PtkCalcNegotiating2 => {
                true
            }
            PtkState::PtkInitNegotiating => self.update_snonce,
            _ => false,
        };
        if !expected {
            debug!("message 2 from {} in {:?} dropped", MacFmt(&self.addr), self.ptk_state);
            return Received::Dropped;
        }

        if let Some(group) = ctx.groups.get_mut(self.vlan_id) {
            if group.reject_4way_hs_for_entropy {
                // The next association retries the group initialization.
                warn!("rejecting 4-Way Handshake with {} to collect entropy", MacFmt(&self.addr));
                group.first_sta_seen = false;
                self.request_disconnect(ReasonCode::INVALID_AUTHENTICATION);
                return Received::Step;
            }
        }

        self.snonce = frame.key_nonce;
        self.accept(MessageClass::Pairwise2, frame)
    }

    fn receive_msg4(&mut self, ctx: &mut StepCtx<'_>, frame: KeyFrame) -> Received {
        if self.ptk_state != PtkState::PtkInitNegotiating {
            debug!("message 4 from {} in {:?} dropped", MacFmt(&self.addr), self.ptk_state);
            return Received::Dropped;
        }
        if !self.replay.is_valid(frame.key_replay_counter) {
            return self.replayed(&frame);
        }
        let verified = match self.tptk.as_ref() {
            Some(ptk) => eapol::verify_mic(ptk.kck(), &self.ie.akm, &frame),
            None => return Received::Dropped,
        };
        if !verified {
            // The station may have completed the handshake with an SNonce it replaced later.
            let alt = match (self.alt_snonce.take(), self.pmk_selected.as_ref()) {
                (Some(snonce), Some(pmk)) => match self.derive_ptk(ctx, &pmk[..], &snonce) {
                    Ok(ptk) if eapol::verify_mic(ptk.kck(), &self.ie.akm, &frame) => {
                        Some((snonce, ptk))
                    }
                    _ => None,
                },
                _ => None,
            };
            match alt {
                Some((snonce, ptk)) => {
                    debug!("message 4 from {} used the previous SNonce", MacFmt(&self.addr));
                    self.snonce = snonce;
                    self.tptk = Some(ptk);
                }
                None => return self.invalid_mic("message 4"),
            }
        }
        self.replay.mark_invalid();
        self.cancel_retransmit(ctx);
        self.accept(MessageClass::Pairwise4, frame)
    }

    fn receive_group2(&mut self, ctx: &mut StepCtx<'_>, frame: KeyFrame) -> Received {
        if self.group_state != GroupKeyState::RekeyNegotiating {
            debug!("group message 2 from {} in {:?} dropped", MacFmt(&self.addr), self.group_state);
            return Received::Dropped;
        }
        if !self.replay.is_valid(frame.key_replay_counter) {
            return self.replayed(&frame);
        }
        let verified = match self.ptk.as_ref() {
            Some(ptk) => eapol::verify_mic(ptk.kck(), &self.ie.akm, &frame),
            None => return Received::Dropped,
        };
        if !verified {
            return self.invalid_mic("group message 2");
        }
        self.replay.mark_invalid();
        self.cancel_retransmit(ctx);
        self.accept(MessageClass::Group2, frame)
    }
}
