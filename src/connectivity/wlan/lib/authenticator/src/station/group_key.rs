// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::messages;
use super::{StepCtx, Station};
use crate::authenticator::Work;
use crate::eapol::MessageClass;
use crate::mac::MacFmt;
use crate::reason::ReasonCode;
use log::{debug, error, info, warn};

/// Per-station side of the Group Key Handshake, IEEE Std 802.11-2020, 12.7.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKeyState {
    Idle,
    RekeyNegotiating,
    RekeyEstablished,
    KeyError,
}

impl Station {
    pub(super) fn step_group(&mut self, ctx: &mut StepCtx<'_>) -> bool {
        match self.group_state {
            GroupKeyState::Idle => {
                if self.gupdate_station_keys || self.send_group_keys {
                    self.enter_rekey_negotiating(ctx);
                    true
                } else {
                    false
                }
            }
            GroupKeyState::RekeyNegotiating => {
                let group2 = matches!(self.rx.as_ref(), Some((MessageClass::Group2, _)));
                if self.ev.eapol_key_received && group2 {
                    self.enter_rekey_established(ctx);
                    true
                } else if self.g_timeout_ctr > ctx.config.wpa_group_update_count {
                    self.enter_key_error(ctx);
                    true
                } else if self.ev.timeout_evt {
                    self.enter_rekey_negotiating(ctx);
                    true
                } else {
                    false
                }
            }
            GroupKeyState::RekeyEstablished | GroupKeyState::KeyError => {
                self.group_state = GroupKeyState::Idle;
                self.g_timeout_ctr = 0;
                true
            }
        }
    }

    fn enter_rekey_negotiating(&mut self, ctx: &mut StepCtx<'_>) {
        self.group_state = GroupKeyState::RekeyNegotiating;
        self.send_group_keys = false;
        self.ev.timeout_evt = false;
        self.g_timeout_ctr += 1;
        if self.g_timeout_ctr > ctx.config.wpa_group_update_count {
            return;
        }
        let ptk = match self.ptk.clone() {
            Some(ptk) => ptk,
            None => {
                warn!("no PTK to protect group key message to {}", MacFmt(&self.addr));
                return;
            }
        };
        let result = messages::group_msg1(self, ctx, &ptk)
            .and_then(|frame| messages::send(self, ctx, frame, Some(ptk.kck())));
        match result {
            Ok(()) => debug!(
                "sent group message 1 to {} (attempt {})",
                MacFmt(&self.addr),
                self.g_timeout_ctr
            ),
            Err(e) => error!("failed to send group message 1 to {}: {}", MacFmt(&self.addr), e),
        }
        let timeout = ctx.config.group_timeout;
        self.schedule_retransmit(ctx, timeout);
    }

    /// Removes the station from the count of stations the group waits for.
    fn leave_rekey(&mut self, ctx: &mut StepCtx<'_>) {
        if self.gupdate_station_keys {
            self.gupdate_station_keys = false;
            if let Some(group) = ctx.groups.get_mut(self.vlan_id) {
                group.station_done();
            }
            ctx.work.push_back(Work::Group(self.vlan_id));
        }
    }

    fn enter_rekey_established(&mut self, ctx: &mut StepCtx<'_>) {
        self.group_state = GroupKeyState::RekeyEstablished;
        self.ev.eapol_key_received = false;
        self.rx = None;
        self.leave_rekey(ctx);
        if self.is_wpa1() {
            if !self.has_gtk {
                self.has_gtk = true;
                if let Some(group) = ctx.groups.get_mut(self.vlan_id) {
                    group.gno_stations += 1;
                }
            }
            ctx.ops.set_port_authorized(&self.addr, true);
        }
        info!("group key handshake with {} completed", MacFmt(&self.addr));
    }

    fn enter_key_error(&mut self, ctx: &mut StepCtx<'_>) {
        self.group_state = GroupKeyState::KeyError;
        self.cancel_retransmit(ctx);
        self.leave_rekey(ctx);
        if ctx.config.wpa_disable_disconnect_on_group_failure {
            warn!("group key handshake with {} failed, keeping station", MacFmt(&self.addr));
        } else {
            warn!("group key handshake with {} failed", MacFmt(&self.addr));
            self.request_disconnect(ReasonCode::GK_HANDSHAKE_TIMEOUT);
        }
    }
}
