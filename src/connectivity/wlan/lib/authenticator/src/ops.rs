// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::ft::FtPullError;
use crate::ie::rsn::pmkid::Pmkid;
use crate::key::{Pmk, SetKeyDescriptor};
use crate::key_data::kde::Oci;
use crate::mac::MacAddr;
use crate::pmksa::PmksaEntry;
use crate::reason::ReasonCode;
use anyhow::format_err;
use std::time::{SystemTime, UNIX_EPOCH};

/// Result of asking the driver side for a station's PSKs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PskLookup {
    /// Candidate PMKs, tried in order until one verifies message 2.
    Ready(Vec<Pmk>),
    /// The PSKs are being fetched, e.g. from a RADIUS server. The caller reports completion
    /// through `Authenticator::psk_lookup_done`.
    Pending,
}

/// Side effects of the authenticator. Implemented by the owner of the BSS.
pub trait AuthenticatorOps {
    /// Transmits an EAPOL frame. `encrypt` is set once the PTK is installed.
    fn send_eapol(&mut self, addr: &MacAddr, frame: &[u8], encrypt: bool);

    /// Installs a pairwise or group key.
    fn set_key(&mut self, vlan_id: u16, key: &SetKeyDescriptor) -> Result<(), anyhow::Error>;

    /// Current transmit sequence counter of a key. `addr` is None for group keys.
    fn get_seqnum(
        &mut self,
        _vlan_id: u16,
        _addr: Option<&MacAddr>,
        _key_id: u16,
    ) -> Result<[u8; 8], anyhow::Error> {
        Ok([0u8; 8])
    }

    /// PMKs derived from the station's PSKs, in addition to the configured passphrase.
    fn get_psk(&mut self, _addr: &MacAddr) -> PskLookup {
        PskLookup::Ready(vec![])
    }

    fn disconnect(&mut self, addr: &MacAddr, reason: ReasonCode);

    /// Opens or closes the 802.1X controlled port of a station.
    fn set_port_authorized(&mut self, _addr: &MacAddr, _authorized: bool) {}

    /// Removes a station's pairwise key from the driver.
    fn remove_ptk(&mut self, _addr: &MacAddr) {}

    /// Operating channel of the BSS, carried in message 3 when OCV was negotiated.
    fn channel_info(&mut self) -> Option<Oci> {
        None
    }

    fn random_pool_ready(&mut self) -> bool {
        true
    }

    /// Searches the PMKSA caches of the other authenticators of the ESS for opportunistic key
    /// caching.
    fn find_okc_pmksa(&mut self, _addr: &MacAddr, _pmkid: &Pmkid) -> Option<PmksaEntry> {
        None
    }

    /// Sends a remote request/response frame to another AP of the mobility domain.
    fn send_rrb(&mut self, _dst: &MacAddr, _frame: &[u8]) -> Result<(), anyhow::Error> {
        Err(format_err!("no RRB transport available"))
    }

    /// Completes an FT authentication parked on a PMK-R1 pull.
    fn ft_pull_done(&mut self, _addr: &MacAddr, _result: Result<(), FtPullError>) {}

    /// Delivers an FT Action frame relayed over the DS by another AP.
    fn ft_action_relay(&mut self, _ap_addr: &MacAddr, _request: bool, _action: &[u8]) {}

    /// Number of associated stations across every interface sharing the groups. None falls back
    /// to the stations known to this authenticator.
    fn get_sta_count(&self) -> Option<usize> {
        None
    }

    /// Seconds since the epoch, used to timestamp pushed PMK-R1s.
    fn now_secs(&self) -> u32 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
    }
}

impl<T: AuthenticatorOps + ?Sized> AuthenticatorOps for Box<T> {
    fn send_eapol(&mut self, addr: &MacAddr, frame: &[u8], encrypt: bool) {
        (**self).send_eapol(addr, frame, encrypt)
    }

    fn set_key(&mut self, vlan_id: u16, key: &SetKeyDescriptor) -> Result<(), anyhow::Error> {
        (**self).set_key(vlan_id, key)
    }

    fn get_seqnum(
        &mut self,
        vlan_id: u16,
        addr: Option<&MacAddr>,
        key_id: u16,
    ) -> Result<[u8; 8], anyhow::Error> {
        (**self).get_seqnum(vlan_id, addr, key_id)
    }

    fn get_psk(&mut self, addr: &MacAddr) -> PskLookup {
        (**self).get_psk(addr)
    }

    fn disconnect(&mut self, addr: &MacAddr, reason: ReasonCode) {
        (**self).disconnect(addr, reason)
    }

    fn set_port_authorized(&mut self, addr: &MacAddr, authorized: bool) {
        (**self).set_port_authorized(addr, authorized)
    }

    fn remove_ptk(&mut self, addr: &MacAddr) {
        (**self).remove_ptk(addr)
    }

    fn channel_info(&mut self) -> Option<Oci> {
        (**self).channel_info()
    }

    fn random_pool_ready(&mut self) -> bool {
        (**self).random_pool_ready()
    }

    fn find_okc_pmksa(&mut self, addr: &MacAddr, pmkid: &Pmkid) -> Option<PmksaEntry> {
        (**self).find_okc_pmksa(addr, pmkid)
    }

    fn send_rrb(&mut self, dst: &MacAddr, frame: &[u8]) -> Result<(), anyhow::Error> {
        (**self).send_rrb(dst, frame)
    }

    fn ft_pull_done(&mut self, addr: &MacAddr, result: Result<(), FtPullError>) {
        (**self).ft_pull_done(addr, result)
    }

    fn ft_action_relay(&mut self, ap_addr: &MacAddr, request: bool, action: &[u8]) {
        (**self).ft_action_relay(ap_addr, request, action)
    }

    fn get_sta_count(&self) -> Option<usize> {
        (**self).get_sta_count()
    }

    fn now_secs(&self) -> u32 {
        (**self).now_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::RecordingOps;

    #[test]
    fn boxed_ops_forward() {
        let mut ops: Box<dyn AuthenticatorOps> = Box::new(RecordingOps::new());
        assert_eq!(ops.get_psk(&[1; 6]), PskLookup::Ready(vec![]));
        assert!(ops.random_pool_ready());
        assert!(ops.send_rrb(&[2; 6], &[0xaa]).is_ok());
        assert_eq!(ops.now_secs(), 0);
    }
}
