// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EAPOL-Key frames sent by the Authenticator.

use super::{StepCtx, Station};
use crate::crypto_utils::keywrap;
use crate::eapol::{
    self, key_type, KeyFrame, KeyInformation, DESCRIPTOR_TYPE_IEEE802DOT11, DESCRIPTOR_TYPE_WPA,
};
use crate::ft::keys::PmkR1Name;
use crate::group::Group;
use crate::ie::id;
use crate::key::ptk::Ptk;
use crate::key_data::kde::{self, GtkInfoTx, Igtk, MloLink};
use crate::mac::MacAddr;
use crate::Error;
use bytes::Bytes;

/// MIC Control, MIC, ANonce and SNonce of the FTE.
const FTE_FIXED_LEN: usize = 2 + 16 + 32 + 32;
const FTE_SUBELEM_R1KH_ID: u8 = 1;
const FTE_SUBELEM_R0KH_ID: u8 = 3;
const TIE_KEY_LIFETIME: u8 = 2;
/// Lifetime of the PMK-R0 announced in message 3 of the FT initial association, in seconds.
pub(super) const FT_KEY_LIFETIME_SECS: u32 = 1_209_600;

fn descriptor_type(sta: &Station) -> u8 {
    if sta.is_wpa1() {
        DESCRIPTOR_TYPE_WPA
    } else {
        DESCRIPTOR_TYPE_IEEE802DOT11
    }
}

fn mic_len(sta: &Station) -> Result<usize, Error> {
    sta.ie.akm.mic_bytes().map(usize::from).ok_or(Error::UnsupportedAkm(sta.ie.akm))
}

fn base_key_info(sta: &Station) -> Result<KeyInformation, Error> {
    let version =
        sta.ie.akm.key_descriptor_version().ok_or(Error::UnsupportedAkm(sta.ie.akm))?;
    let mut key_info = KeyInformation(0);
    key_info.set_key_descriptor_version(version);
    key_info.set_key_ack(true);
    Ok(key_info)
}

fn pairwise_key_len(sta: &Station) -> Result<u16, Error> {
    sta.ie.pairwise.tk_bytes().map(|len| len as u16).ok_or(Error::UnsupportedCipher(sta.ie.pairwise))
}

/// Current transmit sequence counter of a group key, or zeros if the driver cannot tell.
fn group_seqnum(ctx: &mut StepCtx<'_>, vlan_id: u16, key_id: u16) -> [u8; 8] {
    ctx.ops.get_seqnum(vlan_id, None, key_id).unwrap_or([0u8; 8])
}

fn write_group_keys<A: crate::appendable::Appendable>(
    w: &mut kde::Writer<A>,
    group: &Group,
    seqnums: &GroupSeqnums,
    mfp: bool,
) -> Result<(), Error> {
    w.write_gtk(&kde::Gtk::new(group.gn() as u8, GtkInfoTx::OnlyRx, group.gtk()))?;
    if mfp {
        if let Some((key_id, igtk)) = group.igtk() {
            w.write_igtk(&Igtk::new(key_id, &seqnums.igtk[..6], igtk))?;
        }
        if let Some((key_id, bigtk)) = group.bigtk() {
            w.write_bigtk(&Igtk::new(key_id, &seqnums.bigtk[..6], bigtk))?;
        }
    }
    Ok(())
}

#[derive(Default)]
struct GroupSeqnums {
    gtk: [u8; 8],
    igtk: [u8; 8],
    bigtk: [u8; 8],
}

fn seqnums_of(ctx: &mut StepCtx<'_>, vlan_id: u16) -> Result<GroupSeqnums, Error> {
    let group = ctx.groups.get(vlan_id).ok_or(Error::NoGroup(vlan_id))?;
    let (gn, igtk_id, bigtk_id) =
        (group.gn(), group.igtk().map(|(id, _)| id), group.bigtk().map(|(id, _)| id));
    let mut seqnums = GroupSeqnums { gtk: group_seqnum(ctx, vlan_id, gn), ..Default::default() };
    if let Some(id) = igtk_id {
        seqnums.igtk = group_seqnum(ctx, vlan_id, id);
    }
    if let Some(id) = bigtk_id {
        seqnums.bigtk = group_seqnum(ctx, vlan_id, id);
    }
    Ok(seqnums)
}

/// Fills in the MIC and hands the frame to the driver.
pub(super) fn send(
    sta: &Station,
    ctx: &mut StepCtx<'_>,
    mut frame: KeyFrame,
    kck: Option<&[u8]>,
) -> Result<(), Error> {
    if let Some(kck) = kck {
        frame.key_mic = Bytes::from(eapol::compute_mic(kck, &sta.ie.akm, &frame)?);
    }
    ctx.ops.send_eapol(&sta.addr, &frame.to_bytes(false)[..], sta.ptk_installed);
    Ok(())
}

// IEEE Std 802.11-2020, 12.7.6.2
pub(super) fn pairwise_msg1(
    sta: &mut Station,
    pmkid: Option<&[u8; 16]>,
) -> Result<KeyFrame, Error> {
    let mut key_info = base_key_info(sta)?;
    key_info.set_key_type(key_type::PAIRWISE);

    let mut frame = KeyFrame::new(descriptor_type(sta), key_info, mic_len(sta)?);
    frame.key_len = pairwise_key_len(sta)?;
    frame.key_replay_counter = sta.replay.next();
    frame.key_nonce = sta.anonce;
    if let Some(pmkid) = pmkid {
        let mut w = kde::Writer::new(vec![]);
        w.write_pmkid(pmkid)?;
        frame.set_key_data(w.finalize_for_plaintext()?);
    }
    Ok(frame)
}

/// The FT parameters message 3 of an initial mobility domain association echoes.
pub(super) struct FtMsg3<'a> {
    pub pmk_r1_name: PmkR1Name,
    pub r0kh_id: &'a [u8],
    pub r1kh_id: MacAddr,
}

// IEEE Std 802.11-2020, 12.7.6.4
pub(super) fn pairwise_msg3(
    sta: &mut Station,
    ctx: &mut StepCtx<'_>,
    ptk: &Ptk,
    ft: Option<FtMsg3<'_>>,
) -> Result<KeyFrame, Error> {
    let mut key_info = base_key_info(sta)?;
    key_info.set_key_type(key_type::PAIRWISE);
    key_info.set_install(true);
    key_info.set_key_mic(true);

    let mut frame = KeyFrame::new(descriptor_type(sta), key_info, mic_len(sta)?);
    frame.key_len = pairwise_key_len(sta)?;
    frame.key_replay_counter = sta.replay.next();
    frame.key_nonce = sta.anonce;

    if sta.is_wpa1() {
        // WPA delivers the GTK in a separate group key handshake.
        let mut w = kde::Writer::new(vec![]);
        if let Some(wpa) = ctx.own_ies.wpa.as_ref() {
            w.write_wpa1_ie(wpa)?;
        }
        frame.set_key_data(w.finalize_for_plaintext()?);
        return Ok(frame);
    }

    frame.key_info.set_secure(true);
    frame.key_info.set_encrypted_key_data(true);

    let seqnums = seqnums_of(ctx, sta.vlan_id)?;
    frame.key_rsc = seqnums.gtk;

    let mut w = kde::Writer::new(vec![]);
    if let Some(rsne) = ctx.own_ies.rsne.as_ref() {
        match ft.as_ref() {
            Some(ft) => {
                let mut rsne = rsne.clone();
                rsne.pmkids = vec![ft.pmk_r1_name];
                w.write_rsne(&rsne)?;
            }
            None => w.write_rsne(rsne)?,
        }
    }
    if sta.ie.rsnxe.is_some() {
        if let Some(rsnxe) = ctx.own_ies.rsnxe.as_ref() {
            w.write_raw_element(rsnxe.as_bytes())?;
        }
    }
    let group = ctx.groups.get(sta.vlan_id).ok_or(Error::NoGroup(sta.vlan_id))?;
    write_group_keys(&mut w, group, &seqnums, sta.ie.mfp)?;

    if sta.ie.ocv {
        let oci = ctx.ops.channel_info().ok_or(Error::NoChannelInfo)?;
        w.write_oci(&oci)?;
    }

    for link in sta.mlo_links.iter() {
        w.write_mlo_link(&MloLink { link_id: link.link_id, link_addr: link.link_addr })?;
        let link_seqnums = seqnums_of(ctx, link.vlan_id)?;
        let group = ctx.groups.get(link.vlan_id).ok_or(Error::NoGroup(link.vlan_id))?;
        write_group_keys(&mut w, group, &link_seqnums, sta.ie.mfp)?;
    }

    if ctx.config.transition_disable != 0 {
        w.write_transition_disable(ctx.config.transition_disable)?;
    }

    if let Some(ft) = ft {
        if let Some(mde) = ctx.own_ies.mde.as_ref() {
            let mut buf = vec![];
            mde.write_into(&mut buf)?;
            w.write_raw_element(&buf[..])?;
        }
        w.write_raw_element(&fte(&sta.anonce, &sta.snonce, &ft.r1kh_id, ft.r0kh_id)[..])?;
        w.write_raw_element(&key_lifetime_tie(FT_KEY_LIFETIME_SECS)[..])?;
    }

    let key_data = w.finalize_for_encryption()?;
    frame.set_key_data(keywrap::wrap(ptk.kek(), &key_data[..])?);
    Ok(frame)
}

// IEEE Std 802.11-2020, 12.7.7.2
pub(super) fn group_msg1(
    sta: &mut Station,
    ctx: &mut StepCtx<'_>,
    ptk: &Ptk,
) -> Result<KeyFrame, Error> {
    let mut key_info = base_key_info(sta)?;
    key_info.set_key_type(key_type::GROUP_SMK);
    key_info.set_key_mic(true);
    key_info.set_secure(true);

    let seqnums = seqnums_of(ctx, sta.vlan_id)?;
    let group = ctx.groups.get(sta.vlan_id).ok_or(Error::NoGroup(sta.vlan_id))?;

    let mut frame = KeyFrame::new(descriptor_type(sta), key_info, mic_len(sta)?);
    frame.key_replay_counter = sta.replay.next();
    frame.key_nonce = *group.gnonce();
    frame.key_rsc = seqnums.gtk;

    if sta.is_wpa1() {
        frame.key_info.set_legacy_key_index(group.gn());
        frame.key_len = group.gtk().len() as u16;
        frame.set_key_data(keywrap::wrap(ptk.kek(), group.gtk())?);
        return Ok(frame);
    }

    frame.key_info.set_encrypted_key_data(true);
    let mut w = kde::Writer::new(vec![]);
    write_group_keys(&mut w, group, &seqnums, sta.ie.mfp)?;
    if sta.ie.ocv {
        let oci = ctx.ops.channel_info().ok_or(Error::NoChannelInfo)?;
        w.write_oci(&oci)?;
    }
    for link in sta.mlo_links.iter() {
        w.write_mlo_link(&MloLink { link_id: link.link_id, link_addr: link.link_addr })?;
        let link_seqnums = seqnums_of(ctx, link.vlan_id)?;
        let group = ctx.groups.get(link.vlan_id).ok_or(Error::NoGroup(link.vlan_id))?;
        write_group_keys(&mut w, group, &link_seqnums, sta.ie.mfp)?;
    }
    let key_data = w.finalize_for_encryption()?;
    frame.set_key_data(keywrap::wrap(ptk.kek(), &key_data[..])?);
    Ok(frame)
}

/// Fast BSS Transition element, IEEE Std 802.11-2020, 9.4.2.47.
/// The MIC field stays zero, message 3 is protected by the EAPOL-Key MIC.
fn fte(anonce: &[u8; 32], snonce: &[u8; 32], r1kh_id: &MacAddr, r0kh_id: &[u8]) -> Vec<u8> {
    let body_len = FTE_FIXED_LEN + 2 + r1kh_id.len() + 2 + r0kh_id.len();
    let mut buf = Vec::with_capacity(2 + body_len);
    buf.push(id::FAST_BSS_TRANSITION);
    buf.push(body_len as u8);
    buf.extend_from_slice(&[0u8; 2 + 16]);
    buf.extend_from_slice(&anonce[..]);
    buf.extend_from_slice(&snonce[..]);
    buf.push(FTE_SUBELEM_R1KH_ID);
    buf.push(r1kh_id.len() as u8);
    buf.extend_from_slice(&r1kh_id[..]);
    buf.push(FTE_SUBELEM_R0KH_ID);
    buf.push(r0kh_id.len() as u8);
    buf.extend_from_slice(r0kh_id);
    buf
}

/// Timeout Interval element carrying a key lifetime, IEEE Std 802.11-2020, 9.4.2.49.
fn key_lifetime_tie(secs: u32) -> Vec<u8> {
    let mut buf = vec![id::TIMEOUT_INTERVAL, 5, TIE_KEY_LIFETIME];
    buf.extend_from_slice(&secs.to_le_bytes()[..]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::Reader;

    #[test]
    fn fte_layout() {
        let fte = fte(&[1; 32], &[2; 32], &[3; 6], b"r0kh");
        let elements: Vec<(u8, &[u8])> = Reader::new(&fte[..]).collect();
        assert_eq!(elements.len(), 1);
        let (element_id, body) = elements[0];
        assert_eq!(element_id, id::FAST_BSS_TRANSITION);
        assert_eq!(body.len(), FTE_FIXED_LEN + 8 + 6);
        assert_eq!(&body[..18], &[0u8; 18][..]);
        assert_eq!(&body[18..50], &[1u8; 32][..]);
        assert_eq!(&body[50..82], &[2u8; 32][..]);
        assert_eq!(&body[82..90], &[1, 6, 3, 3, 3, 3, 3, 3][..]);
        assert_eq!(&body[90..], &[3, 4, b'r', b'0', b'k', b'h'][..]);
    }

    #[test]
    fn tie_layout() {
        assert_eq!(key_lifetime_tie(FT_KEY_LIFETIME_SECS), vec![56, 5, 2, 0x00, 0x75, 0x12, 0x00]);
    }
}
