// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Remote request/response frames exchanged between the APs of a mobility domain.

use super::keys::{PmkR0Name, PmkR1, PmkR1Name, KEY_NAME_LEN, PMK_R1_LEN};
use crate::appendable::{Appendable, BufferTooSmall};
use crate::crypto_utils::keywrap;
use crate::eapol::to_array;
use crate::ie::rsn::cipher::Cipher;
use crate::mac::MacAddr;
use nom::number::streaming::{le_u16, le_u32, le_u8};
use nom::{do_parse, named, take};
use std::convert::TryFrom;
use thiserror::Error;

pub const FRAME_TYPE_RRB: u8 = 1;

pub const PACKET_TYPE_REQUEST: u8 = 0;
pub const PACKET_TYPE_RESPONSE: u8 = 1;
pub const PACKET_TYPE_PULL: u8 = 200;
pub const PACKET_TYPE_RESP: u8 = 201;
pub const PACKET_TYPE_PUSH: u8 = 202;

pub const HDR_LEN: usize = 10;
pub const NONCE_LEN: usize = 16;

const PULL_LEN: usize = NONCE_LEN + KEY_NAME_LEN + 6 + 6;
const RESP_LEN: usize = NONCE_LEN + 6 + 6 + PMK_R1_LEN + KEY_NAME_LEN + 2 + 2;
const PUSH_LEN: usize = 4 + 6 + 6 + KEY_NAME_LEN + PMK_R1_LEN + KEY_NAME_LEN + 2 + 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("RRB frame too short: {}", _0)]
    TooShort(usize),
    #[error("unexpected RRB frame type: {}", _0)]
    UnexpectedFrameType(u8),
    #[error("unknown RRB packet type: {}", _0)]
    UnknownPacketType(u8),
    #[error("RRB payload length {} does not match frame ({} bytes)", _0, _1)]
    PayloadLengthMismatch(u16, usize),
    #[error("RRB payload of {} bytes does not fit the length field", _0)]
    PayloadTooLong(usize),
    #[error("buffer too small for RRB frame")]
    BufferTooSmall(#[from] BufferTooSmall),
    #[error("failed to unwrap RRB payload")]
    Unwrap,
    #[error("malformed body of RRB packet type {}", _0)]
    MalformedBody(u8),
    #[error("RRB frame from unknown peer {:02x?}", _0)]
    UnknownPeer(MacAddr),
    #[error("RRB frame addressed to another key holder {:02x?}", _0)]
    WrongKeyHolder(MacAddr),
    #[error("no PMK-R0 for station {:02x?}", _0)]
    UnknownPmkR0(MacAddr),
    #[error("no pull pending for station {:02x?}", _0)]
    UnsolicitedResponse(MacAddr),
    #[error("stale PMK-R1 push ({} seconds old)", _0)]
    StalePush(u32),
}

/// A received frame with its payload still encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrbFrame<'a> {
    pub packet_type: u8,
    pub ap_addr: MacAddr,
    pub payload: &'a [u8],
}

/// R1KH to R0KH request for a PMK-R1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub nonce: [u8; NONCE_LEN],
    pub pmk_r0_name: PmkR0Name,
    pub r1kh_id: MacAddr,
    pub s1kh_id: MacAddr,
}

/// R0KH answer to a pull.
#[derive(Clone, PartialEq, Eq)]
pub struct PullResponse {
    pub nonce: [u8; NONCE_LEN],
    pub r1kh_id: MacAddr,
    pub s1kh_id: MacAddr,
    pub pmk_r1: PmkR1,
    pub pmk_r1_name: PmkR1Name,
    pub pairwise: Cipher,
    pub vlan_id: u16,
}

impl std::fmt::Debug for PullResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullResponse")
            .field("nonce", &self.nonce)
            .field("s1kh_id", &self.s1kh_id)
            .field("pmk_r1_name", &self.pmk_r1_name)
            .field("vlan_id", &self.vlan_id)
            .finish()
    }
}

/// Unsolicited PMK-R1 distribution from the R0KH.
#[derive(Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub timestamp: u32,
    pub r1kh_id: MacAddr,
    pub s1kh_id: MacAddr,
    pub pmk_r0_name: PmkR0Name,
    pub pmk_r1: PmkR1,
    pub pmk_r1_name: PmkR1Name,
    pub pairwise: Cipher,
    pub vlan_id: u16,
}

impl std::fmt::Debug for PushMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushMessage")
            .field("timestamp", &self.timestamp)
            .field("s1kh_id", &self.s1kh_id)
            .field("pmk_r1_name", &self.pmk_r1_name)
            .field("vlan_id", &self.vlan_id)
            .finish()
    }
}

fn write_header<A: Appendable>(
    buf: &mut A,
    packet_type: u8,
    ap_addr: &MacAddr,
    payload_len: usize,
) -> Result<(), Error> {
    let payload_len = u16::try_from(payload_len).map_err(|_| Error::PayloadTooLong(payload_len))?;
    buf.append_byte(FRAME_TYPE_RRB)?;
    buf.append_byte(packet_type)?;
    buf.append_le_u16(payload_len)?;
    buf.append_bytes(&ap_addr[..])?;
    Ok(())
}

/// Builds an over-the-DS relay frame carrying an FT Action frame in the clear.
pub fn write_relay(request: bool, ap_addr: &MacAddr, action: &[u8]) -> Result<Vec<u8>, Error> {
    let packet_type = if request { PACKET_TYPE_REQUEST } else { PACKET_TYPE_RESPONSE };
    let mut buf = Vec::with_capacity(HDR_LEN + action.len());
    write_header(&mut buf, packet_type, ap_addr, action.len())?;
    buf.append_bytes(action)?;
    Ok(buf)
}

/// Pads the body with zeros to a multiple of 8 octets and wraps it with the key shared with the
/// peer.
fn seal(
    packet_type: u8,
    ap_addr: &MacAddr,
    key: &[u8],
    mut body: Vec<u8>,
) -> Result<Vec<u8>, crate::Error> {
    let padded = ((body.len() + 7) / 8) * 8;
    body.resize(padded, 0);
    let wrapped = keywrap::wrap(key, &body[..])?;
    let mut buf = Vec::with_capacity(HDR_LEN + wrapped.len());
    write_header(&mut buf, packet_type, ap_addr, wrapped.len())?;
    buf.append_bytes(&wrapped[..])?;
    Ok(buf)
}

fn open(frame: &RrbFrame<'_>, key: &[u8], min_len: usize) -> Result<Vec<u8>, Error> {
    let body = keywrap::unwrap(key, frame.payload).map_err(|_| Error::Unwrap)?;
    if body.len() < min_len {
        return Err(Error::MalformedBody(frame.packet_type));
    }
    Ok(body)
}

fn write_key_params<A: Appendable>(
    buf: &mut A,
    cipher: &Cipher,
    vlan_id: u16,
) -> Result<(), BufferTooSmall> {
    buf.append_le_u16(cipher.suite_type as u16)?;
    buf.append_le_u16(vlan_id)
}

impl PullRequest {
    pub fn seal(&self, ap_addr: &MacAddr, key: &[u8]) -> Result<Vec<u8>, crate::Error> {
        let mut body = Vec::with_capacity(PULL_LEN);
        body.extend_from_slice(&self.nonce[..]);
        body.extend_from_slice(&self.pmk_r0_name[..]);
        body.extend_from_slice(&self.r1kh_id[..]);
        body.extend_from_slice(&self.s1kh_id[..]);
        seal(PACKET_TYPE_PULL, ap_addr, key, body)
    }

    pub fn open(frame: &RrbFrame<'_>, key: &[u8]) -> Result<Self, Error> {
        let body = open(frame, key, PULL_LEN)?;
        parse_pull(&body[..]).map(|(_, pull)| pull).map_err(|_| Error::MalformedBody(frame.packet_type))
    }
}

impl PullResponse {
    pub fn seal(&self, ap_addr: &MacAddr, key: &[u8]) -> Result<Vec<u8>, crate::Error> {
        let mut body = Vec::with_capacity(RESP_LEN);
        body.extend_from_slice(&self.nonce[..]);
        body.extend_from_slice(&self.r1kh_id[..]);
        body.extend_from_slice(&self.s1kh_id[..]);
        body.extend_from_slice(&self.pmk_r1[..]);
        body.extend_from_slice(&self.pmk_r1_name[..]);
        write_key_params(&mut body, &self.pairwise, self.vlan_id)?;
        seal(PACKET_TYPE_RESP, ap_addr, key, body)
    }

    pub fn open(frame: &RrbFrame<'_>, key: &[u8]) -> Result<Self, Error> {
        let body = open(frame, key, RESP_LEN)?;
        parse_resp(&body[..]).map(|(_, resp)| resp).map_err(|_| Error::MalformedBody(frame.packet_type))
    }
}

impl PushMessage {
    pub fn seal(&self, ap_addr: &MacAddr, key: &[u8]) -> Result<Vec<u8>, crate::Error> {
        let mut body = Vec::with_capacity(PUSH_LEN);
        body.extend_from_slice(&self.timestamp.to_le_bytes()[..]);
        body.extend_from_slice(&self.r1kh_id[..]);
        body.extend_from_slice(&self.s1kh_id[..]);
        body.extend_from_slice(&self.pmk_r0_name[..]);
        body.extend_from_slice(&self.pmk_r1[..]);
        body.extend_from_slice(&self.pmk_r1_name[..]);
        write_key_params(&mut body, &self.pairwise, self.vlan_id)?;
        seal(PACKET_TYPE_PUSH, ap_addr, key, body)
    }

    pub fn open(frame: &RrbFrame<'_>, key: &[u8]) -> Result<Self, Error> {
        let body = open(frame, key, PUSH_LEN)?;
        parse_push(&body[..]).map(|(_, push)| push).map_err(|_| Error::MalformedBody(frame.packet_type))
    }
}

fn cipher_from_u16(suite_type: u16) -> Cipher {
    Cipher::new_dot11(suite_type as u8)
}

named!(parse_pull<&[u8], PullRequest>,
       do_parse!(
            nonce: take!(NONCE_LEN) >>
            pmk_r0_name: take!(KEY_NAME_LEN) >>
            r1kh_id: take!(6) >>
            s1kh_id: take!(6) >>
            (PullRequest {
                nonce: to_array(nonce),
                pmk_r0_name: to_array(pmk_r0_name),
                r1kh_id: to_array(r1kh_id),
                s1kh_id: to_array(s1kh_id),
            })
    )
);

named!(parse_resp<&[u8], PullResponse>,
       do_parse!(
            nonce: take!(NONCE_LEN) >>
            r1kh_id: take!(6) >>
            s1kh_id: take!(6) >>
            pmk_r1: take!(PMK_R1_LEN) >>
            pmk_r1_name: take!(KEY_NAME_LEN) >>
            pairwise: le_u16 >>
            vlan_id: le_u16 >>
            (PullResponse {
                nonce: to_array(nonce),
                r1kh_id: to_array(r1kh_id),
                s1kh_id: to_array(s1kh_id),
                pmk_r1: to_array(pmk_r1),
                pmk_r1_name: to_array(pmk_r1_name),
                pairwise: cipher_from_u16(pairwise),
                vlan_id,
            })
    )
);

named!(parse_push<&[u8], PushMessage>,
       do_parse!(
            timestamp: le_u32 >>
            r1kh_id: take!(6) >>
            s1kh_id: take!(6) >>
            pmk_r0_name: take!(KEY_NAME_LEN) >>
            pmk_r1: take!(PMK_R1_LEN) >>
            pmk_r1_name: take!(KEY_NAME_LEN) >>
            pairwise: le_u16 >>
            vlan_id: le_u16 >>
            (PushMessage {
                timestamp,
                r1kh_id: to_array(r1kh_id),
                s1kh_id: to_array(s1kh_id),
                pmk_r0_name: to_array(pmk_r0_name),
                pmk_r1: to_array(pmk_r1),
                pmk_r1_name: to_array(pmk_r1_name),
                pairwise: cipher_from_u16(pairwise),
                vlan_id,
            })
    )
);

named!(parse_header<&[u8], (u8, u8, u16, &[u8])>,
       do_parse!(
            frame_type: le_u8 >>
            packet_type: le_u8 >>
            payload_len: le_u16 >>
            ap_addr: take!(6) >>
            ((frame_type, packet_type, payload_len, ap_addr))
    )
);

/// Splits a received frame into header fields and the payload.
pub fn parse_frame(bytes: &[u8]) -> Result<RrbFrame<'_>, Error> {
    let (payload, (frame_type, packet_type, payload_len, ap_addr)) =
        parse_header(bytes).map_err(|_| Error::TooShort(bytes.len()))?;
    if frame_type != FRAME_TYPE_RRB {
        return Err(Error::UnexpectedFrameType(frame_type));
    }
    match packet_type {
        PACKET_TYPE_REQUEST | PACKET_TYPE_RESPONSE | PACKET_TYPE_PULL | PACKET_TYPE_RESP
        | PACKET_TYPE_PUSH => (),
        other => return Err(Error::UnknownPacketType(other)),
    }
    if payload_len as usize != payload.len() {
        return Err(Error::PayloadLengthMismatch(payload_len, payload.len()));
    }
    Ok(RrbFrame { packet_type, ap_addr: to_array(ap_addr), payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::rsn::cipher;
    use assert_matches::assert_matches;

    const AP: MacAddr = [0x02, 0, 0, 0, 0x03, 0];
    const KEY: [u8; 16] = [0x10; 16];

    fn pull() -> PullRequest {
        PullRequest { nonce: [1; 16], pmk_r0_name: [2; 16], r1kh_id: AP, s1kh_id: [3; 6] }
    }

    #[test]
    fn pull_frame_layout() {
        let bytes = pull().seal(&AP, &KEY[..]).expect("seal pull");
        // Body padded from 44 to 48 octets plus the 8 octet key wrap IV.
        assert_eq!(bytes.len(), HDR_LEN + 56);
        assert_eq!(&bytes[..4], &[FRAME_TYPE_RRB, PACKET_TYPE_PULL, 56, 0][..]);
        assert_eq!(&bytes[4..10], &AP[..]);

        let frame = parse_frame(&bytes[..]).expect("valid frame");
        assert_eq!(frame.packet_type, PACKET_TYPE_PULL);
        assert_eq!(frame.ap_addr, AP);
        assert_eq!(PullRequest::open(&frame, &KEY[..]), Ok(pull()));
    }

    #[test]
    fn wrong_key_fails_unwrap() {
        let bytes = pull().seal(&AP, &KEY[..]).expect("seal pull");
        let frame = parse_frame(&bytes[..]).expect("valid frame");
        assert_eq!(PullRequest::open(&frame, &[0x11; 16][..]), Err(Error::Unwrap));
    }

    #[test]
    fn response_and_push_bodies() {
        let resp = PullResponse {
            nonce: [1; 16],
            r1kh_id: AP,
            s1kh_id: [3; 6],
            pmk_r1: [4; 32],
            pmk_r1_name: [5; 16],
            pairwise: Cipher::new_dot11(cipher::CCMP_128),
            vlan_id: 7,
        };
        let bytes = resp.seal(&AP, &KEY[..]).expect("seal response");
        let frame = parse_frame(&bytes[..]).expect("valid frame");
        assert_eq!(frame.payload.len(), 88);
        assert_eq!(PullResponse::open(&frame, &KEY[..]), Ok(resp));

        let push = PushMessage {
            timestamp: 1000,
            r1kh_id: AP,
            s1kh_id: [3; 6],
            pmk_r0_name: [2; 16],
            pmk_r1: [4; 32],
            pmk_r1_name: [5; 16],
            pairwise: Cipher::new_dot11(cipher::GCMP_256),
            vlan_id: 12,
        };
        let bytes = push.seal(&AP, &KEY[..]).expect("seal push");
        let frame = parse_frame(&bytes[..]).expect("valid frame");
        assert_eq!(frame.packet_type, PACKET_TYPE_PUSH);
        assert_eq!(PushMessage::open(&frame, &KEY[..]), Ok(push));
    }

    #[test]
    fn relay_is_cleartext() {
        let bytes = write_relay(true, &AP, &[6, 1, 2, 3]).expect("relay");
        let frame = parse_frame(&bytes[..]).expect("valid frame");
        assert_eq!(frame.packet_type, PACKET_TYPE_REQUEST);
        assert_eq!(frame.payload, &[6, 1, 2, 3][..]);
    }

    #[test]
    fn malformed_frames() {
        assert_matches!(parse_frame(&[1, 200, 0]), Err(Error::TooShort(3)));
        let mut bytes = write_relay(false, &AP, &[6, 2]).expect("relay");
        bytes[0] = 2;
        assert_matches!(parse_frame(&bytes[..]), Err(Error::UnexpectedFrameType(2)));
        bytes[0] = FRAME_TYPE_RRB;
        bytes[1] = 7;
        assert_matches!(parse_frame(&bytes[..]), Err(Error::UnknownPacketType(7)));
        bytes[1] = PACKET_TYPE_RESPONSE;
        bytes.push(0);
        assert_matches!(parse_frame(&bytes[..]), Err(Error::PayloadLengthMismatch(2, 3)));
    }

    #[test]
    fn oversized_relay_is_rejected() {
        let action = vec![0u8; usize::from(u16::MAX) + 1];
        assert_eq!(write_relay(true, &AP, &action[..]), Err(Error::PayloadTooLong(action.len())));
        let action = vec![0u8; usize::from(u16::MAX)];
        let bytes = write_relay(true, &AP, &action[..]).expect("largest relay");
        assert_eq!(&bytes[2..4], &[0xff, 0xff][..]);
    }
}
