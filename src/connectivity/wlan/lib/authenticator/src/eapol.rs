// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! IEEE Std 802.1X-2010 EAPOL-Key frames as used by IEEE Std 802.11-2020, 12.7.2.

use crate::appendable::{Appendable, BufferTooSmall};
use crate::ie::rsn::akm::Akm;
use crate::integrity::integrity_algorithm;
use bitfield::bitfield;
use bytes::Bytes;
use nom::number::streaming::{be_u16, be_u64, be_u8};
use nom::{do_parse, map, named_args, take};
use thiserror::Error;

pub const PROTOCOL_VERSION_2001: u8 = 1;
pub const PROTOCOL_VERSION_2004: u8 = 2;
pub const PACKET_TYPE_KEY: u8 = 3;

pub const DESCRIPTOR_TYPE_IEEE802DOT11: u8 = 2;
pub const DESCRIPTOR_TYPE_WPA: u8 = 254;

/// Octets preceding the key descriptor: version, packet type and body length.
pub const EAPOL_HDR_LEN: usize = 4;
/// Key descriptor octets preceding the MIC.
const KEY_FRAME_FIXED_LEN: usize = 77;
pub const MIC_OFFSET: usize = EAPOL_HDR_LEN + KEY_FRAME_FIXED_LEN;

pub const NONCE_LEN: usize = 32;
pub const KEY_IV_LEN: usize = 16;
pub const KEY_RSC_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("frame too short: {} bytes", _0)]
    TooShort(usize),
    #[error("unexpected packet type {}", _0)]
    UnexpectedPacketType(u8),
    #[error("unsupported key descriptor type {}", _0)]
    UnsupportedDescriptorType(u8),
    #[error("body length {} exceeds frame of {} bytes", _0, _1)]
    BodyLengthMismatch(u16, usize),
    #[error("key data length {} exceeds remaining {} bytes", _0, _1)]
    KeyDataLengthMismatch(u16, usize),
    #[error("unsupported AKM for MIC computation")]
    UnsupportedAkm,
    #[error("error computing MIC")]
    ComputingMic,
    #[error(transparent)]
    BufferTooSmall(#[from] BufferTooSmall),
}

// IEEE Std 802.11-2020, 12.7.2, Figure 12-33
bitfield! {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct KeyInformation(u16);
    impl Debug;
    pub key_descriptor_version, set_key_descriptor_version: 2, 0;
    pub key_type, set_key_type: 3, 3;
    // WPA1 only. Reserved in RSN.
    pub legacy_key_index, set_legacy_key_index: 5, 4;
    pub install, set_install: 6;
    pub key_ack, set_key_ack: 7;
    pub key_mic, set_key_mic: 8;
    pub secure, set_secure: 9;
    pub error, set_error: 10;
    pub request, set_request: 11;
    pub encrypted_key_data, set_encrypted_key_data: 12;
    pub smk_message, set_smk_message: 13;
    pub value, _: 15, 0;
}

pub mod key_type {
    pub const GROUP_SMK: u16 = 0;
    pub const PAIRWISE: u16 = 1;
}

/// The message of a handshake a station-originated key frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Request,
    Pairwise2,
    Pairwise4,
    Group2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    pub version: u8,
    pub packet_type: u8,
    pub packet_body_len: u16,

    pub descriptor_type: u8,
    pub key_info: KeyInformation,
    pub key_len: u16,
    pub key_replay_counter: u64,
    pub key_nonce: [u8; NONCE_LEN],
    pub key_iv: [u8; KEY_IV_LEN],
    pub key_rsc: [u8; KEY_RSC_LEN],
    // 8 octets reserved.
    pub key_mic: Bytes,
    pub key_data_len: u16,
    pub key_data: Bytes,
}

impl KeyFrame {
    pub fn new(descriptor_type: u8, key_info: KeyInformation, mic_len: usize) -> Self {
        let mut frame = KeyFrame {
            version: PROTOCOL_VERSION_2004,
            packet_type: PACKET_TYPE_KEY,
            packet_body_len: 0,
            descriptor_type,
            key_info,
            key_len: 0,
            key_replay_counter: 0,
            key_nonce: [0u8; NONCE_LEN],
            key_iv: [0u8; KEY_IV_LEN],
            key_rsc: [0u8; KEY_RSC_LEN],
            key_mic: Bytes::from(vec![0u8; mic_len]),
            key_data_len: 0,
            key_data: Bytes::new(),
        };
        frame.update_packet_body_len();
        frame
    }

    pub fn set_key_data(&mut self, key_data: Vec<u8>) {
        self.key_data_len = key_data.len() as u16;
        self.key_data = Bytes::from(key_data);
        self.update_packet_body_len();
    }

    pub fn update_packet_body_len(&mut self) {
        self.packet_body_len = self.body_len() as u16;
    }

    fn body_len(&self) -> usize {
        KEY_FRAME_FIXED_LEN + self.key_mic.len() + 2 + self.key_data.len()
    }

    pub fn len(&self) -> usize {
        EAPOL_HDR_LEN + self.body_len()
    }

    pub fn is_pairwise(&self) -> bool {
        self.key_info.key_type() == key_type::PAIRWISE
    }

    /// Classifies a frame received from a station, IEEE Std 802.11-2020, 12.7.6 and 12.7.7.
    pub fn classify(&self) -> MessageClass {
        if self.key_info.request() {
            MessageClass::Request
        } else if !self.is_pairwise() {
            MessageClass::Group2
        } else if self.key_data_len == 0 {
            MessageClass::Pairwise4
        } else {
            MessageClass::Pairwise2
        }
    }

    pub fn write_into<A: Appendable>(
        &self,
        clear_mic: bool,
        buf: &mut A,
    ) -> Result<(), BufferTooSmall> {
        if !buf.can_append(self.len()) {
            return Err(BufferTooSmall);
        }
        buf.append_byte(self.version)?;
        buf.append_byte(self.packet_type)?;
        buf.append_be_u16(self.packet_body_len)?;
        buf.append_byte(self.descriptor_type)?;
        buf.append_be_u16(self.key_info.value())?;
        buf.append_be_u16(self.key_len)?;
        buf.append_bytes(&self.key_replay_counter.to_be_bytes()[..])?;
        buf.append_bytes(&self.key_nonce[..])?;
        buf.append_bytes(&self.key_iv[..])?;
        buf.append_bytes(&self.key_rsc[..])?;
        buf.append_bytes_zeroed(8)?;
        if clear_mic {
            buf.append_bytes_zeroed(self.key_mic.len())?;
        } else {
            buf.append_bytes(&self.key_mic[..])?;
        }
        buf.append_be_u16(self.key_data_len)?;
        buf.append_bytes(&self.key_data[..])?;
        Ok(())
    }

    pub fn to_bytes(&self, clear_mic: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        // Writing into a Vec never runs out of space.
        let _ = self.write_into(clear_mic, &mut buf);
        buf
    }
}

pub fn to_array<A: Default + AsMut<[u8]>>(slice: &[u8]) -> A {
    let mut array = A::default();
    let len = array.as_mut().len().min(slice.len());
    array.as_mut()[..len].copy_from_slice(&slice[..len]);
    array
}

named_args!(key_frame_from_bytes(mic_len: usize) <KeyFrame>,
    do_parse!(
        version: be_u8 >>
        packet_type: be_u8 >>
        packet_body_len: be_u16 >>
        descriptor_type: be_u8 >>
        key_info: map!(be_u16, KeyInformation) >>
        key_len: be_u16 >>
        key_replay_counter: be_u64 >>
        key_nonce: take!(NONCE_LEN) >>
        key_iv: take!(KEY_IV_LEN) >>
        key_rsc: take!(KEY_RSC_LEN) >>
        /* 8 octets reserved */ take!(8) >>
        key_mic: take!(mic_len) >>
        key_data_len: be_u16 >>
        key_data: take!(key_data_len) >>
        (KeyFrame {
            version,
            packet_type,
            packet_body_len,
            descriptor_type,
            key_info,
            key_len,
            key_replay_counter,
            key_nonce: to_array(key_nonce),
            key_iv: to_array(key_iv),
            key_rsc: to_array(key_rsc),
            key_mic: Bytes::copy_from_slice(key_mic),
            key_data_len,
            key_data: Bytes::copy_from_slice(key_data),
        })
    )
);

/// Parses an EAPOL-Key frame. Octets beyond the advertised body length are ignored.
pub fn parse(bytes: &[u8], mic_len: usize) -> Result<KeyFrame, Error> {
    let min_len = EAPOL_HDR_LEN + KEY_FRAME_FIXED_LEN + mic_len + 2;
    if bytes.len() < min_len {
        return Err(Error::TooShort(bytes.len()));
    }
    if bytes[1] != PACKET_TYPE_KEY {
        return Err(Error::UnexpectedPacketType(bytes[1]));
    }
    let body_len = u16::from_be_bytes([bytes[2], bytes[3]]);
    let frame_len = EAPOL_HDR_LEN + body_len as usize;
    if frame_len > bytes.len() || frame_len < min_len {
        return Err(Error::BodyLengthMismatch(body_len, bytes.len()));
    }
    let bytes = &bytes[..frame_len];
    let descriptor_type = bytes[EAPOL_HDR_LEN];
    if descriptor_type != DESCRIPTOR_TYPE_IEEE802DOT11 && descriptor_type != DESCRIPTOR_TYPE_WPA {
        return Err(Error::UnsupportedDescriptorType(descriptor_type));
    }
    let key_data_len = u16::from_be_bytes([bytes[min_len - 2], bytes[min_len - 1]]);
    if key_data_len as usize > frame_len - min_len {
        return Err(Error::KeyDataLengthMismatch(key_data_len, frame_len - min_len));
    }
    key_frame_from_bytes(bytes, mic_len)
        .map(|(_, frame)| frame)
        .map_err(|_| Error::TooShort(bytes.len()))
}

/// Computes the MIC over the frame with its MIC field zeroed.
pub fn compute_mic(kck: &[u8], akm: &Akm, frame: &KeyFrame) -> Result<Vec<u8>, Error> {
    let mic_len = akm.mic_bytes().ok_or(Error::UnsupportedAkm)? as usize;
    let algorithm = integrity_algorithm(akm).ok_or(Error::UnsupportedAkm)?;
    let mut mic =
        algorithm.compute(kck, &frame.to_bytes(true)[..]).map_err(|_| Error::ComputingMic)?;
    mic.truncate(mic_len);
    Ok(mic)
}

pub fn verify_mic(kck: &[u8], akm: &Akm, frame: &KeyFrame) -> bool {
    match (akm.mic_bytes(), integrity_algorithm(akm)) {
        (Some(mic_len), Some(algorithm)) if frame.key_mic.len() == mic_len as usize => {
            algorithm.verify(kck, &frame.to_bytes(true)[..], &frame.key_mic[..])
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::rsn::akm;
    use assert_matches::assert_matches;

    #[rustfmt::skip]
    fn msg1_bytes() -> Vec<u8> {
        let mut bytes = vec![
            0x02, 0x03, 0x00, 0x5f, // EAPOL header
            0x02, // descriptor type
            0x00, 0x8a, // key info
            0x00, 0x10, // key length
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // replay counter
        ];
        bytes.extend_from_slice(&[0x11; 32]); // nonce
        bytes.extend_from_slice(&[0x00; 16]); // IV
        bytes.extend_from_slice(&[0x00; 8]); // RSC
        bytes.extend_from_slice(&[0x00; 8]); // reserved
        bytes.extend_from_slice(&[0x00; 16]); // MIC
        bytes.extend_from_slice(&[0x00, 0x00]); // key data length
        bytes
    }

    #[test]
    fn parse_msg1() {
        let frame = parse(&msg1_bytes()[..], 16).expect("valid frame");
        assert_eq!(frame.version, 2);
        assert_eq!(frame.packet_body_len, 95);
        assert_eq!(frame.descriptor_type, DESCRIPTOR_TYPE_IEEE802DOT11);
        assert!(frame.key_info.key_ack());
        assert!(frame.is_pairwise());
        assert_eq!(frame.key_info.key_descriptor_version(), 2);
        assert_eq!(frame.key_len, 16);
        assert_eq!(frame.key_replay_counter, 1);
        assert_eq!(frame.key_nonce, [0x11; 32]);
        assert_eq!(frame.key_data_len, 0);
    }

    #[test]
    fn write_matches_parsed_bytes() {
        let bytes = msg1_bytes();
        let frame = parse(&bytes[..], 16).expect("valid frame");
        assert_eq!(frame.len(), bytes.len());
        assert_eq!(frame.to_bytes(false), bytes);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = msg1_bytes();
        bytes.extend_from_slice(&[0xff; 5]);
        let frame = parse(&bytes[..], 16).expect("valid frame");
        assert_eq!(frame.to_bytes(false), msg1_bytes());
    }

    #[test]
    fn reject_truncated_frame() {
        let bytes = msg1_bytes();
        assert_matches!(parse(&bytes[..50], 16), Err(Error::TooShort(50)));
    }

    #[test]
    fn reject_key_data_overflow() {
        let mut bytes = msg1_bytes();
        let len = bytes.len();
        bytes[len - 1] = 4;
        assert_matches!(parse(&bytes[..], 16), Err(Error::KeyDataLengthMismatch(4, 0)));
    }

    #[test]
    fn reject_body_length_overflow() {
        let mut bytes = msg1_bytes();
        bytes[3] = 0x70;
        assert_matches!(parse(&bytes[..], 16), Err(Error::BodyLengthMismatch(0x70, _)));
    }

    #[test]
    fn reject_non_key_packet() {
        let mut bytes = msg1_bytes();
        bytes[1] = 0;
        assert_matches!(parse(&bytes[..], 16), Err(Error::UnexpectedPacketType(0)));
    }

    #[test]
    fn mic_offset_is_81() {
        let mut frame = parse(&msg1_bytes()[..], 16).expect("valid frame");
        frame.key_mic = Bytes::from(vec![0xab; 16]);
        let bytes = frame.to_bytes(false);
        assert_eq!(&bytes[MIC_OFFSET..MIC_OFFSET + 16], &[0xab; 16][..]);
        let cleared = frame.to_bytes(true);
        assert_eq!(&cleared[MIC_OFFSET..MIC_OFFSET + 16], &[0u8; 16][..]);
    }

    #[test]
    fn classify_messages() {
        let mut frame = parse(&msg1_bytes()[..], 16).expect("valid frame");
        frame.key_info = KeyInformation(0);
        frame.key_info.set_key_type(key_type::PAIRWISE);
        frame.key_info.set_key_mic(true);
        assert_eq!(frame.classify(), MessageClass::Pairwise4);
        frame.set_key_data(vec![0xdd; 22]);
        assert_eq!(frame.classify(), MessageClass::Pairwise2);
        frame.key_info.set_key_type(key_type::GROUP_SMK);
        assert_eq!(frame.classify(), MessageClass::Group2);
        frame.key_info.set_request(true);
        assert_eq!(frame.classify(), MessageClass::Request);
    }

    #[test]
    fn mic_roundtrip() {
        let akm = Akm::new_dot11(akm::PSK);
        let kck = [7u8; 16];
        let mut frame = parse(&msg1_bytes()[..], 16).expect("valid frame");
        frame.key_mic = Bytes::from(compute_mic(&kck[..], &akm, &frame).expect("MIC"));
        assert!(verify_mic(&kck[..], &akm, &frame));
        assert!(!verify_mic(&[8u8; 16][..], &akm, &frame));
        frame.key_replay_counter += 1;
        assert!(!verify_mic(&kck[..], &akm, &frame));
    }

    #[test]
    fn verify_mic_rejects_short_mic_field() {
        let akm = Akm::new_dot11(akm::PSK);
        let kck = [7u8; 16];
        let mut frame = parse(&msg1_bytes()[..], 16).expect("valid frame");
        let mic = compute_mic(&kck[..], &akm, &frame).expect("MIC");
        frame.key_mic = Bytes::copy_from_slice(&mic[..8]);
        assert!(!verify_mic(&kck[..], &akm, &frame));
    }

    #[test]
    fn suite_b_192_mic_is_24_bytes() {
        let akm = Akm::new_dot11(akm::EAP_SUITEB_SHA384);
        let kck = [7u8; 24];
        let mut frame = parse(&msg1_bytes()[..], 16).expect("valid frame");
        frame.key_mic = Bytes::from(vec![0u8; 24]);
        let mic = compute_mic(&kck[..], &akm, &frame).expect("MIC");
        assert_eq!(mic.len(), 24);
        frame.key_mic = Bytes::from(mic);
        assert!(verify_mic(&kck[..], &akm, &frame));
        frame.key_mic = Bytes::from(vec![0u8; 16]);
        assert!(!verify_mic(&kck[..], &akm, &frame));
    }
}
