// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::id;
use super::rsn::{akm, cipher, suite_selector};

use crate::appendable::{Appendable, BufferTooSmall};
use crate::organization::Oui;
use nom::number::streaming::le_u16;
use nom::{call, count, do_parse, eof, named, named_attr, tag, take, try_parse, IResult};

// The WPA1 IE is not fully specified by IEEE. This format was derived from pcap.
// (3B) OUI
pub const OUI: Oui = Oui::MSFT;
// (1B) OUI-specific element type
pub const VENDOR_SPECIFIC_TYPE: u8 = 1;
// (2B) WPA type
pub const WPA_TYPE: u16 = 1;
const WPA_TYPE_BYTES: [u8; 2] = [0x01, 0x00];
// (4B) multicast cipher
//     0-2 cipher suite (OUI)
//     3   cipher type
// (2B) unicast cipher count
// (4B x N) unicast cipher list
// (2B) AKM count
// (4B x N) AKM list
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone)]
pub struct WpaIe {
    pub multicast_cipher: cipher::Cipher,
    pub unicast_cipher_list: Vec<cipher::Cipher>,
    pub akm_list: Vec<akm::Akm>,
}

impl WpaIe {
    const FIXED_FIELDS_LENGTH: usize = 10;
    // Element ID, length, OUI and vendor type.
    const HEADER_LENGTH: usize = 6;

    /// Length of the WPA specific fields.
    pub fn len(&self) -> usize {
        Self::FIXED_FIELDS_LENGTH + self.unicast_cipher_list.len() * 4 + self.akm_list.len() * 4
    }

    /// Length of the complete vendor specific element.
    pub fn element_len(&self) -> usize {
        Self::HEADER_LENGTH + self.len()
    }

    pub fn write_into<A: Appendable>(&self, buf: &mut A) -> Result<(), BufferTooSmall> {
        if !buf.can_append(self.len()) {
            return Err(BufferTooSmall);
        }

        buf.append_le_u16(WPA_TYPE)?;

        buf.append_bytes(&self.multicast_cipher.oui[..])?;
        buf.append_byte(self.multicast_cipher.suite_type)?;

        buf.append_le_u16(self.unicast_cipher_list.len() as u16)?;
        for cipher in &self.unicast_cipher_list {
            buf.append_bytes(&cipher.oui[..])?;
            buf.append_byte(cipher.suite_type)?;
        }

        buf.append_le_u16(self.akm_list.len() as u16)?;
        for akm in &self.akm_list {
            buf.append_bytes(&akm.oui[..])?;
            buf.append_byte(akm.suite_type)?;
        }

        Ok(())
    }

    /// Writes the complete vendor specific element including its header.
    pub fn write_element_into<A: Appendable>(&self, buf: &mut A) -> Result<(), BufferTooSmall> {
        if !buf.can_append(self.element_len()) {
            return Err(BufferTooSmall);
        }
        buf.append_byte(id::VENDOR_SPECIFIC)?;
        buf.append_byte((self.element_len() - 2) as u8)?;
        buf.append_bytes(&OUI[..])?;
        buf.append_byte(VENDOR_SPECIFIC_TYPE)?;
        self.write_into(buf)
    }

    pub fn to_element_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.element_len());
        let _ = self.write_element_into(&mut buf);
        buf
    }
}

fn read_suite_selector<T>(input: &[u8]) -> IResult<&[u8], T>
where
    T: suite_selector::Factory<Suite = T>,
{
    let (i1, bytes) = try_parse!(input, take!(4));
    let oui = Oui::new([bytes[0], bytes[1], bytes[2]]);
    Ok((i1, T::new(oui, bytes[3])))
}

named!(parse_akm<&[u8], akm::Akm>, call!(read_suite_selector::<akm::Akm>));
named!(parse_cipher<&[u8], cipher::Cipher>, call!(read_suite_selector::<cipher::Cipher>));

// Take as many zeroes as possible from the beginning of the buffer. Unlike nom's take_while, this
// handles the case where we run into the end of the buffer.
fn take_while_zero(input: &[u8]) -> IResult<&[u8], ()> {
    match input.iter().position(|b| *b != 0) {
        Some(i) => Ok((&input[i..], ())),
        None => Ok((&[], ())),
    }
}

named_attr!(
    /// Convert bytes of a WPA information element into a WpaIe representation.
    /// The input starts at the WPA type field, following the vendor OUI and type.
    , // comma ends the attribute list to named_attr
    pub from_bytes<&[u8], WpaIe>,
      do_parse!(
          _wpa_type: tag!(&WPA_TYPE_BYTES[..]) >>
          multicast_cipher: parse_cipher >>
          unicast_cipher_count: le_u16 >>
          unicast_cipher_list: count!(parse_cipher, unicast_cipher_count as usize) >>
          akm_count: le_u16 >>
          akm_list: count!(parse_akm, akm_count as usize) >>
          // In practice this IE is sometimes zero-padded.
          call!(take_while_zero) >>
          eof!() >>
          (WpaIe{
              multicast_cipher,
              unicast_cipher_list,
              akm_list,
          })
      )
);

/// Returns true if the complete element is the WPA vendor specific element.
pub fn is_wpa_element(data: &[u8]) -> bool {
    data.len() >= WpaIe::HEADER_LENGTH
        && data[0] == id::VENDOR_SPECIFIC
        && data[2..5] == OUI[..]
        && data[5] == VENDOR_SPECIFIC_TYPE
}

/// Parses a complete WPA vendor specific element, header included.
pub fn from_element(data: &[u8]) -> Option<WpaIe> {
    if !is_wpa_element(data) || data[1] as usize != data.len() - 2 {
        return None;
    }
    from_bytes(&data[WpaIe::HEADER_LENGTH..]).ok().map(|(_, ie)| ie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const DEFAULT_FRAME: [u8; 18] = [
        // WPA version
        0x01, 0x00,
        // Multicast cipher
        0x00, 0x50, 0xf2, 0x02,
        // Unicast cipher list
        0x01, 0x00, 0x00, 0x50, 0xf2, 0x02,
        // AKM list
        0x01, 0x00, 0x00, 0x50, 0xf2, 0x02,
    ];

    fn tkip_psk() -> WpaIe {
        WpaIe {
            multicast_cipher: cipher::Cipher { oui: OUI, suite_type: cipher::TKIP },
            unicast_cipher_list: vec![cipher::Cipher { oui: OUI, suite_type: cipher::TKIP }],
            akm_list: vec![akm::Akm { oui: OUI, suite_type: akm::PSK }],
        }
    }

    #[test]
    fn test_write_into() {
        let mut wpa_frame_bytes = vec![];
        tkip_psk().write_into(&mut wpa_frame_bytes).expect("failed to write frame");
        assert_eq!(&wpa_frame_bytes[..], &DEFAULT_FRAME[..]);
    }

    #[test]
    fn test_parse_correct() {
        let (_, wpa_frame) = from_bytes(&DEFAULT_FRAME[..]).expect("valid WPA IE");
        assert_eq!(wpa_frame, tkip_psk());
    }

    #[test]
    fn test_element_header() {
        let bytes = tkip_psk().to_element_bytes();
        assert_eq!(&bytes[..6], &[0xdd, 22, 0x00, 0x50, 0xf2, 0x01][..]);
        assert!(is_wpa_element(&bytes[..]));
        assert_eq!(from_element(&bytes[..]), Some(tkip_psk()));
    }

    #[test]
    fn test_wrong_vendor_type() {
        let mut bytes = tkip_psk().to_element_bytes();
        bytes[5] = 4;
        assert!(!is_wpa_element(&bytes[..]));
        assert_eq!(from_element(&bytes[..]), None);
    }

    #[test]
    fn test_wrong_wpa_version() {
        let mut frame = DEFAULT_FRAME.to_vec();
        frame[0] = 2;
        assert!(from_bytes(&frame[..]).is_err());
    }

    #[test]
    fn test_parse_bad_frame() {
        #[rustfmt::skip]
        let bad_frame: Vec<u8> = vec![
            // WPA version
            0x01, 0x00,
            // Multicast cipher
            0x00, 0x50, 0xf2, 0x02,
            // Unicast cipher list (count is incorrect)
            0x16, 0x00, 0x00, 0x50, 0xf2, 0x02,
            // AKM list
            0x01, 0x00, 0x00, 0x50, 0xf2, 0x02,
        ];
        assert!(from_bytes(&bad_frame[..]).is_err());
    }

    #[test]
    fn test_truncated_frame() {
        let bad_frame: Vec<u8> = vec![0x01, 0x00, 0x00, 0x50];
        assert!(from_bytes(&bad_frame[..]).is_err());
    }

    #[test]
    fn test_parse_with_padding() {
        let mut frame = DEFAULT_FRAME.to_vec();
        frame.resize(DEFAULT_FRAME.len() + 5, 0);
        let (_, wpa_frame) = from_bytes(&frame[..]).expect("padded WPA IE");
        assert_eq!(wpa_frame, tkip_psk());

        frame[DEFAULT_FRAME.len() + 1] = 1;
        assert!(from_bytes(&frame[..]).is_err());
    }
}
