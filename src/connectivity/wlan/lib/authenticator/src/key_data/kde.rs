// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Element;
use crate::appendable::{Appendable, BufferTooSmall};
use crate::ie::rsn::pmkid::{Pmkid, PMKID_LEN};
use crate::ie::rsn::rsne::Rsne;
use crate::ie::wpa::{self, WpaIe};
use crate::mac::MacAddr;
use crate::organization::Oui;
use bitfield::bitfield;
use nom::error::ErrorKind;
use nom::number::streaming::{le_u16, le_u8};
use nom::{call, count, do_parse, eof, map, named, named_args, take, try_parse, IResult};
use std::convert::TryInto;

pub const TYPE: u8 = 0xDD;
const PADDING_DATA_LEN: u8 = 0;
const HDR_LEN: usize = 6;
/// Octets taken by OUI and data type.
const HDR_OUI_TYPE_LEN: usize = 4;

// IEEE Std 802.11-2020, 12.7.2, Table 12-9
const GTK_DATA_TYPE: u8 = 1;
const MAC_ADDR_DATA_TYPE: u8 = 3;
const PMKID_DATA_TYPE: u8 = 4;
const IGTK_DATA_TYPE: u8 = 9;
const OCI_DATA_TYPE: u8 = 13;
const BIGTK_DATA_TYPE: u8 = 14;
// IEEE P802.11be
const MLO_LINK_DATA_TYPE: u8 = 19;

// Wi-Fi Alliance KDEs.
const IP_ADDR_REQ_DATA_TYPE: u8 = 4;
const IP_ADDR_ALLOC_DATA_TYPE: u8 = 5;
const TRANSITION_DISABLE_DATA_TYPE: u8 = 0x20;

/// A GTK KDE's fixed length.
/// Note: The KDE consists of a fixed and variable length (the GTK).
const GTK_FIXED_LEN: usize = 2;

const IGTK_IPN_LEN: usize = 6;
const IGTK_FIXED_LEN: usize = 2 + IGTK_IPN_LEN;
const OCI_LEN: usize = 3;
const IP_ADDR_ALLOC_LEN: usize = 12;
const MLO_LINK_FIXED_LEN: usize = 7;

// IEEE Std 802.11-2020, 12.7.2, Figure 12-34
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Header {
    pub type_: u8,
    pub len: u8,
    pub oui: Oui,
    pub data_type: u8,
}

impl Header {
    pub fn new(type_: u8, len: u8, oui: &[u8], data_type: u8) -> Header {
        let mut oui_buf = [0u8; 3];
        oui_buf.copy_from_slice(oui);
        Header { type_, len, data_type, oui: Oui::new(oui_buf) }
    }

    pub fn new_dot11(data_type: u8, data_len: usize) -> Header {
        Header { type_: TYPE, len: (HDR_OUI_TYPE_LEN + data_len) as u8, data_type, oui: Oui::DOT11 }
    }

    pub fn new_wfa(data_type: u8, data_len: usize) -> Header {
        Header { type_: TYPE, len: (HDR_OUI_TYPE_LEN + data_len) as u8, data_type, oui: Oui::WFA }
    }

    fn data_len(&self) -> usize {
        if self.len < 4 {
            0
        } else {
            (self.len as usize) - 4
        }
    }
}

// IEEE Std 802.11-2020, 12.7.2, j)
pub enum GtkInfoTx {
    OnlyRx = 0,
    BothRxTx = 1,
}

// IEEE Std 802.11-2020, 12.7.2, Figure 12-35
bitfield! {
    #[derive(Clone, Copy)]
    pub struct GtkInfo(u8);
    impl Debug;
    pub key_id, set_key_id: 1, 0;
    pub tx, set_tx: 2, 2;
    // Bit 3-7 reserved.
    pub value, _: 7,0;
}

impl PartialEq for GtkInfo {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for GtkInfo {}

/// GTK KDE:
/// IEEE Std 802.11-2020, 12.7.2, Figure 12-35
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Gtk {
    pub info: GtkInfo,
    // 1 byte reserved.
    pub gtk: Vec<u8>,
}

impl Gtk {
    pub fn new(key_id: u8, tx: GtkInfoTx, gtk: &[u8]) -> Self {
        let mut gtk_info = GtkInfo(0);
        gtk_info.set_key_id(key_id);
        gtk_info.set_tx(tx as u8);
        Self { info: gtk_info, gtk: gtk.to_vec() }
    }

    /// Length of the GTK KDE including its fixed fields, not just the GTK.
    pub fn len(&self) -> usize {
        GTK_FIXED_LEN + self.gtk.len()
    }
}

/// IGTK KDE, IEEE Std 802.11-2020, 12.7.2, Figure 12-42.
/// The BIGTK KDE (Figure 12-47) shares this layout with the BIPN in place of the IPN.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Igtk {
    pub id: u16,
    // IGTK Packet Number
    pub ipn: [u8; IGTK_IPN_LEN],
    pub igtk: Vec<u8>,
}

impl Igtk {
    pub fn new(id: u16, ipn: &[u8], igtk: &[u8]) -> Self {
        let mut ipn_buf = [0u8; IGTK_IPN_LEN];
        let len = ipn.len().min(IGTK_IPN_LEN);
        ipn_buf[..len].copy_from_slice(&ipn[..len]);
        Self { id, ipn: ipn_buf, igtk: igtk.to_vec() }
    }

    pub fn len(&self) -> usize {
        IGTK_FIXED_LEN + self.igtk.len()
    }
}

/// Operating Channel Information KDE, IEEE Std 802.11-2020, 12.7.2, Figure 12-46
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Oci {
    pub op_class: u8,
    pub primary_channel: u8,
    pub freq_seg1_channel: u8,
}

/// MLO Link KDE. Carries the link ID and the link's MAC address.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MloLink {
    pub link_id: u8,
    pub link_addr: MacAddr,
}

/// IP Address Allocation KDE, Wi-Fi P2P Technical Specification, 4.2.8.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct IpAddrAlloc {
    pub client_ip: [u8; 4],
    pub subnet_mask: [u8; 4],
    pub go_ip: [u8; 4],
}

pub fn parse(i0: &[u8]) -> IResult<&[u8], Element> {
    // Check whether parsing is finished.
    if i0.len() <= 1 {
        return Ok((&i0[i0.len()..], Element::Padding));
    }

    // Check whether the remaining data is padding.
    let data_len = i0[1];
    if data_len == PADDING_DATA_LEN {
        return parse_padding(&i0[1..]);
    }

    // Read the KDE Header first.
    let (i1, hdr) = try_parse!(i0, call!(parse_header));
    let (i2, bytes) = try_parse!(i1, take!(hdr.data_len()));
    match hdr.oui {
        Oui::DOT11 => match hdr.data_type {
            GTK_DATA_TYPE => {
                let (_, gtk) = try_parse!(bytes, call!(parse_gtk, hdr.data_len()));
                Ok((i2, Element::Gtk(hdr, gtk)))
            }
            IGTK_DATA_TYPE => {
                let (_, igtk) = try_parse!(bytes, call!(parse_igtk, hdr.data_len()));
                Ok((i2, Element::Igtk(hdr, igtk)))
            }
            BIGTK_DATA_TYPE => {
                let (_, bigtk) = try_parse!(bytes, call!(parse_igtk, hdr.data_len()));
                Ok((i2, Element::Bigtk(hdr, bigtk)))
            }
            PMKID_DATA_TYPE => {
                let (_, pmkid) = try_parse!(bytes, parse_pmkid);
                Ok((i2, Element::Pmkid(hdr, pmkid)))
            }
            MAC_ADDR_DATA_TYPE => {
                let (_, addr) = try_parse!(bytes, parse_mac_addr);
                Ok((i2, Element::MacAddr(hdr, addr)))
            }
            OCI_DATA_TYPE => {
                let (_, oci) = try_parse!(bytes, parse_oci);
                Ok((i2, Element::Oci(hdr, oci)))
            }
            MLO_LINK_DATA_TYPE => {
                let (_, link) = try_parse!(bytes, parse_mlo_link);
                Ok((i2, Element::MloLink(hdr, link)))
            }
            _ => Ok((i2, Element::UnsupportedKde(hdr))),
        },
        Oui::WFA => match hdr.data_type {
            TRANSITION_DISABLE_DATA_TYPE if !bytes.is_empty() => {
                Ok((i2, Element::TransitionDisable(hdr, bytes[0])))
            }
            IP_ADDR_REQ_DATA_TYPE => Ok((i2, Element::IpAddrReq(hdr))),
            IP_ADDR_ALLOC_DATA_TYPE => {
                let (_, alloc) = try_parse!(bytes, parse_ip_addr_alloc);
                Ok((i2, Element::IpAddrAlloc(hdr, alloc)))
            }
            _ => Ok((i2, Element::UnsupportedKde(hdr))),
        },
        // The WPA1 IE uses the same vendor IE format as a KDE, so we handle it here as a special
        // case.
        Oui::MSFT if hdr.data_type == wpa::VENDOR_SPECIFIC_TYPE => {
            let (_, wpa) = try_parse!(&bytes[..], wpa::from_bytes);
            Ok((i2, Element::LegacyWpa1(wpa)))
        }
        _ => Ok((i2, Element::UnsupportedKde(hdr))),
    }
}

named!(parse_header<&[u8], Header>,
       do_parse!(
            type_: le_u8 >>
            length: le_u8 >>
            oui: take!(3) >>
            data_type: le_u8 >>
           (Header::new(type_, length, oui, data_type))
    )
);

fn parse_padding(input: &[u8]) -> IResult<&[u8], Element> {
    if input.iter().all(|&x| x == 0) {
        Ok((&[], Element::Padding))
    } else {
        // Return ErrorKind::Eof to indicate that we expected that the remaining input should have
        // been all padding bytes.
        Err(nom::Err::Error((input, ErrorKind::Eof)))
    }
}

named_args!(parse_gtk(data_len: usize) <Gtk>,
       do_parse!(
           info: map!(le_u8, GtkInfo) >>
           /* 1 byte reserved */ take!(1) >>
           gtk: take!(data_len.saturating_sub(GTK_FIXED_LEN)) >>
           eof!() >>
           (Gtk{
                info: info,
                gtk: gtk.to_vec(),
           })
    )
);

named_args!(parse_igtk(data_len: usize) <Igtk>,
       do_parse!(
            id: le_u16 >>
            ipn: take!(IGTK_IPN_LEN) >>
            igtk: take!(data_len.saturating_sub(IGTK_FIXED_LEN)) >>
            eof!() >>
            (Igtk::new(id, ipn, igtk))
    )
);

named!(parse_pmkid<&[u8], Pmkid>,
       do_parse!(
            pmkid: take!(PMKID_LEN) >>
            eof!() >>
            (pmkid.try_into().unwrap_or([0u8; PMKID_LEN]))
    )
);

named!(parse_mac_addr<&[u8], MacAddr>,
       do_parse!(
            addr: take!(6) >>
            eof!() >>
            (addr.try_into().unwrap_or([0u8; 6]))
    )
);

named!(parse_oci<&[u8], Oci>,
       do_parse!(
            op_class: le_u8 >>
            primary_channel: le_u8 >>
            freq_seg1_channel: le_u8 >>
            (Oci { op_class, primary_channel, freq_seg1_channel })
    )
);

named!(parse_mlo_link<&[u8], MloLink>,
       do_parse!(
            info: le_u8 >>
            addr: take!(6) >>
            (MloLink { link_id: info & 0x0f, link_addr: addr.try_into().unwrap_or([0u8; 6]) })
    )
);

named!(parse_ip_addr_alloc<&[u8], IpAddrAlloc>,
       do_parse!(
            addrs: count!(take!(4), 3) >>
            eof!() >>
            (IpAddrAlloc {
                client_ip: addrs[0].try_into().unwrap_or([0u8; 4]),
                subnet_mask: addrs[1].try_into().unwrap_or([0u8; 4]),
                go_ip: addrs[2].try_into().unwrap_or([0u8; 4]),
            })
    )
);

/// KDE Writer to assist with writing key data elements.
pub struct Writer<A: Appendable> {
    buf: A,
}

impl<A: Appendable> Writer<A> {
    pub fn new(buf: A) -> Self {
        Self { buf }
    }

    pub fn bytes_written(&self) -> usize {
        self.buf.bytes_written()
    }

    pub fn write_rsne(&mut self, rsne: &Rsne) -> Result<(), BufferTooSmall> {
        rsne.write_into(&mut self.buf)
    }

    pub fn write_wpa1_ie(&mut self, wpa: &WpaIe) -> Result<(), BufferTooSmall> {
        wpa.write_element_into(&mut self.buf)
    }

    /// Writes an already encoded element, e.g. the RSNXE or the IEs advertised in Beacons.
    pub fn write_raw_element(&mut self, element: &[u8]) -> Result<(), BufferTooSmall> {
        self.buf.append_bytes(element)
    }

    fn write_kde_hdr(&mut self, hdr: Header) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN) {
            return Err(BufferTooSmall);
        }
        self.buf.append_byte(hdr.type_)?;
        self.buf.append_byte(hdr.len)?;
        self.buf.append_bytes(&hdr.oui[..])?;
        self.buf.append_byte(hdr.data_type)?;
        Ok(())
    }

    pub fn write_gtk(&mut self, gtk_kde: &Gtk) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + gtk_kde.len()) {
            return Err(BufferTooSmall);
        }
        // KDE Header
        let hdr = Header::new_dot11(GTK_DATA_TYPE, gtk_kde.len());
        self.write_kde_hdr(hdr)?;

        // GTK KDE
        self.buf.append_byte(gtk_kde.info.value())?;
        self.buf.append_byte(0)?;
        self.buf.append_bytes(&gtk_kde.gtk[..])?;
        Ok(())
    }

    fn write_mgmt_group_key(&mut self, data_type: u8, kde: &Igtk) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + kde.len()) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_dot11(data_type, kde.len()))?;
        self.buf.append_le_u16(kde.id)?;
        self.buf.append_bytes(&kde.ipn[..])?;
        self.buf.append_bytes(&kde.igtk[..])?;
        Ok(())
    }

    pub fn write_igtk(&mut self, igtk_kde: &Igtk) -> Result<(), BufferTooSmall> {
        self.write_mgmt_group_key(IGTK_DATA_TYPE, igtk_kde)
    }

    pub fn write_bigtk(&mut self, bigtk_kde: &Igtk) -> Result<(), BufferTooSmall> {
        self.write_mgmt_group_key(BIGTK_DATA_TYPE, bigtk_kde)
    }

    pub fn write_pmkid(&mut self, pmkid: &Pmkid) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + PMKID_LEN) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_dot11(PMKID_DATA_TYPE, PMKID_LEN))?;
        self.buf.append_bytes(&pmkid[..])
    }

    pub fn write_mac_addr(&mut self, addr: &MacAddr) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + addr.len()) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_dot11(MAC_ADDR_DATA_TYPE, addr.len()))?;
        self.buf.append_bytes(&addr[..])
    }

    pub fn write_oci(&mut self, oci: &Oci) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + OCI_LEN) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_dot11(OCI_DATA_TYPE, OCI_LEN))?;
        self.buf.append_byte(oci.op_class)?;
        self.buf.append_byte(oci.primary_channel)?;
        self.buf.append_byte(oci.freq_seg1_channel)
    }

    pub fn write_mlo_link(&mut self, link: &MloLink) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + MLO_LINK_FIXED_LEN) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_dot11(MLO_LINK_DATA_TYPE, MLO_LINK_FIXED_LEN))?;
        self.buf.append_byte(link.link_id & 0x0f)?;
        self.buf.append_bytes(&link.link_addr[..])
    }

    pub fn write_transition_disable(&mut self, bitmap: u8) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + 1) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_wfa(TRANSITION_DISABLE_DATA_TYPE, 1))?;
        self.buf.append_byte(bitmap)
    }

    pub fn write_ip_addr_alloc(&mut self, alloc: &IpAddrAlloc) -> Result<(), BufferTooSmall> {
        if !self.buf.can_append(HDR_LEN + IP_ADDR_ALLOC_LEN) {
            return Err(BufferTooSmall);
        }
        self.write_kde_hdr(Header::new_wfa(IP_ADDR_ALLOC_DATA_TYPE, IP_ADDR_ALLOC_LEN))?;
        self.buf.append_bytes(&alloc.client_ip[..])?;
        self.buf.append_bytes(&alloc.subnet_mask[..])?;
        self.buf.append_bytes(&alloc.go_ip[..])
    }

    #[cfg(test)]
    pub fn write_ip_addr_req(&mut self) -> Result<(), BufferTooSmall> {
        self.write_kde_hdr(Header::new_wfa(IP_ADDR_REQ_DATA_TYPE, 1))?;
        self.buf.append_byte(0)
    }

    pub fn finalize_for_encryption(mut self) -> Result<A, BufferTooSmall> {
        // Optional padding must be added if the key data will be encrypted.
        // See IEEE Std 802.11-2020, 12.7.2 j)
        // Padding is added to extend the key data field to a minimum size of 16 octets or
        // otherwise be a multiple of 8 octets.
        let written = self.bytes_written();
        let padding_len =
            if written < 16 { 16 - written } else { ((written + 7) / 8) * 8 - written };
        if !self.buf.can_append(padding_len) {
            return Err(BufferTooSmall);
        }

        if padding_len != 0 {
            self.buf.append_byte(TYPE)?;
            self.buf.append_bytes_zeroed(padding_len - 1)?;
        }
        Ok(self.buf)
    }

    pub fn finalize_for_plaintext(self) -> Result<A, BufferTooSmall> {
        Ok(self.buf)
    }
}
