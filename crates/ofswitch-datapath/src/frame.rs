//! Parsed header view of a raw Ethernet frame.

use crate::amaru::{AmaruHeader, ETH_TYPE_AMARU};
use byteorder::{BigEndian, ByteOrder};
use ofswitch_types::MacAddress;
use std::net::Ipv4Addr;

pub const ETH_HEADER_LEN: usize = 14;
/// Ethernet header with one 802.1Q tag.
pub const VLAN_ETH_HEADER_LEN: usize = 18;

pub const ETH_TYPE_IPV4: u16 = 0x0800;
pub const ETH_TYPE_VLAN: u16 = 0x8100;

const IPV4_MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddress,
    pub src: MacAddress,
    /// Ethertype after any VLAN tag.
    pub ethertype: u16,
    pub vlan: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

/// Headers found in a frame. Absent layers are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParsedView {
    pub eth: Option<EthernetHeader>,
    pub ipv4: Option<Ipv4Header>,
    pub amaru: Option<AmaruHeader>,
}

impl ParsedView {
    pub fn parse(frame: &[u8]) -> Self {
        let mut view = ParsedView::default();
        if frame.len() < ETH_HEADER_LEN {
            return view;
        }

        let dst = MacAddress::new(mac_at(frame, 0));
        let src = MacAddress::new(mac_at(frame, 6));
        let mut ethertype = BigEndian::read_u16(&frame[12..14]);
        let mut offset = ETH_HEADER_LEN;
        let mut vlan = None;
        if ethertype == ETH_TYPE_VLAN {
            if frame.len() < VLAN_ETH_HEADER_LEN {
                return view;
            }
            vlan = Some(BigEndian::read_u16(&frame[14..16]) & 0x0fff);
            ethertype = BigEndian::read_u16(&frame[16..18]);
            offset = VLAN_ETH_HEADER_LEN;
        }
        view.eth = Some(EthernetHeader {
            dst,
            src,
            ethertype,
            vlan,
        });

        let payload = &frame[offset..];
        match ethertype {
            ETH_TYPE_IPV4 if payload.len() >= IPV4_MIN_HEADER_LEN && payload[0] >> 4 == 4 => {
                view.ipv4 = Some(Ipv4Header {
                    protocol: payload[9],
                    src: Ipv4Addr::new(payload[12], payload[13], payload[14], payload[15]),
                    dst: Ipv4Addr::new(payload[16], payload[17], payload[18], payload[19]),
                });
            }
            ETH_TYPE_AMARU => view.amaru = AmaruHeader::parse(payload),
            _ => {}
        }
        view
    }

    pub fn ethertype(&self) -> Option<u16> {
        self.eth.map(|eth| eth.ethertype)
    }
}

fn mac_at(frame: &[u8], offset: usize) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&frame[offset..offset + 6]);
    mac
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eth(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[2, 0, 0, 0, 0, 9]);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_runt_frame_has_no_headers() {
        assert_eq!(ParsedView::parse(&[0u8; 10]), ParsedView::default());
    }

    #[test]
    fn test_ipv4() {
        let mut ip = [0u8; 20];
        ip[0] = 0x45;
        ip[9] = 6;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);
        let view = ParsedView::parse(&eth(ETH_TYPE_IPV4, &ip));
        assert_eq!(view.ethertype(), Some(ETH_TYPE_IPV4));
        assert_eq!(
            view.ipv4,
            Some(Ipv4Header {
                src: Ipv4Addr::new(10, 0, 0, 1),
                dst: Ipv4Addr::new(10, 0, 0, 2),
                protocol: 6,
            })
        );
        assert!(view.eth.unwrap().dst.is_broadcast());
    }

    #[test]
    fn test_vlan_tag_is_skipped() {
        let mut payload = vec![0x00, 0x05];
        payload.extend_from_slice(&0x0806u16.to_be_bytes());
        payload.extend_from_slice(&[0u8; 28]);
        let view = ParsedView::parse(&eth(ETH_TYPE_VLAN, &payload));
        let header = view.eth.unwrap();
        assert_eq!(header.ethertype, 0x0806);
        assert_eq!(header.vlan, Some(5));
        assert!(view.ipv4.is_none());
    }

    #[test]
    fn test_truncated_ipv4_has_only_ethernet() {
        let view = ParsedView::parse(&eth(ETH_TYPE_IPV4, &[0x45, 0, 0]));
        assert!(view.eth.is_some());
        assert!(view.ipv4.is_none());
    }
}
