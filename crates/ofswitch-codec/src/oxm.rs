//! Flow tuples and their OXM match encoding.

use crate::error::{BadMatchCode, OfpError, Result};
use crate::message::round_up8;
use byteorder::{BigEndian, ReadBytesExt};
use ofswitch_types::MacAddress;
use std::io::Cursor;
use std::net::Ipv4Addr;

pub const ETH_TYPE_IP: u16 = 0x0800;
pub const ETH_TYPE_ARP: u16 = 0x0806;
pub const IP_PROTO_TCP: u8 = 6;

/// `OFPMT_OXM`
pub const MATCH_TYPE_OXM: u16 = 1;
/// Size of the `ofp_match` type/length prefix.
pub const MATCH_HEADER_LEN: usize = 4;

const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000;

const OXM_IN_PORT: u8 = 0;
const OXM_ETH_DST: u8 = 3;
const OXM_ETH_TYPE: u8 = 5;
const OXM_IP_PROTO: u8 = 10;
const OXM_IPV4_SRC: u8 = 11;
const OXM_IPV4_DST: u8 = 12;
const OXM_ARP_TPA: u8 = 23;

/// The header fields of a frame that a flow entry is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub in_port: u32,
    pub dl_type: u16,
    pub dl_src: MacAddress,
    pub dl_dst: MacAddress,
    pub nw_src: Ipv4Addr,
    pub nw_dst: Ipv4Addr,
    pub nw_proto: u8,
}

impl Default for Flow {
    fn default() -> Self {
        Flow {
            in_port: 0,
            dl_type: 0,
            dl_src: MacAddress::ZERO,
            dl_dst: MacAddress::ZERO,
            nw_src: Ipv4Addr::UNSPECIFIED,
            nw_dst: Ipv4Addr::UNSPECIFIED,
            nw_proto: 0,
        }
    }
}

impl Flow {
    /// A TCP/IPv4 flow between two hosts.
    pub fn tcp(nw_src: Ipv4Addr, nw_dst: Ipv4Addr) -> Self {
        Flow {
            dl_type: ETH_TYPE_IP,
            nw_proto: IP_PROTO_TCP,
            nw_src,
            nw_dst,
            ..Flow::default()
        }
    }

    /// An ARP flow towards `target`.
    pub fn arp(target: Ipv4Addr) -> Self {
        Flow {
            dl_type: ETH_TYPE_ARP,
            nw_dst: target,
            ..Flow::default()
        }
    }
}

/// One OXM TLV from the OpenFlow basic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OxmField {
    InPort(u32),
    EthDst(MacAddress),
    EthType(u16),
    IpProto(u8),
    Ipv4Src(Ipv4Addr),
    Ipv4Dst(Ipv4Addr),
    ArpTpa(Ipv4Addr),
}

impl OxmField {
    fn field(&self) -> u8 {
        match self {
            OxmField::InPort(_) => OXM_IN_PORT,
            OxmField::EthDst(_) => OXM_ETH_DST,
            OxmField::EthType(_) => OXM_ETH_TYPE,
            OxmField::IpProto(_) => OXM_IP_PROTO,
            OxmField::Ipv4Src(_) => OXM_IPV4_SRC,
            OxmField::Ipv4Dst(_) => OXM_IPV4_DST,
            OxmField::ArpTpa(_) => OXM_ARP_TPA,
        }
    }

    fn payload_len(field: u8) -> Option<usize> {
        match field {
            OXM_IN_PORT | OXM_IPV4_SRC | OXM_IPV4_DST | OXM_ARP_TPA => Some(4),
            OXM_ETH_DST => Some(6),
            OXM_ETH_TYPE => Some(2),
            OXM_IP_PROTO => Some(1),
            _ => None,
        }
    }

    /// Encoded size including the 4-byte OXM header.
    pub fn len(&self) -> usize {
        4 + Self::payload_len(self.field()).unwrap_or(0)
    }

    fn write(&self, out: &mut Vec<u8>) {
        let field = self.field();
        let len = Self::payload_len(field).unwrap_or(0) as u8;
        out.extend_from_slice(&OXM_CLASS_OPENFLOW_BASIC.to_be_bytes());
        out.push(field << 1);
        out.push(len);
        match *self {
            OxmField::InPort(port) => out.extend_from_slice(&port.to_be_bytes()),
            OxmField::EthDst(mac) => out.extend_from_slice(mac.as_bytes()),
            OxmField::EthType(ty) => out.extend_from_slice(&ty.to_be_bytes()),
            OxmField::IpProto(proto) => out.push(proto),
            OxmField::Ipv4Src(ip) | OxmField::Ipv4Dst(ip) | OxmField::ArpTpa(ip) => {
                out.extend_from_slice(&ip.octets())
            }
        }
    }
}

/// An OXM match: an ordered list of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    pub fields: Vec<OxmField>,
}

impl Match {
    /// Selects the fields of `flow` that identify it.
    ///
    /// The ethertype is always matched. ARP flows add the ingress port,
    /// target protocol address and destination MAC when set; TCP/IPv4 flows
    /// add the protocol and then ingress port, destination and source
    /// address when set. Other flows match on ethertype alone.
    pub fn from_flow(flow: &Flow) -> Self {
        let mut fields = vec![OxmField::EthType(flow.dl_type)];

        if flow.dl_type == ETH_TYPE_ARP {
            if flow.in_port != 0 {
                fields.push(OxmField::InPort(flow.in_port));
            }
            if !flow.nw_dst.is_unspecified() {
                fields.push(OxmField::ArpTpa(flow.nw_dst));
            }
            if !flow.dl_dst.is_zero() {
                fields.push(OxmField::EthDst(flow.dl_dst));
            }
        } else if flow.dl_type == ETH_TYPE_IP && flow.nw_proto == IP_PROTO_TCP {
            fields.push(OxmField::IpProto(flow.nw_proto));
            if flow.in_port != 0 {
                fields.push(OxmField::InPort(flow.in_port));
            }
            if !flow.nw_dst.is_unspecified() {
                fields.push(OxmField::Ipv4Dst(flow.nw_dst));
            }
            if !flow.nw_src.is_unspecified() {
                fields.push(OxmField::Ipv4Src(flow.nw_src));
            }
        }

        Match { fields }
    }

    /// Rebuilds a flow tuple from the matched fields. Unmatched fields stay
    /// at their zero value.
    pub fn to_flow(&self) -> Flow {
        let mut flow = Flow::default();
        for field in &self.fields {
            match *field {
                OxmField::InPort(port) => flow.in_port = port,
                OxmField::EthDst(mac) => flow.dl_dst = mac,
                OxmField::EthType(ty) => flow.dl_type = ty,
                OxmField::IpProto(proto) => flow.nw_proto = proto,
                OxmField::Ipv4Src(ip) => flow.nw_src = ip,
                OxmField::Ipv4Dst(ip) | OxmField::ArpTpa(ip) => flow.nw_dst = ip,
            }
        }
        flow
    }

    /// Total size of the OXM TLVs.
    pub fn oxm_len(&self) -> usize {
        self.fields.iter().map(OxmField::len).sum()
    }

    /// Length recorded in the `ofp_match` header (prefix plus TLVs).
    pub fn header_len(&self) -> usize {
        MATCH_HEADER_LEN + self.oxm_len()
    }

    /// Size of the match on the wire, padded to 8 bytes.
    pub fn padded_len(&self) -> usize {
        round_up8(self.header_len())
    }

    /// Serializes the `ofp_match` structure including trailing padding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.padded_len());
        out.extend_from_slice(&MATCH_TYPE_OXM.to_be_bytes());
        out.extend_from_slice(&(self.header_len() as u16).to_be_bytes());
        for field in &self.fields {
            field.write(&mut out);
        }
        out.resize(self.padded_len(), 0);
        out
    }

    /// Decodes an `ofp_match` at the start of `bytes`.
    ///
    /// Returns the match and the number of bytes consumed, padding included.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let bad_len = OfpError::BadMatch(BadMatchCode::BadLen);
        if bytes.len() < MATCH_HEADER_LEN {
            return Err(bad_len);
        }
        let mut cursor = Cursor::new(bytes);
        let match_type = cursor.read_u16::<BigEndian>().map_err(|_| bad_len)?;
        let length = usize::from(cursor.read_u16::<BigEndian>().map_err(|_| bad_len)?);
        if match_type != MATCH_TYPE_OXM {
            return Err(OfpError::BadMatch(BadMatchCode::BadType));
        }
        if length < MATCH_HEADER_LEN || round_up8(length) > bytes.len() {
            return Err(bad_len);
        }

        let mut fields: Vec<OxmField> = Vec::new();
        let mut rest = &bytes[MATCH_HEADER_LEN..length];
        while !rest.is_empty() {
            if rest.len() < 4 {
                return Err(bad_len);
            }
            let class = u16::from_be_bytes([rest[0], rest[1]]);
            let field = rest[2] >> 1;
            let has_mask = rest[2] & 1 != 0;
            let len = usize::from(rest[3]);
            if class != OXM_CLASS_OPENFLOW_BASIC {
                return Err(OfpError::BadMatch(BadMatchCode::BadField));
            }
            if has_mask {
                return Err(OfpError::BadMatch(BadMatchCode::BadMask));
            }
            let expected =
                OxmField::payload_len(field).ok_or(OfpError::BadMatch(BadMatchCode::BadField))?;
            if len != expected || rest.len() < 4 + len {
                return Err(bad_len);
            }
            let value = &rest[4..4 + len];
            let parsed = match field {
                OXM_IN_PORT => OxmField::InPort(read_u32(value)),
                OXM_ETH_DST => OxmField::EthDst(
                    MacAddress::try_from(value).map_err(|_| bad_len)?,
                ),
                OXM_ETH_TYPE => OxmField::EthType(u16::from_be_bytes([value[0], value[1]])),
                OXM_IP_PROTO => OxmField::IpProto(value[0]),
                OXM_IPV4_SRC => OxmField::Ipv4Src(Ipv4Addr::from(read_u32(value))),
                OXM_IPV4_DST => OxmField::Ipv4Dst(Ipv4Addr::from(read_u32(value))),
                _ => OxmField::ArpTpa(Ipv4Addr::from(read_u32(value))),
            };
            if fields.iter().any(|f| f.field() == parsed.field()) {
                return Err(OfpError::BadMatch(BadMatchCode::DupField));
            }
            fields.push(parsed);
            rest = &rest[4 + len..];
        }

        Ok((Match { fields }, round_up8(length)))
    }
}

fn read_u32(value: &[u8]) -> u32 {
    u32::from_be_bytes([value[0], value[1], value[2], value[3]])
}
