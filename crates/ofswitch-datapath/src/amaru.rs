//! AMARU control frames.
//!
//! Two frames share the AMARU ethertype:
//!
//! ```text
//! announcement:  dst=ff:ff:ff:ff:ff:ff  src=<egress port>  type=0xaaaa
//!                level:u8  chain:[u8; 28]  zero padding to 64 bytes
//!
//! migration:     dst=src=ff:ff:ff:ff:ff:ff  type=0xaaaa
//!                new_port:u32  name_len:u8  name  ipv4:[u8; 16]  old_port:u32
//! ```
//!
//! Announcements flood down the tree. Migration notices only ever travel to
//! the controller inside a packet-in. Integers are big-endian; the address
//! field holds the four IPv4 octets followed by zeros.

use crate::error::{DatapathError, Result};
use crate::frame::ETH_HEADER_LEN;
use byteorder::{BigEndian, ByteOrder};
use ofswitch_types::MacAddress;
use std::net::Ipv4Addr;

pub const ETH_TYPE_AMARU: u16 = 0xaaaa;

/// Length of an address chain, one byte per hop from the root.
pub const AMAC_LEN: usize = 28;

/// Minimum announcement frame length.
pub const AMARU_FRAME_LEN: usize = 64;

const AMARU_HEADER_LEN: usize = 1 + AMAC_LEN;
const NOTICE_ADDR_LEN: usize = 16;

/// Level and address chain of an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmaruHeader {
    pub level: u8,
    pub chain: [u8; AMAC_LEN],
}

impl AmaruHeader {
    /// Parses the header from the bytes after the Ethernet header.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < AMARU_HEADER_LEN {
            return None;
        }
        let mut chain = [0u8; AMAC_LEN];
        chain.copy_from_slice(&payload[1..AMARU_HEADER_LEN]);
        Some(AmaruHeader {
            level: payload[0],
            chain,
        })
    }

    /// Significant prefix of the chain.
    pub fn path(&self) -> &[u8] {
        &self.chain[..usize::from(self.level).min(AMAC_LEN)]
    }
}

/// Encodes an announcement sent from a port with address `src`.
pub fn encode_announcement(src: MacAddress, header: &AmaruHeader) -> Vec<u8> {
    let mut frame = Vec::with_capacity(AMARU_FRAME_LEN);
    put_eth(&mut frame, MacAddress::BROADCAST, src);
    frame.push(header.level);
    frame.extend_from_slice(&header.chain);
    frame.resize(AMARU_FRAME_LEN, 0);
    frame
}

/// Tells the controller the management port moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationNotice {
    pub new_port: u32,
    pub name: String,
    pub address: Ipv4Addr,
    pub old_port: u32,
}

impl MigrationNotice {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let name_len = u8::try_from(self.name.len())
            .map_err(|_| DatapathError::Frame(format!("port name too long: {}", self.name)))?;

        let mut frame = Vec::with_capacity(ETH_HEADER_LEN + 4 + 1 + self.name.len() + 16 + 4);
        put_eth(&mut frame, MacAddress::BROADCAST, MacAddress::BROADCAST);
        frame.extend_from_slice(&self.new_port.to_be_bytes());
        frame.push(name_len);
        frame.extend_from_slice(self.name.as_bytes());
        let mut addr = [0u8; NOTICE_ADDR_LEN];
        addr[..4].copy_from_slice(&self.address.octets());
        frame.extend_from_slice(&addr);
        frame.extend_from_slice(&self.old_port.to_be_bytes());
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let short = || DatapathError::Frame(format!("migration notice too short: {}", frame.len()));
        let body = frame.get(ETH_HEADER_LEN..).ok_or_else(short)?;
        if frame.len() < ETH_HEADER_LEN + 5
            || BigEndian::read_u16(&frame[12..14]) != ETH_TYPE_AMARU
        {
            return Err(short());
        }

        let new_port = BigEndian::read_u32(&body[0..4]);
        let name_len = usize::from(body[4]);
        let name_end = 5 + name_len;
        let addr_end = name_end + NOTICE_ADDR_LEN;
        if body.len() < addr_end + 4 {
            return Err(short());
        }
        let name = String::from_utf8(body[5..name_end].to_vec())
            .map_err(|e| DatapathError::Frame(format!("port name not UTF-8: {}", e)))?;
        let address = Ipv4Addr::new(
            body[name_end],
            body[name_end + 1],
            body[name_end + 2],
            body[name_end + 3],
        );
        Ok(MigrationNotice {
            new_port,
            name,
            address,
            old_port: BigEndian::read_u32(&body[addr_end..addr_end + 4]),
        })
    }
}

fn put_eth(frame: &mut Vec<u8>, dst: MacAddress, src: MacAddress) {
    frame.extend_from_slice(dst.as_bytes());
    frame.extend_from_slice(src.as_bytes());
    frame.extend_from_slice(&ETH_TYPE_AMARU.to_be_bytes());
}
