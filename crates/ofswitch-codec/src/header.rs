//! The common 8-byte OpenFlow header.

use crate::error::{BadRequestCode, OfpError, Result};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Protocol version spoken by the switch (OpenFlow 1.3).
pub const OFP_VERSION: u8 = 0x04;

/// Size of [`Header`] on the wire.
pub const HEADER_LEN: usize = 8;

/// OpenFlow message types handled by the switch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Experimenter = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    PacketIn = 10,
    FlowRemoved = 11,
    PortStatus = 12,
    PacketOut = 13,
    FlowMod = 14,
    PortMod = 16,
    MultipartRequest = 18,
    MultipartReply = 19,
    BarrierRequest = 20,
    BarrierReply = 21,
    QueueGetConfigRequest = 22,
    QueueGetConfigReply = 23,
}

impl MessageType {
    /// Maps a wire type byte back to a known message type.
    pub fn from_u8(value: u8) -> Option<Self> {
        let ty = match value {
            0 => Self::Hello,
            1 => Self::Error,
            2 => Self::EchoRequest,
            3 => Self::EchoReply,
            4 => Self::Experimenter,
            5 => Self::FeaturesRequest,
            6 => Self::FeaturesReply,
            10 => Self::PacketIn,
            11 => Self::FlowRemoved,
            12 => Self::PortStatus,
            13 => Self::PacketOut,
            14 => Self::FlowMod,
            16 => Self::PortMod,
            18 => Self::MultipartRequest,
            19 => Self::MultipartReply,
            20 => Self::BarrierRequest,
            21 => Self::BarrierReply,
            22 => Self::QueueGetConfigRequest,
            23 => Self::QueueGetConfigReply,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// `{version, type, length, xid}` in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl Header {
    /// Reads the header from the first 8 bytes of `bytes`.
    ///
    /// Only the framing is checked here: the buffer must hold at least a
    /// header. Version and length consistency are left to the caller.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(OfpError::BadRequest(BadRequestCode::BadLen));
        }
        Ok(Header {
            version: bytes[0],
            msg_type: bytes[1],
            length: BigEndian::read_u16(&bytes[2..4]),
            xid: BigEndian::read_u32(&bytes[4..8]),
        })
    }

    /// Writes the header into the first 8 bytes of `out`.
    pub fn write(&self, out: &mut [u8]) {
        out[0] = self.version;
        out[1] = self.msg_type;
        BigEndian::write_u16(&mut out[2..4], self.length);
        BigEndian::write_u32(&mut out[4..8], self.xid);
    }

    /// The known message type, if any.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.msg_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_write() {
        let header = Header {
            version: OFP_VERSION,
            msg_type: MessageType::FlowMod as u8,
            length: 0x0150,
            xid: 0xdead_beef,
        };
        let mut buf = [0u8; HEADER_LEN];
        header.write(&mut buf);
        assert_eq!(buf, [0x04, 14, 0x01, 0x50, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Header::parse(&buf).unwrap(), header);
    }

    #[test]
    fn test_short_buffer() {
        assert_eq!(
            Header::parse(&[4, 0, 0]),
            Err(OfpError::BadRequest(BadRequestCode::BadLen))
        );
    }

    #[test]
    fn test_message_type_lookup() {
        assert_eq!(MessageType::from_u8(13), Some(MessageType::PacketOut));
        assert_eq!(MessageType::from_u8(9), None);
    }
}
