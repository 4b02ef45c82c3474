//! Message buffers and the generic unpacker.

use crate::error::{BadRequestCode, OfpError, Result};
use crate::flow_mod::FlowMod;
use crate::header::{Header, MessageType, HEADER_LEN, OFP_VERSION};
use crate::packet_out::PacketOut;
use byteorder::{BigEndian, ByteOrder};

/// Size of the multipart request/reply header, including the OpenFlow header.
pub const MULTIPART_HEADER_LEN: usize = 16;

/// Multipart type for port descriptions.
pub const MULTIPART_PORT_DESC: u16 = 13;

/// A serialized OpenFlow message.
///
/// The buffer always starts with a complete [`Header`]. The header length is
/// not tracked automatically; call [`Message::update_length`] after
/// appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    buf: Vec<u8>,
}

impl Message {
    /// Allocates a zero-filled message of exactly `length` bytes and stamps
    /// the header. A missing `xid` is replaced with a random one.
    pub fn new(msg_type: MessageType, length: usize, xid: Option<u32>) -> Result<Self> {
        if !(HEADER_LEN..=usize::from(u16::MAX)).contains(&length) {
            return Err(OfpError::bad_len());
        }
        let mut buf = vec![0u8; length];
        Header {
            version: OFP_VERSION,
            msg_type: msg_type as u8,
            length: length as u16,
            xid: xid.unwrap_or_else(rand::random),
        }
        .write(&mut buf);
        Ok(Message { buf })
    }

    /// Wraps raw bytes received from a peer. The declared length must match.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        let header = Header::parse(&buf)?;
        if usize::from(header.length) != buf.len() {
            return Err(OfpError::bad_len());
        }
        Ok(Message { buf })
    }

    pub fn header(&self) -> Header {
        Header {
            version: self.buf[0],
            msg_type: self.buf[1],
            length: BigEndian::read_u16(&self.buf[2..4]),
            xid: BigEndian::read_u32(&self.buf[4..8]),
        }
    }

    pub fn xid(&self) -> u32 {
        self.header().xid
    }

    pub fn set_xid(&mut self, xid: u32) {
        BigEndian::write_u32(&mut self.buf[4..8], xid);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Mutable access to everything after the header.
    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_LEN..]
    }

    /// Appends raw bytes. The header length is stale until
    /// [`Message::update_length`] is called.
    pub fn put(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    /// Rewrites the header length from the current buffer size.
    pub fn update_length(&mut self) -> Result<()> {
        let length = u16::try_from(self.buf.len()).map_err(|_| OfpError::bad_len())?;
        BigEndian::write_u16(&mut self.buf[2..4], length);
        Ok(())
    }

    /// Decodes the message into its structured form.
    pub fn unpack(&self) -> Result<OfpMessage> {
        unpack(&self.buf)
    }
}

/// An OFPT_ERROR body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    pub error_type: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

/// Structured view of a decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfpMessage {
    Hello,
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FlowMod(FlowMod),
    PacketOut(PacketOut),
    MultipartRequest {
        mp_type: u16,
        flags: u16,
        body: Vec<u8>,
    },
    Other {
        msg_type: u8,
        body: Vec<u8>,
    },
}

/// Decodes `bytes` as one complete OpenFlow message.
///
/// The version must match and the declared length must equal the buffer
/// length; the body is then decoded according to the message type.
pub fn unpack(bytes: &[u8]) -> Result<OfpMessage> {
    let header = Header::parse(bytes)?;
    if header.version != OFP_VERSION {
        return Err(OfpError::BadRequest(BadRequestCode::BadVersion));
    }
    if usize::from(header.length) != bytes.len() {
        return Err(OfpError::bad_len());
    }
    let body = &bytes[HEADER_LEN..];

    let message = match header.message_type() {
        Some(MessageType::Hello) => OfpMessage::Hello,
        Some(MessageType::EchoRequest) => OfpMessage::EchoRequest(body.to_vec()),
        Some(MessageType::EchoReply) => OfpMessage::EchoReply(body.to_vec()),
        Some(MessageType::Error) => {
            if body.len() < 4 {
                return Err(OfpError::bad_len());
            }
            OfpMessage::Error(ErrorMsg {
                error_type: BigEndian::read_u16(&body[0..2]),
                code: BigEndian::read_u16(&body[2..4]),
                data: body[4..].to_vec(),
            })
        }
        Some(MessageType::FlowMod) => OfpMessage::FlowMod(FlowMod::decode(bytes)?),
        Some(MessageType::PacketOut) => OfpMessage::PacketOut(PacketOut::decode(bytes)?),
        Some(MessageType::MultipartRequest) => {
            if bytes.len() < MULTIPART_HEADER_LEN {
                return Err(OfpError::bad_len());
            }
            OfpMessage::MultipartRequest {
                mp_type: BigEndian::read_u16(&body[0..2]),
                flags: BigEndian::read_u16(&body[2..4]),
                body: bytes[MULTIPART_HEADER_LEN..].to_vec(),
            }
        }
        _ => OfpMessage::Other {
            msg_type: header.msg_type,
            body: body.to_vec(),
        },
    };
    Ok(message)
}

/// Rounds `len` up to the next multiple of 8.
pub(crate) const fn round_up8(len: usize) -> usize {
    (len + 7) & !7
}
