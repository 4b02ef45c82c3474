//! Echo, port description and error messages.

use crate::error::{OfpError, Result};
use crate::header::{Header, MessageType, HEADER_LEN};
use crate::message::{Message, MULTIPART_HEADER_LEN, MULTIPART_PORT_DESC};
use byteorder::{BigEndian, ByteOrder};

/// Maximum number of offending bytes echoed back in an error message.
pub const ERROR_DATA_MAX: usize = 64;

/// An empty echo request with a random transaction id.
pub fn build_echo_request() -> Result<Message> {
    Message::new(MessageType::EchoRequest, HEADER_LEN, None)
}

/// Answers `request` with a copy of it whose type byte is ECHO_REPLY.
///
/// Payload, length and transaction id are copied verbatim.
pub fn build_echo_reply(request: &[u8]) -> Result<Message> {
    let header = Header::parse(request)?;
    let len = usize::from(header.length);
    if len < HEADER_LEN || len > request.len() {
        return Err(OfpError::bad_len());
    }
    let mut reply = request[..len].to_vec();
    reply[1] = MessageType::EchoReply as u8;
    Message::from_bytes(reply)
}

/// Multipart request for the description of every port.
pub fn build_port_desc_request() -> Result<Message> {
    let mut msg = Message::new(MessageType::MultipartRequest, MULTIPART_HEADER_LEN, None)?;
    BigEndian::write_u16(&mut msg.body_mut()[0..2], MULTIPART_PORT_DESC);
    Ok(msg)
}

/// Error message reporting `err` for the message in `offending`, echoing
/// its transaction id and at most [`ERROR_DATA_MAX`] of its bytes.
pub fn build_error(err: OfpError, offending: &[u8]) -> Result<Message> {
    let xid = Header::parse(offending).map(|h| h.xid).unwrap_or(0);
    let mut msg = Message::new(MessageType::Error, HEADER_LEN + 4, Some(xid))?;
    {
        let body = msg.body_mut();
        BigEndian::write_u16(&mut body[0..2], err.error_type());
        BigEndian::write_u16(&mut body[2..4], err.code());
    }
    msg.put(&offending[..offending.len().min(ERROR_DATA_MAX)]);
    msg.update_length()?;
    Ok(msg)
}
