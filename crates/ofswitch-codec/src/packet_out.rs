//! Packet-out messages.

use crate::action::{decode_actions, encode_actions, Action};
use crate::error::{OfpError, Result};
use crate::flow_mod::NO_BUFFER;
use crate::header::MessageType;
use crate::message::Message;
use byteorder::{BigEndian, ByteOrder};
use ofswitch_types::port_no;

/// Size of `ofp_packet_out` before the action array.
pub const PACKET_OUT_FIXED_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

impl PacketOut {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PACKET_OUT_FIXED_LEN {
            return Err(OfpError::bad_len());
        }
        let actions_len = usize::from(BigEndian::read_u16(&bytes[16..18]));
        let actions_end = PACKET_OUT_FIXED_LEN + actions_len;
        if actions_end > bytes.len() {
            return Err(OfpError::bad_len());
        }
        Ok(PacketOut {
            buffer_id: BigEndian::read_u32(&bytes[8..12]),
            in_port: BigEndian::read_u32(&bytes[12..16]),
            actions: decode_actions(&bytes[PACKET_OUT_FIXED_LEN..actions_end])?,
            data: bytes[actions_end..].to_vec(),
        })
    }
}

/// Builds a packet-out carrying `actions` and, if given, the raw frame.
pub fn build_packet_out(
    packet: Option<&[u8]>,
    buffer_id: u32,
    in_port: u32,
    actions: &[Action],
) -> Result<Message> {
    let action_bytes = encode_actions(actions);
    let actions_len = u16::try_from(action_bytes.len()).map_err(|_| OfpError::bad_len())?;

    let mut msg = Message::new(MessageType::PacketOut, PACKET_OUT_FIXED_LEN, Some(0))?;
    {
        let body = msg.body_mut();
        BigEndian::write_u32(&mut body[0..4], buffer_id);
        BigEndian::write_u32(&mut body[4..8], in_port);
        BigEndian::write_u16(&mut body[8..10], actions_len);
    }
    msg.put(&action_bytes);
    if let Some(data) = packet {
        msg.put(data);
    }
    msg.update_length()?;
    Ok(msg)
}

/// Sends `packet` out of `out_port` without referencing a switch buffer.
pub fn build_unbuffered_packet_out(packet: &[u8], in_port: u32, out_port: u32) -> Result<Message> {
    let action = Action::Output {
        port: out_port,
        max_len: 0,
    };
    build_packet_out(Some(packet), NO_BUFFER, in_port, &[action])
}

/// Releases buffer `buffer_id`, forwarding it to `out_port` unless that is
/// ANY, in which case the buffered packet is dropped.
pub fn build_buffered_packet_out(buffer_id: u32, in_port: u32, out_port: u32) -> Result<Message> {
    let actions: Vec<Action> = if out_port != port_no::ANY {
        vec![Action::Output {
            port: out_port,
            max_len: 0,
        }]
    } else {
        Vec::new()
    };
    build_packet_out(None, buffer_id, in_port, &actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OfpMessage;
    use pretty_assertions::assert_eq;

    fn decode(msg: &Message) -> PacketOut {
        match msg.unpack().unwrap() {
            OfpMessage::PacketOut(po) => po,
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unbuffered_carries_payload() {
        let frame = [0xabu8; 60];
        let msg = build_unbuffered_packet_out(&frame, 1, 2).unwrap();
        assert_eq!(msg.len(), 24 + 16 + 60);
        assert_eq!(msg.xid(), 0);
        let po = decode(&msg);
        assert_eq!(po.buffer_id, NO_BUFFER);
        assert_eq!(po.in_port, 1);
        assert_eq!(po.actions, vec![Action::Output { port: 2, max_len: 0 }]);
        assert_eq!(po.data, frame.to_vec());
    }

    #[test]
    fn test_buffered_with_and_without_output() {
        let po = decode(&build_buffered_packet_out(42, 1, 3).unwrap());
        assert_eq!(po.buffer_id, 42);
        assert_eq!(po.actions.len(), 1);
        assert!(po.data.is_empty());

        let msg = build_buffered_packet_out(42, 1, port_no::ANY).unwrap();
        assert_eq!(msg.len(), PACKET_OUT_FIXED_LEN);
        assert!(decode(&msg).actions.is_empty());
    }

    #[test]
    fn test_decode_rejects_overlong_actions_len() {
        let mut bytes = build_buffered_packet_out(1, 1, 2).unwrap().into_bytes();
        bytes[16..18].copy_from_slice(&64u16.to_be_bytes());
        assert_eq!(PacketOut::decode(&bytes), Err(OfpError::bad_len()));
    }
}
