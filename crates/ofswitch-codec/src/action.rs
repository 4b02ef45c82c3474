//! Action records.
//!
//! Every action starts with a 4-byte `{type, len}` header and occupies a
//! multiple of 8 bytes. Decoding is two-phase: the header is read, the length
//! is checked for that type, and only then is the payload interpreted.

use crate::error::{BadActionCode, OfpError, Result};
use crate::message::round_up8;
use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

/// Actions are laid out in slots of this many bytes.
pub const ACTION_SLOT: usize = 8;

pub const OUTPUT_LEN: usize = 16;
pub const SET_QUEUE_LEN: usize = 8;
/// `{type, len, experimenter}` common to every experimenter action.
pub const EXPERIMENTER_HEADER_LEN: usize = 8;
/// Nicira actions carry a subtype and pad out to 16 bytes.
pub const NICIRA_HEADER_LEN: usize = 16;

/// Nicira's experimenter id.
pub const NX_VENDOR_ID: u32 = 0x0000_2320;

/// `max_len` value asking the switch not to buffer packets sent to the
/// controller.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

/// `ofp_action_type` values.
pub mod action_type {
    pub const OUTPUT: u16 = 0;
    pub const SET_QUEUE: u16 = 21;
    pub const EXPERIMENTER: u16 = 0xffff;
}

/// Nicira action subtypes.
pub mod nx_subtype {
    pub const RESUBMIT: u16 = 1;
    pub const SET_TUNNEL: u16 = 2;
}

/// The fixed prefix shared by all actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionHeader {
    pub action_type: u16,
    pub len: u16,
}

impl ActionHeader {
    /// Reads the header without looking at the payload.
    pub fn peek(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(OfpError::BadAction(BadActionCode::BadLen));
        }
        Ok(ActionHeader {
            action_type: BigEndian::read_u16(&bytes[0..2]),
            len: BigEndian::read_u16(&bytes[2..4]),
        })
    }
}

/// A decoded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Output { port: u32, max_len: u16 },
    SetQueue { queue_id: u32 },
    Experimenter { vendor_id: u32, subtype: u16, payload: Vec<u8> },
}

impl Action {
    /// Output to `port` without a controller byte limit.
    pub fn output(port: u32) -> Self {
        Action::Output {
            port,
            max_len: OFPCML_NO_BUFFER,
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Action::Output { .. } => OUTPUT_LEN,
            Action::SetQueue { .. } => SET_QUEUE_LEN,
            Action::Experimenter { payload, .. } => {
                round_up8(10 + payload.len()).max(NICIRA_HEADER_LEN)
            }
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let start = out.len();
        let len = self.len();
        out.resize(start + len, 0);
        let buf = &mut out[start..];
        BigEndian::write_u16(&mut buf[2..4], len as u16);
        match self {
            Action::Output { port, max_len } => {
                BigEndian::write_u16(&mut buf[0..2], action_type::OUTPUT);
                BigEndian::write_u32(&mut buf[4..8], *port);
                BigEndian::write_u16(&mut buf[8..10], *max_len);
            }
            Action::SetQueue { queue_id } => {
                BigEndian::write_u16(&mut buf[0..2], action_type::SET_QUEUE);
                BigEndian::write_u32(&mut buf[4..8], *queue_id);
            }
            Action::Experimenter {
                vendor_id,
                subtype,
                payload,
            } => {
                BigEndian::write_u16(&mut buf[0..2], action_type::EXPERIMENTER);
                BigEndian::write_u32(&mut buf[4..8], *vendor_id);
                BigEndian::write_u16(&mut buf[8..10], *subtype);
                buf[10..10 + payload.len()].copy_from_slice(payload);
            }
        }
    }

    /// Decodes the action at the start of `bytes`, returning it with its
    /// length.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let bad_len = OfpError::BadAction(BadActionCode::BadLen);
        let header = ActionHeader::peek(bytes)?;
        let len = usize::from(header.len);
        if len < ACTION_SLOT || len % ACTION_SLOT != 0 || len > bytes.len() {
            return Err(bad_len);
        }
        let body = &bytes[..len];

        let action = match header.action_type {
            action_type::OUTPUT => {
                if len != OUTPUT_LEN {
                    return Err(bad_len);
                }
                Action::Output {
                    port: BigEndian::read_u32(&body[4..8]),
                    max_len: BigEndian::read_u16(&body[8..10]),
                }
            }
            action_type::SET_QUEUE => {
                if len != SET_QUEUE_LEN {
                    return Err(bad_len);
                }
                Action::SetQueue {
                    queue_id: BigEndian::read_u32(&body[4..8]),
                }
            }
            action_type::EXPERIMENTER => {
                if len < NICIRA_HEADER_LEN {
                    return Err(bad_len);
                }
                Action::Experimenter {
                    vendor_id: BigEndian::read_u32(&body[4..8]),
                    subtype: BigEndian::read_u16(&body[8..10]),
                    payload: body[10..].to_vec(),
                }
            }
            _ => return Err(OfpError::BadAction(BadActionCode::BadType)),
        };
        Ok((action, len))
    }
}

/// Serializes `actions` back to back.
pub fn encode_actions(actions: &[Action]) -> Vec<u8> {
    let mut out = Vec::with_capacity(actions.iter().map(Action::len).sum());
    for action in actions {
        action.encode(&mut out);
    }
    out
}

/// Decodes a whole action array; any malformed record fails the call.
pub fn decode_actions(mut bytes: &[u8]) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    while !bytes.is_empty() {
        let (action, len) = Action::decode(bytes)?;
        actions.push(action);
        bytes = &bytes[len..];
    }
    Ok(actions)
}

/// One action record as it sits in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAction<'a> {
    pub action_type: u16,
    pub bytes: &'a [u8],
}

impl RawAction<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn decode(&self) -> Result<Action> {
        Action::decode(self.bytes).map(|(action, _)| action)
    }
}

/// Walks an action array one record at a time.
///
/// Meant for arrays that already passed [`crate::validate_actions`]. Each
/// step still bounds-checks the declared length; a malformed record ends the
/// walk with a warning and the records already returned stay usable.
#[derive(Debug, Clone)]
pub struct ActionsIter<'a> {
    rest: &'a [u8],
}

/// Starts walking the action array in `bytes`.
pub fn actions(bytes: &[u8]) -> ActionsIter<'_> {
    ActionsIter { rest: bytes }
}

impl<'a> Iterator for ActionsIter<'a> {
    type Item = RawAction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let header = match ActionHeader::peek(self.rest) {
            Ok(header) => header,
            Err(_) => {
                warn!(left = self.rest.len(), "trailing bytes after action array");
                self.rest = &[];
                return None;
            }
        };
        let len = usize::from(header.len);
        if len < ACTION_SLOT || len > self.rest.len() {
            warn!(
                len,
                left = self.rest.len(),
                "action record length out of range"
            );
            self.rest = &[];
            return None;
        }
        let (record, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(RawAction {
            action_type: header.action_type,
            bytes: record,
        })
    }
}

impl std::iter::FusedIterator for ActionsIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_layout() {
        let bytes = encode_actions(&[Action::Output { port: 3, max_len: 0x80 }]);
        assert_eq!(
            bytes,
            vec![0, 0, 0, 16, 0, 0, 0, 3, 0, 0x80, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_set_queue_layout() {
        let bytes = encode_actions(&[Action::SetQueue { queue_id: 2 }]);
        assert_eq!(bytes, vec![0, 21, 0, 8, 0, 0, 0, 2]);
    }

    #[test]
    fn test_nicira_resubmit_is_16_bytes() {
        let action = Action::Experimenter {
            vendor_id: NX_VENDOR_ID,
            subtype: nx_subtype::RESUBMIT,
            payload: vec![0, 5, 0, 0, 0, 0],
        };
        let bytes = encode_actions(&[action.clone()]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_actions(&bytes).unwrap(), vec![action]);
    }

    #[test]
    fn test_decode_checks_length_before_payload() {
        // An output header claiming 8 bytes must not be read as an output.
        let bytes = [0, 0, 0, 8, 0, 0, 0, 1];
        assert_eq!(
            Action::decode(&bytes),
            Err(OfpError::BadAction(BadActionCode::BadLen))
        );
        // Truncated record.
        let bytes = [0, 0, 0, 16, 0, 0, 0, 1];
        assert_eq!(
            Action::decode(&bytes),
            Err(OfpError::BadAction(BadActionCode::BadLen))
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        let bytes = [0, 99, 0, 8, 0, 0, 0, 0];
        assert_eq!(
            Action::decode(&bytes),
            Err(OfpError::BadAction(BadActionCode::BadType))
        );
    }

    #[test]
    fn test_iter_visits_each_action_once() {
        let list = vec![
            Action::output(1),
            Action::SetQueue { queue_id: 4 },
            Action::output(2),
        ];
        let bytes = encode_actions(&list);
        let raw: Vec<RawAction<'_>> = actions(&bytes).collect();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.iter().map(RawAction::len).sum::<usize>(), bytes.len());
        let decoded: Vec<Action> = raw.iter().map(|r| r.decode().unwrap()).collect();
        assert_eq!(decoded, list);
    }

    #[test]
    fn test_iter_stops_at_malformed_tail() {
        let mut bytes = encode_actions(&[Action::output(1)]);
        bytes.extend_from_slice(&[0, 0, 0, 64, 0, 0, 0, 0]);
        let mut iter = actions(&bytes);
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
