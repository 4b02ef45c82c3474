//! Structural and semantic validation of peer-supplied messages.
//!
//! Every function here is pure: it reads the buffer it is given and returns
//! either success or the protocol error to report. Nothing is decoded past a
//! length that has not been checked first.

use crate::action::{
    action_type, actions, nx_subtype, ActionHeader, ACTION_SLOT, EXPERIMENTER_HEADER_LEN,
    NICIRA_HEADER_LEN, NX_VENDOR_ID, OUTPUT_LEN, SET_QUEUE_LEN,
};
use crate::error::{BadActionCode, BadInstructionCode, BadRequestCode, OfpError, Result};
use crate::header::{Header, MessageType};
use crate::packet_out::PACKET_OUT_FIXED_LEN;
use byteorder::{BigEndian, ByteOrder};
use ofswitch_types::port_no;
use tracing::debug;

/// Parses the header and checks that the declared length fits the buffer.
fn framed(msg: &[u8]) -> Result<Header> {
    let header = Header::parse(msg)?;
    if usize::from(header.length) > msg.len() {
        return Err(OfpError::bad_len());
    }
    Ok(header)
}

/// Checks that `msg` is of type `want_type` and exactly `want_size` bytes.
pub fn check_message(msg: &[u8], want_type: MessageType, want_size: usize) -> Result<()> {
    let header = framed(msg)?;
    if header.msg_type != want_type as u8 {
        debug!(
            got = header.msg_type,
            want = %want_type,
            "received bad message type"
        );
        return Err(OfpError::BadRequest(BadRequestCode::BadType));
    }
    let got = usize::from(header.length);
    if got != want_size {
        debug!(got, want = want_size, "received {} message of wrong length", want_type);
        return Err(OfpError::bad_len());
    }
    Ok(())
}

/// Checks a message made of a `min_size` fixed part followed by an array of
/// `elt_size`-byte elements. Returns the element count.
pub fn check_message_array(
    msg: &[u8],
    want_type: MessageType,
    min_size: usize,
    elt_size: usize,
) -> Result<usize> {
    let header = framed(msg)?;
    if header.msg_type != want_type as u8 {
        return Err(OfpError::BadRequest(BadRequestCode::BadType));
    }
    array_count(usize::from(header.length), min_size, elt_size)
}

/// Same contract as [`check_message_array`], keyed on an instruction's type
/// and length instead of a message header.
pub fn check_instruction_array(
    instruction: &[u8],
    want_type: u16,
    min_size: usize,
    elt_size: usize,
) -> Result<usize> {
    if instruction.len() < 4 {
        return Err(OfpError::bad_len());
    }
    let kind = BigEndian::read_u16(&instruction[0..2]);
    let len = usize::from(BigEndian::read_u16(&instruction[2..4]));
    if kind != want_type {
        return Err(OfpError::BadInstruction(BadInstructionCode::UnsupInst));
    }
    if len > instruction.len() {
        return Err(OfpError::bad_len());
    }
    array_count(len, min_size, elt_size)
}

fn array_count(got: usize, min_size: usize, elt_size: usize) -> Result<usize> {
    if got < min_size {
        debug!(got, min_size, "message shorter than its fixed part");
        return Err(OfpError::bad_len());
    }
    let extra = got - min_size;
    match extra.checked_rem(elt_size) {
        Some(0) => Ok(extra / elt_size),
        _ => {
            debug!(extra, elt_size, "trailing array is not a whole number of elements");
            Err(OfpError::bad_len())
        }
    }
}

fn check_output_port(port: u32, max_ports: u32, table_allowed: bool) -> Result<()> {
    if port_no::is_output_reserved(port) {
        return Ok(());
    }
    if port == port_no::TABLE {
        return if table_allowed {
            Ok(())
        } else {
            Err(OfpError::BadAction(BadActionCode::BadOutPort))
        };
    }
    if port < max_ports {
        return Ok(());
    }
    debug!(port, max_ports, "unknown output port");
    Err(OfpError::BadAction(BadActionCode::BadOutPort))
}

type ExperimenterCheck = fn(&[u8]) -> Result<()>;

/// Sub-validator for experimenter actions from `vendor_id`.
fn experimenter_check(vendor_id: u32) -> Option<ExperimenterCheck> {
    match vendor_id {
        NX_VENDOR_ID => Some(check_nicira_action),
        _ => None,
    }
}

fn check_nicira_action(action: &[u8]) -> Result<()> {
    if action.len() < NICIRA_HEADER_LEN {
        return Err(OfpError::BadAction(BadActionCode::BadLen));
    }
    match BigEndian::read_u16(&action[8..10]) {
        nx_subtype::RESUBMIT | nx_subtype::SET_TUNNEL => {
            if action.len() == NICIRA_HEADER_LEN {
                Ok(())
            } else {
                Err(OfpError::BadAction(BadActionCode::BadLen))
            }
        }
        _ => Err(OfpError::BadAction(BadActionCode::BadExperimenter)),
    }
}

/// Type-checks one action whose length already passed the framing checks.
fn check_action(
    header: ActionHeader,
    action: &[u8],
    max_ports: u32,
    is_packet_out: bool,
) -> Result<()> {
    let len = action.len();
    match header.action_type {
        action_type::OUTPUT => {
            if len != OUTPUT_LEN {
                return Err(OfpError::BadAction(BadActionCode::BadLen));
            }
            let port = BigEndian::read_u32(&action[4..8]);
            check_output_port(port, max_ports, !is_packet_out)
        }
        action_type::SET_QUEUE => {
            if len != SET_QUEUE_LEN {
                return Err(OfpError::BadAction(BadActionCode::BadLen));
            }
            Ok(())
        }
        action_type::EXPERIMENTER => {
            debug_assert!(len >= EXPERIMENTER_HEADER_LEN);
            let vendor_id = BigEndian::read_u32(&action[4..8]);
            match experimenter_check(vendor_id) {
                Some(check) => check(action),
                None => Err(OfpError::BadAction(BadActionCode::BadExperimenter)),
            }
        }
        other => {
            debug!(action_type = other, "unknown action type");
            Err(OfpError::BadAction(BadActionCode::BadType))
        }
    }
}

/// Validates an action array received from a peer.
///
/// Each record consumes `len / 8` slots. A zero length, a length that is
/// not a multiple of 8, or a length claiming more slots than remain is
/// `BAD_ACTION/BAD_LEN`. Output ports must be reserved logical ports, TABLE
/// outside packet-out, or below `max_ports`.
pub fn validate_actions(actions: &[u8], max_ports: u32, is_packet_out: bool) -> Result<()> {
    if actions.len() % ACTION_SLOT != 0 {
        return Err(OfpError::BadAction(BadActionCode::BadLen));
    }

    let mut rest = actions;
    while !rest.is_empty() {
        let slots_left = rest.len() / ACTION_SLOT;
        let header = ActionHeader::peek(rest)?;
        let len = usize::from(header.len);

        if len == 0 {
            debug!("action has invalid length 0");
            return Err(OfpError::BadAction(BadActionCode::BadLen));
        }
        if len % ACTION_SLOT != 0 {
            debug!(len, "action length is not a multiple of 8");
            return Err(OfpError::BadAction(BadActionCode::BadLen));
        }
        if len / ACTION_SLOT > slots_left {
            debug!(
                slots = len / ACTION_SLOT,
                slots_left,
                "action claims more slots than remain"
            );
            return Err(OfpError::BadAction(BadActionCode::BadLen));
        }

        let (action, tail) = rest.split_at(len);
        check_action(header, action, max_ports, is_packet_out)?;
        rest = tail;
    }
    Ok(())
}

/// Validates a packet-out message.
///
/// Returns the number of actions and the frame that follows the action
/// array.
pub fn check_packet_out(msg: &[u8], max_ports: u32) -> Result<(usize, &[u8])> {
    check_message_array(msg, MessageType::PacketOut, PACKET_OUT_FIXED_LEN, 1)?;
    let declared = usize::from(BigEndian::read_u16(&msg[2..4]));
    let extra = declared - PACKET_OUT_FIXED_LEN;

    let actions_len = usize::from(BigEndian::read_u16(&msg[16..18]));
    if actions_len > extra {
        debug!(actions_len, extra, "packet-out claims more action bytes than present");
        return Err(OfpError::bad_len());
    }
    if actions_len % ACTION_SLOT != 0 {
        debug!(actions_len, "packet-out action length is not a multiple of 8");
        return Err(OfpError::bad_len());
    }

    let actions_end = PACKET_OUT_FIXED_LEN + actions_len;
    let action_bytes = &msg[PACKET_OUT_FIXED_LEN..actions_end];
    validate_actions(action_bytes, max_ports, true)?;

    Ok((actions(action_bytes).count(), &msg[actions_end..declared]))
}
