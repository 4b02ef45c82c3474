//! Flow-mod messages and their builders.

use crate::action::Action;
use crate::error::{BadRequestCode, FlowModFailedCode, OfpError, Result};
use crate::header::{MessageType, HEADER_LEN};
use crate::instruction::{decode_instructions, encode_instructions, Instruction};
use crate::message::{Message, OfpMessage};
use crate::oxm::{Flow, Match};
use byteorder::{BigEndian, ByteOrder};
use ofswitch_types::port_no;
use tracing::warn;

/// Size of `ofp_flow_mod` up to the match.
pub const FLOW_MOD_FIXED_LEN: usize = 48;

/// `hard_timeout` value for flows that never expire.
pub const OFP_FLOW_PERMANENT: u16 = 0;

/// `buffer_id` meaning "no buffered packet".
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// Wildcard group.
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// `ofp_flow_mod_command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

impl FlowModCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Add),
            1 => Some(Self::Modify),
            2 => Some(Self::ModifyStrict),
            3 => Some(Self::Delete),
            4 => Some(Self::DeleteStrict),
            _ => None,
        }
    }
}

/// A flow-mod in host byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub matches: Match,
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// A flow-mod matching `flow` with zero cookie, no timeouts and
    /// `out_port`/`out_group` set to ANY.
    pub fn new(command: FlowModCommand, table_id: u8, flow: &Flow) -> Self {
        FlowMod {
            cookie: 0,
            cookie_mask: 0,
            table_id,
            command,
            idle_timeout: 0,
            hard_timeout: OFP_FLOW_PERMANENT,
            priority: 0,
            buffer_id: NO_BUFFER,
            out_port: port_no::ANY,
            out_group: OFPG_ANY,
            flags: 0,
            matches: Match::from_flow(flow),
            instructions: Vec::new(),
        }
    }

    /// The flow tuple recovered from the match.
    pub fn flow(&self) -> Flow {
        self.matches.to_flow()
    }

    /// Serializes the flow-mod.
    ///
    /// The fixed part and the match are laid out first, rounded up to 8
    /// bytes; instructions are appended and the header length rewritten.
    pub fn encode(&self, xid: Option<u32>) -> Result<Message> {
        let base = FLOW_MOD_FIXED_LEN + self.matches.padded_len();
        let mut msg = Message::new(MessageType::FlowMod, base, xid)?;

        let body = msg.body_mut();
        let at = |offset: usize| offset - HEADER_LEN;
        BigEndian::write_u64(&mut body[at(8)..at(16)], self.cookie);
        BigEndian::write_u64(&mut body[at(16)..at(24)], self.cookie_mask);
        body[at(24)] = self.table_id;
        body[at(25)] = self.command as u8;
        BigEndian::write_u16(&mut body[at(26)..at(28)], self.idle_timeout);
        BigEndian::write_u16(&mut body[at(28)..at(30)], self.hard_timeout);
        BigEndian::write_u16(&mut body[at(30)..at(32)], self.priority);
        BigEndian::write_u32(&mut body[at(32)..at(36)], self.buffer_id);
        BigEndian::write_u32(&mut body[at(36)..at(40)], self.out_port);
        BigEndian::write_u32(&mut body[at(40)..at(44)], self.out_group);
        BigEndian::write_u16(&mut body[at(44)..at(46)], self.flags);
        body[at(FLOW_MOD_FIXED_LEN)..].copy_from_slice(&self.matches.encode());

        msg.put(&encode_instructions(&self.instructions));
        msg.update_length()?;
        Ok(msg)
    }

    /// Decodes a complete flow-mod message.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FLOW_MOD_FIXED_LEN + 8 {
            return Err(OfpError::bad_len());
        }
        let command = FlowModCommand::from_u8(bytes[25])
            .ok_or(OfpError::FlowModFailed(FlowModFailedCode::BadCommand))?;
        let (matches, match_len) = Match::decode(&bytes[FLOW_MOD_FIXED_LEN..])?;
        let instructions = decode_instructions(&bytes[FLOW_MOD_FIXED_LEN + match_len..])?;

        Ok(FlowMod {
            cookie: BigEndian::read_u64(&bytes[8..16]),
            cookie_mask: BigEndian::read_u64(&bytes[16..24]),
            table_id: bytes[24],
            command,
            idle_timeout: BigEndian::read_u16(&bytes[26..28]),
            hard_timeout: BigEndian::read_u16(&bytes[28..30]),
            priority: BigEndian::read_u16(&bytes[30..32]),
            buffer_id: BigEndian::read_u32(&bytes[32..36]),
            out_port: BigEndian::read_u32(&bytes[36..40]),
            out_group: BigEndian::read_u32(&bytes[40..44]),
            flags: BigEndian::read_u16(&bytes[44..46]),
            matches,
            instructions,
        })
    }
}

/// Runs the produced message back through the generic unpacker so a
/// malformed flow-mod never leaves the builder.
fn self_checked(msg: Message) -> Result<Message> {
    match msg.unpack() {
        Ok(OfpMessage::FlowMod(_)) => Ok(msg),
        Ok(_) => Err(OfpError::BadRequest(BadRequestCode::BadType)),
        Err(err) => {
            warn!(%err, len = msg.len(), "built flow mod does not unpack");
            Err(err)
        }
    }
}

/// Builds a flow-mod for `flow` carrying `instructions`.
pub fn build_flow_mod(
    command: FlowModCommand,
    table_id: u8,
    flow: &Flow,
    instructions: &[Instruction],
) -> Result<Message> {
    let mut fm = FlowMod::new(command, table_id, flow);
    fm.instructions = instructions.to_vec();
    self_checked(fm.encode(None)?)
}

/// Builds an ADD flow-mod. An empty action list installs a drop flow with no
/// instruction; otherwise the actions are wrapped in one apply-actions
/// instruction.
pub fn build_add_flow(
    flow: &Flow,
    buffer_id: u32,
    table_id: u8,
    idle_timeout: u16,
    priority: u16,
    actions: &[Action],
) -> Result<Message> {
    let mut fm = FlowMod::new(FlowModCommand::Add, table_id, flow);
    fm.idle_timeout = idle_timeout;
    fm.hard_timeout = OFP_FLOW_PERMANENT;
    fm.buffer_id = buffer_id;
    fm.priority = priority;
    if !actions.is_empty() {
        fm.instructions = vec![Instruction::ApplyActions(actions.to_vec())];
    }
    self_checked(fm.encode(None)?)
}

/// ADD flow forwarding to `out_port`, or dropping when `out_port` is 0.
pub fn build_add_simple_flow(
    flow: &Flow,
    buffer_id: u32,
    out_port: u32,
    idle_timeout: u16,
    priority: u16,
) -> Result<Message> {
    let actions: Vec<Action> = if out_port != 0 {
        vec![Action::output(out_port)]
    } else {
        Vec::new()
    };
    build_add_flow(flow, buffer_id, 0, idle_timeout, priority, &actions)
}

/// DELETE flow-mod for `flow` in `table_id`, regardless of output port.
pub fn build_delete_flow(flow: &Flow, table_id: u8) -> Result<Message> {
    let mut fm = FlowMod::new(FlowModCommand::Delete, table_id, flow);
    fm.out_port = port_no::ANY;
    self_checked(fm.encode(None)?)
}

/// MODIFY flow-mod pointing an in-band management flow at a new local
/// port, issued after the local port moved.
pub fn build_modify_in_band_flow(
    flow: &Flow,
    buffer_id: u32,
    table_id: u8,
    priority: u16,
    new_local_port: u32,
) -> Result<Message> {
    let mut fm = FlowMod::new(FlowModCommand::Modify, table_id, flow);
    fm.priority = priority;
    fm.buffer_id = buffer_id;
    fm.instructions = vec![Instruction::ApplyActions(vec![Action::output(new_local_port)])];
    self_checked(fm.encode(None)?)
}
