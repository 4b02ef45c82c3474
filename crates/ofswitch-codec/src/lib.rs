//! OpenFlow 1.3 message codec and validator.
//!
//! This crate builds the messages the switch sends to its controller and
//! validates the ones it receives:
//!
//! - [`Message`]: a serialized message with its 8-byte [`Header`]
//! - [`build_flow_mod`] and friends: flow-mod construction with an OXM
//!   [`Match`] built from a [`Flow`] tuple, self-checked through [`unpack`]
//! - [`build_packet_out`], [`build_echo_request`], [`build_echo_reply`],
//!   [`build_port_desc_request`], [`build_error`]
//! - [`validate_actions`], [`check_packet_out`], [`check_message`]: the
//!   validators applied to every peer-supplied message
//! - [`actions`] and [`flow_stats`]: lazy record iterators over flat buffers
//!
//! All integers on the wire are big-endian; every type here holds host
//! order values and converts at the encode/decode boundary.

mod action;
mod control;
mod error;
mod flow_mod;
mod header;
mod instruction;
mod message;
mod oxm;
mod packet_out;
mod stats;
mod validate;

pub use action::{
    action_type, actions, decode_actions, encode_actions, nx_subtype, Action, ActionHeader,
    ActionsIter, RawAction, ACTION_SLOT, NX_VENDOR_ID, OFPCML_NO_BUFFER, OUTPUT_LEN,
    SET_QUEUE_LEN,
};
pub use control::{
    build_echo_reply, build_echo_request, build_error, build_port_desc_request, ERROR_DATA_MAX,
};
pub use error::{
    error_type, BadActionCode, BadInstructionCode, BadMatchCode, BadRequestCode,
    FlowModFailedCode, OfpError, PortModFailedCode, QueueOpFailedCode, Result,
};
pub use flow_mod::{
    build_add_flow, build_add_simple_flow, build_delete_flow, build_flow_mod,
    build_modify_in_band_flow, FlowMod, FlowModCommand, FLOW_MOD_FIXED_LEN, NO_BUFFER,
    OFPG_ANY, OFP_FLOW_PERMANENT,
};
pub use header::{Header, MessageType, HEADER_LEN, OFP_VERSION};
pub use instruction::{
    decode_instructions, encode_instructions, instruction_type, Instruction,
    INSTRUCTION_HEADER_LEN,
};
pub use message::{
    unpack, ErrorMsg, Message, OfpMessage, MULTIPART_HEADER_LEN, MULTIPART_PORT_DESC,
};
pub use oxm::{Flow, Match, OxmField, ETH_TYPE_ARP, ETH_TYPE_IP, IP_PROTO_TCP};
pub use packet_out::{
    build_buffered_packet_out, build_packet_out, build_unbuffered_packet_out, PacketOut,
    PACKET_OUT_FIXED_LEN,
};
pub use stats::{flow_stats, FlowStats, FlowStatsIter, FLOW_STATS_MIN_LEN};
pub use validate::{
    check_instruction_array, check_message, check_message_array, check_packet_out,
    validate_actions,
};
