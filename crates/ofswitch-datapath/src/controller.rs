//! Messages exchanged with the controller connection layer.
//!
//! Requests arrive already decoded; replies and notifications leave through a
//! [`ControllerSink`], which owns serialization and fan-out to the attached
//! controllers.

use crate::port::{PortDesc, PortStatsEntry, QueueConfig, QueueStatsEntry};
use ofswitch_types::{MacAddress, PortConfig, PortFeatures};

/// Controller role negotiated on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Equal,
    Master,
    Slave,
}

/// The connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sender {
    pub xid: u32,
    pub role: Role,
}

/// Why a port-status notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortReason {
    Add = 0,
    Delete = 1,
    Modify = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketInReason {
    NoMatch = 0,
    Action = 1,
    InvalidTtl = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: PacketInReason,
    pub table_id: u8,
    pub cookie: u64,
    pub in_port: u32,
    pub data: Vec<u8>,
}

/// A message for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerMessage {
    PortStatus { reason: PortReason, desc: PortDesc },
    PacketIn(PacketIn),
    PortStatsReply(Vec<PortStatsEntry>),
    PortDescReply(Vec<PortDesc>),
    QueueStatsReply(Vec<QueueStatsEntry>),
    QueueGetConfigReply { port: u32, queues: Vec<QueueConfig> },
}

/// Delivers messages to controllers.
///
/// `sender` is the connection that triggered the message, or `None` for
/// asynchronous notifications that go to every controller.
pub trait ControllerSink {
    fn send(&mut self, dp_id: u64, message: ControllerMessage, sender: Option<&Sender>);
}

/// Port-mod request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMod {
    pub port_no: u32,
    pub hw_addr: MacAddress,
    pub config: PortConfig,
    pub mask: PortConfig,
    pub advertise: PortFeatures,
}

/// Queue add/modify/delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMod {
    pub port_no: u32,
    pub queue_id: u32,
    pub min_rate: u16,
}
