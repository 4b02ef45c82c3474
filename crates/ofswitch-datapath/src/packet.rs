//! In-flight packets.
//!
//! A [`Packet`] owns its frame bytes from ingress (or synthesis) until it is
//! sent, buffered or dropped. The parsed header view is computed on first
//! use and thrown away whenever the bytes are handed out mutably.

use crate::amaru::{encode_announcement, AmaruHeader, MigrationNotice, AMAC_LEN};
use crate::buffers::BufferPool;
use crate::error::{DatapathError, Result};
use crate::frame::ParsedView;
use ofswitch_codec::{Action, NO_BUFFER, OFPG_ANY};
use ofswitch_types::{port_no, MacAddress};

/// What happened to a packet's bytes when it was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// A live buffer-pool entry still owns the bytes.
    Retained { buffer_id: u32 },
    Released,
}

#[derive(Debug)]
pub struct Packet {
    in_port: u32,
    buffer: Vec<u8>,
    action_set: Vec<Action>,
    packet_out: bool,
    pub out_port: u32,
    pub out_group: u32,
    pub out_queue: u32,
    pub out_port_max_len: u16,
    pub buffer_id: u32,
    pub table_id: u8,
    parsed: Option<ParsedView>,
}

impl Packet {
    /// Wraps a received or synthesized frame.
    pub fn new(in_port: u32, buffer: Vec<u8>, packet_out: bool) -> Self {
        Packet {
            in_port,
            buffer,
            action_set: Vec::new(),
            packet_out,
            out_port: port_no::ANY,
            out_group: OFPG_ANY,
            out_queue: 0,
            out_port_max_len: 0,
            buffer_id: NO_BUFFER,
            table_id: 0,
            parsed: None,
        }
    }

    /// Copy for one egress branch of a fan-out.
    ///
    /// Bytes and parsed view are copied. The copy starts with an empty action
    /// set, unset output fields and no buffer id.
    pub fn fork(&self) -> Packet {
        Packet {
            buffer: self.buffer.clone(),
            parsed: self.parsed,
            table_id: self.table_id,
            ..Packet::new(self.in_port, Vec::new(), self.packet_out)
        }
    }

    pub fn in_port(&self) -> u32 {
        self.in_port
    }

    pub fn is_packet_out(&self) -> bool {
        self.packet_out
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable frame bytes. Invalidates the parsed view.
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        self.parsed = None;
        &mut self.buffer
    }

    pub fn into_data(self) -> Vec<u8> {
        self.buffer
    }

    pub fn action_set(&self) -> &[Action] {
        &self.action_set
    }

    pub fn action_set_mut(&mut self) -> &mut Vec<Action> {
        &mut self.action_set
    }

    /// Parsed headers, computed on first call.
    pub fn parsed(&mut self) -> &ParsedView {
        let buffer = &self.buffer;
        self.parsed.get_or_insert_with(|| ParsedView::parse(buffer))
    }

    /// Whether the parsed view is current.
    pub fn is_parsed(&self) -> bool {
        self.parsed.is_some()
    }

    /// Ends the packet's life.
    ///
    /// A packet whose `buffer_id` names a live pool entry leaves its bytes
    /// to the pool. A dead entry is discarded and the bytes are freed.
    pub fn destroy(self, pool: &mut dyn BufferPool) -> Disposal {
        if self.buffer_id != NO_BUFFER {
            if pool.is_alive(self.buffer_id) {
                return Disposal::Retained {
                    buffer_id: self.buffer_id,
                };
            }
            pool.discard(self.buffer_id, false);
        }
        Disposal::Released
    }

    /// Builds an AMARU announcement leaving through `out_port`.
    ///
    /// Hop `level` of `chain` is set to `out_port`, which must fit in one
    /// byte; `src` is the egress port's address.
    pub fn amaru(
        in_port: u32,
        packet_out: bool,
        level: u8,
        out_port: u32,
        src: MacAddress,
        chain: &[u8; AMAC_LEN],
    ) -> Result<Packet> {
        let hop = usize::from(level);
        if hop == 0 || hop > AMAC_LEN {
            return Err(DatapathError::Frame(format!("AMARU level {} out of range", level)));
        }
        let hop_port = u8::try_from(out_port).map_err(|_| {
            DatapathError::Frame(format!("port {} does not fit an AMARU hop", out_port))
        })?;
        let mut header = AmaruHeader {
            level,
            chain: *chain,
        };
        header.chain[hop - 1] = hop_port;

        let mut packet = Packet::new(in_port, encode_announcement(src, &header), packet_out);
        let view = ParsedView::parse(&packet.buffer);
        packet.parsed = Some(view);
        Ok(packet)
    }

    /// Builds the notice announcing that the local port moved to `new_port`.
    pub fn migration_notice(notice: &MigrationNotice) -> Result<Packet> {
        Ok(Packet::new(notice.new_port, notice.encode()?, false))
    }
}
