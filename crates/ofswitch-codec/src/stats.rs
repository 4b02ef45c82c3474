//! Iteration over flow statistics replies.

use crate::error::Result;
use crate::header::{Header, MessageType};
use crate::message::MULTIPART_HEADER_LEN;
use crate::oxm::Match;
use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

/// Smallest `ofp_flow_stats` record, including an empty match.
pub const FLOW_STATS_MIN_LEN: usize = 56;

const FLOW_STATS_MATCH_OFFSET: usize = 48;

/// One `ofp_flow_stats` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStats<'a> {
    bytes: &'a [u8],
}

impl<'a> FlowStats<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn length(&self) -> u16 {
        BigEndian::read_u16(&self.bytes[0..2])
    }

    pub fn table_id(&self) -> u8 {
        self.bytes[2]
    }

    pub fn duration_sec(&self) -> u32 {
        BigEndian::read_u32(&self.bytes[4..8])
    }

    pub fn duration_nsec(&self) -> u32 {
        BigEndian::read_u32(&self.bytes[8..12])
    }

    pub fn priority(&self) -> u16 {
        BigEndian::read_u16(&self.bytes[12..14])
    }

    pub fn idle_timeout(&self) -> u16 {
        BigEndian::read_u16(&self.bytes[14..16])
    }

    pub fn hard_timeout(&self) -> u16 {
        BigEndian::read_u16(&self.bytes[16..18])
    }

    pub fn cookie(&self) -> u64 {
        BigEndian::read_u64(&self.bytes[24..32])
    }

    pub fn packet_count(&self) -> u64 {
        BigEndian::read_u64(&self.bytes[32..40])
    }

    pub fn byte_count(&self) -> u64 {
        BigEndian::read_u64(&self.bytes[40..48])
    }

    /// Decodes the record's match.
    pub fn matches(&self) -> Result<Match> {
        Match::decode(&self.bytes[FLOW_STATS_MATCH_OFFSET..]).map(|(m, _)| m)
    }
}

/// Walks the records of a flow statistics multipart reply.
///
/// A record shorter than [`FLOW_STATS_MIN_LEN`] or longer than the bytes
/// left ends the walk with a warning; earlier records remain valid.
#[derive(Debug, Clone)]
pub struct FlowStatsIter<'a> {
    rest: &'a [u8],
}

/// Starts iterating the flow statistics in `reply`, a complete multipart
/// reply message.
pub fn flow_stats(reply: &[u8]) -> FlowStatsIter<'_> {
    let body: &[u8] = match Header::parse(reply) {
        Ok(header)
            if header.msg_type == MessageType::MultipartReply as u8
                && usize::from(header.length) >= MULTIPART_HEADER_LEN
                && usize::from(header.length) <= reply.len() =>
        {
            &reply[MULTIPART_HEADER_LEN..usize::from(header.length)]
        }
        _ => {
            warn!(len = reply.len(), "not a well-formed multipart reply");
            &[]
        }
    };
    FlowStatsIter { rest: body }
}

impl<'a> Iterator for FlowStatsIter<'a> {
    type Item = FlowStats<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let left = self.rest.len();
        if left == 0 {
            return None;
        }
        if left < FLOW_STATS_MIN_LEN {
            warn!(left, "flow stats reply has leftover bytes");
            self.rest = &[];
            return None;
        }

        let length = usize::from(BigEndian::read_u16(&self.rest[0..2]));
        if length < FLOW_STATS_MIN_LEN {
            warn!(length, "flow stats record shorter than minimum");
            self.rest = &[];
            return None;
        }
        if length > left {
            warn!(length, left, "flow stats record claims more bytes than remain");
            self.rest = &[];
            return None;
        }

        let (record, rest) = self.rest.split_at(length);
        self.rest = rest;
        Some(FlowStats { bytes: record })
    }
}

impl std::iter::FusedIterator for FlowStatsIter<'_> {}
