//! The AMAC table: address chains learned from AMARU announcements.
//!
//! Entries are kept in discovery order. They are appended, flagged active or
//! inactive as their ingress link comes and goes, and removed only by the
//! explicit aging entry points.

use crate::amaru::AMAC_LEN;
use crate::config::AmacLimits;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmacEntry {
    /// Number of significant bytes in `chain`.
    pub level: u8,
    pub chain: [u8; AMAC_LEN],
    pub ingress_port: u32,
    pub expires_at: Instant,
    /// True while the ingress port's link is up.
    pub active: bool,
}

impl AmacEntry {
    pub fn path(&self) -> &[u8] {
        &self.chain[..usize::from(self.level).min(AMAC_LEN)]
    }
}

/// Why an announcement was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TableFull,
    PortFull,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct AmacTable {
    entries: Vec<AmacEntry>,
    limits: AmacLimits,
}

impl AmacTable {
    pub fn new(limits: AmacLimits) -> Self {
        AmacTable {
            entries: Vec::new(),
            limits,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AmacEntry> {
        self.entries.iter()
    }

    pub fn count_for_port(&self, port: u32) -> usize {
        self.entries
            .iter()
            .filter(|e| e.ingress_port == port)
            .count()
    }

    /// Admission check for a chain heard on `ingress_port`.
    ///
    /// A zero limit is unlimited. Duplicates are detected on the first
    /// `min(max_compare_len, level)` bytes, where `level` is the stored
    /// entry's; a zero `max_compare_len` compares the whole level.
    pub fn validate_in_switch(&self, chain: &[u8; AMAC_LEN], ingress_port: u32) -> Result<(), Rejection> {
        let limits = &self.limits;
        if limits.max_entries != 0 && self.entries.len() >= limits.max_entries {
            return Err(Rejection::TableFull);
        }
        if limits.max_per_port != 0 && self.count_for_port(ingress_port) >= limits.max_per_port {
            return Err(Rejection::PortFull);
        }
        let duplicate = self.entries.iter().any(|entry| {
            let level = usize::from(entry.level).min(AMAC_LEN);
            let n = match limits.max_compare_len {
                0 => level,
                max => max.min(level),
            };
            chain[..n] == entry.chain[..n]
        });
        if duplicate {
            return Err(Rejection::Duplicate);
        }
        Ok(())
    }

    /// Appends an active entry expiring `ttl` after `now`.
    pub fn add(&mut self, level: u8, chain: [u8; AMAC_LEN], ingress_port: u32, now: Instant, ttl: Duration) {
        self.entries.push(AmacEntry {
            level,
            chain,
            ingress_port,
            expires_at: now + ttl,
            active: true,
        });
    }

    /// Flags every entry learned on `port`; returns how many changed.
    pub fn set_port_active(&mut self, port: u32, active: bool) -> usize {
        let mut changed = 0;
        for entry in self.entries.iter_mut().filter(|e| e.ingress_port == port) {
            if entry.active != active {
                entry.active = active;
                changed += 1;
            }
        }
        changed
    }

    /// First active entry in discovery order.
    pub fn first_active(&self) -> Option<&AmacEntry> {
        self.entries.iter().find(|e| e.active)
    }

    pub fn remove_for_port(&mut self, port: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.ingress_port != port);
        before - self.entries.len()
    }

    pub fn remove_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.expires_at > now);
        before - self.entries.len()
    }

    /// Human-readable listing, one entry per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let path: Vec<String> = entry.path().iter().map(u8::to_string).collect();
            let _ = writeln!(
                out,
                "{}: level={} amac={} port={} active={}",
                index,
                entry.level,
                path.join("."),
                entry.ingress_port,
                entry.active
            );
        }
        out
    }
}
