//! AMARU address discovery.
//!
//! The root switch announces itself with a one-hop chain. Every other switch
//! admits announcements it has not seen into its AMAC table, extends the
//! chain with the egress port and floods the result downstream.

use crate::amac::AmacEntry;
use crate::amaru::AMAC_LEN;
use crate::datapath::Datapath;
use crate::packet::Packet;
use crate::ports::Transmit;
use ofswitch_types::port_no;
use std::time::Instant;
use tracing::{debug, instrument, warn};

impl Datapath {
    /// Starts discovery from the root switch.
    ///
    /// Returns the number of announcements sent.
    #[instrument(skip(self), fields(dp_id = self.id()))]
    pub fn announce_as_root(&mut self) -> usize {
        let Some(alias) = self.ports.local_alias() else {
            warn!("root switch has no local port alias, not announcing");
            return 0;
        };
        self.send_amaru(alias, 0, &[0u8; AMAC_LEN])
    }

    /// Floods an announcement one level below `level` out of every live
    /// port except `in_port` and LOCAL.
    ///
    /// On the root switch the local port's own device is skipped as well.
    pub fn send_amaru(&mut self, in_port: u32, level: u8, chain: &[u8; AMAC_LEN]) -> usize {
        let Some(next_level) = level.checked_add(1).filter(|&l| usize::from(l) <= AMAC_LEN) else {
            debug!(level, "address chain exhausted, not forwarding");
            return 0;
        };

        let local_name = self
            .config
            .is_root()
            .then(|| self.ports.local_port().map(|p| p.name().to_string()))
            .flatten();
        let targets: Vec<_> = self
            .ports
            .iter()
            .filter(|p| p.id() != port_no::LOCAL && p.id() != in_port && p.is_live())
            .filter(|p| local_name.as_deref() != Some(p.name()))
            .map(|p| (p.id(), p.hw_addr()))
            .collect();

        let mut sent = 0;
        for (out_port, hw_addr) in targets {
            let packet = match Packet::amaru(in_port, false, next_level, out_port, hw_addr, chain) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "cannot build announcement");
                    continue;
                }
            };
            if self.ports.output(packet.data(), out_port, 0) == Transmit::Sent {
                sent += 1;
            }
        }
        debug!(in_port, level = next_level, sent, "flooded announcement");
        self.log_sent(sent);
        sent
    }

    /// Handles an announcement received on `packet.in_port()`.
    pub(crate) fn handle_amaru(&mut self, mut packet: Packet) {
        let in_port = packet.in_port();
        let Some(header) = packet.parsed().amaru else {
            debug!(in_port, "truncated announcement");
            self.destroy_packet(packet);
            return;
        };

        match self.amacs.validate_in_switch(&header.chain, in_port) {
            Ok(()) => {
                let ttl = self.config.amac.entry_ttl();
                self.amacs.add(header.level, header.chain, in_port, Instant::now(), ttl);
                self.log_table();
                self.send_amaru(in_port, header.level, &header.chain);
            }
            Err(rejection) => {
                debug!(in_port, path = ?header.path(), ?rejection, "announcement not admitted");
            }
        }
        self.destroy_packet(packet);
    }

    /// Drops AMAC entries whose lifetime ended before `now`.
    pub fn age_amacs(&mut self, now: Instant) -> usize {
        let removed = self.amacs.remove_expired(now);
        if removed > 0 {
            debug!(removed, "expired AMAC entries");
            self.log_table();
        }
        removed
    }

    /// Drops every AMAC entry learned on `port`.
    pub fn forget_port_amacs(&mut self, port: u32) -> usize {
        let removed = self.amacs.remove_for_port(port);
        if removed > 0 {
            self.log_table();
        }
        removed
    }

    /// Active AMAC entries in discovery order.
    pub fn active_amacs(&self) -> impl Iterator<Item = &AmacEntry> {
        self.amacs.iter().filter(|e| e.active)
    }
}
