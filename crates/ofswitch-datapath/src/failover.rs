//! LOCAL port failover.
//!
//! The management (LOCAL) port of a non-root switch shares the device of one
//! numbered port. When that port's link goes down the LOCAL port moves to
//! the ingress port of the first active AMAC entry, keeps its IPv4 address
//! and tells the controller where it went.

use crate::amaru::MigrationNotice;
use crate::controller::{ControllerMessage, PacketIn, PacketInReason};
use crate::datapath::{Datapath, LocalPortState};
use crate::error::{DatapathError, Result};
use crate::packet::Packet;
use crate::ports::LinkChange;
use ofswitch_codec::NO_BUFFER;
use ofswitch_types::port_no;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, instrument, warn};

const LOCAL_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

impl Datapath {
    /// Reacts to a link transition on `port`.
    pub(crate) fn on_link_change(&mut self, port: u32, change: LinkChange) {
        if port == port_no::LOCAL {
            return;
        }
        let was_orphaned = matches!(self.local_state, LocalPortState::Orphaned { .. });

        match change {
            LinkChange::Down => self.on_link_down(port),
            LinkChange::Up => {
                if self.amacs.set_port_active(port, true) > 0 {
                    self.log_table();
                }
            }
        }

        if let LocalPortState::Orphaned { address, old_port } = self.local_state {
            if was_orphaned {
                debug!(port, "retrying local port assignment");
                self.assign_local_port(address, old_port);
            }
        }
    }

    fn on_link_down(&mut self, port: u32) {
        let pending_here = self.local_state == LocalPortState::Pending
            && matches!(
                (self.ports.local_port(), self.ports.lookup(port)),
                (Some(local), Some(p)) if local.name() == p.name()
            );
        if pending_here {
            debug!(port, "new local port not up yet, ignoring link down");
            return;
        }

        if self.amacs.set_port_active(port, false) > 0 {
            self.log_table();
        }
        if self.ports.local_alias() == Some(port) && !self.config.is_root() {
            self.migrate_local_port(port);
        }
    }

    /// Moves the LOCAL port off the numbered port `old_port`.
    #[instrument(skip(self), fields(dp_id = self.id()))]
    pub fn migrate_local_port(&mut self, old_port: u32) {
        let address = self.ports.remove_local_port();
        info!(?address, "local port lost its link, migrating");
        self.assign_local_port(address, old_port);
    }

    fn assign_local_port(&mut self, address: Option<Ipv4Addr>, old_port: u32) {
        match self.configure_new_local_port(address, old_port) {
            Ok(new_port) => {
                info!(new_port, old_port, "local port migrated");
                self.local_state = LocalPortState::Pending;
            }
            Err(e) => {
                if e.is_topology_error() {
                    warn!(error = %e, "no replacement for local port yet");
                } else {
                    error!(error = %e, "local port migration failed");
                }
                self.local_state = LocalPortState::Orphaned { address, old_port };
            }
        }
    }

    /// Opens the LOCAL port on the ingress port of the first active AMAC and
    /// gives it `address`. Returns the new port's number.
    ///
    /// A failure after the port was opened removes it again.
    pub fn configure_new_local_port(&mut self, address: Option<Ipv4Addr>, old_port: u32) -> Result<u32> {
        let address = address.ok_or(DatapathError::NoLocalAddress)?;
        let new_port = self
            .amacs
            .first_active()
            .map(|e| e.ingress_port)
            .ok_or(DatapathError::NoAmacCandidate)?;
        let name = self
            .ports
            .lookup(new_port)
            .map(|p| p.name().to_string())
            .ok_or(DatapathError::NoSuchPort { port: new_port })?;

        self.ports.add_local_port(&name)?;
        if let Err(e) = self.ports.set_local_address(address, LOCAL_NETMASK) {
            self.ports.remove_local_port();
            return Err(e);
        }

        self.send_migration_notice(&MigrationNotice {
            new_port,
            name,
            address,
            old_port,
        })?;
        Ok(new_port)
    }

    /// Reports the move to the controller as a packet-in.
    pub fn send_migration_notice(&mut self, notice: &MigrationNotice) -> Result<()> {
        let packet = Packet::migration_notice(notice)?;
        let in_port = packet.in_port();
        let data = packet.into_data();
        self.ports.notify(ControllerMessage::PacketIn(PacketIn {
            buffer_id: NO_BUFFER,
            total_len: u16::try_from(data.len()).unwrap_or(u16::MAX),
            reason: PacketInReason::Action,
            table_id: 0,
            cookie: u64::MAX,
            in_port,
            data,
        }));
        Ok(())
    }
}
