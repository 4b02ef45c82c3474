//! Pipeline collaborator.

use crate::packet::Packet;
use crate::ports::PortManager;

/// Flow-table processing for received packets.
///
/// Implementations consume the packet and forward it through
/// [`PortManager::output`] or [`PortManager::output_all`].
pub trait Pipeline {
    fn process(&mut self, ports: &mut PortManager, packet: Packet);
}
