//! Port numbering and port bit sets.

use bitflags::bitflags;
use std::fmt;

/// Reserved OpenFlow 1.3 port numbers.
pub mod port_no {
    /// Highest number usable for a physical port.
    pub const MAX: u32 = 0xffff_ff00;
    /// Send the packet out the port it was received on.
    pub const IN_PORT: u32 = 0xffff_fff8;
    /// Submit the packet to the first flow table.
    pub const TABLE: u32 = 0xffff_fff9;
    /// Forward using the non-OpenFlow pipeline.
    pub const NORMAL: u32 = 0xffff_fffa;
    /// Flood along the spanning tree, excluding no-forward ports.
    pub const FLOOD: u32 = 0xffff_fffb;
    /// All ports except the ingress port.
    pub const ALL: u32 = 0xffff_fffc;
    /// Send to the controller.
    pub const CONTROLLER: u32 = 0xffff_fffd;
    /// The switch's management port.
    pub const LOCAL: u32 = 0xffff_fffe;
    /// Wildcard / no port.
    pub const ANY: u32 = 0xffff_ffff;

    /// Returns true for the logical ports an output action may always target.
    pub const fn is_output_reserved(port: u32) -> bool {
        matches!(port, IN_PORT | NORMAL | FLOOD | ALL | CONTROLLER | LOCAL)
    }
}

bitflags! {
    /// Administrative port configuration (`ofp_port_config`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortConfig: u32 {
        const PORT_DOWN = 1 << 0;
        const NO_RECV = 1 << 2;
        const NO_FWD = 1 << 5;
        const NO_PACKET_IN = 1 << 6;
    }
}

bitflags! {
    /// Operational port state (`ofp_port_state`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortState: u32 {
        const LINK_DOWN = 1 << 0;
        const BLOCKED = 1 << 1;
        const LIVE = 1 << 2;
    }
}

bitflags! {
    /// Port feature bits (`ofp_port_features`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortFeatures: u32 {
        const RATE_10MB_HD = 1 << 0;
        const RATE_10MB_FD = 1 << 1;
        const RATE_100MB_HD = 1 << 2;
        const RATE_100MB_FD = 1 << 3;
        const RATE_1GB_HD = 1 << 4;
        const RATE_1GB_FD = 1 << 5;
        const RATE_10GB_FD = 1 << 6;
        const RATE_40GB_FD = 1 << 7;
        const RATE_100GB_FD = 1 << 8;
        const RATE_1TB_FD = 1 << 9;
        const OTHER = 1 << 10;
        const COPPER = 1 << 11;
        const FIBER = 1 << 12;
        const AUTONEG = 1 << 13;
        const PAUSE = 1 << 14;
        const PAUSE_ASYM = 1 << 15;
    }
}

/// Returns the highest speed advertised in `features`, in kbps.
pub fn port_speed(features: PortFeatures) -> u32 {
    const SPEEDS: [(PortFeatures, u32); 10] = [
        (PortFeatures::RATE_1TB_FD, 1024 * 1024 * 1024),
        (PortFeatures::RATE_100GB_FD, 100 * 1024 * 1024),
        (PortFeatures::RATE_40GB_FD, 40 * 1024 * 1024),
        (PortFeatures::RATE_10GB_FD, 10 * 1024 * 1024),
        (PortFeatures::RATE_1GB_FD, 1024 * 1024),
        (PortFeatures::RATE_1GB_HD, 1024 * 1024),
        (PortFeatures::RATE_100MB_FD, 100 * 1024),
        (PortFeatures::RATE_100MB_HD, 100 * 1024),
        (PortFeatures::RATE_10MB_FD, 10 * 1024),
        (PortFeatures::RATE_10MB_HD, 10 * 1024),
    ];

    SPEEDS
        .iter()
        .find(|(bit, _)| features.contains(*bit))
        .map_or(0, |(_, kbps)| *kbps)
}

/// Link state as reported by a network device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    /// Returns true if the link is up.
    pub const fn is_up(&self) -> bool {
        matches!(self, LinkState::Up)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Up => write!(f, "up"),
            LinkState::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_port_speed_picks_highest() {
        let features = PortFeatures::RATE_1GB_FD | PortFeatures::RATE_10GB_FD | PortFeatures::COPPER;
        assert_eq!(port_speed(features), 10 * 1024 * 1024);
        assert_eq!(port_speed(PortFeatures::RATE_10MB_HD), 10 * 1024);
        assert_eq!(port_speed(PortFeatures::COPPER), 0);
    }

    #[test]
    fn test_reserved_output_ports() {
        assert!(port_no::is_output_reserved(port_no::FLOOD));
        assert!(port_no::is_output_reserved(port_no::LOCAL));
        assert!(!port_no::is_output_reserved(port_no::TABLE));
        assert!(!port_no::is_output_reserved(port_no::ANY));
        assert!(!port_no::is_output_reserved(7));
    }

    #[test]
    fn test_config_bits_match_wire_values() {
        assert_eq!(PortConfig::NO_FWD.bits(), 0x20);
        assert_eq!(PortState::LIVE.bits(), 0x4);
        assert_eq!(PortFeatures::PAUSE_ASYM.bits(), 0x8000);
    }

    #[test]
    fn test_link_state_display() {
        assert!(LinkState::Up.is_up());
        assert_eq!(LinkState::Up.to_string(), "up");
        assert_eq!(LinkState::Down.to_string(), "down");
    }
}
