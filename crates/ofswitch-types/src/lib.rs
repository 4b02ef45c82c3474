//! Common types for the OpenFlow software switch.
//!
//! This crate provides the primitives shared by the protocol codec and the
//! datapath:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`port_no`]: reserved OpenFlow port numbers
//! - [`PortConfig`], [`PortState`], [`PortFeatures`]: port bit sets
//! - [`LinkState`]: link state reported by a network device

mod mac;
mod port;

pub use mac::MacAddress;
pub use port::{port_no, port_speed, LinkState, PortConfig, PortFeatures, PortState};

/// Error converting raw bytes into a type of this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address: {0}")]
    InvalidMacAddress(String),
}
