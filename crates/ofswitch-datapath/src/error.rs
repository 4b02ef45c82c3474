//! Error types for the datapath.
//!
//! Protocol errors travel as [`OfpError`] and are reported to the
//! originating controller. Everything else here is a resource or topology
//! failure that aborts the single operation that raised it.

use ofswitch_codec::OfpError;
use std::io;
use thiserror::Error;

/// Result type alias for datapath operations.
pub type Result<T> = std::result::Result<T, DatapathError>;

/// Errors raised by port, queue and topology operations.
#[derive(Debug, Error)]
pub enum DatapathError {
    /// A network device call failed.
    #[error("device '{device}': {op} failed: {source}")]
    Device {
        /// The operation that failed (e.g. "open", "set flags").
        op: &'static str,
        /// The device name.
        device: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Every port number below the configured maximum is in use.
    #[error("port table full (port numbers 1..{max_ports} in use)")]
    PortTableFull { max_ports: u32 },

    /// A local port is already registered.
    #[error("local port already exists on '{device}'")]
    LocalPortExists { device: String },

    #[error("no such port {port}")]
    NoSuchPort { port: u32 },

    /// No active AMAC entry names a port that could become the local port.
    #[error("no active AMAC entry to elect a new local port")]
    NoAmacCandidate,

    /// The failed local port carried no IPv4 address to carry over.
    #[error("local port had no IPv4 address")]
    NoLocalAddress,

    /// The device accepted the address call but does not report it.
    #[error("device '{device}' did not take address {address}")]
    AddressNotApplied {
        device: String,
        address: std::net::Ipv4Addr,
    },

    /// A control frame could not be built.
    #[error("invalid frame: {0}")]
    Frame(String),

    #[error(transparent)]
    Protocol(#[from] OfpError),

    /// Configuration validation error.
    #[error("invalid configuration for {field}: {message}")]
    Config { field: String, message: String },
}

impl DatapathError {
    pub(crate) fn device(op: &'static str, device: impl Into<String>, source: io::Error) -> Self {
        DatapathError::Device {
            op,
            device: device.into(),
            source,
        }
    }

    pub(crate) fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        DatapathError::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for failures that leave the switch without a local port until
    /// the next link transition retries the migration.
    pub fn is_topology_error(&self) -> bool {
        matches!(
            self,
            DatapathError::NoAmacCandidate
                | DatapathError::NoLocalAddress
                | DatapathError::AddressNotApplied { .. }
        )
    }
}
