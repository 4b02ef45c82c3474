//! Forwarding-plane core of the OpenFlow software switch.
//!
//! A [`Datapath`] owns the switch's ports and drives them from a single
//! poll loop ([`Datapath::run`]):
//!
//! - [`PortManager`]: numbered ports, the LOCAL management port, per-port
//!   traffic-class queues, transmission and controller notifications
//! - [`Packet`]: a frame in flight with its lazily parsed header view
//! - [`AmacTable`]: address chains learned from AMARU announcements, used
//!   to pick a new home for the LOCAL port when its link fails
//!
//! Devices, controller connections, the flow-table pipeline and the
//! packet-buffer pool are collaborators reached through the [`Netdev`],
//! [`ControllerSink`], [`Pipeline`] and [`BufferPool`] traits.
//!
//! # Example
//!
//! ```ignore
//! use ofswitch_datapath::{Datapath, DatapathConfig};
//!
//! let config = DatapathConfig::from_toml_str(&text)?;
//! let mut dp = Datapath::new(config, devices, sink, pipeline, buffers)?;
//! dp.ports_mut().add_port("eth1")?;
//! loop {
//!     dp.run();
//! }
//! ```

mod amac;
mod amac_log;
pub mod amaru;
mod buffers;
mod config;
mod controller;
mod datapath;
mod error;
mod failover;
pub mod frame;
mod hw;
mod logging;
mod netdev;
mod packet;
mod pipeline;
mod port;
mod ports;
mod requests;
mod topology;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use amac::{AmacEntry, AmacTable, Rejection};
pub use amac_log::AmacLog;
pub use amaru::{AmaruHeader, MigrationNotice};
pub use buffers::BufferPool;
pub use config::{AmacLimits, AmacLogConfig, DatapathConfig, MAX_PORTS};
pub use controller::{
    ControllerMessage, ControllerSink, PacketIn, PacketInReason, PortMod, PortReason, QueueMod,
    Role, Sender,
};
pub use datapath::{Datapath, LocalPortState};
pub use error::{DatapathError, Result};
pub use frame::ParsedView;
pub use hw::{hw_channel, HwFrame, HwFrameSender, HwReceiveQueue};
pub use logging::{init_logging, RateLimiter};
pub use netdev::{Netdev, NetdevFeatures, NetdevFlags, NetdevProvider};
pub use packet::{Disposal, Packet};
pub use pipeline::Pipeline;
pub use port::{
    Port, PortDesc, PortStats, PortStatsEntry, Queue, QueueConfig, QueueStats, QueueStatsEntry,
};
pub use ports::{LinkChange, PortManager, Transmit, NETDEV_MAX_QUEUES};
pub use requests::OFPQ_ALL;
