//! Port and queue records.

use crate::netdev::{Netdev, NetdevFeatures};
use ofswitch_types::{port_speed, MacAddress, PortConfig, PortState};
use std::fmt;
use std::time::{Duration, Instant};

/// Port counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStats {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

/// One record of a port stats reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatsEntry {
    pub port_no: u32,
    pub stats: PortStats,
    pub duration_sec: u32,
    pub duration_nsec: u32,
}

/// Port description as reported to controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: MacAddress,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub features: NetdevFeatures,
    pub curr_speed: u32,
    pub max_speed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatsEntry {
    pub port_no: u32,
    pub queue_id: u32,
    pub stats: QueueStats,
    pub duration_sec: u32,
    pub duration_nsec: u32,
}

/// A queue and its minimum-rate property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub queue_id: u32,
    pub port_no: u32,
    pub min_rate: u16,
}

/// A traffic-class queue on a port.
#[derive(Debug, Clone)]
pub struct Queue {
    port_no: u32,
    queue_id: u32,
    class_id: u16,
    min_rate: u16,
    pub(crate) stats: QueueStats,
    created_at: Instant,
}

impl Queue {
    pub(crate) fn new(port_no: u32, queue_id: u32, class_id: u16, min_rate: u16) -> Self {
        Queue {
            port_no,
            queue_id,
            class_id,
            min_rate,
            stats: QueueStats::default(),
            created_at: Instant::now(),
        }
    }

    pub fn queue_id(&self) -> u32 {
        self.queue_id
    }

    /// Device traffic class carrying this queue.
    pub fn class_id(&self) -> u16 {
        self.class_id
    }

    pub fn min_rate(&self) -> u16 {
        self.min_rate
    }

    pub(crate) fn set_min_rate(&mut self, min_rate: u16) {
        self.min_rate = min_rate;
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn config(&self) -> QueueConfig {
        QueueConfig {
            queue_id: self.queue_id,
            port_no: self.port_no,
            min_rate: self.min_rate,
        }
    }

    pub fn stats_entry(&self) -> QueueStatsEntry {
        let (duration_sec, duration_nsec) = split_duration(self.created_at.elapsed());
        QueueStatsEntry {
            port_no: self.port_no,
            queue_id: self.queue_id,
            stats: self.stats,
            duration_sec,
            duration_nsec,
        }
    }
}

/// A switch port bound to an open device.
pub struct Port {
    id: u32,
    name: String,
    netdev: Box<dyn Netdev>,
    hw_addr: MacAddress,
    config: PortConfig,
    state: PortState,
    features: NetdevFeatures,
    queues: Vec<Option<Queue>>,
    pub(crate) stats: PortStats,
    created_at: Instant,
    hardware: bool,
    saved_hw_addr: Option<MacAddress>,
}

impl Port {
    pub(crate) fn new(
        id: u32,
        netdev: Box<dyn Netdev>,
        max_queues: u16,
        hardware: bool,
        saved_hw_addr: Option<MacAddress>,
    ) -> Self {
        let mut queues = Vec::with_capacity(usize::from(max_queues));
        queues.resize_with(usize::from(max_queues), || None);
        Port {
            id,
            name: netdev.name().to_string(),
            hw_addr: netdev.hw_addr(),
            features: netdev.features(),
            netdev,
            config: PortConfig::empty(),
            state: PortState::LIVE,
            queues,
            stats: PortStats::default(),
            created_at: Instant::now(),
            hardware,
            saved_hw_addr,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hw_addr(&self) -> MacAddress {
        self.hw_addr
    }

    pub fn config(&self) -> PortConfig {
        self.config
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn stats(&self) -> PortStats {
        self.stats
    }

    /// Driven by the hardware receive path instead of software polling.
    pub fn is_hardware(&self) -> bool {
        self.hardware
    }

    /// Address the device had before it was given the local port address.
    pub(crate) fn saved_hw_addr(&self) -> Option<MacAddress> {
        self.saved_hw_addr
    }

    /// Link up and not administratively down.
    pub fn is_live(&self) -> bool {
        !self.state.contains(PortState::LINK_DOWN) && !self.config.contains(PortConfig::PORT_DOWN)
    }

    pub fn can_flood(&self) -> bool {
        self.is_live() && !self.config.contains(PortConfig::NO_FWD)
    }

    pub fn accepts_input(&self) -> bool {
        !self.config.contains(PortConfig::NO_RECV)
    }

    pub(crate) fn netdev(&self) -> &dyn Netdev {
        self.netdev.as_ref()
    }

    pub(crate) fn netdev_mut(&mut self) -> &mut dyn Netdev {
        self.netdev.as_mut()
    }

    /// Records the sampled link state; returns true on a transition.
    pub(crate) fn set_link_up(&mut self, up: bool) -> bool {
        let was_up = !self.state.contains(PortState::LINK_DOWN);
        if was_up == up {
            return false;
        }
        self.state.set(PortState::LINK_DOWN, !up);
        self.refresh_live();
        true
    }

    /// Merges `config` into the bits selected by `mask`.
    pub(crate) fn apply_config(&mut self, config: PortConfig, mask: PortConfig) {
        self.config = (self.config & !mask) | (config & mask);
        self.refresh_live();
    }

    fn refresh_live(&mut self) {
        let live = self.is_live();
        self.state.set(PortState::LIVE, live);
    }

    pub fn queue(&self, queue_id: u32) -> Option<&Queue> {
        self.queues
            .get(usize::try_from(queue_id).ok()?)
            .and_then(Option::as_ref)
    }

    pub(crate) fn queue_mut(&mut self, queue_id: u32) -> Option<&mut Queue> {
        self.queues
            .get_mut(usize::try_from(queue_id).ok()?)
            .and_then(Option::as_mut)
    }

    pub(crate) fn queue_slot(&mut self, queue_id: u32) -> Option<&mut Option<Queue>> {
        self.queues.get_mut(usize::try_from(queue_id).ok()?)
    }

    pub fn queues(&self) -> impl Iterator<Item = &Queue> {
        self.queues.iter().flatten()
    }

    pub fn num_queues(&self) -> usize {
        self.queues().count()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queues.len()
    }

    pub fn desc(&self) -> PortDesc {
        PortDesc {
            port_no: self.id,
            hw_addr: self.hw_addr,
            name: self.name.clone(),
            config: self.config,
            state: self.state,
            features: self.features,
            curr_speed: port_speed(self.features.current),
            max_speed: port_speed(self.features.supported),
        }
    }

    pub fn stats_entry(&self) -> PortStatsEntry {
        let (duration_sec, duration_nsec) = split_duration(self.created_at.elapsed());
        PortStatsEntry {
            port_no: self.id,
            stats: self.stats,
            duration_sec,
            duration_nsec,
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("hw_addr", &self.hw_addr)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("num_queues", &self.num_queues())
            .finish_non_exhaustive()
    }
}

fn split_duration(elapsed: Duration) -> (u32, u32) {
    (
        u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX),
        elapsed.subsec_nanos(),
    )
}
