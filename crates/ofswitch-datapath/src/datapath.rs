//! The datapath: one switch instance and its poll loop.

use crate::amac::AmacTable;
use crate::amac_log::AmacLog;
use crate::amaru::ETH_TYPE_AMARU;
use crate::buffers::BufferPool;
use crate::config::DatapathConfig;
use crate::controller::ControllerSink;
use crate::error::Result;
use crate::frame::VLAN_ETH_HEADER_LEN;
use crate::hw::{hw_channel, HwFrame, HwFrameSender, HwReceiveQueue};
use crate::netdev::NetdevProvider;
use crate::packet::{Disposal, Packet};
use crate::pipeline::Pipeline;
use crate::ports::PortManager;
use ofswitch_types::{port_no, PortConfig};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

/// Progress of the LOCAL port through a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalPortState {
    /// The LOCAL port has carried traffic since it was assigned.
    Ready,
    /// Migrated; waiting for the first frame on the new LOCAL port.
    Pending,
    /// Migration failed; the switch has no LOCAL port until a later link
    /// transition retries.
    Orphaned {
        address: Option<Ipv4Addr>,
        old_port: u32,
    },
}

pub struct Datapath {
    pub(crate) config: DatapathConfig,
    pub(crate) ports: PortManager,
    pub(crate) amacs: AmacTable,
    pub(crate) local_state: LocalPortState,
    buffers: Box<dyn BufferPool>,
    pipeline: Box<dyn Pipeline>,
    hw_queue: Option<HwReceiveQueue>,
    pub(crate) amac_log: Option<AmacLog>,
}

impl Datapath {
    pub fn new(
        config: DatapathConfig,
        devices: Box<dyn NetdevProvider>,
        sink: Box<dyn ControllerSink>,
        pipeline: Box<dyn Pipeline>,
        buffers: Box<dyn BufferPool>,
    ) -> Result<Self> {
        config.validate()?;
        let ports = PortManager::new(
            config.datapath_id,
            config.max_ports,
            config.max_queues,
            devices,
            sink,
        );
        let amac_log = config
            .amac_log
            .as_ref()
            .map(|log| AmacLog::new(log, config.datapath_id));
        info!(
            dp_id = config.datapath_id,
            root = config.is_root(),
            "datapath created"
        );
        Ok(Datapath {
            amacs: AmacTable::new(config.amac.clone()),
            config,
            ports,
            local_state: LocalPortState::Ready,
            buffers,
            pipeline,
            hw_queue: None,
            amac_log,
        })
    }

    pub fn id(&self) -> u64 {
        self.config.datapath_id
    }

    pub fn config(&self) -> &DatapathConfig {
        &self.config
    }

    pub fn ports(&self) -> &PortManager {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut PortManager {
        &mut self.ports
    }

    pub fn amacs(&self) -> &AmacTable {
        &self.amacs
    }

    pub fn local_state(&self) -> LocalPortState {
        self.local_state
    }

    /// True once the current LOCAL port has received a frame.
    pub fn local_port_ok(&self) -> bool {
        self.local_state == LocalPortState::Ready
    }

    /// Creates the hardware receive queue and returns its producer half.
    pub fn attach_hw_queue(&mut self) -> HwFrameSender {
        let (tx, rx) = hw_channel(self.config.hw_queue_depth);
        self.hw_queue = Some(rx);
        tx
    }

    /// One poll iteration.
    ///
    /// Drains the hardware queue, then for every port samples the link and
    /// receives at most one frame.
    pub fn run(&mut self) {
        self.drain_hw_queue();

        let max_len = VLAN_ETH_HEADER_LEN + self.ports.max_mtu();
        for id in self.ports.port_ids() {
            if let Some(change) = self.ports.sample_link(id) {
                self.on_link_change(id, change);
            }
            if id == port_no::LOCAL {
                continue;
            }
            let Some(frame) = self.ports.receive(id, max_len) else {
                continue;
            };
            self.note_local_rx(id);
            self.process_frame(id, frame);
        }
    }

    fn drain_hw_queue(&mut self) {
        let frames: Vec<HwFrame> = match self.hw_queue.as_mut() {
            Some(queue) => std::iter::from_fn(|| queue.try_next()).collect(),
            None => return,
        };
        for frame in frames {
            if !self.ports.account_rx(frame.port_no, frame.data.len()) {
                debug!(port = frame.port_no, "hardware frame for unknown port");
                continue;
            }
            self.process_frame(frame.port_no, frame.data);
        }
    }

    /// Marks a pending LOCAL port ready after its first received frame.
    fn note_local_rx(&mut self, id: u32) {
        if self.local_state != LocalPortState::Pending {
            return;
        }
        let (Some(local), Some(port)) = (self.ports.local_port(), self.ports.lookup(id)) else {
            return;
        };
        if local.name() == port.name() && local.netdev().link_state().is_up() {
            info!(device = local.name(), "new local port is operational");
            self.local_state = LocalPortState::Ready;
        }
    }

    fn process_frame(&mut self, in_port: u32, frame: Vec<u8>) {
        let Some(port) = self.ports.lookup(in_port) else {
            return;
        };
        if !port.accepts_input() || port.config().contains(PortConfig::PORT_DOWN) {
            self.ports.account_rx_drop(in_port);
            return;
        }

        let mut packet = Packet::new(in_port, frame, false);
        if packet.parsed().ethertype() == Some(ETH_TYPE_AMARU) {
            self.handle_amaru(packet);
        } else {
            self.pipeline.process(&mut self.ports, packet);
        }
    }

    /// Destroys a packet the datapath itself consumed.
    pub fn destroy_packet(&mut self, packet: Packet) -> Disposal {
        packet.destroy(self.buffers.as_mut())
    }

    pub(crate) fn log_table(&mut self) {
        debug!(entries = self.amacs.len(), "AMAC table\n{}", self.amacs.dump());
        if let Some(log) = self.amac_log.as_mut() {
            if let Err(e) = log.record_table(&self.amacs) {
                warn!(error = %e, "cannot write AMAC log");
            }
        }
    }

    pub(crate) fn log_sent(&mut self, sent: usize) {
        if let Some(log) = self.amac_log.as_mut() {
            if let Err(e) = log.record_sent(sent as u64) {
                warn!(error = %e, "cannot write AMARU packet counter");
            }
        }
    }
}
