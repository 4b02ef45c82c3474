//! The port manager.
//!
//! Owns every port of one datapath: the numbered ports `1..max_ports` and the
//! optional LOCAL management port, which may alias the device of a numbered
//! port. Transmission, flooding and controller notifications about ports all
//! go through here.

use crate::controller::{ControllerMessage, ControllerSink, PortReason, Sender};
use crate::error::{DatapathError, Result};
use crate::logging::RateLimiter;
use crate::netdev::{NetdevFlags, NetdevProvider};
use crate::port::Port;
use ofswitch_types::{port_no, MacAddress, PortConfig};
use std::io;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, instrument, warn};

/// Largest number of traffic-class queues a device supports.
pub const NETDEV_MAX_QUEUES: u16 = 8;

/// Result of a single transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmit {
    Sent,
    Dropped,
}

/// A link state change seen while sampling a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Up,
    Down,
}

pub struct PortManager {
    dp_id: u64,
    max_ports: u32,
    max_queues: u16,
    devices: Box<dyn NetdevProvider>,
    sink: Box<dyn ControllerSink>,
    ports: Vec<Port>,
    local: Option<Port>,
    scratch: Vec<u8>,
    rx_errors: RateLimiter,
}

impl PortManager {
    pub fn new(
        dp_id: u64,
        max_ports: u32,
        max_queues: u16,
        devices: Box<dyn NetdevProvider>,
        sink: Box<dyn ControllerSink>,
    ) -> Self {
        PortManager {
            dp_id,
            max_ports,
            max_queues: max_queues.min(NETDEV_MAX_QUEUES),
            devices,
            sink,
            ports: Vec::new(),
            local: None,
            scratch: Vec::new(),
            rx_errors: RateLimiter::default(),
        }
    }

    pub fn dp_id(&self) -> u64 {
        self.dp_id
    }

    pub fn max_ports(&self) -> u32 {
        self.max_ports
    }

    /// Number of numbered ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Opens `name` and registers it under the next free port number.
    #[instrument(skip(self), fields(dp_id = self.dp_id))]
    pub fn add_port(&mut self, name: &str) -> Result<u32> {
        self.register(name, false)
    }

    /// Registers a port whose frames arrive through the hardware receive
    /// queue rather than device polling.
    #[instrument(skip(self), fields(dp_id = self.dp_id))]
    pub fn add_hw_port(&mut self, name: &str) -> Result<u32> {
        self.register(name, true)
    }

    fn register(&mut self, name: &str, hardware: bool) -> Result<u32> {
        let id = u32::try_from(self.ports.len() + 1).unwrap_or(u32::MAX);
        if id >= self.max_ports {
            error!(device = name, max_ports = self.max_ports, "port table full");
            return Err(DatapathError::PortTableFull {
                max_ports: self.max_ports,
            });
        }

        let port = self.open_port(id, name, None, self.max_queues, hardware)?;
        info!(port = id, device = name, hw_addr = %port.hw_addr(), "added port");
        let desc = port.desc();
        self.ports.push(port);
        self.notify(ControllerMessage::PortStatus {
            reason: PortReason::Add,
            desc,
        });
        Ok(id)
    }

    /// Opens `name` as the LOCAL port, with its address derived from the
    /// datapath id.
    #[instrument(skip(self), fields(dp_id = self.dp_id))]
    pub fn add_local_port(&mut self, name: &str) -> Result<()> {
        if let Some(local) = &self.local {
            return Err(DatapathError::LocalPortExists {
                device: local.name().to_string(),
            });
        }

        let mac = MacAddress::from_u64(self.dp_id);
        let mut port = self.open_port(port_no::LOCAL, name, Some(mac), 0, false)?;
        port.apply_config(PortConfig::NO_FWD, PortConfig::NO_FWD);
        info!(device = name, hw_addr = %port.hw_addr(), "added local port");
        let desc = port.desc();
        self.local = Some(port);
        self.notify(ControllerMessage::PortStatus {
            reason: PortReason::Add,
            desc,
        });
        Ok(())
    }

    fn open_port(
        &mut self,
        id: u32,
        name: &str,
        new_mac: Option<MacAddress>,
        max_queues: u16,
        hardware: bool,
    ) -> Result<Port> {
        let mut netdev = self.devices.open(name).map_err(|e| {
            error!(device = name, error = %e, "cannot open device");
            DatapathError::device("open", name, e)
        })?;

        let mut saved_hw_addr = None;
        if let Some(mac) = new_mac {
            let current = netdev.hw_addr();
            if current != mac {
                saved_hw_addr = Some(current);
                if let Err(e) = netdev.set_hw_addr(mac) {
                    warn!(device = name, error = %e, "cannot set hardware address");
                }
            }
        }

        netdev
            .turn_flags_on(NetdevFlags::UP | NetdevFlags::PROMISC)
            .map_err(|e| {
                error!(device = name, error = %e, "cannot set device flags");
                DatapathError::device("set flags", name, e)
            })?;

        if max_queues > 0 {
            netdev.setup_slicing(max_queues).map_err(|e| {
                error!(device = name, error = %e, "cannot configure slicing");
                DatapathError::device("setup slicing", name, e)
            })?;
        }

        Ok(Port::new(id, netdev, max_queues, hardware, saved_hw_addr))
    }

    /// Removes the LOCAL port, clearing its IPv4 address and restoring the
    /// hardware address it had before it became local.
    ///
    /// Returns the address it carried.
    #[instrument(skip(self), fields(dp_id = self.dp_id))]
    pub fn remove_local_port(&mut self) -> Option<Ipv4Addr> {
        let mut port = self.local.take()?;
        let address = port.netdev().in4();
        let name = port.name().to_string();

        if address.is_some() {
            if let Err(e) = port
                .netdev_mut()
                .set_in4(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED)
            {
                warn!(device = %name, error = %e, "cannot clear local port address");
            }
        }
        if let Some(mac) = port.saved_hw_addr() {
            if let Err(e) = port.netdev_mut().set_hw_addr(mac) {
                warn!(device = %name, error = %e, "cannot restore hardware address");
            }
        }

        info!(device = %name, address = ?address, "removed local port");
        self.notify(ControllerMessage::PortStatus {
            reason: PortReason::Delete,
            desc: port.desc(),
        });
        address
    }

    /// Assigns `addr/mask` to the LOCAL port and checks the device took it.
    pub fn set_local_address(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) -> Result<()> {
        let local = self.local.as_mut().ok_or(DatapathError::NoSuchPort {
            port: port_no::LOCAL,
        })?;
        let name = local.name().to_string();
        local
            .netdev_mut()
            .set_in4(addr, mask)
            .map_err(|e| DatapathError::device("set address", name.as_str(), e))?;
        if local.netdev().in4() != Some(addr) {
            return Err(DatapathError::AddressNotApplied {
                device: name,
                address: addr,
            });
        }
        Ok(())
    }

    pub fn local_port(&self) -> Option<&Port> {
        self.local.as_ref()
    }

    /// Numbered port sharing the LOCAL port's device.
    pub fn local_alias(&self) -> Option<u32> {
        let local = self.local.as_ref()?;
        self.ports
            .iter()
            .find(|p| p.name() == local.name())
            .map(Port::id)
    }

    /// Numbered port opened on device `name`.
    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub fn lookup(&self, port: u32) -> Option<&Port> {
        if port == port_no::LOCAL {
            return self.local.as_ref();
        }
        let index = usize::try_from(port).ok()?.checked_sub(1)?;
        self.ports.get(index)
    }

    pub(crate) fn lookup_mut(&mut self, port: u32) -> Option<&mut Port> {
        if port == port_no::LOCAL {
            return self.local.as_mut();
        }
        let index = usize::try_from(port).ok()?.checked_sub(1)?;
        self.ports.get_mut(index)
    }

    /// Numbered ports in order, then LOCAL.
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().chain(self.local.iter())
    }

    pub fn port_ids(&self) -> Vec<u32> {
        self.iter().map(Port::id).collect()
    }

    /// Sends `frame` out of `out_port` on queue `queue_id`.
    ///
    /// Queue 0 falls back to the best-effort class when the port has no
    /// queue 0. Drops count against the port.
    pub fn output(&mut self, frame: &[u8], out_port: u32, queue_id: u32) -> Transmit {
        let Some(port) = self.lookup_mut(out_port) else {
            debug!(port = out_port, "output to unknown port");
            return Transmit::Dropped;
        };
        if port.config().contains(PortConfig::PORT_DOWN) {
            port.stats.tx_dropped += 1;
            return Transmit::Dropped;
        }

        let class_id = match port.queue(queue_id) {
            Some(queue) => queue.class_id(),
            None if queue_id == 0 => 0,
            None => {
                debug!(port = out_port, queue = queue_id, "output to unknown queue");
                port.stats.tx_dropped += 1;
                return Transmit::Dropped;
            }
        };

        let len = frame.len() as u64;
        let result = port.netdev_mut().send(frame, class_id);
        let queue = port.queue_mut(queue_id);
        match result {
            Ok(()) => {
                if let Some(queue) = queue {
                    queue.stats.tx_packets += 1;
                    queue.stats.tx_bytes += len;
                }
                port.stats.tx_packets += 1;
                port.stats.tx_bytes += len;
                Transmit::Sent
            }
            Err(e) => {
                debug!(port = out_port, error = %e, "transmit failed");
                if let Some(queue) = queue {
                    queue.stats.tx_errors += 1;
                }
                port.stats.tx_dropped += 1;
                Transmit::Dropped
            }
        }
    }

    /// Sends `frame` out of every port except `in_port`.
    ///
    /// When the frame came in on LOCAL, the numbered port sharing its device
    /// is skipped too. With `flood`, ports flagged NO_FWD are skipped.
    /// Returns the number of successful transmissions.
    pub fn output_all(&mut self, frame: &[u8], in_port: u32, flood: bool) -> usize {
        let local_name = match (&self.local, in_port == port_no::LOCAL) {
            (Some(local), true) => Some(local.name().to_string()),
            _ => None,
        };

        let targets: Vec<u32> = self
            .iter()
            .filter(|p| p.id() != in_port)
            .filter(|p| local_name.as_deref() != Some(p.name()))
            .filter(|p| !(flood && p.config().contains(PortConfig::NO_FWD)))
            .map(Port::id)
            .collect();

        targets
            .into_iter()
            .filter(|&id| self.output(frame, id, 0) == Transmit::Sent)
            .count()
    }

    /// Samples the device link of `port`; returns the transition, if any.
    pub(crate) fn sample_link(&mut self, port: u32) -> Option<LinkChange> {
        let port = self.lookup_mut(port)?;
        let state = port.netdev().link_state();
        let up = state.is_up();
        if !port.set_link_up(up) {
            return None;
        }
        info!(port = port.id(), device = port.name(), link = %state, "link state changed");
        Some(if up { LinkChange::Up } else { LinkChange::Down })
    }

    /// Largest MTU among software-polled ports.
    pub fn max_mtu(&self) -> usize {
        self.iter()
            .filter(|p| !p.is_hardware())
            .map(|p| p.netdev().mtu())
            .max()
            .unwrap_or(0)
    }

    /// Receives at most one frame from `port` into a buffer of `max_len`.
    ///
    /// Hardware ports are never polled. An empty device is not an error;
    /// other receive errors are logged at a limited rate.
    pub(crate) fn receive(&mut self, port: u32, max_len: usize) -> Option<Vec<u8>> {
        let mut buf = std::mem::take(&mut self.scratch);
        let Some(p) = self.lookup_mut(port) else {
            self.scratch = buf;
            return None;
        };
        if p.is_hardware() {
            self.scratch = buf;
            return None;
        }

        buf.clear();
        buf.reserve(max_len);
        match p.netdev_mut().recv(&mut buf, max_len) {
            Ok(()) => {
                p.stats.rx_packets += 1;
                p.stats.rx_bytes += buf.len() as u64;
                self.scratch = Vec::with_capacity(max_len);
                Some(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.scratch = buf;
                None
            }
            Err(e) => {
                p.stats.rx_errors += 1;
                let name = p.name().to_string();
                self.scratch = buf;
                if self.rx_errors.check() {
                    warn!(port, device = %name, error = %e, "error receiving frame");
                }
                None
            }
        }
    }

    /// Counts a frame received from the hardware queue.
    pub(crate) fn account_rx(&mut self, port: u32, len: usize) -> bool {
        match self.lookup_mut(port) {
            Some(p) => {
                p.stats.rx_packets += 1;
                p.stats.rx_bytes += len as u64;
                true
            }
            None => false,
        }
    }

    pub(crate) fn account_rx_drop(&mut self, port: u32) {
        if let Some(p) = self.lookup_mut(port) {
            p.stats.rx_dropped += 1;
        }
    }

    /// Broadcast notification to every controller.
    pub fn notify(&mut self, message: ControllerMessage) {
        self.sink.send(self.dp_id, message, None);
    }

    pub(crate) fn reply(&mut self, message: ControllerMessage, sender: &Sender) {
        self.sink.send(self.dp_id, message, Some(sender));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, RecordingSink};
    use ofswitch_types::{LinkState, PortFeatures, PortState};
    use pretty_assertions::assert_eq;

    fn manager(net: &FakeNetwork, sink: &RecordingSink) -> PortManager {
        PortManager::new(
            0x0000_0a0b_0c0d_0e0f,
            8,
            4,
            Box::new(net.clone()),
            Box::new(sink.clone()),
        )
    }

    #[test]
    fn test_add_port_configures_device_and_notifies() {
        let net = FakeNetwork::new();
        let dev = net.add_device("eth1", MacAddress::new([2, 0, 0, 0, 0, 1]));
        dev.borrow_mut().features.current = PortFeatures::RATE_1GB_FD;
        dev.borrow_mut().features.supported = PortFeatures::RATE_10GB_FD | PortFeatures::RATE_1GB_FD;
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);

        assert_eq!(ports.add_port("eth1").unwrap(), 1);

        let state = dev.borrow();
        assert!(state.flags.contains(NetdevFlags::UP | NetdevFlags::PROMISC));
        assert_eq!(state.slices, Some(4));
        drop(state);

        let port = ports.lookup(1).unwrap();
        assert_eq!(port.state(), PortState::LIVE);
        assert_eq!(port.queue_capacity(), 4);
        let desc = port.desc();
        assert_eq!(desc.curr_speed, 1024 * 1024);
        assert_eq!(desc.max_speed, 10 * 1024 * 1024);
        assert_eq!(
            sink.messages(),
            vec![ControllerMessage::PortStatus {
                reason: PortReason::Add,
                desc
            }]
        );
    }

    #[test]
    fn test_slicing_failure_leaves_no_port() {
        let net = FakeNetwork::new();
        net.add_device("eth1", MacAddress::new([2, 0, 0, 0, 0, 1]))
            .borrow_mut()
            .fail_slicing = true;
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);

        let err = ports.add_port("eth1").unwrap_err();
        assert!(matches!(err, DatapathError::Device { op: "setup slicing", .. }));
        assert!(ports.is_empty());
        assert!(sink.messages().is_empty());
        assert_eq!(net.open_handles("eth1"), 0);
    }

    #[test]
    fn test_unknown_device_and_flag_failure() {
        let net = FakeNetwork::new();
        net.add_device("eth2", MacAddress::ZERO).borrow_mut().fail_flags = true;
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);

        assert!(matches!(
            ports.add_port("nope"),
            Err(DatapathError::Device { op: "open", .. })
        ));
        assert!(matches!(
            ports.add_port("eth2"),
            Err(DatapathError::Device { op: "set flags", .. })
        ));
        assert!(ports.is_empty());
    }

    #[test]
    fn test_port_table_full() {
        let net = FakeNetwork::new();
        let sink = RecordingSink::default();
        let mut ports = PortManager::new(1, 3, 0, Box::new(net.clone()), Box::new(sink));
        for i in 1..=3 {
            net.add_device(&format!("eth{}", i), MacAddress::ZERO);
        }
        assert_eq!(ports.add_port("eth1").unwrap(), 1);
        assert_eq!(ports.add_port("eth2").unwrap(), 2);
        assert!(matches!(
            ports.add_port("eth3"),
            Err(DatapathError::PortTableFull { max_ports: 3 })
        ));
    }

    #[test]
    fn test_local_port_takes_datapath_address() {
        let net = FakeNetwork::new();
        let original = MacAddress::new([2, 0, 0, 0, 0, 1]);
        let dev = net.add_device("eth1", original);
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);

        ports.add_port("eth1").unwrap();
        ports.add_local_port("eth1").unwrap();

        let local = ports.lookup(port_no::LOCAL).unwrap();
        assert_eq!(local.hw_addr(), MacAddress::new([0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]));
        assert!(local.config().contains(PortConfig::NO_FWD));
        assert_eq!(local.queue_capacity(), 0);
        assert_eq!(ports.local_alias(), Some(1));
        assert!(matches!(
            ports.add_local_port("eth1"),
            Err(DatapathError::LocalPortExists { .. })
        ));

        dev.borrow_mut().in4 = Some(Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(ports.remove_local_port(), Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(dev.borrow().hw_addr, original);
        assert_eq!(dev.borrow().in4, None);
        assert!(ports.local_port().is_none());
        assert_eq!(ports.remove_local_port(), None);

        let reasons: Vec<PortReason> = sink
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                ControllerMessage::PortStatus { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec![PortReason::Add, PortReason::Add, PortReason::Delete]);
    }

    #[test]
    fn test_set_local_address_verifies_device() {
        let net = FakeNetwork::new();
        let dev = net.add_device("eth1", MacAddress::ZERO);
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);

        let addr = Ipv4Addr::new(10, 0, 0, 9);
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert!(matches!(
            ports.set_local_address(addr, mask),
            Err(DatapathError::NoSuchPort { .. })
        ));

        ports.add_local_port("eth1").unwrap();
        ports.set_local_address(addr, mask).unwrap();
        assert_eq!(dev.borrow().in4, Some(addr));

        dev.borrow_mut().ignore_set_in4 = true;
        assert!(matches!(
            ports.set_local_address(Ipv4Addr::new(10, 0, 0, 10), mask),
            Err(DatapathError::AddressNotApplied { .. })
        ));
    }

    #[test]
    fn test_lookup_bounds() {
        let net = FakeNetwork::new();
        net.add_device("eth1", MacAddress::ZERO);
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);
        ports.add_port("eth1").unwrap();

        assert!(ports.lookup(0).is_none());
        assert!(ports.lookup(1).is_some());
        assert!(ports.lookup(2).is_none());
        assert!(ports.lookup(port_no::LOCAL).is_none());
    }

    #[test]
    fn test_output_counts_and_drops() {
        let net = FakeNetwork::new();
        let dev = net.add_device("eth1", MacAddress::ZERO);
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);
        ports.add_port("eth1").unwrap();

        let frame = [0u8; 60];
        assert_eq!(ports.output(&frame, 1, 0), Transmit::Sent);
        assert_eq!(ports.output(&frame, 1, 3), Transmit::Dropped);
        assert_eq!(ports.output(&frame, 9, 0), Transmit::Dropped);

        dev.borrow_mut().fail_send = true;
        assert_eq!(ports.output(&frame, 1, 0), Transmit::Dropped);
        dev.borrow_mut().fail_send = false;

        ports
            .lookup_mut(1)
            .unwrap()
            .apply_config(PortConfig::PORT_DOWN, PortConfig::PORT_DOWN);
        assert_eq!(ports.output(&frame, 1, 0), Transmit::Dropped);

        let stats = ports.lookup(1).unwrap().stats();
        assert_eq!(stats.tx_packets, 1);
        assert_eq!(stats.tx_bytes, 60);
        assert_eq!(stats.tx_dropped, 3);
        assert_eq!(dev.borrow().sent.len(), 1);
    }

    #[test]
    fn test_output_all_from_local_skips_alias() {
        let net = FakeNetwork::new();
        let devs: Vec<_> = (1..=3)
            .map(|i| net.add_device(&format!("eth{}", i), MacAddress::ZERO))
            .collect();
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);
        for i in 1..=3 {
            ports.add_port(&format!("eth{}", i)).unwrap();
        }
        ports.add_local_port("eth2").unwrap();

        // all-ports output from LOCAL: eth2 is LOCAL's own device
        assert_eq!(ports.output_all(&[0u8; 60], port_no::LOCAL, false), 2);
        assert_eq!(devs[1].borrow().sent.len(), 0);

        // flooding from port 1 skips LOCAL (NO_FWD) but reaches eth2 once
        assert_eq!(ports.output_all(&[0u8; 60], 1, true), 2);
        assert_eq!(devs[0].borrow().sent.len(), 1);
        assert_eq!(devs[1].borrow().sent.len(), 1);

        // all-ports output from port 1 also hits LOCAL
        assert_eq!(ports.output_all(&[0u8; 60], 1, false), 3);
    }

    #[test]
    fn test_link_sampling_reports_transitions() {
        let net = FakeNetwork::new();
        let dev = net.add_device("eth1", MacAddress::ZERO);
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);
        ports.add_port("eth1").unwrap();

        assert_eq!(ports.sample_link(1), None);
        dev.borrow_mut().link = LinkState::Down;
        assert_eq!(ports.sample_link(1), Some(LinkChange::Down));
        assert_eq!(ports.sample_link(1), None);
        let port = ports.lookup(1).unwrap();
        assert!(port.state().contains(PortState::LINK_DOWN));
        assert!(!port.is_live());
        dev.borrow_mut().link = LinkState::Up;
        assert_eq!(ports.sample_link(1), Some(LinkChange::Up));
        assert!(ports.lookup(1).unwrap().is_live());
    }

    #[test]
    fn test_receive() {
        let net = FakeNetwork::new();
        let dev = net.add_device("eth1", MacAddress::ZERO);
        net.add_device("hw0", MacAddress::ZERO).borrow_mut().mtu = 9000;
        let sink = RecordingSink::default();
        let mut ports = manager(&net, &sink);
        ports.add_port("eth1").unwrap();
        ports.add_hw_port("hw0").unwrap();

        assert_eq!(ports.max_mtu(), 1500);
        assert_eq!(ports.receive(1, 1518), None);

        dev.borrow_mut().rx.push_back(vec![7u8; 64]);
        assert_eq!(ports.receive(1, 1518), Some(vec![7u8; 64]));

        dev.borrow_mut().rx_error = Some(io::ErrorKind::BrokenPipe);
        assert_eq!(ports.receive(1, 1518), None);
        assert_eq!(ports.receive(2, 1518), None);

        let stats = ports.lookup(1).unwrap().stats();
        assert_eq!(stats.rx_packets, 1);
        assert_eq!(stats.rx_bytes, 64);
        assert_eq!(stats.rx_errors, 1);
    }
}
