//! In-memory devices, controller sink, pipeline and buffer pool.
//!
//! Enabled for unit tests and through the `test-support` feature for
//! integration tests and embedding crates.

use crate::buffers::BufferPool;
use crate::config::DatapathConfig;
use crate::controller::{ControllerMessage, ControllerSink, Sender};
use crate::datapath::Datapath;
use crate::netdev::{Netdev, NetdevFeatures, NetdevFlags, NetdevProvider};
use crate::packet::Packet;
use crate::pipeline::Pipeline;
use crate::ports::PortManager;
use ofswitch_types::{LinkState, MacAddress};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::net::Ipv4Addr;
use std::rc::Rc;

/// Shared state of one fake device, visible to every open handle.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub mtu: usize,
    pub hw_addr: MacAddress,
    pub link: LinkState,
    pub flags: NetdevFlags,
    pub features: NetdevFeatures,
    pub in4: Option<Ipv4Addr>,
    pub slices: Option<u16>,
    /// Frames waiting to be received.
    pub rx: VecDeque<Vec<u8>>,
    /// Returned by every `recv` while set.
    pub rx_error: Option<io::ErrorKind>,
    /// Transmitted frames with their traffic class.
    pub sent: Vec<(Vec<u8>, u16)>,
    /// Configured traffic classes and their minimum rates.
    pub classes: BTreeMap<u16, u16>,
    pub fail_open: bool,
    pub fail_flags: bool,
    pub fail_slicing: bool,
    pub fail_send: bool,
    pub fail_class: bool,
    pub fail_set_in4: bool,
    /// `set_in4` succeeds without storing the address.
    pub ignore_set_in4: bool,
    open_handles: usize,
}

impl DeviceState {
    fn new(hw_addr: MacAddress) -> Self {
        DeviceState {
            mtu: 1500,
            hw_addr,
            link: LinkState::Up,
            flags: NetdevFlags::empty(),
            features: NetdevFeatures::default(),
            in4: None,
            slices: None,
            rx: VecDeque::new(),
            rx_error: None,
            sent: Vec::new(),
            classes: BTreeMap::new(),
            fail_open: false,
            fail_flags: false,
            fail_slicing: false,
            fail_send: false,
            fail_class: false,
            fail_set_in4: false,
            ignore_set_in4: false,
            open_handles: 0,
        }
    }
}

pub type DeviceHandle = Rc<RefCell<DeviceState>>;

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what))
}

/// A set of named fake devices.
#[derive(Debug, Clone, Default)]
pub struct FakeNetwork {
    devices: Rc<RefCell<HashMap<String, DeviceHandle>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, name: &str, hw_addr: MacAddress) -> DeviceHandle {
        let handle = Rc::new(RefCell::new(DeviceState::new(hw_addr)));
        self.devices
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&handle));
        handle
    }

    /// # Panics
    ///
    /// If no device named `name` was added.
    pub fn device(&self, name: &str) -> DeviceHandle {
        match self.devices.borrow().get(name) {
            Some(handle) => Rc::clone(handle),
            None => panic!("no fake device {}", name),
        }
    }

    /// Number of handles currently open on `name`.
    pub fn open_handles(&self, name: &str) -> usize {
        self.devices
            .borrow()
            .get(name)
            .map_or(0, |d| d.borrow().open_handles)
    }
}

impl NetdevProvider for FakeNetwork {
    fn open(&mut self, name: &str) -> io::Result<Box<dyn Netdev>> {
        let state = self
            .devices
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no device {}", name)))?;
        if state.borrow().fail_open {
            return Err(injected("open"));
        }
        state.borrow_mut().open_handles += 1;
        Ok(Box::new(FakeNetdev {
            name: name.to_string(),
            state,
        }))
    }
}

struct FakeNetdev {
    name: String,
    state: DeviceHandle,
}

impl Drop for FakeNetdev {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}

impl Netdev for FakeNetdev {
    fn name(&self) -> &str {
        &self.name
    }

    fn mtu(&self) -> usize {
        self.state.borrow().mtu
    }

    fn hw_addr(&self) -> MacAddress {
        self.state.borrow().hw_addr
    }

    fn set_hw_addr(&mut self, addr: MacAddress) -> io::Result<()> {
        self.state.borrow_mut().hw_addr = addr;
        Ok(())
    }

    fn turn_flags_on(&mut self, flags: NetdevFlags) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_flags {
            return Err(injected("flags"));
        }
        state.flags |= flags;
        Ok(())
    }

    fn link_state(&self) -> LinkState {
        self.state.borrow().link
    }

    fn features(&self) -> NetdevFeatures {
        self.state.borrow().features
    }

    fn recv(&mut self, buf: &mut Vec<u8>, max_len: usize) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(kind) = state.rx_error {
            return Err(io::Error::new(kind, "injected receive failure"));
        }
        let mut frame = state
            .rx
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        frame.truncate(max_len);
        buf.clear();
        buf.extend_from_slice(&frame);
        Ok(())
    }

    fn send(&mut self, frame: &[u8], class_id: u16) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_send {
            return Err(injected("send"));
        }
        state.sent.push((frame.to_vec(), class_id));
        Ok(())
    }

    fn in4(&self) -> Option<Ipv4Addr> {
        self.state.borrow().in4
    }

    fn set_in4(&mut self, addr: Ipv4Addr, _mask: Ipv4Addr) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_set_in4 {
            return Err(injected("set address"));
        }
        if !state.ignore_set_in4 {
            state.in4 = (!addr.is_unspecified()).then_some(addr);
        }
        Ok(())
    }

    fn setup_slicing(&mut self, max_queues: u16) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_slicing {
            return Err(injected("slicing"));
        }
        state.slices = Some(max_queues);
        Ok(())
    }

    fn setup_class(&mut self, class_id: u16, min_rate: u16) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_class {
            return Err(injected("class"));
        }
        state.classes.insert(class_id, min_rate);
        Ok(())
    }

    fn change_class(&mut self, class_id: u16, min_rate: u16) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_class {
            return Err(injected("class"));
        }
        state.classes.insert(class_id, min_rate);
        Ok(())
    }

    fn delete_class(&mut self, class_id: u16) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_class {
            return Err(injected("class"));
        }
        state.classes.remove(&class_id);
        Ok(())
    }
}

/// Records everything sent to the controller.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Rc<RefCell<Vec<(ControllerMessage, Option<Sender>)>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<ControllerMessage> {
        self.log.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn senders(&self) -> Vec<Option<Sender>> {
        self.log.borrow().iter().map(|(_, s)| *s).collect()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl ControllerSink for RecordingSink {
    fn send(&mut self, _dp_id: u64, message: ControllerMessage, sender: Option<&Sender>) {
        self.log.borrow_mut().push((message, sender.copied()));
    }
}

/// What the pipeline saw: the ingress port and frame of each packet.
pub type Seen = Rc<RefCell<Vec<(u32, Vec<u8>)>>>;

/// Pipeline that records every packet and optionally floods it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPipeline {
    seen: Seen,
    flood: bool,
}

impl RecordingPipeline {
    /// A pipeline that floods every packet it records.
    pub fn flooding() -> Self {
        RecordingPipeline {
            flood: true,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<(u32, Vec<u8>)> {
        self.seen.borrow().clone()
    }
}

impl Pipeline for RecordingPipeline {
    fn process(&mut self, ports: &mut PortManager, packet: Packet) {
        let in_port = packet.in_port();
        if self.flood {
            ports.output_all(packet.data(), in_port, true);
        }
        self.seen.borrow_mut().push((in_port, packet.into_data()));
    }
}

/// Buffer pool with no live entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBufferPool;

impl BufferPool for NullBufferPool {
    fn is_alive(&self, _buffer_id: u32) -> bool {
        false
    }

    fn discard(&mut self, _buffer_id: u32, _keep_contents: bool) {}
}

/// Builds a datapath on fake devices with a recording pipeline.
///
/// # Panics
///
/// If `config` does not validate.
pub fn datapath(
    config: DatapathConfig,
    net: &FakeNetwork,
    sink: &RecordingSink,
) -> (Datapath, RecordingPipeline) {
    datapath_with(config, net, sink, RecordingPipeline::default())
}

/// Like [`datapath`], with a caller-supplied pipeline.
///
/// # Panics
///
/// If `config` does not validate.
pub fn datapath_with(
    config: DatapathConfig,
    net: &FakeNetwork,
    sink: &RecordingSink,
    pipeline: RecordingPipeline,
) -> (Datapath, RecordingPipeline) {
    match Datapath::new(
        config,
        Box::new(net.clone()),
        Box::new(sink.clone()),
        Box::new(pipeline.clone()),
        Box::new(NullBufferPool),
    ) {
        Ok(dp) => (dp, pipeline),
        Err(e) => panic!("invalid test configuration: {}", e),
    }
}
