//! Network device collaborator.
//!
//! The datapath never touches sockets directly; it drives devices through
//! [`Netdev`] handles opened by a [`NetdevProvider`]. Dropping a handle
//! closes the device.

use bitflags::bitflags;
use ofswitch_types::{LinkState, MacAddress, PortFeatures};
use std::io;
use std::net::Ipv4Addr;

bitflags! {
    /// Interface flags the datapath turns on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NetdevFlags: u32 {
        const UP = 1 << 0;
        const PROMISC = 1 << 1;
    }
}

/// Features reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetdevFeatures {
    pub current: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
}

/// An open network device.
///
/// `recv` and `send` are non-blocking; `recv` reports an empty receive
/// queue as [`io::ErrorKind::WouldBlock`].
pub trait Netdev {
    fn name(&self) -> &str;

    fn mtu(&self) -> usize;

    fn hw_addr(&self) -> MacAddress;

    fn set_hw_addr(&mut self, addr: MacAddress) -> io::Result<()>;

    fn turn_flags_on(&mut self, flags: NetdevFlags) -> io::Result<()>;

    fn link_state(&self) -> LinkState;

    fn features(&self) -> NetdevFeatures;

    /// Receives one frame into `buf`, replacing its contents.
    fn recv(&mut self, buf: &mut Vec<u8>, max_len: usize) -> io::Result<()>;

    /// Transmits `frame` on traffic class `class_id`.
    fn send(&mut self, frame: &[u8], class_id: u16) -> io::Result<()>;

    fn in4(&self) -> Option<Ipv4Addr>;

    fn set_in4(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) -> io::Result<()>;

    /// Prepares `max_queues` traffic classes.
    fn setup_slicing(&mut self, max_queues: u16) -> io::Result<()>;

    fn setup_class(&mut self, class_id: u16, min_rate: u16) -> io::Result<()>;

    fn change_class(&mut self, class_id: u16, min_rate: u16) -> io::Result<()>;

    fn delete_class(&mut self, class_id: u16) -> io::Result<()>;
}

/// Opens devices by name.
pub trait NetdevProvider {
    fn open(&mut self, name: &str) -> io::Result<Box<dyn Netdev>>;
}
