//! Receive path for hardware-backed ports.
//!
//! A driver thread pushes frames into a bounded channel; the poll loop drains
//! it without blocking at the top of every iteration.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// A frame received by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwFrame {
    pub port_no: u32,
    pub data: Vec<u8>,
}

/// Producer half, held by the driver thread.
#[derive(Debug, Clone)]
pub struct HwFrameSender {
    tx: mpsc::Sender<HwFrame>,
}

impl HwFrameSender {
    /// Queues `frame`, handing it back if the queue is full or closed.
    pub fn try_send(&self, frame: HwFrame) -> Result<(), HwFrame> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(frame) | TrySendError::Closed(frame) => frame,
        })
    }

    /// Waits for room in the queue. Must not be called from async context.
    pub fn blocking_send(&self, frame: HwFrame) -> Result<(), HwFrame> {
        self.tx.blocking_send(frame).map_err(|e| e.0)
    }
}

/// Consumer half, owned by the datapath.
#[derive(Debug)]
pub struct HwReceiveQueue {
    rx: mpsc::Receiver<HwFrame>,
}

impl HwReceiveQueue {
    pub fn try_next(&mut self) -> Option<HwFrame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Creates a queue holding at most `depth` frames.
pub fn hw_channel(depth: usize) -> (HwFrameSender, HwReceiveQueue) {
    let (tx, rx) = mpsc::channel(depth);
    (HwFrameSender { tx }, HwReceiveQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(port_no: u32) -> HwFrame {
        HwFrame {
            port_no,
            data: vec![0u8; 60],
        }
    }

    #[test]
    fn test_bounded_and_ordered() {
        let (tx, mut rx) = hw_channel(2);
        tx.try_send(frame(1)).unwrap();
        tx.try_send(frame(2)).unwrap();
        assert_eq!(tx.try_send(frame(3)), Err(frame(3)));

        assert_eq!(rx.try_next().map(|f| f.port_no), Some(1));
        assert_eq!(rx.try_next().map(|f| f.port_no), Some(2));
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn test_driver_thread_feeds_queue() {
        let (tx, mut rx) = hw_channel(4);
        let driver = std::thread::spawn(move || {
            for port in 1..=3 {
                tx.blocking_send(frame(port)).unwrap();
            }
        });
        driver.join().unwrap();

        let ports: Vec<u32> = std::iter::from_fn(|| rx.try_next()).map(|f| f.port_no).collect();
        assert_eq!(ports, vec![1, 2, 3]);
    }

    #[test]
    fn test_closed_queue_returns_frame() {
        let (tx, rx) = hw_channel(1);
        drop(rx);
        assert_eq!(tx.try_send(frame(1)), Err(frame(1)));
    }
}
