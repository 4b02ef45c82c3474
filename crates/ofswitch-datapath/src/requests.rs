//! Controller requests handled by the port manager.
//!
//! Each handler either replies through the controller sink or returns the
//! protocol error to report to the requesting controller. A handler that
//! fails leaves ports and queues as they were.

use crate::controller::{ControllerMessage, PortMod, PortReason, QueueMod, Role, Sender};
use crate::port::{Port, Queue};
use crate::ports::PortManager;
use ofswitch_codec::{BadRequestCode, OfpError, PortModFailedCode, QueueOpFailedCode};
use ofswitch_types::port_no;
use tracing::{debug, info, instrument, warn};

/// Wildcard queue id.
pub const OFPQ_ALL: u32 = 0xffff_ffff;

type Reply = std::result::Result<(), OfpError>;

impl PortManager {
    /// Applies a port-mod and broadcasts the resulting port status.
    #[instrument(skip(self, sender), fields(port = msg.port_no))]
    pub fn handle_port_mod(&mut self, sender: &Sender, msg: &PortMod) -> Reply {
        if sender.role == Role::Slave {
            return Err(OfpError::BadRequest(BadRequestCode::IsSlave));
        }
        let port = self
            .lookup_mut(msg.port_no)
            .ok_or(OfpError::PortModFailed(PortModFailedCode::BadPort))?;

        if port.netdev().hw_addr() != msg.hw_addr {
            debug!(expected = %port.netdev().hw_addr(), got = %msg.hw_addr, "stale port-mod");
            return Err(OfpError::PortModFailed(PortModFailedCode::BadHwAddr));
        }

        if !msg.mask.is_empty() {
            port.apply_config(msg.config, msg.mask);
        }
        let desc = port.desc();
        info!(config = ?desc.config, "port modified");
        self.notify(ControllerMessage::PortStatus {
            reason: PortReason::Modify,
            desc,
        });
        Ok(())
    }

    /// Replies with the counters of `port`, or of every port for ANY.
    /// An unknown port yields an empty reply.
    pub fn handle_port_stats_request(&mut self, sender: &Sender, port: u32) -> Reply {
        let stats = if port == port_no::ANY {
            self.iter().map(Port::stats_entry).collect()
        } else {
            self.lookup(port).map(Port::stats_entry).into_iter().collect()
        };
        self.reply(ControllerMessage::PortStatsReply(stats), sender);
        Ok(())
    }

    pub fn handle_port_desc_request(&mut self, sender: &Sender) -> Reply {
        let descs = self.iter().map(Port::desc).collect();
        self.reply(ControllerMessage::PortDescReply(descs), sender);
        Ok(())
    }

    /// Replies with queue counters. Either id may be a wildcard.
    pub fn handle_queue_stats_request(&mut self, sender: &Sender, port: u32, queue_id: u32) -> Reply {
        let select = |p: &Port| -> Vec<_> {
            if queue_id == OFPQ_ALL {
                p.queues().map(Queue::stats_entry).collect()
            } else {
                p.queue(queue_id).map(Queue::stats_entry).into_iter().collect()
            }
        };
        let stats = if port == port_no::ANY {
            self.iter().flat_map(select).collect()
        } else {
            self.lookup(port).map(select).unwrap_or_default()
        };
        self.reply(ControllerMessage::QueueStatsReply(stats), sender);
        Ok(())
    }

    pub fn handle_queue_get_config_request(&mut self, sender: &Sender, port: u32) -> Reply {
        let queues = if port == port_no::ANY {
            self.iter().flat_map(|p| p.queues().map(Queue::config)).collect()
        } else {
            let p = self
                .lookup(port)
                .ok_or(OfpError::QueueOpFailed(QueueOpFailedCode::BadPort))?;
            p.queues().map(Queue::config).collect()
        };
        self.reply(ControllerMessage::QueueGetConfigReply { port, queues }, sender);
        Ok(())
    }

    pub fn lookup_queue(&self, port: u32, queue_id: u32) -> Option<&Queue> {
        self.lookup(port)?.queue(queue_id)
    }

    /// Creates queue `queue_id` with its traffic class.
    ///
    /// The device class is configured before the queue becomes visible.
    pub fn add_queue(&mut self, msg: &QueueMod) -> Reply {
        let port = self
            .lookup_mut(msg.port_no)
            .ok_or(OfpError::QueueOpFailed(QueueOpFailedCode::BadPort))?;
        let Ok(class_id) = u16::try_from(msg.queue_id) else {
            return Err(OfpError::QueueOpFailed(QueueOpFailedCode::Eperm));
        };
        match port.queue_slot(msg.queue_id) {
            Some(None) => {}
            _ => {
                warn!(port = msg.port_no, queue = msg.queue_id, "no room for queue");
                return Err(OfpError::QueueOpFailed(QueueOpFailedCode::Eperm));
            }
        }

        if let Err(e) = port.netdev_mut().setup_class(class_id, msg.min_rate) {
            warn!(port = msg.port_no, queue = msg.queue_id, error = %e, "cannot set up traffic class");
            return Err(OfpError::QueueOpFailed(QueueOpFailedCode::BadQueue));
        }
        let queue = Queue::new(msg.port_no, msg.queue_id, class_id, msg.min_rate);
        if let Some(slot) = port.queue_slot(msg.queue_id) {
            *slot = Some(queue);
        }
        info!(port = msg.port_no, queue = msg.queue_id, min_rate = msg.min_rate, "added queue");
        Ok(())
    }

    /// Changes the minimum rate of a queue, creating it if absent.
    pub fn modify_queue(&mut self, msg: &QueueMod) -> Reply {
        let port = self
            .lookup_mut(msg.port_no)
            .ok_or(OfpError::QueueOpFailed(QueueOpFailedCode::BadPort))?;
        let Some(class_id) = port.queue(msg.queue_id).map(Queue::class_id) else {
            return self.add_queue(msg);
        };

        if let Err(e) = port.netdev_mut().change_class(class_id, msg.min_rate) {
            warn!(port = msg.port_no, queue = msg.queue_id, error = %e, "cannot change traffic class");
            return Err(OfpError::QueueOpFailed(QueueOpFailedCode::Eperm));
        }
        if let Some(queue) = port.queue_mut(msg.queue_id) {
            queue.set_min_rate(msg.min_rate);
        }
        Ok(())
    }

    pub fn delete_queue(&mut self, msg: &QueueMod) -> Reply {
        let port = self
            .lookup_mut(msg.port_no)
            .ok_or(OfpError::QueueOpFailed(QueueOpFailedCode::BadPort))?;
        let class_id = port
            .queue(msg.queue_id)
            .map(Queue::class_id)
            .ok_or(OfpError::QueueOpFailed(QueueOpFailedCode::BadQueue))?;

        if let Err(e) = port.netdev_mut().delete_class(class_id) {
            warn!(port = msg.port_no, queue = msg.queue_id, error = %e, "cannot delete traffic class");
        }
        if let Some(slot) = port.queue_slot(msg.queue_id) {
            *slot = None;
        }
        info!(port = msg.port_no, queue = msg.queue_id, "deleted queue");
        Ok(())
    }
}
