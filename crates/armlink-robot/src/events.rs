use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::status::RobotStatus;

/// Notifications published by a [`RobotLink`](crate::RobotLink).
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    ConnectionChanged(bool),
    StatusUpdated(RobotStatus),
    JointPositionChanged { joint: usize, position: f64 },
    JointVelocityChanged { joint: usize, velocity: f64 },
    JointTorqueChanged { joint: usize, torque: f64 },
    JointEnabledChanged { joint: usize, enabled: bool },
    /// Human-readable transport or protocol error.
    Error(String),
}

/// Observer list. Each subscriber gets its own channel; subscribers whose
/// receiver was dropped are pruned on the next publish.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<Sender<LinkEvent>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self) -> Receiver<LinkEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn publish(&mut self, event: LinkEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}
