//! Async channel bridge between the Tokio runtime and the device worker thread

use async_channel::{Receiver, Sender, bounded};
use event::{CommandOutcome, DeviceClass, DeviceCommand, DeviceEvent, DeviceStatus, NotifyAction, PowerEvent};

/// Commands from the Tokio runtime to the device worker thread
#[derive(Debug)]
pub enum DaemonCommand {
    /// Deliver one normalized device event for classification
    DeviceEvent {
        /// Decoded event from the external transport
        event: DeviceEvent,
    },

    /// Execute a typed command against one device class
    Command {
        /// Device class owning the target record
        class: DeviceClass,
        /// Command kind and target device number
        command: DeviceCommand,
        /// Channel to send the outcome back
        response: tokio::sync::oneshot::Sender<CommandOutcome>,
    },

    /// Deliver a power lifecycle signal to every handler
    PowerEvent {
        /// Suspend, resume, or forced unmount
        event: PowerEvent,
    },

    /// Snapshot the public fields of every live record
    QueryStatus {
        /// Channel to send the snapshots back
        response: tokio::sync::oneshot::Sender<Vec<DeviceStatus>>,
    },

    /// Shutdown the worker thread gracefully
    Shutdown,
}

/// Device lifecycle notifications from the worker thread
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    /// A device was added, refreshed, or removed
    DeviceChanged {
        /// Owning device class
        class: DeviceClass,
        /// Add (covers refresh) or Remove
        action: NotifyAction,
        /// Snapshot of the record at notification time
        device: DeviceStatus,
    },
}

/// Handle for the Tokio runtime (async)
#[derive(Clone)]
pub struct DaemonBridge {
    cmd_tx: Sender<DaemonCommand>,
    event_rx: Receiver<DaemonEvent>,
}

impl DaemonBridge {
    /// Send a command to the device worker thread
    pub async fn send_command(&self, cmd: DaemonCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive a notification from the device worker thread
    pub async fn recv_event(&self) -> crate::Result<DaemonEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for the device worker thread (blocking)
pub struct DaemonWorker {
    cmd_rx: Receiver<DaemonCommand>,
    /// Notification sender (public so the worker can hand it to subscribers)
    pub event_tx: Sender<DaemonEvent>,
}

impl DaemonWorker {
    /// Receive a command from the Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<DaemonCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<DaemonCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Send a notification to the Tokio runtime (blocking)
    pub fn send_event(&self, event: DaemonEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and the device worker thread
///
/// Returns (DaemonBridge for Tokio, DaemonWorker for the device thread)
pub fn create_daemon_bridge() -> (DaemonBridge, DaemonWorker) {
    let (cmd_tx, cmd_rx) = bounded(256);
    let (event_tx, event_rx) = bounded(256);

    (
        DaemonBridge { cmd_tx, event_rx },
        DaemonWorker { cmd_rx, event_tx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use event::attr;

    #[tokio::test]
    async fn test_channel_bridge() {
        let (bridge, worker) = create_daemon_bridge();

        // Spawn a thread to simulate the device worker
        let handle = std::thread::spawn(move || {
            let cmd = worker.recv_command().unwrap();
            matches!(cmd, DaemonCommand::DeviceEvent { .. })
        });

        // Send command from async context
        let event = DeviceEvent::from_pairs(&[(attr::ACTION, "add")]);
        bridge
            .send_command(DaemonCommand::DeviceEvent { event })
            .await
            .unwrap();

        assert!(handle.join().unwrap());
    }

    #[tokio::test]
    async fn test_event_forwarding() {
        let (bridge, worker) = create_daemon_bridge();

        let status = crate::test_utils::sample_status(DeviceClass::Bluetooth, 1, "/devices/hci0");
        worker
            .send_event(DaemonEvent::DeviceChanged {
                class: DeviceClass::Bluetooth,
                action: NotifyAction::Add,
                device: status.clone(),
            })
            .unwrap();

        let DaemonEvent::DeviceChanged { class, action, device } = bridge.recv_event().await.unwrap();
        assert_eq!(class, DeviceClass::Bluetooth);
        assert_eq!(action, NotifyAction::Add);
        assert_eq!(device, status);
    }
}
