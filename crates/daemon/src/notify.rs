//! Notification fan-out
//!
//! Synchronous in-process delivery of (class, action, device) triples to
//! every registered subscriber, in registration order. A subscriber that
//! panics is isolated and logged so the rest still receive the call.

use common::{DaemonEvent, DaemonWorker};
use event::{DeviceClass, DeviceStatus, NotifyAction};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Receiver of device lifecycle notifications
///
/// Implementations may read the borrowed snapshot only for the duration of
/// the call; the underlying record may be destroyed immediately after a
/// Remove notification completes.
pub trait NotificationSubscriber: Send {
    fn on_device_notification(
        &self,
        class: DeviceClass,
        action: NotifyAction,
        device: &DeviceStatus,
    );
}

/// Shared fan-out handle
///
/// Cloned into every handler; subscribers are registered once at startup.
#[derive(Clone)]
pub struct Notifier {
    subscribers: Arc<Mutex<Vec<Box<dyn NotificationSubscriber>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a subscriber; delivery follows registration order
    pub fn subscribe(&self, subscriber: Box<dyn NotificationSubscriber>) {
        let mut subscribers = self.subscribers.lock().expect("subscriber list poisoned");
        subscribers.push(subscriber);
    }

    /// Deliver one notification to every subscriber
    pub fn notify(&self, class: DeviceClass, action: NotifyAction, device: &DeviceStatus) {
        debug!(
            "notify {}/{:?} device {} ({})",
            class, action, device.device_number, device.device_path
        );

        let subscribers = self.subscribers.lock().expect("subscriber list poisoned");
        for subscriber in subscribers.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| {
                subscriber.on_device_notification(class, action, device);
            }));
            if result.is_err() {
                error!("notification subscriber panicked; continuing with remaining subscribers");
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards notifications over the bridge's event channel to the runtime
pub struct EventChannelSubscriber {
    sender: async_channel::Sender<DaemonEvent>,
}

impl EventChannelSubscriber {
    pub fn new(sender: async_channel::Sender<DaemonEvent>) -> Self {
        Self { sender }
    }

    /// Convenience constructor wired to a worker handle
    pub fn for_worker(worker: &DaemonWorker) -> Self {
        Self::new(worker.event_tx.clone())
    }
}

impl NotificationSubscriber for EventChannelSubscriber {
    fn on_device_notification(
        &self,
        class: DeviceClass,
        action: NotifyAction,
        device: &DeviceStatus,
    ) {
        let event = DaemonEvent::DeviceChanged {
            class,
            action,
            device: device.clone(),
        };
        if let Err(e) = self.sender.send_blocking(event) {
            error!("failed to forward device notification: {}", e);
        }
    }
}
