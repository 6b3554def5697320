//! Block storage handler
//!
//! Tracks disks on the block subsystem with their partition sub-records,
//! executes eject commands, and drives synchronous unmount of every record
//! around power transitions. Filesystem work itself belongs to the external
//! mount service, reached through the [`Mounter`] trait.

use crate::handler::{DeviceHandler, classify_action};
use crate::notify::Notifier;
use crate::registry::{DeviceRecord, DeviceRegistry};
use event::{
    CommandKind, CommandOutcome, DeviceClass, DeviceCommand, DeviceEvent, DeviceStatus,
    EventAction, NotifyAction, PowerEvent,
};
use tracing::{debug, info, warn};

/// Boundary to the external service owning mount state
pub trait Mounter: Send {
    /// Synchronously unmount whatever is mounted from this device node
    fn unmount(&self, device_path: &str, force: bool) -> std::io::Result<()>;
}

/// Forwards unmount requests to the platform mount service
///
/// Mounting and filesystem handling live outside this daemon; this client
/// only reports the request and trusts the service to act on it.
pub struct MountServiceClient;

impl Mounter for MountServiceClient {
    fn unmount(&self, device_path: &str, force: bool) -> std::io::Result<()> {
        info!("requesting unmount of {} (force={})", device_path, force);
        Ok(())
    }
}

/// Partition sub-record, independently owned by its disk record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    pub device_path: String,
}

/// Class-specific payload for storage disks
#[derive(Debug, Clone, Default)]
pub struct StoragePayload {
    pub partitions: Vec<PartitionRecord>,
}

pub struct StorageHandler {
    registry: DeviceRegistry<StoragePayload>,
    notifier: Notifier,
    mounter: Box<dyn Mounter>,
}

impl StorageHandler {
    pub fn new(notifier: Notifier) -> Self {
        Self::with_mounter(notifier, Box::new(MountServiceClient))
    }

    /// Constructor with an injected mounter (used by tests)
    pub fn with_mounter(notifier: Notifier, mounter: Box<dyn Mounter>) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            notifier,
            mounter,
        }
    }

    fn claims(&self, event: &DeviceEvent) -> bool {
        event.subsystem() == Some("block")
    }

    fn on_add(&mut self, event: &DeviceEvent) {
        let Some(path) = event.device_path() else {
            debug!("block add event without device path, ignoring");
            return;
        };

        if event.devtype() == Some("partition") {
            self.on_partition_add(path);
            return;
        }

        let path = path.to_string();
        let record = self.registry.upsert_with(&path, StoragePayload::default);
        record.apply_event(event);
        let status = record.status(DeviceClass::Storage);

        info!(
            "storage device {} attached as number {}",
            path, status.device_number
        );
        self.notifier
            .notify(DeviceClass::Storage, NotifyAction::Add, &status);
    }

    /// Attach a partition to the disk record whose path prefixes it
    fn on_partition_add(&mut self, partition_path: &str) {
        let parent_path = self
            .registry
            .iter()
            .map(|record| record.device_path.clone())
            .filter(|disk| partition_path.starts_with(disk.as_str()))
            .max_by_key(|disk| disk.len());

        let Some(parent_path) = parent_path else {
            debug!("partition {} without tracked parent, ignoring", partition_path);
            return;
        };

        let record = self
            .registry
            .get_mut(&parent_path)
            .expect("parent path came from the registry");
        let partition = PartitionRecord {
            device_path: partition_path.to_string(),
        };
        if !record.payload.partitions.contains(&partition) {
            record.payload.partitions.push(partition);
        }

        let status = record.status(DeviceClass::Storage);
        debug!("partition {} attached to {}", partition_path, parent_path);
        self.notifier
            .notify(DeviceClass::Storage, NotifyAction::Add, &status);
    }

    fn on_remove(&mut self, event: &DeviceEvent) {
        let Some(path) = event.device_path() else {
            return;
        };

        if let Some(record) = self.registry.remove(path) {
            self.unmount_record(&record, true);
            let status = record.status(DeviceClass::Storage);
            info!("storage device {} detached", path);
            self.notifier
                .notify(DeviceClass::Storage, NotifyAction::Remove, &status);
            return;
        }

        // Maybe it was a partition of a tracked disk.
        let parent_path = self
            .registry
            .iter()
            .find(|record| {
                record
                    .payload
                    .partitions
                    .iter()
                    .any(|p| p.device_path == path)
            })
            .map(|record| record.device_path.clone());

        match parent_path {
            Some(parent_path) => {
                let record = self
                    .registry
                    .get_mut(&parent_path)
                    .expect("parent path came from the registry");
                record.payload.partitions.retain(|p| p.device_path != path);
                debug!("partition {} detached from {}", path, parent_path);
            }
            None => debug!("remove for untracked block path {}, ignoring", path),
        }
    }

    /// Unmount every partition of a record, then the disk itself
    ///
    /// Returns the first error; remaining unmounts are still attempted.
    fn unmount_record(&self, record: &DeviceRecord<StoragePayload>, force: bool) -> Option<std::io::Error> {
        let mut first_error = None;
        for partition in &record.payload.partitions {
            if let Err(e) = self.mounter.unmount(&partition.device_path, force) {
                warn!("unmount of {} failed: {}", partition.device_path, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.mounter.unmount(&record.device_path, force) {
            warn!("unmount of {} failed: {}", record.device_path, e);
            first_error.get_or_insert(e);
        }
        first_error
    }

    fn eject(&mut self, device_number: u32) -> CommandOutcome {
        let Some(record) = self.registry.by_number(device_number) else {
            return CommandOutcome::DeviceNotFound;
        };

        if let Some(e) = self.unmount_record(record, false) {
            // Record stays; the caller sees exactly what happened.
            return CommandOutcome::Failed {
                message: format!("unmount failed: {}", e),
            };
        }

        let record = self
            .registry
            .remove_by_number(device_number)
            .expect("record was just looked up");
        let status = record.status(DeviceClass::Storage);
        info!("ejected storage device {}", record.device_path);
        self.notifier
            .notify(DeviceClass::Storage, NotifyAction::Remove, &status);
        CommandOutcome::Success
    }

    fn unmount_all(&mut self, force: bool) {
        let paths: Vec<String> = self
            .registry
            .iter()
            .map(|record| record.device_path.clone())
            .collect();
        for path in paths {
            let record = self.registry.get(&path).expect("path came from the registry");
            self.unmount_record(record, force);
        }
    }
}

impl DeviceHandler for StorageHandler {
    fn class(&self) -> DeviceClass {
        DeviceClass::Storage
    }

    fn handle_event(&mut self, event: &DeviceEvent) -> bool {
        if !self.claims(event) {
            return false;
        }
        let Some(action) = classify_action(event) else {
            return true;
        };

        match action {
            EventAction::Add | EventAction::Change => self.on_add(event),
            EventAction::Remove => self.on_remove(event),
        }
        true
    }

    fn handle_command(&mut self, command: &DeviceCommand) -> CommandOutcome {
        match command.kind {
            CommandKind::Eject => self.eject(command.device_number),
        }
    }

    fn handle_power_event(&mut self, event: PowerEvent) {
        match event {
            PowerEvent::SuspendRequested => {
                // Media must be unmounted before suspend completes.
                self.unmount_all(true);
                for record in self.registry.iter_mut() {
                    record.power_status = false;
                }
            }
            PowerEvent::ResumePreparing => {
                for record in self.registry.iter_mut() {
                    record.power_status = true;
                }
            }
            PowerEvent::UnmountAllRequested => {
                self.unmount_all(true);
            }
        }
    }

    fn query_status(&self) -> Vec<DeviceStatus> {
        self.registry
            .iter()
            .map(|record| record.status(DeviceClass::Storage))
            .collect()
    }

    fn shutdown(&mut self) {
        for record in self.registry.drain_all() {
            self.unmount_record(&record, true);
            let status = record.status(DeviceClass::Storage);
            self.notifier
                .notify(DeviceClass::Storage, NotifyAction::Remove, &status);
        }
    }
}
