//! USB accessory handler integration tests
//!
//! Drives the handler end to end against a scripted USB host: handshake
//! sequencing for switchable candidates, registry behavior for devices
//! already in accessory mode, and the shared-context lifecycle.
//!
//! Run with: `cargo test -p daemon --test accessory_tests`

use common::test_utils::{make_event, usb_add_event};
use daemon::handler::DeviceHandler;
use daemon::handler::usb::UsbAccessoryHandler;
use daemon::notify::{NotificationSubscriber, Notifier};
use daemon::usb::AccessoryIdentity;
use daemon::usb::host::{AccessoryPort, UsbHost, UsbHostError, UsbHostProvider};
use event::{DeviceClass, DeviceStatus, NotifyAction, attr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostOp {
    Open { vendor_id: u16, product_id: u16 },
    GetProtocol,
    SendString { slot: u16 },
    Start,
}

/// Port whose transfers are recorded into a shared log
struct ScriptedPort {
    log: Arc<Mutex<Vec<HostOp>>>,
    version_reply_len: usize,
}

impl AccessoryPort for ScriptedPort {
    fn claim_interface(&mut self, _interface: u8) -> Result<(), UsbHostError> {
        Ok(())
    }

    fn read_control(
        &mut self,
        _request_type: u8,
        _request: u8,
        _value: u16,
        _index: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbHostError> {
        self.log.lock().unwrap().push(HostOp::GetProtocol);
        if self.version_reply_len == 2 {
            buf[0] = 2;
            buf[1] = 0;
        }
        Ok(self.version_reply_len)
    }

    fn write_control(
        &mut self,
        _request_type: u8,
        _request: u8,
        _value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, UsbHostError> {
        // The start command carries no payload; descriptor writes do.
        let op = if data.is_empty() {
            HostOp::Start
        } else {
            HostOp::SendString { slot: index }
        };
        self.log.lock().unwrap().push(op);
        Ok(data.len())
    }
}

/// Host handing out scripted ports, optionally failing the first opens
struct ScriptedHost {
    log: Arc<Mutex<Vec<HostOp>>>,
    version_reply_len: usize,
    fail_first_opens: u32,
    opens: AtomicU32,
}

impl UsbHost for ScriptedHost {
    fn open_device(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Box<dyn AccessoryPort>, UsbHostError> {
        self.log.lock().unwrap().push(HostOp::Open {
            vendor_id,
            product_id,
        });
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first_opens {
            return Err(UsbHostError::Busy);
        }
        Ok(Box::new(ScriptedPort {
            log: self.log.clone(),
            version_reply_len: self.version_reply_len,
        }))
    }
}

struct ScriptedProvider {
    host: Arc<ScriptedHost>,
    acquires: Arc<AtomicU32>,
}

impl UsbHostProvider for ScriptedProvider {
    fn acquire(&self) -> Result<Arc<dyn UsbHost>, UsbHostError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(self.host.clone())
    }
}

/// Records every notification the handler emits
struct Recorder {
    log: Arc<Mutex<Vec<(NotifyAction, DeviceStatus)>>>,
}

impl NotificationSubscriber for Recorder {
    fn on_device_notification(
        &self,
        _class: DeviceClass,
        action: NotifyAction,
        device: &DeviceStatus,
    ) {
        self.log.lock().unwrap().push((action, device.clone()));
    }
}

struct Harness {
    handler: UsbAccessoryHandler,
    log: Arc<Mutex<Vec<HostOp>>>,
    acquires: Arc<AtomicU32>,
    notifications: Arc<Mutex<Vec<(NotifyAction, DeviceStatus)>>>,
}

fn harness(version_reply_len: usize, fail_first_opens: u32) -> Harness {
    let log = Arc::new(Mutex::new(Vec::new()));
    let host = Arc::new(ScriptedHost {
        log: log.clone(),
        version_reply_len,
        fail_first_opens,
        opens: AtomicU32::new(0),
    });
    let acquires = Arc::new(AtomicU32::new(0));
    let provider = ScriptedProvider {
        host,
        acquires: acquires.clone(),
    };
    let notifications = Arc::new(Mutex::new(Vec::new()));
    let notifier = Notifier::new();
    notifier.subscribe(Box::new(Recorder {
        log: notifications.clone(),
    }));
    let handler = UsbAccessoryHandler::with_provider(
        AccessoryIdentity::default(),
        notifier,
        Box::new(provider),
    );
    Harness {
        handler,
        log,
        acquires,
        notifications,
    }
}

#[test]
fn test_candidate_add_runs_full_handshake() {
    let mut h = harness(2, 0);

    // Vendor-specific interface, identifiers outside the accessory range.
    let claimed = h
        .handler
        .handle_event(&usb_add_event("/devices/usb1/1-1", "04e8", "6860", "ff"));
    assert!(claimed);

    let log = h.log.lock().unwrap();
    assert_eq!(
        log[0],
        HostOp::Open {
            vendor_id: 0x04e8,
            product_id: 0x6860
        }
    );
    assert_eq!(log[1], HostOp::GetProtocol);
    let slots: Vec<u16> = log[2..8]
        .iter()
        .map(|op| match op {
            HostOp::SendString { slot } => *slot,
            other => panic!("expected SendString, got {:?}", other),
        })
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(log[8], HostOp::Start);
    drop(log);

    // The candidate is not published; it comes back after re-enumeration.
    assert!(h.handler.query_status().is_empty());
    // With nothing in the registry, the context was released again.
    assert!(!h.handler.has_host_context());
}

#[test]
fn test_accessory_mode_add_skips_handshake() {
    let mut h = harness(2, 0);

    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-2", "18d1", "2d01", "06"));

    assert!(h.log.lock().unwrap().is_empty());
    assert_eq!(h.acquires.load(Ordering::SeqCst), 0);

    let status = h.handler.query_status();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].vendor_id, 0x18d1);
    assert_eq!(status[0].product_id, 0x2d01);
}

#[test]
fn test_sparse_change_refreshes_tracked_record() {
    let mut h = harness(2, 0);

    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-2", "18d1", "2d01", "06"));

    // A later change for the same path carries only what changed.
    let claimed = h.handler.handle_event(&make_event(&[
        (attr::ACTION, "change"),
        (attr::DEVPATH, "/devices/usb1/1-2"),
        (attr::SUBSYSTEM, "usb"),
        (attr::DEVTYPE, "usb_device"),
        (attr::ID_MODEL, "RenamedModel"),
    ]));
    assert!(claimed);

    // Refreshed in place: same record and number, updated field.
    let status = h.handler.query_status();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].device_number, 1);
    assert_eq!(status[0].product_name.as_deref(), Some("RenamedModel"));
    assert_eq!(status[0].vendor_id, 0x18d1);

    // Both the add and the refresh were announced; no handshake ran.
    let notifications = h.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().all(|(action, _)| *action == NotifyAction::Add));
    assert_eq!(notifications[1].1.product_name.as_deref(), Some("RenamedModel"));
    drop(notifications);
    assert!(h.log.lock().unwrap().is_empty());
    assert_eq!(h.acquires.load(Ordering::SeqCst), 0);

    // Even ids outside the accessory range refresh a tracked path rather
    // than starting a handshake.
    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-2", "04e8", "6860", "ff"));
    assert!(h.log.lock().unwrap().is_empty());
    assert_eq!(h.handler.query_status().len(), 1);
}

#[test]
fn test_short_version_reply_publishes_nothing() {
    let mut h = harness(1, 0);

    let claimed = h
        .handler
        .handle_event(&usb_add_event("/devices/usb1/1-1", "04e8", "6860", "ff"));
    assert!(claimed);

    let log = h.log.lock().unwrap();
    assert_eq!(*log.last().unwrap(), HostOp::GetProtocol);
    assert!(!log.contains(&HostOp::Start));
    drop(log);

    assert!(h.handler.query_status().is_empty());
}

#[test]
fn test_open_is_retried_until_device_accepts() {
    let mut h = harness(2, 3);

    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-1", "04e8", "6860", "ff"));

    let opens = h
        .log
        .lock()
        .unwrap()
        .iter()
        .filter(|op| matches!(op, HostOp::Open { .. }))
        .count();
    assert_eq!(opens, 4);
    assert!(h.log.lock().unwrap().contains(&HostOp::Start));
}

#[test]
fn test_host_context_follows_registry_occupancy() {
    let mut h = harness(2, 0);

    // An accessory-mode record keeps the registry occupied.
    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-2", "18d1", "2d01", "06"));
    assert!(!h.handler.has_host_context());

    // The handshake acquires the context; the occupied registry retains it.
    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-3", "04e8", "6860", "ff"));
    assert!(h.handler.has_host_context());
    assert_eq!(h.acquires.load(Ordering::SeqCst), 1);

    // A second handshake reuses the held context instead of re-acquiring.
    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-4", "04e8", "6860", "ff"));
    assert_eq!(h.acquires.load(Ordering::SeqCst), 1);

    // Removing the last record releases the context. Remove events carry
    // only the identifying attributes.
    let removed = h.handler.handle_event(&make_event(&[
        (attr::ACTION, "remove"),
        (attr::DEVPATH, "/devices/usb1/1-2"),
        (attr::SUBSYSTEM, "usb"),
        (attr::DEVTYPE, "usb_device"),
    ]));
    assert!(removed);
    assert!(!h.handler.has_host_context());
}

#[test]
fn test_shutdown_releases_context_and_records() {
    let mut h = harness(2, 0);

    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-2", "18d1", "2d01", "06"));
    h.handler
        .handle_event(&usb_add_event("/devices/usb1/1-3", "04e8", "6860", "ff"));
    assert!(h.handler.has_host_context());

    h.handler.shutdown();

    assert!(h.handler.query_status().is_empty());
    assert!(!h.handler.has_host_context());
}
