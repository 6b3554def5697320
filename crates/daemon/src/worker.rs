//! Device worker thread
//!
//! Dedicated blocking thread owning every handler. All event handling,
//! registry mutation, protocol handshakes, and notification delivery run
//! here synchronously, one command at a time; there is no interleaving of
//! two events for the same handler.

use crate::config::DaemonConfig;
use crate::dispatch::Dispatcher;
use crate::handler::HandlerFactory;
use crate::notify::{EventChannelSubscriber, Notifier};
use common::{DaemonCommand, DaemonWorker};
use tracing::{debug, error, info};

pub struct DeviceWorkerThread {
    dispatcher: Dispatcher,
    worker: DaemonWorker,
}

impl DeviceWorkerThread {
    /// Build the notifier, the handler table, and every enabled handler
    pub fn new(config: &DaemonConfig, worker: DaemonWorker) -> Self {
        let notifier = Notifier::new();
        notifier.subscribe(Box::new(EventChannelSubscriber::for_worker(&worker)));

        let factory = HandlerFactory::with_builtin_handlers();
        let handlers = factory.create_all(config, notifier.clone());
        info!("device worker initialized with {} handlers", handlers.len());

        Self {
            dispatcher: Dispatcher::new(handlers),
            worker,
        }
    }

    /// Run the worker loop until a Shutdown command arrives
    pub fn run(mut self) {
        info!("device worker thread started");

        loop {
            match self.worker.recv_command() {
                Ok(DaemonCommand::Shutdown) => {
                    info!("device worker shutting down");
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(e) => {
                    // Command channel closed: the runtime is gone.
                    debug!("command channel closed ({}), shutting down", e);
                    break;
                }
            }
        }

        self.dispatcher.shutdown();
        info!("device worker thread stopped");
    }

    /// Handle one command, isolating handler panics from the thread
    fn handle_command(&mut self, cmd: DaemonCommand) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_command_inner(cmd)
        }));

        if let Err(e) = result {
            error!("panic in device command handler: {:?}", e);
        }
    }

    fn handle_command_inner(&mut self, cmd: DaemonCommand) {
        match cmd {
            DaemonCommand::DeviceEvent { event } => {
                self.dispatcher.dispatch_event(&event);
            }

            DaemonCommand::Command {
                class,
                command,
                response,
            } => {
                debug!("dispatching {:?} to class {}", command.kind, class);
                let outcome = self.dispatcher.dispatch_command(class, &command);
                let _ = response.send(outcome);
            }

            DaemonCommand::PowerEvent { event } => {
                info!("power lifecycle event: {:?}", event);
                self.dispatcher.dispatch_power_event(event);
            }

            DaemonCommand::QueryStatus { response } => {
                let _ = response.send(self.dispatcher.query_status());
            }

            DaemonCommand::Shutdown => {
                // Already handled in the main loop
                unreachable!()
            }
        }
    }
}

/// Spawn the device worker thread
///
/// Creates a dedicated OS thread that runs until a Shutdown command is
/// received or the command channel closes.
pub fn spawn_device_worker(
    worker: DaemonWorker,
    config: DaemonConfig,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("device-worker".to_string())
        .spawn(move || {
            let worker_thread = DeviceWorkerThread::new(&config, worker);
            worker_thread.run();
        })
        .expect("failed to spawn device worker thread")
}
