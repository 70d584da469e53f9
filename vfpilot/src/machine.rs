//! # High-level implementation to manage a virtual machine (recommended)
//!
//! This module drives the [`Compiler`] and the [`Backend`] lifecycle for
//! you: compile a document, start it, follow its state, resynchronize the
//! guest clock after host sleep and stop it.
//!
//! ## Example
//!
//! ```ignore
//! use tokio::sync::mpsc;
//! use vfpilot::machine::Machine;
//! use vfpilot_models::models::VirtualMachine;
//!
//! let spec = VirtualMachine::from_file("vm.json")?;
//! let mut machine = Machine::new(backend);
//! machine.create(&spec)?;
//!
//! println!("Booting the VM");
//! machine.start().await?;
//!
//! let (wake_events, rx) = mpsc::unbounded_channel();
//! machine.start_time_sync(rx).await?;
//! // feed SleepEvent::Awake from the host power notifications
//!
//! machine.stop().await?;
//! ```
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use vfpilot_models::models::VirtualMachine;

use crate::backend::{Backend, BackendError, HostArch, StateMonitor, VmState};
use crate::compiler::{CompileError, CompiledVm, Compiler};
use crate::rest::InspectView;
use crate::timesync::{SleepEvent, TimeSyncError, TimeSyncHandle, TimeSyncer};

#[derive(thiserror::Error, Debug)]
pub enum MachineError {
    /// Lifecycle call on a machine that was never compiled
    #[error("Could not find a compiled virtual machine, call create first")]
    NotCreated,
    #[error("Could not start time sync: the virtual machine has no 'timesync' block")]
    TimeSyncDisabled,
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    TimeSync(#[from] TimeSyncError),
}

/// How often a running machine asks the backend for its state
pub const DEFAULT_STATE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Publishes `state`, returns whether it differs from the last one
fn publish(sender: &watch::Sender<VmState>, state: VmState) -> bool {
    sender.send_if_modified(|current| {
        let changed = *current != state;
        *current = state;
        changed
    })
}

/// Background task copying the backend state into the watch channel.
/// Aborted on drop.
#[derive(Debug)]
struct StatePoller(JoinHandle<()>);

impl StatePoller {
    fn spawn<M: StateMonitor>(
        monitor: M,
        sender: Arc<watch::Sender<VmState>>,
        period: Duration,
    ) -> StatePoller {
        StatePoller(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            loop {
                ticks.tick().await;
                let state = monitor.state();
                if publish(&sender, state) {
                    debug!("Backend reports {:?}", state);
                }
            }
        }))
    }
}

impl Drop for StatePoller {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A virtual machine built from a declarative document and run on a
/// [`Backend`]
pub struct Machine<B: Backend> {
    id: Uuid,
    backend: B,
    host_arch: HostArch,
    compiled: Option<CompiledVm<B::Vm>>,
    state: Arc<watch::Sender<VmState>>,
    poll_interval: Duration,
    poller: Option<StatePoller>,
    time_sync: Option<TimeSyncHandle<B::Connector>>,
}

impl<B: Backend> fmt::Debug for Machine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("host_arch", &self.host_arch)
            .field("created", &self.compiled.is_some())
            .field("state", &*self.state.borrow())
            .field("polling", &self.poller.is_some())
            .field("time_sync", &self.time_sync)
            .finish()
    }
}

impl<B: Backend> Machine<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(VmState::Stopped);
        Machine {
            id: Uuid::new_v4(),
            backend,
            host_arch: HostArch::current(),
            compiled: None,
            state: Arc::new(state),
            poll_interval: DEFAULT_STATE_POLL_INTERVAL,
            poller: None,
            time_sync: None,
        }
    }

    pub fn with_host_arch(mut self, host_arch: HostArch) -> Self {
        self.host_arch = host_arch;
        self
    }

    /// Period of the state polling done while the machine runs
    pub fn with_state_poll_interval(mut self, period: Duration) -> Self {
        self.poll_interval = period;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Compiles the document into a backend virtual machine. The document is
    /// left untouched, see [`Machine::inspect`] for the runtime view.
    #[instrument(skip(self, spec), fields(id = %self.id))]
    pub fn create(&mut self, spec: &VirtualMachine) -> Result<(), MachineError> {
        let compiled = Compiler::new(&self.backend)
            .with_host_arch(self.host_arch)
            .compile_as(self.id, spec)?;
        self.compiled = Some(compiled);
        self.refresh_state();
        Ok(())
    }

    /// Document as it runs, with values allocated at compile time such as
    /// pseudo-terminal paths
    pub fn inspect(&self) -> Option<&VirtualMachine> {
        self.compiled.as_ref().map(|c| &c.runtime)
    }

    /// Runtime document served by the inspection endpoint, see
    /// [`crate::rest`]. The endpoint asks the backend for the state on each
    /// request.
    pub fn inspect_view(&self) -> Result<InspectView, MachineError> {
        let compiled = self.compiled.as_ref().ok_or(MachineError::NotCreated)?;
        Ok(InspectView::new(
            compiled.runtime.clone(),
            self.backend.state_monitor(&compiled.vm),
        ))
    }

    /// Last published state
    pub fn state(&self) -> VmState {
        *self.state.borrow()
    }

    /// Receives every state change of this machine. While it runs, changes
    /// made outside of this handle show up within one poll interval.
    pub fn subscribe(&self) -> watch::Receiver<VmState> {
        self.state.subscribe()
    }

    /// Asks the backend for the current state and publishes it.
    pub fn refresh_state(&self) -> VmState {
        let state = match &self.compiled {
            Some(compiled) => self.backend.state(&compiled.vm),
            None => VmState::Stopped,
        };
        publish(&self.state, state);
        state
    }

    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn start(&mut self) -> Result<(), MachineError> {
        let compiled = self.compiled.as_mut().ok_or(MachineError::NotCreated)?;
        self.state.send_replace(VmState::Starting);
        if let Err(e) = self.backend.start(&mut compiled.vm) {
            self.state.send_replace(VmState::Error);
            return Err(e.into());
        }
        info!("Virtual machine started");
        let monitor = self.backend.state_monitor(&compiled.vm);
        self.poller = Some(StatePoller::spawn(
            monitor,
            Arc::clone(&self.state),
            self.poll_interval,
        ));
        self.refresh_state();
        Ok(())
    }

    /// Starts resynchronizing the guest clock on every host wake-up
    /// received on `events`. Only machines declaring a `timesync` block can
    /// do that.
    #[instrument(skip(self, events), fields(id = %self.id))]
    pub async fn start_time_sync(
        &mut self,
        events: mpsc::UnboundedReceiver<SleepEvent>,
    ) -> Result<(), MachineError> {
        let compiled = self.compiled.as_ref().ok_or(MachineError::NotCreated)?;
        let port = compiled
            .runtime
            .timesync
            .as_ref()
            .map(|t| t.vsock_port)
            .ok_or(MachineError::TimeSyncDisabled)?;
        if let Some(previous) = self.time_sync.take() {
            previous.stop().await?.close();
        }

        let connector = self.backend.vsock_connector(&compiled.vm);
        debug!("Starting time sync watcher on vsock port {}", port);
        self.time_sync = Some(TimeSyncer::new(connector, port).spawn(events));
        Ok(())
    }

    /// Stops the time sync watcher, if any, then asks the guest to shut down.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn stop(&mut self) -> Result<(), MachineError> {
        let compiled = self.compiled.as_mut().ok_or(MachineError::NotCreated)?;
        if let Some(handle) = self.time_sync.take() {
            handle.stop().await?.close();
        }
        self.poller = None;
        self.state.send_replace(VmState::Stopping);
        self.backend.request_stop(&mut compiled.vm)?;
        info!("Stop requested");
        self.refresh_state();
        Ok(())
    }
}
