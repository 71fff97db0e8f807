//! Single-slot process supervisor.
//!
//! One logical slot holds the running analyzer; the state machine
//! `{NotRunning, Starting, Running, Stopping}` makes duplicate instances
//! impossible by construction - a second `start` while `Starting` or
//! `Running` is a no-op, and overlapping `update` requests are coalesced.
//!
//! Transport closures arrive as events on an mpsc channel (never as
//! free-floating callbacks) and are consumed by [`ProcessSupervisor::handle_event`].
//! Every spawn gets a fresh generation number; a closure event whose
//! generation is not the current one is the queued echo of a process this
//! supervisor already shut down and is ignored, so only a closure of the
//! live process triggers the auto-restart.

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use sidekick_types::{BinaryIdentifier, SupervisorError};

use crate::host::{HostSurface, Notice};
use crate::installer::{BinaryInstaller, set_executable};
use crate::platform::resolve_binary_identifier;
use crate::release::{ReleaseChannel, ReleaseClient};
use crate::state::{StateStore, StoragePaths};
use crate::transport::{Transport, TransportEvent};
use crate::update::should_update;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Where the single slot is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotRunning,
    Starting,
    Running,
    Stopping,
}

pub struct ProcessSupervisor<H: HostSurface> {
    host: H,
    client: ReleaseClient,
    installer: BinaryInstaller,
    paths: StoragePaths,
    state_store: StateStore,
    state: SupervisorState,
    transport: Option<Transport>,
    event_tx: mpsc::Sender<TransportEvent>,
    event_rx: mpsc::Receiver<TransportEvent>,
    generation: u64,
    updating: bool,
}

impl<H: HostSurface> ProcessSupervisor<H> {
    #[must_use]
    pub fn new(paths: StoragePaths, channel: ReleaseChannel, host: H) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = ReleaseClient::new(channel);
        let state_store = StateStore::load(&paths);
        Self {
            host,
            installer: BinaryInstaller::new(client.clone()),
            client,
            paths,
            state_store,
            state: SupervisorState::NotRunning,
            transport: None,
            event_tx,
            event_rx,
            generation: 0,
            updating: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Process id of the supervised analyzer, when one is running.
    #[must_use]
    pub fn process_id(&self) -> Option<u32> {
        self.transport.as_ref().and_then(Transport::id)
    }

    /// The override path, when set and pointing at an existing file.
    /// Resolved fresh on every supervision request so override changes take
    /// effect immediately.
    fn resolved_override(&self) -> Option<PathBuf> {
        self.state_store
            .custom_binary_path()
            .filter(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Ensure the analyzer is running. No-op when a start is already in
    /// flight or the analyzer is up.
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        if matches!(
            self.state,
            SupervisorState::Starting | SupervisorState::Running
        ) {
            tracing::debug!(state = ?self.state, "Start ignored, analyzer already active");
            return Ok(());
        }

        // Resolve before entering Starting: an unsupported platform must
        // never reach that state.
        let (binary_path, identifier) = match self.resolved_override() {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using custom analyzer binary");
                (path, resolve_binary_identifier().ok())
            }
            None => {
                let identifier = match resolve_binary_identifier() {
                    Ok(identifier) => identifier,
                    Err(e) => {
                        self.host.notify(Notice::Error, &e.to_string());
                        return Err(e);
                    }
                };
                (self.paths.default_binary_path(&identifier), Some(identifier))
            }
        };

        self.state = SupervisorState::Starting;
        match self.provision_and_spawn(&binary_path, identifier.as_ref()).await {
            Ok(started) => {
                self.state = if started {
                    SupervisorState::Running
                } else {
                    SupervisorState::NotRunning
                };
                Ok(())
            }
            Err(e) => {
                self.state = SupervisorState::NotRunning;
                Err(e)
            }
        }
    }

    /// The body of `Starting`: make sure a binary is present (installing
    /// with permission when it is not), offer an update when one is
    /// available, then spawn. `Ok(false)` means the user declined the
    /// initial install - not an error, the slot just stays empty.
    async fn provision_and_spawn(
        &mut self,
        binary_path: &Path,
        identifier: Option<&BinaryIdentifier>,
    ) -> Result<bool, SupervisorError> {
        if binary_path.exists() {
            if let Some(identifier) = identifier {
                if should_update(&self.client, binary_path, identifier).await {
                    if self.host.confirm_update(identifier).await {
                        if let Err(e) = self.installer.install(identifier, binary_path).await {
                            // The working binary is untouched by a failed
                            // download; keep going with it.
                            self.host.notify(
                                Notice::Warning,
                                &format!("Analyzer update failed, continuing with the installed version: {e}"),
                            );
                        }
                    } else {
                        tracing::info!("Update declined, continuing with the installed version");
                    }
                }
            }
        } else {
            let Some(identifier) = identifier else {
                // Override branch: the file existed at resolution but is
                // gone now, and without an identifier there is nothing to
                // install in its place.
                let err = SupervisorError::Spawn {
                    path: binary_path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::NotFound, "binary no longer exists"),
                };
                self.host.notify(Notice::Error, &err.to_string());
                return Err(err);
            };
            if !self.host.confirm_install(identifier).await {
                tracing::info!("Install declined, analyzer not started");
                return Ok(false);
            }
            if let Err(e) = self.installer.install(identifier, binary_path).await {
                self.host.notify(Notice::Error, &e.to_string());
                return Err(e.into());
            }
        }

        if let Err(source) = set_executable(binary_path) {
            let err = SupervisorError::PermissionDenied {
                path: binary_path.to_path_buf(),
                source,
            };
            self.host.notify(Notice::Error, &err.to_string());
            return Err(err);
        }

        self.generation += 1;
        let transport = Transport::spawn(binary_path, self.generation, self.event_tx.clone())
            .map_err(|e| {
                self.host.notify(Notice::Error, &e.to_string());
                e
            })?;
        tracing::info!(
            path = %binary_path.display(),
            pid = transport.id(),
            "Analyzer running"
        );
        self.transport = Some(transport);
        Ok(true)
    }

    /// User-initiated stop. Leaves the slot `NotRunning`; the closure event
    /// the dying transport emits is ignored as stale.
    pub async fn stop(&mut self) {
        if self.state != SupervisorState::Running {
            tracing::debug!(state = ?self.state, "Stop ignored, analyzer not running");
            return;
        }
        self.state = SupervisorState::Stopping;
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
        self.state = SupervisorState::NotRunning;
        tracing::info!("Analyzer stopped");
    }

    pub async fn restart(&mut self) -> Result<(), SupervisorError> {
        self.stop().await;
        self.start().await
    }

    /// Reinstall the latest published build, stopping a running analyzer
    /// first so no file lock holds the binary open. A running analyzer is
    /// started again regardless of the install outcome - restarting with
    /// the old binary is the intended fallback when the install failed.
    pub async fn update(&mut self) -> Result<(), SupervisorError> {
        if self.updating {
            tracing::info!("Update already in progress, ignoring request");
            return Ok(());
        }
        if matches!(
            self.state,
            SupervisorState::Starting | SupervisorState::Stopping
        ) {
            tracing::info!(state = ?self.state, "Supervisor busy, ignoring update request");
            return Ok(());
        }

        let identifier = match resolve_binary_identifier() {
            Ok(identifier) => identifier,
            Err(e) => {
                self.host.notify(Notice::Error, &e.to_string());
                return Err(e);
            }
        };

        self.updating = true;
        let was_running = self.state == SupervisorState::Running;
        if was_running {
            self.stop().await;
        }

        let dest = self.paths.default_binary_path(&identifier);
        let result = self.installer.install(&identifier, &dest).await;
        match &result {
            Ok(()) => self.host.notify(Notice::Info, "Analyzer updated"),
            Err(e) => self
                .host
                .notify(Notice::Error, &format!("Analyzer update failed: {e}")),
        }

        if was_running {
            if let Err(e) = self.start().await {
                tracing::warn!("Failed to restart analyzer after update: {e}");
            }
        }

        self.updating = false;
        result.map_err(Into::into)
    }

    /// Next transport event; `None` when the channel is closed.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.event_rx.recv().await
    }

    /// Consume one transport event. A current-generation closure observed
    /// while `Running` means the analyzer died on its own: tear the slot
    /// down and auto-restart. Closures from an earlier generation are stale
    /// echoes of a shutdown this supervisor already performed - a stop or
    /// update may leave one queued behind the process spawned after it.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Closed { generation, error } => {
                if generation != self.generation || self.state != SupervisorState::Running {
                    tracing::trace!(
                        generation,
                        state = ?self.state,
                        "Stale transport closure ignored"
                    );
                    return;
                }
                match &error {
                    Some(e) => tracing::warn!("Analyzer transport failed: {e}"),
                    None => tracing::info!("Analyzer exited"),
                }
                self.state = SupervisorState::Stopping;
                if let Some(transport) = self.transport.take() {
                    transport.shutdown().await;
                }
                self.state = SupervisorState::NotRunning;
                self.host
                    .notify(Notice::Warning, "Analyzer stopped unexpectedly, restarting");
                if let Err(e) = self.start().await {
                    tracing::warn!("Analyzer auto-restart failed: {e}");
                }
            }
        }
    }
}
