//! Draft sessions.
//!
//! A session is one task that owns a draft's in-memory state and drives the lifecycle
//! state machine from host commands, connectivity flips, store and upload completions,
//! and its status display timer. Durable store traffic runs on a separate writer task
//! and uploads on their own tasks, so none of them hold up the session loop. The host
//! talks to a session through a [`DraftHandle`].

mod machine;
mod writer;

use std::sync::Arc;
use std::time::Duration;

use draft_store_core::{
    Draft, DraftStatus, DurableStore, MirrorStore, StoreError, UploadError, UploadHandler,
    DEFAULT_DRAFT_ID,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::DraftError;
use crate::upload::UploadCoordinator;
use machine::DraftMachine;

const COMMAND_BUFFER: usize = 64;
const TRANSITION_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub draft_id: String,
    /// How long transient statuses stay visible before reverting to idle.
    pub status_display: Duration,
    /// Cosmetic only.
    pub placeholder: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            draft_id: DEFAULT_DRAFT_ID.to_string(),
            status_display: Duration::from_millis(2000),
            placeholder: String::new(),
        }
    }
}

/// Observable session state for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftView {
    pub draft_id: String,
    pub content: String,
    pub status: DraftStatus,
    pub online: bool,
    /// Saved draft offered for reconciliation, if any.
    pub pending: Option<String>,
    pub placeholder: String,
}

impl DraftView {
    /// Whether the submit control should be active.
    pub fn can_submit(&self) -> bool {
        !self.content.is_empty()
    }
}

/// What a successful submit did with the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Uploaded and retired from both stores.
    Uploaded,
    /// Offline: saved to both stores and cleared from the editor.
    SavedOffline,
}

/// Completions reported back to the session loop.
pub(crate) enum SessionEvent {
    /// The startup durable read.
    Recovered(Result<Option<Draft>, StoreError>),
    /// A queued durable write or retirement finished.
    Written {
        seq: u64,
        result: Result<(), StoreError>,
    },
    Uploaded(Result<(), UploadError>),
}

enum Command {
    Edit {
        text: String,
        reply: oneshot::Sender<()>,
    },
    Submit {
        reply: oneshot::Sender<Result<SubmitOutcome, DraftError>>,
    },
    AcceptPending {
        reply: oneshot::Sender<Result<String, DraftError>>,
    },
    DismissPending {
        reply: oneshot::Sender<Result<(), DraftError>>,
    },
}

/// Spawns draft sessions.
pub struct DraftSession;

impl DraftSession {
    /// Start a session for `config.draft_id`.
    ///
    /// The mirror is read before this returns; the durable recovery read completes in the
    /// background and only seeds the draft if nothing has been typed by then.
    pub fn spawn(
        config: SessionConfig,
        durable: Arc<dyn DurableStore>,
        mirror: Arc<dyn MirrorStore>,
        upload: Arc<dyn UploadHandler>,
        monitor: ConnectivityMonitor,
    ) -> DraftHandle {
        let connectivity = monitor.subscribe();
        let online = monitor.current().online;

        let coordinator = UploadCoordinator::new(
            config.draft_id.clone(),
            upload,
            durable.clone(),
            mirror.clone(),
        );

        let (view_tx, view_rx) = watch::channel(DraftView {
            draft_id: config.draft_id.clone(),
            content: String::new(),
            status: DraftStatus::Idle,
            online,
            pending: None,
            placeholder: config.placeholder.clone(),
        });
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        info!(
            "Starting draft session {} (durable {}, mirror {}, online {})",
            config.draft_id,
            durable.backend_name(),
            mirror.backend_name(),
            online
        );

        let writer = tokio::spawn(writer::run_writer(
            config.draft_id.clone(),
            durable,
            coordinator.clone(),
            write_rx,
            event_tx.clone(),
        ));

        let mut machine = DraftMachine::new(
            config,
            mirror,
            coordinator,
            online,
            write_tx,
            event_tx,
            view_tx,
            transitions.clone(),
        );
        machine.load_mirror_snapshot();

        let task = tokio::spawn(run_session(machine, command_rx, connectivity, event_rx, writer));

        DraftHandle {
            commands: command_tx,
            view: view_rx,
            transitions,
            monitor,
            task,
        }
    }
}

/// Host-side handle to a running draft session.
pub struct DraftHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<DraftView>,
    transitions: broadcast::Sender<DraftStatus>,
    monitor: ConnectivityMonitor,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for DraftHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftHandle")
            .field("view", &*self.view.borrow())
            .finish_non_exhaustive()
    }
}

impl DraftHandle {
    /// Current observable state.
    pub fn view(&self) -> DraftView {
        self.view.borrow().clone()
    }

    /// Subscribe to observable state changes.
    pub fn subscribe(&self) -> watch::Receiver<DraftView> {
        self.view.clone()
    }

    /// Subscribe to every status transition, including short-lived ones.
    pub fn subscribe_status(&self) -> broadcast::Receiver<DraftStatus> {
        self.transitions.subscribe()
    }

    /// Replace the draft content. Resolves once the content is persisted (or the
    /// attempt failed, which shows as `DraftStatus::Error`). The session keeps
    /// handling other input meanwhile.
    pub async fn edit(&self, text: impl Into<String>) -> Result<(), DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Edit {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| DraftError::SessionClosed)
    }

    /// Submit the draft: upload when online, save locally when offline.
    ///
    /// Resolves with the outcome. Edits and connectivity changes are still handled
    /// while the upload runs.
    pub async fn submit(&self) -> Result<SubmitOutcome, DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit { reply }).await?;
        rx.await.map_err(|_| DraftError::SessionClosed)?
    }

    /// Replace the content with the pending saved draft. Returns the accepted text.
    pub async fn accept_pending(&self) -> Result<String, DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AcceptPending { reply }).await?;
        rx.await.map_err(|_| DraftError::SessionClosed)?
    }

    /// Hide the pending saved draft without touching either store.
    pub async fn dismiss_pending(&self) -> Result<(), DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::DismissPending { reply }).await?;
        rx.await.map_err(|_| DraftError::SessionClosed)?
    }

    /// Tear the session down: stop the state machine, its timer, and connectivity watching.
    pub async fn shutdown(self) {
        let DraftHandle {
            commands,
            monitor,
            task,
            ..
        } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!("Draft session task ended abnormally: {}", e);
        }
        monitor.shutdown();
    }

    async fn send(&self, command: Command) -> Result<(), DraftError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DraftError::SessionClosed)
    }
}

async fn run_session(
    mut machine: DraftMachine,
    mut commands: mpsc::Receiver<Command>,
    mut connectivity: watch::Receiver<Connectivity>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    writer: JoinHandle<()>,
) {
    let mut connectivity_open = true;

    loop {
        let deadline = machine.revert_deadline();

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut machine, command),
                None => break,
            },
            changed = connectivity.changed(), if connectivity_open => match changed {
                Ok(()) => {
                    let online = connectivity.borrow_and_update().online;
                    machine.set_online(online);
                }
                Err(_) => {
                    warn!("Connectivity monitor stopped; keeping last known state");
                    connectivity_open = false;
                }
            },
            // The machine holds a sender, so this never yields `None`
            Some(event) = events.recv() => machine.on_event(event),
            _ = sleep_until(deadline), if deadline.is_some() => machine.on_revert_deadline(),
        }
    }

    let draft_id = machine.draft_id().to_string();
    // Cancels an in-flight upload and closes the write queue
    drop(machine);
    if let Err(e) = writer.await {
        warn!("Store writer for {} ended abnormally: {}", draft_id, e);
    }
    debug!("Draft session {} stopped", draft_id);
}

fn handle_command(machine: &mut DraftMachine, command: Command) {
    // A dropped reply receiver means the caller stopped waiting; the transition stands
    match command {
        Command::Edit { text, reply } => machine.edit(text, reply),
        Command::Submit { reply } => machine.submit(reply),
        Command::AcceptPending { reply } => machine.accept_pending(reply),
        Command::DismissPending { reply } => {
            let _ = reply.send(machine.dismiss_pending());
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
