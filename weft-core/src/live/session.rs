//! The live session: one owning task per watched log
//!
//! ```text
//!   notify callback ──FsSignal──┐
//!                               ▼
//!   DebounceTimers ──"rebuild"──► owner task ──Snapshot──► Publisher ──► consumer
//!        ▲                        │
//!        └──────── arm ───────────┘
//! ```
//!
//! The owner task holds all pipeline state (offset, retained messages, team
//! flag) and is the only thing that mutates it. Rebuilds run one at a time
//! on that task; signals arriving meanwhile wait in the capacity-1 channel.

use super::debounce::{DebounceTimers, Timer};
use super::publish::{self, Publisher, Subscriber};
use super::watch::{watch_parent, FsSignal};
use crate::chunk::{build_chunks, has_team_spawns};
use crate::config::LiveConfig;
use crate::discovery::discover;
use crate::error::{Error, Result};
use crate::ingest::{resume_incremental, Origin};
use crate::linking::{link, LinkReport};
use crate::types::{Chunk, ClassifiedMessage, SubagentProcess};
use serde::Serialize;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One published rebuild result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Starts at 1 for the initial build and grows by one per rebuild
    pub generation: u64,
    pub chunks: Vec<Chunk>,
    pub processes: Vec<Arc<SubagentProcess>>,
    /// Bytes of the parent log consumed so far
    pub offset: u64,
    pub has_team_spawns: bool,
    pub link_report: LinkReport,
}

/// Finds the child sessions of a parent log.
type Discover = fn(&Path) -> Result<Vec<SubagentProcess>>;

/// State owned by the rebuild loop.
pub(crate) struct Pipeline {
    path: PathBuf,
    offset: u64,
    last_timestamp: Option<DateTime<Utc>>,
    messages: Vec<ClassifiedMessage>,
    has_team_spawns: bool,
    generation: u64,
    discover: Discover,
}

impl Pipeline {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self::with_discovery(path, discover)
    }

    pub(crate) fn with_discovery(path: PathBuf, discover: Discover) -> Self {
        Self {
            path,
            offset: 0,
            last_timestamp: None,
            messages: Vec::new(),
            has_team_spawns: false,
            generation: 0,
            discover,
        }
    }

    /// Read what was appended, then re-chunk, re-discover and re-link.
    ///
    /// A failed read leaves the state untouched. A failed discovery still
    /// yields a snapshot (with no processes) alongside the error, so the
    /// appended messages are published right away.
    pub(crate) fn rebuild(&mut self) -> Result<(Snapshot, Option<Error>)> {
        let batch =
            resume_incremental(&self.path, self.offset, Origin::Parent, self.last_timestamp)?;
        if batch.reset {
            tracing::info!(path = %self.path.display(), "Session log replaced, starting over");
            self.messages.clear();
        }
        let appended = batch.messages.len();
        self.messages.extend(batch.messages);
        self.offset = batch.offset;
        self.last_timestamp = batch.last_timestamp;

        let mut chunks = build_chunks(&self.messages);
        let (processes, discovery_error): (Vec<Arc<SubagentProcess>>, _) =
            match (self.discover)(&self.path) {
                Ok(found) => (found.into_iter().map(Arc::new).collect(), None),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Child session discovery failed"
                    );
                    (Vec::new(), Some(e))
                }
            };
        let link_report = link(&mut chunks, &processes);

        self.has_team_spawns = has_team_spawns(&chunks);
        self.generation += 1;

        tracing::debug!(
            generation = self.generation,
            offset = self.offset,
            appended,
            chunks = chunks.len(),
            processes = processes.len(),
            "Rebuilt session"
        );

        let snapshot = Snapshot {
            generation: self.generation,
            chunks,
            processes,
            offset: self.offset,
            has_team_spawns: self.has_team_spawns,
            link_report,
        };
        Ok((snapshot, discovery_error))
    }

    fn rebuild_and_publish(&mut self, publisher: &Publisher) {
        match self.rebuild() {
            Ok((snapshot, discovery_error)) => {
                publisher.publish(snapshot);
                if let Some(e) = discovery_error {
                    publisher.report(e);
                }
            }
            Err(e) => publisher.report(e),
        }
    }
}

/// Owner loop. Returns when `stop` fires (or its sender is dropped) or the
/// event source closes.
pub(crate) async fn run_loop(
    mut pipeline: Pipeline,
    config: LiveConfig,
    mut events: mpsc::UnboundedReceiver<notify::Result<FsSignal>>,
    publisher: Publisher,
    mut stop: oneshot::Receiver<()>,
) {
    let (signal_tx, mut signal_rx) = mpsc::channel::<()>(1);
    let timers = DebounceTimers::new(signal_tx);

    pipeline.rebuild_and_publish(&publisher);

    loop {
        tokio::select! {
            biased;

            _ = &mut stop => break,

            Some(()) = signal_rx.recv() => {
                pipeline.rebuild_and_publish(&publisher);
            }

            event = events.recv() => match event {
                Some(Ok(FsSignal::ParentWritten)) => {
                    if timers.is_pending(Timer::Parent) {
                        tracing::trace!("Parent written inside debounce window, re-arming");
                    }
                    timers.arm(Timer::Parent, config.debounce());
                }
                Some(Ok(FsSignal::SiblingCreated)) => {
                    if pipeline.has_team_spawns {
                        timers.arm(Timer::Directory, config.team_debounce());
                    } else {
                        tracing::trace!("Sibling created without team spawns, ignoring");
                    }
                }
                Some(Err(e)) => publisher.report(Error::Watch(e)),
                None => {
                    tracing::debug!("Watch event source closed");
                    break;
                }
            },
        }
    }

    timers.stop();
    tracing::debug!(
        path = %pipeline.path.display(),
        generation = pipeline.generation,
        "Live session stopped"
    );
}

/// A continuously rebuilt view of one session log.
///
/// Must be started from within a tokio runtime.
///
/// ```rust,no_run
/// use weft_core::{config::LiveConfig, live::LiveSession};
///
/// # async fn demo() -> weft_core::Result<()> {
/// let mut session = LiveSession::start("/path/to/session.jsonl", LiveConfig::default())?;
/// while let Some(snapshot) = session.next_snapshot().await {
///     println!("generation {}: {} chunks", snapshot.generation, snapshot.chunks.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct LiveSession {
    path: PathBuf,
    updates: Subscriber,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Watch `path` and publish an initial snapshot right away.
    pub fn start(path: impl Into<PathBuf>, config: LiveConfig) -> Result<Self> {
        let path = path.into();
        config.validate()?;
        std::fs::metadata(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", path.display(), e),
            ))
        })?;

        let (watcher, events) = watch_parent(&path)?;
        let (publisher, updates) = publish::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        tracing::info!(path = %path.display(), "Starting live session");

        let pipeline = Pipeline::new(path.clone());
        let task = tokio::spawn(async move {
            // Dropping the watcher ends the event stream.
            let _watcher = watcher;
            run_loop(pipeline, config, events, publisher, stop_rx).await;
        });

        Ok(Self {
            path,
            updates,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next snapshot. `None` after [`stop`](Self::stop) once
    /// the last unseen snapshot has been returned.
    pub async fn next_snapshot(&mut self) -> Option<Arc<Snapshot>> {
        self.updates.next_snapshot().await
    }

    /// An extra handle on the published snapshots and errors, for
    /// consumers that wait on both at once.
    pub fn subscribe(&self) -> Subscriber {
        self.updates.clone()
    }

    /// The newest snapshot without waiting.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.updates.latest()
    }

    /// Wait for the next rebuild or watch error.
    pub async fn next_error(&mut self) -> Option<Arc<Error>> {
        self.updates.next_error().await
    }

    /// Stop watching. Any rebuild in progress completes first; pending
    /// timers are cancelled. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Live session task failed");
            }
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
