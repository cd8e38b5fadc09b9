//! Filesystem watch on the parent log's directory
//!
//! The directory is watched non-recursively, which covers both the parent
//! log itself and team sidecars appearing next to it. Side-chain logs under
//! `{session}/subagents/` are not watched; the parent log is always written
//! when a subagent starts or finishes, and each rebuild rescans them.

use crate::error::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A filesystem change the rebuild loop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsSignal {
    /// The parent log was created or written.
    ParentWritten,
    /// Another `.jsonl` file appeared in the parent's directory.
    SiblingCreated,
}

/// Map a raw notify event to the signals it carries.
pub fn classify_event(event: &Event, parent: &Path) -> Vec<FsSignal> {
    let parent_name = parent.file_name();
    let mut signals = Vec::new();

    for path in &event.paths {
        let is_parent = path.file_name() == parent_name;
        let signal = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) if is_parent => FsSignal::ParentWritten,
            EventKind::Create(_) if is_jsonl(path) => FsSignal::SiblingCreated,
            _ => continue,
        };
        if !signals.contains(&signal) {
            signals.push(signal);
        }
    }

    signals
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().map(|ext| ext == "jsonl").unwrap_or(false)
}

/// Directory the parent log lives in.
pub(crate) fn parent_dir(parent: &Path) -> PathBuf {
    parent
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

/// Start watching the directory of `parent`.
///
/// Signals and watch errors are forwarded on the returned channel. The
/// watcher must be kept alive for as long as events are wanted.
pub fn watch_parent(
    parent: &Path,
) -> Result<(
    RecommendedWatcher,
    mpsc::UnboundedReceiver<notify::Result<FsSignal>>,
)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let target = parent.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for signal in classify_event(&event, &target) {
                let _ = tx.send(Ok(signal));
            }
        }
        Err(e) => {
            let _ = tx.send(Err(e));
        }
    })?;

    let dir = parent_dir(parent);
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(dir = %dir.display(), "Watching session directory");

    Ok((watcher, rx))
}
