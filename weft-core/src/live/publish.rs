//! Single-slot publication of snapshots and errors
//!
//! Both channels hold only the newest value: a consumer that falls behind
//! skips straight to the latest snapshot. Publishing never blocks. Once
//! the [`Publisher`] is dropped, a [`Subscriber`] still receives the last
//! value it has not seen and then observes closure.

use super::Snapshot;
use crate::error::Error;
use std::sync::Arc;
use tokio::sync::watch;

/// Sending half, owned by the rebuild loop.
#[derive(Debug)]
pub struct Publisher {
    snapshots: watch::Sender<Option<Arc<Snapshot>>>,
    errors: watch::Sender<Option<Arc<Error>>>,
}

/// Receiving half, owned by the consumer.
#[derive(Debug, Clone)]
pub struct Subscriber {
    snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
    errors: watch::Receiver<Option<Arc<Error>>>,
}

pub fn channel() -> (Publisher, Subscriber) {
    let (snapshot_tx, snapshot_rx) = watch::channel(None);
    let (error_tx, error_rx) = watch::channel(None);
    (
        Publisher {
            snapshots: snapshot_tx,
            errors: error_tx,
        },
        Subscriber {
            snapshots: snapshot_rx,
            errors: error_rx,
        },
    )
}

impl Publisher {
    /// Replace the pending snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        self.snapshots.send_replace(Some(Arc::new(snapshot)));
    }

    /// Replace the pending error.
    pub fn report(&self, error: Error) {
        tracing::warn!(error = %error, "Live session error");
        self.errors.send_replace(Some(Arc::new(error)));
    }
}

impl Subscriber {
    /// Wait for a snapshot newer than the last one returned.
    ///
    /// Returns `None` once the publisher is gone and nothing unseen remains.
    pub async fn next_snapshot(&mut self) -> Option<Arc<Snapshot>> {
        self.snapshots.changed().await.ok()?;
        self.snapshots.borrow_and_update().clone()
    }

    /// Most recent snapshot, seen or not.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.borrow().clone()
    }

    /// Wait for an error newer than the last one returned.
    pub async fn next_error(&mut self) -> Option<Arc<Error>> {
        self.errors.changed().await.ok()?;
        self.errors.borrow_and_update().clone()
    }
}
