//! Debounce timers for the rebuild loop
//!
//! Two independent timers: one for parent log writes and one for sibling
//! files appearing while team members spawn. Arming a timer replaces any
//! pending one of the same kind. When a timer fires it only sends a
//! "rebuild now" signal; it never touches pipeline state.
//!
//! Timer state sits behind a mutex taken both when arming/cancelling and
//! when firing, so a timer can never fire after [`DebounceTimers::stop`]
//! returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which timer to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Parent,
    Directory,
}

#[derive(Default)]
struct Slot {
    handle: Option<JoinHandle<()>>,
    /// Bumped on every arm; a firing task only counts if it is current.
    generation: u64,
}

#[derive(Default)]
struct State {
    parent: Slot,
    directory: Slot,
    stopped: bool,
}

impl State {
    fn slot(&mut self, timer: Timer) -> &mut Slot {
        match timer {
            Timer::Parent => &mut self.parent,
            Timer::Directory => &mut self.directory,
        }
    }
}

/// Owner of the parent and directory debounce timers.
pub struct DebounceTimers {
    state: Arc<Mutex<State>>,
    signal: mpsc::Sender<()>,
}

impl DebounceTimers {
    /// `signal` should be a capacity-1 channel read by the loop owner.
    pub fn new(signal: mpsc::Sender<()>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            signal,
        }
    }

    /// (Re)arm `timer` to fire after `delay` of quiet.
    pub fn arm(&self, timer: Timer, delay: Duration) {
        let mut state = lock(&self.state);
        if state.stopped {
            return;
        }

        let slot = state.slot(timer);
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }
        slot.generation += 1;
        let generation = slot.generation;

        let shared = Arc::clone(&self.state);
        let signal = self.signal.clone();
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = lock(&shared);
            if state.stopped || state.slot(timer).generation != generation {
                return;
            }
            state.slot(timer).handle = None;
            // Full means a rebuild is already pending.
            let _ = signal.try_send(());
            tracing::trace!(?timer, "Debounce timer fired");
        }));
    }

    /// Whether `timer` is waiting to fire.
    pub fn is_pending(&self, timer: Timer) -> bool {
        lock(&self.state).slot(timer).handle.is_some()
    }

    /// Cancel both timers. No timer fires after this returns.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        state.stopped = true;
        for timer in [Timer::Parent, Timer::Directory] {
            if let Some(handle) = state.slot(timer).handle.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for DebounceTimers {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
