//! Live rebuild loop
//!
//! Keeps a session's chunks and linked child sessions current as the log
//! grows. Filesystem events are debounced, each quiet window triggers one
//! incremental rebuild, and results are published through a single-slot
//! channel.
//!
//! ## States
//!
//! ```text
//! idle ──event──► debounce pending ──timer──► rebuild in flight ──► idle
//!                   ▲        │
//!                   └─event──┘ (re-arm resets the window)
//! ```

pub mod debounce;
pub mod publish;
pub mod session;
pub mod watch;

pub use debounce::{DebounceTimers, Timer};
pub use publish::{Publisher, Subscriber};
pub use session::{LiveSession, Snapshot};
pub use watch::{classify_event, watch_parent, FsSignal};
