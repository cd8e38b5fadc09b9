//! # weft-core
//!
//! Core library for weft - a live, structured view of AI coding assistant
//! session logs.
//!
//! This library provides:
//! - Incremental, offset-based reading of append-only JSONL session logs
//! - Classification of raw records into a small set of message kinds
//! - Chunking of consecutive assistant activity into display units
//! - Discovery of child sessions (subagents and team members) and linking
//!   them to the tool calls that spawned them
//! - A debounced live rebuild loop publishing snapshots as the log grows
//!
//! ## Architecture
//!
//! Data flows strictly downward:
//! - **Ingest:** line → [`ingest::RawRecord`] → [`ClassifiedMessage`]
//! - **Chunk:** full message sequence → [`Chunk`]s
//! - **Discover + Link:** sidecar files → [`SubagentProcess`]es attached to spawn items
//! - **Live:** filesystem events → debounced rebuild → [`live::Snapshot`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use weft_core::{build_chunks, discover, link, read_incremental, Origin};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let path = Path::new("/path/to/session.jsonl");
//! let batch = read_incremental(path, 0, Origin::Parent).expect("failed to read log");
//!
//! let mut chunks = build_chunks(&batch.messages);
//! let processes: Vec<_> = discover(path)
//!     .expect("failed to scan sidecars")
//!     .into_iter()
//!     .map(Arc::new)
//!     .collect();
//! let report = link(&mut chunks, &processes);
//! println!("{} chunks, {} linked", chunks.len(), report.linked());
//! ```

// Re-export commonly used items at the crate root
pub use chunk::{build_chunks, has_team_spawns};
pub use config::Config;
pub use discovery::discover;
pub use error::{Error, Result};
pub use ingest::{read_incremental, resume_incremental, Origin, ReadBatch};
pub use linking::{link, LinkReport};
pub use live::{LiveSession, Snapshot};
pub use types::*;

// Public modules
pub mod chunk;
pub mod config;
pub mod discovery;
pub mod error;
pub mod ingest;
pub mod linking;
pub mod live;
pub mod logging;
pub mod paths;
pub mod types;
