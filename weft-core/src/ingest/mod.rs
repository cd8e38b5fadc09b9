//! Ingestion layer: from raw log lines to classified messages
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌───────────────────┐
//! │  JSONL line  │ ─► │ decode_line  │ ─► │  classify    │ ─► │ ClassifiedMessage │
//! │ (append-only)│    │ (RawRecord)  │    │ (+ sanitize) │    │  or dropped       │
//! └──────────────┘    └──────────────┘    └──────────────┘    └───────────────────┘
//!        ▲
//!        │ read_incremental(path, offset) only touches bytes after `offset`
//! ```
//!
//! ## Design Principles
//!
//! 1. **Resilience**: a malformed line is skipped, never an error
//! 2. **Incremental**: byte offsets let the caller resume where it stopped
//! 3. **Complete lines only**: a line still being written is left for later

pub mod classify;
pub mod reader;
pub mod record;
pub mod sanitize;

pub use classify::{classify, Origin};
pub use reader::{
    read_first_record, read_incremental, read_session_meta, resume_incremental, ReadBatch,
    SessionMeta,
};
pub use record::{decode_line, RawRecord};
