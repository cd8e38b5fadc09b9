//! Incremental, offset-based log reader
//!
//! The assistant appends to a session log while we read it, so the last
//! line may be half-written. The reader only consumes `\n`-terminated
//! lines: a trailing partial line is left in place and the returned offset
//! stops right before it, so the next call picks it up once it is complete.
//!
//! Bytes before `from_offset` are never read again. If the file is now
//! shorter than `from_offset` it was replaced or truncated; the reader then
//! starts over from the beginning and reports `reset` so the caller can
//! drop the history it accumulated from the old content.

use super::classify::{classify, Origin};
use super::record::{decode_line, RawRecord};
use crate::error::{Error, Result};
use crate::types::ClassifiedMessage;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Output of one incremental read.
#[derive(Debug, Default)]
pub struct ReadBatch {
    /// Newly classified messages, in file order
    pub messages: Vec<ClassifiedMessage>,
    /// Offset just past the last complete line
    pub offset: u64,
    /// The file shrank below the requested offset and was re-read from 0
    pub reset: bool,
    /// Complete lines that failed to decode (skipped)
    pub skipped_lines: usize,
    /// Newest record timestamp seen so far; pass it to the next
    /// [`resume_incremental`] call.
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Read complete lines appended after `from_offset` and classify them.
///
/// Starts with no known timestamp; use [`resume_incremental`] to continue
/// a chain of reads.
pub fn read_incremental(path: &Path, from_offset: u64, origin: Origin) -> Result<ReadBatch> {
    resume_incremental(path, from_offset, origin, None)
}

/// Continue reading at `from_offset`.
///
/// Records without a timestamp take `last_timestamp` (the previous batch's
/// [`ReadBatch::last_timestamp`]). Before any timestamp is known they wait
/// for the next timestamped record; if none has arrived by the end of the
/// batch, the returned offset stops before them so a later read sees them
/// again. Chaining reads this way stamps every record exactly as one read
/// of the whole file would.
///
/// Returns `offset == from_offset` with no messages when nothing new and
/// complete has arrived. Only I/O failures are errors.
pub fn resume_incremental(
    path: &Path,
    from_offset: u64,
    origin: Origin,
    last_timestamp: Option<DateTime<Utc>>,
) -> Result<ReadBatch> {
    let mut batch = ReadBatch {
        offset: from_offset,
        last_timestamp,
        ..Default::default()
    };
    // Messages still waiting for a timestamp, and where the first one starts.
    let mut unstamped: Vec<ClassifiedMessage> = Vec::new();
    let mut unstamped_from = None;

    scan_lines(path, from_offset, |outcome| {
        match outcome {
            LineOutcome::Reset => {
                batch.reset = true;
                batch.offset = 0;
                batch.last_timestamp = None;
            }
            LineOutcome::Record(record, end) => {
                if let Some(ts) = record.parsed_timestamp() {
                    batch.last_timestamp = Some(ts);
                    for mut msg in unstamped.drain(..) {
                        msg.set_timestamp(ts);
                        batch.messages.push(msg);
                    }
                    unstamped_from = None;
                }
                match batch.last_timestamp {
                    Some(ts) => batch.messages.extend(classify(&record, origin, ts)),
                    None => {
                        if let Some(msg) = classify(&record, origin, DateTime::<Utc>::MIN_UTC) {
                            unstamped_from.get_or_insert(batch.offset);
                            unstamped.push(msg);
                        }
                    }
                }
                batch.offset = end;
            }
            LineOutcome::Skipped(end) => {
                batch.skipped_lines += 1;
                batch.offset = end;
            }
            LineOutcome::Blank(end) => batch.offset = end,
        }
        true
    })?;

    if let Some(from) = unstamped_from {
        tracing::debug!(
            path = %path.display(),
            waiting = unstamped.len(),
            "No timestamp yet, leaving records for the next read"
        );
        batch.offset = from;
    }

    if batch.skipped_lines > 0 {
        tracing::warn!(
            path = %path.display(),
            skipped = batch.skipped_lines,
            "Skipped malformed log lines"
        );
    }
    tracing::trace!(
        path = %path.display(),
        from_offset,
        to_offset = batch.offset,
        messages = batch.messages.len(),
        "Incremental read"
    );

    Ok(batch)
}

/// First decodable record of a log, if any.
pub fn read_first_record(path: &Path) -> Result<Option<RawRecord>> {
    let mut first = None;
    scan_lines(path, 0, |outcome| match outcome {
        LineOutcome::Record(record, _) => {
            first = Some(record);
            false
        }
        _ => true,
    })?;
    Ok(first)
}

/// Session metadata recorded in the log itself.
///
/// The project directory name is a lossy encoding of the working directory,
/// so the authoritative path comes from the `cwd` field of the records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMeta {
    pub session_id: Option<String>,
    pub cwd: Option<PathBuf>,
    pub git_branch: Option<String>,
    pub version: Option<String>,
}

impl SessionMeta {
    fn is_complete(&self) -> bool {
        self.session_id.is_some()
            && self.cwd.is_some()
            && self.git_branch.is_some()
            && self.version.is_some()
    }
}

/// Number of leading records inspected for session metadata.
const META_SCAN_RECORDS: usize = 50;

/// Collect session metadata from the first records that carry it.
pub fn read_session_meta(path: &Path) -> Result<SessionMeta> {
    let mut meta = SessionMeta::default();
    let mut seen = 0usize;

    scan_lines(path, 0, |outcome| {
        if let LineOutcome::Record(record, _) = outcome {
            seen += 1;
            if meta.session_id.is_none() {
                meta.session_id = record.session_id;
            }
            if meta.cwd.is_none() {
                meta.cwd = record.cwd.map(PathBuf::from);
            }
            if meta.git_branch.is_none() {
                meta.git_branch = record.git_branch.filter(|b| !b.is_empty());
            }
            if meta.version.is_none() {
                meta.version = record.version;
            }
        }
        !meta.is_complete() && seen < META_SCAN_RECORDS
    })?;

    Ok(meta)
}

enum LineOutcome {
    /// Requested offset was past EOF; scanning restarted at 0.
    Reset,
    /// A decoded record and the offset just past its line.
    Record(RawRecord, u64),
    /// A complete line that failed to decode.
    Skipped(u64),
    /// A complete whitespace-only line.
    Blank(u64),
}

/// Walk complete lines from `from_offset`, stopping early when `visit`
/// returns false. Partial trailing lines are never visited.
fn scan_lines<F>(path: &Path, from_offset: u64, mut visit: F) -> Result<()>
where
    F: FnMut(LineOutcome) -> bool,
{
    let file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    let file_size = file.metadata()?.len();

    let start_offset = if from_offset > file_size {
        tracing::warn!(
            path = %path.display(),
            checkpoint = from_offset,
            file_size,
            "File truncated, reading from beginning"
        );
        if !visit(LineOutcome::Reset) {
            return Ok(());
        }
        0
    } else {
        from_offset
    };

    if start_offset == file_size {
        return Ok(());
    }

    let mut reader = BufReader::new(file);
    if start_offset > 0 {
        reader.seek(SeekFrom::Start(start_offset))?;
    }

    let mut current_offset = start_offset;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 || buf.last() != Some(&b'\n') {
            // EOF, or a line still being written.
            break;
        }
        current_offset += read as u64;

        let line = String::from_utf8_lossy(&buf);
        let outcome = if line.trim().is_empty() {
            LineOutcome::Blank(current_offset)
        } else {
            match decode_line(&line) {
                Some(record) => LineOutcome::Record(record, current_offset),
                None => LineOutcome::Skipped(current_offset),
            }
        };

        if !visit(outcome) {
            break;
        }
    }

    Ok(())
}
