//! Session log locations
//!
//! Session logs live at `~/.claude/projects/[encoded-path]/[session-id].jsonl`,
//! where the project directory name is the working directory with every
//! `/`, `.` and `_` replaced by `-`. The encoding is lossy; use
//! [`crate::ingest::read_session_meta`] when the real working directory is
//! needed.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// `~/.claude/projects`
pub fn default_projects_root() -> PathBuf {
    crate::config::home_dir().join(".claude").join("projects")
}

/// Encode a working directory into its project directory name.
pub fn encode_project_path(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '/' | '.' | '_' => '-',
            other => other,
        })
        .collect()
}

/// Log path for a session of the project rooted at `project`.
pub fn session_log_path(projects_root: &Path, project: &Path, session_id: &str) -> PathBuf {
    projects_root
        .join(encode_project_path(&project.to_string_lossy()))
        .join(format!("{session_id}.jsonl"))
}

/// Find a session log by id across all project directories.
pub fn find_session_log(projects_root: &Path, session_id: &str) -> Result<PathBuf> {
    let pattern = format!(
        "{}/*/{}.jsonl",
        glob::Pattern::escape(&projects_root.to_string_lossy()),
        glob::Pattern::escape(session_id)
    );

    let entries = glob::glob(&pattern).map_err(|e| Error::Parse {
        path: projects_root.to_path_buf(),
        message: format!("Invalid glob pattern: {}", e),
    })?;

    entries
        .flatten()
        .find(|path| path.is_file())
        .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
}

/// Directory holding the side-chain logs of a parent session:
/// `{dir}/{stem}/subagents`.
pub fn subagents_dir(parent: &Path) -> PathBuf {
    let stem = parent
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    parent
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(stem)
        .join("subagents")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_project_path() {
        assert_eq!(encode_project_path("/Users/kyle/Code/foo"), "-Users-kyle-Code-foo");
        assert_eq!(
            encode_project_path("/Users/kyle/.config/nvim"),
            "-Users-kyle--config-nvim"
        );
        assert_eq!(
            encode_project_path("/Users/kyle/.claude/worktrees/wt"),
            "-Users-kyle--claude-worktrees-wt"
        );
        assert_eq!(encode_project_path("/srv/my_app"), "-srv-my-app");
    }

    #[test]
    fn test_session_log_path() {
        let path = session_log_path(
            Path::new("/home/u/.claude/projects"),
            Path::new("/home/u/dev/app"),
            "abc-123",
        );
        assert_eq!(
            path,
            PathBuf::from("/home/u/.claude/projects/-home-u-dev-app/abc-123.jsonl")
        );
    }

    #[test]
    fn test_subagents_dir() {
        assert_eq!(
            subagents_dir(Path::new("/p/-proj/sess-1.jsonl")),
            PathBuf::from("/p/-proj/sess-1/subagents")
        );
    }

    #[test]
    fn test_find_session_log() {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("-home-u-dev-app");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("s-42.jsonl"), "").unwrap();

        let found = find_session_log(root.path(), "s-42").unwrap();
        assert_eq!(found, project.join("s-42.jsonl"));

        let missing = find_session_log(root.path(), "nope").unwrap_err();
        assert!(matches!(missing, Error::SessionNotFound(id) if id == "nope"));
    }
}
