//! Commit history as chunks: one per `git log` line.

use std::path::Path;

use tokio::process::Command;

use crate::chunk::Chunk;

const LOG_FORMAT: &str = "--pretty=format:%H|%ad|%s";
const FIELD_DELIMITER: char = '|';

/// Split `sha|date|subject`; the subject keeps any further delimiters.
///
/// Returns `None` unless the line has all three fields and a non-blank subject.
#[must_use]
pub fn parse_commit_line(line: &str) -> Option<Chunk> {
    let mut parts = line.splitn(3, FIELD_DELIMITER);
    let (Some(sha), Some(date), Some(message)) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if message.trim().is_empty() {
        return None;
    }
    Some(Chunk::commit(sha, date, message))
}

/// Read the commit log of `root`, newest first.
///
/// A missing `git` binary or a directory that is not a repository yields no
/// commits rather than an error.
pub async fn extract_commits(root: &Path) -> Vec<Chunk> {
    let output = match Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["log", LOG_FORMAT, "--date=short"])
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(root = %root.display(), "git log could not run: {e}");
            return Vec::new();
        }
    };

    if !output.status.success() {
        tracing::debug!(
            root = %root.display(),
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git log failed, no commits extracted"
        );
        return Vec::new();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut dropped = 0usize;
    let commits: Vec<Chunk> = stdout
        .lines()
        .filter_map(|line| {
            let parsed = parse_commit_line(line);
            if parsed.is_none() {
                dropped += 1;
            }
            parsed
        })
        .collect();

    if dropped > 0 {
        tracing::debug!(dropped, "malformed commit lines skipped");
    }
    commits
}
