//! Log file access: tail reads for snapshots, truncation for the
//! clear-logs command.
//!
//! Both operations are best-effort from the daemon's point of view;
//! callers decide how a failure is isolated.

use std::io;
use std::path::Path;

use tokio::fs;

/// How many trailing lines of a process's output log a full snapshot
/// carries.
pub const TAIL_LINES: usize = 100;

/// Reads the last `last_lines` lines of the file at `path`,
/// newline-joined. A shorter file is returned whole.
///
/// The file is read lossily, so stray non-UTF-8 bytes in a log cannot
/// fail the read.
pub async fn read_tail(path: &Path, last_lines: usize) -> io::Result<String> {
    let bytes = fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(last_lines);
    Ok(lines.get(start..).unwrap_or_default().join("\n"))
}

/// Truncates the file at `path` to zero length.
pub async fn truncate_log(path: &Path) -> io::Result<()> {
    fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    Ok(())
}
