use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use super::EnumerationError;
use super::token::path_from_bytes;

const READ_CHUNK_BYTES: usize = 64 * 1024;
const STDERR_KEEP_BYTES: usize = 4 * 1024;

/// Result of one bulk listing attempt. Overflow and unavailability are
/// ordinary outcomes the caller branches on, not errors.
#[derive(Debug)]
pub enum BulkOutcome {
    Complete(Vec<PathBuf>),
    Overflow { ceiling: usize },
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct BulkListing<'a> {
    pub program: &'a str,
    pub root: &'a Path,
    pub max_depth: Option<usize>,
    pub name_filter: Option<&'a str>,
    pub ceiling_bytes: usize,
}

impl BulkListing<'_> {
    /// Lists every entry under `root` with one `find` invocation, reading at
    /// most `ceiling_bytes` of output.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BulkOutcome, EnumerationError> {
        // -H follows a symlinked root the way the manual walk does.
        let mut command = tokio::process::Command::new(self.program);
        command.arg("-H").arg(self.root).arg("-mindepth").arg("1");
        if let Some(depth) = self.max_depth {
            command.arg("-maxdepth").arg(depth.to_string());
        }
        if let Some(name) = self.name_filter {
            command.arg("-name").arg(name);
        }
        command
            .arg("-print0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return Ok(BulkOutcome::Unavailable(format!(
                    "failed to launch '{}': {err}",
                    self.program
                )));
            }
        };

        let Some(mut stdout) = child.stdout.take() else {
            return Ok(BulkOutcome::Unavailable(
                "bulk listing produced no output stream".to_string(),
            ));
        };
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move { drain_keeping(&mut stderr, STDERR_KEEP_BYTES).await })
        });

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(EnumerationError::Cancelled);
            }
            read = read_bounded(&mut stdout, self.ceiling_bytes) => read,
        };

        let buffer = match read {
            Ok(Some(buffer)) => buffer,
            Ok(None) => {
                let _ = child.kill().await;
                return Ok(BulkOutcome::Overflow {
                    ceiling: self.ceiling_bytes,
                });
            }
            Err(err) => {
                let _ = child.kill().await;
                return Ok(BulkOutcome::Unavailable(format!(
                    "failed to read bulk listing output: {err}"
                )));
            }
        };

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(EnumerationError::Cancelled);
            }
            status = child.wait() => status,
        };
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                return Ok(BulkOutcome::Unavailable(format!(
                    "failed to wait for '{}': {err}",
                    self.program
                )));
            }
        };

        if !status.success() {
            let stderr = match stderr {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };
            return Ok(BulkOutcome::Unavailable(format!(
                "'{}' exited with {status}: {}",
                self.program,
                stderr.trim()
            )));
        }

        let paths = buffer
            .split(|byte| *byte == 0)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| path_from_bytes(entry.to_vec()))
            .collect::<Vec<PathBuf>>();
        Ok(BulkOutcome::Complete(paths))
    }
}

/// Reads `reader` to the end. Returns `None` as soon as the total would
/// exceed `ceiling` bytes.
async fn read_bounded<R>(reader: &mut R, ceiling: usize) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok(Some(buffer));
        }
        if buffer.len() + read > ceiling {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

async fn drain_keeping<R>(reader: &mut R, keep: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    while let Ok(read) = reader.read(&mut chunk).await {
        if read == 0 {
            break;
        }
        let room = keep.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..read.min(room)]);
    }
    String::from_utf8_lossy(&kept).into_owned()
}
