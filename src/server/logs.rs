//! Reading a member's log file: last-N lines and follow mode.
//!
//! Only line boundaries are interpreted; the content of each line is passed
//! through untouched.

use crate::error::{Error, Result};
use futures::Stream;
use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

/// Delay between polls for new output in follow mode.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn open_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::LogNotFound(path.to_path_buf())
    } else {
        Error::Io(e)
    }
}

/// Decode one raw line, dropping its terminator. Invalid UTF-8 is replaced
/// rather than rejected.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Return the last `count` lines of the file at `path`, oldest first.
///
/// Files shorter than `count` lines are returned whole. A trailing line
/// without a final newline still counts as a line.
///
/// # Errors
///
/// Returns [`Error::LogNotFound`] if the file does not exist.
pub async fn tail_lines(path: &Path, count: usize) -> Result<Vec<String>> {
    let file = File::open(path).await.map_err(|e| open_error(path, e))?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut reader = BufReader::new(file);
    let mut window: VecDeque<String> = VecDeque::with_capacity(count.min(4096));
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if window.len() == count {
            window.pop_front();
        }
        window.push_back(decode_line(&buf));
    }

    Ok(window.into())
}

/// Follow the file at `path` from its current end, yielding each new line.
///
/// The stream never ends on its own: it polls every `poll_interval` for more
/// output. Drop it to stop following. Partial lines are held back until their
/// newline arrives. If the file shrinks (truncated or rotated in place),
/// reading restarts from the beginning.
///
/// The first item is [`Error::LogNotFound`] if the file does not exist; the
/// stream ends after yielding any error.
pub fn follow_lines(path: PathBuf, poll_interval: Duration) -> impl Stream<Item = Result<String>> {
    async_stream::stream! {
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                yield Err(open_error(&path, e));
                return;
            }
        };
        let mut position = match file.seek(SeekFrom::End(0)).await {
            Ok(position) => position,
            Err(e) => {
                yield Err(Error::Io(e));
                return;
            }
        };
        tracing::debug!(path = %path.display(), offset = position, "Following log file");

        let mut reader = BufReader::new(file);
        let mut pending = Vec::new();
        loop {
            let read = match reader.read_until(b'\n', &mut pending).await {
                Ok(read) => read,
                Err(e) => {
                    yield Err(Error::Io(e));
                    return;
                }
            };

            if read > 0 {
                position += read as u64;
                if pending.ends_with(b"\n") {
                    let line = decode_line(&pending);
                    pending.clear();
                    yield Ok(line);
                }
                continue;
            }

            let len = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    yield Err(open_error(&path, e));
                    return;
                }
            };
            if len < position {
                tracing::debug!(path = %path.display(), "Log file truncated, reading from start");
                if let Err(e) = reader.seek(SeekFrom::Start(0)).await {
                    yield Err(Error::Io(e));
                    return;
                }
                position = 0;
                pending.clear();
                continue;
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}
