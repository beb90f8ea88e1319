// src/exec/drain.rs

//! Stream drains: one background task per child output stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Spawn a drain for one output stream on the current runtime.
///
/// The handle resolves to the number of lines forwarded.
pub fn spawn_drain<R>(
    stream: &'static str,
    reader: R,
    tx: mpsc::UnboundedSender<String>,
) -> JoinHandle<usize>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(drain(stream, reader, tx))
}

/// Read `reader` line by line until EOF and push every line into `tx`.
///
/// Lines keep their trailing `\n`; a final unterminated line is forwarded as
/// is. Invalid UTF-8 is replaced rather than dropped. The channel is
/// unbounded so a slow consumer never causes a line to be lost; the drain
/// only stops early when the consumer is gone or the read fails.
pub async fn drain<R>(stream: &str, reader: R, tx: mpsc::UnboundedSender<String>) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarded = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                trace!(stream, "{}", line.trim_end());
                if tx.send(line).is_err() {
                    debug!(stream, forwarded, "consumer dropped; stopping drain");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => {
                warn!(stream, error = %e, "read error; stopping drain");
                break;
            }
        }
    }

    debug!(stream, forwarded, "drain finished");
    forwarded
}
