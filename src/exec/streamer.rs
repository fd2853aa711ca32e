// src/exec/streamer.rs

//! Line streamer: turns a child's byte stream into text lines on a channel.

use std::future::{Future, pending};
use std::pin::pin;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::types::{OverflowPolicy, StreamKind};

/// Sending half of one output stream, with its overflow policy applied.
#[derive(Debug)]
pub struct LineSink {
    tx: mpsc::Sender<String>,
    overflow: OverflowPolicy,
    consumer_gone: bool,
    dropped: usize,
}

impl LineSink {
    pub fn new(tx: mpsc::Sender<String>, overflow: OverflowPolicy) -> Self {
        Self {
            tx,
            overflow,
            consumer_gone: false,
            dropped: 0,
        }
    }

    /// Number of lines discarded under [`OverflowPolicy::DropNewest`].
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    async fn deliver(&mut self, line: String) {
        if self.consumer_gone {
            return;
        }

        let delivered = match self.overflow {
            OverflowPolicy::Block => self.tx.send(line).await.is_ok(),
            OverflowPolicy::DropNewest => match self.tx.try_send(line) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.dropped += 1;
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        };

        if !delivered {
            // Keep reading anyway so the child never stalls on a full pipe.
            debug!("consumer dropped its receiver; discarding remaining lines");
            self.consumer_gone = true;
        }
    }
}

/// Read `source` until end-of-stream or a read error, forwarding each line
/// (terminator included) to `sink` in arrival order.
///
/// A final line without a trailing newline is still forwarded. Invalid UTF-8
/// is replaced rather than treated as an error. The source is dropped, and
/// therefore closed, before this returns.
///
/// Returns the number of lines read.
pub async fn stream_lines<R>(source: R, sink: LineSink, stream: StreamKind) -> usize
where
    R: AsyncRead + Unpin,
{
    stream_lines_until(source, sink, stream, pending::<()>()).await
}

/// Like [`stream_lines`], but gives up on the source once `stop` has
/// resolved and the next read would block.
///
/// Data that is already readable is always drained first, and bytes of an
/// unterminated line read before stopping are forwarded as a final line.
pub async fn stream_lines_until<R, S>(
    source: R,
    mut sink: LineSink,
    stream: StreamKind,
    stop: S,
) -> usize
where
    R: AsyncRead + Unpin,
    S: Future<Output = ()>,
{
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    let mut lines = 0usize;
    let mut stop = pin!(stop);

    loop {
        buf.clear();
        let read = tokio::select! {
            // Readable data wins over the stop request.
            biased;
            read = reader.read_until(b'\n', &mut buf) => Some(read),
            _ = &mut stop => None,
        };

        match read {
            Some(Ok(0)) => break,
            Some(Ok(_)) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                debug!(%stream, "{}", line.trim_end_matches(['\r', '\n']));
                sink.deliver(line).await;
                lines += 1;
            }
            Some(Err(e)) => {
                warn!(%stream, error = %e, "read failed; stopping line streamer");
                break;
            }
            None => {
                if !buf.is_empty() {
                    sink.deliver(String::from_utf8_lossy(&buf).into_owned()).await;
                    lines += 1;
                }
                warn!(%stream, "source still open after stop request; no longer reading");
                break;
            }
        }
    }

    if sink.dropped() > 0 {
        warn!(
            %stream,
            dropped = sink.dropped(),
            "consumer fell behind; lines were dropped"
        );
    }

    debug!(%stream, lines, "line streamer finished");
    lines
}
