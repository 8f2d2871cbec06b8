//! Replays a [`Script`] over one client connection.
//!
//! Lines are consumed strictly in order. An unconditional line sends its
//! response straight away; a pattern line reads client messages until one
//! matches, then sends. Each read is treated as one complete message.

use crate::script::{Expectation, Script};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Read buffer size for a single client message
const MESSAGE_SIZE: usize = 4096;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every script line was consumed.
    Completed { lines: usize },
    /// The client disconnected while the given (0-based) line awaited a match.
    PeerClosed { line: usize },
}

/// Run `script` to completion over `stream`.
pub async fn run<S>(script: &Script, stream: &mut S) -> Result<SessionOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(MESSAGE_SIZE);

    for (i, line) in script.lines().iter().enumerate() {
        match &line.expectation {
            Expectation::Unconditional => {
                info!(line = i + 1, "null");
            }
            Expectation::Pattern(re) => {
                info!(line = i + 1, pattern = %re, "awaiting match");

                loop {
                    buffer.clear();
                    let n = stream
                        .read_buf(&mut buffer)
                        .await
                        .map_err(|source| SessionError::Receive { line: i + 1, source })?;
                    if n == 0 {
                        debug!(line = i + 1, "Connection closed by client");
                        return Ok(SessionOutcome::PeerClosed { line: i });
                    }

                    info!(
                        message = %String::from_utf8_lossy(&buffer),
                        "recv msg from client"
                    );

                    if re.is_match(&buffer) {
                        break;
                    }
                    debug!(line = i + 1, "no match, waiting for next message");
                }
            }
        }

        info!(
            answer = %String::from_utf8_lossy(&line.response),
            "send the answer"
        );
        stream
            .write_all(&line.response)
            .await
            .map_err(|source| SessionError::Send { line: i + 1, source })?;
    }

    stream
        .flush()
        .await
        .map_err(|source| SessionError::Send {
            line: script.len(),
            source,
        })?;

    Ok(SessionOutcome::Completed {
        lines: script.len(),
    })
}

/// Per-connection errors. Line numbers are 1-based.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("send msg error on line {line}: {source}")]
    Send { line: usize, source: std::io::Error },
    #[error("recv msg error on line {line}: {source}")]
    Receive { line: usize, source: std::io::Error },
}

impl SessionError {
    /// Send failures terminate the responder; receive failures only drop the client.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Send { .. })
    }
}
