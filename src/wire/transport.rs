// Line Transport - One envelope per line
//
// Serialization happens at the transport boundary: senders hand complete
// envelopes to a single writer task over a channel, so concurrent sends
// can never interleave partial output. Reading is line-at-a-time; a
// malformed line is reported as a ProtocolError and must not corrupt
// the processing of subsequent lines.

use crate::wire::Envelope;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Transport-level errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed message line: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport closed")]
    Closed,

    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse one input line into an envelope
pub fn decode_line(line: &str) -> Result<Envelope, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Serialize an envelope to a single output line (without the newline)
pub fn encode_line(envelope: &Envelope) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Handle for the exclusive output writer
///
/// A background task owns the write half and drains a channel of
/// envelopes, emitting exactly one line each. Cloning the handle shares
/// the same writer task.
#[derive(Clone)]
pub struct LineWriter {
    tx: mpsc::Sender<Envelope>,
}

impl LineWriter {
    /// Spawn the writer task over the given output
    pub fn spawn<W>(writer: W, capacity: usize) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Envelope>(capacity);
        let handle = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(envelope) = rx.recv().await {
                let line = match encode_line(&envelope) {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!(%err, "dropping unserializable envelope");
                        continue;
                    }
                };
                tracing::debug!(dest = %envelope.dest, kind = %envelope.body.kind, "sending");
                if writer.write_all(line.as_bytes()).await.is_err()
                    || writer.write_all(b"\n").await.is_err()
                    || writer.flush().await.is_err()
                {
                    tracing::warn!("output closed, stopping writer");
                    break;
                }
            }
        });
        (Self { tx }, handle)
    }

    /// Enqueue an envelope for emission
    pub async fn deliver(&self, envelope: Envelope) -> Result<(), ProtocolError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| ProtocolError::Closed)
    }
}
