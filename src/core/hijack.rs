//! Raw byte relay between a caller and a backend once HTTP framing is gone.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Which event ended a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The caller closed its side (or erred)
    Client,
    /// The backend closed its side (or erred)
    Backend,
    /// The gateway is shutting down
    Cancelled,
}

/// Bytes moved in each direction before the relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub end: RelayEnd,
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// Full-duplex relay between two established connections.
///
/// The relay owns both connections. It stops as soon as either direction reaches
/// end-of-stream or fails, then shuts down both write halves. Errors on either
/// side are treated as normal termination and only logged.
#[derive(Debug, Clone, Default)]
pub struct HijackBridge {
    cancel: CancellationToken,
}

impl HijackBridge {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub async fn relay<C, B>(&self, client: C, backend: B) -> RelaySummary
    where
        C: AsyncRead + AsyncWrite + Unpin,
        B: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut backend_read, mut backend_write) = tokio::io::split(backend);

        let mut client_to_backend = 0u64;
        let mut backend_to_client = 0u64;

        let end = {
            let upstream = copy_counting(&mut client_read, &mut backend_write, &mut client_to_backend);
            let downstream =
                copy_counting(&mut backend_read, &mut client_write, &mut backend_to_client);
            tokio::pin!(upstream, downstream);

            tokio::select! {
                result = &mut upstream => {
                    log_direction("client->backend", result);
                    RelayEnd::Client
                }
                result = &mut downstream => {
                    log_direction("backend->client", result);
                    RelayEnd::Backend
                }
                _ = self.cancel.cancelled() => RelayEnd::Cancelled,
            }
        };

        if let Err(e) = client_write.shutdown().await {
            tracing::debug!(error = %e, "Client shutdown after relay failed");
        }
        if let Err(e) = backend_write.shutdown().await {
            tracing::debug!(error = %e, "Backend shutdown after relay failed");
        }

        let summary = RelaySummary {
            end,
            client_to_backend,
            backend_to_client,
        };
        tracing::debug!(
            end = ?summary.end,
            client_to_backend = summary.client_to_backend,
            backend_to_client = summary.backend_to_client,
            "Relay finished"
        );
        summary
    }
}

async fn copy_counting<R, W>(reader: &mut R, writer: &mut W, total: &mut u64) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *total += n as u64;
    }
}

fn log_direction(direction: &'static str, result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(direction = direction, "Relay side closed"),
        Err(e) => tracing::debug!(direction = direction, error = %e, "Relay side failed"),
    }
}
