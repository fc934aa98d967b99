use std::io;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

const PROBE: &[u8] = b"test";

/// Development socket paired with an Agent session. The Agent watches it to
/// learn that the client is still alive; nothing is read from it.
#[derive(Debug, Default)]
pub struct SideChannel {
    stream: Mutex<Option<TcpStream>>,
}

impl SideChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, host: &str, port: u16) -> io::Result<()> {
        let mut stream = self.stream.lock().await;
        if stream.is_some() {
            debug!(target: "socket", host, port, "development socket already open");
            return Ok(());
        }
        *stream = Some(TcpStream::connect((host, port)).await?);
        info!(target: "socket", host, port, "development socket connected");
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Writes the liveness probe. A failed write drops the stream.
    pub async fn probe(&self) -> bool {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return false;
        };
        match stream.write_all(PROBE).await {
            Ok(()) => true,
            Err(err) => {
                debug!(target: "socket", "development socket probe failed: {err}");
                *guard = None;
                false
            }
        }
    }

    /// Returns `false` when there was nothing left to close.
    pub async fn close(&self) -> bool {
        let Some(mut stream) = self.stream.lock().await.take() else {
            debug!(target: "socket", "development socket already closed");
            return false;
        };
        if let Err(err) = stream.shutdown().await {
            debug!(target: "socket", "development socket shutdown: {err}");
        }
        info!(target: "socket", "development socket closed");
        true
    }
}
