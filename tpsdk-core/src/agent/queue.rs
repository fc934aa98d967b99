use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::transport::AgentTransport;

const LOG_PREVIEW_CHARS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    DevelopmentSession,
    ReportTest,
    ReportStep,
    ReportDriverCommand,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::DevelopmentSession => "/api/development/session",
            Endpoint::ReportTest => "/api/development/report/test",
            Endpoint::ReportStep => "/api/development/report/step",
            Endpoint::ReportDriverCommand => "/api/development/report/command",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::DevelopmentSession => "session",
            Endpoint::ReportTest => "test",
            Endpoint::ReportStep => "step",
            Endpoint::ReportDriverCommand => "command",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub payload: Value,
    pub url: String,
    pub token: String,
    pub endpoint: Endpoint,
}

/// Single-worker delivery queue. Items are posted strictly in push order;
/// failures are logged and dropped.
pub struct ReportQueue {
    sender: mpsc::UnboundedSender<QueueItem>,
    pending: Arc<watch::Sender<usize>>,
}

impl ReportQueue {
    /// Spawns the worker on the current Tokio runtime.
    pub fn spawn(transport: Arc<dyn AgentTransport>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        tokio::spawn(run_worker(receiver, transport, Arc::clone(&pending)));
        Self { sender, pending }
    }

    pub fn push(&self, item: QueueItem) {
        self.pending.send_modify(|count| *count += 1);
        if let Err(err) = self.sender.send(item) {
            self.pending
                .send_modify(|count| *count = count.saturating_sub(1));
            warn!(target: "queue", endpoint = %err.0.endpoint, "worker gone, report dropped");
        }
    }

    /// Items pushed and not yet delivered, including the one in flight.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once every pushed item has been handled.
    pub async fn drain(&self) {
        let mut pending = self.pending.subscribe();
        let _ = pending.wait_for(|count| *count == 0).await;
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<QueueItem>,
    transport: Arc<dyn AgentTransport>,
    pending: Arc<watch::Sender<usize>>,
) {
    while let Some(item) = receiver.recv().await {
        deliver(transport.as_ref(), &item).await;
        pending.send_modify(|count| *count = count.saturating_sub(1));
    }
    debug!(target: "queue", "report queue closed");
}

async fn deliver(transport: &dyn AgentTransport, item: &QueueItem) {
    debug!(
        target: "queue",
        endpoint = %item.endpoint,
        payload = %preview(&item.payload),
        "delivering report"
    );
    if let Err(err) = transport.post(&item.url, &item.token, &item.payload).await {
        warn!(target: "queue", endpoint = %item.endpoint, url = %item.url, "report delivery failed: {err}");
    }
}

fn preview(payload: &Value) -> String {
    let text = payload.to_string();
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text;
    }
    let mut truncated: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    truncated.push_str("...");
    truncated
}
