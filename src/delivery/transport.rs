//! Outbound transports
//!
//! A [`Transport`] accepts one serialised event at a time and hands back a
//! [`PublishHandle`] immediately; the handle resolves once the transport has
//! acknowledged or rejected the payload.

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::types::{PublisherConfig, TransportConfig};

/// Per-request timeout of the HTTP transport
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The destination refused the payload
    #[error("Publish rejected: {0}")]
    Rejected(String),

    /// HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Writer failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The transport no longer accepts payloads
    #[error("Transport closed")]
    Closed,
}

/// Identifier assigned to an acknowledged payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pending publish result
pub type PublishHandle = BoxFuture<'static, Result<MessageId, TransportError>>;

/// Where events are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Project identifier
    pub project_id: String,
    /// Topic name
    pub topic: String,
}

impl Destination {
    /// Create a destination
    pub fn new(project_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self { project_id: project_id.into(), topic: topic.into() }
    }

    /// Destination named by a publisher configuration
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self::new(&config.gcp_project_id, &config.pubsub_topic_name)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/topics/{}", self.project_id, self.topic)
    }
}

/// Message sink for serialised events
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Hand a payload over without waiting for the outcome
    fn publish(&self, destination: &Destination, payload: Vec<u8>) -> PublishHandle;

    /// Push out anything still buffered
    async fn flush(&self) -> Result<(), TransportError>;
}

/// Build the transport selected by configuration
pub fn transport_from_config(
    config: &TransportConfig,
) -> Result<Arc<dyn Transport>, TransportError> {
    match config {
        TransportConfig::Stdout => Ok(Arc::new(StdoutTransport::new())),
        TransportConfig::Http { endpoint } => Ok(Arc::new(HttpTransport::new(endpoint)?)),
    }
}

enum WriterCommand {
    Line(Vec<u8>, oneshot::Sender<io::Result<()>>),
    Flush(oneshot::Sender<io::Result<()>>),
}

/// Writes each payload as one NDJSON line
///
/// Lines are written by a dedicated task in dispatch order, so the transport
/// must be created inside a Tokio runtime.
pub struct StdoutTransport {
    commands: mpsc::UnboundedSender<WriterCommand>,
    sequence: AtomicU64,
}

impl StdoutTransport {
    /// Transport writing to the process's stdout
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }

    /// Transport writing to an arbitrary async sink
    pub fn with_writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(write_lines(writer, receiver));
        Self { commands, sequence: AtomicU64::new(0) }
    }
}

async fn write_lines<W>(mut writer: W, mut commands: mpsc::UnboundedReceiver<WriterCommand>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let (result, done) = match command {
            WriterCommand::Line(mut line, done) => {
                line.push(b'\n');
                (writer.write_all(&line).await, done)
            }
            WriterCommand::Flush(done) => (writer.flush().await, done),
        };
        if let Err(e) = &result {
            warn!("Stdout transport write failed: {}", e);
        }
        // the publisher may have stopped waiting for this outcome
        let _ = done.send(result);
    }
}

impl fmt::Debug for StdoutTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutTransport")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    fn publish(&self, _destination: &Destination, payload: Vec<u8>) -> PublishHandle {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let (done, written) = oneshot::channel();
        if self.commands.send(WriterCommand::Line(payload, done)).is_err() {
            return future::ready(Err(TransportError::Closed)).boxed();
        }

        async move {
            written.await.map_err(|_| TransportError::Closed)??;
            Ok(MessageId(id.to_string()))
        }
        .boxed()
    }

    async fn flush(&self) -> Result<(), TransportError> {
        let (done, flushed) = oneshot::channel();
        self.commands.send(WriterCommand::Flush(done)).map_err(|_| TransportError::Closed)?;
        flushed.await.map_err(|_| TransportError::Closed)??;
        Ok(())
    }
}

/// POSTs each payload to `{endpoint}/projects/{project}/topics/{topic}`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    sequence: Arc<AtomicU64>,
}

impl HttpTransport {
    /// Create a transport for a base URL
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Full URL for a destination
    pub fn url_for(&self, destination: &Destination) -> String {
        format!("{}/{}", self.endpoint, destination)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn publish(&self, destination: &Destination, payload: Vec<u8>) -> PublishHandle {
        let request = self
            .client
            .post(self.url_for(destination))
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        let sequence = Arc::clone(&self.sequence);

        async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let message = match response.text().await {
                    Ok(body) => body,
                    Err(e) => format!("<unreadable body: {}>", e),
                };
                return Err(TransportError::Rejected(format!("{}: {}", status, message)));
            }

            let body = response.text().await?;
            let id = match body.trim() {
                "" => (sequence.fetch_add(1, Ordering::Relaxed) + 1).to_string(),
                text => text.to_string(),
            };
            debug!("Published message {}", id);
            Ok(MessageId(id))
        }
        .boxed()
    }

    async fn flush(&self) -> Result<(), TransportError> {
        // Requests are awaited by the caller through their handles.
        Ok(())
    }
}
