//! Where a research session's tool host comes from.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::{ToolClient, ToolSession};
use super::host::ToolHost;
use crate::error::ToolClientError;
use crate::transport::{LaunchSpec, Transport};

/// Produces a fresh, ready session per call.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self, client: &ToolClient) -> Result<ToolSession, ToolClientError>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// Launches the host as a child process speaking over stdio.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    spec: LaunchSpec,
}

impl ProcessConnector {
    pub fn new(spec: LaunchSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }
}

#[async_trait]
impl ToolConnector for ProcessConnector {
    async fn connect(&self, client: &ToolClient) -> Result<ToolSession, ToolClientError> {
        client.open(&self.spec).await
    }

    fn describe(&self) -> String {
        self.spec.display()
    }
}

/// Serves a host on an in-memory pipe inside this process.
#[derive(Clone)]
pub struct InProcessConnector {
    host: Arc<ToolHost>,
}

impl InProcessConnector {
    pub fn new(host: ToolHost) -> Self {
        Self {
            host: Arc::new(host),
        }
    }
}

const IN_PROCESS_BUFFER: usize = 256 * 1024;

#[async_trait]
impl ToolConnector for InProcessConnector {
    async fn connect(&self, client: &ToolClient) -> Result<ToolSession, ToolClientError> {
        let (client_io, host_io) = tokio::io::duplex(IN_PROCESS_BUFFER);
        let host = self.host.clone();
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(host_io);
            if let Err(e) = host.serve(reader, writer).await {
                tracing::debug!("[ToolHost] in-process connection ended: {}", e);
            }
        });

        let (reader, writer) = tokio::io::split(client_io);
        client
            .connect(Transport::from_io(self.describe(), reader, writer))
            .await
    }

    fn describe(&self) -> String {
        format!("in-process:{}", self.host.info().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionStatus;
    use crate::tools::vet_market::vet_market_host;

    #[tokio::test]
    async fn test_in_process_sessions_are_independent() {
        let connector = InProcessConnector::new(vet_market_host().unwrap());
        let client = ToolClient::default();

        let first = connector.connect(&client).await.unwrap();
        let second = connector.connect(&client).await.unwrap();
        first.close().await;

        assert_eq!(first.status(), SessionStatus::Closed);
        assert_eq!(second.status(), SessionStatus::Ready);
        assert_eq!(second.discover().await.unwrap().len(), 1);
        second.close().await;
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_connect_error() {
        let connector = ProcessConnector::new(LaunchSpec::new(
            "/nonexistent/vetteam-tool-host",
            Vec::<String>::new(),
        ));
        let err = connector.connect(&ToolClient::default()).await.unwrap_err();
        assert!(matches!(err, ToolClientError::Connect(_)));
        assert_eq!(connector.describe(), "/nonexistent/vetteam-tool-host");
    }
}
