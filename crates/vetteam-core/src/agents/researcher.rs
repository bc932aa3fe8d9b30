//! Research stage: fetch market data from the tool host.
//!
//! Tool failures never abort the run. Whatever went wrong is written into
//! `research_data` so the downstream stages still have something to work on.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{BoxError, ToolClientError};
use crate::state::{SharedState, StateUpdate};
use crate::tools::{ToolClient, ToolConnector};
use crate::workflow::Stage;

pub const NO_DATA: &str = "No data found.";

pub struct ResearcherStage {
    connector: Arc<dyn ToolConnector>,
    client: ToolClient,
    tool: String,
    query: String,
}

impl ResearcherStage {
    pub fn new(
        connector: Arc<dyn ToolConnector>,
        client: ToolClient,
        tool: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            client,
            tool: tool.into(),
            query: query.into(),
        }
    }

    /// One session per call: connect, discover, invoke, close.
    async fn fetch(&self) -> Result<String, ToolClientError> {
        let session = self.connector.connect(&self.client).await?;

        let outcome = async {
            let tools = session.discover().await?;
            if !tools.iter().any(|t| t.name == self.tool) {
                tracing::warn!(
                    "[Researcher] '{}' not advertised by {}; calling anyway",
                    self.tool,
                    self.connector.describe()
                );
            }

            let mut arguments = Map::new();
            arguments.insert("query".to_string(), Value::String(self.query.clone()));
            let result = session.invoke(&self.tool, arguments).await?;
            tracing::debug!(
                "[Researcher] {} answered (id={}, {} block(s))",
                result.tool,
                result.correlation_id,
                result.content.len()
            );
            Ok::<_, ToolClientError>(result.text())
        }
        .await;

        session.close().await;
        outcome
    }
}

#[async_trait]
impl Stage<SharedState> for ResearcherStage {
    async fn run(&self, _state: &SharedState) -> Result<StateUpdate, BoxError> {
        tracing::info!(
            "[Researcher] Querying '{}' via {}: {}",
            self.tool,
            self.connector.describe(),
            self.query
        );

        let research_data = match self.fetch().await {
            Ok(text) if text.is_empty() => NO_DATA.to_string(),
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("[Researcher] Tool host error: {}", e);
                format!("Error connecting to tool host: {}", e)
            }
        };
        Ok(StateUpdate::research_data(research_data))
    }
}
