//! Research team entry point.
//!
//! Builds the `researcher → analyst → strategist` graph once and runs it
//! for any number of independent requests.

use std::sync::Arc;

use crate::agents::{AnalystStage, ResearcherStage, StrategistStage, ANALYST, RESEARCHER, STRATEGIST};
use crate::completion::{EchoCompleter, HttpCompleter, TextCompleter};
use crate::config::{AppConfig, ResearchConfig};
use crate::error::{GraphValidationError, SetupError, StageError};
use crate::state::{Message, ResearchOutcome, SharedState};
use crate::tools::{ProcessConnector, ToolClient, ToolConnector};
use crate::workflow::{GraphBuilder, WorkflowGraph, END};

/// Opening message of a run when the caller supplies none.
pub const START_MESSAGE: &str = "Start research";

pub struct ResearchTeam {
    graph: WorkflowGraph<SharedState>,
    connector: Arc<dyn ToolConnector>,
    completer: Arc<dyn TextCompleter>,
}

impl ResearchTeam {
    pub fn new(
        connector: Arc<dyn ToolConnector>,
        completer: Arc<dyn TextCompleter>,
        client: ToolClient,
        research: &ResearchConfig,
    ) -> Result<Self, GraphValidationError> {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(
                RESEARCHER,
                ResearcherStage::new(connector.clone(), client, &research.tool, &research.query),
            )
            .add_node(ANALYST, AnalystStage::new(completer.clone()))
            .add_node(STRATEGIST, StrategistStage::new(completer.clone()))
            .set_entry_point(RESEARCHER)
            .add_edge(RESEARCHER, ANALYST)
            .add_edge(ANALYST, STRATEGIST)
            .add_edge(STRATEGIST, END);

        Ok(Self {
            graph: builder.build()?,
            connector,
            completer,
        })
    }

    /// Wire the team from configuration. `offline` swaps the HTTP model for
    /// [`EchoCompleter`].
    pub fn from_config(config: &AppConfig, offline: bool) -> Result<Self, SetupError> {
        let completer: Arc<dyn TextCompleter> = if offline {
            Arc::new(EchoCompleter)
        } else {
            Arc::new(HttpCompleter::new(&config.completion)?)
        };
        let connector = Arc::new(ProcessConnector::new(config.tool_host.launch_spec()?));
        let client = ToolClient::new(config.tool_host.client_config());
        Ok(Self::new(connector, completer, client, &config.research)?)
    }

    pub fn graph(&self) -> &WorkflowGraph<SharedState> {
        &self.graph
    }

    pub fn describe(&self) -> String {
        format!(
            "tools: {}, completion: {}",
            self.connector.describe(),
            self.completer.describe()
        )
    }

    /// Run and keep the full state, messages included.
    pub async fn run(&self, initial: SharedState) -> Result<SharedState, StageError<SharedState>> {
        self.graph.run(initial).await
    }

    /// Run from a conversation and return the three report fields.
    pub async fn run_workflow(
        &self,
        initial_messages: Vec<Message>,
    ) -> Result<ResearchOutcome, StageError<SharedState>> {
        let messages = if initial_messages.is_empty() {
            vec![Message::user(START_MESSAGE)]
        } else {
            initial_messages
        };
        let state = self.run(SharedState::new(messages)).await?;
        Ok(ResearchOutcome::from(state))
    }
}
