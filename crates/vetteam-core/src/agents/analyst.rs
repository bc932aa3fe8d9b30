//! Analysis stage: research data → market report.

use std::sync::Arc;

use async_trait::async_trait;

use super::prompts::analyst_prompt;
use crate::completion::TextCompleter;
use crate::error::BoxError;
use crate::state::{Message, SharedState, StateUpdate};
use crate::workflow::Stage;

pub struct AnalystStage {
    completer: Arc<dyn TextCompleter>,
}

impl AnalystStage {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

#[async_trait]
impl Stage<SharedState> for AnalystStage {
    async fn run(&self, state: &SharedState) -> Result<StateUpdate, BoxError> {
        let data = state.research_data.as_deref().unwrap_or_default();
        tracing::info!("[Analyst] Writing report from {} chars of research", data.len());

        let report = self.completer.complete(&analyst_prompt(data)).await?;
        Ok(StateUpdate::analyst_report(report.clone()).with_message(Message::assistant(report)))
    }
}
