//! Strategy stage: market report → business model canvas.

use std::sync::Arc;

use async_trait::async_trait;

use super::prompts::strategist_prompt;
use crate::completion::TextCompleter;
use crate::error::BoxError;
use crate::state::{Message, SharedState, StateUpdate};
use crate::workflow::Stage;

pub struct StrategistStage {
    completer: Arc<dyn TextCompleter>,
}

impl StrategistStage {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

#[async_trait]
impl Stage<SharedState> for StrategistStage {
    async fn run(&self, state: &SharedState) -> Result<StateUpdate, BoxError> {
        let report = state.analyst_report.as_deref().unwrap_or_default();
        tracing::info!("[Strategist] Drafting strategy from {} chars of report", report.len());

        let strategy = self.completer.complete(&strategist_prompt(report)).await?;
        Ok(StateUpdate::business_strategy(strategy.clone()).with_message(Message::assistant(strategy)))
    }
}
