//! Shared state threaded through the research workflow.
//!
//! Each stage returns a [`StateUpdate`] naming only the fields it owns;
//! the executor merges it into the running [`SharedState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedState {
    pub messages: Vec<Message>,
    pub research_data: Option<String>,
    pub analyst_report: Option<String>,
    pub business_strategy: Option<String>,
}

impl SharedState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }
}

/// Partial update returned by a stage. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub research_data: Option<String>,
    pub analyst_report: Option<String>,
    pub business_strategy: Option<String>,
}

impl StateUpdate {
    pub fn research_data(data: impl Into<String>) -> Self {
        Self {
            research_data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn analyst_report(report: impl Into<String>) -> Self {
        Self {
            analyst_report: Some(report.into()),
            ..Self::default()
        }
    }

    pub fn business_strategy(strategy: impl Into<String>) -> Self {
        Self {
            business_strategy: Some(strategy.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

impl WorkflowState for SharedState {
    type Update = StateUpdate;

    fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(data) = update.research_data {
            self.research_data = Some(data);
        }
        if let Some(report) = update.analyst_report {
            self.analyst_report = Some(report);
        }
        if let Some(strategy) = update.business_strategy {
            self.business_strategy = Some(strategy);
        }
    }
}

/// Final result handed to the caller of `run_workflow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutcome {
    pub research_data: String,
    pub analyst_report: String,
    pub business_strategy: String,
}

impl From<SharedState> for ResearchOutcome {
    fn from(state: SharedState) -> Self {
        Self {
            research_data: state.research_data.unwrap_or_default(),
            analyst_report: state.analyst_report.unwrap_or_default(),
            business_strategy: state.business_strategy.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_preserves_unmentioned_fields() {
        let mut state = SharedState::new(vec![Message::user("Start research")]);
        state.apply(StateUpdate::research_data("data"));
        state.apply(StateUpdate::analyst_report("report").with_message(Message::assistant("report")));

        assert_eq!(state.research_data.as_deref(), Some("data"));
        assert_eq!(state.analyst_report.as_deref(), Some("report"));
        assert_eq!(state.business_strategy, None);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, MessageRole::User);
        assert_eq!(state.messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn test_empty_update_is_a_no_op() {
        let mut state = SharedState::new(vec![Message::system("s")]);
        state.apply(StateUpdate::research_data("data"));
        let before = state.clone();
        state.apply(StateUpdate::default());
        assert_eq!(state, before);
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let mut state = SharedState::default();
        state.apply(StateUpdate::research_data("r"));
        state.apply(StateUpdate::analyst_report("a"));
        state.apply(StateUpdate::business_strategy("b"));

        let json = serde_json::to_value(ResearchOutcome::from(state)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"researchData": "r", "analystReport": "a", "businessStrategy": "b"})
        );
    }
}
