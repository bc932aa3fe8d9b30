//! Sequential execution of a validated graph.
//!
//! A run starts at the entry node, merges each stage's update into the
//! accumulated state, follows the node's transition and stops at [`END`].
//! The first failing stage aborts the run; the error carries the state
//! as of the last merged update.

use std::collections::HashSet;
use std::time::Instant;

use uuid::Uuid;

use super::graph::{Transition, WorkflowGraph};
use super::{WorkflowState, END};
use crate::error::{BoxError, StageError};

impl<S: WorkflowState> WorkflowGraph<S> {
    /// Run the graph to completion. Independent runs may execute concurrently.
    pub async fn run(&self, initial: S) -> Result<S, StageError<S>> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut state = initial;
        let mut current = self.entry.clone();
        let mut visited: HashSet<String> = HashSet::new();

        tracing::info!("[Workflow] Run {} started at '{}'", run_id, current);

        while current != END {
            if !visited.insert(current.clone()) {
                return Err(fail(current, "node visited twice in one run", state));
            }
            let Some(stage) = self.nodes.get(&current) else {
                return Err(fail(current, "node is not part of the graph", state));
            };

            tracing::info!("[Workflow] Run {} -> '{}'", run_id, current);
            let node_started = Instant::now();
            match stage.run(&state).await {
                Ok(update) => state.apply(update),
                Err(source) => {
                    tracing::warn!("[Workflow] Run {} failed at '{}': {}", run_id, current, source);
                    return Err(StageError {
                        node: current,
                        source,
                        state,
                    });
                }
            }
            tracing::debug!(
                "[Workflow] Run {} '{}' completed in {}ms",
                run_id,
                current,
                node_started.elapsed().as_millis()
            );

            current = match self.transitions.get(&current) {
                Some(Transition::To(target)) => target.clone(),
                Some(Transition::Conditional { router, targets }) => {
                    let target = router(&state);
                    if !targets.contains(&target) {
                        let reason = format!("router chose undeclared target '{}'", target);
                        return Err(fail(current, reason, state));
                    }
                    target
                }
                None => return Err(fail(current, "no outgoing transition", state)),
            };
        }

        tracing::info!(
            "[Workflow] Run {} completed ({} node(s), {}ms)",
            run_id,
            visited.len(),
            started.elapsed().as_millis()
        );
        Ok(state)
    }
}

fn fail<S: WorkflowState>(node: String, reason: impl Into<BoxError>, state: S) -> StageError<S> {
    StageError {
        node,
        source: reason.into(),
        state,
    }
}
