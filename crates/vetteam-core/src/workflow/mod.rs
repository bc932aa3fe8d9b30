//! Workflow graph: named stages, transitions, and a sequential executor.
//!
//! ```text
//! GraphBuilder::new()
//!     .add_node("researcher", ..)      stage bound to a name
//!     .add_edge("researcher", "analyst")
//!     .add_edge("analyst", END)        END is the terminal sentinel
//!     .set_entry_point("researcher")
//!     .build()?                        validated, immutable WorkflowGraph
//!     .run(initial_state).await        follows transitions until END
//! ```

pub mod executor;
pub mod graph;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::error::BoxError;

pub use graph::{GraphBuilder, Router, WorkflowGraph};

/// Terminal sentinel. Reserved; cannot be used as a node name.
pub const END: &str = "__end__";

/// State that can be threaded through a graph.
pub trait WorkflowState: Clone + Send + Sync + fmt::Debug + 'static {
    /// Partial update a stage returns.
    type Update: Send + 'static;

    /// Merge an update into the accumulated state.
    fn apply(&mut self, update: Self::Update);
}

/// One unit of work in the graph.
#[async_trait]
pub trait Stage<S: WorkflowState>: Send + Sync {
    async fn run(&self, state: &S) -> Result<S::Update, BoxError>;
}

/// Adapts an async closure into a [`Stage`]. The closure receives a clone
/// of the current state.
pub struct FnStage<F>(F);

pub fn stage_fn<F>(f: F) -> FnStage<F> {
    FnStage(f)
}

#[async_trait]
impl<S, F, Fut> Stage<S> for FnStage<F>
where
    S: WorkflowState,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S::Update, BoxError>> + Send,
{
    async fn run(&self, state: &S) -> Result<S::Update, BoxError> {
        (self.0)(state.clone()).await
    }
}
