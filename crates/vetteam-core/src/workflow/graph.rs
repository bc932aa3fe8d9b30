//! Graph construction and build-time validation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Stage, WorkflowState, END};
use crate::error::GraphValidationError;

/// Picks the next node from the state after a stage has run.
pub type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

pub(crate) enum Transition<S> {
    To(String),
    Conditional { router: Router<S>, targets: Vec<String> },
}

impl<S> Transition<S> {
    fn targets(&self) -> Vec<&str> {
        match self {
            Transition::To(target) => vec![target.as_str()],
            Transition::Conditional { targets, .. } => targets.iter().map(String::as_str).collect(),
        }
    }
}

/// Collects nodes and edges; every check happens in [`GraphBuilder::build`].
pub struct GraphBuilder<S: WorkflowState> {
    nodes: Vec<(String, Arc<dyn Stage<S>>)>,
    edges: Vec<(String, Transition<S>)>,
    entry: Option<String>,
}

impl<S: WorkflowState> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: WorkflowState> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, stage: impl Stage<S> + 'static) -> &mut Self {
        let stage: Arc<dyn Stage<S>> = Arc::new(stage);
        self.nodes.push((name.into(), stage));
        self
    }

    pub fn add_edge(&mut self, source: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.edges.push((source.into(), Transition::To(target.into())));
        self
    }

    /// Branch on state. `router` must return one of `targets`.
    pub fn add_conditional_edges<F>(
        &mut self,
        source: impl Into<String>,
        router: F,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.edges.push((
            source.into(),
            Transition::Conditional {
                router: Arc::new(router),
                targets: targets.into_iter().map(Into::into).collect(),
            },
        ));
        self
    }

    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    /// Validate and freeze the graph.
    pub fn build(&mut self) -> Result<WorkflowGraph<S>, GraphValidationError> {
        let entry = self.entry.take().ok_or(GraphValidationError::MissingEntry)?;

        let mut nodes: HashMap<String, Arc<dyn Stage<S>>> = HashMap::new();
        let mut order = Vec::new();
        for (name, stage) in self.nodes.drain(..) {
            if name == END {
                return Err(GraphValidationError::ReservedName(name));
            }
            if nodes.contains_key(&name) {
                return Err(GraphValidationError::DuplicateNode(name));
            }
            order.push(name.clone());
            nodes.insert(name, stage);
        }

        if !nodes.contains_key(&entry) {
            return Err(GraphValidationError::UnknownEntry(entry));
        }

        let mut transitions: HashMap<String, Transition<S>> = HashMap::new();
        for (source, transition) in self.edges.drain(..) {
            if !nodes.contains_key(&source) {
                return Err(GraphValidationError::UnknownEdgeSource(source));
            }
            for target in transition.targets() {
                if target != END && !nodes.contains_key(target) {
                    return Err(GraphValidationError::UnknownEdgeTarget {
                        source_node: source.clone(),
                        target: target.to_string(),
                    });
                }
            }
            if transitions.contains_key(&source) {
                return Err(GraphValidationError::DuplicateTransition(source));
            }
            transitions.insert(source, transition);
        }

        let reachable = check_reachable(&entry, &transitions)?;
        for name in order.iter().filter(|n| !reachable.contains(n.as_str())) {
            tracing::warn!("[Workflow] Node '{}' is unreachable from '{}'", name, entry);
        }

        Ok(WorkflowGraph {
            entry,
            order,
            nodes,
            transitions,
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first walk from the entry over every possible target.
/// Rejects cycles and reachable nodes without a transition.
fn check_reachable<S>(
    entry: &str,
    transitions: &HashMap<String, Transition<S>>,
) -> Result<HashSet<String>, GraphValidationError> {
    fn visit<S>(
        node: &str,
        transitions: &HashMap<String, Transition<S>>,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
    ) -> Result<(), GraphValidationError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = path.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(node.to_string());
                return Err(GraphValidationError::Cycle(cycle));
            }
            None => {}
        }

        let transition = transitions
            .get(node)
            .ok_or_else(|| GraphValidationError::DeadEnd(node.to_string()))?;

        marks.insert(node.to_string(), Mark::InProgress);
        path.push(node.to_string());
        for target in transition.targets() {
            if target != END {
                visit(target, transitions, marks, path)?;
            }
        }
        path.pop();
        marks.insert(node.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    visit(entry, transitions, &mut marks, &mut Vec::new())?;
    Ok(marks.into_keys().collect())
}

/// A validated, immutable stage graph. Safe to share across concurrent runs.
pub struct WorkflowGraph<S: WorkflowState> {
    pub(crate) entry: String,
    order: Vec<String>,
    pub(crate) nodes: HashMap<String, Arc<dyn Stage<S>>>,
    pub(crate) transitions: HashMap<String, Transition<S>>,
}

impl<S: WorkflowState> WorkflowGraph<S> {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Node names in declaration order.
    pub fn node_names(&self) -> &[String] {
        &self.order
    }
}

impl<S: WorkflowState> std::fmt::Debug for WorkflowGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.order)
            .finish()
    }
}
