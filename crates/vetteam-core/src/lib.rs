//! Vetteam Core: a veterinary market research team as a stage graph.
//!
//! Two pieces carry the weight:
//!
//! - `workflow`: a validated graph of named stages threading typed state
//!   from an entry node to the `__end__` sentinel
//! - `tools`: a tool host and client speaking line-delimited JSON-RPC over
//!   a child process's stdio (or an in-memory pipe)
//!
//! The research team (`agents`, `pipeline`) wires both together with a
//! text-completion backend. Nothing here prints or parses CLI flags;
//! see `vetteam-cli` for that.

pub mod agents;
pub mod completion;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rpc;
pub mod state;
pub mod tools;
pub mod transport;
pub mod workflow;

// Convenience re-exports
pub use completion::{EchoCompleter, HttpCompleter, TextCompleter};
pub use config::AppConfig;
pub use error::{SetupError, StageError, ToolClientError};
pub use pipeline::ResearchTeam;
pub use state::{Message, ResearchOutcome, SharedState};
