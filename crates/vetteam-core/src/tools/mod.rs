//! Tool invocation over a subprocess boundary.
//!
//! - `host`: serves a registry of tools over a framed stream
//! - `client`: handshake, discovery and correlated invocation
//! - `connector`: launch a host process or serve one in-process
//! - `vet_market`: the built-in market research catalogue

pub mod client;
pub mod connector;
pub mod host;
pub mod vet_market;

pub use client::{ClientConfig, ToolClient, ToolInvocationRequest, ToolInvocationResult, ToolSession};
pub use connector::{InProcessConnector, ProcessConnector, ToolConnector};
pub use host::{ConnectionState, ToolHandler, ToolHost};
pub use vet_market::{vet_market_host, SEARCH_VET_MARKET_DATA, VET_MARKET_OVERVIEW};
