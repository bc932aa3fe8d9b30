//! `vetteam tool-host`: serve the market research tools over stdio.
//!
//! One JSON-RPC message per line on stdin/stdout; the process exits when
//! stdin closes.

use vetteam_core::tools::vet_market_host;

pub async fn run() -> Result<(), String> {
    let host = vet_market_host().map_err(|e| e.to_string())?;
    tracing::info!("[CLI] Tool host ready on stdio");
    host.serve_stdio().await.map_err(|e| e.to_string())
}
