//! Built-in tool catalogue: veterinary market research.

use crate::error::HostError;
use crate::rpc::protocol::{InputSchema, ParamType, ToolDescriptor};

use super::host::ToolHost;

pub const HOST_NAME: &str = "Vet Market Researcher";

pub const SEARCH_VET_MARKET_DATA: &str = "search_vet_market_data";

/// Canned market overview returned by `search_vet_market_data`.
pub const VET_MARKET_OVERVIEW: &str = "\
**Veterinary Market Overview (2020-2025)**

*   **Global Market Size:**
    *   2020: Valued at approx. $44.5 Billion USD.
    *   2025 (Projected): Expected to reach $68.5 Billion USD.
    *   CAGR: ~9% during the forecast period.

*   **Key Drivers:**
    *   Rising pet ownership (especially dogs and cats).
    *   Increased spending on animal health and pet insurance.
    *   Technological advancements in veterinary diagnostics.
    *   Humanization of pets leading to premium care demand.

*   **Regional Trends:**
    *   **North America:** Dominates the market due to high pet adoption and advanced healthcare infrastructure.
    *   **Asia-Pacific:** Fastest growing region, driven by rising disposable income in China and India.

*   **Segment Analysis:**
    *   **Diagnostics:** High growth area with new point-of-care devices.
    *   **Therapeutics:** Vaccines and parasiticides remain top revenue generators.
    *   **Telehealth:** Emerging trend for remote consultation.
";

pub fn search_vet_market_data_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        SEARCH_VET_MARKET_DATA,
        "Searches for veterinary market data. Useful for finding market size, \
         trends, and growth from 2020-2025.",
        InputSchema::default().required("query", ParamType::String, "The search query string."),
    )
}

/// Host serving the veterinary market catalogue.
pub fn vet_market_host() -> Result<ToolHost, HostError> {
    let mut host = ToolHost::new(HOST_NAME, env!("CARGO_PKG_VERSION"))
        .with_instructions("Market research tools for the veterinary industry.");
    host.register(search_vet_market_data_descriptor(), |args| {
        let query = args.get("query").and_then(|q| q.as_str()).unwrap_or_default();
        tracing::info!("[VetMarket] search query: {}", query);
        Ok(VET_MARKET_OVERVIEW.to_string())
    })?;
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_publishes_search_tool() {
        let host = vet_market_host().unwrap();
        let descriptors = host.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, SEARCH_VET_MARKET_DATA);
        assert_eq!(descriptors[0].input_schema.required, vec!["query".to_string()]);
    }

    #[test]
    fn test_overview_is_multi_line() {
        assert!(VET_MARKET_OVERVIEW.lines().count() > 10);
        assert!(VET_MARKET_OVERVIEW.contains("$68.5 Billion"));
    }
}
