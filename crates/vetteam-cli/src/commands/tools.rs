//! `vetteam tools`: list the tools advertised by the configured host.

use std::path::Path;

use vetteam_core::tools::{ProcessConnector, ToolClient, ToolConnector};

use super::{load_config, print_json};

pub async fn list(config_path: Option<&Path>, json: bool) -> Result<(), String> {
    let config = load_config(config_path)?;
    let spec = config.tool_host.launch_spec().map_err(|e| e.to_string())?;
    let connector = ProcessConnector::new(spec);
    let client = ToolClient::new(config.tool_host.client_config());

    let session = connector.connect(&client).await.map_err(|e| e.to_string())?;
    let discovered = session.discover().await;
    let host = session.host_info().map(|info| info.server_info.clone());
    session.close().await;
    let tools = discovered.map_err(|e| e.to_string())?;

    if json {
        let value = serde_json::to_value(&tools).map_err(|e| e.to_string())?;
        print_json(&value);
        return Ok(());
    }

    if let Some(host) = host {
        println!("{} {} ({})", host.name, host.version, connector.describe());
    }
    for tool in &tools {
        let params: Vec<String> = tool
            .input_schema
            .properties
            .iter()
            .map(|(name, spec)| {
                let marker = if tool.input_schema.required.contains(name) { "" } else { "?" };
                format!("{}{}: {}", name, marker, spec.param_type.as_str())
            })
            .collect();
        println!("  {}({})", tool.name, params.join(", "));
        if !tool.description.is_empty() {
            println!("      {}", tool.description);
        }
    }
    Ok(())
}
