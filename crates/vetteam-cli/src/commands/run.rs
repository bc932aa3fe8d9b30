//! `vetteam run`: run the research team once.

use std::path::Path;

use vetteam_core::{Message, ResearchOutcome, ResearchTeam};

use super::{load_config, print_json};

pub async fn run(
    config_path: Option<&Path>,
    offline: bool,
    json: bool,
    message: Option<&str>,
) -> Result<(), String> {
    let config = load_config(config_path)?;
    let team = ResearchTeam::from_config(&config, offline).map_err(|e| e.to_string())?;
    tracing::info!("[CLI] Starting research workflow ({})", team.describe());

    let messages = message.map(|m| vec![Message::user(m)]).unwrap_or_default();
    let outcome = team.run_workflow(messages).await.map_err(|e| e.to_string())?;

    if json {
        let value = serde_json::to_value(&outcome).map_err(|e| e.to_string())?;
        print_json(&value);
    } else {
        print_sections(&outcome);
    }
    Ok(())
}

fn print_sections(outcome: &ResearchOutcome) {
    println!("# Market Analysis Report\n");
    println!("{}\n", outcome.analyst_report.trim_end());
    println!("# Business Strategy Model\n");
    println!("{}\n", outcome.business_strategy.trim_end());
    println!("# Raw Research Data\n");
    println!("{}", outcome.research_data.trim_end());
}
