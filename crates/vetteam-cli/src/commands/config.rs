//! `vetteam config`: print the resolved configuration.

use std::path::Path;

use vetteam_core::AppConfig;

pub fn show(config_path: Option<&Path>) -> Result<(), String> {
    let (config, path) = AppConfig::load(config_path).map_err(|e| e.to_string())?;
    match path {
        Some(path) => println!("# source: {}", path.display()),
        None => println!("# source: built-in defaults"),
    }
    let yaml = config.redacted().to_yaml().map_err(|e| e.to_string())?;
    print!("{}", yaml);
    Ok(())
}
