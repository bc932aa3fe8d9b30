//! Application configuration (YAML).
//!
//! ```yaml
//! completion:
//!   provider: gemini            # gemini | anthropic | openai
//!   model: gemini-1.5-flash
//!   api_key: ${GOOGLE_API_KEY}
//! tool_host:
//!   command: vetteam            # default: this executable
//!   args: [tool-host]
//!   env:
//!     RUST_LOG: ${RUST_LOG:-info}
//! research:
//!   tool: search_vet_market_data
//!   query: Vet market 2020-2025 data
//! ```
//!
//! String values may reference `${VAR}` or `${VAR:-default}`. Variables are
//! looked up in the process environment first, then in `.env.local` and
//! `.env`. Neither file is ever written back into the environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionConfig, Provider};
use crate::error::ConfigError;
use crate::tools::client::ClientConfig;
use crate::tools::vet_market::SEARCH_VET_MARKET_DATA;
use crate::transport::LaunchSpec;

pub const CONFIG_ENV: &str = "VETTEAM_CONFIG";
pub const DEFAULT_QUERY: &str = "Vet market 2020-2025 data";

const LOCAL_CONFIG: &str = "vetteam.yaml";
const DOTENV_FILES: [&str; 2] = [".env.local", ".env"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub tool_host: ToolHostConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

/// How to reach the tool host process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolHostConfig {
    /// Executable to launch. Defaults to the running binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub inherit_env: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_handshake_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ToolHostConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            inherit_env: true,
            cwd: None,
            handshake_timeout_secs: default_handshake_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ToolHostConfig {
    /// Resolve the launch command. Without an explicit command, the current
    /// executable is started with `tool-host`.
    pub fn launch_spec(&self) -> Result<LaunchSpec, ConfigError> {
        let (command, args) = match &self.command {
            Some(command) => (command.clone(), self.args.clone()),
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    ConfigError::Invalid(format!("cannot locate current executable: {}", e))
                })?;
                let args = if self.args.is_empty() {
                    vec!["tool-host".to_string()]
                } else {
                    self.args.clone()
                };
                (exe.to_string_lossy().to_string(), args)
            }
        };

        Ok(LaunchSpec {
            command,
            args,
            env: self.env.clone(),
            inherit_env: self.inherit_env,
            cwd: self.cwd.clone(),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientConfig::default()
        }
    }
}

/// What the research stage asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchConfig {
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default = "default_query")]
    pub query: String,
}

fn default_tool() -> String {
    SEARCH_VET_MARKET_DATA.to_string()
}

fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            query: default_query(),
        }
    }
}

/// Variable lookup: process environment, then dotenv values.
#[derive(Debug, Clone, Default)]
pub struct EnvLookup {
    dotenv: HashMap<String, String>,
    use_process_env: bool,
}

impl EnvLookup {
    /// Process environment plus `.env.local`/`.env` found in `dir`.
    pub fn from_dir(dir: &Path) -> Self {
        let mut dotenv = HashMap::new();
        for name in DOTENV_FILES {
            let path = dir.join(name);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            tracing::debug!("[Config] Reading {}", path.display());
            for (key, value) in parse_dotenv(&content) {
                dotenv.entry(key).or_insert(value);
            }
        }
        Self {
            dotenv,
            use_process_env: true,
        }
    }

    /// Fixed values only; the process environment is ignored.
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            dotenv: values,
            use_process_env: false,
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if self.use_process_env {
            if let Ok(value) = std::env::var(name) {
                return Some(value);
            }
        }
        self.dotenv.get(name).cloned()
    }
}

/// Parse `KEY=value` lines. Comments, blank lines and `export ` prefixes are
/// tolerated; matching surrounding quotes are stripped.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
                .unwrap_or(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Expand `${VAR}` and `${VAR:-default}`. Unset variables without a
/// default expand to the empty string.
pub fn resolve_env_vars(input: &str, env: &EnvLookup) -> String {
    let re = match Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let expr = &caps[1];
        match expr.split_once(":-") {
            Some((name, default)) => env
                .get(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string()),
            None => env.get(expr).unwrap_or_else(|| {
                tracing::debug!("[Config] ${{{}}} is not set", expr);
                String::new()
            }),
        }
    })
    .to_string()
}

fn resolve_yaml(value: &mut serde_yaml::Value, env: &EnvLookup) {
    match value {
        serde_yaml::Value::String(s) => *s = resolve_env_vars(s, env),
        serde_yaml::Value::Sequence(items) => items.iter_mut().for_each(|v| resolve_yaml(v, env)),
        serde_yaml::Value::Mapping(map) => map.values_mut().for_each(|v| resolve_yaml(v, env)),
        _ => {}
    }
}

/// First existing config file: explicit path, `$VETTEAM_CONFIG`,
/// `./vetteam.yaml`, `~/.vetteam/config.yaml`.
pub fn locate_config(
    explicit: Option<&Path>,
    env: &EnvLookup,
    cwd: &Path,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.get(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = cwd.join(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }
    home.map(|h| h.join(".vetteam").join("config.yaml"))
        .filter(|p| p.is_file())
}

impl AppConfig {
    /// Load using the standard lookup order and the working directory's dotenv files.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let env = EnvLookup::from_dir(&cwd);
        let home = dirs::home_dir();
        let path = locate_config(explicit, &env, &cwd, home.as_deref());

        let config = match &path {
            Some(path) => {
                tracing::info!("[Config] Loading {}", path.display());
                Self::from_file(path, &env)?
            }
            None => {
                tracing::info!("[Config] No config file found, using defaults");
                Self::default().finish(&env)?
            }
        };
        Ok((config, path))
    }

    pub fn from_file(path: &Path, env: &EnvLookup) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content, env)
    }

    pub fn from_yaml_str(content: &str, env: &EnvLookup) -> Result<Self, ConfigError> {
        let mut raw: serde_yaml::Value = if content.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(content)?
        };
        if raw.is_null() {
            raw = serde_yaml::Value::Mapping(Default::default());
        }
        resolve_yaml(&mut raw, env);
        let config: AppConfig = serde_yaml::from_value(raw)?;
        config.finish(env)
    }

    /// Fill the API key from the provider's conventional variable and validate.
    fn finish(mut self, env: &EnvLookup) -> Result<Self, ConfigError> {
        let provider = Provider::parse(&self.completion.provider)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let key_missing = self
            .completion
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty());
        if key_missing {
            self.completion.api_key = env.get(provider.key_env()).filter(|k| !k.is_empty());
        }

        if self.research.tool.trim().is_empty() {
            return Err(ConfigError::Invalid("research.tool must not be empty".to_string()));
        }
        if self.tool_host.handshake_timeout_secs == 0 || self.tool_host.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("tool_host timeouts must be positive".to_string()));
        }
        if matches!(&self.tool_host.command, Some(c) if c.trim().is_empty()) {
            return Err(ConfigError::Invalid("tool_host.command must not be empty".to_string()));
        }
        Ok(self)
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(key) = copy.completion.api_key.as_mut() {
            *key = mask(key);
        }
        copy
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    format!("{}****", head)
}
