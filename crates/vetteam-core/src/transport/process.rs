//! Child-process launch for stdio transports.

use std::collections::HashMap;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Transport;
use crate::error::TransportError;

/// How to start a tool host process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LaunchSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overrides layered on top of the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Start from the parent's environment (default) or from an empty one.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
    #[serde(default)]
    pub cwd: Option<String>,
}

fn default_inherit_env() -> bool {
    true
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            inherit_env: true,
            cwd: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

impl Transport {
    /// Spawn the child with piped stdio and wrap its stdout/stdin.
    ///
    /// The child is killed if the transport is dropped without `close`.
    pub fn launch(spec: &LaunchSpec) -> Result<Self, TransportError> {
        tracing::info!(
            "[Transport] Spawning: {} (cwd: {})",
            spec.display(),
            spec.cwd.as_deref().unwrap_or("."),
        );

        let mut command = tokio::process::Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !spec.inherit_env {
            command.env_clear();
        }
        command.envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            command: spec.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("no stdin on child process"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("no stdout on child process"))
        })?;

        let label = match child.id() {
            Some(pid) => format!("{}#{}", spec.command, pid),
            None => spec.command.clone(),
        };

        if let Some(stderr) = child.stderr.take() {
            let name = label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        tracing::debug!("[Transport:{} stderr] {}", name, line);
                    }
                }
            });
        }

        Ok(Self::assemble(
            label,
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::rpc::types::{JsonRpcMessage, JsonRpcRequest};
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let spec = LaunchSpec::new("/definitely/not/a/real/binary", Vec::<String>::new());
        let err = Transport::launch(&spec).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
        assert!(err.to_string().contains("/definitely/not/a/real/binary"));
    }

    #[tokio::test]
    async fn test_round_trip_through_cat() {
        let transport = Transport::launch(&LaunchSpec::new("cat", Vec::<String>::new())).unwrap();
        let request = JsonRpcMessage::from(JsonRpcRequest::new(9, "tools/list", serde_json::json!({})));
        transport.send(&request).await.unwrap();

        let echoed = tokio::time::timeout(Duration::from_secs(5), transport.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echoed.method(), Some("tools/list"));
        transport.close().await;
        transport.close().await;
    }

    #[tokio::test]
    async fn test_environment_is_propagated_and_overridable() {
        let script = r#"printf '{"jsonrpc":"2.0","method":"env","params":{"v":"%s","path":"%s"}}\n' "$VETTEAM_PROBE" "${PATH:+set}""#;
        let spec = LaunchSpec::new("sh", ["-c", script]).with_env("VETTEAM_PROBE", "override");
        let transport = Transport::launch(&spec).unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), transport.receive())
            .await
            .unwrap()
            .unwrap();
        let JsonRpcMessage::Notification(note) = message else {
            panic!("expected notification");
        };
        let params = note.params.unwrap();
        assert_eq!(params["v"], "override");
        assert_eq!(params["path"], "set");

        // The script exits after one line; the next read sees end-of-stream.
        let next = tokio::time::timeout(Duration::from_secs(5), transport.receive())
            .await
            .unwrap();
        assert!(matches!(next, Err(TransportError::Closed)));
        transport.close().await;
    }
}
