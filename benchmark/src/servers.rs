//! Spawning and probing the servers under test.

use crate::config::ServerConfig;
use anyhow::Context;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// `GET <url><health_path>`. Only a transport error counts as "not available".
pub async fn probe(client: &Client, server: &ServerConfig, health_path: &str) -> Result<StatusCode, reqwest::Error> {
    let url = format!("{}{}", server.url.trim_end_matches('/'), health_path);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        warn!(server = %server.name, %status, "Health probe returned a non-success status");
    }
    Ok(status)
}

/// Child processes started for servers that have a `command`. Dropping this kills them.
#[derive(Debug, Default)]
pub struct ServerProcesses {
    children: Vec<(String, Child)>,
}

impl ServerProcesses {
    /// Spawn every server with a `command`, one after another, waiting `startup_delay` after each
    /// before checking that it answers.
    pub async fn start(
        servers: &[ServerConfig],
        startup_delay: Duration,
        client: &Client,
        health_path: &str,
    ) -> anyhow::Result<Self> {
        let mut processes = Self::default();

        for server in servers {
            let Some((program, args)) = server.command.as_deref().and_then(|c| c.split_first()) else {
                continue;
            };

            info!(server = %server.name, command = ?server.command, "Starting server");
            let child = Command::new(program)
                .args(args)
                .envs(&server.env)
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("Failed to start server {}", server.name))?;
            processes.children.push((server.name.clone(), child));

            tokio::time::sleep(startup_delay).await;

            if let Err(e) = probe(client, server, health_path).await {
                warn!(server = %server.name, error = %e, "Server is not available after start");
            }
        }

        Ok(processes)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Kill every spawned server and wait for it to exit.
    pub async fn shutdown(mut self) {
        for (name, mut child) in self.children.drain(..) {
            match child.kill().await {
                Ok(()) => info!(server = %name, "Stopped server"),
                Err(e) => warn!(server = %name, error = %e, "Error stopping server"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test_log::test(tokio::test)]
    async fn test_probe_unreachable_server_is_transport_error() {
        let server = ServerConfig {
            name: "down".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            command: None,
            env: BTreeMap::new(),
        };

        let client = Client::new();
        assert!(probe(&client, &server, "/healthz").await.is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_servers_without_command_are_not_spawned() {
        let server = ServerConfig {
            name: "external".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            command: None,
            env: BTreeMap::new(),
        };

        let processes = ServerProcesses::start(&[server], Duration::ZERO, &Client::new(), "/healthz")
            .await
            .unwrap();
        assert!(processes.is_empty());
        processes.shutdown().await;
    }

    #[cfg(unix)]
    #[test_log::test(tokio::test)]
    async fn test_spawned_server_is_killed_on_shutdown() {
        let server = ServerConfig {
            name: "sleeper".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            command: Some(vec!["sleep".to_string(), "30".to_string()]),
            env: BTreeMap::from([("FILEDROP_PORT".to_string(), "1".to_string())]),
        };

        let processes = ServerProcesses::start(&[server], Duration::ZERO, &Client::new(), "/healthz")
            .await
            .unwrap();
        assert_eq!(processes.len(), 1);

        tokio::time::timeout(Duration::from_secs(5), processes.shutdown())
            .await
            .expect("shutdown should not wait for the sleep to finish");
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_program_fails_to_start() {
        let server = ServerConfig {
            name: "ghost".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            command: Some(vec!["definitely-not-a-real-binary-filedrop".to_string()]),
            env: BTreeMap::new(),
        };

        let err = ServerProcesses::start(&[server], Duration::ZERO, &Client::new(), "/healthz")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to start server ghost"));
    }
}
