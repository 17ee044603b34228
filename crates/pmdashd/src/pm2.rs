//! pm2 CLI client for the process-manager port.
//!
//! Listings come from `pm2 jlist`, which prints the full process table as
//! a JSON array; mutations run `pm2 <verb> <id>`. All invocations go
//! through [`tokio::process::Command`], so a hung pm2 stalls only the
//! sync cycle that issued the call.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pmdash_core::{ProcessEntry, ProcessId};
use serde::{Deserialize, Deserializer};
use tokio::process::Command;
use tracing::debug;

use crate::manager::{ManagerError, ProcessManager};

/// Default pm2 binary name, resolved through PATH.
pub const DEFAULT_PM2_BIN: &str = "pm2";

/// Process-manager client backed by the pm2 command line.
pub struct Pm2Client {
    binary: PathBuf,
}

impl Pm2Client {
    /// Creates a client invoking the given pm2 binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Runs the pm2 binary with the given arguments and returns stdout.
    async fn run(&self, args: &[&str]) -> Result<String, ManagerError> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        debug!(command = %command, "Invoking process manager");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|error| ManagerError::Spawn {
                command: command.clone(),
                error,
            })?;

        if !output.status.success() {
            return Err(ManagerError::CommandFailed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Applies one lifecycle verb to one process id.
    async fn apply(&self, verb: &str, id: ProcessId) -> Result<(), ManagerError> {
        let target = id.to_string();
        self.run(&[verb, target.as_str()]).await.map(|_| ())
    }
}

impl Default for Pm2Client {
    fn default() -> Self {
        Self::new(DEFAULT_PM2_BIN)
    }
}

#[async_trait]
impl ProcessManager for Pm2Client {
    async fn list(&self) -> Result<Vec<ProcessEntry>, ManagerError> {
        let stdout = self.run(&["jlist"]).await?;
        parse_listing(&stdout)
    }

    async fn start(&self, id: ProcessId) -> Result<(), ManagerError> {
        self.apply("start", id).await
    }

    async fn stop(&self, id: ProcessId) -> Result<(), ManagerError> {
        self.apply("stop", id).await
    }

    async fn restart(&self, id: ProcessId) -> Result<(), ManagerError> {
        self.apply("restart", id).await
    }

    async fn reset(&self, id: ProcessId) -> Result<(), ManagerError> {
        self.apply("reset", id).await
    }

    async fn describe(&self, id: ProcessId) -> Result<Vec<ProcessEntry>, ManagerError> {
        // pm2's human-readable describe has no stable machine output, so
        // describe narrows a fresh jlist to the one id.
        let entries = self.list().await?;
        Ok(entries.into_iter().filter(|e| e.id == id).collect())
    }
}

// ============================================================================
// jlist parsing
// ============================================================================

/// One raw record of the `pm2 jlist` array.
#[derive(Debug, Deserialize)]
struct RawProcess {
    pm_id: u32,
    name: String,
    #[serde(default)]
    pm2_env: RawEnv,
    #[serde(default)]
    monit: RawMonit,
}

/// The subset of `pm2_env` the dashboard consumes.
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    #[serde(default)]
    exec_mode: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    restart_time: Option<u32>,
    #[serde(default)]
    pm_uptime: Option<i64>,
    #[serde(default)]
    pm_out_log_path: Option<PathBuf>,
    #[serde(default)]
    pm_err_log_path: Option<PathBuf>,
    /// Instance index for clustered processes; pm2 emits this as a
    /// number or a string depending on how the env was populated.
    #[serde(
        rename = "NODE_APP_INSTANCE",
        default,
        deserialize_with = "instance_index"
    )]
    instance: Option<u32>,
    /// Set on entries belonging to pm2's own instrumentation modules.
    #[serde(default)]
    pmx_module: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawMonit {
    #[serde(default)]
    cpu: f64,
    #[serde(default)]
    memory: u64,
}

impl RawProcess {
    fn into_entry(self) -> ProcessEntry {
        let env = self.pm2_env;
        ProcessEntry {
            id: ProcessId::new(self.pm_id),
            name: self.name,
            exec_mode: env.exec_mode.unwrap_or_default(),
            instance: env.instance,
            status: env.status.unwrap_or_default(),
            restarts: env.restart_time.unwrap_or(0),
            uptime_start: env
                .pm_uptime
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            cpu_percent: self.monit.cpu,
            memory_bytes: self.monit.memory,
            out_log_path: env.pm_out_log_path,
            err_log_path: env.pm_err_log_path,
            is_module: env.pmx_module,
        }
    }
}

/// Parses `pm2 jlist` output into process entries.
///
/// A malformed record fails the whole listing: that is a systemic
/// failure of the manager interface, not a per-process condition.
pub fn parse_listing(json: &str) -> Result<Vec<ProcessEntry>, ManagerError> {
    let raw: Vec<RawProcess> =
        serde_json::from_str(json).map_err(|e| ManagerError::Parse(e.to_string()))?;
    Ok(raw.into_iter().map(RawProcess::into_entry).collect())
}

fn instance_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n as u32),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
