use serde::{Deserialize, Serialize};

use super::{RpcError, UnixMillis};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub daemon_version: String,
    pub protocol_version: u32,
    pub pid: i32,
    pub uptime_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "data")]
pub enum ServerStatus {
    Idle {},

    Running { pid: i32, started_at_ms: UnixMillis },

    Exited { exit: ExitInfo, at_ms: UnixMillis },
}

impl ServerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServerStatus::Running { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "data")]
pub enum StartOutcome {
    Started { pid: i32, started_at_ms: UnixMillis },
    AlreadyRunning {},
}

impl StartOutcome {
    pub fn describe(&self) -> String {
        match self {
            StartOutcome::Started { pid, .. } => format!("Server started (pid {pid})."),
            StartOutcome::AlreadyRunning {} => "Server is already running.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "data")]
pub enum StopOutcome {
    Stopped { exit: ExitInfo, stopped_at_ms: UnixMillis },
    NotRunning {},
    /// RCON refused the stop command; the process is still considered running.
    NotResponding { detail: String },
}

impl StopOutcome {
    pub fn describe(&self) -> String {
        match self {
            StopOutcome::Stopped { exit, .. } => match exit.code {
                Some(code) => format!("Server stopped with return code {code}."),
                None => "Server stopped.".to_string(),
            },
            StopOutcome::NotRunning {} => "Server is not running.".to_string(),
            StopOutcome::NotResponding { .. } => {
                "Server is not responding. Is the server running?".to_string()
            }
        }
    }
}

/// Restart is stop followed by start; both halves are reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartReport {
    pub stop: StopOutcome,
    pub start: Option<StartOutcome>,
    pub start_error: Option<RpcError>,
}

impl RestartReport {
    pub fn describe(&self) -> String {
        let start = match (&self.start, &self.start_error) {
            (Some(outcome), _) => outcome.describe(),
            (None, Some(err)) => format!("Start failed: {}", err.message),
            (None, None) => "Start skipped.".to_string(),
        };
        format!("{}\n{}", self.stop.describe(), start)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", content = "data")]
pub enum SetupStep {
    Applied {},
    /// The file does not exist yet; the server creates it on first launch.
    Missing {},
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetupReport {
    pub eula: SetupStep,
    pub rcon: SetupStep,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnlinePlayers {
    pub online: u32,
    pub max: u32,
    pub names: Vec<String>,
}
