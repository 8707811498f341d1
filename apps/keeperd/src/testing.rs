use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use keeper_rcon::{CommandSender, RconError};

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("keeperd-{prefix}-{nanos}"))
}

/// Console double: records every command, answers from a canned table, and can refuse
/// connections either always or for chosen commands.
#[derive(Default)]
pub(crate) struct RecordingSender {
    calls: Mutex<Vec<String>>,
    replies: Mutex<HashMap<String, String>>,
    refused: Mutex<HashSet<String>>,
    refuse_all: bool,
}

impl RecordingSender {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            refuse_all: true,
            ..Self::default()
        })
    }

    pub(crate) fn reply(&self, command: &str, reply: &str) {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(command.to_string(), reply.to_string());
    }

    pub(crate) fn refuse(&self, command: &str) {
        self.refused
            .lock()
            .expect("refused lock")
            .insert(command.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CommandSender for RecordingSender {
    async fn send(&self, command: &str) -> Result<String, RconError> {
        self.calls.lock().expect("calls lock").push(command.to_string());
        if self.refuse_all || self.refused.lock().expect("refused lock").contains(command) {
            return Err(RconError::Unreachable {
                address: "127.0.0.1:25575".to_string(),
            });
        }
        Ok(self
            .replies
            .lock()
            .expect("replies lock")
            .get(command)
            .cloned()
            .unwrap_or_default())
    }
}

/// Supervisor whose "server" is a long `sleep`, with a jar in place so it can start.
pub(crate) fn sleeping_supervisor(
    server_dir: &std::path::Path,
    rcon: Arc<dyn CommandSender>,
) -> crate::supervisor::Supervisor {
    use crate::supervisor::{LogStore, ServerSettings, Supervisor};
    use keeper_provision::LaunchPlan;

    std::fs::create_dir_all(server_dir).expect("create server dir");
    std::fs::write(server_dir.join("server.jar"), b"jar").expect("write jar");
    let settings = ServerSettings {
        server_dir: server_dir.to_path_buf(),
        jar: "server.jar".to_string(),
        plan: LaunchPlan {
            cwd: server_dir.to_path_buf(),
            argv: vec!["sleep".to_string(), "30".to_string()],
        },
        rcon_port: 25575,
        rcon_password: "pw".to_string(),
        stop_timeout: std::time::Duration::from_millis(300),
    };
    Supervisor::new(settings, rcon, LogStore::new(100))
}
