use std::sync::Arc;

use anyhow::Result;
use keeper_client::PlayerDbClient;
use keeper_core::proto::DaemonStatus;
use keeper_provision::launch::{default_heap, java_launch_plan};
use keeper_rcon::{CommandSender, RconClient};
use tracing::info;

use crate::backup::{BackupService, RemoteStore, S3CliStore};
use crate::config::KeeperConfig;
use crate::identity::IdentityDirectory;
use crate::supervisor::{now_millis, LogStore, ServerSettings, Supervisor};

/// The long-lived components every request is served from. They share one RCON client.
pub struct App {
    pub supervisor: Arc<Supervisor>,
    pub backups: Arc<BackupService>,
    pub identity: Arc<IdentityDirectory>,
    pub logs: LogStore,
    pub started_ms: u64,
}

impl App {
    pub async fn build(config: &KeeperConfig, logs: LogStore) -> Result<Self> {
        let rcon: Arc<dyn CommandSender> = Arc::new(RconClient::new(&config.rcon));

        let heap = config.server.ram.clone().unwrap_or_else(default_heap);
        let plan = java_launch_plan(
            config.server.dir.clone(),
            &config.server.java,
            &heap,
            &config.server.jar,
            &config.server.extra_args,
        )?;
        info!(command = %plan.argv.join(" "), "launch command");
        let settings = ServerSettings {
            server_dir: config.server.dir.clone(),
            jar: config.server.jar.clone(),
            plan,
            rcon_port: config.rcon.port,
            rcon_password: config.rcon.password.clone(),
            stop_timeout: config.stop_timeout(),
        };
        let supervisor = Arc::new(Supervisor::new(settings, rcon.clone(), logs.clone()));

        let remote = config.cloud.credentials().map(|credentials| {
            info!(bucket = %credentials.bucket, "cloud storage configured");
            let mut store = S3CliStore::new(credentials);
            if let Some(cli) = &config.cloud.aws_cli {
                store = store.with_program(cli.as_str());
            }
            Arc::new(store) as Arc<dyn RemoteStore>
        });
        if remote.is_none() {
            info!("cloud storage not configured; uploads are disabled");
        }
        let backups = Arc::new(BackupService::new(
            config.backup.dir.clone(),
            supervisor.clone(),
            rcon.clone(),
            remote,
        ));

        let lookup = Arc::new(PlayerDbClient::new(&config.identity.lookup_url)?);
        let identity = Arc::new(
            IdentityDirectory::open(config.identity.data_file.clone(), rcon, lookup).await?,
        );

        Ok(Self {
            supervisor,
            backups,
            identity,
            logs,
            started_ms: now_millis(),
        })
    }

    pub fn daemon_status(&self) -> DaemonStatus {
        DaemonStatus {
            daemon_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: keeper_core::PROTOCOL_VERSION,
            pid: std::process::id() as i32,
            uptime_ms: now_millis().saturating_sub(self.started_ms),
        }
    }
}
