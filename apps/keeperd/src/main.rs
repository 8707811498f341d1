use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keeper_utils::{ensure_dir, runtime_paths};

mod app;
mod backup;
mod config;
mod daemon;
mod identity;
mod lock;
mod supervisor;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logs = supervisor::LogStore::new(2000);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(logs.daemon_writer())
        .init();

    let paths = runtime_paths();
    ensure_dir(&paths.runtime_dir)?;

    // single-instance lock
    let _guard = match lock::acquire_lock(&paths.lock_path) {
        Ok(guard) => guard,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            warn!("keeperd already running (lock held), exiting");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if paths.socket_path.exists() {
        if keeper_ipc::socket::socket_alive(&paths.socket_path).await {
            warn!("keeperd already running (socket alive), exiting");
            return Ok(());
        }
        keeper_ipc::socket::remove_stale_socket(&paths.socket_path)?;
    }

    let config_path = config::config_path()?;
    let config = config::KeeperConfig::load(&config_path)?;
    info!(path = %config_path.display(), "config loaded");

    let app = Arc::new(app::App::build(&config, logs).await?);
    supervisor::spawn_monitor(app.supervisor.clone());
    match config.backup.schedule() {
        Some(schedule) => {
            backup::spawn_scheduler(app.backups.clone(), schedule);
        }
        None => info!("scheduled backups disabled"),
    }

    if config.server.autostart {
        match app.supervisor.start().await {
            Ok(outcome) => info!("{}", outcome.describe()),
            Err(err) => warn!("autostart failed: {err}"),
        }
    }

    let listener = keeper_ipc::socket::bind(&paths.socket_path)?;
    info!("keeperd listening at {}", paths.socket_path.display());

    daemon::serve(listener, app).await?;
    keeper_ipc::socket::remove_stale_socket(&paths.socket_path)?;
    Ok(())
}
