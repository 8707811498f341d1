use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use keeper_core::proto::{
    ExitInfo, LogStream, OnlinePlayers, RestartReport, ServerStatus, SetupReport, StartOutcome,
    StopOutcome,
};
use keeper_provision::{setup, LaunchPlan};
use keeper_rcon::{parse, CommandSender};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{info, warn};

use super::errors::SupervisorError;
use super::logs::LogStore;
use super::now_millis;
use super::state::{exit_info, ServerState};

const LIFECYCLE_WAIT: Duration = Duration::from_secs(5);
const STOP_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub server_dir: PathBuf,
    pub jar: String,
    pub plan: LaunchPlan,
    pub rcon_port: u16,
    pub rcon_password: String,
    /// How long a graceful `stop` may take before the process is killed.
    pub stop_timeout: Duration,
}

/// Owns the server process. Start, stop and restart are serialized by the lifecycle lock,
/// which the backup orchestrator also takes so a backup never overlaps a state change.
pub struct Supervisor {
    settings: ServerSettings,
    state: Mutex<ServerState>,
    lifecycle: Arc<Mutex<()>>,
    rcon: Arc<dyn CommandSender>,
    logs: LogStore,
}

impl Supervisor {
    pub fn new(settings: ServerSettings, rcon: Arc<dyn CommandSender>, logs: LogStore) -> Self {
        Self {
            settings,
            state: Mutex::new(ServerState::new()),
            lifecycle: Arc::new(Mutex::new(())),
            rcon,
            logs,
        }
    }

    pub fn server_dir(&self) -> &Path {
        &self.settings.server_dir
    }

    /// Waits for any lifecycle operation in flight, then holds off new ones until dropped.
    pub async fn lifecycle_guard(&self) -> OwnedMutexGuard<()> {
        self.lifecycle.clone().lock_owned().await
    }

    async fn try_lifecycle(&self) -> Result<OwnedMutexGuard<()>, SupervisorError> {
        timeout(LIFECYCLE_WAIT, self.lifecycle.clone().lock_owned())
            .await
            .map_err(|_| SupervisorError::Busy)
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    pub async fn status(&self) -> ServerStatus {
        let mut state = self.state.lock().await;
        state.refresh();
        state.status.clone()
    }

    /// Exit details if the process ended since the last poll.
    pub(crate) async fn poll_exit(&self) -> Option<ExitInfo> {
        self.state.lock().await.refresh()
    }

    pub async fn start(&self) -> Result<StartOutcome, SupervisorError> {
        let _lifecycle = self.try_lifecycle().await?;
        self.start_locked().await
    }

    async fn start_locked(&self) -> Result<StartOutcome, SupervisorError> {
        let mut state = self.state.lock().await;
        if state.is_running() {
            return Ok(StartOutcome::AlreadyRunning {});
        }

        let readiness =
            setup::check_launch_ready(&self.settings.server_dir, &self.settings.jar).await?;
        if readiness.first_run {
            info!("no eula.txt yet; this launch will generate the server files");
        }

        let child = spawn_server(&self.settings.plan, &self.logs)?;
        let pid = child.id().unwrap_or_default() as i32;
        let started_at_ms = now_millis();
        state.child = Some(child);
        state.status = ServerStatus::Running { pid, started_at_ms };

        info!(pid, dir = %self.settings.server_dir.display(), "server started");
        Ok(StartOutcome::Started { pid, started_at_ms })
    }

    pub async fn stop(&self) -> Result<StopOutcome, SupervisorError> {
        let _lifecycle = self.try_lifecycle().await?;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> Result<StopOutcome, SupervisorError> {
        if !self.is_running().await {
            return Ok(StopOutcome::NotRunning {});
        }

        match self.rcon.send("stop").await {
            Ok(_) => {}
            Err(err) if err.is_unreachable() => {
                warn!("stop aborted: {err}");
                return Ok(StopOutcome::NotResponding {
                    detail: err.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            timeout_secs = self.settings.stop_timeout.as_secs(),
            "stop sent, waiting for the server to exit"
        );
        let deadline = Instant::now() + self.settings.stop_timeout;
        loop {
            {
                let mut state = self.state.lock().await;
                state.refresh();
                if state.child.is_none() {
                    return Ok(stopped(&state));
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(STOP_POLL).await;
        }

        warn!("server did not exit in time, killing it");
        self.kill_locked().await
    }

    /// Kills the process without asking it to save first.
    pub async fn force_stop(&self) -> Result<StopOutcome, SupervisorError> {
        let _lifecycle = self.try_lifecycle().await?;
        if !self.is_running().await {
            return Ok(StopOutcome::NotRunning {});
        }
        self.kill_locked().await
    }

    async fn kill_locked(&self) -> Result<StopOutcome, SupervisorError> {
        let mut state = self.state.lock().await;
        let Some(mut child) = state.child.take() else {
            return Ok(stopped(&state));
        };

        if let Err(source) = child.kill().await {
            state.child = Some(child);
            return Err(SupervisorError::Process {
                action: "kill",
                source,
            });
        }
        let exit = match child.wait().await {
            Ok(status) => exit_info(&status),
            Err(_) => ExitInfo { code: None, signal: None },
        };
        state.status = ServerStatus::Exited {
            exit,
            at_ms: now_millis(),
        };
        Ok(stopped(&state))
    }

    pub async fn restart(&self) -> Result<RestartReport, SupervisorError> {
        let _lifecycle = self.try_lifecycle().await?;
        let stop = self.stop_locked().await?;
        let (start, start_error) = match self.start_locked().await {
            Ok(outcome) => (Some(outcome), None),
            Err(err) => {
                warn!("restart could not start the server: {err}");
                (None, Some(err.into()))
            }
        };
        Ok(RestartReport {
            stop,
            start,
            start_error,
        })
    }

    /// Runs a console command. Only attempted while the process is up.
    pub async fn execute(&self, command: &str) -> Result<String, SupervisorError> {
        if !self.is_running().await {
            return Err(SupervisorError::NotRunning);
        }
        let reply = self.rcon.send(command).await?;
        if reply.trim().is_empty() {
            return Ok("No response.".to_string());
        }
        Ok(reply)
    }

    pub async fn online_players(&self) -> Result<OnlinePlayers, SupervisorError> {
        if !self.is_running().await {
            return Err(SupervisorError::NotRunning);
        }
        let reply = self.rcon.send("list").await?;
        Ok(parse::online_players(&reply)?)
    }

    /// Signs the EULA and enables RCON with the configured port and password.
    pub async fn setup(&self) -> SetupReport {
        let dir = &self.settings.server_dir;
        SetupReport {
            eula: setup::sign_eula(dir).await,
            rcon: setup::ensure_rcon_configured(
                dir,
                self.settings.rcon_port,
                &self.settings.rcon_password,
            )
            .await,
        }
    }

    /// Daemon exit: graceful stop, falling back to a kill when the console is unreachable.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(StopOutcome::NotResponding { .. }) => {
                if let Err(err) = self.force_stop().await {
                    warn!("failed to kill server on shutdown: {err}");
                }
            }
            Ok(outcome) => info!("{}", outcome.describe()),
            Err(err) => warn!("failed to stop server on shutdown: {err}"),
        }
    }
}

fn stopped(state: &ServerState) -> StopOutcome {
    let exit = match &state.status {
        ServerStatus::Exited { exit, .. } => exit.clone(),
        _ => ExitInfo { code: None, signal: None },
    };
    StopOutcome::Stopped {
        exit,
        stopped_at_ms: now_millis(),
    }
}

fn spawn_server(plan: &LaunchPlan, logs: &LogStore) -> Result<Child, SupervisorError> {
    let mut cmd = Command::new(plan.program()?);
    cmd.args(plan.args())
        .current_dir(&plan.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| SupervisorError::Process {
        action: "spawn",
        source,
    })?;

    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, LogStream::Stdout, logs.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, LogStream::Stderr, logs.clone());
    }
    Ok(child)
}

fn forward_lines<R>(reader: R, stream: LogStream, logs: LogStore)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            logs.push_console(stream, line);
        }
    });
}
