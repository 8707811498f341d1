use tokio::process::Child;

use keeper_core::proto::{ExitInfo, ServerStatus};

use super::now_millis;

/// At most one live child handle. `status` is the last observed state of that handle.
pub(crate) struct ServerState {
    pub(crate) status: ServerStatus,
    pub(crate) child: Option<Child>,
}

impl ServerState {
    pub(crate) fn new() -> Self {
        Self {
            status: ServerStatus::Idle {},
            child: None,
        }
    }

    /// Polls the handle without blocking. An exited child is dropped, so "no handle" and
    /// "handle has exited" both read as stopped afterwards.
    pub(crate) fn refresh(&mut self) -> Option<ExitInfo> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                let exit = exit_info(&status);
                self.child = None;
                self.status = ServerStatus::Exited {
                    exit: exit.clone(),
                    at_ms: now_millis(),
                };
                Some(exit)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("failed to poll server process: {err}");
                None
            }
        }
    }

    pub(crate) fn is_running(&mut self) -> bool {
        self.refresh();
        self.child.is_some()
    }
}

pub(crate) fn exit_info(status: &std::process::ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(status);
    #[cfg(not(unix))]
    let signal = None;

    ExitInfo {
        code: status.code(),
        signal,
    }
}
