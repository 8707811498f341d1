use keeper_core::proto::{ErrorCode, RpcError};
use keeper_provision::ProvisionError;
use keeper_rcon::RconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("another lifecycle operation is in progress")]
    Busy,

    #[error("server is not running")]
    NotRunning,

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Rcon(#[from] RconError),

    #[error("failed to {action} server process: {source}")]
    Process {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl From<SupervisorError> for RpcError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::Provision(err) => err.into(),
            SupervisorError::Rcon(err) => err.into(),
            SupervisorError::Busy => RpcError::new(ErrorCode::Busy, e.to_string()),
            SupervisorError::NotRunning => RpcError::new(ErrorCode::NotRunning, e.to_string()),
            SupervisorError::Process { .. } => RpcError::new(ErrorCode::IoError, e.to_string()),
        }
    }
}
