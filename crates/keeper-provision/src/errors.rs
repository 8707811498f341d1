use std::path::PathBuf;

use keeper_core::proto::{ErrorCode, RpcError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("server file not found: {}", .0.display())]
    MissingJar(PathBuf),

    #[error("RCON is not enabled in server.properties; run setup first")]
    RconDisabled,

    #[error("EULA not signed; run setup first")]
    EulaUnsigned,

    #[error("invalid launch settings: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ProvisionError> for RpcError {
    fn from(e: ProvisionError) -> Self {
        let code = match &e {
            ProvisionError::MissingJar(_) => ErrorCode::FileNotFound,
            ProvisionError::RconDisabled => ErrorCode::NotConfigured,
            ProvisionError::EulaUnsigned => ErrorCode::EulaUnsigned,
            ProvisionError::Invalid(_) => ErrorCode::InvalidConfig,
            ProvisionError::Io(_) => ErrorCode::IoError,
        };
        RpcError::new(code, e.to_string())
    }
}
