use keeper_client::LookupError;
use keeper_core::proto::{AccountId, ErrorCode, RpcError};
use keeper_rcon::RconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("account {0} has no linked player")]
    NotLinked(AccountId),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("{username} is already linked to account {account_id}")]
    UsernameTaken {
        username: String,
        account_id: AccountId,
    },

    #[error(transparent)]
    Rcon(#[from] RconError),

    #[error("server rejected `{command}`: {reply}")]
    Rejected { command: String, reply: String },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("player data is not valid JSON: {0}")]
    Corrupt(#[source] serde_json::Error),
}

impl IdentityError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

impl From<IdentityError> for RpcError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Lookup(err) => err.into(),
            IdentityError::Rcon(err) => err.into(),
            IdentityError::NotLinked(_) => RpcError::new(ErrorCode::NotFound, e.to_string()),
            IdentityError::UsernameTaken { .. } => {
                RpcError::new(ErrorCode::AlreadyExists, e.to_string())
            }
            IdentityError::Rejected { ref command, .. } => {
                let command = command.clone();
                RpcError::new(ErrorCode::ProtocolError, e.to_string()).with_detail("command", command)
            }
            IdentityError::Io { context, .. } => {
                RpcError::new(ErrorCode::IoError, e.to_string()).with_detail("context", context)
            }
            IdentityError::Corrupt(_) => RpcError::new(ErrorCode::InvalidConfig, e.to_string()),
        }
    }
}
