use keeper_core::proto::{ErrorCode, RpcError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RconError {
    /// The host actively refused the connection. Usually the server is down or still starting.
    #[error("RCON unreachable at {address}: connection refused")]
    Unreachable { address: String },

    #[error("RCON authentication failed")]
    Auth,

    #[error("RCON protocol error: {0}")]
    Protocol(String),

    #[error("RCON transport error while {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected reply to `{command}`: {reply:?}")]
    Parse { command: String, reply: String },
}

impl RconError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RconError::Unreachable { .. })
    }

    pub(crate) fn transport(context: &'static str, source: std::io::Error) -> Self {
        Self::Transport { context, source }
    }

    pub(crate) fn parse(command: &str, reply: &str) -> Self {
        Self::Parse {
            command: command.to_string(),
            reply: reply.to_string(),
        }
    }
}

impl From<RconError> for RpcError {
    fn from(e: RconError) -> Self {
        let code = match &e {
            RconError::Unreachable { .. } => ErrorCode::Unreachable,
            RconError::Parse { .. } => ErrorCode::ParseError,
            RconError::Auth | RconError::Protocol(_) | RconError::Transport { .. } => {
                ErrorCode::ProtocolError
            }
        };
        RpcError::new(code, e.to_string())
    }
}
