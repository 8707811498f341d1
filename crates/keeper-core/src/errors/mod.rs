use thiserror::Error;

use crate::proto::{ErrorCode, RpcError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported protocol version: client={client} daemon={daemon}")]
    UnsupportedProtocol { client: u32, daemon: u32 },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Map internal errors -> stable wire errors.
impl From<CoreError> for RpcError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnsupportedProtocol { client, daemon } => {
                RpcError::new(ErrorCode::UnsupportedProtocol, e.to_string())
                    .with_detail("client_protocol", client.to_string())
                    .with_detail("daemon_protocol", daemon.to_string())
            }
            CoreError::Io { context, .. } => {
                RpcError::new(ErrorCode::IoError, e.to_string()).with_detail("context", context)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoreError;
    use crate::proto::{ErrorCode, RpcError};

    #[test]
    fn io_errors_keep_their_context_on_the_wire() {
        let err = CoreError::io(
            "reading player data",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let rpc = RpcError::from(err);
        assert_eq!(rpc.code, ErrorCode::IoError);
        assert_eq!(rpc.details.get("context").map(String::as_str), Some("reading player data"));
    }

    #[test]
    fn protocol_mismatch_reports_both_versions() {
        let rpc = RpcError::from(CoreError::UnsupportedProtocol { client: 2, daemon: 1 });
        assert_eq!(rpc.code, ErrorCode::UnsupportedProtocol);
        assert_eq!(rpc.details.len(), 2);
    }
}
