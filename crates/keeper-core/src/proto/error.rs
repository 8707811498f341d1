use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,

    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Default::default(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Stable failure kinds. Callers branch on these, so variants are only ever added.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    UnsupportedProtocol,
    Busy,

    /// The remote console refused the connection; usually the server is still starting.
    Unreachable,
    ProtocolError,
    ParseError,

    NotConfigured,
    EulaUnsigned,
    NotADirectory,
    FileNotFound,

    AlreadyExists,
    AlreadyRunning,
    NotRunning,

    PlayerNotFound,
    NotFound,

    InvalidConfig,
    IoError,

    Internal,
}
