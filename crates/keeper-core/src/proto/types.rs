use serde::{Deserialize, Serialize};

pub type RequestId = u64;
pub type UnixMillis = u64;

/// External (chat platform) account identifier, the key of the identity directory.
pub type AccountId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub at_ms: UnixMillis,
    pub stream: LogStream,
    pub line: String,
}
