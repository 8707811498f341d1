use serde::{Deserialize, Serialize};

use super::RpcError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackupLocation {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackupStatus {
    Created,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "upload", content = "data")]
pub enum UploadStatus {
    NotRequested {},
    NotConfigured {},
    Uploaded { url: String },
    Failed { error: RpcError },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupResult {
    pub status: BackupStatus,
    /// Artifact file name, `backup_<YYYY-MM-DD>_<HH-MM-SS>.zip`.
    pub name: String,
    pub size_bytes: Option<u64>,
    pub upload: UploadStatus,
    /// Set when re-enabling autosave failed after the archive was written.
    pub save_on_error: Option<RpcError>,
    pub error: Option<RpcError>,
}

impl BackupResult {
    pub fn failed(name: String, error: RpcError) -> Self {
        Self {
            status: BackupStatus::Failed,
            name,
            size_bytes: None,
            upload: UploadStatus::NotRequested {},
            save_on_error: None,
            error: Some(error),
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match &self.upload {
            UploadStatus::Uploaded { url } => Some(url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    pub size_bytes: u64,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "listing", content = "data")]
pub enum BackupListing {
    Listed { entries: Vec<BackupEntry> },
    NotConfigured {},
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub name: String,
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "data")]
pub enum RestoreResult {
    Restored { name: String, downloaded: bool },
    Aborted { reason: String },
    Failed { error: RpcError },
}
