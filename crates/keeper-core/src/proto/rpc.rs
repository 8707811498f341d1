use serde::{Deserialize, Serialize};

use super::{
    AccountId, BackupListing, BackupLocation, BackupResult, DaemonStatus, DeleteOutcome, LogLine,
    OnlinePlayers, PlayerProfile, ProfileEntry, RequestId, RestartReport, RestoreResult, RpcError,
    ServerStatus, SetupReport, StartOutcome, StopOutcome, SyncReport, Tier,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: RequestId,
    pub payload: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    Ping { client_version: String, protocol_version: u32 },

    Status {},

    Start {},
    Stop {},
    Restart {},
    Setup {},

    RconExec { command: String },
    OnlinePlayers {},

    LogsTail { lines: usize },
    DaemonLogsTail { lines: usize },

    CreateBackup { upload: bool },
    ListBackups { location: BackupLocation },
    DeleteBackups { location: BackupLocation, names: Vec<String> },
    RestoreBackup { name: String },

    Link { account_id: AccountId, username: String },
    Unlink { account_id: AccountId },
    Promote { account_id: AccountId, tier: Tier },
    Demote { account_id: AccountId, tier: Tier },
    Profile { account_id: AccountId },
    Profiles {},
    WhoIs { username: String },
    SyncMembers { member_ids: Vec<AccountId> },

    Shutdown {},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    Pong { daemon_version: String, protocol_version: u32 },

    Status { daemon: DaemonStatus, server: ServerStatus },

    Start(StartOutcome),
    Stop(StopOutcome),
    Restart(RestartReport),
    Setup(SetupReport),

    RconResult { text: String },
    OnlinePlayers(OnlinePlayers),

    LogsTail { lines: Vec<LogLine>, truncated: bool },

    Backup(BackupResult),
    Backups(BackupListing),
    Deleted { outcomes: Vec<DeleteOutcome> },
    Restore(RestoreResult),

    Profile { account_id: AccountId, profile: PlayerProfile },
    Profiles { entries: Vec<ProfileEntry> },
    Unlinked { account_id: AccountId },
    Sync(SyncReport),

    ShutdownAck {},

    Error(RpcError),
}
