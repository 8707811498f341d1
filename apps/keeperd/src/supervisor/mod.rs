mod errors;
mod logs;
mod monitor;
mod server;
mod state;

pub use logs::LogStore;
pub use monitor::spawn_monitor;
pub use server::{ServerSettings, Supervisor};

pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
