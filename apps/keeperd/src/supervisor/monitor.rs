use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::warn;

use super::server::Supervisor;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Notices a server that exits on its own (crash, in-game `/stop`) and records it.
pub fn spawn_monitor(supervisor: Arc<Supervisor>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(exit) = supervisor.poll_exit().await {
                warn!(code = ?exit.code, signal = ?exit.signal, "server process exited");
            }
        }
    })
}
