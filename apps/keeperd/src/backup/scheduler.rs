use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use keeper_core::proto::BackupStatus;
use tokio::fs as async_fs;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use super::ops::BackupService;

const MARKER_FILE: &str = ".last_backup";
const RETRY_AFTER: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
pub struct BackupSchedule {
    pub interval: Duration,
    pub upload: bool,
    /// Local artifacts to retain after each scheduled run; 0 keeps everything.
    pub keep: usize,
}

async fn read_last_backup(dir: &Path) -> Option<DateTime<Utc>> {
    let raw = async_fs::read_to_string(dir.join(MARKER_FILE)).await.ok()?;
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

async fn write_last_backup(dir: &Path, at: DateTime<Utc>) {
    let path = dir.join(MARKER_FILE);
    let tmp = dir.join(".last_backup.tmp");
    if let Err(e) = async_fs::write(&tmp, at.to_rfc3339()).await {
        warn!("failed to write backup marker: {e}");
        return;
    }
    if let Err(e) = async_fs::rename(&tmp, &path).await {
        warn!("failed to persist backup marker: {e}");
        let _ = async_fs::remove_file(&tmp).await;
    }
}

/// Time left until the next run. Overdue (or never run) means run now, which also covers a
/// host that was asleep when the backup was due.
fn until_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> Duration {
    let Some(last) = last else {
        return Duration::ZERO;
    };
    let Ok(interval) = chrono::Duration::from_std(interval) else {
        return Duration::ZERO;
    };
    (last + interval - now).to_std().unwrap_or(Duration::ZERO)
}

pub fn spawn_scheduler(service: Arc<BackupService>, schedule: BackupSchedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_hours = schedule.interval.as_secs() / 3600,
            keep = schedule.keep,
            "backup scheduler running"
        );
        loop {
            let last = read_last_backup(service.backup_dir()).await;
            let wait = until_due(last, Utc::now(), schedule.interval);
            if !wait.is_zero() {
                debug!("next scheduled backup in {}s", wait.as_secs());
                sleep(wait).await;
                continue;
            }

            let result = service.create_backup(schedule.upload).await;
            if result.status != BackupStatus::Created {
                warn!(backup = %result.name, "scheduled backup failed; retrying later");
                sleep(RETRY_AFTER.min(schedule.interval)).await;
                continue;
            }

            write_last_backup(service.backup_dir(), Utc::now()).await;
            if schedule.keep > 0 {
                match service.prune_local(schedule.keep).await {
                    Ok(removed) if !removed.is_empty() => {
                        info!(count = removed.len(), "pruned old backups")
                    }
                    Ok(_) => {}
                    Err(err) => warn!("failed to prune backups: {err}"),
                }
            }
        }
    })
}
