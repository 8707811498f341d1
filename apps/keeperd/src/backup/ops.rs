use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use keeper_core::proto::{
    BackupEntry, BackupListing, BackupLocation, BackupResult, BackupStatus, DeleteOutcome,
    ErrorCode, RestoreResult, RpcError, UploadStatus,
};
use keeper_rcon::CommandSender;
use keeper_utils::mebibytes;
use tracing::{info, warn};

use super::archive::{self, ArchiveError, ArchiveSummary};
use super::remote::RemoteStore;
use crate::supervisor::Supervisor;

const NAME_FORMAT: &str = "backup_%Y-%m-%d_%H-%M-%S.zip";

pub fn artifact_name(at: NaiveDateTime) -> String {
    at.format(NAME_FORMAT).to_string()
}

/// Timestamp encoded in an artifact name; `None` for anything that is not one.
pub fn parse_artifact_name(name: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(name, NAME_FORMAT).ok()
}

fn entry_for(name: String, size_bytes: u64, url: Option<String>) -> Option<BackupEntry> {
    let at = parse_artifact_name(&name)?;
    Some(BackupEntry {
        date: at.format("%Y-%m-%d").to_string(),
        time: at.format("%H:%M:%S").to_string(),
        name,
        size_bytes,
        url,
    })
}

impl From<ArchiveError> for RpcError {
    fn from(e: ArchiveError) -> Self {
        let code = match &e {
            ArchiveError::NotADirectory(_) => ErrorCode::NotADirectory,
            ArchiveError::NotFound(_) => ErrorCode::FileNotFound,
            ArchiveError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            ArchiveError::UnsupportedPath(_) | ArchiveError::UnsafeEntry(_) => {
                ErrorCode::BadRequest
            }
            ArchiveError::Zip(_) | ArchiveError::Walk(_) | ArchiveError::Io(_) => ErrorCode::IoError,
        };
        RpcError::new(code, e.to_string())
    }
}

/// Creates, lists, deletes and restores world backups.
pub struct BackupService {
    backup_dir: PathBuf,
    supervisor: Arc<Supervisor>,
    rcon: Arc<dyn CommandSender>,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl BackupService {
    pub fn new(
        backup_dir: PathBuf,
        supervisor: Arc<Supervisor>,
        rcon: Arc<dyn CommandSender>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        Self {
            backup_dir,
            supervisor,
            rcon,
            remote,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Archives the server directory while no lifecycle operation can run. A running
    /// server has autosave paused and the world flushed first; autosave is switched back
    /// on whether or not archiving worked.
    pub async fn create_backup(&self, upload: bool) -> BackupResult {
        let name = artifact_name(Local::now().naive_local());

        let lifecycle = self.supervisor.lifecycle_guard().await;
        let archived = self.archive_quiesced(&name).await;
        drop(lifecycle);

        let (summary, save_on_error) = match archived {
            Ok(done) => done,
            Err(err) => {
                warn!(backup = %name, "backup failed: {err}");
                return BackupResult::failed(name, err);
            }
        };
        info!(
            backup = %name,
            files = summary.files,
            size_mib = mebibytes(summary.size_bytes),
            "backup created"
        );

        let upload = if upload {
            self.upload(&name).await
        } else {
            UploadStatus::NotRequested {}
        };

        BackupResult {
            status: BackupStatus::Created,
            name,
            size_bytes: Some(summary.size_bytes),
            upload,
            save_on_error,
            error: None,
        }
    }

    async fn archive_quiesced(
        &self,
        name: &str,
    ) -> Result<(ArchiveSummary, Option<RpcError>), RpcError> {
        let dest = self.backup_dir.join(name);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Err(ArchiveError::AlreadyExists(dest).into());
        }

        let running = self.supervisor.is_running().await;
        if running {
            self.console("save-off").await?;
            if let Err(err) = self.console("save-all").await {
                if let Err(again) = self.console("save-on").await {
                    warn!("autosave may still be off: {again}");
                }
                return Err(err);
            }
        }

        let archived = self.archive(dest).await;

        let save_on_error = if running {
            self.console("save-on").await.err()
        } else {
            None
        };
        if let Some(err) = &save_on_error {
            warn!("failed to re-enable autosave: {err}");
        }

        Ok((archived?, save_on_error))
    }

    async fn console(&self, command: &str) -> Result<String, RpcError> {
        self.rcon.send(command).await.map_err(|err| {
            RpcError::from(err).with_detail("command", command)
        })
    }

    async fn archive(&self, dest: PathBuf) -> Result<ArchiveSummary, RpcError> {
        let source = self.supervisor.server_dir().to_path_buf();
        let exclude = vec![self.backup_dir.clone()];
        tokio::task::spawn_blocking(move || archive::create_archive(&source, &dest, &exclude))
            .await
            .map_err(|err| RpcError::new(ErrorCode::Internal, format!("archive task failed: {err}")))?
            .map_err(RpcError::from)
    }

    async fn upload(&self, name: &str) -> UploadStatus {
        let Some(store) = &self.remote else {
            return UploadStatus::NotConfigured {};
        };
        match store.upload(&self.backup_dir.join(name), name).await {
            Ok(url) => {
                info!(backup = %name, %url, "backup uploaded");
                UploadStatus::Uploaded { url }
            }
            Err(err) => {
                warn!(backup = %name, "upload failed: {err}");
                UploadStatus::Failed { error: err.into() }
            }
        }
    }

    /// Newest first. Files that are not backup artifacts are ignored.
    pub async fn list_backups(&self, location: BackupLocation) -> Result<BackupListing, RpcError> {
        let mut entries = match location {
            BackupLocation::Local => self.local_entries().await?,
            BackupLocation::Remote => {
                let Some(store) = &self.remote else {
                    return Ok(BackupListing::NotConfigured {});
                };
                store
                    .list()
                    .await?
                    .into_iter()
                    .filter_map(|object| entry_for(object.key, object.size_bytes, Some(object.url)))
                    .collect()
            }
        };
        entries.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(BackupListing::Listed { entries })
    }

    async fn local_entries(&self) -> Result<Vec<BackupEntry>, RpcError> {
        let mut dir = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error("reading backup directory", err)),
        };

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|err| io_error("reading backup directory", err))?
        {
            let Ok(name) = item.file_name().into_string() else {
                continue;
            };
            let metadata = match item.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            if let Some(entry) = entry_for(name, metadata.len(), None) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// One outcome per requested name, in request order.
    pub async fn delete_backups(
        &self,
        location: BackupLocation,
        names: &[String],
    ) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let error = self.delete_one(location, name).await.err();
            if let Some(err) = &error {
                warn!(backup = %name, ?location, "delete failed: {err}");
            } else {
                info!(backup = %name, ?location, "backup deleted");
            }
            outcomes.push(DeleteOutcome {
                name: name.clone(),
                error,
            });
        }
        outcomes
    }

    async fn delete_one(&self, location: BackupLocation, name: &str) -> Result<(), RpcError> {
        ensure_artifact_name(name)?;
        match location {
            BackupLocation::Local => match tokio::fs::remove_file(self.backup_dir.join(name)).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(RpcError::new(
                    ErrorCode::FileNotFound,
                    format!("no local backup named {name}"),
                )),
                Err(err) => Err(io_error("deleting backup", err)),
            },
            BackupLocation::Remote => {
                let store = self.remote.as_ref().ok_or_else(not_configured)?;
                Ok(store.delete(name).await?)
            }
        }
    }

    /// Replaces the server directory with an artifact. Refused while the server runs; an
    /// artifact missing locally is fetched from remote storage first when possible.
    pub async fn restore_backup(&self, name: &str) -> RestoreResult {
        if let Err(error) = ensure_artifact_name(name) {
            return RestoreResult::Failed { error };
        }

        let _lifecycle = self.supervisor.lifecycle_guard().await;
        if self.supervisor.is_running().await {
            return RestoreResult::Aborted {
                reason: "Stop the server before restoring a backup.".to_string(),
            };
        }

        let path = self.backup_dir.join(name);
        let mut downloaded = false;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let Some(store) = &self.remote else {
                return RestoreResult::Failed {
                    error: RpcError::new(ErrorCode::FileNotFound, format!("no backup named {name}")),
                };
            };
            if let Err(err) = tokio::fs::create_dir_all(&self.backup_dir).await {
                return RestoreResult::Failed {
                    error: io_error("creating backup directory", err),
                };
            }
            if let Err(err) = store.download(name, &path).await {
                return RestoreResult::Failed { error: err.into() };
            }
            downloaded = true;
        }

        let target = self.supervisor.server_dir().to_path_buf();
        let restored =
            tokio::task::spawn_blocking(move || archive::restore_archive(&path, &target)).await;
        match restored {
            Ok(Ok(summary)) => {
                info!(backup = %name, files = summary.files, downloaded, "backup restored");
                RestoreResult::Restored {
                    name: name.to_string(),
                    downloaded,
                }
            }
            Ok(Err(err)) => {
                warn!(backup = %name, "restore failed: {err}");
                RestoreResult::Failed { error: err.into() }
            }
            Err(err) => RestoreResult::Failed {
                error: RpcError::new(ErrorCode::Internal, format!("restore task failed: {err}")),
            },
        }
    }

    /// Deletes the oldest local artifacts so at most `keep` remain.
    pub async fn prune_local(&self, keep: usize) -> Result<Vec<String>, RpcError> {
        let mut entries = self.local_entries().await?;
        if entries.len() <= keep {
            return Ok(Vec::new());
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let excess = entries.len() - keep;

        let mut removed = Vec::with_capacity(excess);
        for entry in entries.into_iter().take(excess) {
            match tokio::fs::remove_file(self.backup_dir.join(&entry.name)).await {
                Ok(()) => removed.push(entry.name),
                Err(err) => warn!(backup = %entry.name, "failed to prune backup: {err}"),
            }
        }
        Ok(removed)
    }
}

fn ensure_artifact_name(name: &str) -> Result<(), RpcError> {
    if parse_artifact_name(name).is_none() {
        return Err(RpcError::new(
            ErrorCode::BadRequest,
            format!("not a backup name: {name:?}"),
        ));
    }
    Ok(())
}

fn not_configured() -> RpcError {
    RpcError::new(ErrorCode::NotConfigured, "cloud storage is not configured")
}

fn io_error(context: &'static str, err: std::io::Error) -> RpcError {
    keeper_core::CoreError::io(context, err).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::remote::{RemoteObject, StoreError};
    use crate::testing::{sleeping_supervisor, unique_temp_dir, RecordingSender};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory bucket.
    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl RemoteStore for MemoryStore {
        async fn upload(&self, path: &Path, key: &str) -> Result<String, StoreError> {
            let bytes = tokio::fs::read(path).await?;
            self.objects.lock().expect("objects").insert(key.to_string(), bytes);
            Ok(format!("https://s3.example.com/worlds/{key}"))
        }

        async fn list(&self) -> Result<Vec<RemoteObject>, StoreError> {
            let objects = self.objects.lock().expect("objects");
            Ok(objects
                .iter()
                .map(|(key, bytes)| RemoteObject {
                    key: key.clone(),
                    size_bytes: bytes.len() as u64,
                    url: format!("https://s3.example.com/worlds/{key}"),
                })
                .collect())
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.objects.lock().expect("objects").remove(key);
            Ok(())
        }

        async fn download(&self, key: &str, dest: &Path) -> Result<(), StoreError> {
            let bytes = self
                .objects
                .lock()
                .expect("objects")
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            tokio::fs::write(dest, bytes).await?;
            Ok(())
        }
    }

    struct Fixture {
        root: PathBuf,
        supervisor: Arc<Supervisor>,
        service: BackupService,
    }

    fn fixture(
        prefix: &str,
        rcon: Arc<RecordingSender>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Fixture {
        let root = unique_temp_dir(prefix);
        let server_dir = root.join("server");
        let supervisor = Arc::new(sleeping_supervisor(&server_dir, rcon.clone()));
        std::fs::create_dir_all(server_dir.join("world")).expect("world");
        std::fs::write(server_dir.join("world/level.dat"), b"level").expect("level.dat");
        let service = BackupService::new(root.join("backups"), supervisor.clone(), rcon, remote);
        Fixture {
            root,
            supervisor,
            service,
        }
    }

    fn artifacts(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[test]
    fn artifact_names_encode_the_timestamp() {
        let at = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S")
            .expect("timestamp");
        let name = artifact_name(at);
        assert_eq!(name, "backup_2024-01-02_03-04-05.zip");
        assert_eq!(parse_artifact_name(&name), Some(at));
        assert_eq!(parse_artifact_name("backup_2024-01-02.zip"), None);
        assert_eq!(parse_artifact_name("../backup_2024-01-02_03-04-05.zip"), None);

        let entry = entry_for(name, 10, None).expect("entry");
        assert_eq!(entry.date, "2024-01-02");
        assert_eq!(entry.time, "03:04:05");
    }

    #[tokio::test]
    async fn running_server_is_quiesced_around_the_archive() {
        let rcon = RecordingSender::new();
        let f = fixture("backup-running", rcon.clone(), None);
        f.supervisor.start().await.expect("start");

        let result = f.service.create_backup(false).await;
        assert_eq!(result.status, BackupStatus::Created, "{result:?}");
        assert_eq!(result.upload, UploadStatus::NotRequested {});
        assert_eq!(rcon.calls(), vec!["save-off", "save-all", "save-on"]);
        assert_eq!(artifacts(f.service.backup_dir()), vec![result.name.clone()]);

        f.supervisor.force_stop().await.expect("kill");
        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn stopped_server_is_archived_without_console_commands() {
        let rcon = RecordingSender::new();
        let f = fixture("backup-stopped", rcon.clone(), None);

        let result = f.service.create_backup(true).await;
        assert_eq!(result.status, BackupStatus::Created);
        assert!(result.size_bytes.unwrap_or_default() > 0);
        assert!(rcon.calls().is_empty());
        assert_eq!(result.upload, UploadStatus::NotConfigured {});

        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn backup_holds_every_server_file_at_roughly_their_size() {
        let f = fixture("backup-contents", RecordingSender::new(), None);
        let server_dir = f.supervisor.server_dir().to_path_buf();
        std::fs::create_dir_all(server_dir.join("world/region")).expect("region dir");

        let mut expected: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        expected.insert("server.jar".to_string(), b"jar".to_vec());
        expected.insert("world/level.dat".to_string(), b"level".to_vec());
        for n in 0..5u32 {
            // Scrambled bytes so deflate cannot shrink them much.
            let bytes: Vec<u8> = (0..2048 * (n + 1))
                .map(|i| (i.wrapping_mul(2_654_435_761).wrapping_add(n) >> 13) as u8)
                .collect();
            let name = format!("world/region/r.{n}.0.mca");
            std::fs::write(server_dir.join(&name), &bytes).expect("region file");
            expected.insert(name, bytes);
        }
        let total: u64 = expected.values().map(|bytes| bytes.len() as u64).sum();

        let result = f.service.create_backup(false).await;
        assert_eq!(result.status, BackupStatus::Created, "{result:?}");
        let artifact = f.service.backup_dir().join(&result.name);

        let mut zip = zip::ZipArchive::new(std::fs::File::open(&artifact).expect("open"))
            .expect("read zip");
        assert_eq!(zip.len(), expected.len());
        for (name, bytes) in &expected {
            let mut entry = zip.by_name(name).expect("entry present");
            let mut stored = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut stored).expect("inflate");
            assert_eq!(&stored, bytes, "{name}");
        }

        // Local header, central record and deflate framing per entry, plus the trailer.
        let size = result.size_bytes.expect("size");
        let overhead = expected.len() as u64 * 256 + 22;
        assert!(size <= total + overhead, "{size} bytes for {total} bytes of input");
        assert_eq!(size, std::fs::metadata(&artifact).expect("stat").len());

        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn unreachable_console_aborts_before_archiving() {
        let rcon = RecordingSender::new();
        rcon.refuse("save-off");
        let f = fixture("backup-unreachable", rcon.clone(), None);
        f.supervisor.start().await.expect("start");

        let result = f.service.create_backup(false).await;
        assert_eq!(result.status, BackupStatus::Failed);
        let error = result.error.expect("error");
        assert_eq!(error.code, ErrorCode::Unreachable);
        assert_eq!(error.details.get("command").map(String::as_str), Some("save-off"));
        assert_eq!(rcon.calls(), vec!["save-off"]);
        assert!(artifacts(f.service.backup_dir()).is_empty());

        f.supervisor.force_stop().await.expect("kill");
        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn failed_flush_still_turns_autosave_back_on() {
        let rcon = RecordingSender::new();
        rcon.refuse("save-all");
        let f = fixture("backup-flush", rcon.clone(), None);
        f.supervisor.start().await.expect("start");

        let result = f.service.create_backup(false).await;
        assert_eq!(result.status, BackupStatus::Failed);
        assert_eq!(rcon.calls(), vec!["save-off", "save-all", "save-on"]);
        assert!(artifacts(f.service.backup_dir()).is_empty());

        f.supervisor.force_stop().await.expect("kill");
        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn save_on_failure_is_reported_but_keeps_the_artifact() {
        let rcon = RecordingSender::new();
        rcon.refuse("save-on");
        let f = fixture("backup-saveon", rcon.clone(), None);
        f.supervisor.start().await.expect("start");

        let result = f.service.create_backup(false).await;
        assert_eq!(result.status, BackupStatus::Created);
        assert!(result.save_on_error.is_some());
        assert_eq!(artifacts(f.service.backup_dir()).len(), 1);

        f.supervisor.force_stop().await.expect("kill");
        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn remote_listing_without_cloud_settings_is_not_configured() {
        let f = fixture("backup-nocloud", RecordingSender::new(), None);

        assert_eq!(
            f.service.list_backups(BackupLocation::Remote).await.expect("list"),
            BackupListing::NotConfigured {}
        );
        let outcomes = f
            .service
            .delete_backups(BackupLocation::Remote, &["backup_2024-01-02_03-04-05.zip".to_string()])
            .await;
        assert_eq!(
            outcomes[0].error.as_ref().map(|e| e.code),
            Some(ErrorCode::NotConfigured)
        );

        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn local_listing_and_deletion() {
        let f = fixture("backup-list", RecordingSender::new(), None);
        let dir = f.service.backup_dir().to_path_buf();
        std::fs::create_dir_all(&dir).expect("backup dir");
        for name in [
            "backup_2024-01-02_03-04-05.zip",
            "backup_2024-03-01_00-00-00.zip",
            "notes.txt",
            ".last_backup",
        ] {
            std::fs::write(dir.join(name), b"data").expect("write");
        }

        let BackupListing::Listed { entries } =
            f.service.list_backups(BackupLocation::Local).await.expect("list")
        else {
            panic!("local listing is always available");
        };
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["backup_2024-03-01_00-00-00.zip", "backup_2024-01-02_03-04-05.zip"]);
        assert_eq!(entries[1].time, "03:04:05");
        assert_eq!(entries[1].size_bytes, 4);

        let outcomes = f
            .service
            .delete_backups(
                BackupLocation::Local,
                &[
                    "backup_2024-01-02_03-04-05.zip".to_string(),
                    "backup_1999-01-01_00-00-00.zip".to_string(),
                    "../server/server.jar".to_string(),
                ],
            )
            .await;
        let codes: Vec<Option<ErrorCode>> =
            outcomes.iter().map(|o| o.error.as_ref().map(|e| e.code)).collect();
        assert_eq!(codes, [None, Some(ErrorCode::FileNotFound), Some(ErrorCode::BadRequest)]);
        assert!(!dir.join("backup_2024-01-02_03-04-05.zip").exists());
        assert!(f.supervisor.server_dir().join("server.jar").exists());

        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn restore_is_refused_while_running() {
        let f = fixture("backup-restore-running", RecordingSender::new(), None);
        let backup = f.service.create_backup(false).await;
        f.supervisor.start().await.expect("start");

        let result = f.service.restore_backup(&backup.name).await;
        assert!(matches!(result, RestoreResult::Aborted { .. }));

        f.supervisor.force_stop().await.expect("kill");
        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn restore_replaces_the_server_directory() {
        let f = fixture("backup-restore", RecordingSender::new(), None);
        let backup = f.service.create_backup(false).await;
        let server_dir = f.supervisor.server_dir().to_path_buf();
        std::fs::write(server_dir.join("world/level.dat"), b"griefed").expect("overwrite");

        let result = f.service.restore_backup(&backup.name).await;
        assert_eq!(
            result,
            RestoreResult::Restored {
                name: backup.name.clone(),
                downloaded: false
            }
        );
        assert_eq!(std::fs::read(server_dir.join("world/level.dat")).expect("read"), b"level");

        let missing = f.service.restore_backup("backup_1999-01-01_00-00-00.zip").await;
        match missing {
            RestoreResult::Failed { error } => assert_eq!(error.code, ErrorCode::FileNotFound),
            other => panic!("unexpected restore result {other:?}"),
        }

        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn uploaded_backups_can_be_restored_after_local_deletion() {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::default());
        let f = fixture("backup-remote", RecordingSender::new(), Some(store));

        let backup = f.service.create_backup(true).await;
        assert_eq!(
            backup.remote_url(),
            Some(format!("https://s3.example.com/worlds/{}", backup.name).as_str())
        );

        let BackupListing::Listed { entries } =
            f.service.list_backups(BackupLocation::Remote).await.expect("list")
        else {
            panic!("remote is configured");
        };
        assert_eq!(entries.len(), 1);
        assert!(entries[0].url.is_some());

        let outcomes = f
            .service
            .delete_backups(BackupLocation::Local, &[backup.name.clone()])
            .await;
        assert!(outcomes[0].error.is_none());

        let result = f.service.restore_backup(&backup.name).await;
        assert_eq!(
            result,
            RestoreResult::Restored {
                name: backup.name.clone(),
                downloaded: true
            }
        );
        assert!(f.service.backup_dir().join(&backup.name).exists());

        let _ = std::fs::remove_dir_all(f.root);
    }

    #[tokio::test]
    async fn pruning_keeps_the_newest_artifacts() {
        let f = fixture("backup-prune", RecordingSender::new(), None);
        let dir = f.service.backup_dir().to_path_buf();
        std::fs::create_dir_all(&dir).expect("backup dir");
        for day in 1..=4 {
            let name = format!("backup_2024-01-0{day}_00-00-00.zip");
            std::fs::write(dir.join(name), b"data").expect("write");
        }

        let removed = f.service.prune_local(2).await.expect("prune");
        assert_eq!(
            removed,
            ["backup_2024-01-01_00-00-00.zip", "backup_2024-01-02_00-00-00.zip"]
        );
        assert_eq!(
            artifacts(&dir),
            ["backup_2024-01-03_00-00-00.zip", "backup_2024-01-04_00-00-00.zip"]
        );
        assert!(f.service.prune_local(5).await.expect("noop").is_empty());

        let _ = std::fs::remove_dir_all(f.root);
    }
}
