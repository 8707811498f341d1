use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use keeper_core::proto::{ErrorCode, RpcError};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Object storage for backup artifacts. Keys are artifact file names.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Uploads `path` under `key` and returns its public link.
    async fn upload(&self, path: &Path, key: &str) -> Result<String, StoreError>;
    async fn list(&self) -> Result<Vec<RemoteObject>, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size_bytes: u64,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("`aws s3 {action}` failed ({status}): {stderr}")]
    Command {
        action: &'static str,
        status: String,
        stderr: String,
    },

    #[error("unexpected listing line: {0:?}")]
    Parse(String),

    #[error("failed to run the aws CLI: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::NotFound(_) => ErrorCode::FileNotFound,
            StoreError::Parse(_) => ErrorCode::ParseError,
            StoreError::Command { .. } | StoreError::Io(_) => ErrorCode::IoError,
        };
        RpcError::new(code, e.to_string())
    }
}

/// Everything the store needs; only built when every field is configured.
#[derive(Debug, Clone)]
pub struct CloudCredentials {
    pub region: String,
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// S3-compatible storage driven through the `aws` command line tool.
pub struct S3CliStore {
    credentials: CloudCredentials,
    program: String,
}

impl S3CliStore {
    pub fn new(credentials: CloudCredentials) -> Self {
        Self {
            credentials,
            program: "aws".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.credentials.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.credentials.endpoint.trim_end_matches('/'),
            self.credentials.bucket,
            key
        )
    }

    async fn run(&self, action: &'static str, args: &[&str]) -> Result<Output, StoreError> {
        debug!(action, "running aws s3");
        let output = Command::new(&self.program)
            .arg("s3")
            .arg(action)
            .args(args)
            .arg("--endpoint-url")
            .arg(&self.credentials.endpoint)
            .env("AWS_ACCESS_KEY_ID", &self.credentials.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", &self.credentials.secret_access_key)
            .env("AWS_DEFAULT_REGION", &self.credentials.region)
            .env("AWS_ENDPOINT_URL", &self.credentials.endpoint)
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("(404)") || stderr.contains("NoSuchKey") {
            return Err(StoreError::NotFound(args.first().copied().unwrap_or_default().to_string()));
        }
        Err(StoreError::Command {
            action,
            status: output.status.to_string(),
            stderr,
        })
    }
}

#[async_trait]
impl RemoteStore for S3CliStore {
    async fn upload(&self, path: &Path, key: &str) -> Result<String, StoreError> {
        let source = path.to_string_lossy().into_owned();
        let uri = self.object_uri(key);
        self.run("cp", &[source.as_str(), uri.as_str(), "--acl", "public-read"])
            .await?;
        Ok(self.public_url(key))
    }

    async fn list(&self) -> Result<Vec<RemoteObject>, StoreError> {
        let uri = format!("s3://{}/", self.credentials.bucket);
        let output = self.run("ls", &[uri.as_str()]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let objects = parse_listing(&stdout)?
            .into_iter()
            .map(|(key, size_bytes)| RemoteObject {
                url: self.public_url(&key),
                key,
                size_bytes,
            })
            .collect();
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let uri = self.object_uri(key);
        self.run("rm", &[uri.as_str()]).await?;
        Ok(())
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<(), StoreError> {
        let uri = self.object_uri(key);
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".partial");
        let partial = std::path::PathBuf::from(partial);

        let target = partial.to_string_lossy().into_owned();
        if let Err(err) = self.run("cp", &[uri.as_str(), target.as_str()]).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(match err {
                StoreError::NotFound(_) => StoreError::NotFound(key.to_string()),
                other => other,
            });
        }
        tokio::fs::rename(&partial, dest).await?;
        Ok(())
    }
}

/// `aws s3 ls` lines: `2024-01-02 03:04:05      12345 backup_2024-01-02_03-04-05.zip`.
/// Prefix lines (`PRE dir/`) are skipped.
fn parse_listing(stdout: &str) -> Result<Vec<(String, u64)>, StoreError> {
    let mut objects = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("PRE ") {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(StoreError::Parse(line.to_string()));
        }
        let size = fields[2]
            .parse::<u64>()
            .map_err(|_| StoreError::Parse(line.to_string()))?;
        objects.push((fields[3..].join(" "), size));
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::unique_temp_dir;
    use std::os::unix::fs::PermissionsExt;

    fn credentials() -> CloudCredentials {
        CloudCredentials {
            region: "auto".to_string(),
            bucket: "worlds".to_string(),
            endpoint: "https://s3.example.com/".to_string(),
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
        }
    }

    /// Stand-in `aws` that logs its arguments and region, and prints a canned listing.
    fn fake_cli(dir: &Path) -> std::path::PathBuf {
        std::fs::create_dir_all(dir).expect("create dir");
        let script = dir.join("aws");
        let log = dir.join("calls.log");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$AWS_DEFAULT_REGION $*\" >> '{log}'\n\
             if [ \"$2\" = ls ]; then\n\
             echo '                           PRE logs/'\n\
             echo '2024-01-02 03:04:05      12345 backup_2024-01-02_03-04-05.zip'\n\
             fi\n\
             if [ \"$2\" = cp ] && [ \"${{3#s3://}}\" != \"$3\" ]; then echo zipdata > \"$4\"; fi\n",
            log = log.display()
        );
        std::fs::write(&script, body).expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        script
    }

    #[test]
    fn listing_lines_are_parsed_and_prefixes_skipped() {
        let stdout = "                           PRE old/\n\
                      2024-01-02 03:04:05      12345 backup_2024-01-02_03-04-05.zip\n\
                      2024-01-03 03:04:05          7 notes with spaces.txt\n";
        let objects = parse_listing(stdout).expect("listing");
        assert_eq!(
            objects,
            vec![
                ("backup_2024-01-02_03-04-05.zip".to_string(), 12345),
                ("notes with spaces.txt".to_string(), 7),
            ]
        );
        assert!(parse_listing("2024-01-02 03:04:05 lots backup.zip").is_err());
    }

    #[test]
    fn public_url_joins_endpoint_bucket_and_key() {
        let store = S3CliStore::new(credentials());
        assert_eq!(
            store.public_url("backup_2024-01-02_03-04-05.zip"),
            "https://s3.example.com/worlds/backup_2024-01-02_03-04-05.zip"
        );
    }

    #[tokio::test]
    async fn cli_is_invoked_with_credentials_in_the_environment() {
        let dir = unique_temp_dir("remote-cli");
        let script = fake_cli(&dir);
        let store = S3CliStore::new(credentials()).with_program(script.to_string_lossy());

        let archive = dir.join("backup_2024-01-02_03-04-05.zip");
        std::fs::write(&archive, b"zip").expect("archive");
        let url = store
            .upload(&archive, "backup_2024-01-02_03-04-05.zip")
            .await
            .expect("upload");
        assert!(url.ends_with("/worlds/backup_2024-01-02_03-04-05.zip"));

        let listed = store.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size_bytes, 12345);

        let restored = dir.join("restored.zip");
        store
            .download("backup_2024-01-02_03-04-05.zip", &restored)
            .await
            .expect("download");
        assert!(restored.exists());

        store.delete("backup_2024-01-02_03-04-05.zip").await.expect("delete");

        let calls = std::fs::read_to_string(dir.join("calls.log")).expect("calls");
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].starts_with("auto s3 cp "));
        assert!(calls[0].contains("s3://worlds/backup_2024-01-02_03-04-05.zip --acl public-read"));
        assert!(calls[1].starts_with("auto s3 ls s3://worlds/"));
        assert!(calls[3].starts_with("auto s3 rm s3://worlds/backup_2024-01-02_03-04-05.zip"));

        let _ = std::fs::remove_dir_all(dir);
    }
}
