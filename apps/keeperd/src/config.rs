use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use keeper_client::playerdb::DEFAULT_LOOKUP_URL;
use keeper_rcon::RconSettings;
use serde::{Deserialize, Serialize};

use crate::backup::{BackupSchedule, CloudCredentials};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    pub server: ServerConfig,
    pub rcon: RconSettings,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub dir: PathBuf,
    #[serde(default = "default_jar")]
    pub jar: String,
    #[serde(default = "default_java")]
    pub java: String,
    /// Heap size for both `-Xms` and `-Xmx`; sized from system memory when absent.
    #[serde(default)]
    pub ram: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub autostart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
    /// 0 turns scheduled backups off.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default)]
    pub upload: bool,
    #[serde(default)]
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            interval_hours: default_interval_hours(),
            upload: false,
            keep: 0,
        }
    }
}

impl BackupConfig {
    /// `None` when scheduling is off or the interval does not fit in seconds.
    pub fn schedule(&self) -> Option<BackupSchedule> {
        if self.interval_hours == 0 {
            return None;
        }
        Some(BackupSchedule {
            interval: Duration::from_secs(self.interval_hours.checked_mul(3600)?),
            upload: self.upload,
            keep: self.keep,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudConfig {
    pub region_name: Option<String>,
    pub bucket_name: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    /// Path to the `aws` executable when it is not on `PATH`.
    #[serde(default)]
    pub aws_cli: Option<String>,
}

impl CloudConfig {
    /// `None` unless every field is present and non-empty.
    pub fn credentials(&self) -> Option<CloudCredentials> {
        fn field(value: &Option<String>) -> Option<String> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        }
        Some(CloudCredentials {
            region: field(&self.region_name)?,
            bucket: field(&self.bucket_name)?,
            endpoint: field(&self.endpoint_url)?,
            access_key_id: field(&self.access_key_id)?,
            secret_access_key: field(&self.access_key_secret)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            lookup_url: default_lookup_url(),
        }
    }
}

impl KeeperConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::parse(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Relative paths are taken relative to the config file's directory.
    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.server.dir,
            &mut self.backup.dir,
            &mut self.identity.data_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
            *path = normalize(path);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.rcon.password.is_empty() {
            bail!("[rcon] password must be set");
        }
        // A restore replaces the whole server directory, so backups must live elsewhere.
        if normalize(&self.backup.dir).starts_with(normalize(&self.server.dir)) {
            bail!(
                "[backup] dir {} must not be inside the server directory {}",
                self.backup.dir.display(),
                self.server.dir.display()
            );
        }
        if self.backup.interval_hours.checked_mul(3600).is_none() {
            bail!(
                "[backup] interval_hours {} is too large",
                self.backup.interval_hours
            );
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.server.stop_timeout_secs)
    }
}

/// `KEEPER_CONFIG`, else `<data dir>/keeper/keeper.toml`.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os("KEEPER_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    if let Some(base) = dirs::data_dir() {
        return Ok(base.join("keeper").join("keeper.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".keeper").join("keeper.toml"));
    }
    bail!("Unable to resolve a config directory; set KEEPER_CONFIG")
}

/// Folds `.` and `..` lexically, without following symlinks.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn default_jar() -> String {
    "server.jar".to_string()
}

fn default_java() -> String {
    "java".to_string()
}

fn default_stop_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_interval_hours() -> u64 {
    24
}

fn default_data_file() -> PathBuf {
    PathBuf::from("playerdata.json")
}

fn default_lookup_url() -> String {
    DEFAULT_LOOKUP_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[server]
dir = "server"

[rcon]
password = "hunter2"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let mut config = KeeperConfig::parse(MINIMAL).expect("parse");
        config.resolve_paths(Path::new("/srv/keeper"));
        config.validate().expect("valid");

        assert_eq!(config.server.dir, PathBuf::from("/srv/keeper/server"));
        assert_eq!(config.server.jar, "server.jar");
        assert!(config.server.autostart);
        assert_eq!(config.stop_timeout(), Duration::from_secs(60));
        assert_eq!(config.rcon.port, 25575);
        assert_eq!(config.backup.dir, PathBuf::from("/srv/keeper/backups"));
        assert_eq!(
            config.backup.schedule().map(|s| s.interval),
            Some(Duration::from_secs(24 * 3600))
        );
        assert_eq!(config.identity.data_file, PathBuf::from("/srv/keeper/playerdata.json"));
        assert_eq!(config.identity.lookup_url, DEFAULT_LOOKUP_URL);
        assert!(config.cloud.credentials().is_none());
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
[server]
dir = "/srv/mc"
ram = "6G"
extra_args = ["-XX:+UseG1GC"]
stop_timeout_secs = 30
autostart = false

[rcon]
host = "10.0.0.2"
port = 25580
password = "pw"

[backup]
dir = "/var/backups/mc"
interval_hours = 0
keep = 7

[cloud]
region_name = "auto"
bucket_name = "worlds"
endpoint_url = "https://s3.example.com"
access_key_id = "AKID"
access_key_secret = "secret"
"#;
        let config = KeeperConfig::parse(raw).expect("parse");
        assert_eq!(config.server.ram.as_deref(), Some("6G"));
        assert_eq!(config.rcon.address(), "10.0.0.2:25580");
        assert!(config.backup.schedule().is_none());
        let credentials = config.cloud.credentials().expect("cloud");
        assert_eq!(credentials.bucket, "worlds");
    }

    #[test]
    fn cloud_needs_every_field() {
        let cloud = CloudConfig {
            region_name: Some("auto".into()),
            bucket_name: Some("worlds".into()),
            endpoint_url: Some("https://s3.example.com".into()),
            access_key_id: Some("AKID".into()),
            access_key_secret: Some("  ".into()),
            aws_cli: None,
        };
        assert!(cloud.credentials().is_none());
    }

    #[test]
    fn backups_inside_the_server_directory_are_rejected() {
        let raw = r#"
[server]
dir = "/srv/mc"

[rcon]
password = "pw"

[backup]
dir = "/srv/mc/backups"
"#;
        let config = KeeperConfig::parse(raw).expect("parse");
        assert!(config.validate().is_err());

        let mut config = KeeperConfig::parse(MINIMAL).expect("parse");
        config.rcon.password.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parent_segments_cannot_hide_backups_in_the_server_directory() {
        let raw = r#"
[server]
dir = "/srv/mc"

[rcon]
password = "pw"

[backup]
dir = "/srv/mc/../mc/backups"
"#;
        let config = KeeperConfig::parse(raw).expect("parse");
        assert!(config.validate().is_err());

        let mut config = KeeperConfig::parse(MINIMAL).expect("parse");
        config.server.dir = PathBuf::from("./world/../server");
        config.backup.dir = PathBuf::from("server/./backups");
        config.resolve_paths(Path::new("/srv/keeper"));
        assert_eq!(config.server.dir, PathBuf::from("/srv/keeper/server"));
        assert_eq!(config.backup.dir, PathBuf::from("/srv/keeper/server/backups"));
        assert!(config.validate().is_err());

        // Siblings that merely share a name prefix are fine.
        config.backup.dir = PathBuf::from("/srv/keeper/server-backups");
        config.validate().expect("sibling directory");
    }

    #[test]
    fn normalize_folds_parent_and_current_segments() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("../../a")), PathBuf::from("../../a"));
    }

    #[test]
    fn oversized_backup_intervals_are_rejected() {
        let mut config = KeeperConfig::parse(MINIMAL).expect("parse");
        config.resolve_paths(Path::new("/srv/keeper"));
        config.backup.interval_hours = u64::MAX / 1000;
        assert!(config.validate().is_err());
        assert!(config.backup.schedule().is_none());

        config.backup.interval_hours = 24 * 365;
        config.validate().expect("a year is fine");
        assert_eq!(
            config.backup.schedule().map(|s| s.interval),
            Some(Duration::from_secs(24 * 365 * 3600))
        );
    }
}
