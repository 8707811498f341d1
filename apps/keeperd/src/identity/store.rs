use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keeper_core::proto::{AccountId, PlayerProfile};

use super::errors::IdentityError;

pub type Profiles = BTreeMap<AccountId, PlayerProfile>;

/// The player-data file: one JSON object keyed by account id.
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty file on first use.
    pub async fn load(&self) -> Result<Profiles, IdentityError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Profiles::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(IdentityError::Corrupt),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let empty = Profiles::new();
                self.save(&empty).await?;
                Ok(empty)
            }
            Err(err) => Err(IdentityError::io("reading player data", err)),
        }
    }

    pub async fn save(&self, profiles: &Profiles) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| IdentityError::io("creating player data directory", err))?;
        }
        let json = serde_json::to_vec_pretty(profiles).map_err(IdentityError::Corrupt)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|err| IdentityError::io("writing player data", err))?;
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(IdentityError::io("replacing player data", err));
        }
        Ok(())
    }
}
