use std::path::Path;

use keeper_core::proto::SetupStep;
use tracing::{info, warn};

use crate::errors::ProvisionError;
use crate::properties::Properties;
use crate::{EULA_FILE, SERVER_PROPERTIES};

/// What the launch preconditions found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchReadiness {
    /// No `eula.txt` yet: the first launch only generates the server files.
    pub first_run: bool,
}

/// Checks the files a launch depends on: the server jar must exist; when present,
/// `server.properties` must enable RCON and `eula.txt` must be signed.
pub async fn check_launch_ready(
    server_dir: &Path,
    jar: &str,
) -> Result<LaunchReadiness, ProvisionError> {
    let jar_path = server_dir.join(jar);
    if !tokio::fs::try_exists(&jar_path).await? {
        return Err(ProvisionError::MissingJar(jar_path));
    }

    let properties_path = server_dir.join(SERVER_PROPERTIES);
    if tokio::fs::try_exists(&properties_path).await? {
        let properties = Properties::load(&properties_path).await?;
        if properties.get_bool("enable-rcon") != Some(true) {
            return Err(ProvisionError::RconDisabled);
        }
    }

    let eula_path = server_dir.join(EULA_FILE);
    if !tokio::fs::try_exists(&eula_path).await? {
        return Ok(LaunchReadiness { first_run: true });
    }
    let eula = Properties::load(&eula_path).await?;
    if eula.get_bool("eula") != Some(true) {
        return Err(ProvisionError::EulaUnsigned);
    }

    Ok(LaunchReadiness { first_run: false })
}

pub async fn sign_eula(server_dir: &Path) -> SetupStep {
    let path = server_dir.join(EULA_FILE);
    let result = async {
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        let mut eula = Properties::load(&path).await?;
        eula.set_bool("eula", true);
        eula.save(&path).await?;
        Ok::<_, ProvisionError>(true)
    }
    .await;

    match result {
        Ok(true) => {
            info!("EULA signed");
            SetupStep::Applied {}
        }
        Ok(false) => SetupStep::Missing {},
        Err(err) => {
            warn!("failed to sign EULA: {err}");
            SetupStep::Failed {
                message: err.to_string(),
            }
        }
    }
}

pub async fn ensure_rcon_configured(server_dir: &Path, port: u16, password: &str) -> SetupStep {
    let path = server_dir.join(SERVER_PROPERTIES);
    let result = async {
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        let mut properties = Properties::load(&path).await?;
        properties.set_bool("enable-rcon", true);
        properties.set("rcon.password", password);
        properties.set("rcon.port", port);
        properties.save(&path).await?;
        Ok::<_, ProvisionError>(true)
    }
    .await;

    match result {
        Ok(true) => {
            info!(port, "RCON enabled");
            SetupStep::Applied {}
        }
        Ok(false) => SetupStep::Missing {},
        Err(err) => {
            warn!("failed to enable RCON: {err}");
            SetupStep::Failed {
                message: err.to_string(),
            }
        }
    }
}
