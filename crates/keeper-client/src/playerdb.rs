use std::time::Duration;

use async_trait::async_trait;
use keeper_core::proto::{ErrorCode, RpcError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_LOOKUP_URL: &str = "https://playerdb.co/api/player/minecraft";

/// Canonical game account for a username (or id) query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlayer {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("player not found: {0}")]
    NotFound(String),

    #[error("invalid lookup url: {0}")]
    InvalidUrl(String),

    #[error("player lookup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected lookup response: {0}")]
    Decode(String),
}

impl From<LookupError> for RpcError {
    fn from(e: LookupError) -> Self {
        let code = match &e {
            LookupError::NotFound(_) => ErrorCode::PlayerNotFound,
            LookupError::InvalidUrl(_) => ErrorCode::InvalidConfig,
            LookupError::Http(_) | LookupError::Decode(_) => ErrorCode::Internal,
        };
        RpcError::new(code, e.to_string())
    }
}

#[async_trait]
pub trait PlayerLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<ResolvedPlayer, LookupError>;
}

pub struct PlayerDbClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    player: Option<LookupPlayer>,
}

#[derive(Debug, Deserialize)]
struct LookupPlayer {
    id: String,
    username: String,
}

impl PlayerDbClient {
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        let base_url =
            Url::parse(base_url).map_err(|err| LookupError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LookupError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("keeper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn player_url(&self, query: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(query);
        Ok(url)
    }
}

#[async_trait]
impl PlayerLookup for PlayerDbClient {
    async fn lookup(&self, query: &str) -> Result<ResolvedPlayer, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::NotFound(query.to_string()));
        }

        let url = self.player_url(query)?;
        debug!(%url, "looking up player");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(query.to_string()));
        }

        // The service answers misses with a 4xx and `success: false`.
        let body = response.text().await?;
        parse_lookup_response(query, &body)
    }
}

fn parse_lookup_response(query: &str, body: &str) -> Result<ResolvedPlayer, LookupError> {
    let parsed: LookupResponse =
        serde_json::from_str(body).map_err(|err| LookupError::Decode(err.to_string()))?;
    if !parsed.success {
        return Err(LookupError::NotFound(query.to_string()));
    }
    let player = parsed
        .data
        .and_then(|data| data.player)
        .ok_or_else(|| LookupError::Decode("missing data.player".to_string()))?;
    Ok(ResolvedPlayer {
        id: player.id,
        username: player.username,
    })
}
