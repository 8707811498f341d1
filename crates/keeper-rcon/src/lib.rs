mod client;
mod error;
pub mod parse;

pub use client::{RconClient, RconSettings};
pub use error::RconError;

use async_trait::async_trait;

/// Anything that can deliver one console command and hand back the reply text.
///
/// `RconClient` is the production implementation; callers take `Arc<dyn CommandSender>` so
/// the command sequence can be recorded in tests. Implementations never retry.
#[async_trait]
pub trait CommandSender: Send + Sync {
    async fn send(&self, command: &str) -> Result<String, RconError>;
}
