use serde::{Deserialize, Serialize};

use super::{AccountId, RpcError};

/// Privilege tiers, ascending. Each tier implies eligibility for every tier below it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Whitelisted,
    Trusted,
    Staff,
    Owner,
}

impl Tier {
    pub const ASCENDING: [Tier; 4] = [Tier::Whitelisted, Tier::Trusted, Tier::Staff, Tier::Owner];
    pub const DESCENDING: [Tier; 4] = [Tier::Owner, Tier::Staff, Tier::Trusted, Tier::Whitelisted];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Whitelisted => "Whitelisted",
            Tier::Trusted => "Trusted",
            Tier::Staff => "Staff",
            Tier::Owner => "Owner",
        }
    }
}

/// One linked identity. Field names are the persisted player-data format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerProfile {
    pub uuid: String,
    pub mc_username: String,
    #[serde(default)]
    pub is_trusted: bool,
    #[serde(default)]
    pub is_whitelisted: bool,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_staff: bool,
}

impl PlayerProfile {
    pub fn new(uuid: impl Into<String>, mc_username: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            mc_username: mc_username.into(),
            is_trusted: false,
            is_whitelisted: false,
            is_owner: false,
            is_staff: false,
        }
    }

    pub fn has(&self, tier: Tier) -> bool {
        match tier {
            Tier::Whitelisted => self.is_whitelisted,
            Tier::Trusted => self.is_trusted,
            Tier::Staff => self.is_staff,
            Tier::Owner => self.is_owner,
        }
    }

    pub fn set(&mut self, tier: Tier, value: bool) {
        match tier {
            Tier::Whitelisted => self.is_whitelisted = value,
            Tier::Trusted => self.is_trusted = value,
            Tier::Staff => self.is_staff = value,
            Tier::Owner => self.is_owner = value,
        }
    }

    /// Highest tier whose flag is set, checked from the top down.
    pub fn highest_tier(&self) -> Option<Tier> {
        Tier::DESCENDING.into_iter().find(|tier| self.has(*tier))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntry {
    pub account_id: AccountId,
    pub profile: PlayerProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncFailure {
    pub account_id: AccountId,
    pub error: RpcError,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    pub removed: Vec<AccountId>,
    pub reapplied: Vec<(AccountId, Tier)>,
    pub unchanged: usize,
    pub failed: Vec<SyncFailure>,
}
