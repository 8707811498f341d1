//! Links chat accounts to game accounts and keeps the server's privilege state in step
//! with the tiers recorded for each link.
//!
//! All mutations run under one lock. A tier change is applied on the server first and only
//! then recorded and persisted, one tier at a time, so a failure part way through a cascade
//! leaves the completed steps applied and the rest untouched.

mod commands;
mod errors;
mod store;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use keeper_client::PlayerLookup;
use keeper_core::proto::{AccountId, PlayerProfile, ProfileEntry, SyncFailure, SyncReport, Tier};
use keeper_rcon::{parse, CommandSender};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use errors::IdentityError;
use store::{ProfileStore, Profiles};

pub struct IdentityDirectory {
    profiles: Mutex<Profiles>,
    store: ProfileStore,
    rcon: Arc<dyn CommandSender>,
    lookup: Arc<dyn PlayerLookup>,
}

fn linked<'a>(profiles: &'a Profiles, account_id: &str) -> Result<&'a PlayerProfile, IdentityError> {
    profiles
        .get(account_id)
        .ok_or_else(|| IdentityError::NotLinked(account_id.to_string()))
}

impl IdentityDirectory {
    pub async fn open(
        path: PathBuf,
        rcon: Arc<dyn CommandSender>,
        lookup: Arc<dyn PlayerLookup>,
    ) -> Result<Self, IdentityError> {
        let store = ProfileStore::new(path);
        let profiles = store.load().await?;
        info!(path = %store.path().display(), linked = profiles.len(), "player data loaded");
        Ok(Self {
            profiles: Mutex::new(profiles),
            store,
            rcon,
            lookup,
        })
    }

    /// Resolves `username` and links it to `account_id` with no tiers. Relinking an account
    /// replaces its previous link.
    pub async fn link(&self, account_id: &str, username: &str) -> Result<PlayerProfile, IdentityError> {
        let player = self.lookup.lookup(username).await?;

        let mut profiles = self.profiles.lock().await;
        let taken = profiles.iter().find(|(id, profile)| {
            id.as_str() != account_id && profile.mc_username.eq_ignore_ascii_case(&player.username)
        });
        if let Some((owner, _)) = taken {
            return Err(IdentityError::UsernameTaken {
                username: player.username,
                account_id: owner.clone(),
            });
        }
        // A new link starts with no tiers, so whatever the old name holds is withdrawn first.
        if let Some(previous) = profiles.get(account_id).cloned() {
            for step in Tier::DESCENDING {
                if previous.has(step) {
                    self.revoke(&mut profiles, account_id, step).await?;
                }
            }
        }

        let profile = PlayerProfile::new(player.id, player.username);
        let stored = profile.clone();
        self.persist(&mut profiles, |next| {
            next.insert(account_id.to_string(), stored);
        })
        .await?;
        info!(account_id, player = %profile.mc_username, "account linked");
        Ok(profile)
    }

    pub async fn get(&self, account_id: &str) -> Result<PlayerProfile, IdentityError> {
        let profiles = self.profiles.lock().await;
        linked(&profiles, account_id).cloned()
    }

    pub async fn get_all(&self) -> Vec<ProfileEntry> {
        let profiles = self.profiles.lock().await;
        profiles
            .iter()
            .map(|(account_id, profile)| ProfileEntry {
                account_id: account_id.clone(),
                profile: profile.clone(),
            })
            .collect()
    }

    /// Case-insensitive, like the server's own name handling.
    pub async fn find_by_username(&self, username: &str) -> Option<ProfileEntry> {
        let profiles = self.profiles.lock().await;
        profiles
            .iter()
            .find(|(_, profile)| profile.mc_username.eq_ignore_ascii_case(username))
            .map(|(account_id, profile)| ProfileEntry {
                account_id: account_id.clone(),
                profile: profile.clone(),
            })
    }

    /// Grants `tier` and every missing tier below it, lowest first.
    pub async fn promote(&self, account_id: &str, tier: Tier) -> Result<PlayerProfile, IdentityError> {
        let mut profiles = self.profiles.lock().await;
        let current = linked(&profiles, account_id)?.clone();
        for step in Tier::ASCENDING {
            if step <= tier && !current.has(step) {
                self.grant(&mut profiles, account_id, step).await?;
            }
        }
        linked(&profiles, account_id).cloned()
    }

    /// Withdraws `tier` and every held tier above it, highest first.
    pub async fn demote(&self, account_id: &str, tier: Tier) -> Result<PlayerProfile, IdentityError> {
        let mut profiles = self.profiles.lock().await;
        let current = linked(&profiles, account_id)?.clone();
        for step in Tier::DESCENDING {
            if step >= tier && current.has(step) {
                self.revoke(&mut profiles, account_id, step).await?;
            }
        }
        linked(&profiles, account_id).cloned()
    }

    /// Withdraws every tier, then forgets the link.
    pub async fn remove(&self, account_id: &str) -> Result<PlayerProfile, IdentityError> {
        let mut profiles = self.profiles.lock().await;
        self.remove_locked(&mut profiles, account_id).await
    }

    /// Reconciles the directory against the chat server's current members.
    ///
    /// Accounts that left are removed with full revocation. For the rest, only the highest
    /// held tier is checked against the server's team rosters and re-applied when the player
    /// is missing from it.
    pub async fn sync(&self, member_ids: &[AccountId]) -> Result<SyncReport, IdentityError> {
        let members: HashSet<&str> = member_ids.iter().map(String::as_str).collect();
        let mut profiles = self.profiles.lock().await;
        let rosters = self.team_rosters().await?;

        let mut report = SyncReport::default();
        let accounts: Vec<AccountId> = profiles.keys().cloned().collect();
        for account_id in accounts {
            if !members.contains(account_id.as_str()) {
                match self.remove_locked(&mut profiles, &account_id).await {
                    Ok(_) => report.removed.push(account_id),
                    Err(err) => report.failed.push(SyncFailure {
                        account_id,
                        error: err.into(),
                    }),
                }
                continue;
            }

            let Some(profile) = profiles.get(&account_id) else {
                continue;
            };
            let Some(tier) = profile.highest_tier() else {
                report.unchanged += 1;
                continue;
            };
            let player = profile.mc_username.clone();
            let present = rosters
                .get(&tier)
                .is_some_and(|names| names.contains(&player.to_lowercase()));
            if present {
                report.unchanged += 1;
                continue;
            }

            match self.apply(&commands::grant(tier, &player)).await {
                Ok(()) => {
                    info!(%account_id, %player, tier = tier.name(), "tier re-applied");
                    report.reapplied.push((account_id, tier));
                }
                Err(err) => report.failed.push(SyncFailure {
                    account_id,
                    error: err.into(),
                }),
            }
        }

        info!(
            removed = report.removed.len(),
            reapplied = report.reapplied.len(),
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "member sync finished"
        );
        Ok(report)
    }

    async fn remove_locked(
        &self,
        profiles: &mut Profiles,
        account_id: &str,
    ) -> Result<PlayerProfile, IdentityError> {
        let current = linked(profiles, account_id)?.clone();
        for step in Tier::DESCENDING {
            if current.has(step) {
                self.revoke(profiles, account_id, step).await?;
            }
        }
        let removed = linked(profiles, account_id)?.clone();
        self.persist(profiles, |next| {
            next.remove(account_id);
        })
        .await?;
        info!(account_id, player = %removed.mc_username, "account unlinked");
        Ok(removed)
    }

    async fn grant(
        &self,
        profiles: &mut Profiles,
        account_id: &str,
        tier: Tier,
    ) -> Result<(), IdentityError> {
        let player = linked(profiles, account_id)?.mc_username.clone();
        self.apply(&commands::grant(tier, &player)).await?;
        self.persist(profiles, |next| {
            if let Some(profile) = next.get_mut(account_id) {
                profile.set(tier, true);
            }
        })
        .await?;
        info!(account_id, %player, tier = tier.name(), "tier granted");
        Ok(())
    }

    async fn revoke(
        &self,
        profiles: &mut Profiles,
        account_id: &str,
        tier: Tier,
    ) -> Result<(), IdentityError> {
        let mut remaining = linked(profiles, account_id)?.clone();
        remaining.set(tier, false);
        let player = remaining.mc_username.clone();
        self.apply(&commands::revoke(tier, &player, remaining.highest_tier()))
            .await?;
        self.persist(profiles, |next| {
            if let Some(profile) = next.get_mut(account_id) {
                profile.set(tier, false);
            }
        })
        .await?;
        info!(account_id, %player, tier = tier.name(), "tier revoked");
        Ok(())
    }

    async fn apply(&self, commands: &[String]) -> Result<(), IdentityError> {
        for command in commands {
            let reply = self.rcon.send(command).await?;
            if commands::is_rejection(&reply) {
                return Err(IdentityError::Rejected {
                    command: command.clone(),
                    reply: reply.trim().to_string(),
                });
            }
            debug!(%command, reply = reply.trim(), "console");
        }
        Ok(())
    }

    /// Lowercased member names of every tier team.
    async fn team_rosters(&self) -> Result<HashMap<Tier, HashSet<String>>, IdentityError> {
        let mut rosters = HashMap::new();
        for tier in Tier::ASCENDING {
            let reply = self.rcon.send(&format!("team list {}", tier.name())).await?;
            let names = parse::team_members(tier.name(), &reply)?;
            rosters.insert(tier, names.into_iter().map(|name| name.to_lowercase()).collect());
        }
        Ok(rosters)
    }

    /// Writes the changed map before adopting it, so memory never runs ahead of disk.
    async fn persist<F>(&self, profiles: &mut Profiles, change: F) -> Result<(), IdentityError>
    where
        F: FnOnce(&mut Profiles),
    {
        let mut next = profiles.clone();
        change(&mut next);
        self.store.save(&next).await?;
        *profiles = next;
        Ok(())
    }
}
