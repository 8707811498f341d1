//! Console commands that apply or withdraw a tier for one player.

use keeper_core::proto::Tier;

fn color(tier: Tier) -> &'static str {
    match tier {
        Tier::Whitelisted => "green",
        Tier::Trusted => "aqua",
        Tier::Staff => "gold",
        Tier::Owner => "dark_red",
    }
}

/// Creating a team that already exists is harmless, so every join ensures its team first.
fn join_team(tier: Tier, player: &str) -> [String; 3] {
    let team = tier.name();
    [
        format!("team add {team}"),
        format!("team modify {team} color {}", color(tier)),
        format!("team join {team} {player}"),
    ]
}

pub fn grant(tier: Tier, player: &str) -> Vec<String> {
    let mut commands = join_team(tier, player).to_vec();
    match tier {
        Tier::Whitelisted => commands.push(format!("whitelist add {player}")),
        Tier::Staff => commands.push(format!("op {player}")),
        Tier::Trusted | Tier::Owner => {}
    }
    commands
}

/// Withdraws `tier`. The player moves to the team of `fallback`, the highest tier they keep,
/// or leaves teams entirely.
pub fn revoke(tier: Tier, player: &str, fallback: Option<Tier>) -> Vec<String> {
    let mut commands = match fallback {
        Some(lower) => join_team(lower, player).to_vec(),
        None => vec![format!("team leave {player}")],
    };
    match tier {
        Tier::Whitelisted => commands.push(format!("whitelist remove {player}")),
        Tier::Staff => commands.push(format!("deop {player}")),
        Tier::Trusted | Tier::Owner => {}
    }
    commands
}

/// Replies the server sends instead of running a command.
pub fn is_rejection(reply: &str) -> bool {
    let reply = reply.trim_start();
    reply.starts_with("Unknown or incomplete command")
        || reply.starts_with("Incorrect argument for command")
        || reply.contains("<--[HERE]")
}
