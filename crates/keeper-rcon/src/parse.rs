//! Reply grammars for the console commands whose output is consumed programmatically.
//!
//! Every parser fails closed: text that does not match the expected grammar becomes
//! [`RconError::Parse`] instead of a best-effort guess.

use keeper_core::proto::OnlinePlayers;

use crate::RconError;

/// `list`
///
/// Accepts `There are 2 of a max of 20 players online: Alice, Bob` and the older
/// `There are 2/20 players online:Alice, Bob`.
pub fn online_players(reply: &str) -> Result<OnlinePlayers, RconError> {
    let fail = || RconError::parse("list", reply);
    let rest = reply.trim().strip_prefix("There are ").ok_or_else(fail)?;
    let (counts, names) = rest.split_once(" players online:").ok_or_else(fail)?;

    let (online, max) = match counts.split_once(" of a max of ") {
        Some(pair) => pair,
        None => counts.split_once('/').ok_or_else(fail)?,
    };
    let online = online.trim().parse::<u32>().map_err(|_| fail())?;
    let max = max.trim().parse::<u32>().map_err(|_| fail())?;

    let names = split_names(names);
    if names.len() != online as usize {
        return Err(fail());
    }

    Ok(OnlinePlayers { online, max, names })
}

/// `whitelist list`
pub fn whitelist(reply: &str) -> Result<Vec<String>, RconError> {
    let reply = reply.trim();
    if reply == "There are no whitelisted players" {
        return Ok(Vec::new());
    }

    let fail = || RconError::parse("whitelist list", reply);
    let rest = reply.strip_prefix("There are ").ok_or_else(fail)?;
    let (head, names) = rest.split_once(':').ok_or_else(fail)?;
    let (count, noun) = head.split_once(' ').ok_or_else(fail)?;
    if !noun.starts_with("whitelisted player") {
        return Err(fail());
    }
    counted(count, split_names(names)).ok_or_else(fail)
}

/// `team list`, team names without their brackets.
pub fn teams(reply: &str) -> Result<Vec<String>, RconError> {
    let reply = reply.trim();
    if reply == "There are no teams" {
        return Ok(Vec::new());
    }

    let fail = || RconError::parse("team list", reply);
    let rest = reply
        .strip_prefix("There are ")
        .or_else(|| reply.strip_prefix("There is "))
        .ok_or_else(fail)?;
    let (head, names) = rest.split_once(':').ok_or_else(fail)?;
    let (count, noun) = head.split_once(' ').ok_or_else(fail)?;
    if !noun.starts_with("team") {
        return Err(fail());
    }

    let names = split_names(names)
        .into_iter()
        .map(|name| unbracket(&name).map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(fail)?;
    counted(count, names).ok_or_else(fail)
}

/// `team list <team>`. An unknown team has no members.
pub fn team_members(team: &str, reply: &str) -> Result<Vec<String>, RconError> {
    let reply = reply.trim();
    if reply == format!("There are no members on team [{team}]")
        || reply == format!("Unknown team '{team}'")
    {
        return Ok(Vec::new());
    }

    let command = format!("team list {team}");
    let fail = || RconError::parse(&command, reply);
    let rest = reply
        .strip_prefix(&format!("Team [{team}] has "))
        .ok_or_else(fail)?;
    let (head, names) = rest.split_once(':').ok_or_else(fail)?;
    let (count, noun) = head.split_once(' ').ok_or_else(fail)?;
    if noun != "member" && noun != "members" {
        return Err(fail());
    }
    counted(count, split_names(names)).ok_or_else(fail)
}

fn counted(count: &str, names: Vec<String>) -> Option<Vec<String>> {
    let count = count.trim().parse::<usize>().ok()?;
    (count == names.len()).then_some(names)
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn unbracket(name: &str) -> Option<&str> {
    name.strip_prefix('[')?.strip_suffix(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_players_modern_and_legacy_formats() {
        let modern = online_players("There are 2 of a max of 20 players online: Alice, Bob")
            .expect("modern format");
        assert_eq!(modern.online, 2);
        assert_eq!(modern.max, 20);
        assert_eq!(modern.names, vec!["Alice", "Bob"]);

        let legacy = online_players("There are 1/10 players online:Steve").expect("legacy");
        assert_eq!(legacy.names, vec!["Steve"]);

        let empty = online_players("There are 0 of a max of 20 players online: ").expect("empty");
        assert!(empty.names.is_empty());
    }

    #[test]
    fn online_players_fails_closed() {
        assert!(online_players("Unknown or incomplete command").is_err());
        // Count and names disagree, so the reply was not what we think it is.
        assert!(online_players("There are 3 of a max of 20 players online: Alice").is_err());
    }

    #[test]
    fn whitelist_listing() {
        assert!(whitelist("There are no whitelisted players").expect("empty").is_empty());
        assert_eq!(
            whitelist("There are 2 whitelisted players: Alice, Bob").expect("names"),
            vec!["Alice", "Bob"]
        );
        assert_eq!(
            whitelist("There are 1 whitelisted player(s): Alice").expect("legacy"),
            vec!["Alice"]
        );
        assert!(whitelist("Whitelist is off").is_err());
    }

    #[test]
    fn team_listings() {
        assert!(teams("There are no teams").expect("none").is_empty());
        assert_eq!(teams("There is 1 team: [Staff]").expect("one"), vec!["Staff"]);
        assert_eq!(
            teams("There are 2 teams: [Staff], [Whitelisted]").expect("two"),
            vec!["Staff", "Whitelisted"]
        );
        assert!(teams("There are 2 teams: Staff, Whitelisted").is_err());

        assert_eq!(
            team_members("Trusted", "Team [Trusted] has 2 members: Alice, Bob").expect("members"),
            vec!["Alice", "Bob"]
        );
        assert_eq!(
            team_members("Trusted", "Team [Trusted] has 1 member: Alice").expect("single"),
            vec!["Alice"]
        );
        assert!(team_members("Trusted", "There are no members on team [Trusted]")
            .expect("empty")
            .is_empty());
        assert!(team_members("Trusted", "Unknown team 'Trusted'").expect("unknown").is_empty());
        assert!(team_members("Trusted", "Team [Staff] has 1 member: Alice").is_err());
    }
}
