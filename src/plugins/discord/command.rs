use crate::{
  prelude::*,
  tracker::{Ingested, Tracker},
};

pub const PREFIX: &str = "!";
pub const GROUP: &str = "dotagames-manage";

const USAGE: &str = "\
Usage:
!dotagames-manage query <matchID...>
!dotagames-manage force-nickname <user>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Ingest these match ids now
  Query(Vec<String>),
  /// Mention, id or part of a name, lowercased
  ForceNickname(String),
  Usage,
}

impl Command {
  /// `None` when the message is not addressed to the tracker.
  pub fn parse(content: &str) -> Option<Self> {
    let rest = content.trim().strip_prefix(PREFIX)?;
    let mut words = rest.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case(GROUP) {
      return None;
    }

    let cmd = match words.next() {
      Some(sub) if sub.eq_ignore_ascii_case("query") => {
        let ids = words.filter(|w| w.parse::<u64>().is_ok());
        Command::Query(ids.map(String::from).collect())
      }
      Some(sub) if sub.eq_ignore_ascii_case("force-nickname") => {
        let search = words.collect::<Vec<_>>().join(" ");
        Command::ForceNickname(search.to_lowercase())
      }
      _ => Command::Usage,
    };
    Some(cmd)
  }
}

/// What the member search looks at.
#[derive(Debug, Clone)]
pub struct MemberName {
  pub id: u64,
  pub username: String,
  pub nick: Option<String>,
}

/// Resolves a search to a member id: an exact id wins, otherwise the
/// shortest nickname or username containing the search.
pub fn find_member(members: &[MemberName], search: &str) -> Option<u64> {
  let search = search.trim().to_lowercase();
  if search.is_empty() {
    return None;
  }
  if let Ok(id) = search.parse::<u64>()
    && members.iter().any(|m| m.id == id)
  {
    return Some(id);
  }

  members
    .iter()
    .flat_map(|m| {
      let nick = m.nick.as_deref().map(str::to_lowercase);
      let names = [nick, Some(m.username.to_lowercase())];
      names.into_iter().flatten().map(|name| (m.id, name))
    })
    .filter(|(_, name)| name.contains(&search))
    .min_by_key(|(_, name)| name.len())
    .map(|(id, _)| id)
}

pub fn queried(ingested: &[Ingested]) -> String {
  let mut text = String::from("Queried Matches:\n");
  for m in ingested {
    text.push_str(&m.game.match_id);
    text.push('\n');
  }
  text
}

pub fn usage() -> &'static str {
  USAGE
}

/// Runs the force-nickname flow for a resolved member.
pub async fn force_nickname(tracker: &Tracker, discord_id: &str) -> String {
  match tracker.force_nickname(discord_id).await {
    Ok(()) => "User's nickname has been adjusted".into(),
    Err(Error::UserNotFound) => "Couldn't find that user".into(),
    Err(err) => {
      error!("Failed to force nickname of {discord_id}: {err}");
      "Failed to adjust user's nickname".into()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn member(id: u64, username: &str, nick: Option<&str>) -> MemberName {
    MemberName { id, username: username.into(), nick: nick.map(String::from) }
  }

  #[test]
  fn parses_query() {
    assert_eq!(
      Command::parse("!dotagames-manage query 123 abc 456"),
      Some(Command::Query(vec!["123".into(), "456".into()]))
    );
    assert_eq!(
      Command::parse("!DotaGames-Manage QUERY"),
      Some(Command::Query(vec![]))
    );
  }

  #[test]
  fn parses_force_nickname() {
    assert_eq!(
      Command::parse("!dotagames-manage force-nickname Some User"),
      Some(Command::ForceNickname("some user".into()))
    );
  }

  #[test]
  fn ignores_foreign_messages() {
    assert_eq!(Command::parse("hello"), None);
    assert_eq!(Command::parse("!other query 1"), None);
    assert_eq!(Command::parse("!"), None);
    assert_eq!(Command::parse("!dotagames-manage"), Some(Command::Usage));
    assert_eq!(Command::parse("!dotagames-manage nope"), Some(Command::Usage));
  }

  #[test]
  fn member_search() {
    let members = [
      member(1, "alexander", None),
      member(2, "alex", Some("Lexi")),
      member(3, "bob", Some("Alexandra")),
    ];
    assert_eq!(find_member(&members, "3"), Some(3));
    assert_eq!(find_member(&members, "ALEX"), Some(2));
    assert_eq!(find_member(&members, "lex"), Some(2));
    assert_eq!(find_member(&members, "andra"), Some(3));
    assert_eq!(find_member(&members, "nobody"), None);
    assert_eq!(find_member(&members, ""), None);
  }
}
