use uuid::Uuid;

use super::Tracker;
use crate::{
  dota::{Match, Player},
  entity::{game, participant},
  prelude::*,
  steam::{Account, SteamId},
  sv,
};

/// One match with the tracked account's team.
#[derive(Debug, Clone)]
pub struct Ingested {
  pub game: game::Model,
  pub players: Vec<participant::Model>,
}

/// Builds the records of a match from the tracked account's side.
///
/// `None` when the tracked account did not play in it.
pub fn summarize(
  tracked: SteamId,
  data: &Match,
  fetched_at: DateTime,
) -> Option<Ingested> {
  let me = data.players.iter().find(|p| p.account_id == tracked.account_id())?;
  let team = me.team();
  let win = team.won(data.outcome);
  let started_at = chrono::DateTime::from_timestamp(data.start_time, 0)
    .map(|at| at.naive_utc())
    .unwrap_or(fetched_at);

  let game = game::Model {
    id: Uuid::new_v4(),
    match_id: data.match_id.to_string(),
    win,
    started_at,
    fetched_at,
  };
  let players = data
    .players
    .iter()
    .filter(|p| p.team() == team)
    .map(|p| record(&game, p, win))
    .collect();

  Some(Ingested { game, players })
}

fn record(game: &game::Model, player: &Player, win: bool) -> participant::Model {
  let (damage_taken, damage_reduced) = player.damage_taken();
  participant::Model {
    id: Uuid::new_v4(),
    game_id: game.id,
    match_id: game.match_id.clone(),
    steam_id: SteamId::from_account_id(player.account_id).to_string(),
    user_id: None,
    wins: win as i64,
    losses: !win as i64,
    kills: player.kills,
    deaths: player.deaths,
    assists: player.assists,
    gpm: player.gold_per_min,
    xpm: player.xp_per_min,
    last_hits: player.last_hits,
    denies: player.denies,
    net_worth: player.net_worth,
    healing: player.hero_healing,
    damage: player.hero_damage,
    damage_taken,
    damage_reduced,
    level: player.level,
    bounty_runes: player.bounty_runes,
    bkbs: player.bkbs(),
    tower_damage: player.tower_damage,
    created_at: game.started_at,
    fetched_at: game.fetched_at,
  }
}

impl Tracker {
  /// Id of the games account once its friend list has loaded.
  pub async fn games_account(&self) -> Option<SteamId> {
    let ready = self.games.ready();
    if !ready.wait_timeout(self.timings.ready_timeout).await {
      return None;
    }
    self.games.steam_id()
  }

  /// Fetches and stores the candidate matches not stored yet.
  ///
  /// Waits for the games account to load first and does nothing if it
  /// does not in time. Repeated or malformed ids are dropped, failed
  /// fetches are skipped. Linked members among the players are resynced
  /// on the games account afterwards.
  pub async fn ingest(&self, candidates: &[String]) -> Result<Vec<Ingested>> {
    let Some(tracked) = self.games_account().await else {
      warn!("Games account is not ready, skipping match ingestion");
      return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let ids: Vec<String> = candidates
      .iter()
      .map(|id| id.trim().to_string())
      .filter(|id| id.parse::<u64>().is_ok())
      .filter(|id| seen.insert(id.clone()))
      .collect();

    let known = sv::Game::new(&self.db).known(&ids).await?;
    let fresh: Vec<u64> = ids
      .iter()
      .filter(|id| !known.contains(*id))
      .filter_map(|id| id.parse().ok())
      .collect();
    if fresh.is_empty() {
      debug!("No new matches");
      return Ok(Vec::new());
    }

    let mut ingested = Vec::with_capacity(fresh.len());
    for (i, &match_id) in fresh.iter().enumerate() {
      if i > 0 {
        time::sleep(self.timings.fetch_pacing).await;
      }
      let data = match self.matches.fetch(match_id).await {
        Ok(data) => data,
        Err(err) => {
          error!("Failed to get details of match {match_id}: {err:#}");
          continue;
        }
      };
      match summarize(tracked, &data, Utc::now().naive_utc()) {
        Some(summary) => ingested.push(summary),
        None => warn!("Match {match_id} does not include the games account"),
      }
    }
    if ingested.is_empty() {
      return Ok(ingested);
    }

    let steam_ids: Vec<String> = ingested
      .iter()
      .flat_map(|m| m.players.iter().map(|p| p.steam_id.clone()))
      .collect::<HashSet<_>>()
      .into_iter()
      .collect();
    let users: HashMap<String, _> = sv::User::new(&self.db)
      .by_steam_ids(&steam_ids)
      .await?
      .into_iter()
      .filter_map(|u| Some((u.steam_id.clone()?, u)))
      .collect();

    for summary in &mut ingested {
      for player in &mut summary.players {
        player.user_id = users.get(&player.steam_id).map(|u| u.id);
      }
    }

    let games = ingested.iter().map(|m| m.game.clone()).collect();
    let players =
      ingested.iter().flat_map(|m| m.players.iter().cloned()).collect();
    if let Err(err) = sv::Game::new(&self.db).insert(games, players).await {
      error!("Failed to store {} matches: {err}", ingested.len());
      return Err(err);
    }
    info!("Processed {} matches", ingested.len());

    for user in users.values() {
      if let Err(err) = self.adjust(user, &[Account::Games], false).await {
        error!("Failed to adjust {}: {err}", user.discord_id);
      }
    }
    Ok(ingested)
  }
}
