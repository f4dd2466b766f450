use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::bail;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{DamageReceived, Match, MatchSource, Outcome, Player};
use crate::prelude::*;

const MATCH_DETAILS: &str =
  "https://api.steampowered.com/IDOTA2Match_570/GetMatchDetails/v1/";

/// Match details from the Steam Web API.
pub struct WebApi {
  http: reqwest::Client,
  key: String,
  authorized: AtomicBool,
}

#[derive(Deserialize)]
struct Envelope {
  result: Details,
}

#[derive(Deserialize)]
struct Details {
  error: Option<String>,
  #[serde(default)]
  match_id: u64,
  #[serde(default)]
  start_time: i64,
  radiant_win: Option<bool>,
  #[serde(default)]
  players: Vec<RawPlayer>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawPlayer {
  account_id: u32,
  player_slot: u32,
  kills: i64,
  deaths: i64,
  assists: i64,
  gold_per_min: i64,
  xp_per_min: i64,
  last_hits: i64,
  denies: i64,
  level: i64,
  net_worth: i64,
  hero_damage: i64,
  hero_healing: i64,
  tower_damage: i64,
  bounty_rune_pickups: i64,
  item_0: u32,
  item_1: u32,
  item_2: u32,
  item_3: u32,
  item_4: u32,
  item_5: u32,
  backpack_0: u32,
  backpack_1: u32,
  backpack_2: u32,
  item_neutral: u32,
  hero_damage_received: Vec<RawDamage>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawDamage {
  pre_reduction: i64,
  post_reduction: i64,
}

impl From<RawPlayer> for Player {
  fn from(raw: RawPlayer) -> Self {
    Player {
      account_id: raw.account_id,
      player_slot: raw.player_slot,
      kills: raw.kills,
      deaths: raw.deaths,
      assists: raw.assists,
      gold_per_min: raw.gold_per_min,
      xp_per_min: raw.xp_per_min,
      last_hits: raw.last_hits,
      denies: raw.denies,
      level: raw.level,
      net_worth: raw.net_worth,
      hero_damage: raw.hero_damage,
      hero_healing: raw.hero_healing,
      tower_damage: raw.tower_damage,
      bounty_runes: raw.bounty_rune_pickups,
      items: vec![
        raw.item_0,
        raw.item_1,
        raw.item_2,
        raw.item_3,
        raw.item_4,
        raw.item_5,
        raw.backpack_0,
        raw.backpack_1,
        raw.backpack_2,
        raw.item_neutral,
      ],
      damage_received: raw
        .hero_damage_received
        .into_iter()
        .map(|d| DamageReceived {
          pre_reduction: d.pre_reduction,
          post_reduction: d.post_reduction,
        })
        .collect(),
    }
  }
}

impl WebApi {
  pub fn new(http: reqwest::Client, key: String) -> Self {
    Self { http, key, authorized: AtomicBool::new(true) }
  }
}

#[async_trait]
impl MatchSource for WebApi {
  /// False after the key got rejected.
  fn ready(&self) -> bool {
    !self.key.is_empty() && self.authorized.load(Ordering::Acquire)
  }

  async fn fetch(&self, match_id: u64) -> anyhow::Result<Match> {
    let id = match_id.to_string();
    let response = self
      .http
      .get(MATCH_DETAILS)
      .query(&[("key", self.key.as_str()), ("match_id", id.as_str())])
      .send()
      .await?;

    match response.status() {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
        self.authorized.store(false, Ordering::Release);
        bail!("steam web api rejected the key");
      }
      _ => self.authorized.store(true, Ordering::Release),
    }

    let details = response.error_for_status()?.json::<Envelope>().await?.result;
    if let Some(error) = details.error {
      bail!("match {match_id}: {error}");
    }

    Ok(Match {
      match_id: if details.match_id == 0 { match_id } else { details.match_id },
      start_time: details.start_time,
      outcome: match details.radiant_win {
        Some(true) => Outcome::RadiantVictory,
        Some(false) => Outcome::DireVictory,
        None => Outcome::Unknown,
      },
      players: details.players.into_iter().map(Player::from).collect(),
    })
  }
}
