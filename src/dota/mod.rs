//! Dota 2 match data.

mod opendota;
mod webapi;

pub use opendota::OpenDota;
pub use webapi::WebApi;

use crate::prelude::*;

pub const BKB_ITEM: u32 = 116;

const DIRE_BIT: u32 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
  RadiantVictory,
  DireVictory,
  #[default]
  Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
  Radiant,
  Dire,
}

impl Team {
  pub fn of_slot(slot: u32) -> Self {
    if slot & DIRE_BIT != 0 { Team::Dire } else { Team::Radiant }
  }

  pub fn won(self, outcome: Outcome) -> bool {
    matches!(
      (self, outcome),
      (Team::Radiant, Outcome::RadiantVictory)
        | (Team::Dire, Outcome::DireVictory)
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct Match {
  pub match_id: u64,
  /// Unix seconds
  pub start_time: i64,
  pub outcome: Outcome,
  pub players: Vec<Player>,
}

#[derive(Debug, Clone, Default)]
pub struct Player {
  pub account_id: u32,
  pub player_slot: u32,
  pub kills: i64,
  pub deaths: i64,
  pub assists: i64,
  pub gold_per_min: i64,
  pub xp_per_min: i64,
  pub last_hits: i64,
  pub denies: i64,
  pub level: i64,
  pub net_worth: i64,
  pub hero_damage: i64,
  pub hero_healing: i64,
  pub tower_damage: i64,
  pub bounty_runes: i64,
  /// Inventory, backpack and neutral slots
  pub items: Vec<u32>,
  pub damage_received: Vec<DamageReceived>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DamageReceived {
  pub pre_reduction: i64,
  pub post_reduction: i64,
}

impl Player {
  pub fn team(&self) -> Team {
    Team::of_slot(self.player_slot)
  }

  /// 1 when a BKB sits in any slot.
  pub fn bkbs(&self) -> i64 {
    self.items.contains(&BKB_ITEM) as i64
  }

  /// Damage taken after reductions and the amount reduced.
  pub fn damage_taken(&self) -> (i64, i64) {
    self.damage_received.iter().fold((0, 0), |(taken, reduced), d| {
      (taken + d.post_reduction, reduced + d.pre_reduction - d.post_reduction)
    })
  }
}

/// Where full match details come from.
#[async_trait]
pub trait MatchSource: Send + Sync {
  fn ready(&self) -> bool;

  async fn fetch(&self, match_id: u64) -> anyhow::Result<Match>;
}

/// Polls `ready` once a second until it holds, the timeout runs out or
/// shutdown is requested.
pub async fn wait_ready(
  source: &dyn MatchSource,
  timeout: Duration,
  shutdown: &CancellationToken,
) -> bool {
  let poll = async {
    let mut tick = time::interval(Duration::from_secs(1));
    loop {
      tick.tick().await;
      if source.ready() {
        return;
      }
    }
  };

  tokio::select! {
    _ = shutdown.cancelled() => false,
    res = time::timeout(timeout, poll) => res.is_ok(),
  }
}
