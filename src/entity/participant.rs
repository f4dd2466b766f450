use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{game, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "match_participants")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub game_id: Uuid,
  pub match_id: String,
  pub steam_id: String,
  /// Filled at ingestion or backfilled when the Steam account gets linked
  pub user_id: Option<i64>,
  pub wins: i64,
  pub losses: i64,
  pub kills: i64,
  pub deaths: i64,
  pub assists: i64,
  pub gpm: i64,
  pub xpm: i64,
  pub last_hits: i64,
  pub denies: i64,
  pub net_worth: i64,
  pub healing: i64,
  pub damage: i64,
  pub damage_taken: i64,
  pub damage_reduced: i64,
  pub level: i64,
  pub bounty_runes: i64,
  pub bkbs: i64,
  pub tower_damage: i64,
  /// Match start time, the monthly nickname count is keyed on it
  pub created_at: DateTime,
  pub fetched_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "game::Entity",
    from = "Column::GameId",
    to = "game::Column::Id"
  )]
  Game,
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<game::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Game.def()
  }
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
