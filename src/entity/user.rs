use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::participant;

/// Local record joining a Discord identity to its Steam and Twitch accounts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  #[sea_orm(unique)]
  pub discord_id: String,
  pub discord_name: String,
  /// SteamID64 as a decimal string
  #[sea_orm(unique)]
  pub steam_id: Option<String>,
  pub steam_name: Option<String>,
  #[sea_orm(unique)]
  pub twitch_id: Option<String>,
  pub twitch_name: Option<String>,
  pub points: i64,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "participant::Entity")]
  Participants,
}

impl Related<participant::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Participants.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
