use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::participant;

/// One ingested match, seen from the tracked account's side.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "matches")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// External match id
  #[sea_orm(unique)]
  pub match_id: String,
  pub win: bool,
  pub started_at: DateTime,
  pub fetched_at: DateTime,
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
