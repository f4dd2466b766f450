use sea_orm_migration::prelude::*;

use super::{
  m20261017_000001_create_users::Users,
  m20261017_000002_create_matches::Matches,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    let counter = |col: MatchParticipants| {
      ColumnDef::new(col).big_integer().not_null().default(0).to_owned()
    };

    manager
      .create_table(
        Table::create()
          .table(MatchParticipants::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(MatchParticipants::Id)
              .uuid()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(MatchParticipants::GameId).uuid().not_null())
          .col(ColumnDef::new(MatchParticipants::MatchId).string().not_null())
          .col(ColumnDef::new(MatchParticipants::SteamId).string().not_null())
          .col(ColumnDef::new(MatchParticipants::UserId).big_integer().null())
          .col(counter(MatchParticipants::Wins))
          .col(counter(MatchParticipants::Losses))
          .col(counter(MatchParticipants::Kills))
          .col(counter(MatchParticipants::Deaths))
          .col(counter(MatchParticipants::Assists))
          .col(counter(MatchParticipants::Gpm))
          .col(counter(MatchParticipants::Xpm))
          .col(counter(MatchParticipants::LastHits))
          .col(counter(MatchParticipants::Denies))
          .col(counter(MatchParticipants::NetWorth))
          .col(counter(MatchParticipants::Healing))
          .col(counter(MatchParticipants::Damage))
          .col(counter(MatchParticipants::DamageTaken))
          .col(counter(MatchParticipants::DamageReduced))
          .col(counter(MatchParticipants::Level))
          .col(counter(MatchParticipants::BountyRunes))
          .col(counter(MatchParticipants::Bkbs))
          .col(counter(MatchParticipants::TowerDamage))
          .col(
            ColumnDef::new(MatchParticipants::CreatedAt).date_time().not_null(),
          )
          .col(
            ColumnDef::new(MatchParticipants::FetchedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_match_participants_match")
              .from(MatchParticipants::Table, MatchParticipants::GameId)
              .to(Matches::Table, Matches::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_match_participants_user")
              .from(MatchParticipants::Table, MatchParticipants::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_match_participants_user_created")
          .table(MatchParticipants::Table)
          .col(MatchParticipants::UserId)
          .col(MatchParticipants::CreatedAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_match_participants_steam")
          .table(MatchParticipants::Table)
          .col(MatchParticipants::SteamId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(MatchParticipants::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum MatchParticipants {
  Table,
  Id,
  GameId,
  MatchId,
  SteamId,
  UserId,
  Wins,
  Losses,
  Kills,
  Deaths,
  Assists,
  Gpm,
  Xpm,
  LastHits,
  Denies,
  NetWorth,
  Healing,
  Damage,
  DamageTaken,
  DamageReduced,
  Level,
  BountyRunes,
  Bkbs,
  TowerDamage,
  CreatedAt,
  FetchedAt,
}
