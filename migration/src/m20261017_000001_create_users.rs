use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Users::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Users::DiscordId).string().not_null().unique_key())
          .col(ColumnDef::new(Users::DiscordName).string().not_null())
          .col(ColumnDef::new(Users::SteamId).string().null())
          .col(ColumnDef::new(Users::SteamName).string().null())
          .col(ColumnDef::new(Users::TwitchId).string().null())
          .col(ColumnDef::new(Users::TwitchName).string().null())
          .col(
            ColumnDef::new(Users::Points).big_integer().not_null().default(0),
          )
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    // sqlite treats NULLs as distinct, so unlinked rows never collide
    manager
      .create_index(
        Index::create()
          .name("idx_users_steam")
          .table(Users::Table)
          .col(Users::SteamId)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_users_twitch")
          .table(Users::Table)
          .col(Users::TwitchId)
          .unique()
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  Id,
  DiscordId,
  DiscordName,
  SteamId,
  SteamName,
  TwitchId,
  TwitchName,
  Points,
  CreatedAt,
}
