use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Matches::Table)
          .if_not_exists()
          .col(ColumnDef::new(Matches::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Matches::MatchId).string().not_null().unique_key())
          .col(ColumnDef::new(Matches::Win).boolean().not_null())
          .col(ColumnDef::new(Matches::StartedAt).date_time().not_null())
          .col(ColumnDef::new(Matches::FetchedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Matches::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Matches {
  Table,
  Id,
  MatchId,
  Win,
  StartedAt,
  FetchedAt,
}
