pub use sea_orm_migration::prelude::*;

mod m20261017_000001_create_users;
mod m20261017_000002_create_matches;
mod m20261017_000003_create_match_participants;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20261017_000001_create_users::Migration),
      Box::new(m20261017_000002_create_matches::Migration),
      Box::new(m20261017_000003_create_match_participants::Migration),
    ]
  }
}
