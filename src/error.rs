#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Discord error: {0}")]
  Discord(#[from] serenity::Error),

  #[error("User not found")]
  UserNotFound,

  #[error("Steam session failure: {0}")]
  Session(String),

  #[error("Invalid arguments: {0}")]
  InvalidArgs(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
