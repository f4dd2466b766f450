//! Steam friend-list sessions for the tracked accounts.
//!
//! A [`Transport`] speaks to the network and reports what it observes as
//! [`SessionEvent`]s. The [`Session`] driver owns the transport lifecycle
//! (log on, reconnect, shutdown) and feeds events into a [`FriendClient`],
//! which keeps the relationship table and publishes [`Change`]s.

mod client;
mod ready;
mod session;
pub mod totp;
mod web;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use self::{
  client::{Change, FriendClient},
  ready::Readiness,
  session::{LogOnWindow, Session},
  web::WebSession,
};
use crate::prelude::*;

const INDIVIDUAL_BASE: u64 = 76561197960265728;

/// 64-bit Steam id of an individual account.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SteamId(u64);

impl SteamId {
  pub const fn new(id64: u64) -> Self {
    Self(id64)
  }

  /// Builds the id from the 32-bit account id used by game payloads.
  pub const fn from_account_id(account_id: u32) -> Self {
    Self(INDIVIDUAL_BASE + account_id as u64)
  }

  pub const fn account_id(self) -> u32 {
    (self.0 & 0xFFFF_FFFF) as u32
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for SteamId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for SteamId {
  type Err = std::num::ParseIntError;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    s.trim().parse().map(Self)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
  None,
  Blocked,
  RequestRecipient,
  Friend,
  RequestInitiator,
}

impl Relationship {
  /// Maps `EFriendRelationship`, folding the ignored states into `Blocked`.
  pub fn from_raw(raw: u32) -> Self {
    match raw {
      1 | 5 | 6 => Self::Blocked,
      2 => Self::RequestRecipient,
      3 => Self::Friend,
      4 => Self::RequestInitiator,
      _ => Self::None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Account {
  Main,
  Games,
}

impl Account {
  pub const ALL: [Account; 2] = [Account::Main, Account::Games];
}

impl fmt::Display for Account {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Account::Main => "MAIN",
      Account::Games => "GAMES",
    })
  }
}

#[derive(Clone)]
pub struct Credentials {
  pub username: String,
  pub password: String,
  /// Base64 Steam Guard shared secret
  pub totp_secret: Option<String>,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone)]
pub struct LogOn {
  pub username: String,
  pub password: String,
  pub code: Option<String>,
}

/// What a transport observed on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
  Connected,
  Disconnected,
  LoggedOn { steam_id: SteamId },
  LogOnFailed(String),
  FriendsList { friends: Vec<(SteamId, Relationship)>, incremental: bool },
  FriendState { steam_id: SteamId, relationship: Relationship },
  NicknameList(Vec<(SteamId, String)>),
  NicknameChanged { steam_id: SteamId, nickname: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Add(SteamId),
  Remove(SteamId),
  Rename(SteamId, String),
}

/// Wire session for one Steam account.
///
/// Calls return once the request is sent; their effect shows up later as
/// [`SessionEvent`]s on the channel handed to the transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
  fn is_connected(&self) -> bool;

  async fn connect(&self) -> anyhow::Result<()>;

  async fn log_on(&self, details: LogOn) -> anyhow::Result<()>;

  async fn disconnect(&self);

  /// Transports without a persona channel have nothing to announce.
  async fn announce_presence(&self) -> anyhow::Result<()> {
    Ok(())
  }

  /// `accept` answers the friend's own pending request.
  async fn add_friend(
    &self,
    steam_id: SteamId,
    accept: bool,
  ) -> anyhow::Result<()>;

  async fn remove_friend(&self, steam_id: SteamId) -> anyhow::Result<()>;

  async fn set_nickname(
    &self,
    steam_id: SteamId,
    nickname: &str,
  ) -> anyhow::Result<()>;
}
