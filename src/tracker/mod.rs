//! Keeps the tracked accounts' friend lists in line with guild roles.

mod ingest;
mod link;
pub mod nickname;
mod sync;
pub mod tier;

use tokio::sync::mpsc;

pub use self::{
  ingest::{Ingested, summarize},
  link::pairing_message,
  nickname::Nickname,
  tier::{Tier, TierRoles},
};
use crate::{
  dota::MatchSource,
  entity::user,
  prelude::*,
  steam::{Account, Change, FriendClient},
  sv,
};

/// Chat platform side of the tracker.
#[async_trait]
pub trait Guild: Send + Sync {
  async fn member_roles(&self, discord_id: &str) -> Result<Vec<u64>>;

  async fn direct_message(&self, discord_id: &str, content: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct Timings {
  /// Delay between match detail requests
  pub fetch_pacing: Duration,
  /// How long an adjustment waits for a friend list to load
  pub ready_timeout: Duration,
}

impl Default for Timings {
  fn default() -> Self {
    Self {
      fetch_pacing: Duration::from_millis(300),
      ready_timeout: Duration::from_secs(60),
    }
  }
}

pub struct Tracker {
  db: DatabaseConnection,
  guild: Arc<dyn Guild>,
  roles: TierRoles,
  main: Arc<FriendClient>,
  games: Arc<FriendClient>,
  matches: Arc<dyn MatchSource>,
  timings: Timings,
}

impl Tracker {
  pub fn new(
    db: DatabaseConnection,
    guild: Arc<dyn Guild>,
    roles: TierRoles,
    main: Arc<FriendClient>,
    games: Arc<FriendClient>,
    matches: Arc<dyn MatchSource>,
  ) -> Self {
    Self {
      db,
      guild,
      roles,
      main,
      games,
      matches,
      timings: Timings::default(),
    }
  }

  pub fn with_timings(mut self, timings: Timings) -> Self {
    self.timings = timings;
    self
  }

  pub fn client(&self, account: Account) -> &Arc<FriendClient> {
    match account {
      Account::Main => &self.main,
      Account::Games => &self.games,
    }
  }

  pub fn matches(&self) -> &dyn MatchSource {
    self.matches.as_ref()
  }

  /// Resolves the member's tier once and resyncs them on each account.
  pub async fn adjust(
    &self,
    user: &user::Model,
    accounts: &[Account],
    force: bool,
  ) -> Result<()> {
    let roles = self.guild.member_roles(&user.discord_id).await?;
    let tier = self.roles.resolve(&roles);

    for &account in accounts {
      let client = self.client(account);
      if !client.ready().wait_timeout(self.timings.ready_timeout).await {
        warn!("{account}: friend list not loaded, skipping {}", user.discord_id);
        continue;
      }
      sync::resync(&self.db, client, user, tier, force).await?;
    }
    Ok(())
  }

  /// Reacts to a relationship transition of a linked account.
  pub async fn relationship_changed(&self, change: Change) -> Result<()> {
    let steam_id = change.steam_id.to_string();
    let Some(user) = sv::User::new(&self.db).by_steam(&steam_id).await? else {
      debug!("{}: {steam_id} is not linked", change.account);
      return Ok(());
    };
    self.adjust(&user, &[change.account], false).await
  }

  /// Handles relationship changes of one account until shutdown.
  pub async fn follow(
    self: Arc<Self>,
    mut changes: mpsc::UnboundedReceiver<Change>,
    shutdown: CancellationToken,
  ) {
    loop {
      let change = tokio::select! {
        _ = shutdown.cancelled() => break,
        change = changes.recv() => match change {
          Some(change) => change,
          None => break,
        },
      };
      if let Err(err) = self.relationship_changed(change).await {
        error!(
          "{}: failed to adjust {}: {err}",
          change.account, change.steam_id
        );
      }
    }
  }

  /// Resyncs every linked user on both accounts.
  pub async fn sweep(&self) -> Result<()> {
    let users = sv::User::new(&self.db).linked().await?;
    info!("Sweeping {} linked users", users.len());

    for user in &users {
      if let Err(err) = self.adjust(user, &Account::ALL, false).await {
        error!("Failed to adjust {}: {err}", user.discord_id);
      }
    }
    Ok(())
  }

  /// Resyncs a member, overwriting hand-set nicknames.
  pub async fn force_nickname(&self, discord_id: &str) -> Result<()> {
    let user = sv::User::new(&self.db)
      .by_discord(discord_id)
      .await?
      .ok_or(Error::UserNotFound)?;
    self.adjust(&user, &Account::ALL, true).await
  }
}
