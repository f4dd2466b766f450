use std::sync::{
  Mutex,
  atomic::{AtomicUsize, Ordering},
};

use sea_orm::{ConnectionTrait, Schema};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
  dota::{self, MatchSource},
  entity::{game, participant, user},
  prelude::*,
  steam::{Account, Action, FriendClient, Relationship, SessionEvent, SteamId},
  sv::{
    self,
    user::{Connection, Pairing},
  },
  tracker::{Guild, Timings, TierRoles, Tracker},
};

/// Account the test friend clients are logged on as.
pub const TRACKED: SteamId = SteamId::new(76561198000000100);

pub const SUBSCRIBER_ROLE: u64 = 10;
pub const SPECIAL_ROLE: u64 = 20;

pub async fn setup_db() -> DatabaseConnection {
  let db = Database::connect("sqlite::memory:").await.unwrap();
  let backend = db.get_database_backend();
  let schema = Schema::new(backend);

  for stmt in [
    schema.create_table_from_entity(user::Entity),
    schema.create_table_from_entity(game::Entity),
    schema.create_table_from_entity(participant::Entity),
  ] {
    db.execute(backend.build(&stmt)).await.unwrap();
  }
  db
}

pub fn game(match_id: &str, at: DateTime) -> game::Model {
  game::Model {
    id: Uuid::new_v4(),
    match_id: match_id.into(),
    win: true,
    started_at: at,
    fetched_at: at,
  }
}

pub fn participant(
  game: &game::Model,
  steam_id: &str,
  user_id: Option<i64>,
) -> participant::Model {
  participant::Model {
    id: Uuid::new_v4(),
    game_id: game.id,
    match_id: game.match_id.clone(),
    steam_id: steam_id.into(),
    user_id,
    wins: game.win as i64,
    losses: !game.win as i64,
    kills: 0,
    deaths: 0,
    assists: 0,
    gpm: 0,
    xpm: 0,
    last_hits: 0,
    denies: 0,
    net_worth: 0,
    healing: 0,
    damage: 0,
    damage_taken: 0,
    damage_reduced: 0,
    level: 0,
    bounty_runes: 0,
    bkbs: 0,
    tower_damage: 0,
    created_at: game.started_at,
    fetched_at: game.fetched_at,
  }
}

pub async fn linked_user(
  db: &DatabaseConnection,
  discord_id: &str,
  steam_id: SteamId,
  twitch: Option<&str>,
) -> user::Model {
  let pairing = Pairing {
    discord_id: discord_id.into(),
    discord_name: format!("member{discord_id}"),
    steam: Some(Connection { id: steam_id.to_string(), name: "steam".into() }),
    twitch: twitch.map(|name| Connection {
      id: format!("tw-{name}"),
      name: name.into(),
    }),
  };
  sv::User::new(db).link(&pairing).await.unwrap().user
}

/// Logged on client with both snapshots loaded.
pub fn friend_client(
  account: Account,
  friends: Vec<(SteamId, Relationship)>,
  nicknames: Vec<(SteamId, String)>,
) -> (Arc<FriendClient>, mpsc::UnboundedReceiver<Action>) {
  let (client, actions) = FriendClient::new(account);
  client.apply(&SessionEvent::LoggedOn { steam_id: TRACKED });
  client.apply(&SessionEvent::FriendsList { friends, incremental: false });
  client.apply(&SessionEvent::NicknameList(nicknames));
  (client, actions)
}

#[derive(Default)]
pub struct FakeGuild {
  pub roles: Mutex<HashMap<String, Vec<u64>>>,
  pub messages: Mutex<Vec<(String, String)>>,
}

impl FakeGuild {
  pub fn grant(&self, discord_id: &str, role: u64) {
    self.roles.lock().unwrap().entry(discord_id.into()).or_default().push(role);
  }

  pub fn messages_to(&self, discord_id: &str) -> Vec<String> {
    let messages = self.messages.lock().unwrap();
    messages
      .iter()
      .filter(|(to, _)| to == discord_id)
      .map(|(_, text)| text.clone())
      .collect()
  }
}

#[async_trait]
impl Guild for FakeGuild {
  async fn member_roles(&self, discord_id: &str) -> Result<Vec<u64>> {
    Ok(self.roles.lock().unwrap().get(discord_id).cloned().unwrap_or_default())
  }

  async fn direct_message(&self, discord_id: &str, content: &str) -> Result<()> {
    self.messages.lock().unwrap().push((discord_id.into(), content.into()));
    Ok(())
  }
}

#[derive(Default)]
pub struct FakeMatches {
  pub matches: HashMap<u64, dota::Match>,
  pub fetches: AtomicUsize,
}

#[async_trait]
impl MatchSource for FakeMatches {
  fn ready(&self) -> bool {
    true
  }

  async fn fetch(&self, match_id: u64) -> anyhow::Result<dota::Match> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    self
      .matches
      .get(&match_id)
      .cloned()
      .ok_or_else(|| anyhow::anyhow!("match {match_id} not found"))
  }
}

type Client = (Arc<FriendClient>, mpsc::UnboundedReceiver<Action>);

pub struct Harness {
  pub db: DatabaseConnection,
  pub guild: Arc<FakeGuild>,
  pub matches: Arc<FakeMatches>,
  pub main: mpsc::UnboundedReceiver<Action>,
  pub games: mpsc::UnboundedReceiver<Action>,
  pub tracker: Tracker,
}

impl Harness {
  pub async fn new(
    friends: Vec<(SteamId, Relationship)>,
    matches: FakeMatches,
  ) -> Self {
    Self::with_clients(
      friend_client(Account::Main, friends.clone(), vec![]),
      friend_client(Account::Games, friends, vec![]),
      matches,
      Duration::from_millis(50),
    )
    .await
  }

  pub async fn with_clients(
    (main_client, main): Client,
    (games_client, games): Client,
    matches: FakeMatches,
    ready_timeout: Duration,
  ) -> Self {
    let db = setup_db().await;
    let guild = Arc::new(FakeGuild::default());
    let matches = Arc::new(matches);

    let roles = TierRoles {
      special: HashSet::from([SPECIAL_ROLE]),
      subscriber: HashSet::from([SUBSCRIBER_ROLE]),
    };
    let tracker = Tracker::new(
      db.clone(),
      guild.clone(),
      roles,
      main_client,
      games_client,
      matches.clone(),
    )
    .with_timings(Timings {
      fetch_pacing: Duration::ZERO,
      ready_timeout,
    });

    Self { db, guild, matches, main, games, tracker }
  }

  pub fn drain(rx: &mut mpsc::UnboundedReceiver<Action>) -> Vec<Action> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
  }
}
