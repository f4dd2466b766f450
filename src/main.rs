//! Tracker - keeps two Steam friend lists in line with Discord roles
//!
//! Architecture:
//! - SeaORM for database access (SQLite)
//! - Axum for the account linking flow with rate limiting
//! - Serenity for the Discord guild and admin commands
//! - Tokio for async runtime

mod config;
mod dota;
mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod steam;
mod sv;
#[cfg(test)]
mod testing;
mod tracker;
mod utils;

use migration::Migrator;
use tokio::{sync::mpsc, task::JoinSet};
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  config::Config,
  dota::WebApi,
  plugins::{App, cron, discord, server},
  prelude::*,
  state::AppState,
  steam::{Account, Session, WebSession},
  tracker::{Timings, Tracker},
};

const USER_AGENT: &str =
  concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "tracker_bot=debug,tower_http=debug,serenity=warn,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;
  info!("Starting Tracker v{}", env!("CARGO_PKG_VERSION"));

  info!("Connecting to database...");
  let db = Database::connect(&config.database_url)
    .await
    .context("Failed to connect to database")?;

  info!("Running migrations...");
  Migrator::up(&db, None).await.context("Failed to run migrations")?;

  let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
  let shutdown = CancellationToken::new();

  let mut sessions = JoinSet::new();
  let mut clients = Vec::new();
  for account in Account::ALL {
    let credentials = match account {
      Account::Main => config.steam.main.clone(),
      Account::Games => config.steam.games.clone(),
    };
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let web = Arc::new(WebSession::new(
      http.clone(),
      account,
      events_tx,
      config.timings.steam_poll,
    ));
    let (client, session, changes) =
      Session::new(account, Arc::new(web), credentials, events_rx);

    let token = shutdown.clone();
    sessions.spawn(async move { (account, session.run(token).await) });
    clients.push((client, changes));
  }
  let (Some((games, games_changes)), Some((main, main_changes))) =
    (clients.pop(), clients.pop())
  else {
    anyhow::bail!("Steam sessions were not created");
  };

  let guild = discord::DiscordGuild::new(
    Arc::new(serenity::all::Http::new(&config.discord.token)),
    config.discord.guild_id,
  );
  let matches = WebApi::new(http.clone(), config.steam.api_key.clone());
  let tracker = Arc::new(
    Tracker::new(
      db,
      Arc::new(guild),
      config.roles.clone(),
      main,
      games,
      Arc::new(matches),
    )
    .with_timings(Timings {
      fetch_pacing: config.timings.fetch_pacing,
      ready_timeout: config.timings.ready_timeout,
    }),
  );
  for changes in [main_changes, games_changes] {
    tokio::spawn(tracker.clone().follow(changes, shutdown.clone()));
  }

  let app = Arc::new(AppState {
    config,
    tracker,
    http,
    shutdown: shutdown.clone(),
  });

  App::new()
    .register(server::Plugin)
    .register(discord::Plugin)
    .register(cron::Ingest)
    .register(cron::Sweep)
    .run(app)
    .await;

  let outcome = tokio::select! {
    signal = tokio::signal::ctrl_c() => {
      signal.context("Failed to listen for ctrl-c")?;
      info!("Shutting down...");
      Ok(())
    }
    Some(joined) = sessions.join_next() => match joined {
      Ok((account, Ok(()))) => {
        Err(anyhow::anyhow!("{account} session stopped unexpectedly"))
      }
      Ok((account, Err(err))) => {
        error!("{account} session failed: {err}");
        Err(anyhow::anyhow!("{account}: {err}"))
      }
      Err(err) => Err(anyhow::anyhow!("Session task panicked: {err}")),
    },
  };

  shutdown.cancel();
  while let Some(joined) = sessions.join_next().await {
    if let Ok((account, Err(err))) = joined {
      warn!("{account} session ended with: {err}");
    }
  }
  outcome
}
