use std::env;

use crate::{prelude::*, steam::Credentials, tracker::TierRoles};

#[derive(Debug, Clone)]
pub struct Discord {
  pub token: String,
  pub guild_id: u64,
  pub admin_roles: HashSet<u64>,
}

#[derive(Debug, Clone)]
pub struct OAuth {
  pub client_id: String,
  pub client_secret: String,
  pub redirect_url: String,
  /// Signs the csrf cookie
  pub secret: String,
  pub cookie_domain: Option<String>,
  pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct Steam {
  pub api_key: String,
  pub main: Credentials,
  pub games: Credentials,
}

#[derive(Debug, Clone)]
pub struct Timings {
  pub ingest_interval: Duration,
  pub sweep_interval: Duration,
  pub fetch_pacing: Duration,
  pub ready_timeout: Duration,
  pub steam_poll: Duration,
}

impl Default for Timings {
  fn default() -> Self {
    Self {
      ingest_interval: Duration::from_secs(10 * 60),
      sweep_interval: Duration::from_secs(3600),
      fetch_pacing: Duration::from_millis(300),
      ready_timeout: Duration::from_secs(60),
      steam_poll: Duration::from_secs(30),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  pub discord: Discord,
  pub oauth: OAuth,
  pub roles: TierRoles,
  pub steam: Steam,
  pub timings: Timings,
}

fn required(key: &str) -> anyhow::Result<String> {
  env::var(key).with_context(|| format!("{key} not set"))
}

fn optional(key: &str) -> Option<String> {
  env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_ids(raw: &str) -> anyhow::Result<HashSet<u64>> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|id| id.parse().with_context(|| format!("Invalid id `{id}`")))
    .collect()
}

fn ids(key: &str) -> anyhow::Result<HashSet<u64>> {
  match optional(key) {
    Some(raw) => parse_ids(&raw).with_context(|| format!("Bad {key}")),
    None => Ok(HashSet::new()),
  }
}

fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
  Ok(humantime::parse_duration(raw.trim())?)
}

/// Like [`parse_duration`], for timer periods which must not be zero.
fn parse_period(raw: &str) -> anyhow::Result<Duration> {
  let period = parse_duration(raw)?;
  if period.is_zero() {
    anyhow::bail!("period must be longer than zero");
  }
  Ok(period)
}

fn duration(
  key: &str,
  default: Duration,
  parse: fn(&str) -> anyhow::Result<Duration>,
) -> anyhow::Result<Duration> {
  match optional(key) {
    Some(raw) => parse(&raw).with_context(|| format!("Bad duration in {key}")),
    None => Ok(default),
  }
}

fn credentials(prefix: &str) -> anyhow::Result<Credentials> {
  Ok(Credentials {
    username: required(&format!("{prefix}_USERNAME"))?,
    password: required(&format!("{prefix}_PASSWORD"))?,
    totp_secret: optional(&format!("{prefix}_TOTP_SECRET")),
  })
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let guild_id: u64 = required("DISCORD_GUILD_ID")?
      .trim()
      .parse()
      .context("Invalid DISCORD_GUILD_ID")?;
    if guild_id == 0 {
      anyhow::bail!("DISCORD_GUILD_ID must not be zero");
    }

    let defaults = Timings::default();
    Ok(Self {
      database_url: optional("DATABASE_URL")
        .unwrap_or_else(|| "sqlite:tracker.db?mode=rwc".into()),
      port: optional("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
      discord: Discord {
        token: required("DISCORD_TOKEN")?,
        guild_id,
        admin_roles: ids("DISCORD_ADMIN_ROLES")?,
      },
      oauth: OAuth {
        client_id: required("DISCORD_CLIENT_ID")?,
        client_secret: required("DISCORD_CLIENT_SECRET")?,
        redirect_url: required("DISCORD_REDIRECT_URL")?,
        secret: required("SERVER_SECRET")?,
        cookie_domain: optional("COOKIE_DOMAIN"),
        cookie_secure: optional("COOKIE_SECURE")
          .is_none_or(|v| v.eq_ignore_ascii_case("true") || v == "1"),
      },
      roles: TierRoles {
        special: ids("SPECIAL_ROLES")?,
        subscriber: ids("SUBSCRIBER_ROLES")?,
      },
      steam: Steam {
        api_key: required("STEAM_API_KEY")?,
        main: credentials("STEAM_MAIN")?,
        games: credentials("STEAM_GAMES")?,
      },
      timings: Timings {
        ingest_interval: duration(
          "INGEST_INTERVAL",
          defaults.ingest_interval,
          parse_period,
        )?,
        sweep_interval: duration(
          "SWEEP_INTERVAL",
          defaults.sweep_interval,
          parse_period,
        )?,
        fetch_pacing: duration(
          "FETCH_PACING",
          defaults.fetch_pacing,
          parse_duration,
        )?,
        ready_timeout: duration(
          "READY_TIMEOUT",
          defaults.ready_timeout,
          parse_period,
        )?,
        steam_poll: duration(
          "STEAM_POLL_INTERVAL",
          defaults.steam_poll,
          parse_period,
        )?,
      },
    })
  }
}
