use crate::{
  dota::{self, OpenDota},
  plugins::Plugin,
  prelude::*,
  state::AppState,
  steam::Account,
};

const SOURCE_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Pulls the games account's recent matches on a fixed period.
pub struct Ingest;

#[async_trait]
impl Plugin for Ingest {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let opendota = OpenDota::new(app.http.clone());
    let mut interval = time::interval(app.config.timings.ingest_interval);

    loop {
      tokio::select! {
        _ = app.shutdown.cancelled() => return Ok(()),
        _ = interval.tick() => {}
      }

      let tracker = &app.tracker;
      let games = tokio::select! {
        _ = app.shutdown.cancelled() => return Ok(()),
        games = tracker.games_account() => games,
      };
      let Some(games) = games else {
        warn!("Games account is not ready, skipping match ingestion");
        continue;
      };
      let ready = dota::wait_ready(
        tracker.matches(),
        SOURCE_READY_TIMEOUT,
        &app.shutdown,
      )
      .await;
      if !ready {
        warn!("Match source is not ready, skipping match ingestion");
        continue;
      }

      info!("Looking up recent matches...");
      let candidates = match opendota.recent_matches(games.account_id()).await
      {
        Ok(ids) => ids,
        Err(err) => {
          error!("Failed to list recent matches: {err:#}");
          continue;
        }
      };
      match tracker.ingest(&candidates).await {
        Ok(ingested) if !ingested.is_empty() => {
          info!("Stored {} new matches", ingested.len());
        }
        Ok(_) => {}
        Err(err) => error!("Match ingestion failed: {err}"),
      }
    }
  }
}

/// Periodically resyncs every linked user.
pub struct Sweep;

#[async_trait]
impl Plugin for Sweep {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    for account in Account::ALL {
      tokio::select! {
        _ = app.shutdown.cancelled() => return Ok(()),
        _ = app.tracker.client(account).ready().wait() => {}
      }
    }

    let mut interval = time::interval(app.config.timings.sweep_interval);
    loop {
      tokio::select! {
        _ = app.shutdown.cancelled() => return Ok(()),
        _ = interval.tick() => {}
      }
      if let Err(err) = app.tracker.sweep().await {
        error!("Sweep failed: {err}");
      }
    }
  }
}
