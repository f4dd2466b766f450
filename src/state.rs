use crate::{config::Config, prelude::*, tracker::Tracker};

pub struct AppState {
  pub config: Config,
  pub tracker: Arc<Tracker>,
  pub http: reqwest::Client,
  pub shutdown: CancellationToken,
}
