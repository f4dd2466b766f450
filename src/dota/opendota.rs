use anyhow::bail;
use serde::Deserialize;

use crate::prelude::*;

const BASE: &str = "https://api.opendota.com/api";
const RECENT_LIMIT: &str = "30";

/// Lists the tracked account's latest matches.
pub struct OpenDota {
  http: reqwest::Client,
  base: String,
}

#[derive(Deserialize)]
struct Recent {
  match_id: u64,
}

impl OpenDota {
  pub fn new(http: reqwest::Client) -> Self {
    Self { http, base: BASE.to_string() }
  }

  pub async fn recent_matches(
    &self,
    account_id: u32,
  ) -> anyhow::Result<Vec<String>> {
    let response = self
      .http
      .get(format!("{}/players/{account_id}/matches", self.base))
      .query(&[("project", "match_id"), ("limit", RECENT_LIMIT)])
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      bail!("opendota returned {status}: {body}");
    }

    let recent: Vec<Recent> = response.json().await?;
    debug!("opendota listed {} matches", recent.len());
    Ok(recent.into_iter().map(|m| m.match_id.to_string()).collect())
  }
}
