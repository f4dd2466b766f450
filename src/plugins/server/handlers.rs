use axum::{
  extract::{Query, State},
  http::{HeaderMap, HeaderValue, header::SET_COOKIE},
  response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use url::{Url, form_urlencoded};

use super::csrf;
use crate::{
  config::OAuth,
  prelude::*,
  state::AppState,
  sv::user::{Connection, Pairing},
};

const AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
const API: &str = "https://discord.com/api/v10";
const SCOPES: [&str; 2] = ["identify", "connections"];

/// Sends the browser to `/failed` with a reason.
pub struct Failure(String);

impl Failure {
  fn new(reason: impl Into<String>) -> Self {
    Self(reason.into())
  }

  fn discord() -> Self {
    Self::new("bad response from discord")
  }

  fn internal() -> Self {
    Self::new("Internal Server Error")
  }
}

impl IntoResponse for Failure {
  fn into_response(self) -> Response {
    let query = form_urlencoded::Serializer::new(String::new())
      .append_pair("reason", &self.0)
      .finish();
    Redirect::temporary(&format!("/failed?{query}")).into_response()
  }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct TokenResponse {
  pub access_token: String,
  #[serde(default)]
  pub token_type: String,
  #[serde(default)]
  pub expires_in: u64,
  #[serde(default)]
  pub refresh_token: String,
  #[serde(default)]
  pub scope: String,
}

impl TokenResponse {
  fn has_scopes(&self) -> bool {
    let granted: HashSet<&str> = self.scope.split_whitespace().collect();
    SCOPES.iter().all(|scope| granted.contains(scope))
  }
}

#[derive(Debug, Deserialize)]
pub struct DiscordUser {
  pub id: String,
  pub username: String,
  #[serde(default)]
  pub global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct DiscordConnection {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub revoked: bool,
  #[serde(default)]
  pub verified: bool,
  #[serde(default)]
  pub visibility: u8,
}

/// First verified, publicly visible connection of each kind.
pub fn pick_connections(
  connections: &[DiscordConnection],
) -> (Option<Connection>, Option<Connection>) {
  let first = |kind: &str| {
    connections
      .iter()
      .find(|c| c.kind == kind && c.visibility == 1 && c.verified)
      .map(|c| Connection { id: c.id.clone(), name: c.name.clone() })
  };
  (first("steam"), first("twitch"))
}

pub fn authorize_url(oauth: &OAuth, state: &str) -> anyhow::Result<Url> {
  let scope = SCOPES.join(" ");
  let url = Url::parse_with_params(AUTHORIZE_URL, &[
    ("client_id", oauth.client_id.as_str()),
    ("redirect_uri", oauth.redirect_url.as_str()),
    ("response_type", "code"),
    ("scope", scope.as_str()),
    ("state", state),
  ])?;
  Ok(url)
}

fn cookie_header(cookie: &str) -> Result<HeaderValue, Failure> {
  HeaderValue::from_str(cookie).map_err(|_| Failure::internal())
}

pub async fn login(State(app): State<Arc<AppState>>) -> Response {
  let oauth = &app.config.oauth;
  let state = utils::random_hex(32);

  let signed = csrf::sign(&oauth.secret, &state, Utc::now().timestamp());
  let (Some(signed), Ok(url)) = (signed, authorize_url(oauth, &state)) else {
    error!("Failed to prepare the authorization request");
    return Failure::internal().into_response();
  };
  let cookie = match cookie_header(&csrf::set_cookie(oauth, &signed)) {
    Ok(cookie) => cookie,
    Err(failure) => return failure.into_response(),
  };

  ([(SET_COOKIE, cookie)], Redirect::temporary(url.as_str())).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
  pub code: Option<String>,
  pub state: Option<String>,
}

pub async fn callback(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(query): Query<CallbackQuery>,
) -> Response {
  let clear = cookie_header(&csrf::clear_cookie(&app.config.oauth));
  let outcome = pair(&app, &headers, query).await;

  let mut response = match outcome {
    Ok(_) => Redirect::temporary("/paired").into_response(),
    Err(failure) => failure.into_response(),
  };
  if let Ok(clear) = clear {
    response.headers_mut().append(SET_COOKIE, clear);
  }
  response
}

async fn pair(
  app: &AppState,
  headers: &HeaderMap,
  query: CallbackQuery,
) -> Result<(), Failure> {
  let oauth = &app.config.oauth;
  let now = Utc::now().timestamp();

  let expected = csrf::extract(headers)
    .and_then(|cookie| csrf::verify(&oauth.secret, &cookie, now));
  if expected.is_none() || expected != query.state {
    return Err(Failure::new("Invalid csrf cookie state"));
  }
  let Some(code) = query.code.filter(|code| !code.is_empty()) else {
    return Err(Failure::new("Invalid response from discord"));
  };

  let token = exchange(app, &code).await?;
  if !token.has_scopes() {
    debug!("Bad oauth scopes: {}", token.scope);
    return Err(Failure::discord());
  }

  let user: DiscordUser = fetch(app, &token, "/users/@me").await?;
  let connections: Vec<DiscordConnection> =
    fetch(app, &token, "/users/@me/connections").await?;
  let (steam, twitch) = pick_connections(&connections);

  let pairing = Pairing {
    discord_id: user.id,
    discord_name: user.global_name.unwrap_or(user.username),
    steam,
    twitch,
  };
  info!(
    "Pairing {}: steam {:?}, twitch {:?}",
    pairing.discord_id,
    pairing.steam.as_ref().map(|c| &c.id),
    pairing.twitch.as_ref().map(|c| &c.name),
  );

  app.tracker.link(pairing).await.map_err(|err| {
    error!("Failed to link accounts: {err}");
    Failure::internal()
  })?;
  Ok(())
}

async fn exchange(
  app: &AppState,
  code: &str,
) -> Result<TokenResponse, Failure> {
  let oauth = &app.config.oauth;
  let response = app
    .http
    .post(format!("{API}/oauth2/token"))
    .form(&[
      ("client_id", oauth.client_id.as_str()),
      ("client_secret", oauth.client_secret.as_str()),
      ("grant_type", "authorization_code"),
      ("code", code),
      ("redirect_uri", oauth.redirect_url.as_str()),
    ])
    .send()
    .await
    .map_err(|err| {
      error!("Failed to get oauth token: {err}");
      Failure::internal()
    })?;

  decode(response, "oauth token").await
}

async fn fetch<T: serde::de::DeserializeOwned>(
  app: &AppState,
  token: &TokenResponse,
  path: &str,
) -> Result<T, Failure> {
  let response = app
    .http
    .get(format!("{API}{path}"))
    .bearer_auth(&token.access_token)
    .send()
    .await
    .map_err(|err| {
      error!("Failed to get {path}: {err}");
      Failure::discord()
    })?;

  decode(response, path).await
}

async fn decode<T: serde::de::DeserializeOwned>(
  response: reqwest::Response,
  what: &str,
) -> Result<T, Failure> {
  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    error!("Failed to get {what}: {body}");
    return Err(Failure::new(format!(
      "Bad response from discord: {}",
      status.as_u16()
    )));
  }
  response.json().await.map_err(|err| {
    error!("Failed to decode {what}: {err}");
    Failure::discord()
  })
}

pub async fn paired() -> &'static str {
  "Accounts paired!"
}

#[derive(Debug, Deserialize)]
pub struct FailedQuery {
  #[serde(default)]
  pub reason: String,
}

pub async fn failed(Query(query): Query<FailedQuery>) -> String {
  format!("Failed to pair accounts.\nReason: {}", query.reason)
}

pub async fn health() -> &'static str {
  "OK"
}

#[cfg(test)]
mod tests {
  use super::*;

  fn connection(
    kind: &str,
    id: &str,
    verified: bool,
    visibility: u8,
  ) -> DiscordConnection {
    DiscordConnection {
      id: id.into(),
      name: format!("{kind}-{id}"),
      kind: kind.into(),
      revoked: false,
      verified,
      visibility,
    }
  }

  #[test]
  fn picks_first_visible_verified() {
    let (steam, twitch) = pick_connections(&[
      connection("steam", "1", false, 1),
      connection("steam", "2", true, 0),
      connection("steam", "3", true, 1),
      connection("steam", "4", true, 1),
      connection("youtube", "5", true, 1),
    ]);
    assert_eq!(steam.unwrap().id, "3");
    assert!(twitch.is_none());
  }

  #[test]
  fn parses_connections() {
    let raw = r#"[{"id":"76561198000000001","name":"me","type":"steam",
      "revoked":false,"verified":true,"visibility":1,"friend_sync":false}]"#;
    let parsed: Vec<DiscordConnection> = json::from_str(raw).unwrap();
    let (steam, _) = pick_connections(&parsed);
    assert_eq!(steam.unwrap().name, "me");
  }

  #[test]
  fn requires_both_scopes() {
    let token = |scope: &str| TokenResponse {
      access_token: "t".into(),
      token_type: "Bearer".into(),
      expires_in: 604800,
      refresh_token: String::new(),
      scope: scope.into(),
    };
    assert!(token("connections identify").has_scopes());
    assert!(!token("identify").has_scopes());
    assert!(!token("").has_scopes());
  }

  #[test]
  fn authorize_url_carries_state() {
    let oauth = OAuth {
      client_id: "42".into(),
      client_secret: "s".into(),
      redirect_url: "https://example.org/callback".into(),
      secret: "k".into(),
      cookie_domain: None,
      cookie_secure: false,
    };
    let url = authorize_url(&oauth, "abcd").unwrap();
    let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["client_id"], "42");
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["scope"], "identify connections");
    assert_eq!(pairs["state"], "abcd");
  }
}
