//! Transport over Steam's public web APIs.
//!
//! Log-on goes through `IAuthenticationService`. The friend list and the
//! nickname list are polled, and friend actions go through the community
//! site with the session cookies.

use std::sync::{
  Mutex, RwLock,
  atomic::{AtomicBool, Ordering},
};

use anyhow::{anyhow, bail};
use base64::{Engine, prelude::BASE64_STANDARD};
use rand::RngCore;
use reqwest::{
  StatusCode,
  header::{self, HeaderMap},
};
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::mpsc;

use super::{Account, LogOn, Relationship, SessionEvent, SteamId, Transport};
use crate::prelude::*;

const API: &str = "https://api.steampowered.com";
const COMMUNITY: &str = "https://steamcommunity.com";

const PLATFORM_WEB_BROWSER: &str = "2";
const PERSISTENCE: &str = "1";
const GUARD_DEVICE_CODE: u32 = 3;
const GUARD_DEVICE_CODE_TYPE: &str = "3";
const AUTH_POLLS: usize = 12;

#[derive(Debug, Clone)]
struct Auth {
  steam_id: SteamId,
  access_token: String,
  session_id: String,
}

pub struct WebSession {
  http: reqwest::Client,
  api: String,
  community: String,
  account: Account,
  events: mpsc::UnboundedSender<SessionEvent>,
  poll_interval: Duration,
  connected: AtomicBool,
  auth: RwLock<Option<Auth>>,
  poller: Mutex<Option<CancellationToken>>,
}

#[derive(Deserialize)]
struct Envelope<T> {
  response: T,
}

#[derive(Deserialize)]
struct RsaKey {
  publickey_mod: String,
  publickey_exp: String,
  timestamp: String,
}

#[derive(Deserialize)]
struct BeginAuth {
  client_id: Option<String>,
  request_id: Option<String>,
  steamid: Option<String>,
  interval: Option<f64>,
  #[serde(default)]
  allowed_confirmations: Vec<Confirmation>,
}

#[derive(Deserialize)]
struct Confirmation {
  confirmation_type: u32,
}

#[derive(Deserialize)]
struct PollAuth {
  access_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct FriendsList {
  friendslist: Option<Friends>,
}

#[derive(Deserialize)]
struct Friends {
  #[serde(default)]
  friends: Vec<Friend>,
}

#[derive(Deserialize)]
struct Friend {
  ulfriendid: String,
  efriendrelationship: u32,
}

#[derive(Deserialize, Default)]
struct NicknameList {
  #[serde(default)]
  nicknames: Vec<Nickname>,
}

#[derive(Deserialize)]
struct Nickname {
  accountid: u32,
  nickname: String,
}

impl FriendsList {
  fn into_event(self) -> SessionEvent {
    let friends = self
      .friendslist
      .map(|f| f.friends)
      .unwrap_or_default()
      .into_iter()
      .filter_map(|f| {
        let id = f.ulfriendid.parse().ok()?;
        Some((id, Relationship::from_raw(f.efriendrelationship)))
      })
      .collect();
    SessionEvent::FriendsList { friends, incremental: false }
  }
}

impl NicknameList {
  fn into_event(self) -> SessionEvent {
    SessionEvent::NicknameList(
      self
        .nicknames
        .into_iter()
        .map(|n| (SteamId::from_account_id(n.accountid), n.nickname))
        .collect(),
    )
  }
}

/// Log-on failure for a non-success `x-eresult` on an auth response.
fn rejection(headers: &HeaderMap, what: &str) -> Option<SessionEvent> {
  let code = headers
    .get("x-eresult")
    .and_then(|v| v.to_str().ok())
    .filter(|v| *v != "1")?;
  Some(SessionEvent::LogOnFailed(format!("{what} rejected, eresult {code}")))
}

fn is_expired(status: Option<StatusCode>) -> bool {
  matches!(status, Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN))
}

fn friend_request<'a>(id: &'a str, accept: bool) -> [(&'a str, &'a str); 2] {
  [("steamid", id), ("accept_invite", if accept { "1" } else { "0" })]
}

fn encrypt_password(key: &RsaKey, password: &str) -> anyhow::Result<String> {
  let n = BigUint::from_bytes_be(&hex::decode(&key.publickey_mod)?);
  let e = BigUint::from_bytes_be(&hex::decode(&key.publickey_exp)?);
  let public = RsaPublicKey::new(n, e)?;
  let encrypted = public.encrypt(
    &mut rand::thread_rng(),
    Pkcs1v15Encrypt,
    password.as_bytes(),
  )?;
  Ok(BASE64_STANDARD.encode(encrypted))
}

fn session_id() -> String {
  let mut bytes = [0u8; 12];
  rand::thread_rng().fill_bytes(&mut bytes);
  hex::encode(bytes)
}

impl WebSession {
  pub fn new(
    http: reqwest::Client,
    account: Account,
    events: mpsc::UnboundedSender<SessionEvent>,
    poll_interval: Duration,
  ) -> Self {
    Self {
      http,
      api: API.into(),
      community: COMMUNITY.into(),
      account,
      events,
      poll_interval,
      connected: AtomicBool::new(false),
      auth: RwLock::new(None),
      poller: Mutex::new(None),
    }
  }

  #[cfg(test)]
  fn with_hosts(mut self, api: &str, community: &str) -> Self {
    self.api = api.into();
    self.community = community.into();
    self
  }

  fn method(&self, name: &str) -> String {
    format!("{}/{name}/v1/", self.api)
  }

  fn emit(&self, event: SessionEvent) {
    let _ = self.events.send(event);
  }

  fn auth(&self) -> anyhow::Result<Auth> {
    self
      .auth
      .read()
      .map_err(|_| anyhow!("auth lock poisoned"))?
      .clone()
      .ok_or_else(|| anyhow!("{} is not logged on", self.account))
  }

  fn set_auth(&self, auth: Option<Auth>) {
    if let Ok(mut slot) = self.auth.write() {
      *slot = auth;
    }
  }

  fn stop_poller(&self) {
    if let Some(token) = self.poller.lock().ok().and_then(|mut p| p.take()) {
      token.cancel();
    }
  }

  /// Drops the session and tells the driver, which reconnects later.
  fn drop_session(&self) {
    self.stop_poller();
    self.set_auth(None);
    if self.connected.swap(false, Ordering::AcqRel) {
      self.emit(SessionEvent::Disconnected);
    }
  }

  async fn rsa_key(&self, username: &str) -> anyhow::Result<RsaKey> {
    let envelope: Envelope<RsaKey> = self
      .http
      .get(self.method("IAuthenticationService/GetPasswordRSAPublicKey"))
      .query(&[("account_name", username)])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(envelope.response)
  }

  /// Returns `None` once the rejection has been reported as an event.
  async fn authenticate(
    &self,
    details: &LogOn,
  ) -> anyhow::Result<Option<(SteamId, String)>> {
    let key = self.rsa_key(&details.username).await?;
    let encrypted = encrypt_password(&key, &details.password)?;

    let begin_url =
      self.method("IAuthenticationService/BeginAuthSessionViaCredentials");
    let response = self
      .http
      .post(begin_url)
      .form(&[
        ("account_name", details.username.as_str()),
        ("encrypted_password", encrypted.as_str()),
        ("encryption_timestamp", key.timestamp.as_str()),
        ("remember_login", "true"),
        ("platform_type", PLATFORM_WEB_BROWSER),
        ("persistence", PERSISTENCE),
        ("website_id", "Community"),
      ])
      .send()
      .await?
      .error_for_status()?;
    if let Some(failed) = rejection(response.headers(), "credentials") {
      self.emit(failed);
      return Ok(None);
    }
    let begin: Envelope<BeginAuth> = response.json().await?;
    let begin = begin.response;

    let (Some(client_id), Some(request_id), Some(steamid)) =
      (begin.client_id, begin.request_id, begin.steamid)
    else {
      self.emit(SessionEvent::LogOnFailed("credentials rejected".into()));
      return Ok(None);
    };

    let needs_code = begin
      .allowed_confirmations
      .iter()
      .any(|c| c.confirmation_type == GUARD_DEVICE_CODE);
    if needs_code {
      let Some(code) = details.code.as_deref() else {
        self.emit(SessionEvent::LogOnFailed(
          "account requires a steam guard code".into(),
        ));
        return Ok(None);
      };
      let guard_url = self
        .method("IAuthenticationService/UpdateAuthSessionWithSteamGuardCode");
      let response = self
        .http
        .post(guard_url)
        .form(&[
          ("client_id", client_id.as_str()),
          ("steamid", steamid.as_str()),
          ("code", code),
          ("code_type", GUARD_DEVICE_CODE_TYPE),
        ])
        .send()
        .await?
        .error_for_status()?;
      if let Some(failed) = rejection(response.headers(), "steam guard code") {
        self.emit(failed);
        return Ok(None);
      }
    }

    let interval = Duration::from_secs_f64(
      begin.interval.filter(|i| i.is_finite() && *i > 0.0).unwrap_or(5.0),
    );
    for _ in 0..AUTH_POLLS {
      let poll: Envelope<PollAuth> = self
        .http
        .post(self.method("IAuthenticationService/PollAuthSessionStatus"))
        .form(&[
          ("client_id", client_id.as_str()),
          ("request_id", request_id.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
      if let Some(token) = poll.response.access_token {
        return Ok(Some((steamid.parse()?, token)));
      }
      time::sleep(interval).await;
    }
    bail!("authentication session was never approved")
  }

  async fn fetch<T: DeserializeOwned>(
    &self,
    method: &str,
    auth: &Auth,
  ) -> Result<T, reqwest::Error> {
    let envelope: Envelope<T> = self
      .http
      .get(self.method(method))
      .query(&[("access_token", auth.access_token.as_str())])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(envelope.response)
  }

  async fn poll_once(&self) -> Result<(), reqwest::Error> {
    let Ok(auth) = self.auth() else {
      return Ok(());
    };
    let friends: FriendsList =
      self.fetch("IFriendsListService/GetFriendsList", &auth).await?;
    let nicknames: NicknameList =
      self.fetch("IPlayerService/GetNicknameList", &auth).await?;

    self.emit(friends.into_event());
    self.emit(nicknames.into_event());
    Ok(())
  }

  fn spawn_poller(self: &Arc<Self>) {
    let token = CancellationToken::new();
    let old =
      self.poller.lock().ok().and_then(|mut p| p.replace(token.clone()));
    if let Some(old) = old {
      old.cancel();
    }

    let session = self.clone();
    tokio::spawn(async move {
      let mut tick = time::interval(session.poll_interval);
      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          _ = tick.tick() => {}
        }
        match session.poll_once().await {
          Ok(()) => {}
          Err(err) if is_expired(err.status()) => {
            warn!("{}: web session expired", session.account);
            session.drop_session();
            break;
          }
          Err(err) => warn!("{}: friend poll failed: {err}", session.account),
        }
      }
    });
  }

  async fn community(
    &self,
    path: &str,
    form: &[(&str, &str)],
  ) -> anyhow::Result<()> {
    let auth = self.auth()?;
    let cookie = format!(
      "sessionid={}; steamLoginSecure={}%7C%7C{}",
      auth.session_id, auth.steam_id, auth.access_token
    );
    let mut fields = vec![("sessionID", auth.session_id.as_str())];
    fields.extend_from_slice(form);

    let response = self
      .http
      .post(format!("{}{path}", self.community))
      .header(header::COOKIE, cookie)
      .form(&fields)
      .send()
      .await?;
    if is_expired(Some(response.status())) {
      self.drop_session();
    }
    response.error_for_status()?;
    Ok(())
  }
}

#[async_trait]
impl Transport for Arc<WebSession> {
  fn is_connected(&self) -> bool {
    self.connected.load(Ordering::Acquire)
  }

  async fn connect(&self) -> anyhow::Result<()> {
    self
      .http
      .get(self.method("ISteamWebAPIUtil/GetServerInfo"))
      .send()
      .await?
      .error_for_status()
      .context("steam web api is unreachable")?;

    self.connected.store(true, Ordering::Release);
    self.emit(SessionEvent::Connected);
    Ok(())
  }

  async fn log_on(&self, details: LogOn) -> anyhow::Result<()> {
    let (steam_id, access_token) = match self.authenticate(&details).await {
      Ok(Some(auth)) => auth,
      Ok(None) => return Ok(()),
      Err(err) => {
        self.drop_session();
        return Err(err);
      }
    };

    let session_id = session_id();
    self.set_auth(Some(Auth { steam_id, access_token, session_id }));
    self.emit(SessionEvent::LoggedOn { steam_id });
    self.spawn_poller();
    Ok(())
  }

  async fn disconnect(&self) {
    self.drop_session();
  }

  async fn add_friend(
    &self,
    steam_id: SteamId,
    accept: bool,
  ) -> anyhow::Result<()> {
    let id = steam_id.to_string();
    self
      .community("/actions/AddFriendAjax", &friend_request(&id, accept))
      .await?;
    self.emit(SessionEvent::FriendState {
      steam_id,
      relationship: Relationship::Friend,
    });
    Ok(())
  }

  async fn remove_friend(&self, steam_id: SteamId) -> anyhow::Result<()> {
    let id = steam_id.to_string();
    self
      .community("/actions/RemoveFriendAjax", &[("steamid", id.as_str())])
      .await?;
    self.emit(SessionEvent::FriendState {
      steam_id,
      relationship: Relationship::None,
    });
    Ok(())
  }

  async fn set_nickname(
    &self,
    steam_id: SteamId,
    nickname: &str,
  ) -> anyhow::Result<()> {
    self
      .community(&format!("/profiles/{steam_id}/ajaxsetnickname/"), &[(
        "nickname", nickname,
      )])
      .await?;
    self.emit(SessionEvent::NicknameChanged {
      steam_id,
      nickname: Some(nickname.to_string()),
    });
    Ok(())
  }
}
