//! Signed `state` cookie binding an authorization request to its callback.

use axum::http::{HeaderMap, header::COOKIE};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{config::OAuth, prelude::*};

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "discord_csrf";
pub const LIFETIME: Duration = Duration::from_secs(5 * 60);

fn signature(secret: &str, payload: &str) -> Option<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
  mac.update(payload.as_bytes());
  Some(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// `state.expires.signature`, expiring `LIFETIME` after `now`.
pub fn sign(secret: &str, state: &str, now: i64) -> Option<String> {
  let payload = format!("{state}.{}", now + LIFETIME.as_secs() as i64);
  let sig = signature(secret, &payload)?;
  Some(format!("{payload}.{sig}"))
}

/// Returns the state carried by a cookie that is intact and not expired.
pub fn verify(secret: &str, cookie: &str, now: i64) -> Option<String> {
  let (payload, sig) = cookie.rsplit_once('.')?;
  let (state, expires) = payload.split_once('.')?;
  let expires: i64 = expires.parse().ok()?;

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
  mac.update(payload.as_bytes());
  mac.verify_slice(&URL_SAFE_NO_PAD.decode(sig).ok()?).ok()?;

  (now < expires && !state.is_empty()).then(|| state.to_string())
}

fn attributes(oauth: &OAuth) -> String {
  let mut attrs = String::from("Path=/; HttpOnly; SameSite=Lax");
  if oauth.cookie_secure {
    attrs.push_str("; Secure");
  }
  if let Some(domain) = &oauth.cookie_domain {
    attrs.push_str(&format!("; Domain={domain}"));
  }
  attrs
}

pub fn set_cookie(oauth: &OAuth, value: &str) -> String {
  format!(
    "{COOKIE_NAME}={value}; {}; Max-Age={}",
    attributes(oauth),
    LIFETIME.as_secs()
  )
}

pub fn clear_cookie(oauth: &OAuth) -> String {
  format!("{COOKIE_NAME}=; {}; Max-Age=0", attributes(oauth))
}

pub fn extract(headers: &HeaderMap) -> Option<String> {
  headers
    .get_all(COOKIE)
    .iter()
    .filter_map(|raw| raw.to_str().ok())
    .flat_map(|raw| raw.split(';'))
    .filter_map(|part| part.trim().split_once('='))
    .find(|(key, _)| key.trim() == COOKIE_NAME)
    .map(|(_, value)| value.trim().to_string())
    .filter(|value| !value.is_empty())
}
