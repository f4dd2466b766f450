//! Steam Guard mobile authenticator codes.

use base64::{Engine, prelude::BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::prelude::*;

type HmacSha1 = Hmac<Sha1>;

const ALPHABET: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";
const PERIOD: u64 = 30;
const LEN: usize = 5;

/// Code valid for the 30 second window containing `unix`.
pub fn code(secret: &str, unix: u64) -> Result<String> {
  let key = BASE64_STANDARD.decode(secret.trim()).map_err(|err| {
    Error::Session(format!("invalid steam guard secret: {err}"))
  })?;
  let mut mac = HmacSha1::new_from_slice(&key)
    .map_err(|err| Error::Session(err.to_string()))?;
  mac.update(&(unix / PERIOD).to_be_bytes());
  let hash = mac.finalize().into_bytes();

  let offset = (hash[19] & 0x0f) as usize;
  let mut full = u32::from_be_bytes([
    hash[offset],
    hash[offset + 1],
    hash[offset + 2],
    hash[offset + 3],
  ]) & 0x7fff_ffff;

  let mut out = String::with_capacity(LEN);
  for _ in 0..LEN {
    out.push(ALPHABET[full as usize % ALPHABET.len()] as char);
    full /= ALPHABET.len() as u32;
  }
  Ok(out)
}

pub fn now(secret: &str) -> Result<String> {
  code(secret, Utc::now().timestamp().max(0) as u64)
}
