//! Structured friend nicknames.
//!
//! ```text
//! subscriber := COUNT? "MC" NAME ("-" EXTRA)?
//! special    := NAME "-" EXTRA
//! ```
//!
//! `NAME` never holds a `-`; everything after the first one is `EXTRA`,
//! a free-form tail kept across rewrites. Strings that fit neither shape
//! were set by hand and are preserved.
//!
//! Decoding tries the shape of the tier the friend is expected to hold
//! first, so a special `NAME` starting with `MC` still reads back as
//! special.

use super::Tier;

const MARKER: &str = "MC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nickname {
  Unrecognized(String),
  Subscriber { count: Option<u64>, name: String, extra: String },
  Special { name: String, extra: String },
}

impl Nickname {
  pub fn decode_for(tier: Tier, raw: &str) -> Self {
    let decoded = match tier {
      Tier::Special => Self::special(raw).or_else(|| Self::subscriber(raw)),
      Tier::Subscriber | Tier::None => {
        Self::subscriber(raw).or_else(|| Self::special(raw))
      }
    };
    decoded.unwrap_or_else(|| Self::Unrecognized(raw.to_string()))
  }

  fn subscriber(raw: &str) -> Option<Self> {
    let digits = raw.bytes().take_while(u8::is_ascii_digit).count();
    let (count, rest) = raw.split_at(digits);
    let rest = rest.strip_prefix(MARKER)?;

    let count = match count {
      "" => None,
      count => match count.parse() {
        Ok(count) => Some(count),
        Err(_) => return Some(Self::Unrecognized(raw.to_string())),
      },
    };
    let (name, extra) = rest.split_once('-').unwrap_or((rest, ""));
    Some(Self::Subscriber {
      count,
      name: name.to_string(),
      extra: extra.to_string(),
    })
  }

  fn special(raw: &str) -> Option<Self> {
    match raw.split_once('-') {
      Some((name, extra)) if !name.is_empty() => Some(Self::Special {
        name: name.to_string(),
        extra: extra.to_string(),
      }),
      _ => None,
    }
  }

  pub fn encode(&self) -> String {
    match self {
      Self::Unrecognized(raw) => raw.clone(),
      Self::Subscriber { count: Some(count), name, extra } => {
        format!("{count}{MARKER}{name}-{extra}")
      }
      Self::Subscriber { count: None, name, extra } => {
        format!("{MARKER}{name}-{extra}")
      }
      Self::Special { name, extra } => format!("{name}-{extra}"),
    }
  }

  /// Free-form tail, `None` for hand-set nicknames.
  pub fn into_extra(self) -> Option<String> {
    match self {
      Self::Unrecognized(_) => None,
      Self::Subscriber { extra, .. } | Self::Special { extra, .. } => {
        Some(extra)
      }
    }
  }
}
