use chrono::NaiveTime;
use rand::RngCore;

use crate::prelude::*;

/// Maximum message length for Discord messages.
pub const DISCORD_MAX_MESSAGE_LENGTH: usize = 2000;

/// Midnight of the first day of the month containing `now`.
pub fn month_start(now: DateTime) -> DateTime {
  let date = now.date();
  date.with_day(1).unwrap_or(date).and_time(NaiveTime::MIN)
}

pub fn random_hex(bytes: usize) -> String {
  let mut buf = vec![0u8; bytes];
  rand::thread_rng().fill_bytes(&mut buf);
  hex::encode(buf)
}

/// Splits a long message into chunks that fit within Discord's limit.
/// Attempts to split at newline boundaries to preserve formatting.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
  let max_len = if max_len == 0 { DISCORD_MAX_MESSAGE_LENGTH } else { max_len };

  if text.len() <= max_len {
    return vec![text.to_string()];
  }

  let mut chunks = Vec::new();
  let mut current = String::new();

  for line in text.lines() {
    if !current.is_empty() && current.len() + line.len() + 1 > max_len {
      chunks.push(std::mem::take(&mut current));
    }

    if line.len() > max_len {
      if !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
      }
      let mut remaining = line;
      while remaining.len() > max_len {
        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
          cut -= 1;
        }
        if cut == 0 {
          cut = remaining.chars().next().map_or(1, char::len_utf8);
        }
        chunks.push(remaining[..cut].to_string());
        remaining = &remaining[cut..];
      }
      current = remaining.to_string();
    } else {
      if !current.is_empty() {
        current.push('\n');
      }
      current.push_str(line);
    }
  }

  if !current.is_empty() {
    chunks.push(current);
  }

  chunks
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn month_start_is_first_midnight() {
    let now = NaiveDate::from_ymd_opt(2026, 10, 17)
      .unwrap()
      .and_hms_opt(13, 45, 0)
      .unwrap();
    let start = NaiveDate::from_ymd_opt(2026, 10, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    assert_eq!(month_start(now), start);
  }

  #[test]
  fn short_message_is_one_chunk() {
    assert_eq!(chunk_message("a\nb", 0), vec!["a\nb"]);
  }

  #[test]
  fn splits_on_lines() {
    let chunks = chunk_message("aaaa\nbbbb\ncccc", 9);
    assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
  }

  #[test]
  fn splits_long_lines() {
    let chunks = chunk_message(&"x".repeat(25), 10);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.len() <= 10));
  }

  #[test]
  fn random_hex_length() {
    assert_eq!(random_hex(16).len(), 32);
  }
}
