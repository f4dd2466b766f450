use super::{Nickname, Tier};
use crate::{
  entity::user,
  prelude::*,
  steam::{Account, FriendClient, Relationship, SteamId},
  sv,
};

/// Brings one user's entry on one account in line with their tier.
///
/// Pending requests from members with a tier are accepted. Friends get
/// the tier nickname, or are removed once the tier is gone. Hand-set
/// nicknames are left alone unless `force` is set.
pub async fn resync(
  db: &DatabaseConnection,
  client: &FriendClient,
  user: &user::Model,
  tier: Tier,
  force: bool,
) -> Result<()> {
  let account = client.account();
  let Some(steam_id) =
    user.steam_id.as_deref().and_then(|id| id.parse::<SteamId>().ok())
  else {
    return Ok(());
  };

  let _guard = client.lock(steam_id).await;

  match client.relationship(steam_id) {
    Some(Relationship::RequestRecipient) if tier != Tier::None => {
      info!("{account}: accepting friend request from {steam_id}");
      client.add_friend(steam_id);
    }
    Some(Relationship::Friend) => {
      let current = client.nickname(steam_id).unwrap_or_default();
      let extra = if current.is_empty() {
        String::new()
      } else {
        match Nickname::decode_for(tier, &current).into_extra() {
          Some(extra) => extra,
          None if force => String::new(),
          None => {
            warn!(
              "{account}: {steam_id} has a custom nickname {current:?}, skipping"
            );
            return Ok(());
          }
        }
      };

      let name = user.twitch_name.clone().unwrap_or_default();
      let wanted = match tier {
        Tier::None => {
          info!("{account}: removing {steam_id}, no tier anymore");
          client.remove_friend(steam_id);
          return Ok(());
        }
        Tier::Special if name.is_empty() => {
          warn!("{account}: {steam_id} is special but has no twitch name");
          return Ok(());
        }
        Tier::Special => Nickname::Special { name, extra },
        Tier::Subscriber => {
          let count = match account {
            Account::Main => None,
            Account::Games => {
              let since = utils::month_start(Utc::now().naive_utc());
              Some(sv::Game::new(db).count_since(user.id, since).await?)
            }
          };
          Nickname::Subscriber { count, name, extra }
        }
      }
      .encode();

      if wanted != current {
        info!("{account}: renaming {steam_id} {current:?} -> {wanted:?}");
        client.rename_friend(steam_id, wanted);
      }
    }
    _ => {}
  }
  Ok(())
}
