use futures::future;

use super::Tracker;
use crate::{
  entity::user,
  prelude::*,
  steam::{Account, SteamId},
  sv::{self, user::Pairing},
};

/// Direct message summarizing what got paired.
pub fn pairing_message(pairing: &Pairing) -> String {
  let mut lines = vec!["Thank you for pairing.".to_string()];
  match &pairing.steam {
    Some(steam) => lines.push(format!(
      "We paired your steam account <https://steamcommunity.com/profiles/{}>",
      steam.id
    )),
    None => lines.push("We could not find a valid steam account.".into()),
  }
  match &pairing.twitch {
    Some(twitch) => {
      lines.push(format!(
        "We paired your twitch account <https://twitch.tv/{}>",
        twitch.name
      ));
      lines.push(
        "If your twitch name is your old account this is not an issue, \
         reconnect your twitch account to discord and pair again."
          .into(),
      );
    }
    None => lines.push("We could not find a valid twitch account.".into()),
  }
  lines.push(
    "If you have several twitch or steam accounts and the wrong one got \
     paired, hide the accounts you do not want paired in your discord \
     connections and pair again using the link."
      .into(),
  );
  lines.join("\n")
}

impl Tracker {
  /// Stores a completed authorization and brings both friend lists in
  /// line with it.
  pub async fn link(&self, pairing: Pairing) -> Result<user::Model> {
    let linked = sv::User::new(&self.db).link(&pairing).await?;

    let notices = linked.unpaired.iter().map(|gone| async move {
      let text = format!("Your {} account has been unpaired.", gone.service);
      if let Err(err) = self.guild.direct_message(&gone.discord_id, &text).await
      {
        error!("Failed to notify {}: {err}", gone.discord_id);
      }
    });
    future::join_all(notices).await;

    let replaced = linked
      .previous_steam
      .as_deref()
      .filter(|prev| Some(*prev) != linked.user.steam_id.as_deref())
      .and_then(|prev| prev.parse::<SteamId>().ok());
    if let Some(old) = replaced {
      for account in Account::ALL {
        let client = self.client(account);
        if client.relationship(old).is_some() {
          info!("{account}: removing {old}, replaced by a new link");
          client.remove_friend(old);
        }
      }
    }

    let text = pairing_message(&pairing);
    if let Err(err) = self.guild.direct_message(&pairing.discord_id, &text).await
    {
      error!("Failed to notify {}: {err}", pairing.discord_id);
    }

    if let Err(err) = self.adjust(&linked.user, &Account::ALL, false).await {
      error!("Failed to adjust {}: {err}", pairing.discord_id);
    }
    Ok(linked.user)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    steam::{Action, Relationship},
    sv::user::Connection,
    testing::{FakeMatches, Harness},
  };

  const S1: SteamId = SteamId::new(76561198000000001);
  const S2: SteamId = SteamId::new(76561198000000002);

  fn pairing(discord_id: &str, steam: SteamId) -> Pairing {
    Pairing {
      discord_id: discord_id.into(),
      discord_name: discord_id.into(),
      steam: Some(Connection { id: steam.to_string(), name: "s".into() }),
      twitch: None,
    }
  }

  fn unpaired(messages: Vec<String>) -> usize {
    messages.iter().filter(|m| m.contains("unpaired")).count()
  }

  #[tokio::test]
  async fn relinking_moves_account_and_notifies_once() {
    let h = Harness::new(vec![], FakeMatches::default()).await;

    h.tracker.link(pairing("a", S1)).await.unwrap();
    let b = h.tracker.link(pairing("b", S1)).await.unwrap();

    assert_eq!(b.steam_id, Some(S1.to_string()));
    let a = sv::User::new(&h.db).by_discord("a").await.unwrap().unwrap();
    assert_eq!(a.steam_id, None);

    assert_eq!(unpaired(h.guild.messages_to("a")), 1);
    assert_eq!(unpaired(h.guild.messages_to("b")), 0);
    assert_eq!(h.guild.messages_to("b").len(), 1);
  }

  #[tokio::test]
  async fn replaced_steam_account_is_unfriended() {
    let mut h = Harness::new(
      vec![(S1, Relationship::Friend)],
      FakeMatches::default(),
    )
    .await;

    h.tracker.link(pairing("a", S1)).await.unwrap();
    Harness::drain(&mut h.main);
    Harness::drain(&mut h.games);

    h.tracker.link(pairing("a", S2)).await.unwrap();

    assert_eq!(Harness::drain(&mut h.main), vec![Action::Remove(S1)]);
    assert_eq!(Harness::drain(&mut h.games), vec![Action::Remove(S1)]);
  }

  #[test]
  fn message_lists_connections() {
    let text = pairing_message(&pairing("a", S1));
    assert!(text.contains(&format!("steamcommunity.com/profiles/{S1}")));
    assert!(text.contains("We could not find a valid twitch account."));
  }
}
