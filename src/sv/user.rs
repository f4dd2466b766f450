use std::fmt;

use sea_orm::{ActiveValue::NotSet, QueryOrder, sea_query::Expr};

use crate::{
  entity::{participant, user},
  prelude::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
  pub id: String,
  pub name: String,
}

/// Identity gathered from one completed authorization.
#[derive(Debug, Clone)]
pub struct Pairing {
  pub discord_id: String,
  pub discord_name: String,
  pub steam: Option<Connection>,
  pub twitch: Option<Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
  Steam,
  Twitch,
}

impl fmt::Display for Service {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Service::Steam => "steam",
      Service::Twitch => "twitch",
    })
  }
}

/// Account taken away from a previous holder during linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpaired {
  pub discord_id: String,
  pub service: Service,
}

#[derive(Debug, Clone)]
pub struct Linked {
  pub user: user::Model,
  pub previous_steam: Option<String>,
  pub unpaired: Vec<Unpaired>,
}

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn by_discord(
    &self,
    discord_id: &str,
  ) -> Result<Option<user::Model>> {
    let user = user::Entity::find()
      .filter(user::Column::DiscordId.eq(discord_id))
      .one(self.db)
      .await?;
    Ok(user)
  }

  pub async fn by_steam(&self, steam_id: &str) -> Result<Option<user::Model>> {
    let user = user::Entity::find()
      .filter(user::Column::SteamId.eq(steam_id))
      .one(self.db)
      .await?;
    Ok(user)
  }

  pub async fn by_steam_ids(
    &self,
    steam_ids: &[String],
  ) -> Result<Vec<user::Model>> {
    if steam_ids.is_empty() {
      return Ok(Vec::new());
    }
    let users = user::Entity::find()
      .filter(user::Column::SteamId.is_in(steam_ids.iter().cloned()))
      .all(self.db)
      .await?;
    Ok(users)
  }

  /// Users with a Steam account, oldest first.
  pub async fn linked(&self) -> Result<Vec<user::Model>> {
    let users = user::Entity::find()
      .filter(user::Column::SteamId.is_not_null())
      .order_by_asc(user::Column::Id)
      .all(self.db)
      .await?;
    Ok(users)
  }

  #[cfg(test)]
  pub async fn count(&self) -> Result<u64> {
    Ok(user::Entity::find().count(self.db).await?)
  }

  /// Stores a pairing in one transaction.
  ///
  /// Steam and Twitch accounts are unique across users, so any other
  /// holder loses them first. Unlinked match rows of the Steam account
  /// are attributed to the user.
  pub async fn link(&self, pairing: &Pairing) -> Result<Linked> {
    let txn = self.db.begin().await?;
    let mut unpaired = Vec::new();

    if let Some(steam) = &pairing.steam {
      let holders = user::Entity::find()
        .filter(user::Column::SteamId.eq(&steam.id))
        .filter(user::Column::DiscordId.ne(&pairing.discord_id))
        .all(&txn)
        .await?;
      for holder in holders {
        unpaired.push(Unpaired {
          discord_id: holder.discord_id.clone(),
          service: Service::Steam,
        });
        user::ActiveModel {
          steam_id: Set(None),
          steam_name: Set(None),
          ..holder.into()
        }
        .update(&txn)
        .await?;
      }
    }

    if let Some(twitch) = &pairing.twitch {
      let holders = user::Entity::find()
        .filter(user::Column::TwitchId.eq(&twitch.id))
        .filter(user::Column::DiscordId.ne(&pairing.discord_id))
        .all(&txn)
        .await?;
      for holder in holders {
        unpaired.push(Unpaired {
          discord_id: holder.discord_id.clone(),
          service: Service::Twitch,
        });
        user::ActiveModel {
          twitch_id: Set(None),
          twitch_name: Set(None),
          ..holder.into()
        }
        .update(&txn)
        .await?;
      }
    }

    let steam_id = pairing.steam.as_ref().map(|c| c.id.clone());
    let steam_name = pairing.steam.as_ref().map(|c| c.name.clone());
    let twitch_id = pairing.twitch.as_ref().map(|c| c.id.clone());
    let twitch_name = pairing.twitch.as_ref().map(|c| c.name.clone());

    let existing = user::Entity::find()
      .filter(user::Column::DiscordId.eq(&pairing.discord_id))
      .one(&txn)
      .await?;
    let previous_steam = existing.as_ref().and_then(|u| u.steam_id.clone());

    let user = match existing {
      Some(user) => {
        user::ActiveModel {
          discord_name: Set(pairing.discord_name.clone()),
          steam_id: Set(steam_id.clone()),
          steam_name: Set(steam_name),
          twitch_id: Set(twitch_id),
          twitch_name: Set(twitch_name),
          ..user.into()
        }
        .update(&txn)
        .await?
      }
      None => {
        user::ActiveModel {
          id: NotSet,
          discord_id: Set(pairing.discord_id.clone()),
          discord_name: Set(pairing.discord_name.clone()),
          steam_id: Set(steam_id.clone()),
          steam_name: Set(steam_name),
          twitch_id: Set(twitch_id),
          twitch_name: Set(twitch_name),
          points: Set(0),
          created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&txn)
        .await?
      }
    };

    if let Some(steam_id) = &steam_id {
      participant::Entity::update_many()
        .col_expr(participant::Column::UserId, Expr::value(user.id))
        .filter(participant::Column::SteamId.eq(steam_id))
        .filter(participant::Column::UserId.is_null())
        .exec(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(Linked { user, previous_steam, unpaired })
  }
}
