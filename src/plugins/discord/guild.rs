use serenity::{
  all::{GuildId, Http, HttpError, UserId},
  Error as SerenityError,
};

use crate::{prelude::*, tracker::Guild};

/// The tracked guild, reached over the REST api.
pub struct DiscordGuild {
  http: Arc<Http>,
  guild_id: GuildId,
}

impl DiscordGuild {
  pub fn new(http: Arc<Http>, guild_id: u64) -> Self {
    Self { http, guild_id: GuildId::new(guild_id) }
  }
}

fn user_id(discord_id: &str) -> Result<UserId> {
  discord_id
    .parse::<u64>()
    .ok()
    .filter(|&id| id != 0)
    .map(UserId::new)
    .ok_or_else(|| Error::InvalidArgs(format!("bad discord id `{discord_id}`")))
}

fn is_unknown_member(err: &SerenityError) -> bool {
  matches!(
    err,
    SerenityError::Http(HttpError::UnsuccessfulRequest(resp))
      if resp.status_code.as_u16() == 404
  )
}

#[async_trait]
impl Guild for DiscordGuild {
  async fn member_roles(&self, discord_id: &str) -> Result<Vec<u64>> {
    let user = user_id(discord_id)?;
    match self.http.get_member(self.guild_id, user).await {
      Ok(member) => Ok(member.roles.iter().map(|role| role.get()).collect()),
      // Left the guild, holds no roles
      Err(err) if is_unknown_member(&err) => Ok(Vec::new()),
      Err(err) => Err(err.into()),
    }
  }

  async fn direct_message(&self, discord_id: &str, content: &str) -> Result<()> {
    let channel = user_id(discord_id)?.create_dm_channel(&self.http).await?;
    let limit = utils::DISCORD_MAX_MESSAGE_LENGTH;
    for chunk in utils::chunk_message(content, limit) {
      channel.id.say(&self.http, chunk).await?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_user_ids() {
    assert_eq!(user_id("1234").unwrap(), UserId::new(1234));
    assert!(user_id("0").is_err());
    assert!(user_id("abc").is_err());
  }
}
