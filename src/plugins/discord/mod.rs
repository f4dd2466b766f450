mod command;
mod guild;

pub use guild::DiscordGuild;
use serenity::all::{
  Client, Context as Ctx, EventHandler, GatewayIntents, Message, Ready,
};

use self::command::{Command, MemberName};
use crate::{prelude::*, state::AppState};

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    info!("Starting Discord bot...");

    let intents = GatewayIntents::GUILDS
      | GatewayIntents::GUILD_MEMBERS
      | GatewayIntents::GUILD_MESSAGES
      | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&app.config.discord.token, intents)
      .event_handler(Handler { app: app.clone() })
      .await
      .context("Failed to build discord client")?;
    let shards = client.shard_manager.clone();

    tokio::select! {
      result = client.start() => result.context("Discord client error"),
      _ = app.shutdown.cancelled() => {
        shards.shutdown_all().await;
        Ok(())
      }
    }
  }
}

struct Handler {
  app: Arc<AppState>,
}

impl Handler {
  fn is_admin(&self, ctx: &Ctx, msg: &Message) -> bool {
    let admin_roles = &self.app.config.discord.admin_roles;
    let roles =
      msg.member.as_ref().map(|m| m.roles.clone()).unwrap_or_default();
    if roles.iter().any(|role| admin_roles.contains(&role.get())) {
      return true;
    }

    let Some(guild_id) = msg.guild_id else {
      return false;
    };
    let Some(guild) = ctx.cache.guild(guild_id) else {
      return false;
    };
    guild.owner_id == msg.author.id
      || roles
        .iter()
        .chain([&guild_id.everyone_role()])
        .filter_map(|id| guild.roles.get(id))
        .any(|role| role.permissions.administrator())
  }

  fn resolve_member(
    &self,
    ctx: &Ctx,
    msg: &Message,
    search: &str,
  ) -> Option<u64> {
    if let Some(user) = msg.mentions.first() {
      return Some(user.id.get());
    }
    let members: Vec<MemberName> = msg
      .guild_id
      .and_then(|id| ctx.cache.guild(id))
      .map(|guild| {
        guild
          .members
          .values()
          .map(|m| MemberName {
            id: m.user.id.get(),
            username: m.user.name.clone(),
            nick: m.nick.clone(),
          })
          .collect()
      })
      .unwrap_or_default();

    command::find_member(&members, search).or_else(|| search.parse().ok())
  }

  async fn execute(&self, ctx: &Ctx, msg: &Message, cmd: Command) -> String {
    let tracker = &self.app.tracker;
    match cmd {
      Command::Query(ids) => match tracker.ingest(&ids).await {
        Ok(ingested) => command::queried(&ingested),
        Err(err) => {
          error!("Failed to query matches {ids:?}: {err}");
          format!("Failed to query matches: {err}")
        }
      },
      Command::ForceNickname(search) => {
        match self.resolve_member(ctx, msg, &search) {
          Some(id) => command::force_nickname(tracker, &id.to_string()).await,
          None => "Couldn't find that user".into(),
        }
      }
      Command::Usage => command::usage().into(),
    }
  }
}

#[async_trait]
impl EventHandler for Handler {
  async fn ready(&self, _: Ctx, ready: Ready) {
    info!("Discord bot connected as {}", ready.user.name);
  }

  async fn message(&self, ctx: Ctx, msg: Message) {
    if msg.author.bot {
      return;
    }
    let guild_id = self.app.config.discord.guild_id;
    if msg.guild_id.map(|id| id.get()) != Some(guild_id) {
      return;
    }
    let Some(cmd) = Command::parse(&msg.content) else {
      return;
    };
    if !self.is_admin(&ctx, &msg) {
      debug!("Ignoring {cmd:?} from {}", msg.author.id);
      return;
    }

    info!("Command {cmd:?} from {}", msg.author.id);
    let reply = self.execute(&ctx, &msg, cmd).await;
    for chunk in utils::chunk_message(&reply, 0) {
      if let Err(err) = msg.channel_id.say(&ctx.http, chunk).await {
        error!("Failed to reply to {}: {err}", msg.author.id);
        break;
      }
    }
  }
}
