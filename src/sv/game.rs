use crate::{
  entity::{game, participant},
  prelude::*,
};

pub struct Game<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Game<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Which of the given external match ids are already stored.
  pub async fn known(&self, match_ids: &[String]) -> Result<HashSet<String>> {
    if match_ids.is_empty() {
      return Ok(HashSet::new());
    }
    let games = game::Entity::find()
      .filter(game::Column::MatchId.is_in(match_ids.iter().cloned()))
      .all(self.db)
      .await?;
    Ok(games.into_iter().map(|g| g.match_id).collect())
  }

  /// Matches go first; players are skipped when that batch fails.
  pub async fn insert(
    &self,
    games: Vec<game::Model>,
    players: Vec<participant::Model>,
  ) -> Result<()> {
    if games.is_empty() {
      return Ok(());
    }
    game::Entity::insert_many(
      games.into_iter().map(|g| game::ActiveModel::from(g).reset_all()),
    )
    .exec(self.db)
    .await?;

    if !players.is_empty() {
      participant::Entity::insert_many(
        players
          .into_iter()
          .map(|p| participant::ActiveModel::from(p).reset_all()),
      )
      .exec(self.db)
      .await?;
    }
    Ok(())
  }

  /// Matches the user played since `since`.
  pub async fn count_since(
    &self,
    user_id: i64,
    since: DateTime,
  ) -> Result<u64> {
    let count = participant::Entity::find()
      .filter(participant::Column::UserId.eq(user_id))
      .filter(participant::Column::CreatedAt.gte(since))
      .count(self.db)
      .await?;
    Ok(count)
  }

  #[cfg(test)]
  pub async fn participants(
    &self,
    match_id: &str,
  ) -> Result<Vec<participant::Model>> {
    let players = participant::Entity::find()
      .filter(participant::Column::MatchId.eq(match_id))
      .all(self.db)
      .await?;
    Ok(players)
  }

  #[cfg(test)]
  pub async fn count(&self) -> Result<u64> {
    Ok(game::Entity::find().count(self.db).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    sv::{
      self,
      user::{Connection, Pairing},
    },
    testing::{game, participant, setup_db},
  };

  #[tokio::test]
  async fn counts_only_since_and_only_own() {
    let db = setup_db().await;
    let now = Utc::now().naive_utc();
    let old = now - Duration::from_secs(40 * 24 * 3600);

    let linked = sv::User::new(&db)
      .link(&Pairing {
        discord_id: "1".into(),
        discord_name: "one".into(),
        steam: Some(Connection { id: "100".into(), name: "s".into() }),
        twitch: None,
      })
      .await
      .unwrap();

    let (a, b) = (game("1", now), game("2", old));
    let mut players = vec![
      participant(&a, "100", Some(linked.user.id)),
      participant(&b, "100", Some(linked.user.id)),
      participant(&a, "200", None),
    ];
    players[1].created_at = old;

    let sv = Game::new(&db);
    sv.insert(vec![a, b], players).await.unwrap();

    let since = now - Duration::from_secs(24 * 3600);
    assert_eq!(sv.count_since(linked.user.id, since).await.unwrap(), 1);
    assert_eq!(
      sv.known(&["1".into(), "3".into()]).await.unwrap(),
      HashSet::from(["1".to_string()])
    );
  }

  #[tokio::test]
  async fn linking_backfills_participants() {
    let db = setup_db().await;
    let now = Utc::now().naive_utc();
    let a = game("1", now);
    let players = vec![participant(&a, "100", None)];

    let sv = Game::new(&db);
    sv.insert(vec![a], players).await.unwrap();

    let linked = sv::User::new(&db)
      .link(&Pairing {
        discord_id: "1".into(),
        discord_name: "one".into(),
        steam: Some(Connection { id: "100".into(), name: "s".into() }),
        twitch: None,
      })
      .await
      .unwrap();

    let players = sv.participants("1").await.unwrap();
    assert_eq!(players[0].user_id, Some(linked.user.id));
  }

  #[tokio::test]
  async fn empty_batch_is_noop() {
    let db = setup_db().await;
    Game::new(&db).insert(vec![], vec![]).await.unwrap();
    assert_eq!(Game::new(&db).count().await.unwrap(), 0);
  }
}
