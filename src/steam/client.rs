use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

use super::{Account, Action, Readiness, Relationship, SessionEvent, SteamId};
use crate::prelude::*;

/// Relationship transition observed on one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
  pub account: Account,
  pub steam_id: SteamId,
  pub relationship: Relationship,
}

/// Local view of one account's friend list.
///
/// Reads are snapshots. Mutations are queued to the session driver and
/// become visible only once the transport reports them back.
#[derive(Debug)]
pub struct FriendClient {
  account: Account,
  steam_id: AtomicU64,
  relationships: DashMap<SteamId, Relationship>,
  nicknames: DashMap<SteamId, String>,
  friends_loaded: AtomicBool,
  nicknames_loaded: AtomicBool,
  ready: Readiness,
  locks: DashMap<SteamId, Arc<Mutex<()>>>,
  outbox: mpsc::UnboundedSender<Action>,
}

impl FriendClient {
  pub fn new(account: Account) -> (Arc<Self>, mpsc::UnboundedReceiver<Action>) {
    let (outbox, rx) = mpsc::unbounded_channel();
    let client = Self {
      account,
      steam_id: AtomicU64::new(0),
      relationships: DashMap::new(),
      nicknames: DashMap::new(),
      friends_loaded: AtomicBool::new(false),
      nicknames_loaded: AtomicBool::new(false),
      ready: Readiness::new(),
      locks: DashMap::new(),
      outbox,
    };
    (Arc::new(client), rx)
  }

  pub fn account(&self) -> Account {
    self.account
  }

  /// Id of the logged on account, if it ever logged on.
  pub fn steam_id(&self) -> Option<SteamId> {
    match self.steam_id.load(Ordering::Acquire) {
      0 => None,
      id => Some(SteamId::new(id)),
    }
  }

  pub fn ready(&self) -> &Readiness {
    &self.ready
  }

  #[cfg(test)]
  pub fn friends(&self) -> HashMap<SteamId, Relationship> {
    self.relationships.iter().map(|e| (*e.key(), *e.value())).collect()
  }

  pub fn relationship(&self, steam_id: SteamId) -> Option<Relationship> {
    self.relationships.get(&steam_id).map(|r| *r)
  }

  pub fn nickname(&self, steam_id: SteamId) -> Option<String> {
    self.nicknames.get(&steam_id).map(|n| n.clone())
  }

  pub fn add_friend(&self, steam_id: SteamId) {
    self.send(Action::Add(steam_id));
  }

  pub fn remove_friend(&self, steam_id: SteamId) {
    self.send(Action::Remove(steam_id));
  }

  pub fn rename_friend(&self, steam_id: SteamId, nickname: String) {
    self.send(Action::Rename(steam_id, nickname));
  }

  /// Serializes read-modify-write work on one friend.
  pub async fn lock(&self, steam_id: SteamId) -> OwnedMutexGuard<()> {
    let lock = self.locks.entry(steam_id).or_default().clone();
    lock.lock_owned().await
  }

  fn send(&self, action: Action) {
    if self.outbox.send(action).is_err() {
      warn!("{}: session is gone, dropping friend action", self.account);
    }
  }

  /// Folds a transport event into the local view.
  ///
  /// Only real transitions are returned, so a repeated state is silent.
  pub(crate) fn apply(&self, event: &SessionEvent) -> Vec<Change> {
    let mut changes = Vec::new();

    match event {
      SessionEvent::LoggedOn { steam_id } => {
        self.steam_id.store(steam_id.get(), Ordering::Release);
      }
      SessionEvent::FriendsList { friends, incremental } => {
        if !incremental {
          let listed: HashSet<SteamId> =
            friends.iter().map(|(id, _)| *id).collect();
          let gone: Vec<SteamId> = self
            .relationships
            .iter()
            .map(|e| *e.key())
            .filter(|id| !listed.contains(id))
            .collect();
          for steam_id in gone {
            changes.extend(self.observe(steam_id, Relationship::None));
          }
        }
        for &(steam_id, relationship) in friends {
          changes.extend(self.observe(steam_id, relationship));
        }
        if !incremental {
          self.friends_loaded.store(true, Ordering::Release);
          self.check_ready();
        }
      }
      SessionEvent::FriendState { steam_id, relationship } => {
        changes.extend(self.observe(*steam_id, *relationship));
      }
      SessionEvent::NicknameList(list) => {
        self.nicknames.clear();
        for (steam_id, nickname) in list {
          if !nickname.is_empty() {
            self.nicknames.insert(*steam_id, nickname.clone());
          }
        }
        self.nicknames_loaded.store(true, Ordering::Release);
        self.check_ready();
      }
      SessionEvent::NicknameChanged { steam_id, nickname } => {
        let old = match nickname.as_deref().filter(|n| !n.is_empty()) {
          Some(new) => self.nicknames.insert(*steam_id, new.to_string()),
          None => self.nicknames.remove(steam_id).map(|(_, old)| old),
        };
        debug!(
          "{}: nickname of {steam_id} {:?} -> {:?}",
          self.account, old, nickname
        );
      }
      SessionEvent::Connected
      | SessionEvent::Disconnected
      | SessionEvent::LogOnFailed(_) => {}
    }

    changes
  }

  fn observe(
    &self,
    steam_id: SteamId,
    relationship: Relationship,
  ) -> Option<Change> {
    let previous = match relationship {
      Relationship::None => {
        // Locks still held or awaited stay
        self.locks.remove_if(&steam_id, |_, lock| Arc::strong_count(lock) == 1);
        self.relationships.remove(&steam_id).map(|e| e.1)
      }
      _ => self.relationships.insert(steam_id, relationship),
    };
    if previous.unwrap_or(Relationship::None) == relationship {
      return None;
    }

    info!("{}: {steam_id} -> {relationship:?}", self.account);
    Some(Change { account: self.account, steam_id, relationship })
  }

  fn check_ready(&self) {
    if self.friends_loaded.load(Ordering::Acquire)
      && self.nicknames_loaded.load(Ordering::Acquire)
      && self.ready.open()
    {
      info!("{}: friend list is ready", self.account);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(n: u32) -> SteamId {
    SteamId::from_account_id(n)
  }

  #[test]
  fn snapshot_reports_transitions_once() {
    let (client, _rx) = FriendClient::new(Account::Games);
    let snapshot = SessionEvent::FriendsList {
      friends: vec![
        (id(1), Relationship::Friend),
        (id(2), Relationship::RequestRecipient),
      ],
      incremental: false,
    };

    assert_eq!(client.apply(&snapshot).len(), 2);
    assert!(client.apply(&snapshot).is_empty());

    let changes = client.apply(&SessionEvent::FriendState {
      steam_id: id(2),
      relationship: Relationship::Friend,
    });
    assert_eq!(changes, vec![Change {
      account: Account::Games,
      steam_id: id(2),
      relationship: Relationship::Friend,
    }]);
  }

  #[test]
  fn full_snapshot_drops_missing_friends() {
    let (client, _rx) = FriendClient::new(Account::Main);
    client.apply(&SessionEvent::FriendsList {
      friends: vec![(id(1), Relationship::Friend)],
      incremental: false,
    });

    let changes = client.apply(&SessionEvent::FriendsList {
      friends: vec![],
      incremental: false,
    });
    assert_eq!(changes[0].relationship, Relationship::None);
    assert_eq!(client.relationship(id(1)), None);
  }

  #[test]
  fn incremental_list_keeps_others() {
    let (client, _rx) = FriendClient::new(Account::Main);
    client.apply(&SessionEvent::FriendsList {
      friends: vec![(id(1), Relationship::Friend)],
      incremental: false,
    });
    client.apply(&SessionEvent::FriendsList {
      friends: vec![(id(2), Relationship::RequestRecipient)],
      incremental: true,
    });

    assert_eq!(client.friends().len(), 2);
  }

  #[test]
  fn ready_after_both_snapshots() {
    let (client, _rx) = FriendClient::new(Account::Games);
    client.apply(&SessionEvent::FriendsList {
      friends: vec![],
      incremental: false,
    });
    assert!(!client.ready().is_ready());

    client.apply(&SessionEvent::NicknameList(vec![(
      id(1),
      "MCstreamer".into(),
    )]));
    assert!(client.ready().is_ready());
    assert_eq!(client.nickname(id(1)).as_deref(), Some("MCstreamer"));

    client.apply(&SessionEvent::NicknameChanged {
      steam_id: id(1),
      nickname: None,
    });
    assert_eq!(client.nickname(id(1)), None);
  }

  #[tokio::test]
  async fn removed_friends_release_their_lock() {
    let (client, _rx) = FriendClient::new(Account::Main);
    client.apply(&SessionEvent::FriendsList {
      friends: vec![
        (id(1), Relationship::Friend),
        (id(2), Relationship::Friend),
      ],
      incremental: false,
    });
    drop(client.lock(id(1)).await);
    let held = client.lock(id(2)).await;
    assert_eq!(client.locks.len(), 2);

    client.apply(&SessionEvent::FriendsList {
      friends: vec![],
      incremental: false,
    });
    assert!(!client.locks.contains_key(&id(1)));
    assert!(client.locks.contains_key(&id(2)));

    drop(held);
    client.apply(&SessionEvent::FriendState {
      steam_id: id(2),
      relationship: Relationship::None,
    });
    assert!(client.locks.is_empty());
  }

  #[test]
  fn actions_go_to_outbox() {
    let (client, mut rx) = FriendClient::new(Account::Main);
    client.add_friend(id(3));
    client.rename_friend(id(3), "MCx-".into());

    assert_eq!(rx.try_recv().unwrap(), Action::Add(id(3)));
    assert_eq!(rx.try_recv().unwrap(), Action::Rename(id(3), "MCx-".into()));
    assert!(rx.try_recv().is_err());
  }
}
