use std::collections::VecDeque;

use tokio::{sync::mpsc, time::Instant};

use super::{
  Account, Action, Change, Credentials, FriendClient, LogOn, Relationship,
  SessionEvent, Transport, totp,
};
use crate::prelude::*;

const RECONNECT_PROBE: Duration = Duration::from_secs(10);
const MAX_CONNECT_FAILURES: u32 = 10;

/// Trips when log-ons come too close together, which means the session
/// keeps getting kicked right after logging on.
#[derive(Debug)]
pub struct LogOnWindow {
  window: Duration,
  limit: usize,
  stamps: VecDeque<Instant>,
}

impl Default for LogOnWindow {
  fn default() -> Self {
    Self::new(Duration::from_secs(30), 5)
  }
}

impl LogOnWindow {
  pub fn new(window: Duration, limit: usize) -> Self {
    Self { window, limit, stamps: VecDeque::with_capacity(limit) }
  }

  /// Records a log-on and reports whether the limit is now reached.
  pub fn record(&mut self, now: Instant) -> bool {
    while self
      .stamps
      .front()
      .is_some_and(|&at| now.duration_since(at) > self.window)
    {
      self.stamps.pop_front();
    }
    self.stamps.push_back(now);
    self.stamps.len() >= self.limit
  }
}

/// Drives one transport and keeps its [`FriendClient`] current.
pub struct Session<T> {
  client: Arc<FriendClient>,
  transport: Arc<T>,
  credentials: Credentials,
  events: mpsc::UnboundedReceiver<SessionEvent>,
  outbox: mpsc::UnboundedReceiver<Action>,
  changes: mpsc::UnboundedSender<Change>,
  logons: LogOnWindow,
  failures: u32,
}

impl<T: Transport> Session<T> {
  pub fn new(
    account: Account,
    transport: Arc<T>,
    credentials: Credentials,
    events: mpsc::UnboundedReceiver<SessionEvent>,
  ) -> (Arc<FriendClient>, Self, mpsc::UnboundedReceiver<Change>) {
    let (client, outbox) = FriendClient::new(account);
    let (changes, changes_rx) = mpsc::unbounded_channel();
    let session = Self {
      client: client.clone(),
      transport,
      credentials,
      events,
      outbox,
      changes,
      logons: LogOnWindow::default(),
      failures: 0,
    };
    (client, session, changes_rx)
  }

  fn account(&self) -> Account {
    self.client.account()
  }

  /// Runs until shutdown or a fatal session failure.
  pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
    info!("{}: connecting", self.account());
    self.connect().await?;

    let mut probe = time::interval(RECONNECT_PROBE);
    probe.tick().await;

    loop {
      tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
          if self.transport.is_connected() {
            self.transport.disconnect().await;
          }
          info!("{}: session closed", self.account());
          return Ok(());
        }
        Some(event) = self.events.recv() => self.handle(event).await?,
        Some(action) = self.outbox.recv() => self.dispatch(action),
        _ = probe.tick() => {
          if !self.transport.is_connected() {
            self.connect().await?;
          }
        }
      }
    }
  }

  async fn connect(&mut self) -> Result<()> {
    match self.transport.connect().await {
      Ok(()) => Ok(()),
      Err(err) => self.failed("connect", err),
    }
  }

  /// Counts a connect or log-on attempt that did not end up logged on.
  fn failed(&mut self, stage: &str, err: anyhow::Error) -> Result<()> {
    self.failures += 1;
    error!(
      "{}: {stage} failed ({}/{MAX_CONNECT_FAILURES}): {err:#}",
      self.account(),
      self.failures
    );
    if self.failures >= MAX_CONNECT_FAILURES {
      return Err(Error::Session(format!(
        "{} could not reconnect",
        self.account()
      )));
    }
    Ok(())
  }

  async fn handle(&mut self, event: SessionEvent) -> Result<()> {
    let account = self.account();

    match event {
      SessionEvent::Connected => {
        info!("{account}: connected, logging on");
        let code = match &self.credentials.totp_secret {
          Some(secret) => Some(totp::now(secret)?),
          None => None,
        };
        let details = LogOn {
          username: self.credentials.username.clone(),
          password: self.credentials.password.clone(),
          code,
        };
        if let Err(err) = self.transport.log_on(details).await {
          self.failed("log on", err)?;
        }
      }
      SessionEvent::LoggedOn { .. } => {
        self.failures = 0;
        self.client.apply(&event);
        if self.logons.record(Instant::now()) {
          return Err(Error::Session(format!(
            "{account} keeps getting disconnected right after log on"
          )));
        }
        info!("{account}: logged on");
        if let Err(err) = self.transport.announce_presence().await {
          warn!("{account}: failed to announce presence: {err:#}");
        }
      }
      SessionEvent::LogOnFailed(reason) => {
        return Err(Error::Session(format!(
          "{account} log on failed: {reason}"
        )));
      }
      SessionEvent::Disconnected => {
        warn!("{account}: disconnected");
      }
      event => {
        for change in self.client.apply(&event) {
          let _ = self.changes.send(change);
        }
      }
    }
    Ok(())
  }

  fn dispatch(&self, action: Action) {
    let account = self.account();
    let transport = self.transport.clone();
    let accept = matches!(
      action,
      Action::Add(steam_id)
        if self.client.relationship(steam_id)
          == Some(Relationship::RequestRecipient)
    );

    tokio::spawn(async move {
      let result = match &action {
        Action::Add(steam_id) => transport.add_friend(*steam_id, accept).await,
        Action::Remove(steam_id) => transport.remove_friend(*steam_id).await,
        Action::Rename(steam_id, nickname) => {
          transport.set_nickname(*steam_id, nickname).await
        }
      };
      match result {
        Ok(()) => debug!("{account}: sent {action:?}"),
        Err(err) => error!("{account}: {action:?} failed: {err:#}"),
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  };

  use super::*;
  use crate::steam::SteamId;

  #[test]
  fn window_trips_on_fifth_logon() {
    let mut window = LogOnWindow::default();
    let start = Instant::now();

    for i in 0..4 {
      assert!(!window.record(start + Duration::from_secs(i)));
    }
    assert!(window.record(start + Duration::from_secs(4)));
  }

  #[test]
  fn window_forgets_old_logons() {
    let mut window = LogOnWindow::default();
    let start = Instant::now();

    for i in 0..4 {
      window.record(start + Duration::from_secs(i * 20));
    }
    assert!(!window.record(start + Duration::from_secs(80)));
  }

  fn credentials() -> Credentials {
    Credentials {
      username: "bot".into(),
      password: "hunter2".into(),
      totp_secret: Some("MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into()),
    }
  }

  struct Fake {
    connected: AtomicBool,
    events: mpsc::UnboundedSender<SessionEvent>,
    reject: bool,
    sent: Mutex<Vec<Action>>,
    accepted: Mutex<Vec<SteamId>>,
  }

  impl Fake {
    fn emit(&self, event: SessionEvent) {
      let _ = self.events.send(event);
    }
  }

  #[async_trait]
  impl Transport for Fake {
    fn is_connected(&self) -> bool {
      self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> anyhow::Result<()> {
      self.connected.store(true, Ordering::SeqCst);
      self.emit(SessionEvent::Connected);
      Ok(())
    }

    async fn log_on(&self, details: LogOn) -> anyhow::Result<()> {
      if self.reject {
        self.emit(SessionEvent::LogOnFailed("InvalidPassword".into()));
        return Ok(());
      }
      assert_eq!(details.username, "bot");
      self.emit(SessionEvent::LoggedOn { steam_id: SteamId::new(7) });
      self.emit(SessionEvent::FriendsList {
        friends: vec![(SteamId::new(9), Relationship::RequestRecipient)],
        incremental: false,
      });
      self.emit(SessionEvent::NicknameList(vec![]));
      Ok(())
    }

    async fn disconnect(&self) {
      self.connected.store(false, Ordering::SeqCst);
    }

    async fn add_friend(
      &self,
      steam_id: SteamId,
      accept: bool,
    ) -> anyhow::Result<()> {
      if accept {
        self.accepted.lock().unwrap().push(steam_id);
      }
      self.sent.lock().unwrap().push(Action::Add(steam_id));
      Ok(())
    }

    async fn remove_friend(&self, steam_id: SteamId) -> anyhow::Result<()> {
      self.sent.lock().unwrap().push(Action::Remove(steam_id));
      Ok(())
    }

    async fn set_nickname(
      &self,
      steam_id: SteamId,
      nickname: &str,
    ) -> anyhow::Result<()> {
      self.sent.lock().unwrap().push(Action::Rename(steam_id, nickname.into()));
      Ok(())
    }
  }

  fn session(
    reject: bool,
  ) -> (
    Arc<Fake>,
    Arc<FriendClient>,
    Session<Fake>,
    mpsc::UnboundedReceiver<Change>,
  ) {
    let (tx, rx) = mpsc::unbounded_channel();
    let fake = Arc::new(Fake {
      connected: AtomicBool::new(false),
      events: tx,
      reject,
      sent: Mutex::new(vec![]),
      accepted: Mutex::new(vec![]),
    });
    let (client, session, changes) =
      Session::new(Account::Games, fake.clone(), credentials(), rx);
    (fake, client, session, changes)
  }

  async fn wait_sent(fake: &Fake, count: usize) {
    for _ in 0..50 {
      if fake.sent.lock().unwrap().len() >= count {
        return;
      }
      time::sleep(Duration::from_millis(10)).await;
    }
  }

  #[tokio::test]
  async fn logs_on_and_loads_friends() {
    let (fake, client, session, mut changes) = session(false);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(session.run(shutdown.clone()));

    assert!(client.ready().wait_timeout(Duration::from_secs(5)).await);
    assert_eq!(client.steam_id(), Some(SteamId::new(7)));
    assert_eq!(
      changes.recv().await.unwrap().relationship,
      Relationship::RequestRecipient
    );

    client.add_friend(SteamId::new(9));
    wait_sent(&fake, 1).await;
    assert_eq!(*fake.sent.lock().unwrap(), vec![Action::Add(SteamId::new(9))]);

    shutdown.cancel();
    assert!(task.await.unwrap().is_ok());
    assert!(!fake.is_connected());
  }

  #[tokio::test]
  async fn only_incoming_requests_are_accepted() {
    let (fake, client, session, _changes) = session(false);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(session.run(shutdown.clone()));
    assert!(client.ready().wait_timeout(Duration::from_secs(5)).await);

    client.add_friend(SteamId::new(9));
    wait_sent(&fake, 1).await;
    client.add_friend(SteamId::new(11));
    wait_sent(&fake, 2).await;

    assert_eq!(fake.sent.lock().unwrap().len(), 2);
    assert_eq!(*fake.accepted.lock().unwrap(), vec![SteamId::new(9)]);

    shutdown.cancel();
    assert!(task.await.unwrap().is_ok());
  }

  #[tokio::test]
  async fn rejected_credentials_are_fatal() {
    let (_fake, _client, session, _changes) = session(true);
    let result = session.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::Session(_))));
  }

  #[tokio::test]
  async fn logging_on_clears_failures() {
    let (_fake, _client, mut session, _changes) = session(false);
    session.failures = MAX_CONNECT_FAILURES - 1;

    let logged_on = SessionEvent::LoggedOn { steam_id: SteamId::new(7) };
    session.handle(logged_on).await.unwrap();
    assert_eq!(session.failures, 0);
  }

  /// Never gets as far as a log-on.
  struct Flaky {
    connected: AtomicBool,
    events: mpsc::UnboundedSender<SessionEvent>,
    refuse_connect: bool,
    connects: AtomicUsize,
  }

  #[async_trait]
  impl Transport for Flaky {
    fn is_connected(&self) -> bool {
      self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> anyhow::Result<()> {
      self.connects.fetch_add(1, Ordering::SeqCst);
      if self.refuse_connect {
        anyhow::bail!("connection refused");
      }
      self.connected.store(true, Ordering::SeqCst);
      let _ = self.events.send(SessionEvent::Connected);
      Ok(())
    }

    async fn log_on(&self, _: LogOn) -> anyhow::Result<()> {
      self.connected.store(false, Ordering::SeqCst);
      let _ = self.events.send(SessionEvent::Disconnected);
      anyhow::bail!("429 Too Many Requests")
    }

    async fn disconnect(&self) {
      self.connected.store(false, Ordering::SeqCst);
    }

    async fn add_friend(&self, _: SteamId, _: bool) -> anyhow::Result<()> {
      Ok(())
    }

    async fn remove_friend(&self, _: SteamId) -> anyhow::Result<()> {
      Ok(())
    }

    async fn set_nickname(&self, _: SteamId, _: &str) -> anyhow::Result<()> {
      Ok(())
    }
  }

  async fn run_flaky(refuse_connect: bool) -> (Result<()>, usize) {
    let (tx, rx) = mpsc::unbounded_channel();
    let flaky = Arc::new(Flaky {
      connected: AtomicBool::new(false),
      events: tx,
      refuse_connect,
      connects: AtomicUsize::new(0),
    });
    let (_client, session, _changes) =
      Session::new(Account::Main, flaky.clone(), credentials(), rx);

    let run = session.run(CancellationToken::new());
    let result = time::timeout(Duration::from_secs(3600), run)
      .await
      .expect("session kept retrying");
    (result, flaky.connects.load(Ordering::SeqCst))
  }

  #[tokio::test(start_paused = true)]
  async fn unreachable_transport_gives_up() {
    let (result, connects) = run_flaky(true).await;

    assert!(matches!(result, Err(Error::Session(_))));
    assert_eq!(connects, MAX_CONNECT_FAILURES as usize);
  }

  #[tokio::test(start_paused = true)]
  async fn failing_log_ons_give_up() {
    let (result, connects) = run_flaky(false).await;

    assert!(matches!(result, Err(Error::Session(_))));
    assert_eq!(connects, MAX_CONNECT_FAILURES as usize);
  }
}
