use tokio::sync::watch;

use crate::prelude::*;

/// One-shot gate, opened once the first friend and nickname snapshots
/// are in. Stays open for the lifetime of the client.
#[derive(Debug)]
pub struct Readiness {
  tx: watch::Sender<bool>,
}

impl Readiness {
  pub fn new() -> Self {
    let (tx, _) = watch::channel(false);
    Self { tx }
  }

  /// Returns `true` only for the call that opened the gate.
  pub fn open(&self) -> bool {
    self.tx.send_if_modified(|ready| !std::mem::replace(ready, true))
  }

  #[cfg(test)]
  pub fn is_ready(&self) -> bool {
    *self.tx.borrow()
  }

  pub async fn wait(&self) {
    let mut rx = self.tx.subscribe();
    let _ = rx.wait_for(|ready| *ready).await;
  }

  /// Waits at most `timeout`, reporting whether the gate opened.
  pub async fn wait_timeout(&self, timeout: Duration) -> bool {
    time::timeout(timeout, self.wait()).await.is_ok()
  }
}
