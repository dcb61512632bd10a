//! Debounced remote cart writes.
//!
//! [`RemoteSync`] owns a worker task that is the only writer to remote
//! persistence for this session. Callers hand it full cart snapshots:
//!
//! - [`RemoteSync::schedule`] stores the snapshot as the pending write and
//!   restarts the quiet period. Snapshots scheduled within one quiet period
//!   collapse into a single write of the latest one.
//! - [`RemoteSync::cancel_pending`] drops the pending write.
//! - [`RemoteSync::write_now`] drops the pending write and writes
//!   immediately.
//! - [`RemoteSync::flush`] writes the pending snapshot immediately.
//!
//! Commands are processed in the order they were sent and writes are issued
//! one at a time, so a write that is already in flight always completes
//! before a later `write_now` starts.
//!
//! Write failures are logged and reported as `false`; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use cartsync_core::{LineItem, UserId};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::remote::{RemoteCartStore, RemoteError};

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug)]
enum SyncCommand {
    Schedule {
        user_id: UserId,
        items: Vec<LineItem>,
    },
    Cancel,
    WriteNow {
        user_id: UserId,
        items: Vec<LineItem>,
        reply: oneshot::Sender<bool>,
    },
    Flush {
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to the remote sync worker.
///
/// Dropping the handle stops the worker after it writes any pending
/// snapshot.
pub struct RemoteSync {
    commands: mpsc::UnboundedSender<SyncCommand>,
    remote: Arc<dyn RemoteCartStore>,
    quiet_period: Duration,
}

impl RemoteSync {
    /// Spawn the sync worker on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(remote: Arc<dyn RemoteCartStore>, quiet_period: Duration) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = SyncWorker {
            commands: receiver,
            remote: Arc::clone(&remote),
            quiet_period,
            pending: None,
        };
        tokio::spawn(worker.run());

        Self {
            commands,
            remote,
            quiet_period,
        }
    }

    /// The configured quiet period.
    #[must_use]
    pub const fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Schedule a debounced write of `items` for `user_id`.
    pub fn schedule(&self, user_id: UserId, items: Vec<LineItem>) {
        self.send(SyncCommand::Schedule { user_id, items });
    }

    /// Drop the pending write, if any.
    pub fn cancel_pending(&self) {
        self.send(SyncCommand::Cancel);
    }

    /// Drop the pending write and write `items` immediately.
    ///
    /// Returns whether the write succeeded.
    pub async fn write_now(&self, user_id: UserId, items: Vec<LineItem>) -> bool {
        let (reply, result) = oneshot::channel();
        self.send(SyncCommand::WriteNow {
            user_id,
            items,
            reply,
        });
        result.await.unwrap_or(false)
    }

    /// Write the pending snapshot now instead of waiting for the quiet
    /// period to end.
    ///
    /// Returns `true` if there was nothing pending or the write succeeded.
    pub async fn flush(&self) -> bool {
        let (reply, result) = oneshot::channel();
        self.send(SyncCommand::Flush { reply });
        result.await.unwrap_or(false)
    }

    /// Fetch the stored cart for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns the backend's `RemoteError` unchanged; reconciliation decides
    /// how to degrade.
    pub async fn fetch(&self, user_id: &UserId) -> Result<Option<Vec<LineItem>>, RemoteError> {
        self.remote.fetch(user_id).await
    }

    fn send(&self, command: SyncCommand) {
        if self.commands.send(command).is_err() {
            warn!("Cart sync worker is not running, dropping command");
        }
    }
}

struct PendingWrite {
    user_id: UserId,
    items: Vec<LineItem>,
    deadline: Instant,
}

enum Wake {
    Command(Option<SyncCommand>),
    Deadline,
}

struct SyncWorker {
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    remote: Arc<dyn RemoteCartStore>,
    quiet_period: Duration,
    pending: Option<PendingWrite>,
}

impl SyncWorker {
    async fn run(mut self) {
        loop {
            let wake = match self.pending.as_ref().map(|p| p.deadline) {
                Some(deadline) => tokio::select! {
                    biased;
                    command = self.commands.recv() => Wake::Command(command),
                    () = tokio::time::sleep_until(deadline) => Wake::Deadline,
                },
                None => Wake::Command(self.commands.recv().await),
            };

            match wake {
                Wake::Deadline => {
                    self.write_pending().await;
                }
                Wake::Command(Some(command)) => self.handle(command).await,
                Wake::Command(None) => {
                    self.write_pending().await;
                    debug!("Cart sync worker stopped");
                    return;
                }
            }
        }
    }

    async fn handle(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::Schedule { user_id, items } => {
                self.write_other_users_pending(&user_id).await;
                let deadline = Instant::now() + self.quiet_period;
                let replaced = self.pending.replace(PendingWrite {
                    user_id,
                    items,
                    deadline,
                });
                if replaced.is_some() {
                    trace!("Coalesced cart snapshot into pending write");
                }
            }
            SyncCommand::Cancel => {
                if let Some(pending) = self.pending.take() {
                    debug!(user_id = %pending.user_id, "Canceled pending cart write");
                }
            }
            SyncCommand::WriteNow {
                user_id,
                items,
                reply,
            } => {
                self.write_other_users_pending(&user_id).await;
                self.pending = None;
                let ok = self.write(&user_id, &items).await;
                let _ = reply.send(ok);
            }
            SyncCommand::Flush { reply } => {
                let ok = self.write_pending().await;
                let _ = reply.send(ok);
            }
        }
    }

    /// A pending snapshot for a different user is written out before the
    /// next user's write replaces it.
    async fn write_other_users_pending(&mut self, user_id: &UserId) {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| &p.user_id != user_id)
        {
            self.write_pending().await;
        }
    }

    async fn write_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => self.write(&pending.user_id, &pending.items).await,
            None => true,
        }
    }

    async fn write(&self, user_id: &UserId, items: &[LineItem]) -> bool {
        match self.remote.write(user_id, items).await {
            Ok(()) => {
                debug!(user_id = %user_id, items = items.len(), "Wrote cart to remote");
                true
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Remote cart write failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartsync_core::VariantKey;
    use rust_decimal::Decimal;

    use super::*;
    use crate::remote::MemoryRemoteStore;

    fn snapshot(quantity: u32) -> Vec<LineItem> {
        vec![LineItem::new(
            "p1",
            VariantKey::default(),
            quantity,
            Decimal::from(10),
        )]
    }

    fn setup() -> (Arc<MemoryRemoteStore>, RemoteSync) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let sync = RemoteSync::spawn(remote.clone(), DEFAULT_QUIET_PERIOD);
        (remote, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_waits_for_quiet_period() {
        let (remote, sync) = setup();
        let user = UserId::new("u1");

        sync.schedule(user.clone(), snapshot(1));
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(remote.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.writes(), vec![(user, snapshot(1))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_restarts_quiet_period() {
        let (remote, sync) = setup();
        let user = UserId::new("u1");

        for quantity in 1..=5 {
            sync.schedule(user.clone(), snapshot(quantity));
            tokio::time::sleep(Duration::from_millis(600)).await;
        }
        assert_eq!(remote.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(remote.writes(), vec![(user, snapshot(5))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let (remote, sync) = setup();

        sync.schedule(UserId::new("u1"), snapshot(2));
        sync.cancel_pending();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_now_supersedes_pending() {
        let (remote, sync) = setup();
        let user = UserId::new("u1");

        sync.schedule(user.clone(), snapshot(2));
        assert!(sync.write_now(user.clone(), Vec::new()).await);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(remote.writes(), vec![(user.clone(), Vec::new())]);
        assert_eq!(remote.cart(&user), Some(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_immediately() {
        let (remote, sync) = setup();
        let user = UserId::new("u1");

        assert!(sync.flush().await);
        assert_eq!(remote.write_count(), 0);

        sync.schedule(user.clone(), snapshot(3));
        assert!(sync.flush().await);
        assert_eq!(remote.writes(), vec![(user, snapshot(3))]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_reports_false() {
        let (remote, sync) = setup();
        remote.set_fail_writes(true);

        assert!(!sync.write_now(UserId::new("u1"), snapshot(1)).await);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_user_writes_previous_pending() {
        let (remote, sync) = setup();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        sync.schedule(alice.clone(), snapshot(1));
        sync.schedule(bob.clone(), snapshot(2));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            remote.writes(),
            vec![(alice, snapshot(1)), (bob, snapshot(2))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_flushes_pending() {
        let (remote, sync) = setup();
        let user = UserId::new("u1");

        sync.schedule(user.clone(), snapshot(4));
        drop(sync);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(remote.writes(), vec![(user, snapshot(4))]);
    }
}
