use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc::UnboundedReceiver, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    messaging::port::GatewayPort,
    privacy::{
        queue::{DeleteQueue, QueuedMessage},
        registry::PrivacyRegistry,
    },
    Error, Result,
};

/// Terminal outcome for one dequeued message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Deleted by someone else before the delay ran out.
    AlreadyGone,
    /// The bot lost view/history/manage rights in the channel.
    MissingPermissions,
    /// The author opted out after the message was queued.
    PrivacyDisabled,
    Forbidden,
    TransportFailed,
}

/// The single background consumer of the delete queue.
///
/// Items are handled one at a time: wait `delay`, re-check capabilities and
/// privacy state, then delete. Nothing is retried. The message id is released
/// from the pending set on every outcome.
pub struct DeleteWorker {
    core: Arc<WorkerCore>,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<UnboundedReceiver<QueuedMessage>>,
}

struct WorkerCore {
    gateway: Arc<dyn GatewayPort>,
    registry: Arc<PrivacyRegistry>,
    queue: Arc<DeleteQueue>,
    delay: Duration,
    error_pause: Duration,
}

impl DeleteWorker {
    pub fn new(
        gateway: Arc<dyn GatewayPort>,
        registry: Arc<PrivacyRegistry>,
        queue: Arc<DeleteQueue>,
        delay: Duration,
        error_pause: Duration,
    ) -> Self {
        Self {
            core: Arc::new(WorkerCore {
                gateway,
                registry,
                queue,
                delay,
                error_pause,
            }),
            running: Mutex::new(None),
        }
    }

    /// Spawn the worker task. Returns `Ok(false)` if it is already running.
    pub async fn start(&self) -> Result<bool> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(false);
        }

        let Some(rx) = self.core.queue.take_receiver() else {
            return Err(Error::Config(
                "delete queue is already being consumed".to_string(),
            ));
        };

        let cancel = CancellationToken::new();
        let core = self.core.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { core.run(rx, task_cancel).await });

        *running = Some(Running { cancel, handle });
        Ok(true)
    }

    /// Cancel the worker and wait for it to exit.
    ///
    /// Queued items stay in the queue (their ids stay pending) and are picked
    /// up again by the next `start`. An item interrupted mid-delay is served
    /// first, with a fresh delay.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        match running.handle.await {
            Ok(rx) => self.core.queue.return_receiver(rx),
            Err(e) => warn!("delete worker did not shut down cleanly: {e}"),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

impl WorkerCore {
    async fn run(
        self: Arc<Self>,
        mut rx: UnboundedReceiver<QueuedMessage>,
        cancel: CancellationToken,
    ) -> UnboundedReceiver<QueuedMessage> {
        info!(delay_secs = self.delay.as_secs(), "delete worker started");
        let mut carried = self.queue.take_interrupted();

        loop {
            let item = match carried.take() {
                Some(item) => item,
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(item) => item,
                        None => break,
                    },
                },
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(message_id = %item.message_id, "worker stopped mid-delay, keeping item");
                    self.queue.park_interrupted(item);
                    break;
                }
                _ = sleep(self.delay) => {}
            }

            let res = self.process(&item).await;
            self.queue.release(item.message_id);

            if let Err(e) = res {
                warn!(message_id = %item.message_id, "delete worker error: {e}");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.error_pause) => {}
                }
            }
        }

        info!("delete worker stopped");
        rx
    }

    /// Steps after the delay. `Err` means the item could not even be evaluated.
    async fn process(&self, item: &QueuedMessage) -> Result<DeleteOutcome> {
        let caps = self.gateway.channel_capabilities(item.channel_id).await?;
        if !caps.can_moderate() {
            info!(
                message_id = %item.message_id,
                channel_id = %item.channel_id,
                "missing permissions to delete, dropping"
            );
            return Ok(DeleteOutcome::MissingPermissions);
        }

        if !self
            .registry
            .is_enabled(item.author_id, item.channel_id)
            .await
        {
            info!(
                message_id = %item.message_id,
                user_id = %item.author_id,
                "skipping deletion, user disabled privacy"
            );
            return Ok(DeleteOutcome::PrivacyDisabled);
        }

        let outcome = match self.gateway.delete_message(item.message_ref()).await {
            Ok(()) => {
                let age = chrono::Utc::now().signed_duration_since(item.created_at);
                info!(
                    message_id = %item.message_id,
                    user_id = %item.author_id,
                    channel_id = %item.channel_id,
                    age_secs = age.num_seconds(),
                    "deleted message"
                );
                DeleteOutcome::Deleted
            }
            Err(Error::NotFound(_)) => {
                debug!(message_id = %item.message_id, "message already gone");
                DeleteOutcome::AlreadyGone
            }
            Err(Error::Forbidden(e)) => {
                warn!(message_id = %item.message_id, "forbidden deleting message: {e}");
                DeleteOutcome::Forbidden
            }
            Err(e) => {
                warn!(message_id = %item.message_id, "failed deleting message: {e}");
                DeleteOutcome::TransportFailed
            }
        };
        Ok(outcome)
    }
}
