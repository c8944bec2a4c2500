//! Notification queue
//!
//! Mutations collect [`NotificationTask`]s while their unit of work runs and
//! hand them to the [`NotificationQueue`] after commit. Scheduling never
//! blocks: a full or closed queue drops the task with a warning. A
//! [`NotificationWorker`] drains the queue into a [`NotificationSink`].

use keydev_model::{KeyDevId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationEvent {
    QuestionCreated,
    AnswerCreated,
    AnswerUpdated,
}

impl NotificationEvent {
    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationEvent::QuestionCreated => "question_created",
            NotificationEvent::AnswerCreated => "answer_created",
            NotificationEvent::AnswerUpdated => "answer_updated",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification to deliver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTask {
    pub event: NotificationEvent,
    /// Question or answer id
    pub entity_id: String,
    pub key_dev_id: KeyDevId,
    pub recipient: UserId,
}

impl NotificationTask {
    /// Create task
    #[must_use]
    pub fn new(
        event: NotificationEvent,
        entity_id: impl ToString,
        key_dev_id: KeyDevId,
        recipient: UserId,
    ) -> Self {
        Self {
            event,
            entity_id: entity_id.to_string(),
            key_dev_id,
            recipient,
        }
    }
}

/// Delivery failure reported by a sink
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("recipient {0} unreachable")]
    Unreachable(UserId),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Notification delivery channel
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one task
    async fn deliver(&self, task: &NotificationTask) -> Result<(), NotificationError>;
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait::async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, task: &NotificationTask) -> Result<(), NotificationError> {
        tracing::info!(
            event = %task.event,
            entity = %task.entity_id,
            key_dev = %task.key_dev_id,
            recipient = %task.recipient,
            "notification delivered"
        );
        Ok(())
    }
}

/// Non-blocking producer side of the notification queue
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: Option<mpsc::Sender<NotificationTask>>,
}

impl NotificationQueue {
    /// Bounded queue and its receiving end
    ///
    /// `capacity` must be non-zero; configuration validation enforces it.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<NotificationTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { sender: Some(tx) }, rx)
    }

    /// Queue that drops every task
    #[must_use]
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Enqueue one task; returns whether it was accepted
    pub fn schedule(&self, task: NotificationTask) -> bool {
        let Some(sender) = &self.sender else {
            tracing::debug!(event = %task.event, "notifications disabled");
            return false;
        };
        match sender.try_send(task) {
            Ok(()) => true,
            Err(err) => {
                let reason = match &err {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "queue closed",
                };
                let task = err.into_inner();
                tracing::warn!(
                    event = %task.event,
                    entity = %task.entity_id,
                    recipient = %task.recipient,
                    reason,
                    "notification dropped"
                );
                metrics::counter!("keydev_notifications_dropped_total", "reason" => reason)
                    .increment(1);
                false
            }
        }
    }

    /// Enqueue every task; returns how many were accepted
    pub fn schedule_all(&self, tasks: impl IntoIterator<Item = NotificationTask>) -> usize {
        tasks
            .into_iter()
            .map(|task| self.schedule(task))
            .filter(|accepted| *accepted)
            .count()
    }
}

/// Background consumer of the notification queue
pub struct NotificationWorker;

impl NotificationWorker {
    /// Drain `rx` into `sink` until every sender is dropped
    ///
    /// The handle resolves to the number of successful deliveries.
    #[must_use]
    pub fn spawn(
        mut rx: mpsc::Receiver<NotificationTask>,
        sink: Arc<dyn NotificationSink>,
    ) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut delivered = 0;
            while let Some(task) = rx.recv().await {
                match sink.deliver(&task).await {
                    Ok(()) => delivered += 1,
                    Err(err) => tracing::warn!(
                        event = %task.event,
                        recipient = %task.recipient,
                        error = %err,
                        "notification delivery failed"
                    ),
                }
            }
            delivered
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(recipient: &str) -> NotificationTask {
        NotificationTask::new(
            NotificationEvent::AnswerCreated,
            "a1",
            KeyDevId::new(),
            UserId::from(recipient),
        )
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (queue, _rx) = NotificationQueue::bounded(1);
        assert!(queue.schedule(task("a")));
        assert!(!queue.schedule(task("b")));
    }

    #[test]
    fn closed_queue_drops() {
        let (queue, rx) = NotificationQueue::bounded(4);
        drop(rx);
        assert!(!queue.schedule(task("a")));
        assert!(!NotificationQueue::disabled().schedule(task("a")));
    }

    #[tokio::test]
    async fn worker_drains_until_senders_drop() {
        let (queue, rx) = NotificationQueue::bounded(8);
        let handle = NotificationWorker::spawn(rx, Arc::new(TracingSink));
        assert_eq!(queue.schedule_all(vec![task("a"), task("b"), task("c")]), 3);
        drop(queue);
        assert_eq!(handle.await.unwrap(), 3);
    }
}
