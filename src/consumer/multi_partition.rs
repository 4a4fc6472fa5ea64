//! Multi-Partition Consumer
//!
//! Structure:
//! - One cursor per partition, all opened before any task starts. If one
//!   open fails, the cursors already opened are closed and the error is
//!   returned. A cancel seen while opening closes them and returns `Ok`.
//! - One task per cursor, all writing to the same bounded channel. Only
//!   intra-partition order holds on the receiving side.
//! - `consume` returns once every partition task has finished. A panicked
//!   task turns the result into an error.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::cluster::driver::{ClusterDriver, PartitionCursor};
use crate::cluster::types::{ConsumedMessage, StartOffset};
use crate::config::ConsumerConfig;
use crate::error::{KconduitError, Result};

// ==========================================
// EVENTS
// ==========================================

/// What arrives on the output channel. Per-partition failures after open are
/// delivered here instead of being returned.
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    Message(ConsumedMessage),
    Error {
        topic: String,
        partition: i32,
        error: KconduitError,
    },
}

pub fn event_channel(config: &ConsumerConfig) -> (mpsc::Sender<ConsumerEvent>, mpsc::Receiver<ConsumerEvent>) {
    mpsc::channel(config.channel_capacity.max(1))
}

// ==========================================
// CONSUMER
// ==========================================

#[derive(Clone)]
pub struct MultiPartitionConsumer {
    driver: Arc<dyn ClusterDriver>,
}

impl MultiPartitionConsumer {
    pub fn new(driver: Arc<dyn ClusterDriver>) -> Self {
        Self { driver }
    }

    pub async fn consume(
        &self,
        topic: &str,
        start: StartOffset,
        output: mpsc::Sender<ConsumerEvent>,
        token: CancellationToken,
    ) -> Result<()> {
        let partitions = self.driver.topic_metadata(topic).await.map_err(|e| match e {
            KconduitError::TopicNotFound(t) => KconduitError::TopicNotFound(t),
            other => KconduitError::PartitionEnumeration { topic: topic.to_string(), reason: other.to_string() },
        })?;
        if partitions.is_empty() {
            return Err(KconduitError::PartitionEnumeration {
                topic: topic.to_string(),
                reason: "topic has no partitions".to_string(),
            });
        }

        // 1. OPEN: all or nothing
        let mut cursors: Vec<Box<dyn PartitionCursor>> = Vec::with_capacity(partitions.len());
        for partition in &partitions {
            if token.is_cancelled() {
                debug!(topic = %topic, opened = cursors.len(), "Cancelled while opening partitions");
                close_all(cursors).await;
                return Ok(());
            }
            match self.driver.open_partition_cursor(topic, partition.id, start).await {
                Ok(cursor) => cursors.push(cursor),
                Err(e) => {
                    warn!(topic = %topic, partition = partition.id, error = %e, "Failed to open partition, tearing down");
                    close_all(cursors).await;
                    return Err(KconduitError::Rpc(format!("failed to consume partition {}: {}", partition.id, e)));
                }
            }
        }

        info!(topic = %topic, partitions = cursors.len(), start = ?start, "Consuming topic");

        // 2. STREAM: one task per partition
        let mut tasks = JoinSet::new();
        for cursor in cursors {
            tasks.spawn(stream_partition(cursor, output.clone(), token.clone()));
        }
        drop(output);

        // 3. JOIN: every task is finished before we return
        join_partitions(topic, tasks).await
    }

    /// Runs `consume` in the background.
    pub fn spawn(
        &self,
        topic: &str,
        start: StartOffset,
        output: mpsc::Sender<ConsumerEvent>,
    ) -> ConsumerHandle {
        let token = CancellationToken::new();
        let consumer = self.clone();
        let topic = topic.to_string();
        let task_token = token.clone();

        let task = tokio::spawn(async move { consumer.consume(&topic, start, output, task_token).await });
        ConsumerHandle { _cancel_on_drop: token.clone().drop_guard(), token, task }
    }
}

/// Dropping the handle cancels the consume.
pub struct ConsumerHandle {
    token: CancellationToken,
    task: JoinHandle<Result<()>>,
    _cancel_on_drop: DropGuard,
}

impl ConsumerHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels and waits for every partition task to release its cursor.
    pub async fn stop(self) -> Result<()> {
        self.token.cancel();
        self.join().await
    }

    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| KconduitError::Rpc(format!("consumer task failed: {}", e)))?
    }
}

// ==========================================
// PARTITION TASK
// ==========================================

async fn stream_partition(
    mut cursor: Box<dyn PartitionCursor>,
    output: mpsc::Sender<ConsumerEvent>,
    token: CancellationToken,
) {
    let topic = cursor.topic().to_string();
    let partition = cursor.partition();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = cursor.next() => next,
        };

        let event = match next {
            None => {
                debug!(topic = %topic, partition, "Partition stream ended");
                break;
            }
            Some(Ok(message)) => ConsumerEvent::Message(message),
            Some(Err(error)) => {
                warn!(topic = %topic, partition, error = %error, "Partition error");
                ConsumerEvent::Error { topic: topic.clone(), partition, error }
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = output.send(event) => {
                if sent.is_err() {
                    debug!(topic = %topic, partition, "Receiver dropped");
                    break;
                }
            }
        }
    }

    close_cursor(cursor).await;
}

/// A panicked task is reported after the others have finished.
async fn join_partitions(topic: &str, mut tasks: JoinSet<()>) -> Result<()> {
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(topic = %topic, error = %e, "Partition task panicked");
            failure.get_or_insert_with(|| KconduitError::Rpc(format!("partition task failed: {}", e)));
        }
    }

    debug!(topic = %topic, "All partition tasks finished");
    failure.map_or(Ok(()), Err)
}

async fn close_all(cursors: Vec<Box<dyn PartitionCursor>>) {
    for cursor in cursors {
        close_cursor(cursor).await;
    }
}

async fn close_cursor(cursor: Box<dyn PartitionCursor>) {
    let topic = cursor.topic().to_string();
    let partition = cursor.partition();
    if let Err(e) = cursor.close().await {
        warn!(topic = %topic, partition, error = %e, "Failed to close partition cursor");
    }
}
