//! Topic message subscriptions
//!
//! A subscription polls the mirror network for new messages starting at a
//! sequence number, reassembles chunked messages and hands each complete
//! message to the callback in sequence order. Retryable mirror errors back
//! off and poll again; anything else is reported and ends the subscription.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::entity::TopicId;
use crate::error::{Error, Result};
use crate::execute::{BackoffPolicy, RetryOverrides};
use crate::status::{Status, StatusClass};
use crate::timestamp::Timestamp;
use crate::transaction_id::TransactionId;
use crate::tx_builder::ChunkInfo;
use crate::wire::{self, Operation, QueryRequest, ResponseEnvelope};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const PAGE_SIZE: usize = 100;
/// Incomplete chunk groups older than this (by initial valid start) are dropped.
const PENDING_CHUNK_WINDOW: Duration = Duration::from_secs(5 * 60);

/// One message chunk as stored by the mirror network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessageChunk {
    pub consensus_timestamp: Timestamp,
    pub sequence_number: u64,
    pub contents: Vec<u8>,
    pub running_hash: Vec<u8>,
    pub transaction_id: TransactionId,
    pub chunk_info: Option<ChunkInfo>,
}

/// A complete message, reassembled from its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Of the last chunk.
    pub consensus_timestamp: Timestamp,
    /// Of the last chunk.
    pub sequence_number: u64,
    pub contents: Vec<u8>,
    pub running_hash: Vec<u8>,
    /// The initial transaction id of the submit.
    pub transaction_id: TransactionId,
    pub chunks: Vec<TopicMessageChunk>,
}

impl TopicMessage {
    fn from_chunks(mut chunks: Vec<TopicMessageChunk>) -> Self {
        chunks.sort_by_key(|c| c.chunk_info.as_ref().map_or(1, |info| info.number));
        let contents = chunks.iter().flat_map(|c| c.contents.iter().copied()).collect();
        let last = chunks
            .iter()
            .max_by_key(|c| c.sequence_number)
            .unwrap_or(&chunks[0]);
        let transaction_id = chunks[0]
            .chunk_info
            .as_ref()
            .map_or_else(|| chunks[0].transaction_id.clone(), |info| info.initial_transaction_id.clone());

        Self {
            consensus_timestamp: last.consensus_timestamp,
            sequence_number: last.sequence_number,
            running_hash: last.running_hash.clone(),
            contents,
            transaction_id,
            chunks,
        }
    }
}

/// Collects chunks until every chunk of a message has arrived.
#[derive(Debug, Default)]
struct Reassembler {
    pending: HashMap<TransactionId, Vec<TopicMessageChunk>>,
}

impl Reassembler {
    fn push(&mut self, chunk: TopicMessageChunk) -> Option<TopicMessage> {
        self.evict_stale(chunk.consensus_timestamp);

        let Some(info) = chunk.chunk_info.clone().filter(|info| info.total > 1) else {
            return Some(TopicMessage::from_chunks(vec![chunk]));
        };

        let chunks = self.pending.entry(info.initial_transaction_id.clone()).or_default();
        chunks.push(chunk);
        if chunks.len() < info.total as usize {
            return None;
        }
        self.pending
            .remove(&info.initial_transaction_id)
            .map(TopicMessage::from_chunks)
    }

    /// Every chunk of a message reaches consensus within its valid duration,
    /// so a group still incomplete after the window never will be.
    fn evict_stale(&mut self, now: Timestamp) {
        let cutoff = now.minus(PENDING_CHUNK_WINDOW);
        let before = self.pending.len();
        self.pending.retain(|initial, _| initial.valid_start >= cutoff);

        let evicted = before - self.pending.len();
        if evicted > 0 {
            warn!(evicted, "Dropped incomplete chunked topic messages");
        }
    }
}

type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Subscribe to the messages of a topic.
#[derive(Clone)]
pub struct TopicMessageQuery {
    topic_id: Option<TopicId>,
    start_sequence_number: u64,
    limit: Option<u64>,
    poll_interval: Duration,
    error_handler: Option<ErrorHandler>,
}

impl fmt::Debug for TopicMessageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicMessageQuery")
            .field("topic_id", &self.topic_id)
            .field("start_sequence_number", &self.start_sequence_number)
            .field("limit", &self.limit)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Default for TopicMessageQuery {
    fn default() -> Self {
        Self {
            topic_id: None,
            start_sequence_number: 1,
            limit: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_handler: None,
        }
    }
}

impl TopicMessageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic_id(mut self, topic_id: TopicId) -> Self {
        self.topic_id = Some(topic_id);
        self
    }

    /// First sequence number to deliver (default 1).
    pub fn start_sequence_number(mut self, sequence_number: u64) -> Self {
        self.start_sequence_number = sequence_number;
        self
    }

    /// Stop after this many complete messages.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// How long to wait before polling again when no new messages arrived.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Called once with the error that ended the subscription.
    pub fn error_handler(mut self, handler: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Start delivering messages to `on_message` on a dedicated task.
    pub fn subscribe<F>(&self, client: &Client, on_message: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(TopicMessage) + Send + 'static,
    {
        let topic_id = self
            .topic_id
            .clone()
            .ok_or_else(|| Error::illegal_state("topic message query needs a topic id"))?;
        let mirror = client
            .mirror_network()
            .first()
            .cloned()
            .ok_or_else(|| Error::illegal_state("client has no mirror network"))?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let subscription = Subscription {
            client: client.clone(),
            cancelled: cancelled.clone(),
            mirror,
            topic_id,
            next_sequence_number: self.start_sequence_number,
            limit: self.limit,
            poll_interval: self.poll_interval,
        };
        let error_handler = self.error_handler.clone();
        let stopped = cancelled.clone();

        let handle = tokio::spawn(async move {
            let topic_id = subscription.topic_id.clone();
            if let Err(err) = subscription.run(on_message).await {
                warn!(topic = %topic_id, error = %err, "Topic subscription ended with error");
                match error_handler {
                    Some(handler) if !stopped.load(Ordering::Acquire) => handler(&err),
                    _ => {}
                }
            }
        });
        Ok(SubscriptionHandle { handle, cancelled })
    }
}

struct Subscription {
    client: Client,
    cancelled: Arc<AtomicBool>,
    mirror: String,
    topic_id: TopicId,
    next_sequence_number: u64,
    limit: Option<u64>,
    poll_interval: Duration,
}

impl Subscription {
    async fn run<F>(mut self, mut on_message: F) -> Result<()>
    where
        F: FnMut(TopicMessage),
    {
        let backoff = BackoffPolicy::from_settings(&self.client.settings(), RetryOverrides::default());
        let mut reassembler = Reassembler::default();
        let mut delivered = 0u64;
        let mut failures = 0u32;

        info!(topic = %self.topic_id, start = self.next_sequence_number, "Topic subscription started");

        while !self.is_cancelled() {
            let page = match self.fetch_page().await {
                Ok(page) => {
                    failures = 0;
                    page
                }
                Err(err) if err.is_retryable() && failures + 1 < backoff.max_attempts => {
                    failures += 1;
                    let delay = backoff.delay(failures);
                    debug!(topic = %self.topic_id, error = %err, ?delay, "Mirror poll failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if page.is_empty() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            for chunk in page {
                if chunk.sequence_number < self.next_sequence_number {
                    continue;
                }
                self.next_sequence_number = chunk.sequence_number + 1;

                if let Some(message) = reassembler.push(chunk) {
                    if self.is_cancelled() {
                        break;
                    }
                    on_message(message);
                    delivered += 1;
                    if self.limit.is_some_and(|limit| delivered >= limit) {
                        info!(topic = %self.topic_id, delivered, "Topic subscription reached its limit");
                        return Ok(());
                    }
                }
            }
        }

        debug!(topic = %self.topic_id, delivered, "Topic subscription cancelled");
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    async fn fetch_page(&self) -> Result<Vec<TopicMessageChunk>> {
        let settings = self.client.settings();
        let request = wire::encode(&QueryRequest::TopicMessages {
            topic_id: self.topic_id.clone(),
            start_sequence_number: self.next_sequence_number,
            limit: PAGE_SIZE,
        })?;

        let call = self.client.transport().call(
            &self.mirror,
            Operation::GetTopicMessages,
            request,
            settings.grpc_deadline,
        );
        let bytes = tokio::time::timeout(settings.grpc_deadline, call)
            .await
            .map_err(|_| crate::node_manager::TransportError::DeadlineExceeded(settings.grpc_deadline))??;

        let envelope: ResponseEnvelope = wire::decode(&bytes)?;
        let status = Status::from_code(envelope.status)?;
        match settings.status_policy.classify(status) {
            StatusClass::Success => wire::decode(&envelope.payload),
            _ => Err(Error::precheck(status, None)),
        }
    }
}

/// Handle to a running subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    handle: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    /// Stop the subscription.
    ///
    /// No callback starts once this returns. A callback already running on
    /// the subscription task finishes first.
    pub fn unsubscribe(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the subscription to end on its own (limit reached or error).
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AccountId;

    fn chunk(seq: u64, number: u32, total: u32, contents: &[u8]) -> TopicMessageChunk {
        let initial = TransactionId::new(AccountId::from_num(1001), Timestamp::new(100, 0));
        TopicMessageChunk {
            consensus_timestamp: Timestamp::new(200, seq as u32),
            sequence_number: seq,
            contents: contents.to_vec(),
            running_hash: vec![seq as u8],
            transaction_id: initial.offset_nanos(u64::from(number - 1)),
            chunk_info: Some(ChunkInfo {
                initial_transaction_id: initial,
                number,
                total,
            }),
        }
    }

    #[test]
    fn test_reassembles_out_of_order_chunks() {
        let mut reassembler = Reassembler::default();
        assert!(reassembler.push(chunk(1, 2, 3, b"lo ")).is_none());
        assert!(reassembler.push(chunk(2, 1, 3, b"hel")).is_none());

        let message = reassembler.push(chunk(3, 3, 3, b"world")).unwrap();
        assert_eq!(message.contents, b"hello world");
        assert_eq!(message.sequence_number, 3);
        assert_eq!(message.running_hash, vec![3]);
        assert_eq!(message.chunks.len(), 3);
        assert!(reassembler.pending.is_empty());
    }

    #[test]
    fn test_single_chunk_passes_through() {
        let mut reassembler = Reassembler::default();
        let message = reassembler.push(chunk(7, 1, 1, b"solo")).unwrap();
        assert_eq!(message.contents, b"solo");
        assert_eq!(message.transaction_id.valid_start, Timestamp::new(100, 0));
    }

    #[test]
    fn test_incomplete_group_is_evicted_after_window() {
        let mut reassembler = Reassembler::default();
        assert!(reassembler.push(chunk(1, 1, 2, b"half")).is_none());
        assert_eq!(reassembler.pending.len(), 1);

        // A later message, well past the first one's valid start.
        let mut late = chunk(9, 1, 1, b"late");
        late.consensus_timestamp = Timestamp::new(100, 0).plus(PENDING_CHUNK_WINDOW + Duration::from_secs(1));
        let message = reassembler.push(late).unwrap();
        assert_eq!(message.contents, b"late");
        assert!(reassembler.pending.is_empty());
    }
}
