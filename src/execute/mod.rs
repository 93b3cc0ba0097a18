//! Multi-node execution engine
//!
//! Every network request (transaction submission, receipt poll, query) runs
//! through `execute`. The loop walks the request's node list from the
//! start, skipping nodes in backoff, and classifies each response:
//!
//! - success returns immediately
//! - node-retryable statuses and retryable transport errors back the node
//!   off and move to the next one; once every node has been tried they
//!   also wait before the next attempt
//! - transient statuses wait with jittered exponential backoff
//! - anything else fails with the node's status
//!
//! The attempt budget and the total timeout both end in `Error::Timeout`.
//! Each network call's deadline is clipped to the remaining time, so the
//! timeout is overshot by at most one in-flight call.

mod retry;

pub use retry::{BackoffPolicy, RetryOverrides};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

use crate::client::Client;
use crate::entity::AccountId;
use crate::error::{Error, Result};
use crate::metrics::{metrics, Timer};
use crate::node_manager::{Node, TransportError};
use crate::observability::TraceContext;
use crate::status::{Status, StatusClass, StatusPolicy};
use crate::structured_logging::ExecutionLogger;
use crate::transaction_id::TransactionId;
use crate::wire::{self, Operation, ResponseEnvelope};

/// A request the engine can drive to completion.
pub(crate) trait Execute: Send + Sync {
    type Output: Send;

    fn operation(&self) -> Operation;

    /// Explicit node list; `None` lets the registry pick.
    fn node_account_ids(&self) -> Option<&[AccountId]>;

    fn transaction_id(&self) -> Option<&TransactionId> {
        None
    }

    fn overrides(&self) -> RetryOverrides {
        RetryOverrides::default()
    }

    /// Trace for this run; a fresh root unless the request continues one.
    fn trace_context(&self) -> TraceContext {
        TraceContext::new(self.operation().as_str())
    }

    /// Encoded request; identical for every node.
    fn make_request(&self) -> Result<Vec<u8>>;

    fn classify(&self, policy: &StatusPolicy, status: Status, _payload: &[u8]) -> StatusClass {
        policy.classify(status)
    }

    fn map_response(&self, node: &AccountId, payload: Vec<u8>) -> Result<Self::Output>;

    fn map_status_error(&self, status: Status, _payload: &[u8]) -> Error {
        Error::precheck(status, self.transaction_id().cloned())
    }
}

enum NodePick {
    Ready(usize),
    /// Every live node is backing off; this one is readmitted first.
    Wait(usize, Duration),
}

fn pick_node(nodes: &[Arc<Node>], cursor: usize) -> Option<NodePick> {
    let len = nodes.len();
    let mut earliest: Option<(usize, Duration)> = None;

    for offset in 0..len {
        let index = (cursor + offset) % len;
        let node = &nodes[index];
        if node.is_dead() {
            continue;
        }
        let remaining = node.remaining_backoff();
        if remaining.is_zero() {
            return Some(NodePick::Ready(index));
        }
        if earliest.map_or(true, |(_, best)| remaining < best) {
            earliest = Some((index, remaining));
        }
    }

    earliest.map(|(index, wait)| NodePick::Wait(index, wait))
}

#[instrument(
    skip_all,
    fields(operation = executable.operation().as_str(), correlation_id = tracing::field::Empty)
)]
pub(crate) async fn execute<E: Execute>(
    client: &Client,
    executable: &E,
    timeout: Option<Duration>,
) -> Result<E::Output> {
    let settings = client.settings();
    let backoff = BackoffPolicy::from_settings(&settings, executable.overrides());
    let timeout = timeout.unwrap_or(settings.request_timeout);
    let operation = executable.operation();

    let logger = ExecutionLogger::new(executable.trace_context());
    tracing::Span::current().record("correlation_id", logger.trace().correlation_id.as_str());
    metrics().executions_in_flight.inc();
    let _in_flight = scopeguard::guard((), |_| metrics().executions_in_flight.dec());
    let latency = match operation {
        Operation::SubmitTransaction => Some(Timer::start(&metrics().submit_latency)),
        Operation::GetTransactionReceipt | Operation::GetTransactionRecord => {
            Some(Timer::start(&metrics().receipt_latency))
        }
        _ => None,
    };

    let node_ids = match executable.node_account_ids() {
        Some(ids) => ids.to_vec(),
        None => client.registry().select_nodes(settings.max_nodes_per_transaction),
    };
    if node_ids.is_empty() {
        return Err(Error::IllegalState("no nodes to send the request to".to_string()));
    }
    let nodes = client.registry().resolve(&node_ids)?;
    let request = executable.make_request()?;

    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempt = 0u32;
    let mut cursor = 0usize;
    let mut node_retried: HashSet<usize> = HashSet::new();
    let mut last_error: Option<Error> = None;

    loop {
        let now = Instant::now();
        if attempt >= backoff.max_attempts || now >= deadline {
            metrics().execution_timeouts.inc();
            let elapsed = start.elapsed();
            logger.log_exhausted(
                attempt,
                elapsed,
                last_error.as_ref().map(|e| e.to_string()).as_deref(),
            );
            return Err(Error::Timeout {
                attempts: attempt,
                elapsed,
                last_error: last_error.map(Box::new),
            });
        }

        let index = match pick_node(&nodes, cursor) {
            Some(NodePick::Ready(index)) => index,
            Some(NodePick::Wait(index, wait)) => {
                logger.log_waiting_for_node(nodes[index].account_id(), wait);
                let remaining = deadline.saturating_duration_since(now);
                tokio::time::sleep(wait.min(remaining)).await;
                if Instant::now() >= deadline {
                    continue;
                }
                index
            }
            None => {
                return Err(Error::IllegalState(
                    "every node for this request is marked dead".to_string(),
                ))
            }
        };
        cursor = (index + 1) % nodes.len();
        let node = &nodes[index];

        attempt += 1;
        logger.log_attempt(node.account_id(), attempt, backoff.max_attempts);
        metrics()
            .execution_attempts
            .with_label_values(&[operation.as_str()])
            .inc();

        let remaining = deadline.saturating_duration_since(Instant::now());
        let call_deadline = settings.grpc_deadline.min(remaining);
        let call = client
            .transport()
            .call(node.address(), operation, request.clone(), call_deadline);

        let response = match tokio::time::timeout(call_deadline, call).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) if err.is_retryable() => {
                client.registry().record_failure(node);
                metrics().retries.with_label_values(&["transport"]).inc();
                logger.log_retry(node.account_id(), attempt, "transport", None);
                last_error = Some(err.into());
                continue;
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_elapsed) => {
                client.registry().record_failure(node);
                metrics().retries.with_label_values(&["deadline"]).inc();
                logger.log_retry(node.account_id(), attempt, "deadline", None);
                last_error = Some(TransportError::DeadlineExceeded(call_deadline).into());
                continue;
            }
        };

        let envelope: ResponseEnvelope = wire::decode(&response)?;
        let status = Status::from_code(envelope.status)?;

        match executable.classify(&settings.status_policy, status, &envelope.payload) {
            StatusClass::Success => {
                client.registry().record_success(node);
                logger.log_success(node.account_id(), attempt, start.elapsed());
                if let Some(latency) = latency {
                    latency.finish();
                }
                return executable.map_response(node.account_id(), envelope.payload);
            }
            StatusClass::RetryNode => {
                client.registry().record_failure(node);
                node_retried.insert(index);
                last_error = Some(executable.map_status_error(status, &envelope.payload));
                metrics().retries.with_label_values(&["node"]).inc();

                // Every node has asked us to go elsewhere: slow down.
                let delay = (node_retried.len() >= nodes.len()).then(|| backoff.delay(attempt));
                logger.log_retry(node.account_id(), attempt, status.as_str_name(), delay);
                if let Some(delay) = delay {
                    sleep_until_deadline(delay, deadline).await;
                }
            }
            StatusClass::RetryTransient => {
                client.registry().record_success(node);
                last_error = Some(executable.map_status_error(status, &envelope.payload));
                metrics().retries.with_label_values(&["transient"]).inc();

                let delay = backoff.delay(attempt);
                logger.log_retry(node.account_id(), attempt, status.as_str_name(), Some(delay));
                sleep_until_deadline(delay, deadline).await;
            }
            StatusClass::Reject => {
                client.registry().record_success(node);
                logger.log_rejected(node.account_id(), status);
                metrics()
                    .precheck_failures
                    .with_label_values(&[status.as_str_name()])
                    .inc();
                return Err(executable.map_status_error(status, &envelope.payload));
            }
        }
    }
}

async fn sleep_until_deadline(delay: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    tokio::time::sleep(delay.min(remaining)).await;
}
