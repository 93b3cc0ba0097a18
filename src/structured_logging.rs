//! Logging setup and per-execution structured events

use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::entity::AccountId;
use crate::observability::TraceContext;
use crate::status::Status;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `verbose` when set. Errors if a subscriber is
/// already installed.
pub fn init_logging(verbose: bool, json: bool) -> anyhow::Result<()> {
    let default_filter = if verbose {
        "ledger_sdk=debug,info"
    } else {
        "ledger_sdk=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

/// Emits the engine's lifecycle events tagged with one trace context.
#[derive(Debug, Clone)]
pub struct ExecutionLogger {
    trace: TraceContext,
}

impl ExecutionLogger {
    pub fn new(trace: TraceContext) -> Self {
        Self { trace }
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn log_attempt(&self, node: &AccountId, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            correlation_id = %self.trace.correlation_id,
            operation = %self.trace.operation,
            node = %node,
            attempt,
            max_attempts,
            "Sending request"
        );
    }

    pub fn log_retry(&self, node: &AccountId, attempt: u32, reason: &str, delay: Option<Duration>) {
        tracing::debug!(
            correlation_id = %self.trace.correlation_id,
            operation = %self.trace.operation,
            node = %node,
            attempt,
            reason,
            delay_ms = delay.map(|d| d.as_millis() as u64),
            "Retrying request"
        );
    }

    pub fn log_waiting_for_node(&self, node: &AccountId, wait: Duration) {
        tracing::debug!(
            correlation_id = %self.trace.correlation_id,
            node = %node,
            wait_ms = wait.as_millis() as u64,
            "All nodes backing off, waiting for the earliest"
        );
    }

    pub fn log_success(&self, node: &AccountId, attempts: u32, elapsed: Duration) {
        tracing::info!(
            correlation_id = %self.trace.correlation_id,
            operation = %self.trace.operation,
            node = %node,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request accepted"
        );
    }

    pub fn log_rejected(&self, node: &AccountId, status: Status) {
        tracing::warn!(
            correlation_id = %self.trace.correlation_id,
            operation = %self.trace.operation,
            node = %node,
            status = %status,
            "Request rejected at precheck"
        );
    }

    pub fn log_exhausted(&self, attempts: u32, elapsed: Duration, last_error: Option<&str>) {
        tracing::warn!(
            correlation_id = %self.trace.correlation_id,
            operation = %self.trace.operation,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            last_error,
            "Retry budget exhausted"
        );
    }
}
