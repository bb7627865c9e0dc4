//! Rate-limited replay of a backlog against a remote job endpoint.

use std::sync::Arc;
use std::time::Duration;

use actharvest_core_types::{TaskId, TaskResult, TaskTarget};
use actharvest_state_center::{ProcessedSet, StateStore};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::app_settings::BackoffRange;
use crate::backlog::BacklogItem;
use crate::errors::KernelError;
use crate::summary::RunSummary;

/// Remote side of a dispatch. `Err` describes why the job was not accepted.
#[async_trait]
pub trait JobEndpoint: Send + Sync {
    async fn submit(&self, item: &BacklogItem) -> Result<(), String>;
}

#[derive(Serialize)]
struct JobPayload<'a> {
    first_name: &'a str,
    last_name: &'a str,
    company_name: &'a str,
}

/// POSTs one JSON job per item; only HTTP 200 counts as success.
pub struct HttpJobEndpoint {
    client: Client,
    url: Url,
    company_label: String,
}

impl HttpJobEndpoint {
    pub fn new(
        endpoint_url: &str,
        company_label: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, KernelError> {
        let url = Url::parse(endpoint_url)
            .map_err(|err| KernelError::config(format!("invalid endpoint url: {err}")))?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| KernelError::Endpoint(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            url,
            company_label: company_label.into(),
        })
    }
}

#[async_trait]
impl JobEndpoint for HttpJobEndpoint {
    async fn submit(&self, item: &BacklogItem) -> Result<(), String> {
        let payload = JobPayload {
            first_name: item.first_name(),
            last_name: item.last_name(),
            company_name: &self.company_label,
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| format!("request failed: {err}"))?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response unavailable>".to_string());
        Err(format!("HTTP {status}: {}", body.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Stop after the first attempted item, successful or not.
    Single,
    /// Attempt every unprocessed item.
    Batch,
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Succeeded(TaskResult),
    Failed(TaskResult),
}

impl DispatchOutcome {
    pub fn result(&self) -> &TaskResult {
        match self {
            DispatchOutcome::Succeeded(result) | DispatchOutcome::Failed(result) => result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchRun {
    pub attempts: Vec<DispatchOutcome>,
    /// Backlog items that were skipped as already processed.
    pub skipped: usize,
    /// Whether the run stopped on cancellation.
    pub interrupted: bool,
    pub persist_failures: usize,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub success_backoff: BackoffRange,
    pub failure_backoff: BackoffRange,
}

pub struct Dispatcher {
    endpoint: Arc<dyn JobEndpoint>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(endpoint: Arc<dyn JobEndpoint>, policy: DispatchPolicy) -> Self {
        Self { endpoint, policy }
    }

    /// Walk the backlog once. An item is marked done, and the set persisted,
    /// only after the endpoint confirmed it.
    pub async fn run(
        &self,
        backlog: &[BacklogItem],
        mode: DispatchMode,
        set: &mut ProcessedSet,
        store: &dyn StateStore,
        cancel: &CancellationToken,
    ) -> DispatchRun {
        let pending: Vec<&BacklogItem> = backlog
            .iter()
            .filter(|item| !set.contains(&item.identity))
            .collect();
        let mut run = DispatchRun {
            attempts: Vec::new(),
            skipped: backlog.len() - pending.len(),
            interrupted: false,
            persist_failures: 0,
            summary: RunSummary::default(),
        };
        info!(
            backlog = backlog.len(),
            pending = pending.len(),
            ?mode,
            "dispatch starting"
        );

        for (position, item) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                run.interrupted = true;
                break;
            }
            if set.contains(&item.identity) {
                debug!(identity = %item.identity, "already processed; skipping");
                run.skipped += 1;
                continue;
            }

            let target = TaskTarget::Item(item.identity.to_string());
            let task_id = TaskId::for_target(&target);
            info!(
                row = item.row,
                identity = %item.identity,
                progress = %format!("{}/{}", position + 1, pending.len()),
                "dispatching item"
            );
            let succeeded = match self.endpoint.submit(item).await {
                Ok(()) => {
                    set.insert(item.identity.clone());
                    if let Err(err) = store.persist(set) {
                        warn!(identity = %item.identity, %err, "state not persisted after success");
                        run.persist_failures += 1;
                    }
                    run.attempts.push(DispatchOutcome::Succeeded(TaskResult::succeeded(
                        task_id,
                        target,
                        Vec::new(),
                        Vec::new(),
                    )));
                    true
                }
                Err(error) => {
                    warn!(identity = %item.identity, %error, "dispatch failed");
                    run.attempts.push(DispatchOutcome::Failed(TaskResult::failed(
                        task_id,
                        target,
                        error,
                        Vec::new(),
                    )));
                    false
                }
            };

            if mode == DispatchMode::Single {
                break;
            }
            // Only pause when another item will actually be attempted.
            let more_eligible = pending[position + 1..]
                .iter()
                .any(|next| !set.contains(&next.identity));
            if !more_eligible {
                break;
            }
            let range = if succeeded {
                self.policy.success_backoff
            } else {
                self.policy.failure_backoff
            };
            if !pause(range, cancel).await {
                run.interrupted = true;
                break;
            }
        }

        run.summary.new = run
            .attempts
            .iter()
            .filter(|a| matches!(a, DispatchOutcome::Succeeded(_)))
            .count();
        run.summary.failed = run.attempts.len() - run.summary.new;
        run.summary.duplicate = run.skipped;
        run.summary.total = set.len();
        info!(summary = %run.summary, interrupted = run.interrupted, "dispatch finished");
        run
    }
}

/// Draw a delay from `range`.
pub fn backoff_delay(range: BackoffRange) -> Duration {
    if range.max <= range.min {
        return range.min;
    }
    let min = range.min.as_millis() as u64;
    let max = range.max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Sleep for a randomized backoff. Returns `false` if cancelled first.
async fn pause(range: BackoffRange, cancel: &CancellationToken) -> bool {
    let delay = backoff_delay(range);
    if !delay.is_zero() {
        info!(seconds = delay.as_secs(), "waiting before next item");
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_range() {
        let range = BackoffRange {
            min: Duration::from_secs(90),
            max: Duration::from_secs(120),
        };
        for _ in 0..50 {
            let delay = backoff_delay(range);
            assert!(delay >= range.min && delay <= range.max);
        }
        assert_eq!(
            backoff_delay(BackoffRange::fixed(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn rejects_invalid_endpoint_url() {
        assert!(matches!(
            HttpJobEndpoint::new("not a url", "AWS Hero", Duration::from_secs(1)),
            Err(KernelError::Config(_))
        ));
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let payload = JobPayload {
            first_name: "Ada",
            last_name: "Lovelace",
            company_name: "AWS Hero",
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"first_name":"Ada","last_name":"Lovelace","company_name":"AWS Hero"})
        );
    }
}
