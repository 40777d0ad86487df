//! Background delivery worker.
//!
//! Polls the durable queue for due jobs, runs up to `concurrency` of them
//! at once, and records a delivery for every attempt. On cancellation the
//! claim loop stops, in-flight jobs are drained, and anything still
//! waiting stays in the queue for the next process.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use sqlx::PgPool;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use hookfreight_db::models::{CreateDelivery, Delivery, DeliveryJob, Endpoint, Event};
use hookfreight_db::DbError;

use crate::services::forwarder::{build_forward_headers, ForwardOutcome, ForwardRequest, Forwarder};
use crate::services::scheduler::backoff_delay_ms;
use crate::models::DeliveryStatus;

/// Queue poll interval.
const POLL_INTERVAL_MS: u64 = 500;

/// Error message recorded when an endpoint cannot be forwarded to.
const NOT_FORWARDABLE_MESSAGE: &str = "forwarding not enabled or URL not configured";

/// Error message recorded by the self-forward guard.
const SELF_FORWARD_MESSAGE: &str = "forward URL points to a HookFreight webhook URL";

/// Background worker that drains the delivery queue.
pub struct DeliveryWorker {
    pool: PgPool,
    forwarder: Arc<Forwarder>,
    concurrency: usize,
    cancellation_token: CancellationToken,
}

impl DeliveryWorker {
    /// Create a new delivery worker.
    #[must_use]
    pub fn new(
        pool: PgPool,
        forwarder: Arc<Forwarder>,
        concurrency: usize,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            pool,
            forwarder,
            concurrency: concurrency.max(1),
            cancellation_token,
        }
    }

    /// Run the worker until cancelled.
    pub async fn run(self) {
        tracing::info!(
            target: "delivery",
            concurrency = self.concurrency,
            "Delivery worker started"
        );

        let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                () = self.cancellation_token.cancelled() => {
                    tracing::info!(target: "delivery", "Delivery worker shutdown requested");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!(target: "delivery", error = %e, "Delivery task panicked");
                    }
                }
                _ = interval.tick() => {
                    let capacity = self.concurrency.saturating_sub(tasks.len());
                    if capacity == 0 {
                        continue;
                    }

                    let jobs = match DeliveryJob::claim_due(&self.pool, capacity as i64).await {
                        Ok(jobs) => jobs,
                        Err(e) => {
                            tracing::error!(
                                target: "delivery",
                                error = %e,
                                "Failed to claim due delivery jobs"
                            );
                            continue;
                        }
                    };

                    for job in jobs {
                        let pool = self.pool.clone();
                        let forwarder = self.forwarder.clone();
                        tasks.spawn(async move {
                            process_job(&pool, &forwarder, &job).await;
                        });
                    }
                }
            }
        }

        // Let active jobs finish; unclaimed jobs stay queued for the next
        // process.
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(target: "delivery", error = %e, "Delivery task panicked");
            }
        }

        tracing::info!(target: "delivery", "Delivery worker stopped");
    }
}

/// Execute one claimed job end to end.
async fn process_job(pool: &PgPool, forwarder: &Forwarder, job: &DeliveryJob) {
    // Attempt number this execution represents (1-based).
    let attempt = job.attempt_count + 1;

    let (event, endpoint) = tokio::join!(
        Event::find_by_id(pool, job.event_id),
        Endpoint::find_by_id(pool, job.endpoint_id),
    );

    let (event, endpoint) = match (event, endpoint) {
        (Ok(event), Ok(endpoint)) => (event, endpoint),
        (event, endpoint) => {
            let error = event.err().or_else(|| endpoint.err()).map_or_else(
                || "unknown load error".to_string(),
                |e| e.to_string(),
            );
            tracing::error!(
                target: "delivery",
                job_key = %job.job_key,
                error = %error,
                "Failed to load job referents"
            );
            // The outbound call never happened; give the job another shot
            // within its attempt budget.
            requeue_or_fail(pool, job, attempt, job.parent_delivery_id, &error).await;
            return;
        }
    };

    let (event, endpoint) = match (event, endpoint) {
        (Some(event), Some(endpoint)) => (event, endpoint),
        (event, endpoint) => {
            let missing = if event.is_none() { "event" } else { "endpoint" };
            let destination = endpoint.map(|e| e.forward_url).unwrap_or_default();
            record_terminal_failure(
                pool,
                job,
                attempt,
                &destination,
                &format!("{missing} no longer exists"),
            )
            .await;
            return;
        }
    };

    if !endpoint.forwarding_enabled || endpoint.forward_url.is_empty() {
        record_terminal_failure(pool, job, attempt, &endpoint.forward_url, NOT_FORWARDABLE_MESSAGE)
            .await;
        return;
    }

    let target = match Url::parse(&endpoint.forward_url) {
        Ok(url) => url,
        Err(e) => {
            record_terminal_failure(
                pool,
                job,
                attempt,
                &endpoint.forward_url,
                &format!("invalid forward URL: {e}"),
            )
            .await;
            return;
        }
    };

    if forwarder.is_self_forward(&target) {
        record_terminal_failure(pool, job, attempt, &endpoint.forward_url, SELF_FORWARD_MESSAGE)
            .await;
        return;
    }

    let method = match Method::from_bytes(event.method.as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            record_terminal_failure(
                pool,
                job,
                attempt,
                &endpoint.forward_url,
                &format!("unsupported method: {}", event.method),
            )
            .await;
            return;
        }
    };

    let auth = match (&endpoint.auth_header_name, &endpoint.auth_header_value) {
        (Some(name), Some(value)) => Some((name.as_str(), value.as_str())),
        _ => None,
    };
    let headers = build_forward_headers(&event.headers, auth);
    let timeout = Duration::from_millis(endpoint.http_timeout_ms.max(1) as u64);

    let outcome = forwarder
        .execute(ForwardRequest {
            method,
            url: endpoint.forward_url.clone(),
            headers,
            body: event.body.clone(),
            timeout,
        })
        .await;

    finish_attempt(pool, job, attempt, &endpoint.forward_url, outcome).await;
}

/// Record the attempt's delivery and settle the job.
async fn finish_attempt(
    pool: &PgPool,
    job: &DeliveryJob,
    attempt: i32,
    destination_url: &str,
    outcome: ForwardOutcome,
) {
    let error_for_job = outcome
        .error_message
        .clone()
        .unwrap_or_else(|| "delivery failed".to_string());

    let delivery = Delivery::create(
        pool,
        CreateDelivery {
            id: Uuid::new_v4(),
            event_id: job.event_id,
            parent_delivery_id: job.parent_delivery_id,
            status: outcome.status.as_str().to_string(),
            destination_url: destination_url.to_string(),
            response_status: outcome.response_status,
            response_headers: outcome.response_headers,
            response_body: outcome.response_body,
            duration_ms: outcome.duration_ms,
            error_message: outcome.error_message,
        },
    )
    .await;

    let delivery = match delivery {
        Ok(delivery) => delivery,
        Err(e) if e.is_conflict() => {
            // A concurrent execution already recorded this attempt; the
            // ledger is settled, so the job is done.
            tracing::warn!(
                target: "delivery",
                job_key = %job.job_key,
                event_id = %job.event_id,
                "Delivery attempt already recorded by a concurrent worker"
            );
            log_job_update(DeliveryJob::complete(pool, job.id, attempt, None).await, job);
            return;
        }
        Err(e) => {
            // The outbound call already happened; the ledger must catch
            // up, so persistence failures are retryable (at-least-once).
            tracing::error!(
                target: "delivery",
                job_key = %job.job_key,
                event_id = %job.event_id,
                error = %e,
                "Failed to record delivery attempt"
            );
            requeue_or_fail(pool, job, attempt, job.parent_delivery_id, &e.to_string()).await;
            return;
        }
    };

    match outcome.status {
        DeliveryStatus::Delivered => {
            tracing::info!(
                target: "delivery",
                delivery_id = %delivery.id,
                event_id = %job.event_id,
                response_status = ?outcome.response_status,
                duration_ms = outcome.duration_ms,
                attempt,
                "Delivery succeeded"
            );
            log_job_update(DeliveryJob::complete(pool, job.id, attempt, None).await, job);
        }
        _ if outcome.retryable => {
            tracing::warn!(
                target: "delivery",
                delivery_id = %delivery.id,
                event_id = %job.event_id,
                error = %error_for_job,
                attempt,
                max_retries = job.max_retries,
                "Delivery attempt failed"
            );
            // Link the next attempt into the chain via the delivery just
            // written.
            requeue_or_fail(pool, job, attempt, Some(delivery.id), &error_for_job).await;
        }
        _ => {
            tracing::warn!(
                target: "delivery",
                delivery_id = %delivery.id,
                event_id = %job.event_id,
                error = %error_for_job,
                attempt,
                "Delivery failed terminally"
            );
            log_job_update(
                DeliveryJob::complete(pool, job.id, attempt, Some(&error_for_job)).await,
                job,
            );
        }
    }
}

/// Record a terminal failure that never reached the wire (missing
/// referent, forwarding disabled, self-forward) and complete the job.
async fn record_terminal_failure(
    pool: &PgPool,
    job: &DeliveryJob,
    attempt: i32,
    destination_url: &str,
    error_message: &str,
) {
    tracing::warn!(
        target: "delivery",
        job_key = %job.job_key,
        event_id = %job.event_id,
        error = %error_message,
        "Delivery refused"
    );

    let result = Delivery::create(
        pool,
        CreateDelivery {
            id: Uuid::new_v4(),
            event_id: job.event_id,
            parent_delivery_id: job.parent_delivery_id,
            status: DeliveryStatus::Failed.as_str().to_string(),
            destination_url: destination_url.to_string(),
            response_status: None,
            response_headers: None,
            response_body: None,
            duration_ms: 0,
            error_message: Some(error_message.to_string()),
        },
    )
    .await;

    match result {
        Ok(_) | Err(DbError::Conflict(_)) => {}
        Err(e) => {
            tracing::error!(
                target: "delivery",
                job_key = %job.job_key,
                error = %e,
                "Failed to record refused delivery"
            );
        }
    }

    log_job_update(DeliveryJob::complete(pool, job.id, attempt, Some(error_message)).await, job);
}

/// Schedule the next attempt with backoff, or fail the job when the
/// attempt budget is spent.
async fn requeue_or_fail(
    pool: &PgPool,
    job: &DeliveryJob,
    attempt: i32,
    parent_delivery_id: Option<Uuid>,
    error_message: &str,
) {
    if attempt < job.max_retries {
        let run_at =
            chrono::Utc::now() + chrono::Duration::milliseconds(backoff_delay_ms(attempt));
        let result =
            DeliveryJob::reschedule(pool, job.id, parent_delivery_id, attempt, run_at, error_message)
                .await;
        log_job_update(result, job);
    } else {
        tracing::warn!(
            target: "delivery",
            job_key = %job.job_key,
            event_id = %job.event_id,
            attempts = attempt,
            "Delivery retries exhausted"
        );
        log_job_update(DeliveryJob::fail(pool, job.id, attempt, error_message).await, job);
    }
}

fn log_job_update(result: Result<(), DbError>, job: &DeliveryJob) {
    if let Err(e) = result {
        tracing::error!(
            target: "delivery",
            job_key = %job.job_key,
            error = %e,
            "Failed to update delivery job state"
        );
    }
}
