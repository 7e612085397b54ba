//! Target orchestrator: one session, every target in order
//!
//! Per target: navigate, activate, settle, extract, record, pace. A failure
//! scoped to one target becomes a failure outcome and the batch moves on.
//! A dead browser or a fatal session error aborts the whole batch. The
//! session is closed on every exit path.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::aggregator::{BatchAggregator, BatchResult};
use crate::extractor::{ExtractionRecord, extract};
use crate::retry::{Activation, RetryPolicy, activate_with_retry};
use crate::session::{BrowserSession, ScrapeSession};
use crate::utils::{ScrapeError, ScrapeResult};
use crate::Config;

/// Per-run switches that do not change the output
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Pause after each navigation so the page can be inspected
    pub inspect: bool,
}

/// How the per-target loop ended
enum LoopEnd {
    Completed,
    Cancelled,
    Fatal(String),
}

pub struct Orchestrator {
    config: Config,
    policy: RetryPolicy,
}

impl Orchestrator {
    /// # Errors
    /// `InvalidConfig` if `config` fails validation.
    pub fn new(config: Config) -> ScrapeResult<Self> {
        config.validate()?;
        let policy = RetryPolicy::from_timing(&config.timing);
        Ok(Self { config, policy })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a browser session and run the batch through it.
    ///
    /// An empty batch returns immediately without launching a browser.
    ///
    /// # Errors
    /// `Session` if the browser cannot be started, `Batch` if the browser dies
    /// mid-batch. Per-target failures are outcomes, not errors.
    pub async fn run(
        &self,
        targets: &[String],
        options: RunOptions,
        cancel: CancellationToken,
    ) -> ScrapeResult<BatchResult> {
        if targets.is_empty() {
            info!("No targets given, skipping browser launch");
            return Ok(BatchAggregator::new(Uuid::new_v4(), 0).finish(false));
        }

        let mut session = BrowserSession::open(&self.config).await?;
        self.run_with_session(&mut session, targets, options, cancel).await
    }

    /// Run the batch through an already open session and close it afterwards.
    pub async fn run_with_session<S>(
        &self,
        session: &mut S,
        targets: &[String],
        options: RunOptions,
        cancel: CancellationToken,
    ) -> ScrapeResult<BatchResult>
    where
        S: ScrapeSession + ?Sized,
    {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", %batch_id, targets = targets.len());

        async move {
            let mut aggregator = BatchAggregator::new(batch_id, targets.len());
            let end = self
                .process_all(session, targets, options, &cancel, &mut aggregator)
                .await;

            if let Err(e) = session.close().await {
                warn!("Failed to close session: {}", e);
            }

            let cancelled = matches!(end, LoopEnd::Cancelled);
            match end {
                LoopEnd::Fatal(reason) => {
                    warn!("Batch aborted: {}", reason);
                    Err(ScrapeError::Batch {
                        completed: aggregator.completed(),
                        reason,
                    })
                }
                LoopEnd::Completed | LoopEnd::Cancelled => {
                    let result = aggregator.finish(cancelled);
                    info!(
                        "Batch finished: {} succeeded, {} failed in {}s{}",
                        result.succeeded(),
                        result.failed(),
                        result.total_duration_secs,
                        if result.cancelled { " (cancelled)" } else { "" }
                    );
                    Ok(result)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process_all<S>(
        &self,
        session: &mut S,
        targets: &[String],
        options: RunOptions,
        cancel: &CancellationToken,
        aggregator: &mut BatchAggregator,
    ) -> LoopEnd
    where
        S: ScrapeSession + ?Sized,
    {
        let pacing = Duration::from_millis(self.config.timing.pacing_delay_ms);

        for (position, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    "Cancellation requested, stopping after {} of {} targets",
                    position,
                    targets.len()
                );
                return LoopEnd::Cancelled;
            }

            aggregator.mark_started();
            let started = Instant::now();
            let span = info_span!("target", id = %target, position = position + 1);

            match self.process_target(session, target, options).instrument(span).await {
                Ok(record) => {
                    // Evaluation errors read as misses, so a browser that died
                    // mid-extraction yields an all-default record.
                    if !session.is_alive().await {
                        aggregator.record_failure(target, "browser stopped responding during extraction");
                        return LoopEnd::Fatal(format!(
                            "browser stopped responding while extracting {target}"
                        ));
                    }
                    let elapsed = started.elapsed();
                    info!(target_id = %target, "Extracted in {}ms", elapsed.as_millis());
                    aggregator.record_success(target, record, elapsed);
                }
                Err(e) if e.is_target_scoped() => {
                    warn!(target_id = %target, "Target failed: {}", e);
                    aggregator.record_failure(target, &e);

                    if !session.is_alive().await {
                        return LoopEnd::Fatal(format!(
                            "browser stopped responding while processing {target}: {e}"
                        ));
                    }
                }
                Err(e) => return LoopEnd::Fatal(e.to_string()),
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(pacing) => {}
            }
        }

        LoopEnd::Completed
    }

    async fn process_target<S>(
        &self,
        session: &mut S,
        target: &str,
        options: RunOptions,
    ) -> ScrapeResult<ExtractionRecord>
    where
        S: ScrapeSession + ?Sized,
    {
        let timing = &self.config.timing;
        let url = self.config.target_url(target)?;

        info!("Navigating to {}", url);
        session
            .navigate(&url)
            .await
            .map_err(ScrapeError::from_target_browser_error)?;

        if options.inspect {
            info!("Pausing {}ms for inspection", timing.inspection_pause_ms);
            tokio::time::sleep(Duration::from_millis(timing.inspection_pause_ms)).await;
        }

        let session: &S = session;
        if let Activation::NotFound =
            activate_with_retry(session, &self.config.schema.activation, &self.policy).await
        {
            return Err(ScrapeError::ActivationNotFound);
        }

        tokio::time::sleep(Duration::from_millis(timing.activation_settle_ms)).await;

        Ok(extract(session, &self.config.schema, target).await)
    }
}
