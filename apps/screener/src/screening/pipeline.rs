//! Batch pipeline: orchestrates a screening run.
//!
//! Flow per document: extract text → query oracle → parse fields → evaluate →
//! shortlist hooks → record. Failures at extract / query / parse drop that document
//! only; the batch always carries on.
//!
//! Documents run one at a time by default. With `concurrency > 1` up to that many run
//! at once on a `JoinSet`. Either way the collector below is the only writer of the
//! result, and the result keeps input order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::document::extractor::DocumentTextExtractor;
use crate::document::{JobDescription, SourceDocument};
use crate::oracle::{OracleClient, OracleError};
use crate::screening::evaluator::evaluate;
use crate::screening::hooks::ShortlistHook;
use crate::screening::models::{
    BatchResult, DocumentStage, DropStage, DroppedDocument, HookFailure, Outcome,
};
use crate::screening::parser::parse_response;

// ────────────────────────────────────────────────────────────────────────────
// Options
// ────────────────────────────────────────────────────────────────────────────

/// Bounded retry around the oracle call. Only transient oracle errors are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(1),
        }
    }

    /// Exponential backoff: base, 2×base, 4×base, ...
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Documents in flight at once. 1 = strictly sequential.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Progress events
// ────────────────────────────────────────────────────────────────────────────

/// How a document left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Disposition {
    Evaluated { shortlisted: bool },
    Dropped { stage: DropStage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub evaluated: usize,
    pub shortlisted: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Started {
        total: usize,
    },
    StageChanged {
        index: usize,
        document: String,
        stage: DocumentStage,
    },
    /// Emitted once per document after it is recorded or dropped.
    /// `completed` grows by one each time and equals `total` exactly once.
    DocumentFinished {
        completed: usize,
        total: usize,
        document: String,
        disposition: Disposition,
    },
    Completed {
        summary: BatchSummary,
    },
    Cancelled {
        completed: usize,
        total: usize,
    },
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

#[derive(Clone, Default)]
struct Emitter(Option<EventSender>);

impl Emitter {
    fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.0 {
            // A caller that stopped listening must not stop the batch.
            let _ = sender.send(event);
        }
    }

    fn stage(&self, index: usize, document: &SourceDocument, stage: DocumentStage) {
        debug!(index, document = document.name(), ?stage, "Stage changed");
        self.emit(PipelineEvent::StageChanged {
            index,
            document: document.name().to_string(),
            stage,
        });
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cancellation
// ────────────────────────────────────────────────────────────────────────────

/// Requests cancellation of a running batch.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

/// Observed by the pipeline between and during documents.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelSignal(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        cancellation().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

enum DocumentReport {
    Evaluated {
        index: usize,
        outcome: Outcome,
        hook_failures: Vec<HookFailure>,
    },
    Dropped(DroppedDocument),
}

/// The screening pipeline. Cheap to clone; all components are shared.
#[derive(Clone)]
pub struct BatchPipeline {
    extractor: Arc<dyn DocumentTextExtractor>,
    oracle: Arc<dyn OracleClient>,
    hooks: Arc<[Arc<dyn ShortlistHook>]>,
    options: PipelineOptions,
}

impl BatchPipeline {
    pub fn new(
        extractor: Arc<dyn DocumentTextExtractor>,
        oracle: Arc<dyn OracleClient>,
        hooks: Vec<Arc<dyn ShortlistHook>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            extractor,
            oracle,
            hooks: hooks.into(),
            options: PipelineOptions {
                concurrency: options.concurrency.max(1),
                ..options
            },
        }
    }

    /// Screens every document against the job description.
    ///
    /// Never fails as a whole: per-document problems end up in `BatchResult::drops`,
    /// hook problems in `BatchResult::hook_failures`. On cancellation the in-flight
    /// documents are abandoned and the partial result is returned.
    pub async fn run(
        &self,
        job: &JobDescription,
        documents: Vec<SourceDocument>,
        events: Option<EventSender>,
        mut cancel: CancelSignal,
    ) -> BatchResult {
        let total = documents.len();
        let emitter = Emitter(events);
        info!(
            total,
            concurrency = self.options.concurrency,
            "Starting screening batch"
        );
        emitter.emit(PipelineEvent::Started { total });

        let mut queue = documents.into_iter().map(Arc::new).enumerate();
        let mut slots: Vec<Option<Outcome>> = (0..total).map(|_| None).collect();
        let mut drops = Vec::new();
        let mut hook_failures = Vec::new();
        let mut completed = 0usize;
        let mut cancelled = false;
        let mut join_set = JoinSet::new();
        // Task id to (index, name), so a panicked task can still be reported.
        let mut in_flight: HashMap<Id, (usize, String)> = HashMap::new();

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                join_set.abort_all();
            }

            while !cancelled && join_set.len() < self.options.concurrency {
                let Some((index, document)) = queue.next() else {
                    break;
                };
                emitter.stage(index, &document, DocumentStage::Pending);
                let name = document.name().to_string();
                let handle = join_set.spawn(self.clone().process_document(
                    index,
                    document,
                    job.clone(),
                    emitter.clone(),
                ));
                in_flight.insert(handle.id(), (index, name));
            }

            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    warn!(completed, total, "Screening batch cancelled, abandoning in-flight documents");
                    cancelled = true;
                    join_set.abort_all();
                }
                joined = join_set.join_next_with_id() => {
                    let report = match joined {
                        Some(Ok((id, report))) => {
                            in_flight.remove(&id);
                            report
                        }
                        Some(Err(e)) if e.is_cancelled() => {
                            in_flight.remove(&e.id());
                            continue;
                        }
                        Some(Err(e)) => match in_flight.remove(&e.id()) {
                            Some((index, name)) => {
                                error!(document = %name, "Document task panicked: {e}");
                                DocumentReport::Dropped(DroppedDocument {
                                    index,
                                    document: name,
                                    stage: DropStage::Aborted,
                                    reason: panic_reason(e),
                                })
                            }
                            None => {
                                error!("Untracked document task failed: {e}");
                                continue;
                            }
                        },
                        None => break,
                    };

                    completed += 1;
                    let (document, disposition) = match report {
                        DocumentReport::Evaluated { index, outcome, hook_failures: failures } => {
                            let name = outcome.document.name().to_string();
                            info!(
                                document = %name,
                                match_percentage = outcome.record.match_percentage,
                                shortlisted = outcome.shortlisted,
                                "Screened {}", outcome.record.name
                            );
                            emitter.stage(index, &outcome.document, DocumentStage::Recorded);
                            let disposition = Disposition::Evaluated { shortlisted: outcome.shortlisted };
                            hook_failures.extend(failures);
                            slots[index] = Some(outcome);
                            (name, disposition)
                        }
                        DocumentReport::Dropped(dropped) => {
                            warn!(
                                document = %dropped.document,
                                stage = ?dropped.stage,
                                "Dropped document: {}", dropped.reason
                            );
                            emitter.emit(PipelineEvent::StageChanged {
                                index: dropped.index,
                                document: dropped.document.clone(),
                                stage: DocumentStage::Dropped,
                            });
                            let result = (dropped.document.clone(), Disposition::Dropped { stage: dropped.stage });
                            drops.push(dropped);
                            result
                        }
                    };

                    emitter.emit(PipelineEvent::DocumentFinished {
                        completed,
                        total,
                        document,
                        disposition,
                    });
                }
            }
        }

        drops.sort_by_key(|d: &DroppedDocument| d.index);
        hook_failures.sort_by_key(|f: &HookFailure| f.index);
        let result = BatchResult {
            total_documents: total,
            outcomes: slots.into_iter().flatten().collect(),
            drops,
            hook_failures,
            cancelled,
        };

        if cancelled {
            emitter.emit(PipelineEvent::Cancelled { completed, total });
        } else {
            let summary = BatchSummary {
                total,
                evaluated: result.evaluated(),
                shortlisted: result.total_shortlisted(),
                dropped: result.drops.len(),
            };
            info!(
                total,
                evaluated = summary.evaluated,
                shortlisted = summary.shortlisted,
                dropped = summary.dropped,
                "Screening batch completed"
            );
            emitter.emit(PipelineEvent::Completed { summary });
        }

        result
    }

    async fn process_document(
        self,
        index: usize,
        document: Arc<SourceDocument>,
        job: JobDescription,
        emitter: Emitter,
    ) -> DocumentReport {
        emitter.stage(index, &document, DocumentStage::Extracting);
        let text = match document.text(self.extractor.as_ref()).await {
            Ok(text) => text,
            Err(e) => return dropped(index, &document, DropStage::Extraction, e.to_string()),
        };
        if text.trim().is_empty() {
            debug!(document = document.name(), "Document has no extractable text");
        }

        emitter.stage(index, &document, DocumentStage::Querying);
        let response = match self.query_with_retry(text, &job, document.name()).await {
            Ok(response) => response,
            Err(e) => return dropped(index, &document, DropStage::Oracle, e.to_string()),
        };

        emitter.stage(index, &document, DocumentStage::Parsing);
        let record = match parse_response(&response) {
            Ok(record) => record,
            Err(invalid) => return dropped(index, &document, DropStage::Parse, invalid.to_string()),
        };

        emitter.stage(index, &document, DocumentStage::Evaluating);
        let outcome = evaluate(document, record);
        let hook_failures = if outcome.shortlisted {
            self.run_hooks(index, &outcome).await
        } else {
            Vec::new()
        };

        DocumentReport::Evaluated {
            index,
            outcome,
            hook_failures,
        }
    }

    async fn query_with_retry(
        &self,
        resume_text: &str,
        job: &JobDescription,
        document: &str,
    ) -> Result<String, OracleError> {
        let retry = self.options.retry;
        let mut attempt = 1;
        loop {
            match self.oracle.query(resume_text, job.as_str()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        "Oracle attempt {}/{} for {} failed ({}), retrying after {}ms...",
                        attempt,
                        retry.max_attempts,
                        document,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs every hook in order. Failures are collected, never propagated.
    ///
    /// Each hook runs on its own task so a panic inside it becomes a `HookFailure`
    /// and the outcome still stands. A hook that has started runs to completion even
    /// if the batch is cancelled meanwhile.
    async fn run_hooks(&self, index: usize, outcome: &Outcome) -> Vec<HookFailure> {
        let mut failures = Vec::new();
        for hook in self.hooks.iter() {
            let task = {
                let hook = Arc::clone(hook);
                let outcome = outcome.clone();
                tokio::spawn(async move { hook.on_shortlisted(&outcome).await })
            };
            let error = match task.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(e) => panic_reason(e),
            };
            error!(
                document = outcome.document.name(),
                hook = hook.name(),
                "Shortlist hook failed: {error}"
            );
            failures.push(HookFailure {
                index,
                document: outcome.document.name().to_string(),
                hook: hook.name(),
                error,
            });
        }
        failures
    }
}

/// Panic message of a failed task, when it carried one.
fn panic_reason(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("no message");
    format!("panicked: {message}")
}

fn dropped(
    index: usize,
    document: &SourceDocument,
    stage: DropStage,
    reason: String,
) -> DocumentReport {
    DocumentReport::Dropped(DroppedDocument {
        index,
        document: document.name().to_string(),
        stage,
        reason,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
