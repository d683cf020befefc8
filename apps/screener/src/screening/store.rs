//! In-memory registry of screening runs started through the API.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{JobDescription, SourceDocument};
use crate::screening::models::BatchResult;
use crate::screening::pipeline::{cancellation, BatchPipeline, CancelHandle, PipelineEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    Running,
    Completed,
    Cancelled,
}

struct Screening {
    status: ScreeningStatus,
    total: usize,
    completed: usize,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    result: Option<Arc<BatchResult>>,
    cancel: CancelHandle,
    /// Position in finishing order, for eviction.
    finished_seq: Option<u64>,
}

/// Point-in-time view of a screening.
#[derive(Debug, Clone)]
pub struct ScreeningSnapshot {
    pub id: Uuid,
    pub status: ScreeningStatus,
    pub total: usize,
    pub completed: usize,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<Arc<BatchResult>>,
}

impl ScreeningSnapshot {
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return if self.status == ScreeningStatus::Running { 0 } else { 100 };
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

/// Finished screenings kept when no explicit retention is configured.
pub const DEFAULT_RETAINED_SCREENINGS: usize = 50;

/// Running screenings are always kept. Once more than `retain_finished` have
/// finished, the oldest finished ones (and their document bytes) are evicted.
#[derive(Clone)]
pub struct ScreeningStore {
    inner: Arc<RwLock<HashMap<Uuid, Screening>>>,
    retain_finished: usize,
}

impl Default for ScreeningStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_SCREENINGS)
    }
}

impl ScreeningStore {
    pub fn new(retain_finished: usize) -> Self {
        Self {
            inner: Arc::default(),
            retain_finished: retain_finished.max(1),
        }
    }

    /// Registers a screening and runs it in the background. Returns its id right away.
    pub async fn start(
        &self,
        pipeline: BatchPipeline,
        job: JobDescription,
        documents: Vec<SourceDocument>,
    ) -> Uuid {
        let (handle, signal) = cancellation();
        let id = Uuid::new_v4();
        let total = documents.len();

        self.inner.write().await.insert(
            id,
            Screening {
                status: ScreeningStatus::Running,
                total,
                completed: 0,
                created_at: Utc::now(),
                finished_at: None,
                result: None,
                cancel: handle,
                finished_seq: None,
            },
        );
        info!("Screening {id} started with {total} documents");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let PipelineEvent::DocumentFinished { completed, .. } = event {
                    store.record_progress(id, completed).await;
                }
            }
        });

        let store = self.clone();
        tokio::spawn(async move {
            let result = pipeline.run(&job, documents, Some(tx), signal).await;
            store.finish(id, result).await;
        });

        id
    }

    async fn record_progress(&self, id: Uuid, completed: usize) {
        if let Some(screening) = self.inner.write().await.get_mut(&id) {
            screening.completed = screening.completed.max(completed);
        }
    }

    async fn finish(&self, id: Uuid, result: BatchResult) {
        let mut screenings = self.inner.write().await;
        let seq = screenings
            .values()
            .filter_map(|s| s.finished_seq)
            .max()
            .map_or(0, |last| last + 1);
        let Some(screening) = screenings.get_mut(&id) else {
            return;
        };
        screening.status = if result.cancelled {
            ScreeningStatus::Cancelled
        } else {
            ScreeningStatus::Completed
        };
        screening.completed = screening.completed.max(result.processed());
        screening.finished_at = Some(Utc::now());
        screening.finished_seq = Some(seq);
        info!(
            "Screening {id} finished: {} of {} shortlisted",
            result.total_shortlisted(),
            result.total_documents
        );
        screening.result = Some(Arc::new(result));

        evict_finished(&mut screenings, self.retain_finished);
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<ScreeningSnapshot> {
        let screenings = self.inner.read().await;
        screenings.get(&id).map(|s| ScreeningSnapshot {
            id,
            status: s.status,
            total: s.total,
            completed: s.completed,
            created_at: s.created_at,
            finished_at: s.finished_at,
            result: s.result.clone(),
        })
    }

    /// Requests cancellation. Returns false for unknown ids.
    pub async fn cancel(&self, id: Uuid) -> bool {
        match self.inner.read().await.get(&id) {
            Some(screening) => {
                screening.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Original bytes and match percentage of a shortlisted document.
    pub async fn shortlisted_document(&self, id: Uuid, name: &str) -> Option<(Bytes, u32)> {
        let screenings = self.inner.read().await;
        let result = screenings.get(&id)?.result.as_ref()?;
        result
            .shortlisted_document(name)
            .map(|o| (o.document.bytes().clone(), o.record.match_percentage))
    }
}

fn evict_finished(screenings: &mut HashMap<Uuid, Screening>, retain: usize) {
    let mut finished: Vec<(u64, Uuid)> = screenings
        .iter()
        .filter_map(|(id, s)| s.finished_seq.map(|seq| (seq, *id)))
        .collect();
    if finished.len() <= retain {
        return;
    }
    finished.sort();
    let excess = finished.len() - retain;
    for (_, id) in finished.into_iter().take(excess) {
        screenings.remove(&id);
        debug!("Evicted finished screening {id}");
    }
}
