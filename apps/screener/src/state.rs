use crate::screening::pipeline::BatchPipeline;
use crate::screening::store::ScreeningStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline wired with the configured extractor, oracle and shortlist hooks.
    pub pipeline: BatchPipeline,
    pub screenings: ScreeningStore,
}
