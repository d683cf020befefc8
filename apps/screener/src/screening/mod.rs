//! Resume screening: parse oracle replies into candidate records, apply the
//! shortlist threshold, and drive whole batches through the pipeline.

pub mod evaluator;
pub mod handlers;
pub mod hooks;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod store;

#[cfg(test)]
pub mod testing;
