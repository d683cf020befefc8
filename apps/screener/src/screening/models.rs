use std::sync::Arc;

use serde::Serialize;

use crate::document::SourceDocument;

/// Phone value used when the oracle gives no usable number.
pub const PHONE_NOT_AVAILABLE: &str = "Not Available";

/// Structured candidate data parsed from one oracle response. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub name: String,
    /// Individual skills in the order the oracle listed them.
    pub skills: Vec<String>,
    /// Skills exactly as the oracle wrote them, comma-joined.
    pub skills_text: String,
    pub experience_years: u32,
    /// Expected 0–100, but taken as-is from the oracle (no clamping).
    pub match_percentage: u32,
    pub phone: String,
    pub email: Option<String>,
}

/// A document paired with its evaluated record.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub document: Arc<SourceDocument>,
    pub record: CandidateRecord,
    pub shortlisted: bool,
}

/// Per-document lifecycle. A document ends in either `Recorded` or `Dropped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    Pending,
    Extracting,
    Querying,
    Parsing,
    Evaluating,
    Recorded,
    Dropped,
}

/// Where a dropped document fell out of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStage {
    Extraction,
    Oracle,
    Parse,
    /// The document task panicked outside any shortlist hook.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedDocument {
    /// Position in the input batch.
    pub index: usize,
    pub document: String,
    pub stage: DropStage,
    pub reason: String,
}

/// A shortlist hook that failed. The outcome it was given still stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub index: usize,
    pub document: String,
    pub hook: &'static str,
    pub error: String,
}

/// Everything a batch run produced, in input order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub total_documents: usize,
    pub outcomes: Vec<Outcome>,
    pub drops: Vec<DroppedDocument>,
    pub hook_failures: Vec<HookFailure>,
    /// True when the run was cancelled before every document was processed.
    pub cancelled: bool,
}

impl BatchResult {
    /// Shortlisted outcomes, in input order.
    pub fn shortlist(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.shortlisted)
    }

    pub fn total_shortlisted(&self) -> usize {
        self.shortlist().count()
    }

    /// Documents that produced a valid record.
    pub fn evaluated(&self) -> usize {
        self.outcomes.len()
    }

    /// Documents that reached a final state (evaluated or dropped).
    pub fn processed(&self) -> usize {
        self.outcomes.len() + self.drops.len()
    }

    /// Looks up a shortlisted outcome by document name.
    pub fn shortlisted_document(&self, name: &str) -> Option<&Outcome> {
        self.shortlist().find(|o| o.document.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, pct: u32, shortlisted: bool) -> Outcome {
        Outcome {
            document: Arc::new(SourceDocument::new(name, name.as_bytes().to_vec())),
            record: CandidateRecord {
                name: name.to_string(),
                skills: vec!["Rust".to_string()],
                skills_text: "Rust".to_string(),
                experience_years: 3,
                match_percentage: pct,
                phone: PHONE_NOT_AVAILABLE.to_string(),
                email: None,
            },
            shortlisted,
        }
    }

    #[test]
    fn test_shortlist_filters_and_keeps_order() {
        let result = BatchResult {
            total_documents: 3,
            outcomes: vec![
                outcome("a.pdf", 90, true),
                outcome("b.pdf", 40, false),
                outcome("c.pdf", 75, true),
            ],
            ..Default::default()
        };

        let names: Vec<_> = result.shortlist().map(|o| o.document.name()).collect();
        assert_eq!(names, vec!["a.pdf", "c.pdf"]);
        assert_eq!(result.total_shortlisted(), 2);
        assert_eq!(result.evaluated(), 3);
    }

    #[test]
    fn test_shortlisted_document_ignores_rejected_candidates() {
        let result = BatchResult {
            total_documents: 2,
            outcomes: vec![outcome("a.pdf", 90, true), outcome("b.pdf", 40, false)],
            ..Default::default()
        };

        assert!(result.shortlisted_document("a.pdf").is_some());
        assert!(result.shortlisted_document("b.pdf").is_none());
        assert!(result.shortlisted_document("missing.pdf").is_none());
    }

    #[test]
    fn test_processed_counts_drops() {
        let result = BatchResult {
            total_documents: 2,
            outcomes: vec![outcome("a.pdf", 90, true)],
            drops: vec![DroppedDocument {
                index: 1,
                document: "b.pdf".to_string(),
                stage: DropStage::Extraction,
                reason: "corrupt".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(result.processed(), 2);
        assert_eq!(result.evaluated(), 1);
    }
}
