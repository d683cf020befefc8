use std::sync::Arc;

use crate::document::SourceDocument;
use crate::screening::models::{CandidateRecord, Outcome};

/// Minimum match percentage for a shortlist. Inclusive, and intentionally not configurable.
pub const SHORTLIST_THRESHOLD: u32 = 70;

pub fn is_shortlisted(match_percentage: u32) -> bool {
    match_percentage >= SHORTLIST_THRESHOLD
}

/// Pairs a document with its record and the shortlist decision.
pub fn evaluate(document: Arc<SourceDocument>, record: CandidateRecord) -> Outcome {
    let shortlisted = is_shortlisted(record.match_percentage);
    Outcome {
        document,
        record,
        shortlisted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::models::PHONE_NOT_AVAILABLE;

    fn record(match_percentage: u32) -> CandidateRecord {
        CandidateRecord {
            name: "Candidate".to_string(),
            skills: vec!["Rust".to_string()],
            skills_text: "Rust".to_string(),
            experience_years: 4,
            match_percentage,
            phone: PHONE_NOT_AVAILABLE.to_string(),
            email: None,
        }
    }

    #[test]
    fn test_threshold_boundaries() {
        assert!(!is_shortlisted(0));
        assert!(!is_shortlisted(69));
        assert!(is_shortlisted(70));
        assert!(is_shortlisted(100));
    }

    #[test]
    fn test_out_of_range_percentage_is_still_shortlisted() {
        assert!(is_shortlisted(150));
    }

    #[test]
    fn test_evaluate_at_exactly_seventy_shortlists() {
        let doc = Arc::new(SourceDocument::new("edge.pdf", Vec::new()));
        let outcome = evaluate(doc, record(70));
        assert!(outcome.shortlisted);
        assert_eq!(outcome.document.name(), "edge.pdf");
    }

    #[test]
    fn test_evaluate_at_sixty_nine_rejects() {
        let doc = Arc::new(SourceDocument::new("edge.pdf", Vec::new()));
        let outcome = evaluate(doc, record(69));
        assert!(!outcome.shortlisted);
        assert_eq!(outcome.record.match_percentage, 69);
    }
}
