//! Source documents and the job description they are screened against.

pub mod archive;
pub mod extractor;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::OnceCell;

use crate::document::extractor::{DocumentTextExtractor, ExtractionError};

/// A single uploaded resume. Immutable once built; the plain text is extracted on
/// first request and cached for the lifetime of the document.
pub struct SourceDocument {
    name: String,
    bytes: Bytes,
    text: OnceCell<String>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            text: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original bytes, as uploaded.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Returns the extracted text, running the extractor only the first time.
    pub async fn text(
        &self,
        extractor: &dyn DocumentTextExtractor,
    ) -> Result<&str, ExtractionError> {
        self.text
            .get_or_try_init(|| extractor.extract(self.bytes.clone()))
            .await
            .map(String::as_str)
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .field("text_cached", &self.text.initialized())
            .finish()
    }
}

/// Free-form job description shared read-only by every evaluation in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription(Arc<str>);

impl JobDescription {
    /// Returns `None` for blank input: a batch needs something to match against.
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Arc::from(trimmed)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentTextExtractor for CountingExtractor {
        async fn extract(&self, bytes: Bytes) -> Result<String, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    #[tokio::test]
    async fn test_text_is_extracted_once_and_cached() {
        let extractor = CountingExtractor {
            calls: AtomicUsize::new(0),
        };
        let doc = SourceDocument::new("alice.pdf", "Alice resume".as_bytes().to_vec());

        assert_eq!(doc.text(&extractor).await.unwrap(), "Alice resume");
        assert_eq!(doc.text(&extractor).await.unwrap(), "Alice resume");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blank_job_description_rejected() {
        assert!(JobDescription::new("   \n\t").is_none());
    }

    #[test]
    fn test_job_description_is_trimmed() {
        let jd = JobDescription::new("  Senior Rust engineer \n").unwrap();
        assert_eq!(jd.as_str(), "Senior Rust engineer");
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let doc = SourceDocument::new("bob.pdf", vec![0u8; 4096]);
        let rendered = format!("{doc:?}");
        assert!(rendered.contains("bob.pdf"));
        assert!(rendered.contains("4096"));
    }
}
