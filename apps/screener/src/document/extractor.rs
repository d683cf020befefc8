//! Plain-text extraction from uploaded resume files.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document is not a readable PDF: {0}")]
    Malformed(String),

    #[error("PDF parser aborted: {0}")]
    Aborted(String),
}

/// Converts a raw document into plain text.
///
/// A document without any extractable text yields an empty string, not an error.
#[async_trait]
pub trait DocumentTextExtractor: Send + Sync {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractionError>;
}

/// PDF extractor backed by `pdf-extract`. Parsing runs on the blocking pool since
/// large resumes can take a while and the parser is fully synchronous.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

#[async_trait]
impl DocumentTextExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractionError> {
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        // pdf-extract panics on some corrupt inputs; the join error carries that panic.
        .map_err(|e| ExtractionError::Aborted(e.to_string()))?
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let page_count = pages.len();
        let text = join_pages(pages);
        debug!(page_count, chars = text.len(), "Extracted PDF text");
        Ok(text)
    }
}

/// Joins page texts in document order with a line break, skipping pages that carry no text.
pub fn join_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = String>,
{
    pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_pages_skips_blank_pages() {
        let pages = vec![
            "Page one".to_string(),
            "   \n".to_string(),
            String::new(),
            "Page three".to_string(),
        ];
        assert_eq!(join_pages(pages), "Page one\nPage three");
    }

    #[test]
    fn test_join_pages_all_blank_is_empty_text() {
        let pages = vec![String::new(), " ".to_string()];
        assert_eq!(join_pages(pages), "");
    }

    #[test]
    fn test_join_pages_preserves_order() {
        let pages = (1..=3).map(|n| format!("p{n}"));
        assert_eq!(join_pages(pages), "p1\np2\np3");
    }

    /// Minimal PDF with one page per entry. An empty string is a page with no text.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let page_count = pages.len();
        let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {page_count} >>", kids.join(" ")),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET")
            };
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref_at = pdf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        ));
        pdf.extend_from_slice(xref.as_bytes());
        pdf
    }

    #[tokio::test]
    async fn test_pdf_pages_come_out_in_document_order() {
        let pdf = build_pdf(&["Alpha", "", "Omega"]);

        let text = PdfTextExtractor.extract(Bytes::from(pdf)).await.unwrap();

        let alpha = text.find("Alpha").expect("first page text");
        let omega = text.find("Omega").expect("last page text");
        assert!(alpha < omega);
        assert!(text[alpha..omega].contains('\n'));
    }

    #[tokio::test]
    async fn test_pdf_without_text_extracts_to_empty_string() {
        let pdf = build_pdf(&["", ""]);
        let text = PdfTextExtractor.extract(Bytes::from(pdf)).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail_extraction() {
        let result = PdfTextExtractor
            .extract(Bytes::from_static(b"this is definitely not a pdf"))
            .await;
        assert!(result.is_err());
    }
}
