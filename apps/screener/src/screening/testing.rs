//! In-memory fakes for the pipeline seams. Test-only.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::document::extractor::{DocumentTextExtractor, ExtractionError};
use crate::document::SourceDocument;
use crate::oracle::{OracleClient, OracleError};
use crate::screening::hooks::{HookError, MailMessage, Mailer, ShortlistHook};
use crate::screening::models::{CandidateRecord, Outcome, PHONE_NOT_AVAILABLE};

/// Bytes starting with this marker fail extraction.
pub const CORRUPT_MARKER: &str = "CORRUPT";

/// Treats document bytes as UTF-8 text.
pub struct Utf8Extractor;

#[async_trait]
impl DocumentTextExtractor for Utf8Extractor {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractionError> {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.starts_with(CORRUPT_MARKER) {
            return Err(ExtractionError::Malformed("bad xref table".to_string()));
        }
        Ok(text)
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Delayed(Duration, String),
    Unavailable(u16),
    Hang,
    Panic,
}

/// Oracle answering from per-resume-text scripts. The last reply of a script repeats.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn with(self, resume_text: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(resume_text.to_string(), replies.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, resume_text: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(resume_text)
            .unwrap_or_else(|| panic!("no script for resume text {resume_text:?}"));
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    async fn query(
        &self,
        resume_text: &str,
        _job_description: &str,
    ) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_reply(resume_text) {
            Reply::Text(text) => Ok(text),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Unavailable(status) => Err(OracleError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            Reply::Hang => std::future::pending().await,
            Reply::Panic => panic!("oracle client bug for {resume_text:?}"),
        }
    }
}

/// A well-formed oracle response.
pub fn labeled_response(name: &str, match_percentage: u32, email: Option<&str>) -> String {
    let mut response = format!(
        "Name: {name}\nSkills: Rust, SQL\nExperience: 5 Years\nMatch Percentage: {match_percentage}%\nPhone Number: 555-0100\n"
    );
    if let Some(email) = email {
        response.push_str(&format!("Email: {email}\n"));
    }
    response
}

pub fn outcome_with_email(name: &str, match_percentage: u32, email: Option<&str>) -> Outcome {
    Outcome {
        document: Arc::new(SourceDocument::new(name, name.as_bytes().to_vec())),
        record: CandidateRecord {
            name: name.trim_end_matches(".pdf").to_string(),
            skills: vec!["Rust".to_string()],
            skills_text: "Rust".to_string(),
            experience_years: 5,
            match_percentage,
            phone: PHONE_NOT_AVAILABLE.to_string(),
            email: email.map(str::to_string),
        },
        shortlisted: match_percentage >= 70,
    }
}

/// Remembers every outcome it sees; optionally fails afterwards.
#[derive(Default)]
pub struct RecordingHook {
    seen: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingHook {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShortlistHook for RecordingHook {
    fn name(&self) -> &'static str {
        if self.fail {
            "failing"
        } else {
            "recording"
        }
    }

    async fn on_shortlisted(&self, outcome: &Outcome) -> Result<(), HookError> {
        self.seen
            .lock()
            .unwrap()
            .push(outcome.document.name().to_string());
        if self.fail {
            return Err(HookError::Notification("smtp relay refused".to_string()));
        }
        Ok(())
    }
}

/// Panics on every shortlisted outcome.
pub struct PanickingHook;

#[async_trait]
impl ShortlistHook for PanickingHook {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn on_shortlisted(&self, outcome: &Outcome) -> Result<(), HookError> {
        panic!("hook blew up on {}", outcome.document.name());
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), HookError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
