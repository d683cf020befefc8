//! Shortlist hooks: side effects run once per shortlisted outcome.
//!
//! Hooks are fire-and-forget from the pipeline's point of view: a failure is reported
//! in the batch result but never changes the outcome or stops the batch.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use crate::screening::models::Outcome;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("notification failed: {0}")]
    Notification(String),
}

#[async_trait]
pub trait ShortlistHook: Send + Sync {
    /// Short stable name used in failure reports.
    fn name(&self) -> &'static str;

    async fn on_shortlisted(&self, outcome: &Outcome) -> Result<(), HookError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Persistence
// ────────────────────────────────────────────────────────────────────────────

/// Inserts every shortlisted candidate into the `shortlisted` table.
pub struct PersistenceHook {
    pool: PgPool,
}

impl PersistenceHook {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShortlistHook for PersistenceHook {
    fn name(&self) -> &'static str {
        "persistence"
    }

    async fn on_shortlisted(&self, outcome: &Outcome) -> Result<(), HookError> {
        let record = &outcome.record;
        sqlx::query(
            r#"
            INSERT INTO shortlisted
                (candidate_name, skills, experience, resume_file, match_percentage, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.name)
        .bind(&record.skills_text)
        .bind(to_db_int(record.experience_years))
        .bind(outcome.document.name())
        .bind(to_db_int(record.match_percentage))
        .bind(&record.phone)
        .execute(&self.pool)
        .await?;

        info!("Saved shortlisted candidate {}", record.name);
        Ok(())
    }
}

fn to_db_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// ────────────────────────────────────────────────────────────────────────────
// Notification
// ────────────────────────────────────────────────────────────────────────────

/// A composed mail ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Builds the fixed congratulation mail for a shortlisted candidate.
pub fn compose_congratulations(email: &str, name: &str, match_percentage: u32) -> MailMessage {
    MailMessage {
        to: email.to_string(),
        subject: format!("Congratulations {name}, you have been shortlisted!"),
        body: format!(
            "Dear {name},\n\n\
            We are pleased to inform you that your resume has been shortlisted \
            with a match score of {match_percentage}%.\n\
            Our recruitment team will contact you soon with the next steps.\n\n\
            Best regards,\n\
            Recruitment Team"
        ),
    }
}

/// Delivery backend for composed mails. SMTP itself lives outside this service.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), HookError>;
}

/// Posts each mail as JSON to an outbound relay.
pub struct WebhookMailer {
    client: Client,
    url: String,
}

impl WebhookMailer {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            url,
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), HookError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| HookError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HookError::Notification(format!(
                "mail relay returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Logs mails instead of sending them. Used when no relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), HookError> {
        info!(to = %message.to, subject = %message.subject, "Mail relay not configured, logging mail");
        Ok(())
    }
}

/// Congratulates shortlisted candidates that have an email address.
pub struct NotificationHook {
    mailer: Arc<dyn Mailer>,
}

impl NotificationHook {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl ShortlistHook for NotificationHook {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn on_shortlisted(&self, outcome: &Outcome) -> Result<(), HookError> {
        let record = &outcome.record;
        let Some(email) = record.email.as_deref() else {
            debug!("No email for {}, skipping notification", record.name);
            return Ok(());
        };

        let message = compose_congratulations(email, &record.name, record.match_percentage);
        self.mailer.send(&message).await?;
        info!("Notified {} <{}>", record.name, email);
        Ok(())
    }
}
