//! Transactional email: templated notifications delivered over SMTP.
//!
//! Handlers never talk to a transport directly. They go through [`Notifier`],
//! which renders a template and hands the result to a [`Mailer`]. A failed
//! send is returned to the caller as-is, with no retry and no queue. Callers that
//! treat email as best effort use [`Notifier::dispatch`] instead.

pub mod smtp;
pub mod templates;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::application::{ApplicationStatus, JobApplication};

pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery is not configured")]
    NotConfigured,

    #[error("invalid email address '{0}'")]
    InvalidAddress(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// A rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEmail {
    pub message_id: String,
}

/// Delivers one message and returns its message id.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<String, EmailError>;
}

/// Stand-in used when SMTP credentials are absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn deliver(&self, _email: &OutgoingEmail) -> Result<String, EmailError> {
        Err(EmailError::NotConfigured)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    HrNewApplication,
    ApplicantConfirmation,
    StatusUpdate,
    Custom,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::HrNewApplication => "hr_new_application",
            NotificationKind::ApplicantConfirmation => "applicant_confirmation",
            NotificationKind::StatusUpdate => "status_update",
            NotificationKind::Custom => "custom",
        })
    }
}

/// A notification kind together with the data its template interpolates.
#[derive(Debug, Clone)]
pub enum Notification {
    HrNewApplication {
        application: JobApplication,
    },
    ApplicantConfirmation {
        application: JobApplication,
    },
    StatusUpdate {
        application: JobApplication,
        previous: ApplicationStatus,
    },
    Custom {
        applicant_name: String,
        subject: String,
        message: String,
    },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::HrNewApplication { .. } => NotificationKind::HrNewApplication,
            Notification::ApplicantConfirmation { .. } => NotificationKind::ApplicantConfirmation,
            Notification::StatusUpdate { .. } => NotificationKind::StatusUpdate,
            Notification::Custom { .. } => NotificationKind::Custom,
        }
    }
}

/// Values shared by every template and routing decision.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub company_name: String,
    pub frontend_url: String,
    /// `None` when SMTP is not configured.
    pub hr_mailbox: Option<String>,
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    settings: Arc<NotificationSettings>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, settings: NotificationSettings) -> Self {
        Self {
            mailer,
            settings: Arc::new(settings),
        }
    }

    pub fn hr_mailbox(&self) -> Option<&str> {
        self.settings.hr_mailbox.as_deref()
    }

    /// Renders and delivers synchronously. Errors go straight back to the caller.
    pub async fn send(
        &self,
        notification: &Notification,
        recipient: &str,
    ) -> Result<SentEmail, EmailError> {
        let rendered = templates::render(notification, &self.settings);
        let email = OutgoingEmail {
            to: recipient.to_string(),
            subject: rendered.subject,
            html: rendered.html,
        };
        let message_id = self.mailer.deliver(&email).await?;
        info!(
            "Sent {} email to {recipient} ({message_id})",
            notification.kind()
        );
        Ok(SentEmail { message_id })
    }

    /// Best-effort send on a background task. Failures are logged and go no further.
    pub fn dispatch(&self, notification: Notification, recipient: String) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&notification, &recipient).await {
                warn!(
                    "{} email to {recipient} was not sent: {e}",
                    notification.kind()
                );
            }
        })
    }
}
