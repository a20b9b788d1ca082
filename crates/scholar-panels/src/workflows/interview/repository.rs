use serde::{Deserialize, Serialize};

use super::domain::{Candidate, CandidateId, DestinationTag, Evaluator, MarkSheet, PanelId, Scope};

/// Durable store of examination records, keyed by candidate id.
pub trait CandidateRepository: Send + Sync {
    fn list_candidates(&self, scope: &Scope) -> Result<Vec<Candidate>, RepositoryError>;
    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError>;
    /// Seat `ids` on `panel`. Either every id is written or none is. Forwarded records only
    /// take the new panel reference and keep the roster that examined them.
    fn bulk_assign_panel(
        &self,
        ids: &[CandidateId],
        panel: PanelId,
        evaluators: &[Evaluator],
    ) -> Result<Vec<Candidate>, RepositoryError>;
    fn update_marks(&self, id: &CandidateId, sheet: MarkSheet) -> Result<Candidate, RepositoryError>;
    fn forward(
        &self,
        id: &CandidateId,
        destination: &DestinationTag,
    ) -> Result<Candidate, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("candidate {0} not found")]
    NotFound(CandidateId),
    #[error("candidate {0} has been forwarded and is read-only")]
    Frozen(CandidateId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sink for user-facing success and error messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Deliver a notification, logging rather than propagating a sink failure.
pub(crate) fn deliver<N: Notifier + ?Sized>(
    notifier: &N,
    level: NotificationLevel,
    message: impl Into<String>,
) {
    let notification = Notification::new(level, message);
    if let Err(err) = notifier.notify(notification) {
        tracing::warn!(error = %err, "failed to deliver notification");
    }
}
