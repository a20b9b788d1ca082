use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Candidate, CandidateId, PanelId};
use super::repository::{deliver, CandidateRepository, NotificationLevel, Notifier, RepositoryError};
use super::routing::FacultyRouting;
use super::session::ScoringSession;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("forwarding {0} requires an explicit consent acknowledgment")]
    ConsentRequired(CandidateId),
    #[error("candidate {0} has already been forwarded")]
    AlreadyForwarded(CandidateId),
    #[error("candidate {0} is not seated on a panel and cannot be forwarded")]
    Unassigned(CandidateId),
    #[error("candidate {0} not found")]
    NotFound(CandidateId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-candidate results of a panel-wide forward. Successful forwards are kept even when
/// others fail.
#[derive(Debug)]
pub struct BulkForwardReport {
    pub panel: PanelId,
    pub outcomes: Vec<(CandidateId, Result<Candidate, ForwardError>)>,
}

impl BulkForwardReport {
    pub fn forwarded(&self) -> usize {
        self.outcomes.iter().filter(|(_, result)| result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.forwarded()
    }

    pub fn summary(&self) -> BulkForwardSummary {
        BulkForwardSummary {
            panel: self.panel,
            forwarded: self.forwarded(),
            failed: self.failed(),
            failures: self
                .outcomes
                .iter()
                .filter_map(|(id, result)| {
                    result.as_ref().err().map(|err| ForwardFailure {
                        candidate_id: id.clone(),
                        reason: err.to_string(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkForwardSummary {
    pub panel: PanelId,
    pub forwarded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ForwardFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForwardFailure {
    pub candidate_id: CandidateId,
    pub reason: String,
}

/// One-way transition that freezes a record and routes it to its faculty.
pub struct ForwardingGate<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    routing: FacultyRouting,
    session: Arc<ScoringSession<R, N>>,
}

impl<R, N> ForwardingGate<R, N>
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        routing: FacultyRouting,
        session: Arc<ScoringSession<R, N>>,
    ) -> Self {
        Self {
            repository,
            notifier,
            routing,
            session,
        }
    }

    pub fn routing(&self) -> &FacultyRouting {
        &self.routing
    }

    pub fn forward_one(
        &self,
        id: &CandidateId,
        consent_acknowledged: bool,
    ) -> Result<Candidate, ForwardError> {
        let candidate = self
            .repository
            .fetch(id)?
            .ok_or_else(|| ForwardError::NotFound(id.clone()))?;
        let result = self.forward_candidate(&candidate, consent_acknowledged);
        match &result {
            Ok(forwarded) => deliver(
                self.notifier.as_ref(),
                NotificationLevel::Success,
                format!(
                    "{} forwarded to {}",
                    forwarded.name,
                    forwarded
                        .destination
                        .as_ref()
                        .map(|tag| tag.0.as_str())
                        .unwrap_or(self.routing.fallback().0.as_str())
                ),
            ),
            Err(err) => deliver(
                self.notifier.as_ref(),
                NotificationLevel::Error,
                format!("Could not forward {} ({id}): {err}", candidate.name),
            ),
        }
        result
    }

    /// Forward every not-yet-forwarded member of `panel`. Best effort; nothing is rolled back.
    pub fn forward_all(
        &self,
        panel: PanelId,
        members: &[Candidate],
        consent_acknowledged: bool,
    ) -> BulkForwardReport {
        let outcomes: Vec<_> = members
            .iter()
            .filter(|candidate| candidate.assigned_panel == Some(panel) && !candidate.forwarded)
            .map(|candidate| {
                (
                    candidate.id.clone(),
                    self.forward_candidate(candidate, consent_acknowledged),
                )
            })
            .collect();
        let report = BulkForwardReport { panel, outcomes };

        info!(
            panel = panel.0,
            forwarded = report.forwarded(),
            failed = report.failed(),
            "panel forward finished"
        );
        let level = if report.failed() == 0 {
            NotificationLevel::Success
        } else {
            NotificationLevel::Warning
        };
        deliver(
            self.notifier.as_ref(),
            level,
            format!(
                "{panel}: {} forwarded, {} failed",
                report.forwarded(),
                report.failed()
            ),
        );
        report
    }

    fn forward_candidate(
        &self,
        candidate: &Candidate,
        consent_acknowledged: bool,
    ) -> Result<Candidate, ForwardError> {
        if candidate.forwarded {
            return Err(ForwardError::AlreadyForwarded(candidate.id.clone()));
        }
        if candidate.assigned_panel.is_none() {
            return Err(ForwardError::Unassigned(candidate.id.clone()));
        }
        if !consent_acknowledged {
            return Err(ForwardError::ConsentRequired(candidate.id.clone()));
        }

        let destination = self.routing.destination_for(&candidate.department);
        match self.repository.forward(&candidate.id, &destination) {
            Ok(forwarded) => {
                self.session.mark_forwarded(&candidate.id);
                info!(candidate = %candidate.id, destination = %destination.0, "candidate forwarded");
                Ok(forwarded)
            }
            Err(err) => {
                warn!(candidate = %candidate.id, error = %err, "forward failed");
                Err(ForwardError::Repository(err))
            }
        }
    }
}
