use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use scholar_panels::workflows::interview::{
    Candidate, CandidateId, CandidateRepository, DestinationTag, Evaluator, MarkSheet,
    Notification, NotificationLevel, Notifier, NotifyError, PanelId, RepositoryError, Scope,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Candidate store kept in registration order. Forwarded records reject mark writes and keep
/// their examiner roster when reseated.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCandidateRepository {
    records: Arc<Mutex<Vec<Candidate>>>,
}

impl InMemoryCandidateRepository {
    pub(crate) fn seeded(candidates: Vec<Candidate>) -> Self {
        Self {
            records: Arc::new(Mutex::new(candidates)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl CandidateRepository for InMemoryCandidateRepository {
    fn list_candidates(&self, scope: &Scope) -> Result<Vec<Candidate>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let wildcard = scope.department.eq_ignore_ascii_case("general");
        Ok(guard
            .iter()
            .filter(|record| wildcard || record.department.eq_ignore_ascii_case(&scope.department))
            .cloned()
            .collect())
    }

    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.iter().find(|record| &record.id == id).cloned())
    }

    fn bulk_assign_panel(
        &self,
        ids: &[CandidateId],
        panel: PanelId,
        evaluators: &[Evaluator],
    ) -> Result<Vec<Candidate>, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let mut positions = Vec::with_capacity(ids.len());
        for id in ids {
            let position = guard
                .iter()
                .position(|record| &record.id == id)
                .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
            positions.push(position);
        }

        let mut updated = Vec::with_capacity(positions.len());
        for position in positions {
            let record = &mut guard[position];
            record.assigned_panel = Some(panel);
            if !record.forwarded {
                record.panel_evaluators = evaluators.to_vec();
            }
            updated.push(record.clone());
        }
        Ok(updated)
    }

    fn update_marks(&self, id: &CandidateId, sheet: MarkSheet) -> Result<Candidate, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        if record.forwarded {
            return Err(RepositoryError::Frozen(id.clone()));
        }
        record.marks = sheet.marks;
        record.average = Some(sheet.average);
        Ok(record.clone())
    }

    fn forward(
        &self,
        id: &CandidateId,
        destination: &DestinationTag,
    ) -> Result<Candidate, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        if record.forwarded {
            return Err(RepositoryError::Frozen(id.clone()));
        }
        record.forwarded = true;
        record.destination = Some(destination.clone());
        record.forwarded_at = Some(Utc::now());
        Ok(record.clone())
    }
}

/// Writes user-facing messages to the log and keeps them for the CLI to print.
#[derive(Default, Clone)]
pub(crate) struct TracingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl TracingNotifier {
    pub(crate) fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock().expect("notifier mutex poisoned"))
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        match notification.level {
            NotificationLevel::Error | NotificationLevel::Warning => {
                warn!(level = notification.level.label(), "{}", notification.message)
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(level = notification.level.label(), "{}", notification.message)
            }
        }
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Generated roster for panel `number`, used when no examiner list is supplied.
pub(crate) fn standing_roster(number: u32, size: usize) -> Vec<Evaluator> {
    (1..=size)
        .map(|seat| {
            Evaluator::new(
                format!("Examiner {number}.{seat}"),
                "Professor",
                "Board of Studies",
            )
        })
        .collect()
}
