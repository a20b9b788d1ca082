use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::workflows::interview::domain::{
    Candidate, CandidateId, DestinationTag, Evaluator, MarkSheet, PanelId, Scope,
};
use crate::workflows::interview::repository::{
    CandidateRepository, Notification, NotificationLevel, Notifier, NotifyError, RepositoryError,
};
use crate::workflows::interview::routing::FacultyRouting;
use crate::workflows::interview::service::{PanelAllocationService, ServiceSettings};
use crate::workflows::interview::{panel_router, Mark};

pub(super) const DEBOUNCE: Duration = Duration::from_secs(3);

pub(super) fn scope() -> Scope {
    Scope::new("Science", "Physics")
}

pub(super) fn settings() -> ServiceSettings {
    ServiceSettings {
        scope: scope(),
        autosave_debounce: DEBOUNCE,
        routing: FacultyRouting::new("faculty-office").with_route("Physics", "faculty-science"),
    }
}

pub(super) fn evaluator(name: &str) -> Evaluator {
    Evaluator::new(name, "Professor", "State University")
}

/// Two-seat roster unique to `panel`.
pub(super) fn panel_roster(panel: u32) -> Vec<Evaluator> {
    vec![
        Evaluator::new(format!("Dr. Chair {panel}"), "Professor", "State University"),
        Evaluator::new(format!("Dr. Member {panel}"), "Reader", "City College"),
    ]
}

pub(super) fn roster(size: usize) -> Vec<Evaluator> {
    ["Dr. Meera Iyer", "Dr. Arjun Rao", "Dr. Lina Das"]
        .iter()
        .take(size)
        .map(|name| evaluator(name))
        .collect()
}

pub(super) fn id(value: &str) -> CandidateId {
    CandidateId(value.to_string())
}

/// `count` fresh registrations named `c-01`, `c-02`, ... in list order.
pub(super) fn registrations(count: usize) -> Vec<Candidate> {
    (1..=count)
        .map(|n| {
            Candidate::registered(
                format!("c-{n:02}"),
                format!("Scholar {n}"),
                format!("APP-{n:03}"),
                "Physics",
            )
        })
        .collect()
}

pub(super) fn graded_on(mut candidate: Candidate, panel: PanelId, marks: &[Mark]) -> Candidate {
    candidate.assigned_panel = Some(panel);
    candidate.panel_evaluators = roster(marks.len().max(1));
    candidate.marks = marks.to_vec();
    candidate
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    candidates: Mutex<Vec<Candidate>>,
    failing_panels: Mutex<HashSet<PanelId>>,
    fail_reads: AtomicBool,
    fail_saves: AtomicBool,
    save_hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    assign_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

impl MemoryRepository {
    pub(super) fn seeded(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            ..Self::default()
        }
    }

    pub(super) fn push(&self, candidate: Candidate) {
        self.candidates
            .lock()
            .expect("repository mutex poisoned")
            .push(candidate);
    }

    pub(super) fn get(&self, id: &CandidateId) -> Candidate {
        self.candidates
            .lock()
            .expect("repository mutex poisoned")
            .iter()
            .find(|candidate| &candidate.id == id)
            .cloned()
            .expect("candidate present")
    }

    pub(super) fn panel_of(&self, id: &CandidateId) -> Option<PanelId> {
        self.get(id).assigned_panel
    }

    pub(super) fn sizes(&self) -> Vec<usize> {
        let candidates = self.candidates.lock().expect("repository mutex poisoned");
        let max = candidates
            .iter()
            .filter_map(|candidate| candidate.assigned_panel)
            .map(|panel| panel.0)
            .max()
            .unwrap_or(0);
        (1..=max)
            .map(|panel| {
                candidates
                    .iter()
                    .filter(|candidate| candidate.assigned_panel == Some(PanelId(panel)))
                    .count()
            })
            .collect()
    }

    pub(super) fn fail_assignments_to(&self, panel: PanelId) {
        self.failing_panels
            .lock()
            .expect("repository mutex poisoned")
            .insert(panel);
    }

    pub(super) fn accept_assignments(&self) {
        self.failing_panels
            .lock()
            .expect("repository mutex poisoned")
            .clear();
    }

    pub(super) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` while the next mark save is in flight.
    pub(super) fn during_next_save(&self, hook: impl FnOnce() + Send + 'static) {
        *self.save_hook.lock().expect("repository mutex poisoned") = Some(Box::new(hook));
    }

    pub(super) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(super) fn assign_calls(&self) -> usize {
        self.assign_calls.load(Ordering::SeqCst)
    }

    pub(super) fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

impl CandidateRepository for MemoryRepository {
    fn list_candidates(&self, _scope: &Scope) -> Result<Vec<Candidate>, RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("read timed out".to_string()));
        }
        Ok(self
            .candidates
            .lock()
            .expect("repository mutex poisoned")
            .clone())
    }

    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Ok(self
            .candidates
            .lock()
            .expect("repository mutex poisoned")
            .iter()
            .find(|candidate| &candidate.id == id)
            .cloned())
    }

    fn bulk_assign_panel(
        &self,
        ids: &[CandidateId],
        panel: PanelId,
        evaluators: &[Evaluator],
    ) -> Result<Vec<Candidate>, RepositoryError> {
        self.assign_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_panels
            .lock()
            .expect("repository mutex poisoned")
            .contains(&panel)
        {
            return Err(RepositoryError::Unavailable("write rejected".to_string()));
        }

        let mut candidates = self.candidates.lock().expect("repository mutex poisoned");
        let mut updated = Vec::new();
        for candidate in candidates.iter_mut().filter(|c| ids.contains(&c.id)) {
            candidate.assigned_panel = Some(panel);
            if !candidate.forwarded {
                candidate.panel_evaluators = evaluators.to_vec();
            }
            updated.push(candidate.clone());
        }
        Ok(updated)
    }

    fn update_marks(&self, id: &CandidateId, sheet: MarkSheet) -> Result<Candidate, RepositoryError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.save_hook.lock().expect("repository mutex poisoned").take();
        if let Some(hook) = hook {
            hook();
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }

        let mut candidates = self.candidates.lock().expect("repository mutex poisoned");
        let candidate = candidates
            .iter_mut()
            .find(|candidate| &candidate.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        if candidate.forwarded {
            return Err(RepositoryError::Frozen(id.clone()));
        }
        candidate.marks = sheet.marks;
        candidate.average = Some(sheet.average);
        Ok(candidate.clone())
    }

    fn forward(
        &self,
        id: &CandidateId,
        destination: &DestinationTag,
    ) -> Result<Candidate, RepositoryError> {
        let mut candidates = self.candidates.lock().expect("repository mutex poisoned");
        let candidate = candidates
            .iter_mut()
            .find(|candidate| &candidate.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        if candidate.forwarded {
            return Err(RepositoryError::Frozen(id.clone()));
        }
        candidate.forwarded = true;
        candidate.destination = Some(destination.clone());
        candidate.forwarded_at = Some(Utc::now());
        Ok(candidate.clone())
    }
}

pub(super) struct UnavailableRepository;

impl CandidateRepository for UnavailableRepository {
    fn list_candidates(&self, _scope: &Scope) -> Result<Vec<Candidate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn bulk_assign_panel(
        &self,
        _ids: &[CandidateId],
        _panel: PanelId,
        _evaluators: &[Evaluator],
    ) -> Result<Vec<Candidate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_marks(
        &self,
        _id: &CandidateId,
        _sheet: MarkSheet,
    ) -> Result<Candidate, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn forward(
        &self,
        _id: &CandidateId,
        _destination: &DestinationTag,
    ) -> Result<Candidate, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn count(&self, level: NotificationLevel) -> usize {
        self.events()
            .iter()
            .filter(|event| event.level == level)
            .count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) type MemoryService = PanelAllocationService<MemoryRepository, MemoryNotifier>;

/// Service over `candidates` with `panels` two-evaluator panels already seated and balanced.
pub(super) fn build_service(
    candidates: Vec<Candidate>,
    panels: usize,
) -> (MemoryService, Arc<MemoryRepository>, Arc<MemoryNotifier>) {
    let repository = Arc::new(MemoryRepository::seeded(candidates));
    let notifier = Arc::new(MemoryNotifier::default());
    let service = PanelAllocationService::new(repository.clone(), notifier.clone(), settings());
    for _ in 0..panels {
        service.create_panel(roster(2)).expect("panel seats");
    }
    (service, repository, notifier)
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    panel_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
