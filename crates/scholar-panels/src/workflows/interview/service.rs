use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{info, warn};

use super::allocation::{self, AllocationEngine, AllocationOutcome, AllocationPlan};
use super::domain::{Candidate, CandidateId, Evaluator, Panel, PanelId, Scope};
use super::forwarding::{BulkForwardReport, ForwardError, ForwardingGate};
use super::panels::{PanelError, PanelRegistry};
use super::repository::{deliver, CandidateRepository, NotificationLevel, Notifier, RepositoryError};
use super::roster::{build_rosters, PanelRoster};
use super::routing::FacultyRouting;
use super::session::{EditSnapshot, EditState, ScoringSession, SessionError};

pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_secs(3);

/// Construction-time settings for the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub scope: Scope,
    pub autosave_debounce: Duration,
    pub routing: FacultyRouting,
}

impl ServiceSettings {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            autosave_debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
            routing: FacultyRouting::default(),
        }
    }
}

/// Error raised by the panel allocation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Panel(#[from] PanelError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Forward(#[from] ForwardError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a panel creation or removal, with the allocation pass it triggered.
#[derive(Debug)]
pub struct PanelChange {
    pub panels: Vec<Panel>,
    pub allocation: AllocationOutcome,
}

/// Stands in for a removed panel. Live ids start at 1, so no panel ever matches it.
const DETACHED_PANEL: PanelId = PanelId(0);

#[derive(Debug, Default)]
struct AllocationLedger {
    last_candidate_count: Option<usize>,
    /// Panel references rewritten by a removal that the store has not accepted yet.
    unresolved: HashMap<CandidateId, PanelId>,
}

impl AllocationLedger {
    /// Stored records as the current panel numbering sees them.
    fn effective(&self, stored: &[Candidate]) -> Vec<Candidate> {
        stored
            .iter()
            .cloned()
            .map(|mut candidate| {
                if let Some(panel) = self.unresolved.get(&candidate.id) {
                    candidate.assigned_panel = Some(*panel);
                }
                candidate
            })
            .collect()
    }

    /// Drop every pending reference except those whose write just failed.
    fn settle(&mut self, outcome: &AllocationOutcome) {
        let failed: HashSet<&CandidateId> = outcome
            .failures()
            .into_iter()
            .flat_map(|write| write.candidates.iter())
            .collect();
        self.unresolved.retain(|id, _| failed.contains(id));
    }
}

/// Context object composing the panel registry, allocation engine, scoring session and
/// forwarding gate over one scope's store and notification sink.
pub struct PanelAllocationService<R, N> {
    scope: Scope,
    repository: Arc<R>,
    notifier: Arc<N>,
    registry: Mutex<PanelRegistry>,
    engine: AllocationEngine<R>,
    session: Arc<ScoringSession<R, N>>,
    gate: ForwardingGate<R, N>,
    ledger: Mutex<AllocationLedger>,
}

impl<R, N> PanelAllocationService<R, N>
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, settings: ServiceSettings) -> Self {
        Self::with_registry(repository, notifier, settings, PanelRegistry::new())
    }

    pub fn with_registry(
        repository: Arc<R>,
        notifier: Arc<N>,
        settings: ServiceSettings,
        registry: PanelRegistry,
    ) -> Self {
        let ServiceSettings {
            scope,
            autosave_debounce,
            routing,
        } = settings;

        let session = Arc::new(ScoringSession::new(
            repository.clone(),
            notifier.clone(),
            autosave_debounce,
        ));
        let gate = ForwardingGate::new(
            repository.clone(),
            notifier.clone(),
            routing,
            session.clone(),
        );

        Self {
            scope,
            engine: AllocationEngine::new(repository.clone()),
            repository,
            notifier,
            registry: Mutex::new(registry),
            session,
            gate,
            ledger: Mutex::new(AllocationLedger::default()),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn panels(&self) -> Vec<Panel> {
        self.registry().panels().to_vec()
    }

    pub fn candidates(&self) -> Result<Vec<Candidate>, ServiceError> {
        Ok(self.repository.list_candidates(&self.scope)?)
    }

    pub fn create_panel(&self, evaluators: Vec<Evaluator>) -> Result<PanelChange, ServiceError> {
        let mut ledger = self.ledger();
        let created = self.registry().create(evaluators);
        let panel = self.surface(created)?;
        info!(panel = panel.id.0, evaluators = panel.evaluator_count(), "panel created");

        let allocation = self.rebalance_locked(&mut ledger)?;
        Ok(PanelChange {
            panels: self.panels(),
            allocation,
        })
    }

    /// Replace a panel's roster and refresh the roster snapshot on its unforwarded candidates.
    pub fn update_panel(
        &self,
        id: PanelId,
        evaluators: Vec<Evaluator>,
    ) -> Result<Panel, ServiceError> {
        let ledger = self.ledger();
        let replaced = self.registry().update(id, evaluators.clone());
        let previous = self.surface(replaced)?;

        let panel = Panel { id, evaluators };
        if previous == panel.evaluators {
            return Ok(panel);
        }

        let members: Vec<CandidateId> = ledger
            .effective(&self.candidates()?)
            .into_iter()
            .filter(|candidate| candidate.assigned_panel == Some(id) && !candidate.forwarded)
            .map(|candidate| candidate.id)
            .collect();
        if !members.is_empty() {
            let refreshed = self
                .repository
                .bulk_assign_panel(&members, id, &panel.evaluators);
            if let Err(err) = refreshed {
                warn!(panel = id.0, error = %err, "failed to refresh candidate rosters");
                deliver(
                    self.notifier.as_ref(),
                    NotificationLevel::Error,
                    format!("{id} updated, but candidate records were not refreshed: {err}"),
                );
                return Err(ServiceError::Repository(err));
            }
        }

        info!(panel = id.0, refreshed = members.len(), "panel roster updated");
        Ok(panel)
    }

    /// Remove a panel, renumber the rest densely and redistribute its candidates.
    ///
    /// Records whose renumbered panel could not be written keep resolving through the ledger
    /// until a later pass stores them.
    pub fn remove_panel(&self, id: PanelId) -> Result<PanelChange, ServiceError> {
        let mut ledger = self.ledger();
        let stored = self.candidates()?;
        let removed = self.registry().remove(id);
        let renumbering = self.surface(removed)?;
        info!(panel = id.0, renumbered = renumbering.moves.len(), "panel removed");

        let effective = ledger.effective(&stored);
        for candidate in effective {
            let Some(old) = candidate.assigned_panel else {
                continue;
            };
            let Some(resolved) = renumbering.resolve(old) else {
                if candidate.forwarded || candidate.has_been_graded(candidate.marks.len()) {
                    warn!(
                        candidate = %candidate.id,
                        removed_panel = old.0,
                        "graded candidate lost its panel; redistributing"
                    );
                }
                ledger.unresolved.insert(candidate.id, DETACHED_PANEL);
                continue;
            };
            if resolved != old {
                ledger.unresolved.insert(candidate.id, resolved);
            }
        }

        let panels = self.panels();
        let plan = self.plan_locked(&ledger, &stored, &panels);
        let allocation = self.persist_locked(&mut ledger, plan, &panels, stored.len());
        Ok(PanelChange { panels, allocation })
    }

    /// Run a full allocation pass over the current snapshot.
    pub fn rebalance(&self) -> Result<AllocationOutcome, ServiceError> {
        let mut ledger = self.ledger();
        self.rebalance_locked(&mut ledger)
    }

    /// Re-run allocation only when the candidate set size changed since the last pass.
    pub fn refresh(&self) -> Result<Option<AllocationOutcome>, ServiceError> {
        let mut ledger = self.ledger();
        let candidates = self.candidates()?;
        if ledger.last_candidate_count == Some(candidates.len()) {
            return Ok(None);
        }

        let panels = self.panels();
        let plan = self.plan_locked(&ledger, &candidates, &panels);
        Ok(Some(self.persist_locked(
            &mut ledger,
            plan,
            &panels,
            candidates.len(),
        )))
    }

    /// Per-panel score sheets in assignment order.
    pub fn rosters(&self) -> Result<Vec<PanelRoster>, ServiceError> {
        let ledger = self.ledger();
        let candidates = ledger.effective(&self.candidates()?);
        drop(ledger);
        let panels = self.panels();
        let assignments = allocation::allocate(&candidates, &panels);
        Ok(build_rosters(&panels, &assignments, &candidates))
    }

    pub fn begin_edit(&self, id: &CandidateId) -> Result<EditSnapshot, ServiceError> {
        let opened = self.session.begin_edit(id);
        Ok(self.surface(opened)?)
    }

    pub fn input_mark(
        &self,
        id: &CandidateId,
        slot: usize,
        raw: &str,
    ) -> Result<EditSnapshot, ServiceError> {
        let applied = self.session.on_mark_input(id, slot, raw);
        Ok(self.surface(applied)?)
    }

    /// Save immediately and close the edit buffer. Save failures are already notified.
    pub fn commit_marks(&self, id: &CandidateId) -> Result<Candidate, ServiceError> {
        Ok(self.session.commit(id)?)
    }

    pub fn close_edit(&self, id: &CandidateId) -> bool {
        self.session.close(id)
    }

    pub fn edit_state(&self, id: &CandidateId) -> EditState {
        self.session.state(id)
    }

    pub fn session(&self) -> &ScoringSession<R, N> {
        &self.session
    }

    pub fn forward_candidate(
        &self,
        id: &CandidateId,
        consent_acknowledged: bool,
    ) -> Result<Candidate, ServiceError> {
        Ok(self.gate.forward_one(id, consent_acknowledged)?)
    }

    pub fn forward_panel(
        &self,
        panel: PanelId,
        consent_acknowledged: bool,
    ) -> Result<BulkForwardReport, ServiceError> {
        if self.registry().get(panel).is_none() {
            let missing = Err(PanelError::NotFound(panel));
            return self.surface(missing).map_err(Into::into);
        }
        let members = self.ledger().effective(&self.candidates()?);
        Ok(self.gate.forward_all(panel, &members, consent_acknowledged))
    }

    fn rebalance_locked(
        &self,
        ledger: &mut AllocationLedger,
    ) -> Result<AllocationOutcome, ServiceError> {
        let candidates = self.candidates()?;
        let panels = self.panels();
        let plan = self.plan_locked(ledger, &candidates, &panels);
        Ok(self.persist_locked(ledger, plan, &panels, candidates.len()))
    }

    /// Plan over the effective snapshot, writing whatever differs from what is stored.
    fn plan_locked(
        &self,
        ledger: &AllocationLedger,
        stored: &[Candidate],
        panels: &[Panel],
    ) -> AllocationPlan {
        let mut plan = allocation::plan(&ledger.effective(stored), panels);
        plan.writes = allocation::stale_writes(&plan.assignments, stored, panels);
        plan
    }

    fn persist_locked(
        &self,
        ledger: &mut AllocationLedger,
        plan: AllocationPlan,
        panels: &[Panel],
        candidate_count: usize,
    ) -> AllocationOutcome {
        let outcome = self.engine.persist(plan, panels);
        ledger.last_candidate_count = Some(candidate_count);
        ledger.settle(&outcome);

        let failures = outcome.failures();
        if !failures.is_empty() {
            let labels: Vec<String> = failures
                .iter()
                .map(|write| {
                    let reason = write
                        .result
                        .as_ref()
                        .err()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    format!("{} ({} candidates): {reason}", write.panel, write.candidates.len())
                })
                .collect();
            deliver(
                self.notifier.as_ref(),
                NotificationLevel::Error,
                format!("Panel assignments not saved for {}", labels.join("; ")),
            );
        }
        outcome
    }

    /// Report validation and structural rejections to the user before returning them.
    fn surface<T, E>(&self, result: Result<T, E>) -> Result<T, E>
    where
        E: std::fmt::Display,
    {
        if let Err(err) = &result {
            deliver(self.notifier.as_ref(), NotificationLevel::Error, err.to_string());
        }
        result
    }

    fn registry(&self) -> MutexGuard<'_, PanelRegistry> {
        self.registry.lock().expect("panel registry mutex poisoned")
    }

    fn ledger(&self) -> MutexGuard<'_, AllocationLedger> {
        self.ledger.lock().expect("allocation ledger mutex poisoned")
    }
}
