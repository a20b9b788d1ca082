//! Balanced assignment of candidates to panels.
//!
//! A pass partitions candidates into *fixed* ones (forwarded, or holding at least one grade on
//! a panel that still exists) and *movable* ones. Forwarded records that never had a panel are
//! frozen and left out of the pass entirely. Fixed candidates stay put. Movable candidates
//! are then dealt out in their existing order so that each panel's total occupancy, fixed
//! candidates included, reaches its fair share of `total / panels`, with the first
//! `total % panels` panels taking one extra.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{Candidate, CandidateId, Panel, PanelId, MAX_EVALUATORS};
use super::repository::{CandidateRepository, RepositoryError};

/// How a candidate is treated by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Fixed(PanelId),
    Movable,
    /// Would be fixed, but the recorded panel no longer exists.
    Dangling(PanelId),
    /// Forwarded without ever being seated; never assigned.
    Frozen,
}

/// Classify a candidate against the current panel set. Never cached between passes.
pub fn placement(candidate: &Candidate, panels: &[Panel]) -> Placement {
    let Some(recorded) = candidate.assigned_panel else {
        if candidate.forwarded {
            return Placement::Frozen;
        }
        return Placement::Movable;
    };

    match panels.iter().find(|panel| panel.id == recorded) {
        Some(panel) => {
            if candidate.forwarded || candidate.has_been_graded(panel.evaluator_count()) {
                Placement::Fixed(recorded)
            } else {
                Placement::Movable
            }
        }
        None => {
            if candidate.forwarded || candidate.has_been_graded(MAX_EVALUATORS) {
                Placement::Dangling(recorded)
            } else {
                Placement::Movable
            }
        }
    }
}

/// Result of the pure partition and assignment steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    /// Candidates per panel, fixed ones first in list order, then the movable ones dealt to it.
    pub assignments: BTreeMap<PanelId, Vec<CandidateId>>,
    /// Candidates whose stored panel or roster snapshot differs from the plan, grouped by panel.
    pub writes: BTreeMap<PanelId, Vec<CandidateId>>,
    pub dangling: Vec<CandidateId>,
}

impl AllocationPlan {
    pub fn panel_sizes(&self) -> BTreeMap<PanelId, usize> {
        self.assignments
            .iter()
            .map(|(panel, candidates)| (*panel, candidates.len()))
            .collect()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }

    pub fn panel_for(&self, candidate: &CandidateId) -> Option<PanelId> {
        self.assignments
            .iter()
            .find(|(_, ids)| ids.contains(candidate))
            .map(|(panel, _)| *panel)
    }
}

/// Candidate-to-panel map for the given snapshot.
pub fn allocate(candidates: &[Candidate], panels: &[Panel]) -> BTreeMap<PanelId, Vec<CandidateId>> {
    plan(candidates, panels).assignments
}

/// Per-panel occupancy targets, visiting panels in ascending id order.
pub fn panel_targets(total: usize, panel_ids: &[PanelId]) -> BTreeMap<PanelId, usize> {
    let mut ordered = panel_ids.to_vec();
    ordered.sort();
    if ordered.is_empty() {
        return BTreeMap::new();
    }

    let base = total / ordered.len();
    let remainder = total % ordered.len();
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id, base + usize::from(index < remainder)))
        .collect()
}

pub fn plan(candidates: &[Candidate], panels: &[Panel]) -> AllocationPlan {
    if panels.is_empty() {
        return AllocationPlan::default();
    }

    let mut ordered: Vec<&Panel> = panels.iter().collect();
    ordered.sort_by_key(|panel| panel.id);

    let mut assignments: BTreeMap<PanelId, Vec<CandidateId>> = ordered
        .iter()
        .map(|panel| (panel.id, Vec::new()))
        .collect();
    let mut movable = Vec::new();
    let mut dangling = Vec::new();
    let mut frozen = 0;

    for candidate in candidates {
        match placement(candidate, panels) {
            Placement::Fixed(panel) => {
                if let Some(slot) = assignments.get_mut(&panel) {
                    slot.push(candidate.id.clone());
                }
            }
            Placement::Dangling(panel) => {
                warn!(
                    candidate = %candidate.id,
                    recorded_panel = panel.0,
                    forwarded = candidate.forwarded,
                    "recorded panel no longer exists; treating candidate as movable"
                );
                dangling.push(candidate.id.clone());
                movable.push(candidate.id.clone());
            }
            Placement::Movable => movable.push(candidate.id.clone()),
            Placement::Frozen => {
                warn!(candidate = %candidate.id, "forwarded candidate has no panel; left unassigned");
                frozen += 1;
            }
        }
    }

    let panel_ids: Vec<PanelId> = ordered.iter().map(|panel| panel.id).collect();
    let targets = panel_targets(candidates.len() - frozen, &panel_ids);

    let mut cursor = 0;
    for id in &panel_ids {
        let target = targets.get(id).copied().unwrap_or(0);
        let Some(slot) = assignments.get_mut(id) else {
            continue;
        };
        let needs_more = target.saturating_sub(slot.len());
        let end = (cursor + needs_more).min(movable.len());
        slot.extend(movable[cursor..end].iter().cloned());
        cursor = end;
    }

    if cursor < movable.len() {
        if let Some(last) = panel_ids.last() {
            debug!(
                leftover = movable.len() - cursor,
                panel = last.0,
                "appending leftover movable candidates to last panel"
            );
            if let Some(slot) = assignments.get_mut(last) {
                slot.extend(movable[cursor..].iter().cloned());
            }
        }
    }

    let writes = stale_writes(&assignments, candidates, panels);

    AllocationPlan {
        assignments,
        writes,
        dangling,
    }
}

/// Assigned candidates whose stored panel or roster snapshot differs from `assignments`.
pub fn stale_writes(
    assignments: &BTreeMap<PanelId, Vec<CandidateId>>,
    stored: &[Candidate],
    panels: &[Panel],
) -> BTreeMap<PanelId, Vec<CandidateId>> {
    let by_id: HashMap<&CandidateId, &Candidate> = stored
        .iter()
        .map(|candidate| (&candidate.id, candidate))
        .collect();

    let mut writes: BTreeMap<PanelId, Vec<CandidateId>> = BTreeMap::new();
    for panel in panels {
        let Some(ids) = assignments.get(&panel.id) else {
            continue;
        };
        for id in ids {
            // A forwarded record's roster snapshot is final; only its panel id is repaired.
            let stale = by_id.get(id).is_some_and(|candidate| {
                candidate.assigned_panel != Some(panel.id)
                    || (!candidate.forwarded && candidate.panel_evaluators != panel.evaluators)
            });
            if stale {
                writes.entry(panel.id).or_default().push(id.clone());
            }
        }
    }
    writes
}

/// Persistence result for one panel's bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelWrite {
    pub panel: PanelId,
    pub candidates: Vec<CandidateId>,
    pub result: Result<usize, RepositoryError>,
}

/// What a pass decided and what reached the store. Writes are not rolled back on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    pub plan: AllocationPlan,
    pub writes: Vec<PanelWrite>,
}

impl AllocationOutcome {
    pub fn persisted(&self) -> usize {
        self.writes
            .iter()
            .filter_map(|write| write.result.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> Vec<&PanelWrite> {
        self.writes
            .iter()
            .filter(|write| write.result.is_err())
            .collect()
    }

    pub fn summary(&self) -> AllocationSummary {
        AllocationSummary {
            panel_sizes: self.plan.panel_sizes(),
            persisted: self.persisted(),
            failed_panels: self.failures().iter().map(|write| write.panel).collect(),
            dangling: self.plan.dangling.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSummary {
    pub panel_sizes: BTreeMap<PanelId, usize>,
    pub persisted: usize,
    pub failed_panels: Vec<PanelId>,
    pub dangling: Vec<CandidateId>,
}

/// Runs allocation passes and persists the changed assignments.
pub struct AllocationEngine<R> {
    repository: Arc<R>,
}

impl<R> AllocationEngine<R>
where
    R: CandidateRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn run(&self, candidates: &[Candidate], panels: &[Panel]) -> AllocationOutcome {
        self.persist(plan(candidates, panels), panels)
    }

    /// Write every stale group of `plan`, one bulk call per panel.
    pub fn persist(&self, plan: AllocationPlan, panels: &[Panel]) -> AllocationOutcome {
        info!(
            assigned = plan.assigned_count(),
            panels = panels.len(),
            stale = plan.writes.values().map(Vec::len).sum::<usize>(),
            dangling = plan.dangling.len(),
            "allocation pass planned"
        );

        let mut writes = Vec::with_capacity(plan.writes.len());
        for (panel_id, ids) in &plan.writes {
            let Some(panel) = panels.iter().find(|panel| panel.id == *panel_id) else {
                continue;
            };
            let result = self
                .repository
                .bulk_assign_panel(ids, panel.id, &panel.evaluators)
                .map(|updated| updated.len());
            if let Err(err) = &result {
                warn!(panel = panel.id.0, error = %err, "failed to persist panel assignment");
            }
            writes.push(PanelWrite {
                panel: panel.id,
                candidates: ids.clone(),
                result,
            });
        }

        AllocationOutcome { plan, writes }
    }
}
