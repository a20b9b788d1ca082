use super::common::*;
use crate::workflows::interview::allocation::{
    allocate, panel_targets, placement, plan, stale_writes, AllocationEngine, Placement,
};
use crate::workflows::interview::domain::{Candidate, Panel, PanelId};
use crate::workflows::interview::Mark;
use std::collections::BTreeMap;
use std::sync::Arc;

fn seated(count: u32) -> Vec<Panel> {
    (1..=count)
        .map(|n| Panel {
            id: PanelId(n),
            evaluators: roster(2),
        })
        .collect()
}

/// Apply a plan to candidate records the way a successful persistence pass would.
fn persisted(candidates: &[Candidate], panels: &[Panel]) -> Vec<Candidate> {
    let assignments = allocate(candidates, panels);
    candidates
        .iter()
        .cloned()
        .map(|mut candidate| {
            for panel in panels {
                if assignments[&panel.id].contains(&candidate.id) {
                    candidate.assigned_panel = Some(panel.id);
                    candidate.panel_evaluators = panel.evaluators.clone();
                }
            }
            candidate
        })
        .collect()
}

fn sizes(assignments: &BTreeMap<PanelId, Vec<crate::workflows::interview::CandidateId>>) -> Vec<usize> {
    assignments.values().map(Vec::len).collect()
}

#[test]
fn targets_spread_the_remainder_over_the_lowest_ids() {
    let targets = panel_targets(10, &[PanelId(3), PanelId(1), PanelId(2)]);
    assert_eq!(targets[&PanelId(1)], 4);
    assert_eq!(targets[&PanelId(2)], 3);
    assert_eq!(targets[&PanelId(3)], 3);
    assert!(panel_targets(5, &[]).is_empty());
}

#[test]
fn ten_candidates_split_evenly_in_list_order() {
    let candidates = registrations(10);
    let assignments = allocate(&candidates, &seated(2));

    assert_eq!(sizes(&assignments), vec![5, 5]);
    assert_eq!(
        assignments[&PanelId(1)],
        vec![id("c-01"), id("c-02"), id("c-03"), id("c-04"), id("c-05")]
    );
    assert_eq!(assignments[&PanelId(2)][0], id("c-06"));
}

#[test]
fn every_candidate_lands_on_exactly_one_panel() {
    let candidates = registrations(11);
    let assignments = allocate(&candidates, &seated(3));

    let mut seen: Vec<_> = assignments.values().flatten().cloned().collect();
    seen.sort();
    let mut expected: Vec<_> = candidates.iter().map(|c| c.id.clone()).collect();
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(sizes(&assignments), vec![4, 4, 3]);
}

#[test]
fn graded_candidates_stay_on_their_panel_when_a_panel_is_added() {
    let panels = seated(2);
    let mut candidates = persisted(&registrations(10), &panels);
    candidates[2].marks = vec![Mark::Numeric(28), Mark::Absent];

    let three = seated(3);
    let assignments = allocate(&candidates, &three);

    assert_eq!(sizes(&assignments), vec![4, 3, 3]);
    assert_eq!(assignments[&PanelId(1)][0], id("c-03"));
    assert_eq!(
        assignments[&PanelId(1)],
        vec![id("c-03"), id("c-01"), id("c-02"), id("c-04")]
    );
}

#[test]
fn fixed_candidates_may_exceed_their_target() {
    let mut candidates: Vec<Candidate> = registrations(3)
        .into_iter()
        .map(|candidate| graded_on(candidate, PanelId(1), &[Mark::Numeric(20), Mark::Numeric(22)]))
        .collect();
    candidates.extend(registrations(4).into_iter().skip(3));

    let assignments = allocate(&candidates, &seated(2));
    assert_eq!(sizes(&assignments), vec![3, 1]);
    assert_eq!(assignments[&PanelId(2)], vec![id("c-04")]);
}

#[test]
fn forwarded_candidates_are_fixed_without_marks() {
    let mut candidate = registrations(1).remove(0);
    candidate.assigned_panel = Some(PanelId(2));
    candidate.forwarded = true;

    assert_eq!(placement(&candidate, &seated(2)), Placement::Fixed(PanelId(2)));
}

#[test]
fn zero_marks_do_not_count_as_graded() {
    let candidate = graded_on(
        registrations(1).remove(0),
        PanelId(1),
        &[Mark::Numeric(0), Mark::Numeric(0)],
    );
    assert_eq!(placement(&candidate, &seated(2)), Placement::Movable);
}

#[test]
fn references_to_missing_panels_are_reported_and_rehomed() {
    let mut candidates = registrations(4);
    candidates[1] = graded_on(candidates[1].clone(), PanelId(7), &[Mark::Numeric(18)]);

    let result = plan(&candidates, &seated(2));
    assert_eq!(result.dangling, vec![id("c-02")]);
    assert_eq!(result.panel_for(&id("c-02")), Some(PanelId(1)));
    assert_eq!(result.assigned_count(), 4);
}

#[test]
fn replanning_a_persisted_snapshot_writes_nothing() {
    let panels = seated(3);
    let candidates = persisted(&registrations(8), &panels);

    let again = plan(&candidates, &panels);
    assert!(again.writes.is_empty());
    assert_eq!(again.panel_sizes().values().copied().collect::<Vec<_>>(), vec![3, 3, 2]);
}

#[test]
fn roster_changes_mark_candidates_stale() {
    let mut panels = seated(1);
    let candidates = persisted(&registrations(2), &panels);
    panels[0].evaluators = roster(3);

    let result = plan(&candidates, &panels);
    assert_eq!(result.writes[&PanelId(1)].len(), 2);
}

#[test]
fn no_panels_means_no_assignments() {
    let result = plan(&registrations(3), &[]);
    assert!(result.assignments.is_empty());
    assert!(result.writes.is_empty());
}

#[test]
fn engine_keeps_successful_writes_when_one_panel_fails() {
    let repository = Arc::new(MemoryRepository::seeded(registrations(10)));
    repository.fail_assignments_to(PanelId(2));
    let engine = AllocationEngine::new(repository.clone());

    let candidates = registrations(10);
    let outcome = engine.run(&candidates, &seated(2));

    assert_eq!(outcome.persisted(), 5);
    let failures = outcome.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].panel, PanelId(2));
    assert_eq!(repository.panel_of(&id("c-01")), Some(PanelId(1)));
    assert_eq!(repository.panel_of(&id("c-10")), None);
    assert_eq!(outcome.summary().failed_panels, vec![PanelId(2)]);
}

#[test]
fn forwarded_records_without_a_panel_are_never_seated() {
    let mut candidates = registrations(5);
    candidates[2].forwarded = true;

    assert_eq!(placement(&candidates[2], &seated(2)), Placement::Frozen);
    let result = plan(&candidates, &seated(2));
    assert_eq!(result.assignments[&PanelId(1)], vec![id("c-01"), id("c-02")]);
    assert_eq!(result.assignments[&PanelId(2)], vec![id("c-04"), id("c-05")]);
    assert_eq!(result.assigned_count(), 4);
    assert!(result.panel_for(&id("c-03")).is_none());
}

#[test]
fn forwarded_roster_snapshots_are_not_rewritten() {
    let panels = seated(1);
    let mut candidates = persisted(&registrations(2), &panels);
    for candidate in &mut candidates {
        candidate.panel_evaluators = roster(3);
    }
    candidates[0].forwarded = true;

    let writes = stale_writes(&allocate(&candidates, &panels), &candidates, &panels);

    assert_eq!(writes[&PanelId(1)], vec![id("c-02")]);
}
