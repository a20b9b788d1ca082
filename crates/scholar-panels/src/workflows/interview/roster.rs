use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::domain::{Candidate, CandidateId, Evaluator, Panel, PanelId};
use super::marks::Mark;
use super::scoring;

/// One row of a panel's score sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub candidate_id: CandidateId,
    pub name: String,
    pub application_no: String,
    pub marks: Vec<Mark>,
    pub average: Mark,
    pub forwarded: bool,
}

/// A panel with its candidates in assignment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelRoster {
    pub panel_id: PanelId,
    pub label: String,
    pub evaluators: Vec<Evaluator>,
    pub entries: Vec<RosterEntry>,
}

impl PanelRoster {
    pub fn graded(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.marks.iter().any(|mark| mark.is_graded()))
            .count()
    }

    pub fn absent(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.average.is_absent())
            .count()
    }
}

/// Build score sheets for every panel from an assignment map. Marks are cut to the panel's
/// evaluator count and the average is recomputed, so sheets never show stale slots.
pub fn build_rosters(
    panels: &[Panel],
    assignments: &BTreeMap<PanelId, Vec<CandidateId>>,
    candidates: &[Candidate],
) -> Vec<PanelRoster> {
    let by_id: HashMap<&CandidateId, &Candidate> = candidates
        .iter()
        .map(|candidate| (&candidate.id, candidate))
        .collect();

    let mut ordered: Vec<&Panel> = panels.iter().collect();
    ordered.sort_by_key(|panel| panel.id);

    ordered
        .into_iter()
        .map(|panel| {
            let count = panel.evaluator_count();
            let entries = assignments
                .get(&panel.id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| by_id.get(id))
                        .map(|candidate| {
                            let marks: Vec<Mark> =
                                (0..count).map(|slot| candidate.mark(slot)).collect();
                            RosterEntry {
                                candidate_id: candidate.id.clone(),
                                name: candidate.name.clone(),
                                application_no: candidate.application_no.clone(),
                                average: scoring::average(&marks, count),
                                marks,
                                forwarded: candidate.forwarded,
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();

            PanelRoster {
                panel_id: panel.id,
                label: panel.id.to_string(),
                evaluators: panel.evaluators.clone(),
                entries,
            }
        })
        .collect()
}
