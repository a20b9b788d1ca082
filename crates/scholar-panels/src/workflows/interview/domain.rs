use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::marks::Mark;

/// Upper bound on evaluators seated on one panel, and on mark slots per candidate.
pub const MAX_EVALUATORS: usize = 3;

/// Identifier wrapper for examination records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dense, 1-based panel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub u32);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Panel {}", self.0)
    }
}

/// A seated examiner. Compared by content only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evaluator {
    pub name: String,
    pub designation: String,
    pub affiliation: String,
}

impl Evaluator {
    pub fn new(
        name: impl Into<String>,
        designation: impl Into<String>,
        affiliation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            designation: designation.into(),
            affiliation: affiliation.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub id: PanelId,
    pub evaluators: Vec<Evaluator>,
}

impl Panel {
    pub fn evaluator_count(&self) -> usize {
        self.evaluators.len()
    }
}

/// Organizational unit the console operates in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub faculty: String,
    pub department: String,
}

impl Scope {
    pub fn new(faculty: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            faculty: faculty.into(),
            department: department.into(),
        }
    }
}

/// Classification attached to a forwarded record so the next stage knows where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationTag(pub String);

/// One scholar's examination record as held by the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub application_no: String,
    pub department: String,
    #[serde(default)]
    pub marks: Vec<Mark>,
    #[serde(default)]
    pub average: Option<Mark>,
    #[serde(default)]
    pub assigned_panel: Option<PanelId>,
    /// Denormalized roster of the assigned panel, refreshed on every assignment write.
    #[serde(default)]
    pub panel_evaluators: Vec<Evaluator>,
    #[serde(default)]
    pub forwarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Fresh registration: unassigned, ungraded, not forwarded.
    pub fn registered(
        id: impl Into<String>,
        name: impl Into<String>,
        application_no: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            id: CandidateId(id.into()),
            name: name.into(),
            application_no: application_no.into(),
            department: department.into(),
            marks: Vec::new(),
            average: None,
            assigned_panel: None,
            panel_evaluators: Vec::new(),
            forwarded: false,
            destination: None,
            forwarded_at: None,
        }
    }

    /// Mark slot `index`, treating missing slots as an empty entry.
    pub fn mark(&self, index: usize) -> Mark {
        self.marks.get(index).copied().unwrap_or_default()
    }

    /// True when any of the first `evaluator_count` slots carries a grade.
    pub fn has_been_graded(&self, evaluator_count: usize) -> bool {
        self.marks
            .iter()
            .take(evaluator_count.min(MAX_EVALUATORS))
            .any(|mark| mark.is_graded())
    }
}

/// Payload written through the store on every score save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSheet {
    pub marks: Vec<Mark>,
    pub average: Mark,
}
