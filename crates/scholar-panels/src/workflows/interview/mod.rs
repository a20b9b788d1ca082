//! Interview panel allocation, scoring and forwarding for one faculty department.
//!
//! Candidates are spread evenly over evaluator panels, scored by up to three examiners with
//! debounced autosave, and finally forwarded (frozen) to the next administrative stage.

pub mod allocation;
pub mod domain;
pub mod forwarding;
pub mod import;
pub mod marks;
pub mod panels;
pub mod repository;
pub mod roster;
pub mod router;
pub mod routing;
pub mod schedule;
pub mod scoring;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use allocation::{
    allocate, panel_targets, placement, AllocationEngine, AllocationOutcome, AllocationPlan,
    AllocationSummary, PanelWrite, Placement,
};
pub use domain::{
    Candidate, CandidateId, DestinationTag, Evaluator, MarkSheet, Panel, PanelId, Scope,
    MAX_EVALUATORS,
};
pub use forwarding::{BulkForwardReport, BulkForwardSummary, ForwardError, ForwardingGate};
pub use import::{CandidateImporter, ImportError};
pub use marks::{Mark, MarkInputError, MAX_MARK};
pub use panels::{validate_roster, EvaluatorField, PanelError, PanelRegistry, Renumbering};
pub use repository::{
    CandidateRepository, Notification, NotificationLevel, Notifier, NotifyError, RepositoryError,
};
pub use roster::{build_rosters, PanelRoster, RosterEntry};
pub use router::panel_router;
pub use routing::{FacultyRouting, DEFAULT_DESTINATION};
pub use schedule::SaveScheduler;
pub use service::{
    PanelAllocationService, PanelChange, ServiceError, ServiceSettings, DEFAULT_AUTOSAVE_DEBOUNCE,
};
pub use session::{EditSnapshot, EditState, ScoringSession, SessionError};
