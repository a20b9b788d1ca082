//! Per-candidate score editing with debounced autosave.
//!
//! `Viewing` (no buffer) -> `Editing` on `begin_edit`; each keystroke moves the buffer to
//! `AutosavePending` and restarts that candidate's timer. When the timer fires the marks are
//! saved and the buffer stays open in `Saved`. `commit` cancels the timer, saves on the calling
//! thread and closes the buffer. A failed save leaves the buffer in `Editing` for a retry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{Candidate, CandidateId, MarkSheet, MAX_EVALUATORS};
use super::marks::{Mark, MarkInputError};
use super::repository::{deliver, CandidateRepository, NotificationLevel, Notifier, RepositoryError};
use super::schedule::SaveScheduler;
use super::scoring;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    Viewing,
    Editing,
    AutosavePending,
    Saved,
    Forwarded,
}

impl EditState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Viewing => "viewing",
            Self::Editing => "editing",
            Self::AutosavePending => "autosave_pending",
            Self::Saved => "saved",
            Self::Forwarded => "forwarded",
        }
    }
}

/// Current contents of an open edit buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSnapshot {
    pub candidate_id: CandidateId,
    pub evaluator_count: usize,
    pub marks: Vec<Mark>,
    pub preview: Mark,
    pub state: EditState,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("candidate {0} not found")]
    NotFound(CandidateId),
    #[error("candidate {0} has been forwarded; marks are read-only")]
    Forwarded(CandidateId),
    #[error("candidate {0} is not assigned to a panel")]
    Unassigned(CandidateId),
    #[error("candidate {0} has no open edit session")]
    NotEditing(CandidateId),
    #[error("mark slot {slot} is outside the panel's {evaluator_count} evaluator(s)")]
    SlotOutOfRange { slot: usize, evaluator_count: usize },
    #[error(transparent)]
    Input(#[from] MarkInputError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
struct EditBuffer {
    name: String,
    evaluator_count: usize,
    marks: Vec<Mark>,
    state: EditState,
    revision: u64,
}

impl EditBuffer {
    fn snapshot(&self, id: &CandidateId) -> EditSnapshot {
        EditSnapshot {
            candidate_id: id.clone(),
            evaluator_count: self.evaluator_count,
            marks: self.marks.clone(),
            preview: scoring::average(&self.marks, self.evaluator_count),
            state: self.state,
        }
    }
}

struct SessionCore<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    debounce: Duration,
    buffers: Mutex<HashMap<CandidateId, EditBuffer>>,
    forwarded: Mutex<HashSet<CandidateId>>,
    scheduler: SaveScheduler<CandidateId>,
}

impl<R, N> SessionCore<R, N>
where
    R: CandidateRepository,
    N: Notifier,
{
    fn save(&self, id: &CandidateId) -> Result<Candidate, SessionError> {
        self.save_revision(id).map(|(saved, _)| saved)
    }

    /// Persist the buffer and report which revision of it was written.
    fn save_revision(&self, id: &CandidateId) -> Result<(Candidate, u64), SessionError> {
        let (name, revision, sheet) = {
            let buffers = self.buffers.lock().expect("session mutex poisoned");
            let buffer = buffers
                .get(id)
                .ok_or_else(|| SessionError::NotEditing(id.clone()))?;
            let sheet = MarkSheet {
                marks: buffer.marks.clone(),
                average: scoring::average(&buffer.marks, buffer.evaluator_count),
            };
            (buffer.name.clone(), buffer.revision, sheet)
        };

        match self.repository.update_marks(id, sheet) {
            Ok(saved) => {
                let mut buffers = self.buffers.lock().expect("session mutex poisoned");
                // Input that arrived during the write keeps its own pending save.
                if let Some(buffer) = buffers.get_mut(id) {
                    if buffer.revision == revision {
                        buffer.state = EditState::Saved;
                    }
                }
                drop(buffers);
                debug!(candidate = %id, "marks saved");
                deliver(
                    self.notifier.as_ref(),
                    NotificationLevel::Success,
                    format!("Marks saved for {name}"),
                );
                Ok((saved, revision))
            }
            Err(err) => {
                let mut buffers = self.buffers.lock().expect("session mutex poisoned");
                if let Some(buffer) = buffers.get_mut(id) {
                    if buffer.revision == revision {
                        buffer.state = EditState::Editing;
                    }
                }
                drop(buffers);
                warn!(candidate = %id, error = %err, "failed to save marks");
                deliver(
                    self.notifier.as_ref(),
                    NotificationLevel::Error,
                    format!("Could not save marks for {name} ({id}): {err}"),
                );
                Err(SessionError::Repository(err))
            }
        }
    }
}

/// Edit buffers for every candidate currently being scored, plus their autosave timers.
pub struct ScoringSession<R, N> {
    core: Arc<SessionCore<R, N>>,
}

impl<R, N> ScoringSession<R, N>
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, debounce: Duration) -> Self {
        Self {
            core: Arc::new(SessionCore {
                repository,
                notifier,
                debounce,
                buffers: Mutex::new(HashMap::new()),
                forwarded: Mutex::new(HashSet::new()),
                scheduler: SaveScheduler::new(),
            }),
        }
    }

    /// Open (or rejoin) the edit buffer for a candidate.
    pub fn begin_edit(&self, id: &CandidateId) -> Result<EditSnapshot, SessionError> {
        if self.is_forwarded(id) {
            return Err(SessionError::Forwarded(id.clone()));
        }
        if let Some(snapshot) = self.snapshot(id) {
            return Ok(snapshot);
        }

        let candidate = self
            .core
            .repository
            .fetch(id)?
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        if candidate.forwarded {
            self.core
                .forwarded
                .lock()
                .expect("session mutex poisoned")
                .insert(id.clone());
            return Err(SessionError::Forwarded(id.clone()));
        }

        let evaluator_count = candidate.panel_evaluators.len().min(MAX_EVALUATORS);
        if candidate.assigned_panel.is_none() || evaluator_count == 0 {
            return Err(SessionError::Unassigned(id.clone()));
        }

        let marks = (0..MAX_EVALUATORS).map(|slot| candidate.mark(slot)).collect();
        let buffer = EditBuffer {
            name: candidate.name,
            evaluator_count,
            marks,
            state: EditState::Editing,
            revision: 0,
        };

        let mut buffers = self.core.buffers.lock().expect("session mutex poisoned");
        let entry = buffers.entry(id.clone()).or_insert(buffer);
        Ok(entry.snapshot(id))
    }

    /// Apply raw input to a mark slot (0-based) and restart the autosave timer.
    pub fn on_mark_input(
        &self,
        id: &CandidateId,
        slot: usize,
        raw: &str,
    ) -> Result<EditSnapshot, SessionError> {
        let mark = Mark::parse_input(raw)?;

        let snapshot = {
            let mut buffers = self.core.buffers.lock().expect("session mutex poisoned");
            let buffer = buffers
                .get_mut(id)
                .ok_or_else(|| SessionError::NotEditing(id.clone()))?;
            if slot >= buffer.evaluator_count {
                return Err(SessionError::SlotOutOfRange {
                    slot,
                    evaluator_count: buffer.evaluator_count,
                });
            }
            buffer.marks[slot] = mark;
            buffer.revision += 1;
            buffer.state = EditState::AutosavePending;
            buffer.snapshot(id)
        };

        let core = Arc::downgrade(&self.core);
        let key = id.clone();
        self.core.scheduler.schedule(id.clone(), self.core.debounce, move || {
            if let Some(core) = core.upgrade() {
                let _ = core.save(&key);
            }
        });

        Ok(snapshot)
    }

    /// Save the buffer now without closing it.
    pub fn save(&self, id: &CandidateId) -> Result<Candidate, SessionError> {
        self.core.scheduler.cancel(id);
        self.core.save(id)
    }

    /// Immediate save (Enter, blur). Cancels the pending timer and closes the buffer on success.
    ///
    /// Input that lands while the write is in flight keeps the buffer open with its own
    /// autosave, so nothing typed after the commit is lost.
    pub fn commit(&self, id: &CandidateId) -> Result<Candidate, SessionError> {
        self.core.scheduler.cancel(id);
        let (saved, revision) = self.core.save_revision(id)?;

        let mut buffers = self.core.buffers.lock().expect("session mutex poisoned");
        match buffers.get(id) {
            Some(buffer) if buffer.revision != revision => {
                debug!(candidate = %id, "newer input arrived during commit; buffer kept open");
            }
            _ => {
                buffers.remove(id);
            }
        }
        Ok(saved)
    }

    /// Abandon the buffer, dropping unsaved input. Returns true if a buffer was open.
    pub fn close(&self, id: &CandidateId) -> bool {
        let cancelled = self.core.scheduler.cancel(id);
        if cancelled {
            debug!(candidate = %id, "pending autosave discarded");
        }
        self.core
            .buffers
            .lock()
            .expect("session mutex poisoned")
            .remove(id)
            .is_some()
    }

    /// Freeze a candidate after forwarding: clears its timer and buffer and blocks new edits.
    pub fn mark_forwarded(&self, id: &CandidateId) {
        self.close(id);
        self.core
            .forwarded
            .lock()
            .expect("session mutex poisoned")
            .insert(id.clone());
    }

    pub fn state(&self, id: &CandidateId) -> EditState {
        if self.is_forwarded(id) {
            return EditState::Forwarded;
        }
        self.core
            .buffers
            .lock()
            .expect("session mutex poisoned")
            .get(id)
            .map(|buffer| buffer.state)
            .unwrap_or(EditState::Viewing)
    }

    pub fn snapshot(&self, id: &CandidateId) -> Option<EditSnapshot> {
        self.core
            .buffers
            .lock()
            .expect("session mutex poisoned")
            .get(id)
            .map(|buffer| buffer.snapshot(id))
    }

    pub fn has_pending_autosave(&self, id: &CandidateId) -> bool {
        self.core.scheduler.is_pending(id)
    }

    pub fn pending_autosaves(&self) -> usize {
        self.core.scheduler.pending_count()
    }

    fn is_forwarded(&self, id: &CandidateId) -> bool {
        self.core
            .forwarded
            .lock()
            .expect("session mutex poisoned")
            .contains(id)
    }
}
