use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{Evaluator, Panel, PanelId, MAX_EVALUATORS};

const MIN_FIELD_CHARS: usize = 2;
const PLACEHOLDER_MARKERS: [&str; 2] = ["test", "placeholder"];

/// Evaluator attribute named in validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorField {
    Name,
    Designation,
    Affiliation,
}

impl EvaluatorField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Designation => "designation",
            Self::Affiliation => "affiliation",
        }
    }
}

/// Errors raised by panel roster validation and registry structure checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("a panel needs between 1 and 3 evaluators, found {found}")]
    EvaluatorCount { found: usize },
    #[error("evaluator {slot} {} is blank", field.label())]
    BlankField { slot: usize, field: EvaluatorField },
    #[error("evaluator {slot} {} '{value}' is too short", field.label())]
    TooShort {
        slot: usize,
        field: EvaluatorField,
        value: String,
    },
    #[error("evaluator {slot} {} '{value}' looks like placeholder data", field.label())]
    PlaceholderValue {
        slot: usize,
        field: EvaluatorField,
        value: String,
    },
    #[error("{0} does not exist")]
    NotFound(PanelId),
    #[error("the last remaining panel cannot be removed")]
    LastPanel,
}

impl PanelError {
    /// Structural rejections concern the registry shape rather than the submitted roster.
    pub fn is_structural(&self) -> bool {
        matches!(self, PanelError::LastPanel | PanelError::NotFound(_))
    }
}

/// Check a roster before it is seated. `slot` numbers in errors are 1-based.
pub fn validate_roster(evaluators: &[Evaluator]) -> Result<(), PanelError> {
    if evaluators.is_empty() || evaluators.len() > MAX_EVALUATORS {
        return Err(PanelError::EvaluatorCount {
            found: evaluators.len(),
        });
    }

    for (index, evaluator) in evaluators.iter().enumerate() {
        let slot = index + 1;
        for (field, value) in [
            (EvaluatorField::Name, &evaluator.name),
            (EvaluatorField::Designation, &evaluator.designation),
            (EvaluatorField::Affiliation, &evaluator.affiliation),
        ] {
            validate_field(slot, field, value)?;
        }
    }

    Ok(())
}

fn validate_field(slot: usize, field: EvaluatorField, value: &str) -> Result<(), PanelError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PanelError::BlankField { slot, field });
    }

    if trimmed.chars().count() < MIN_FIELD_CHARS {
        return Err(PanelError::TooShort {
            slot,
            field,
            value: value.to_string(),
        });
    }

    let lowered = trimmed.to_lowercase();
    if PLACEHOLDER_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Err(PanelError::PlaceholderValue {
            slot,
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

/// Old-to-new id mapping produced by a removal. Panels absent from the map were removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Renumbering {
    pub removed: Option<PanelId>,
    pub moves: BTreeMap<PanelId, PanelId>,
}

impl Renumbering {
    /// Where a reference to `old` points after the removal; `None` if it pointed at the removed panel.
    pub fn resolve(&self, old: PanelId) -> Option<PanelId> {
        if self.removed == Some(old) {
            return None;
        }
        Some(self.moves.get(&old).copied().unwrap_or(old))
    }
}

/// The set of panels, kept sorted and densely numbered from 1.
#[derive(Debug, Clone, Default)]
pub struct PanelRegistry {
    panels: Vec<Panel>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a registry from stored panels, renumbering them densely in id order.
    pub fn from_panels(mut panels: Vec<Panel>) -> Result<Self, PanelError> {
        for panel in &panels {
            validate_roster(&panel.evaluators)?;
        }
        panels.sort_by_key(|panel| panel.id);
        for (index, panel) in panels.iter_mut().enumerate() {
            panel.id = PanelId(index as u32 + 1);
        }
        Ok(Self { panels })
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn get(&self, id: PanelId) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.id == id)
    }

    pub fn create(&mut self, evaluators: Vec<Evaluator>) -> Result<Panel, PanelError> {
        validate_roster(&evaluators)?;

        let next = self
            .panels
            .iter()
            .map(|panel| panel.id.0)
            .max()
            .unwrap_or(0)
            + 1;
        let panel = Panel {
            id: PanelId(next),
            evaluators,
        };
        self.panels.push(panel.clone());
        Ok(panel)
    }

    /// Replace a panel's roster in place. Returns the previous roster.
    pub fn update(
        &mut self,
        id: PanelId,
        evaluators: Vec<Evaluator>,
    ) -> Result<Vec<Evaluator>, PanelError> {
        validate_roster(&evaluators)?;

        let panel = self
            .panels
            .iter_mut()
            .find(|panel| panel.id == id)
            .ok_or(PanelError::NotFound(id))?;
        Ok(std::mem::replace(&mut panel.evaluators, evaluators))
    }

    pub fn remove(&mut self, id: PanelId) -> Result<Renumbering, PanelError> {
        let position = self
            .panels
            .iter()
            .position(|panel| panel.id == id)
            .ok_or(PanelError::NotFound(id))?;
        if self.panels.len() == 1 {
            return Err(PanelError::LastPanel);
        }

        self.panels.remove(position);

        let mut renumbering = Renumbering {
            removed: Some(id),
            moves: BTreeMap::new(),
        };
        for (index, panel) in self.panels.iter_mut().enumerate() {
            let renumbered = PanelId(index as u32 + 1);
            if panel.id != renumbered {
                renumbering.moves.insert(panel.id, renumbered);
                panel.id = renumbered;
            }
        }

        Ok(renumbering)
    }
}
