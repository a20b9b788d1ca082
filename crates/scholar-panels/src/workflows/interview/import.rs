use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{Candidate, CandidateId, PanelId};
use super::marks::{Mark, MarkInputError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read candidate export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid candidate CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {source}")]
    Mark {
        row: usize,
        #[source]
        source: MarkInputError,
    },
    #[error("row {row}: candidate id is blank")]
    MissingId { row: usize },
    #[error("row {row}: duplicate candidate id {id}")]
    DuplicateId { row: usize, id: CandidateId },
}

/// Reads examination records from a registration export.
///
/// Required headers: `id`, `name`, `application_no`, `department`. Optional headers `panel`,
/// `examiner1`..`examiner3` and `forwarded` restore records that were already being scored.
pub struct CandidateImporter;

impl CandidateImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Candidate>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Candidate>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (index, record) in csv_reader.deserialize::<CandidateRow>().enumerate() {
            let row_number = index + 2;
            let row = record?;
            let candidate = row.into_candidate(row_number)?;
            if !seen.insert(candidate.id.clone()) {
                return Err(ImportError::DuplicateId {
                    row: row_number,
                    id: candidate.id,
                });
            }
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    id: String,
    name: String,
    application_no: String,
    department: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    panel: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    examiner1: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    examiner2: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    examiner3: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    forwarded: Option<String>,
}

impl CandidateRow {
    fn into_candidate(self, row: usize) -> Result<Candidate, ImportError> {
        let id = clean(&self.id);
        if id.is_empty() {
            return Err(ImportError::MissingId { row });
        }

        let mut candidate = Candidate::registered(
            id,
            clean(&self.name),
            clean(&self.application_no),
            clean(&self.department),
        );

        let raw_marks = [&self.examiner1, &self.examiner2, &self.examiner3];
        if raw_marks.iter().any(|raw| raw.is_some()) {
            candidate.marks = raw_marks
                .iter()
                .map(|raw| Mark::parse_input(raw.as_deref().unwrap_or("")))
                .collect::<Result<_, _>>()
                .map_err(|source| ImportError::Mark { row, source })?;
        }

        candidate.assigned_panel = self
            .panel
            .as_deref()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| *value > 0)
            .map(PanelId);
        candidate.forwarded = self
            .forwarded
            .as_deref()
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"))
            .unwrap_or(false);

        Ok(candidate)
    }
}

fn clean(value: &str) -> String {
    let stripped = value.replace(['\u{feff}', '\u{200b}'], "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
