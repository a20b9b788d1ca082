use std::collections::BTreeMap;

use super::domain::DestinationTag;

pub const DEFAULT_DESTINATION: &str = "faculty-office";

/// Department-to-destination table used when a record is forwarded to the next stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacultyRouting {
    routes: BTreeMap<String, DestinationTag>,
    fallback: DestinationTag,
}

impl Default for FacultyRouting {
    fn default() -> Self {
        Self::new(DEFAULT_DESTINATION)
    }
}

impl FacultyRouting {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            routes: BTreeMap::new(),
            fallback: DestinationTag(fallback.into()),
        }
    }

    pub fn with_route(mut self, department: &str, destination: impl Into<String>) -> Self {
        self.insert(department, destination);
        self
    }

    pub fn insert(&mut self, department: &str, destination: impl Into<String>) {
        self.routes
            .insert(normalize(department), DestinationTag(destination.into()));
    }

    /// Parse `department=destination` pairs separated by `;`. Blank segments are skipped.
    pub fn parse_routes(raw: &str, fallback: impl Into<String>) -> Result<Self, String> {
        let mut routing = Self::new(fallback);
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (department, destination) = segment
                .split_once('=')
                .ok_or_else(|| format!("route '{segment}' is not department=destination"))?;
            let (department, destination) = (department.trim(), destination.trim());
            if department.is_empty() || destination.is_empty() {
                return Err(format!("route '{segment}' has an empty side"));
            }
            routing.insert(department, destination);
        }
        Ok(routing)
    }

    pub fn destination_for(&self, department: &str) -> DestinationTag {
        self.routes
            .get(&normalize(department))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn fallback(&self) -> &DestinationTag {
        &self.fallback
    }
}

fn normalize(department: &str) -> String {
    department
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
