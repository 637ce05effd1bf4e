use crate::boundary::{BoundaryDataset, UNKNOWN_COUNTRY};
use crate::feed::Airport;
use serde::Serialize;
use skyroute_geo::{Geometry, LonLat};
use std::collections::HashMap;
use std::sync::Arc;

/// Matches airports of the home region by name keyword.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceRegion {
    keywords: Vec<String>,
}

impl ReferenceRegion {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, airport_name: &str) -> bool {
        self.keywords.iter().any(|k| airport_name.contains(k.as_str()))
    }

    /// Exactly one endpoint in the region.
    pub fn is_cross_border(&self, source: &str, target: &str) -> bool {
        self.matches(source) != self.matches(target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryMatch {
    pub country: String,
    pub iso_code: Option<String>,
    #[serde(skip)]
    pub geometry: Arc<Geometry>,
}

/// Airport name to country. Entries are written once and never replaced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CountryAssignment {
    entries: HashMap<String, CountryMatch>,
}

impl CountryAssignment {
    /// Returns false, leaving the existing entry alone, when the airport is
    /// already assigned.
    pub fn insert(&mut self, airport: &str, found: CountryMatch) -> bool {
        if self.entries.contains_key(airport) {
            return false;
        }
        self.entries.insert(airport.to_string(), found);
        true
    }

    pub fn get(&self, airport: &str) -> Option<&CountryMatch> {
        self.entries.get(airport)
    }

    pub fn country_of(&self, airport: &str) -> Option<&str> {
        self.entries.get(airport).map(|m| m.country.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CountryMatch)> {
        self.entries.iter()
    }
}

/// A country to filter on: either a bare name, or a name already resolved
/// against the boundary dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum CountrySelection {
    ByName(String),
    Resolved {
        name: String,
        code: Option<String>,
        geometry: Arc<Geometry>,
    },
}

impl CountrySelection {
    pub fn name(&self) -> &str {
        match self {
            CountrySelection::ByName(name) => name,
            CountrySelection::Resolved { name, .. } => name,
        }
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            CountrySelection::ByName(_) => None,
            CountrySelection::Resolved { geometry, .. } => Some(geometry),
        }
    }

    /// Upgrades a bare name to `Resolved` when the dataset knows it.
    pub fn resolve(self, boundaries: &BoundaryDataset) -> Self {
        match self {
            CountrySelection::ByName(name) => match boundaries.find(&name) {
                Some(found) => CountrySelection::Resolved {
                    name: found.name.clone(),
                    code: found.iso_code.clone(),
                    geometry: Arc::clone(&found.geometry),
                },
                None => CountrySelection::ByName(name),
            },
            resolved => resolved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignmentProgress {
    pub processed: usize,
    pub total: usize,
    pub assigned: usize,
}

impl AssignmentProgress {
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Resumable pass over a snapshot of the airport list. Each `step` handles
/// at most `batch_size` airports and then returns, so any cooperative loop
/// can drive it.
#[derive(Debug, Clone)]
pub struct AssignmentTask {
    airports: Vec<(String, LonLat)>,
    cursor: usize,
    batch_size: usize,
    assigned: usize,
}

impl AssignmentTask {
    pub fn new(airports: &[Airport], batch_size: usize) -> Self {
        Self {
            airports: airports
                .iter()
                .map(|a| (a.name.clone(), a.position()))
                .collect(),
            cursor: 0,
            batch_size: batch_size.max(1),
            assigned: 0,
        }
    }

    pub fn progress(&self) -> AssignmentProgress {
        AssignmentProgress {
            processed: self.cursor,
            total: self.airports.len(),
            assigned: self.assigned,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.airports.len()
    }

    pub fn step(
        &mut self,
        boundaries: &BoundaryDataset,
        reference: &ReferenceRegion,
        out: &mut CountryAssignment,
    ) -> AssignmentProgress {
        let end = (self.cursor + self.batch_size).min(self.airports.len());
        for (name, position) in &self.airports[self.cursor..end] {
            if reference.matches(name) {
                continue;
            }
            if let Some(country) = boundaries.locate(*position) {
                let found = CountryMatch {
                    country: if country.name.is_empty() {
                        UNKNOWN_COUNTRY.to_string()
                    } else {
                        country.name.clone()
                    },
                    iso_code: country.iso_code.clone(),
                    geometry: Arc::clone(&country.geometry),
                };
                if out.insert(name, found) {
                    self.assigned += 1;
                }
            }
        }
        self.cursor = end;
        self.progress()
    }
}

#[derive(Debug, Clone)]
enum AssignerState {
    Idle,
    Running(AssignmentTask),
    Complete,
}

/// Owns the process-wide airport-to-country map and the task that fills it.
///
/// The task starts on the first `poll` and, once started, runs until every
/// airport has been visited. Selection changes never cancel it.
#[derive(Debug, Clone)]
pub struct CountryAssigner {
    state: AssignerState,
    assignment: CountryAssignment,
    boundaries: Arc<BoundaryDataset>,
    reference: ReferenceRegion,
    batch_size: usize,
}

impl CountryAssigner {
    pub fn new(boundaries: Arc<BoundaryDataset>, reference: ReferenceRegion, batch_size: usize) -> Self {
        Self {
            state: AssignerState::Idle,
            assignment: CountryAssignment::default(),
            boundaries,
            reference,
            batch_size: batch_size.max(1),
        }
    }

    pub fn assignment(&self) -> &CountryAssignment {
        &self.assignment
    }

    pub fn boundaries(&self) -> &BoundaryDataset {
        &self.boundaries
    }

    pub fn reference(&self) -> &ReferenceRegion {
        &self.reference
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, AssignerState::Complete)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, AssignerState::Running(_))
    }

    /// Advances the assignment by one batch. Starts the task on first call.
    /// Returns `None` once the assignment is complete.
    pub fn poll(&mut self, airports: &[Airport]) -> Option<AssignmentProgress> {
        if let AssignerState::Idle = self.state {
            if self.boundaries.is_empty() {
                log::warn!("No boundary polygons loaded; country assignment is empty");
                self.state = AssignerState::Complete;
                return None;
            }
            log::debug!(
                "Starting country assignment: airports={} countries={} batch={}",
                airports.len(),
                self.boundaries.len(),
                self.batch_size
            );
            self.state = AssignerState::Running(AssignmentTask::new(airports, self.batch_size));
        }

        let AssignerState::Running(task) = &mut self.state else {
            return None;
        };

        let progress = task.step(&self.boundaries, &self.reference, &mut self.assignment);
        log::debug!(
            "Country assignment batch: processed={}/{} assigned={}",
            progress.processed,
            progress.total,
            progress.assigned
        );

        if progress.is_complete() {
            log::info!(
                "Assigned {} airports to countries",
                self.assignment.len()
            );
            self.state = AssignerState::Complete;
        }
        Some(progress)
    }

    /// Drives `poll` until the task completes and returns the final map.
    pub fn run_to_completion(&mut self, airports: &[Airport]) -> &CountryAssignment {
        while self.poll(airports).is_some() {}
        &self.assignment
    }
}
