//! Interfaces consumed from the host application
//!
//! The motion core never owns vision or the part catalogue. It reaches them
//! only through these traits.

use crate::data::Location;
use crate::error::Result;
use std::collections::HashSet;

/// A part known to the host configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Part {
    /// Part identifier, e.g. `FIDUCIAL-HOME`
    pub id: String,
}

impl Part {
    /// Create a part reference
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Part/configuration lookup
pub trait PartLookup: Send + Sync {
    /// Find a configured part by identifier
    fn part(&self, id: &str) -> Option<Part>;
}

/// Vision-based fiducial locator
pub trait FiducialLocator: Send + Sync {
    /// Locate `part` near `expected` and return where it actually is, in
    /// current machine coordinates.
    fn refine_location(&self, expected: &Location, part: &Part) -> Result<Location>;
}

/// A fixed set of part identifiers
#[derive(Debug, Clone, Default)]
pub struct StaticPartLookup {
    ids: HashSet<String>,
}

impl StaticPartLookup {
    /// Create a lookup knowing the given identifiers
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl PartLookup for StaticPartLookup {
    fn part(&self, id: &str) -> Option<Part> {
        self.ids.get(id).map(|id| Part::new(id.clone()))
    }
}
