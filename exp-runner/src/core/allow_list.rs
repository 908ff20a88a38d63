//! Allow-list of instance filenames eligible for a sweep.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Curated small TSPLIB instances run by default.
pub const DEFAULT_INSTANCES: &[&str] = &[
    "dantzig42.tsp",
    "swiss42.tsp",
    "att48.tsp",
    "gr48.tsp",
    "hk48.tsp",
    "eil51.tsp",
    "berlin52.tsp",
    "brazil58.tsp",
    "st70.tsp",
    "eil76.tsp",
    "pr76.tsp",
    "pr76r.tsp",
    "gr96.tsp",
    "rat99.tsp",
    "kroA100.tsp",
    "kroB100.tsp",
    "kroC100.tsp",
    "kroD100.tsp",
    "kroE100.tsp",
    "rd100.tsp",
    "eil101.tsp",
    "lin105.tsp",
    "pr107.tsp",
];

/// Immutable set of filenames. Membership is exact, case-sensitive string
/// equality: no globbing, no extension inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_INSTANCES.iter().copied())
    }
}
