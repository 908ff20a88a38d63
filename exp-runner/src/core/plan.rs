//! Deterministic sweep planning: listing filter and solver arguments.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::allow_list::AllowList;

/// An allow-listed instance found in the instance directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInstance {
    /// Bare filename, as listed.
    pub name: String,
    /// Sole solver argument: `<dir>/<name>`.
    pub arg: PathBuf,
}

/// Matched instances in byte order of their names, each run `repetitions` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub instances: Vec<PlannedInstance>,
    pub repetitions: u32,
}

impl SweepPlan {
    pub fn build<I, S>(dir: &Path, listing: I, allow_list: &AllowList, repetitions: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let instances = filter_listing(listing, allow_list)
            .into_iter()
            .map(|name| PlannedInstance {
                arg: instance_arg(dir, &name),
                name,
            })
            .collect();
        Self {
            instances,
            repetitions,
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.instances.len() * self.repetitions as usize
    }
}

/// Keep listing entries that are exact allow-list members, sorted and deduplicated.
pub fn filter_listing<I, S>(listing: I, allow_list: &AllowList) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = listing
        .into_iter()
        .map(Into::into)
        .filter(|name| allow_list.contains(name))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Join `dir` and `name` with a forward slash regardless of platform.
pub fn instance_arg(dir: &Path, name: &str) -> PathBuf {
    let mut joined = OsString::from(dir.as_os_str());
    if joined.as_encoded_bytes().last() != Some(&b'/') {
        joined.push("/");
    }
    joined.push(name);
    PathBuf::from(joined)
}
