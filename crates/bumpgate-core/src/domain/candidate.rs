//! Per-dependency candidate versions resolved from registry data.

use serde::{Deserialize, Serialize};

use crate::domain::snapshot::{DependencySection, DependencyState};
use crate::semver_policy::{is_complex_range, is_newer, sort_descending_stable};

/// Newer versions to try for one dependency, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCandidateSet {
    pub package_name: String,
    pub section: DependencySection,

    /// Bare current version.
    pub current_version: String,

    /// Strictly descending, no pre-releases, every entry newer than `current_version`.
    pub candidates: Vec<String>,
}

impl VersionCandidateSet {
    /// Build the candidate set for `state` from every version the registry advertises.
    ///
    /// Returns `None` when the current value is a range or when nothing newer exists.
    pub fn resolve(state: &DependencyState, registry_versions: &[String]) -> Option<Self> {
        if is_complex_range(&state.version) {
            return None;
        }

        let candidates: Vec<String> = sort_descending_stable(registry_versions)
            .into_iter()
            .filter(|v| is_newer(v, &state.version))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        Some(Self {
            package_name: state.package_name.clone(),
            section: state.section,
            current_version: state.version.clone(),
            candidates,
        })
    }

    /// The newest candidate.
    pub fn newest(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }
}
