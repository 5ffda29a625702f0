//! Dependency snapshot types captured from the manifest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Manifest section a dependency is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependencySection {
    #[serde(rename = "dependencies")]
    Dependencies,
    #[serde(rename = "devDependencies")]
    DevDependencies,
    #[serde(rename = "optionalDependencies")]
    OptionalDependencies,
}

impl DependencySection {
    /// Sections in the fixed order they are captured and processed.
    pub const ALL: [DependencySection; 3] = [
        DependencySection::Dependencies,
        DependencySection::DevDependencies,
        DependencySection::OptionalDependencies,
    ];

    /// The manifest key for this section.
    pub fn key(&self) -> &'static str {
        match self {
            DependencySection::Dependencies => "dependencies",
            DependencySection::DevDependencies => "devDependencies",
            DependencySection::OptionalDependencies => "optionalDependencies",
        }
    }
}

impl fmt::Display for DependencySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Range operator prefixing a manifest version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemverSign {
    #[serde(rename = "^")]
    Caret,
    #[serde(rename = "~")]
    Tilde,
    #[serde(rename = "exact")]
    Exact,
}

impl SemverSign {
    /// Prefix written in front of a bare version.
    pub fn prefix(&self) -> &'static str {
        match self {
            SemverSign::Caret => "^",
            SemverSign::Tilde => "~",
            SemverSign::Exact => "",
        }
    }
}

/// One dependency entry as captured at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyState {
    pub package_name: String,

    /// Bare version, never carrying a leading `^`/`~`.
    pub version: String,

    #[serde(rename = "semverSign")]
    pub sign: SemverSign,

    #[serde(rename = "dependencyType")]
    pub section: DependencySection,
}

impl DependencyState {
    /// The manifest value this entry was captured from.
    pub fn version_spec(&self) -> String {
        format!("{}{}", self.sign.prefix(), self.version)
    }
}
