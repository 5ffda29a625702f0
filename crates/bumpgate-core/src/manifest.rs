//! The single read/write path for `package.json`.
//!
//! Every mutation of the manifest goes through [`ManifestStateManager`]:
//! capture a snapshot, rewrite one entry, or roll every dependency section
//! back to a snapshot. Writes are atomic (temp file in the same directory,
//! then rename) and pretty-printed with two-space indentation.
//!
//! When a write produces exactly the document that was read by
//! [`ManifestStateManager::capture_initial_state`], the originally read bytes
//! are written instead, so a full rollback is byte-identical even for
//! manifests that were not in canonical form.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::domain::error::{CoreResult, ManifestError, UpgradeError};
use crate::domain::snapshot::{DependencySection, DependencyState};
use crate::semver_policy::parse_sign;

/// File name of the manifest inside a project directory.
pub const MANIFEST_FILE: &str = "package.json";

type Document = Map<String, Value>;

/// Document and raw bytes as read at capture time.
struct Baseline {
    document: Document,
    bytes: Vec<u8>,
}

/// Owns read/write access to one project's manifest for a run.
pub struct ManifestStateManager {
    project_dir: PathBuf,
    manifest_path: PathBuf,
    baseline: Mutex<Option<Baseline>>,
}

impl ManifestStateManager {
    /// Bind to `project_dir`. The directory must exist; the manifest need not yet.
    pub fn new(project_dir: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let project_dir = project_dir.as_ref().to_path_buf();
        if !project_dir.is_dir() {
            return Err(ManifestError::ProjectNotFound(project_dir));
        }
        let manifest_path = project_dir.join(MANIFEST_FILE);
        Ok(Self {
            project_dir,
            manifest_path,
            baseline: Mutex::new(None),
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Read the manifest and capture every dependency entry.
    ///
    /// Sections are enumerated in [`DependencySection::ALL`] order; entries keep
    /// their order within a section. A package name appearing in two sections
    /// is rejected because the snapshot could not restore it unambiguously.
    pub fn capture_initial_state(&self) -> CoreResult<Vec<DependencyState>> {
        let capture = || -> Result<(Vec<DependencyState>, Baseline), ManifestError> {
            let bytes = self.read_bytes()?;
            let document = self.parse(&bytes)?;
            let states = snapshot_of(&document)?;
            Ok((states, Baseline { document, bytes }))
        };

        let (states, baseline) =
            capture().map_err(|e| UpgradeError::StateCaptureFailed(e.to_string()))?;

        let mut seen: HashMap<&str, DependencySection> = HashMap::new();
        for state in &states {
            if let Some(first) = seen.insert(state.package_name.as_str(), state.section) {
                return Err(UpgradeError::StateCaptureFailed(format!(
                    "{} is declared in both {} and {}",
                    state.package_name, first, state.section
                )));
            }
        }

        if let Ok(mut slot) = self.baseline.lock() {
            *slot = Some(baseline);
        }

        debug!(
            path = %self.manifest_path.display(),
            dependencies = states.len(),
            "captured manifest snapshot"
        );
        Ok(states)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Set one entry in one section to `version_spec`, leaving everything else as read.
    pub fn apply_candidate(
        &self,
        package_name: &str,
        section: DependencySection,
        version_spec: &str,
    ) -> Result<(), ManifestError> {
        let mut document = self.read_document()?;
        let entries = document
            .entry(section.key())
            .or_insert_with(|| Value::Object(Map::new()));
        let entries = entries.as_object_mut().ok_or_else(|| {
            ManifestError::Shape(format!("{} is not an object", section.key()))
        })?;
        entries.insert(package_name.to_string(), Value::String(version_spec.to_string()));

        debug!(
            package = %package_name,
            section = %section,
            spec = %version_spec,
            "manifest entry written"
        );
        self.write_document(&document)
    }

    /// Put one dependency back to its captured value.
    pub fn restore_entry(&self, state: &DependencyState) -> Result<(), ManifestError> {
        self.apply_candidate(&state.package_name, state.section, &state.version_spec())
    }

    /// Rewrite all three dependency sections from `snapshot`.
    ///
    /// Sections are replaced where they stand in the document, new ones are
    /// appended, and sections that become empty are removed. A section the
    /// captured manifest already held as `{}` stays `{}`. Keys outside the
    /// three sections are never touched.
    pub fn rollback_to_state(&self, snapshot: &[DependencyState]) -> CoreResult<()> {
        let rollback = || -> Result<(), ManifestError> {
            let mut document = self.read_document()?;
            let empty_at_capture = self.empty_at_capture();
            for section in DependencySection::ALL {
                let rebuilt: Map<String, Value> = snapshot
                    .iter()
                    .filter(|s| s.section == section)
                    .map(|s| (s.package_name.clone(), Value::String(s.version_spec())))
                    .collect();

                if rebuilt.is_empty() && !empty_at_capture.contains(&section) {
                    document.shift_remove(section.key());
                } else if let Some(existing) = document.get_mut(section.key()) {
                    *existing = Value::Object(rebuilt);
                } else {
                    document.insert(section.key().to_string(), Value::Object(rebuilt));
                }
            }
            self.write_document(&document)
        };

        rollback().map_err(|e| {
            warn!(path = %self.manifest_path.display(), error = %e, "rollback write failed");
            UpgradeError::RollbackFailed {
                target_state_count: snapshot.len(),
                file_path: self.manifest_path.clone(),
                reason: e.to_string(),
            }
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The raw manifest value for `package_name` in `section`, if declared.
    pub fn current_spec(
        &self,
        package_name: &str,
        section: DependencySection,
    ) -> Result<Option<String>, ManifestError> {
        let document = self.read_document()?;
        Ok(document
            .get(section.key())
            .and_then(|s| s.get(package_name))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// The manifest's `scripts` object. Non-string values are ignored.
    pub fn declared_scripts(&self) -> Result<BTreeMap<String, String>, ManifestError> {
        let document = self.read_document()?;
        let scripts = match document.get("scripts").and_then(Value::as_object) {
            Some(scripts) => scripts,
            None => return Ok(BTreeMap::new()),
        };
        Ok(scripts
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|cmd| (k.clone(), cmd.to_string())))
            .collect())
    }

    /// SHA-256 of the manifest bytes currently on disk.
    pub fn digest(&self) -> Result<String, ManifestError> {
        let bytes = self.read_bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Sections the captured document declared as empty objects.
    fn empty_at_capture(&self) -> Vec<DependencySection> {
        let Ok(slot) = self.baseline.lock() else {
            return Vec::new();
        };
        let Some(baseline) = slot.as_ref() else {
            return Vec::new();
        };
        DependencySection::ALL
            .into_iter()
            .filter(|section| {
                baseline
                    .document
                    .get(section.key())
                    .and_then(Value::as_object)
                    .is_some_and(Map::is_empty)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // IO
    // ------------------------------------------------------------------

    fn read_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        fs::read(&self.manifest_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound(self.manifest_path.clone())
            } else {
                ManifestError::Io {
                    path: self.manifest_path.clone(),
                    source: e,
                }
            }
        })
    }

    fn parse(&self, bytes: &[u8]) -> Result<Document, ManifestError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|source| ManifestError::InvalidJson {
                path: self.manifest_path.clone(),
                source,
            })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ManifestError::Shape(
                "top-level value is not an object".to_string(),
            )),
        }
    }

    fn read_document(&self) -> Result<Document, ManifestError> {
        let bytes = self.read_bytes()?;
        self.parse(&bytes)
    }

    fn write_document(&self, document: &Document) -> Result<(), ManifestError> {
        let baseline_bytes = self.baseline.lock().ok().and_then(|slot| {
            slot.as_ref()
                .filter(|b| &b.document == document)
                .map(|b| b.bytes.clone())
        });

        let bytes = match baseline_bytes {
            Some(bytes) => bytes,
            None => {
                let mut out = serde_json::to_string_pretty(document)?;
                out.push('\n');
                out.into_bytes()
            }
        };
        self.write_atomic(&bytes)
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), ManifestError> {
        let io_err = |source| ManifestError::Io {
            path: self.manifest_path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.project_dir).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        if let Ok(meta) = fs::metadata(&self.manifest_path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(io_err)?;
        }
        tmp.persist(&self.manifest_path)
            .map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Every dependency entry of `document`, in section then insertion order.
fn snapshot_of(document: &Document) -> Result<Vec<DependencyState>, ManifestError> {
    let mut states = Vec::new();
    for section in DependencySection::ALL {
        let entries = match document.get(section.key()) {
            None | Some(Value::Null) => continue,
            Some(Value::Object(entries)) => entries,
            Some(_) => {
                return Err(ManifestError::Shape(format!(
                    "{} is not an object",
                    section.key()
                )))
            }
        };
        for (name, spec) in entries {
            let spec = spec.as_str().ok_or_else(|| {
                ManifestError::Shape(format!("{}.{} is not a string", section.key(), name))
            })?;
            let (sign, version) = parse_sign(spec);
            states.push(DependencyState {
                package_name: name.clone(),
                version,
                sign,
                section,
            });
        }
    }
    Ok(states)
}
