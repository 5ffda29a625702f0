use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::result::UpgradeResult;
use crate::domain::snapshot::DependencyState;

/// Render the plain-text summary printed at the end of a run.
///
/// Every dependency outcome and every warning is listed, even on success.
pub fn render_summary(result: &UpgradeResult) -> String {
    let mut out = String::new();
    out.push_str("Upgrade Summary Report\n");
    out.push_str("======================\n");

    if !result.upgraded.is_empty() {
        out.push_str("\nUpgraded:\n");
        for dep in &result.upgraded {
            out.push_str(&format!(
                "  {}: {} -> {}\n",
                dep.package_name, dep.from_version, dep.to_version
            ));
        }
    }

    if !result.skipped.is_empty() {
        out.push_str("\nSkipped:\n");
        for dep in &result.skipped {
            out.push_str(&format!("  {}: {}\n", dep.package_name, dep.reason));
        }
    }

    if !result.remaining_outdated.is_empty() {
        out.push_str("\nRemaining outdated:\n");
        for name in &result.remaining_outdated {
            out.push_str(&format!("  {}\n", name));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &result.warnings {
            out.push_str(&format!("  {}\n", warning));
        }
    }

    if !result.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for error in &result.errors {
            out.push_str(&format!("  {}\n", error));
        }
    }

    out.push('\n');
    if result.rollback_failed() {
        out.push_str("Rollback: FAILED, manifest may be inconsistent\n");
        for error in &result.rollback_errors {
            out.push_str(&format!("  {}\n", error));
        }
    } else if result.rollback_performed {
        out.push_str("Rollback: performed, manifest restored to initial state\n");
    } else {
        out.push_str("Rollback: not needed\n");
    }

    out.push_str(&format!(
        "Summary: {} upgraded, {} skipped, {} remaining outdated, {} warnings\n",
        result.upgraded.len(),
        result.skipped.len(),
        result.remaining_outdated.len(),
        result.warnings.len()
    ));
    out
}

/// Write the full run result as pretty JSON.
pub fn write_result_json(path: &Path, result: &UpgradeResult) -> Result<()> {
    let content = serde_json::to_string_pretty(result).context("serialize upgrade result")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write a captured snapshot as pretty JSON.
pub fn write_snapshot_json(path: &Path, snapshot: &[DependencyState]) -> Result<()> {
    let content = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Read a snapshot previously written by [`write_snapshot_json`].
pub fn read_snapshot_json(path: &Path) -> Result<Vec<DependencyState>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse snapshot {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::UpgradedDependency;
    use crate::domain::snapshot::{DependencySection, SemverSign};

    fn sample() -> UpgradeResult {
        let mut result = UpgradeResult::new();
        result.upgraded.push(UpgradedDependency {
            package_name: "lodash".to_string(),
            from_version: "4.17.20".to_string(),
            to_version: "4.17.21".to_string(),
        });
        result.skip("react", "all newer versions failed the gate");
        result.warnings.push(
            "Custom registry https://npm.example/ detected, using https://registry.npmjs.org instead"
                .to_string(),
        );
        result
    }

    #[test]
    fn summary_render_is_stable() {
        let actual = render_summary(&sample());
        let expected = "Upgrade Summary Report\n======================\n\nUpgraded:\n  lodash: 4.17.20 -> 4.17.21\n\nSkipped:\n  react: all newer versions failed the gate\n\nRemaining outdated:\n  react\n\nWarnings:\n  Custom registry https://npm.example/ detected, using https://registry.npmjs.org instead\n\nRollback: not needed\nSummary: 1 upgraded, 1 skipped, 1 remaining outdated, 1 warnings\n";
        assert_eq!(actual, expected);
    }

    #[test]
    fn summary_reports_failed_rollback() {
        let mut result = UpgradeResult::new();
        result.rollback_available = false;
        result
            .rollback_errors
            .push("failed to rollback 2 dependencies in /p/package.json: denied".to_string());
        let actual = render_summary(&result);
        assert!(actual.contains("Rollback: FAILED"));
        assert!(actual.contains("denied"));
    }

    #[test]
    fn result_json_has_expected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        write_result_json(&path, &sample()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let obj = raw.as_object().expect("result object");
        for key in [
            "upgraded",
            "skipped",
            "remaining_outdated",
            "warnings",
            "errors",
            "rollback_performed",
            "rollback_available",
            "initial_state",
            "rollback_errors",
            "attempts",
            "transitions",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["upgraded"][0]["to_version"], "4.17.21");
    }

    #[test]
    fn snapshot_json_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = vec![DependencyState {
            package_name: "@types/node".to_string(),
            version: "20.11.0".to_string(),
            sign: SemverSign::Caret,
            section: DependencySection::DevDependencies,
        }];
        write_snapshot_json(&path, &snapshot).unwrap();
        assert_eq!(read_snapshot_json(&path).unwrap(), snapshot);
    }
}
