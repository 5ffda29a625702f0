//! Version-string policy: sign handling, stable ordering, pre-release filtering.
//!
//! Everything here is pure. Complex ranges (`>=1 <2`, `*`, `latest`) are kept
//! verbatim as [`SemverSign::Exact`] and never decomposed.

use std::cmp::Ordering;

use semver::Version;

use crate::domain::error::SemverError;
use crate::domain::snapshot::SemverSign;

/// Parse a loosely written version (`v1.2.3`, `=1.2.3`, ` 1.2.3 `) into a semver.
pub fn clean(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_start_matches('=').trim_start_matches('v');
    Version::parse(trimmed).ok()
}

/// Whether a manifest value is a range expression rather than a version.
pub fn is_complex_range(spec: &str) -> bool {
    spec.chars().any(char::is_whitespace)
        || spec.contains(['>', '<', '=', '*'])
        || spec == "latest"
        || spec == "next"
}

/// Split a manifest value into its sign and bare version.
///
/// A leading `^`/`~` is always split off, so the bare part never carries one.
/// Whatever follows is returned verbatim; candidate resolution decides
/// separately whether it is a plain version or a range.
pub fn parse_sign(spec: &str) -> (SemverSign, String) {
    if let Some(rest) = spec.strip_prefix('^') {
        return (SemverSign::Caret, rest.to_string());
    }
    if let Some(rest) = spec.strip_prefix('~') {
        return (SemverSign::Tilde, rest.to_string());
    }
    (SemverSign::Exact, spec.to_string())
}

/// Replace the version in `current` with `candidate`, keeping any leading `^`/`~`.
pub fn bump_preserving_sign(current: &str, candidate: &str) -> Result<String, SemverError> {
    let sign = match current.chars().next() {
        Some(c @ ('^' | '~')) => c.to_string(),
        _ => String::new(),
    };
    let cleaned =
        clean(candidate).ok_or_else(|| SemverError::InvalidVersion(candidate.to_string()))?;
    Ok(format!("{}{}", sign, cleaned))
}

/// Whether the version parses and carries a pre-release tag.
pub fn is_prerelease(version: &str) -> bool {
    clean(version).is_some_and(|v| !v.pre.is_empty())
}

/// Drop invalid and pre-release versions, then sort newest first.
///
/// Equal-precedence versions keep their input order, so the output is a fixed
/// point: sorting it again returns the same list.
pub fn sort_descending_stable(versions: &[String]) -> Vec<String> {
    let mut parsed: Vec<(Version, &String)> = versions
        .iter()
        .filter_map(|raw| clean(raw).map(|v| (v, raw)))
        .filter(|(v, _)| v.pre.is_empty())
        .collect();

    // `sort_by` is stable; ties stay in input order.
    parsed.sort_by(|(a, _), (b, _)| b.cmp_precedence(a));

    parsed.into_iter().map(|(_, raw)| raw.clone()).collect()
}

/// Whether `candidate` is strictly newer than `current` (both bare).
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (clean(candidate), clean(current)) {
        (Some(c), Some(cur)) => c.cmp_precedence(&cur) == Ordering::Greater,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bump_preserves_caret_and_tilde() {
        assert_eq!(bump_preserving_sign("^4.17.21", "4.17.22").unwrap(), "^4.17.22");
        assert_eq!(bump_preserving_sign("~4.17.21", "4.17.22").unwrap(), "~4.17.22");
        assert_eq!(bump_preserving_sign("4.17.21", "4.17.22").unwrap(), "4.17.22");
    }

    #[test]
    fn bump_cleans_candidate() {
        assert_eq!(bump_preserving_sign("^1.0.0", "v2.0.0").unwrap(), "^2.0.0");
    }

    #[test]
    fn bump_rejects_invalid_candidate() {
        let err = bump_preserving_sign("^1.0.0", "not-a-version").unwrap_err();
        assert_eq!(err, SemverError::InvalidVersion("not-a-version".to_string()));
    }

    #[test]
    fn sort_newest_first() {
        let sorted = sort_descending_stable(&strings(&["4.17.21", "4.17.23", "4.17.22", "5.0.0"]));
        assert_eq!(sorted, strings(&["5.0.0", "4.17.23", "4.17.22", "4.17.21"]));
    }

    #[test]
    fn sort_drops_prereleases_and_garbage() {
        let sorted =
            sort_descending_stable(&strings(&["1.0.0", "1.0.1-beta", "1.0.2", "2.0.0-alpha", "x"]));
        assert_eq!(sorted, strings(&["1.0.2", "1.0.0"]));
    }

    #[test]
    fn sort_ties_keep_input_order() {
        // Build metadata does not affect precedence.
        let sorted = sort_descending_stable(&strings(&["1.0.0+b", "2.0.0", "1.0.0+a"]));
        assert_eq!(sorted, strings(&["2.0.0", "1.0.0+b", "1.0.0+a"]));
    }

    #[test]
    fn sort_is_idempotent() {
        let input = strings(&["0.1.0", "3.0.0", "1.0.0+x", "1.0.0", "2.5.1", "2.5.1-rc.1"]);
        let once = sort_descending_stable(&input);
        let twice = sort_descending_stable(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn parse_sign_variants() {
        assert_eq!(parse_sign("^1.2.3"), (SemverSign::Caret, "1.2.3".to_string()));
        assert_eq!(parse_sign("~1.2.3"), (SemverSign::Tilde, "1.2.3".to_string()));
        assert_eq!(parse_sign("1.2.3"), (SemverSign::Exact, "1.2.3".to_string()));
    }

    #[test]
    fn parse_sign_keeps_complex_ranges_verbatim() {
        for spec in [">=1.2.3 <2.0.0", "latest", "next", "*", "1.x || ^2.0.0", "<=3"] {
            assert_eq!(parse_sign(spec), (SemverSign::Exact, spec.to_string()), "{spec}");
        }
    }

    #[test]
    fn parse_sign_strips_sign_from_leading_range() {
        let (sign, bare) = parse_sign("^1.0.0 || ^2.0.0");
        assert_eq!(sign, SemverSign::Caret);
        assert_eq!(bare, "1.0.0 || ^2.0.0");
        assert!(!bare.starts_with(['^', '~']));
        assert!(is_complex_range(&bare));

        let (sign, bare) = parse_sign("~1.2 >=1.2.5");
        assert_eq!(sign, SemverSign::Tilde);
        assert_eq!(bare, "1.2 >=1.2.5");
    }

    #[test]
    fn prerelease_detection() {
        assert!(is_prerelease("1.0.0-beta.1"));
        assert!(!is_prerelease("1.0.0"));
        assert!(!is_prerelease("garbage"));
    }

    #[test]
    fn newer_comparison() {
        assert!(is_newer("4.17.21", "4.17.20"));
        assert!(!is_newer("4.17.20", "4.17.20"));
        assert!(!is_newer("4.17.19", "4.17.20"));
        assert!(!is_newer("4.17.21", "latest"));
    }
}
