//! Properties of the version policy over hand-picked version lists.

use bumpgate_core::{
    bump_preserving_sign, sort_descending_stable, DependencySection, DependencyState, SemverSign,
    VersionCandidateSet,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn corpus() -> Vec<Vec<String>> {
    vec![
        strings(&[]),
        strings(&["1.0.0"]),
        strings(&["0.0.1", "0.0.2", "0.0.10", "0.1.0"]),
        strings(&["2.0.0", "2.0.0-rc.1", "1.9.9", "10.0.0", "1.10.0"]),
        strings(&["1.0.0+build.2", "1.0.0", "1.0.0+build.1", "0.9.0"]),
        strings(&["v3.0.0", "=2.0.0", "garbage", "", "3.0.0-beta"]),
    ]
}

#[test]
fn sorting_twice_equals_sorting_once() {
    for input in corpus() {
        let once = sort_descending_stable(&input);
        assert_eq!(sort_descending_stable(&once), once, "input {input:?}");
    }
}

#[test]
fn sorted_output_has_no_prereleases() {
    for input in corpus() {
        for version in sort_descending_stable(&input) {
            assert!(!version.contains('-'), "{version} leaked through");
        }
    }
}

#[test]
fn numeric_not_lexical_ordering() {
    let sorted = sort_descending_stable(&strings(&["1.9.9", "1.10.0", "10.0.0", "2.0.0"]));
    assert_eq!(sorted, strings(&["10.0.0", "2.0.0", "1.10.0", "1.9.9"]));
}

#[test]
fn bump_keeps_the_sign_of_current() {
    for current in ["^1.2.3", "~1.2.3", "1.2.3"] {
        for candidate in ["1.2.4", "2.0.0", "v3.1.0", "0.0.1"] {
            let bumped = bump_preserving_sign(current, candidate).unwrap();
            match current.chars().next() {
                Some(c @ ('^' | '~')) => assert!(bumped.starts_with(c), "{bumped}"),
                _ => assert!(bumped.starts_with(|c: char| c.is_ascii_digit()), "{bumped}"),
            }
        }
    }
}

#[test]
fn every_candidate_is_newer_than_current() {
    let state = DependencyState {
        package_name: "express".to_string(),
        version: "4.18.2".to_string(),
        sign: SemverSign::Caret,
        section: DependencySection::Dependencies,
    };
    let set = VersionCandidateSet::resolve(
        &state,
        &strings(&["4.17.3", "4.18.2", "4.18.3", "5.0.0-beta.1", "4.19.2", "5.0.0"]),
    )
    .unwrap();
    assert_eq!(set.candidates, strings(&["5.0.0", "4.19.2", "4.18.3"]));
}
