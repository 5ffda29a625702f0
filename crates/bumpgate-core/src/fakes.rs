//! In-memory fakes for registry lookups (testing only)
//!
//! Provides `StaticVersionSource`, which answers from a fixed table and
//! records every lookup.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::RegistryError;
use crate::registry::VersionSource;

// ---------------------------------------------------------------------------
// StaticVersionSource
// ---------------------------------------------------------------------------

/// Registry backed by a `HashMap<package, versions>`.
///
/// Unknown packages answer with a 404 status error; packages marked with
/// [`StaticVersionSource::fail`] answer with a transport error.
#[derive(Debug, Default)]
pub struct StaticVersionSource {
    versions: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashMap<String, String>>,
    lookups: Mutex<Vec<String>>,
}

impl StaticVersionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a package's published versions.
    pub fn with(self, package_name: &str, versions: &[&str]) -> Self {
        self.versions.lock().unwrap().insert(
            package_name.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Make lookups for `package_name` fail with `reason`.
    pub fn fail(self, package_name: &str, reason: &str) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert(package_name.to_string(), reason.to_string());
        self
    }

    /// Package names looked up so far, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionSource for StaticVersionSource {
    async fn fetch_versions(&self, package_name: &str) -> Result<Vec<String>, RegistryError> {
        self.lookups.lock().unwrap().push(package_name.to_string());

        if let Some(reason) = self.failing.lock().unwrap().get(package_name) {
            return Err(RegistryError::Http {
                package: package_name.to_string(),
                reason: reason.clone(),
            });
        }

        self.versions
            .lock()
            .unwrap()
            .get(package_name)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                package: package_name.to_string(),
                status: 404,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_from_table_and_logs_lookups() {
        let source = StaticVersionSource::new()
            .with("lodash", &["4.17.20", "4.17.21"])
            .fail("left-pad", "connection reset");

        assert_eq!(
            source.fetch_versions("lodash").await.unwrap(),
            vec!["4.17.20".to_string(), "4.17.21".to_string()]
        );
        assert!(matches!(
            source.fetch_versions("left-pad").await,
            Err(RegistryError::Http { .. })
        ));
        assert!(matches!(
            source.fetch_versions("ghost").await,
            Err(RegistryError::Status { status: 404, .. })
        ));
        assert_eq!(source.lookups(), vec!["lodash", "left-pad", "ghost"]);
    }
}
