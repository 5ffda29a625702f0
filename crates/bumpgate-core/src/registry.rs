//! Package registry lookups.
//!
//! The engine only needs "given a package name, return the version strings the
//! registry knows". [`VersionSource`] is that seam; [`NpmRegistry`] is the
//! HTTP implementation against the public npm registry.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::error::RegistryError;

/// The public npm registry.
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Anything that can list the published versions of a package.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Every non-deprecated version string, in registry order.
    async fn fetch_versions(&self, package_name: &str) -> Result<Vec<String>, RegistryError>;
}

/// Registry client configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let timeout_secs = std::env::var("BUMPGATE_REGISTRY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        RegistryConfig {
            url: NPM_REGISTRY_URL.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            user_agent: format!("bumpgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RegistryConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// HTTP client for an npm-compatible registry.
pub struct NpmRegistry {
    config: RegistryConfig,
    http_client: reqwest::Client,
}

impl NpmRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;

        Ok(NpmRegistry {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self, RegistryError> {
        Self::new(RegistryConfig::from_env())
    }

    fn package_url(&self, package_name: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            encode_package_name(package_name)
        )
    }
}

#[async_trait]
impl VersionSource for NpmRegistry {
    async fn fetch_versions(&self, package_name: &str) -> Result<Vec<String>, RegistryError> {
        let url = self.package_url(package_name);
        debug!(package = %package_name, url = %url, "fetching packument");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RegistryError::Http {
                package: package_name.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                package: package_name.to_string(),
                status: status.as_u16(),
            });
        }

        let packument: Value = response.json().await.map_err(|e| RegistryError::Decode {
            package: package_name.to_string(),
            reason: e.to_string(),
        })?;
        versions_from_packument(package_name, &packument)
    }
}

/// Scoped names keep their `@` but have the `/` escaped.
pub fn encode_package_name(package_name: &str) -> String {
    package_name.replace('/', "%2F")
}

/// Keys of the packument's `versions` object whose entry is not deprecated.
pub fn versions_from_packument(
    package_name: &str,
    packument: &Value,
) -> Result<Vec<String>, RegistryError> {
    let versions = match packument.get("versions") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(versions)) => versions,
        Some(_) => {
            return Err(RegistryError::Decode {
                package: package_name.to_string(),
                reason: "`versions` is not an object".to_string(),
            })
        }
    };

    Ok(versions
        .iter()
        .filter(|(_, meta)| meta.get("deprecated").is_none())
        .map(|(version, _)| version.clone())
        .collect())
}

/// Warn when the project's `.npmrc` points at a registry other than npmjs.
///
/// Lookups always go to [`NPM_REGISTRY_URL`]; the warning tells the user so.
pub fn detect_custom_registry(project_dir: &Path) -> Option<String> {
    let npmrc = std::fs::read_to_string(project_dir.join(".npmrc")).ok()?;

    npmrc
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "registry")
        .map(|(_, url)| url.trim().to_string())
        .filter(|url| url.trim_end_matches('/') != NPM_REGISTRY_URL)
        .map(|url| {
            format!(
                "Custom registry {} detected, using {} instead",
                url, NPM_REGISTRY_URL
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_names_are_escaped() {
        assert_eq!(encode_package_name("@types/node"), "@types%2Fnode");
        assert_eq!(encode_package_name("lodash"), "lodash");
    }

    #[test]
    fn package_url_joins_without_double_slash() {
        let registry = NpmRegistry::new(RegistryConfig {
            url: "https://registry.example.test/".to_string(),
            ..RegistryConfig::default()
        })
        .unwrap();
        assert_eq!(
            registry.package_url("@scope/pkg"),
            "https://registry.example.test/@scope%2Fpkg"
        );
    }

    #[test]
    fn deprecated_versions_are_dropped() {
        let packument = json!({
            "name": "left-pad",
            "versions": {
                "1.0.0": {},
                "1.1.0": { "deprecated": "use String.prototype.padStart" },
                "1.3.0": { "dist": {} }
            }
        });
        let versions = versions_from_packument("left-pad", &packument).unwrap();
        assert_eq!(versions, vec!["1.0.0".to_string(), "1.3.0".to_string()]);
    }

    #[test]
    fn missing_versions_is_empty() {
        let versions = versions_from_packument("ghost", &json!({ "name": "ghost" })).unwrap();
        assert!(versions.is_empty());
    }

    #[test]
    fn malformed_versions_is_decode_error() {
        let err = versions_from_packument("odd", &json!({ "versions": [] })).unwrap_err();
        assert!(matches!(err, RegistryError::Decode { .. }));
    }

    #[test]
    fn custom_registry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".npmrc"),
            "# company mirror\nregistry=https://npm.internal.example/\nalways-auth=true\n",
        )
        .unwrap();
        let warning = detect_custom_registry(dir.path()).unwrap();
        assert_eq!(
            warning,
            "Custom registry https://npm.internal.example/ detected, using https://registry.npmjs.org instead"
        );
    }

    #[test]
    fn public_registry_is_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".npmrc"),
            "registry=https://registry.npmjs.org/\n",
        )
        .unwrap();
        assert!(detect_custom_registry(dir.path()).is_none());

        let empty = tempfile::tempdir().unwrap();
        assert!(detect_custom_registry(empty.path()).is_none());
    }
}
