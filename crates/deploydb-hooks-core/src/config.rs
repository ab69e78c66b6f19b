//! DeployDB connection settings.

use crate::DeploymentId;
use serde::{Deserialize, Serialize};
use url::Url;

/// Path of the promotions resource of a deployment, relative to the base URL
pub const REPORT_PATH_TEMPLATE: &str = "/api/deployments/{id}/promotions";

/// Where to find DeployDB
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployDbConfig {
    /// Base address of the DeployDB server, e.g. `https://deploydb.example.com/`
    #[serde(default)]
    pub base_url: Option<String>,
}

impl DeployDbConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }

    /// Configured base URL, trimmed and without trailing slashes
    ///
    /// `None` when the URL is missing, blank, or not an absolute `http` or
    /// `https` URL.
    pub fn base_url(&self) -> Option<&str> {
        let base_url = self.base_url.as_deref()?.trim();
        if base_url.is_empty() {
            return None;
        }

        let parsed = Url::parse(base_url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
            return None;
        }

        Some(base_url.trim_end_matches('/'))
    }

    /// URL to POST the report for a deployment to
    pub fn report_url(&self, deployment: DeploymentId) -> Option<String> {
        let base_url = self.base_url()?;
        Some(format!(
            "{}{}",
            base_url,
            REPORT_PATH_TEMPLATE.replace("{id}", &deployment.to_string())
        ))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
