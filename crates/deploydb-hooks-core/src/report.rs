//! # Build Reports
//!
//! Payload POSTed back to DeployDB when a build it triggered has finished.
//!
//! ```json
//! {"name": "deploy-faas", "status": "SUCCESS", "infoUrl": "https://ci.example.com/job/deploy-faas/12/"}
//! ```

use crate::{builds::CompletedBuild, BuildNumber, JobId};
use serde::{Deserialize, Serialize};
use url::Url;

/// Outcome reported to DeployDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Success,
    Failure,
}

/// Report of one finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWebhook {
    /// Name of the job that ran
    pub name: String,

    pub status: ReportStatus,

    /// Where to find the build
    #[serde(rename = "infoUrl")]
    pub info_url: String,
}

impl ReportWebhook {
    /// Build the report for a completed build
    ///
    /// Only a successful build is reported as `SUCCESS`; every other result
    /// is a `FAILURE`.
    pub fn from_build(build: &CompletedBuild, root_url: &str) -> Self {
        let status = if build.result.is_success() {
            ReportStatus::Success
        } else {
            ReportStatus::Failure
        };

        Self {
            name: build.job.to_string(),
            status,
            info_url: build_url(root_url, &build.job, build.number),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Public URL of a build
///
/// The job name is percent-encoded as a single path segment. A root that is
/// not an absolute base URL is joined as plain text.
pub fn build_url(root_url: &str, job: &JobId, number: BuildNumber) -> String {
    let root = root_url.trim().trim_end_matches('/');

    let mut url = match Url::parse(root) {
        Ok(url) if !url.cannot_be_a_base() => url,
        _ => return format!("{root}/job/{job}/{number}/"),
    };

    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push("job")
            .push(job.as_str())
            .push(&number.to_string())
            .push("");
    }
    url.into()
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
