//! Helm chart index resolution and chart install/uninstall
//!
//! The chart version is resolved from the repository index ourselves so
//! the exact chart URL can be recorded in events; `helm` itself is only
//! used to render and apply the release.

use std::collections::HashMap;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use kosmo_common::{Error, Result};

/// Chart repository index for the platform runtime
pub const CHART_INDEX_URL: &str = "https://charts.crossplane.io/stable/index.yaml";

/// Chart (and release) name of the platform runtime
pub const RUNTIME_CHART: &str = "crossplane";

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(40);

/// Parsed helm repository index
#[derive(Debug, Deserialize)]
pub struct ChartIndex {
    #[serde(default)]
    entries: HashMap<String, Vec<ChartEntry>>,
}

#[derive(Debug, Deserialize)]
struct ChartEntry {
    version: String,
    #[serde(default)]
    urls: Vec<String>,
}

/// A concrete downloadable chart version
#[derive(Debug, Clone)]
pub struct ChartRelease {
    /// Highest stable version found in the index
    pub version: semver::Version,
    /// Download URL of the chart archive
    pub url: String,
}

/// Fetch and parse a helm repository index
pub async fn fetch_index(url: &str) -> Result<ChartIndex> {
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| Error::fetch(url, err.to_string()))?;
    let body = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| Error::fetch(url, err.to_string()))?
        .text()
        .await
        .map_err(|err| Error::fetch(url, err.to_string()))?;
    serde_yaml::from_str(&body).map_err(|err| Error::serialization(format!("chart index: {err}")))
}

/// Latest stable version and URL of a chart in the index
///
/// Versions are ordered by semver, not lexicographically; entries with
/// unparseable versions, prerelease versions, or no URL are skipped.
pub fn latest_release(index: &ChartIndex, chart: &str) -> Result<ChartRelease> {
    let entries = index
        .entries
        .get(chart)
        .ok_or_else(|| Error::internal_with_context("helm", format!("chart '{chart}' not in index")))?;

    entries
        .iter()
        .filter_map(|entry| {
            let version = semver::Version::parse(&entry.version).ok()?;
            if !version.pre.is_empty() {
                return None;
            }
            let url = entry.urls.first()?.clone();
            Some(ChartRelease { version, url })
        })
        .max_by(|a, b| a.version.cmp(&b.version))
        .ok_or_else(|| {
            Error::internal_with_context("helm", format!("chart '{chart}' has no usable versions"))
        })
}

/// Install a chart archive by URL as a named release
///
/// Re-running against an existing release is a no-op, so the install
/// pipeline stays idempotent.
pub async fn install_chart(
    release: &str,
    chart_url: &str,
    namespace: &str,
    set_values: &[(String, String)],
) -> Result<()> {
    let mut args = vec![
        "install".to_string(),
        release.to_string(),
        chart_url.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ];
    for (key, value) in set_values {
        args.push("--set".to_string());
        args.push(format!("{key}={value}"));
    }

    let output = run_helm(&args).await?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("cannot re-use a name that is still in use") {
        debug!(release, "release already installed, continuing");
        return Ok(());
    }
    Err(Error::helm(format!(
        "install of '{release}' failed: {}",
        stderr.trim()
    )))
}

/// Uninstall a release; an already-absent release counts as success
pub async fn uninstall_chart(release: &str, namespace: &str) -> Result<()> {
    let args = vec![
        "uninstall".to_string(),
        release.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ];
    let output = run_helm(&args).await?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("release: not found") {
        debug!(release, "release not found, continuing");
        return Ok(());
    }
    Err(Error::helm(format!(
        "uninstall of '{release}' failed: {}",
        stderr.trim()
    )))
}

async fn run_helm(args: &[String]) -> Result<std::process::Output> {
    debug!(?args, "running helm");
    Command::new("helm")
        .args(args)
        .output()
        .await
        .map_err(|err| Error::helm(format!("failed to run helm: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
apiVersion: v1
entries:
  crossplane:
    - version: "1.9.1"
      urls: ["https://charts.example.com/crossplane-1.9.1.tgz"]
    - version: "1.10.0"
      urls: ["https://charts.example.com/crossplane-1.10.0.tgz"]
    - version: "1.11.0-rc.1"
      urls: ["https://charts.example.com/crossplane-1.11.0-rc.1.tgz"]
    - version: "not-a-version"
      urls: ["https://charts.example.com/bogus.tgz"]
  other:
    - version: "0.1.0"
      urls: []
"#;

    /// Story: "1.10.0" beats "1.9.1" even though it sorts lower as a
    /// string, and prereleases never win.
    #[test]
    fn story_latest_release_orders_by_semver() {
        let index: ChartIndex = serde_yaml::from_str(INDEX).unwrap();
        let release = latest_release(&index, "crossplane").unwrap();
        assert_eq!(release.version.to_string(), "1.10.0");
        assert_eq!(
            release.url,
            "https://charts.example.com/crossplane-1.10.0.tgz"
        );
    }

    #[test]
    fn test_chart_without_urls_is_unusable() {
        let index: ChartIndex = serde_yaml::from_str(INDEX).unwrap();
        let err = latest_release(&index, "other").unwrap_err();
        assert!(err.to_string().contains("no usable versions"));
    }

    #[test]
    fn test_unknown_chart() {
        let index: ChartIndex = serde_yaml::from_str(INDEX).unwrap();
        let err = latest_release(&index, "missing").unwrap_err();
        assert!(err.to_string().contains("not in index"));
    }
}
