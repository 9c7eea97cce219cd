//! Package catalog: which provider packages the platform installs

use serde::Deserialize;

use kosmo_common::{Error, Result};

/// Default catalog index location
pub const CATALOG_INDEX_URL: &str = "https://catalog.kosmo.io/index.json";

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(40);

/// One catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct PackageInfo {
    /// Display name; slugged for object names and labels
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// OCI image of the package
    pub image: String,
    /// Version to install
    pub version: String,
    /// Whether this package is part of the CLI install set
    #[serde(default)]
    pub cli: bool,
    /// URL template of the install manifest; `VERSION` is substituted
    pub package: String,
}

impl PackageInfo {
    /// Object-name-safe form of the package name
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Manifest URL with the version placeholder substituted
    pub fn manifest_url(&self) -> String {
        self.package.replace("VERSION", &self.version)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogIndex {
    #[serde(default)]
    packages: Vec<PackageInfo>,
}

/// Fetch the catalog index
pub async fn fetch(url: &str) -> Result<Vec<PackageInfo>> {
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| Error::fetch(url, err.to_string()))?;
    let index: CatalogIndex = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| Error::fetch(url, err.to_string()))?
        .json()
        .await
        .map_err(|err| Error::fetch(url, err.to_string()))?;
    Ok(index.packages)
}

/// Keep only the packages marked for CLI install
pub fn for_cli(packages: Vec<PackageInfo>) -> Vec<PackageInfo> {
    packages.into_iter().filter(|pkg| pkg.cli).collect()
}

/// Fetch the install manifest of a package
pub async fn fetch_manifest(pkg: &PackageInfo) -> Result<String> {
    let url = pkg.manifest_url();
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| Error::fetch(&url, err.to_string()))?;
    client
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| Error::fetch(&url, err.to_string()))?
        .text()
        .await
        .map_err(|err| Error::fetch(&url, err.to_string()))
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<PackageInfo> {
        serde_json::from_str::<CatalogIndex>(
            r#"{
                "packages": [
                    {"name": "Provider Helm", "image": "ghcr.io/kosmohq/provider-helm",
                     "version": "0.9.0", "cli": true,
                     "package": "https://pkg.kosmo.io/provider-helm/VERSION/install.yaml"},
                    {"name": "provider-kubernetes", "image": "ghcr.io/kosmohq/provider-kubernetes",
                     "version": "0.4.1", "cli": true,
                     "package": "https://pkg.kosmo.io/provider-kubernetes/VERSION/install.yaml"},
                    {"name": "provider-aws", "image": "ghcr.io/kosmohq/provider-aws",
                     "version": "0.30.0",
                     "package": "https://pkg.kosmo.io/provider-aws/VERSION/install.yaml"}
                ]
            }"#,
        )
        .unwrap()
        .packages
    }

    /// Story: only entries flagged for CLI install make it into the
    /// pipeline; on-demand packages stay in the catalog.
    #[test]
    fn story_cli_filter_selects_install_set() {
        let cli = for_cli(catalog());
        let names: Vec<_> = cli.iter().map(|p| p.slug()).collect();
        assert_eq!(names, vec!["provider-helm", "provider-kubernetes"]);
    }

    #[test]
    fn test_manifest_url_substitutes_version() {
        let pkg = &catalog()[0];
        assert_eq!(
            pkg.manifest_url(),
            "https://pkg.kosmo.io/provider-helm/0.9.0/install.yaml"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Provider Helm"), "provider-helm");
        assert_eq!(slugify("  provider_git  "), "provider-git");
    }
}
