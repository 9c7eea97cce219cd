//! ControllerConfigs: per-package controller settings (proxy env)

use kube::core::{DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::json;

use kosmo_common::{dynamic, Result, INSTALLED_BY_SELECTOR};

/// Group of the Crossplane package machinery
pub const PACKAGES_GROUP: &str = "pkg.crossplane.io";

/// Proxy settings forwarded to package controllers
#[derive(Debug, Clone, Default)]
pub struct ProxySettings {
    /// HTTP proxy URL, if any
    pub http_proxy: Option<String>,
    /// HTTPS proxy URL, if any
    pub https_proxy: Option<String>,
    /// Comma-separated no-proxy list, if any
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// Container env entries for the configured proxies
    ///
    /// Only non-empty values become entries; an unset proxy must not
    /// produce an empty env var in the controller.
    pub fn env_entries(&self) -> Vec<serde_json::Value> {
        [
            ("HTTP_PROXY", &self.http_proxy),
            ("HTTPS_PROXY", &self.https_proxy),
            ("NO_PROXY", &self.no_proxy),
        ]
        .into_iter()
        .filter_map(|(name, value)| match value.as_deref() {
            Some(v) if !v.is_empty() => Some(json!({"name": name, "value": v})),
            _ => None,
        })
        .collect()
    }
}

/// Name of the ControllerConfig owned by a package
pub fn controller_config_name(package: &str) -> String {
    format!("{package}-controllerconfig")
}

/// The ControllerConfig resource GVK
pub fn gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(PACKAGES_GROUP, "v1alpha1", "ControllerConfig")
}

/// Build the ControllerConfig object for a package
pub fn build(package: &str, proxy: &ProxySettings) -> DynamicObject {
    let ar = kube::core::ApiResource::from_gvk(&gvk());
    let mut obj = DynamicObject::new(&controller_config_name(package), &ar);

    let mut spec = json!({
        "metadata": {},
        "securityContext": {},
        "podSecurityContext": {},
    });
    let env = proxy.env_entries();
    if !env.is_empty() {
        spec["env"] = json!(env);
    }
    obj.data = json!({ "spec": spec });
    obj
}

/// Create the ControllerConfig for a package (idempotent)
pub async fn create(client: Client, package: &str, proxy: &ProxySettings) -> Result<()> {
    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client, None);
    dynamic::create(&api, build(package, proxy)).await
}

/// Names of the ControllerConfigs this tool installed
pub async fn list_installed(client: Client) -> Result<Vec<String>> {
    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client, None);
    let items = dynamic::list(&api, Some(INSTALLED_BY_SELECTOR)).await?;
    Ok(items
        .into_iter()
        .filter_map(|obj| obj.metadata.name)
        .collect())
}

/// Delete the ControllerConfigs this tool installed; returns their names
pub async fn delete_installed(client: Client) -> Result<Vec<String>> {
    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client.clone(), None);
    let names = list_installed(client).await?;
    for name in &names {
        dynamic::delete(&api, name).await?;
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: only configured proxies reach the controller; unset or
    /// empty values never become empty env vars.
    #[test]
    fn story_only_nonempty_proxies_become_env() {
        let proxy = ProxySettings {
            http_proxy: Some("http://proxy:3128".to_string()),
            https_proxy: Some(String::new()),
            no_proxy: None,
        };
        let env = proxy.env_entries();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0]["name"], "HTTP_PROXY");
        assert_eq!(env[0]["value"], "http://proxy:3128");

        assert!(ProxySettings::default().env_entries().is_empty());
    }

    #[test]
    fn test_build_shape() {
        let proxy = ProxySettings {
            http_proxy: Some("http://proxy:3128".to_string()),
            https_proxy: Some("http://proxy:3129".to_string()),
            no_proxy: Some("10.0.0.0/8".to_string()),
        };
        let obj = build("provider-helm", &proxy);

        assert_eq!(
            obj.metadata.name.as_deref(),
            Some("provider-helm-controllerconfig")
        );
        assert_eq!(obj.data["spec"]["env"].as_array().unwrap().len(), 3);
        assert!(obj.data["spec"]["securityContext"].is_object());
    }

    #[test]
    fn test_build_without_proxies_omits_env() {
        let obj = build("provider-kubernetes", &ProxySettings::default());
        assert!(obj.data["spec"].get("env").is_none());
    }
}
