//! Configurations: Crossplane packages carrying module compositions

use kube::api::WatchEvent;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::json;
use tokio::time::Duration;

use kosmo_common::conditions::is_healthy_and_installed;
use kosmo_common::watch::{watch_until, WatchConfig};
use kosmo_common::{dynamic, Error, Result, INSTALLED_BY_SELECTOR, PACKAGE_NAME_LABEL};

use crate::controllerconfigs::PACKAGES_GROUP;

/// Name of the core module package
pub const CORE_MODULE_NAME: &str = "kosmo-module-core";

/// OCI image of the core module package
pub const CORE_MODULE_IMAGE: &str = "ghcr.io/kosmohq/kosmo-module-core";

/// How long a package may take to turn Healthy and Installed
pub const HEALTHY_TIMEOUT: Duration = Duration::from_secs(120);

/// The Configuration resource GVK
pub fn gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(PACKAGES_GROUP, "v1", "Configuration")
}

/// Build a Configuration object for a module package
pub fn build(name: &str, image: &str, version: &str) -> DynamicObject {
    let ar = ApiResource::from_gvk(&gvk());
    let mut obj = DynamicObject::new(&format!("{name}-configuration"), &ar);
    obj.metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert(PACKAGE_NAME_LABEL.to_string(), name.to_string());
    obj.data = json!({
        "spec": {
            "package": format!("{image}:{version}"),
            "packagePullPolicy": "IfNotPresent",
            "revisionActivationPolicy": "Automatic",
            "revisionHistoryLimit": 1,
            "metadata": {
                "labels": { PACKAGE_NAME_LABEL: name }
            }
        }
    });
    obj
}

/// Install a module Configuration (idempotent)
pub async fn install(client: Client, name: &str, image: &str, version: &str) -> Result<()> {
    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client, None);
    dynamic::create(&api, build(name, image, version)).await
}

/// Wait until the named Configuration is both Healthy and Installed
///
/// Only with both conditions True does the package serve its CRDs, so
/// the claim steps that follow can resolve their kinds.
pub async fn wait_until_healthy_and_installed(
    client: Client,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let wanted = format!("{name}-configuration");
    let config = WatchConfig {
        resource: resolved.resource,
        namespace: None,
        label_selector: None,
        timeout,
        description: format!("configuration '{wanted}' to become Healthy and Installed"),
    };
    watch_until(client, &config, &mut |event| {
        Ok(matches!(
            event,
            WatchEvent::Added(obj) | WatchEvent::Modified(obj)
                if obj.metadata.name.as_deref() == Some(wanted.as_str())
                    && is_healthy_and_installed(obj)
        ))
    })
    .await
}

/// The Configurations this tool installed
///
/// An absent Configuration kind means the package machinery is gone;
/// nothing to list.
pub async fn list_installed(client: Client) -> Result<Vec<DynamicObject>> {
    let resolved = match dynamic::resolve_gvk(&client, &gvk()).await {
        Ok(resolved) => resolved,
        Err(Error::NoKindMatch { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let api = resolved.api(client, None);
    dynamic::list(&api, Some(INSTALLED_BY_SELECTOR)).await
}

/// Delete the Configurations this tool installed; returns their names
pub async fn delete_installed(client: Client) -> Result<Vec<String>> {
    let configurations = list_installed(client.clone()).await?;
    if configurations.is_empty() {
        return Ok(Vec::new());
    }

    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client, None);
    let mut deleted = Vec::new();
    for configuration in configurations {
        let Some(name) = configuration.metadata.name else {
            continue;
        };
        dynamic::delete(&api, &name).await?;
        deleted.push(name);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_shape() {
        let obj = build(CORE_MODULE_NAME, CORE_MODULE_IMAGE, "latest");

        assert_eq!(
            obj.metadata.name.as_deref(),
            Some("kosmo-module-core-configuration")
        );
        assert_eq!(
            obj.data["spec"]["package"],
            "ghcr.io/kosmohq/kosmo-module-core:latest"
        );
        assert_eq!(obj.data["spec"]["packagePullPolicy"], "IfNotPresent");
        assert_eq!(obj.data["spec"]["revisionHistoryLimit"], 1);
        assert_eq!(
            obj.data["spec"]["metadata"]["labels"][PACKAGE_NAME_LABEL],
            CORE_MODULE_NAME
        );
        assert_eq!(
            obj.metadata.labels.as_ref().unwrap()[PACKAGE_NAME_LABEL],
            CORE_MODULE_NAME
        );
    }

    /// Story: install stamps the same label teardown selects on, so the
    /// core module Configuration is found and removed on uninstall.
    #[test]
    fn story_stamped_configuration_matches_teardown_selector() {
        let mut obj = build(CORE_MODULE_NAME, CORE_MODULE_IMAGE, "latest");
        dynamic::stamp_installed_by(&mut obj);

        let (key, value) = INSTALLED_BY_SELECTOR
            .split_once('=')
            .expect("selector is key=value");
        assert_eq!(
            obj.metadata.labels.as_ref().unwrap().get(key).map(String::as_str),
            Some(value)
        );
    }
}
