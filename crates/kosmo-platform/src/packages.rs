//! Provider package install and teardown

use kube::core::{DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::json;
use tokio::time::Duration;
use tracing::debug;

use kosmo_common::{dynamic, Error, Result, INSTALLED_BY_SELECTOR, PACKAGE_NAME_LABEL};

use crate::catalog::{self, PackageInfo};
use crate::controllerconfigs::{self, ProxySettings, PACKAGES_GROUP};
use crate::pods;

/// How long a package pod may take to become Ready
pub const READY_TIMEOUT: Duration = Duration::from_secs(300);

/// How long package pods may take to terminate on teardown
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(120);

/// The Provider resource GVK
pub fn provider_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(PACKAGES_GROUP, "v1", "Provider")
}

/// Validate and wire up a decoded package manifest
///
/// The manifest must be a Crossplane package object; its controller is
/// pointed at the package's ControllerConfig and the workload label is
/// stamped so the ready-wait can find the controller pod.
pub fn prepare_package_object(mut obj: DynamicObject, package: &str) -> Result<DynamicObject> {
    let types = obj
        .types
        .clone()
        .ok_or_else(|| Error::invalid_package(package, "manifest has no apiVersion/kind"))?;
    let group = types.api_version.split('/').next().unwrap_or_default();
    if group != PACKAGES_GROUP {
        return Err(Error::invalid_package(
            package,
            format!("unexpected API group '{group}', want '{PACKAGES_GROUP}'"),
        ));
    }

    if !obj.data["spec"].is_object() {
        obj.data["spec"] = json!({});
    }
    obj.data["spec"]["controllerConfigRef"] = json!({
        "name": controllerconfigs::controller_config_name(package)
    });

    obj.metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert(PACKAGE_NAME_LABEL.to_string(), package.to_string());

    Ok(obj)
}

/// Install one catalog package and wait for its controller pod
pub async fn install(
    client: Client,
    pkg: &PackageInfo,
    proxy: &ProxySettings,
    namespace: &str,
) -> Result<()> {
    let package = pkg.slug();
    let manifest = catalog::fetch_manifest(pkg).await?;
    let value: serde_json::Value = serde_yaml::from_str(&manifest)
        .map_err(|err| Error::invalid_package(&package, format!("manifest is not YAML: {err}")))?;
    let obj: DynamicObject = serde_json::from_value(value)
        .map_err(|err| Error::invalid_package(&package, format!("manifest decode: {err}")))?;

    controllerconfigs::create(client.clone(), &package, proxy).await?;

    let obj = prepare_package_object(obj, &package)?;
    let types = obj.types.clone().unwrap_or_default();
    let (group, version) = types
        .api_version
        .split_once('/')
        .ok_or_else(|| Error::invalid_package(&package, "apiVersion has no group"))?;
    let gvk = GroupVersionKind::gvk(group, version, &types.kind);

    let name = obj
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::invalid_package(&package, "manifest has no name"))?;

    let resolved = dynamic::resolve_gvk(&client, &gvk).await?;
    let api = resolved.api(client.clone(), Some(namespace));
    dynamic::apply(&api, &name, obj).await?;
    debug!(package = %package, name = %name, "package applied");

    pods::wait_until_ready(
        client,
        namespace,
        &format!("{PACKAGE_NAME_LABEL}={package}"),
        READY_TIMEOUT,
        &format!("package '{package}' pod to become Ready"),
    )
    .await
}

/// The Providers this tool installed
pub async fn list_installed(client: Client) -> Result<Vec<DynamicObject>> {
    let resolved = match dynamic::resolve_gvk(&client, &provider_gvk()).await {
        Ok(resolved) => resolved,
        // The package machinery is not installed; nothing to list.
        Err(Error::NoKindMatch { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let api = resolved.api(client, None);
    dynamic::list(&api, Some(INSTALLED_BY_SELECTOR)).await
}

/// Delete the Providers this tool installed; returns their names
///
/// After each delete the package's controller pods are watched until a
/// terminal delete event so the namespace can be removed afterwards.
pub async fn delete_installed(client: Client, namespace: &str) -> Result<Vec<String>> {
    let providers = list_installed(client.clone()).await?;
    if providers.is_empty() {
        return Ok(Vec::new());
    }

    let resolved = dynamic::resolve_gvk(&client, &provider_gvk()).await?;
    let api = resolved.api(client.clone(), None);

    let mut deleted = Vec::new();
    for provider in providers {
        let Some(name) = provider.metadata.name.clone() else {
            continue;
        };
        dynamic::delete(&api, &name).await?;

        if let Some(package) = provider
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(PACKAGE_NAME_LABEL))
        {
            pods::wait_until_deleted(
                client.clone(),
                namespace,
                &format!("{PACKAGE_NAME_LABEL}={package}"),
                DELETE_TIMEOUT,
                &format!("package '{package}' pods to terminate"),
            )
            .await?;
        }
        deleted.push(name);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: pkg.crossplane.io/v1
kind: Provider
metadata:
  name: provider-helm
spec:
  package: ghcr.io/kosmohq/provider-helm:0.9.0
"#;

    fn decode(manifest: &str) -> DynamicObject {
        let value: serde_json::Value = serde_yaml::from_str(manifest).unwrap();
        serde_json::from_value(value).unwrap()
    }

    /// Story: a fetched manifest gets its controller wired to the
    /// package's ControllerConfig and keeps its own spec fields.
    #[test]
    fn story_prepare_wires_controller_config() {
        let obj = prepare_package_object(decode(MANIFEST), "provider-helm").unwrap();

        assert_eq!(
            obj.data["spec"]["controllerConfigRef"]["name"],
            "provider-helm-controllerconfig"
        );
        assert_eq!(
            obj.data["spec"]["package"],
            "ghcr.io/kosmohq/provider-helm:0.9.0"
        );
        assert_eq!(
            obj.metadata.labels.as_ref().unwrap()[PACKAGE_NAME_LABEL],
            "provider-helm"
        );
    }

    /// Story: manifests from outside the package machinery are rejected
    /// before anything is applied to the cluster.
    #[test]
    fn story_wrong_group_is_rejected() {
        let manifest = MANIFEST.replace("pkg.crossplane.io/v1", "apps/v1");
        let err = prepare_package_object(decode(&manifest), "provider-helm").unwrap_err();
        assert!(matches!(err, Error::InvalidPackage { .. }));
        assert!(err.to_string().contains("apps"));
    }

    #[test]
    fn test_manifest_without_types_is_rejected() {
        let value = serde_json::json!({"metadata": {"name": "x"}});
        let obj: DynamicObject = serde_json::from_value(value).unwrap();
        let err = prepare_package_object(obj, "p").unwrap_err();
        assert!(err.to_string().contains("apiVersion"));
    }
}
