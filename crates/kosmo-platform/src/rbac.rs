//! Cluster-admin bindings for provider service accounts
//!
//! The helm and kubernetes providers deploy arbitrary resources on behalf
//! of module compositions, so their service accounts get cluster-admin.

use kube::core::{DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::json;
use tracing::debug;

use kosmo_common::{dynamic, Error, Result, INSTALLED_BY_SELECTOR};

const PROVIDER_PREFIXES: [&str; 2] = ["provider-helm", "provider-kubernetes"];

/// The ClusterRoleBinding resource GVK
pub fn binding_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding")
}

/// Binding name for a provider service account, if it is one we bind
///
/// Service account names carry a revision hash suffix
/// (`provider-helm-abc123-...`); bindings collapse to the stable prefix
/// so re-installs reuse the same binding.
pub fn binding_name(service_account: &str) -> Option<String> {
    PROVIDER_PREFIXES
        .iter()
        .find(|prefix| service_account.starts_with(**prefix))
        .map(|prefix| format!("{prefix}-admin-binding"))
}

/// Build a cluster-admin binding for a service account
pub fn build_binding(name: &str, service_account: &str, namespace: &str) -> DynamicObject {
    let ar = kube::core::ApiResource::from_gvk(&binding_gvk());
    let mut obj = DynamicObject::new(name, &ar);
    obj.data = json!({
        "roleRef": {
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "ClusterRole",
            "name": "cluster-admin",
        },
        "subjects": [{
            "kind": "ServiceAccount",
            "name": service_account,
            "namespace": namespace,
        }],
    });
    obj
}

/// Bind provider service accounts in the namespace to cluster-admin
///
/// A cluster without the RBAC kinds (stripped-down distributions) is
/// tolerated: the step becomes a no-op. Returns the binding names
/// created.
pub async fn create_for_providers(client: Client, namespace: &str) -> Result<Vec<String>> {
    let sa_resource = kube::core::ApiResource::from_gvk(&GroupVersionKind::gvk(
        "",
        "v1",
        "ServiceAccount",
    ));
    let sa_api = kube::Api::<DynamicObject>::namespaced_with(client.clone(), namespace, &sa_resource);
    let accounts = dynamic::list(&sa_api, None).await?;

    let resolved = match dynamic::resolve_gvk(&client, &binding_gvk()).await {
        Ok(resolved) => resolved,
        Err(Error::NoKindMatch { .. }) => {
            debug!("cluster has no ClusterRoleBinding kind, skipping RBAC step");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err),
    };
    let binding_api = resolved.api(client, None);

    let mut created = Vec::new();
    for account in accounts {
        let Some(sa_name) = account.metadata.name else {
            continue;
        };
        let Some(name) = binding_name(&sa_name) else {
            continue;
        };
        dynamic::create(&binding_api, build_binding(&name, &sa_name, namespace)).await?;
        created.push(name);
    }
    Ok(created)
}

/// Names of the bindings this tool installed
pub async fn list_installed(client: Client) -> Result<Vec<String>> {
    let resolved = match dynamic::resolve_gvk(&client, &binding_gvk()).await {
        Ok(resolved) => resolved,
        Err(Error::NoKindMatch { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let api = resolved.api(client, None);
    let items = dynamic::list(&api, Some(INSTALLED_BY_SELECTOR)).await?;
    Ok(items
        .into_iter()
        .filter_map(|obj| obj.metadata.name)
        .collect())
}

/// Delete the bindings this tool installed; returns their names
pub async fn delete_installed(client: Client) -> Result<Vec<String>> {
    let resolved = match dynamic::resolve_gvk(&client, &binding_gvk()).await {
        Ok(resolved) => resolved,
        Err(Error::NoKindMatch { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let api = resolved.api(client.clone(), None);
    let names = list_installed(client).await?;
    for name in &names {
        dynamic::delete(&api, name).await?;
    }
    Ok(names)
}
