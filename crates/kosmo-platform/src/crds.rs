//! CRD and namespace cleanup for teardown
//!
//! Teardown can leave CRDs with finalizers pointing at controllers that
//! no longer exist; these helpers clear the finalizers and delete the
//! definitions so a re-install starts clean.

use kube::core::{DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::json;
use tokio::time::{sleep, Duration};
use tracing::debug;

use kosmo_common::{dynamic, Error, Result};

const CLEANUP_MARKERS: [&str; 2] = ["kosmo", "crossplane"];

/// Pause between CRD deletions so the API server keeps up
const DELETE_PAUSE: Duration = Duration::from_secs(1);

/// The CustomResourceDefinition resource GVK
pub fn gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("apiextensions.k8s.io", "v1", "CustomResourceDefinition")
}

/// Whether a CRD belongs to the platform and should be cleaned up
pub fn should_clean(name: &str) -> bool {
    CLEANUP_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Names of the platform CRDs currently on the cluster
pub async fn list_platform_crds(client: Client) -> Result<Vec<String>> {
    let resolved = match dynamic::resolve_gvk(&client, &gvk()).await {
        Ok(resolved) => resolved,
        Err(Error::NoKindMatch { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let api = resolved.api(client, None);
    let crds = dynamic::list(&api, None).await?;
    Ok(crds
        .into_iter()
        .filter_map(|crd| crd.metadata.name)
        .filter(|name| should_clean(name))
        .collect())
}

/// Clear finalizers and delete the platform CRDs; returns their names
pub async fn cleanup(client: Client) -> Result<Vec<String>> {
    let names = list_platform_crds(client.clone()).await?;
    if names.is_empty() {
        return Ok(names);
    }

    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client, None);
    for name in &names {
        dynamic::patch_merge(&api, name, &json!({"metadata": {"finalizers": []}})).await?;
        dynamic::delete(&api, name).await?;
        debug!(crd = %name, "definition removed");
        sleep(DELETE_PAUSE).await;
    }
    Ok(names)
}

/// Delete a namespace, forcing its finalizers if it lingers
pub async fn force_delete_namespace(client: Client, namespace: &str) -> Result<()> {
    let resource = kube::core::ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Namespace"));
    let api = kube::Api::<DynamicObject>::all_with(client, &resource);

    dynamic::delete(&api, namespace).await?;

    // A namespace stuck terminating keeps its finalizers; strip them.
    if dynamic::get(&api, namespace).await?.is_some() {
        dynamic::patch_merge(
            &api,
            namespace,
            &json!({"metadata": {"finalizers": []}, "spec": {"finalizers": []}}),
        )
        .await?;
    }
    Ok(())
}
