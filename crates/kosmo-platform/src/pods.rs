//! Pod readiness and teardown waits

use kube::core::{ApiResource, GroupVersionKind};
use kube::{api::WatchEvent, Client};
use tokio::time::Duration;

use kosmo_common::conditions::is_pod_ready;
use kosmo_common::watch::{watch_until, WatchConfig};
use kosmo_common::{dynamic, Result};

/// The core v1 Pod resource
pub fn pod_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Pod"))
}

/// Whether any pod matches the selector in the namespace
pub async fn any_exists(client: Client, namespace: &str, label_selector: &str) -> Result<bool> {
    let api = kube::Api::namespaced_with(client, namespace, &pod_resource());
    let pods = dynamic::list(&api, Some(label_selector)).await?;
    Ok(!pods.is_empty())
}

/// Wait until a pod matching the selector reports Ready
pub async fn wait_until_ready(
    client: Client,
    namespace: &str,
    label_selector: &str,
    timeout: Duration,
    description: &str,
) -> Result<()> {
    let config = WatchConfig {
        resource: pod_resource(),
        namespace: Some(namespace.to_string()),
        label_selector: Some(label_selector.to_string()),
        timeout,
        description: description.to_string(),
    };
    watch_until(client, &config, &mut |event| {
        Ok(matches!(
            event,
            WatchEvent::Added(pod) | WatchEvent::Modified(pod) if is_pod_ready(pod)
        ))
    })
    .await
}

/// Wait until the pods matching the selector are torn down
///
/// Already-gone pods count as done; otherwise the watch stops on the
/// first Deleted event for the selector.
pub async fn wait_until_deleted(
    client: Client,
    namespace: &str,
    label_selector: &str,
    timeout: Duration,
    description: &str,
) -> Result<()> {
    if !any_exists(client.clone(), namespace, label_selector).await? {
        return Ok(());
    }

    let config = WatchConfig {
        resource: pod_resource(),
        namespace: Some(namespace.to_string()),
        label_selector: Some(label_selector.to_string()),
        timeout,
        description: description.to_string(),
    };
    watch_until(client, &config, &mut |event| {
        Ok(matches!(event, WatchEvent::Deleted(_)))
    })
    .await
}
