//! Module claims: the objects operators actually configure

use kube::api::WatchEvent;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::{Map, Value};
use tokio::time::Duration;

use kosmo_common::conditions::is_condition_true;
use kosmo_common::watch::{watch_until, WatchConfig};
use kosmo_common::{dynamic, Result, MODULES_GROUP_SUFFIX};

/// How long a claim may take to become Ready
pub const READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Claim GVK for a module (`core` -> `Core.modules.kosmo.io/v1`)
pub fn claim_gvk(module: &str) -> GroupVersionKind {
    GroupVersionKind::gvk(MODULES_GROUP_SUFFIX, "v1", &capitalize(module))
}

/// Build the claim object for a module with the merged values as spec
pub fn build(module: &str, namespace: &str, values: Map<String, Value>) -> DynamicObject {
    let ar = ApiResource::from_gvk(&claim_gvk(module));
    let mut obj = DynamicObject::new(module, &ar).within(namespace);
    obj.data = Value::Object({
        let mut data = Map::new();
        data.insert("spec".to_string(), Value::Object(values));
        data
    });
    obj
}

/// Apply a module claim (server-side, idempotent)
pub async fn apply(
    client: Client,
    module: &str,
    namespace: &str,
    values: Map<String, Value>,
) -> Result<()> {
    let resolved = dynamic::resolve_gvk(&client, &claim_gvk(module)).await?;
    let api = resolved.api(client, Some(namespace));
    dynamic::apply(&api, module, build(module, namespace, values)).await?;
    Ok(())
}

/// Wait until the module claim reports Ready
pub async fn wait_until_ready(
    client: Client,
    module: &str,
    namespace: &str,
    timeout: Duration,
) -> Result<()> {
    let resolved = dynamic::resolve_gvk(&client, &claim_gvk(module)).await?;
    let module_name = module.to_string();
    let config = WatchConfig {
        resource: resolved.resource,
        namespace: resolved.namespaced.then(|| namespace.to_string()),
        label_selector: None,
        timeout,
        description: format!("module claim '{module}' to become Ready"),
    };
    watch_until(client, &config, &mut move |event| {
        Ok(matches!(
            event,
            WatchEvent::Added(obj) | WatchEvent::Modified(obj)
                if obj.metadata.name.as_deref() == Some(module_name.as_str())
                    && is_condition_true(obj, "Ready")
        ))
    })
    .await
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claim_gvk_capitalizes_module() {
        let gvk = claim_gvk("core");
        assert_eq!(gvk.kind, "Core");
        assert_eq!(gvk.group, "modules.kosmo.io");
        assert_eq!(gvk.version, "v1");
    }

    /// Story: merged values land under spec; the claim is named after
    /// the module and lives in the install namespace.
    #[test]
    fn story_claim_carries_values_as_spec() {
        let mut values = Map::new();
        values.insert("domain".to_string(), json!("demo.kosmo.io"));
        values.insert("ingress".to_string(), json!({"tls": true}));

        let obj = build("core", "kosmo-system", values);
        assert_eq!(obj.metadata.name.as_deref(), Some("core"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("kosmo-system"));
        assert_eq!(obj.data["spec"]["domain"], "demo.kosmo.io");
        assert_eq!(obj.data["spec"]["ingress"]["tls"], json!(true));
        assert_eq!(
            obj.types.as_ref().map(|t| t.kind.as_str()),
            Some("Core")
        );
    }
}
