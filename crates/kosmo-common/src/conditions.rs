//! Status condition parsing for dynamic objects
//!
//! Platform CRDs (Crossplane packages, module claims) and core resources
//! all report progress through `status.conditions`; these helpers read
//! them without typed structs.

use kube::core::DynamicObject;
use serde::Deserialize;

/// A single entry of `status.conditions`
#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    /// Condition type, e.g. `Ready`, `Healthy`, `Installed`
    #[serde(rename = "type")]
    pub condition_type: String,
    /// `True`, `False` or `Unknown`
    pub status: String,
    /// Machine-readable reason, when reported
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable detail, when reported
    #[serde(default)]
    pub message: Option<String>,
}

/// Extract the conditions of a dynamic object
///
/// Objects without a status, without conditions, or with conditions that
/// do not deserialize yield the empty vec.
pub fn conditions(obj: &DynamicObject) -> Vec<Condition> {
    obj.data
        .get("status")
        .and_then(|status| status.get("conditions"))
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Whether the object reports the given condition type with status `True`
///
/// An absent condition counts as not true.
pub fn is_condition_true(obj: &DynamicObject, condition_type: &str) -> bool {
    conditions(obj)
        .iter()
        .any(|c| c.condition_type == condition_type && c.status == "True")
}

/// Whether a Crossplane package is both `Healthy` and `Installed`
///
/// Both conditions must be present and `True`; either one alone is not
/// enough for the package to serve its CRDs.
pub fn is_healthy_and_installed(obj: &DynamicObject) -> bool {
    is_condition_true(obj, "Healthy") && is_condition_true(obj, "Installed")
}

/// Whether a pod reports the `Ready` condition as `True`
pub fn is_pod_ready(obj: &DynamicObject) -> bool {
    is_condition_true(obj, "Ready")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::{ApiResource, GroupVersionKind};
    use serde_json::json;

    fn package_with(healthy: Option<&str>, installed: Option<&str>) -> DynamicObject {
        let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "pkg.crossplane.io",
            "v1",
            "Configuration",
        ));
        let mut obj = DynamicObject::new("core", &ar);
        let mut conds = Vec::new();
        if let Some(status) = healthy {
            conds.push(json!({"type": "Healthy", "status": status}));
        }
        if let Some(status) = installed {
            conds.push(json!({"type": "Installed", "status": status}));
        }
        obj.data = json!({"status": {"conditions": conds}});
        obj
    }

    /// Story: a package only counts as ready for use when Healthy and
    /// Installed are both True; either alone is still in-progress.
    #[test]
    fn story_package_readiness_requires_both_conditions() {
        assert!(is_healthy_and_installed(&package_with(
            Some("True"),
            Some("True")
        )));
        assert!(!is_healthy_and_installed(&package_with(
            Some("True"),
            Some("False")
        )));
        assert!(!is_healthy_and_installed(&package_with(
            Some("False"),
            Some("True")
        )));
        assert!(!is_healthy_and_installed(&package_with(
            Some("False"),
            Some("False")
        )));
    }

    #[test]
    fn test_absent_conditions_count_as_not_true() {
        assert!(!is_healthy_and_installed(&package_with(Some("True"), None)));
        assert!(!is_healthy_and_installed(&package_with(None, None)));

        let ar = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Pod"));
        let no_status = DynamicObject::new("p", &ar);
        assert!(!is_pod_ready(&no_status));
        assert!(conditions(&no_status).is_empty());
    }

    #[test]
    fn test_unknown_status_is_not_true() {
        assert!(!is_healthy_and_installed(&package_with(
            Some("Unknown"),
            Some("True")
        )));
    }

    #[test]
    fn test_condition_fields_parse() {
        let ar = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Pod"));
        let mut obj = DynamicObject::new("p", &ar);
        obj.data = json!({"status": {"conditions": [
            {"type": "Ready", "status": "False", "reason": "ContainersNotReady", "message": "containers with unready status"}
        ]}});

        let conds = conditions(&obj);
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].condition_type, "Ready");
        assert_eq!(conds[0].reason.as_deref(), Some("ContainersNotReady"));
        assert!(!is_pod_ready(&obj));
    }
}
