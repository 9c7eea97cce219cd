//! CompositeResourceDefinition lookup and schema flattening
//!
//! Module claims are driven by the module XRD's OpenAPI schema: leaf
//! fields become dotted paths (`ingress.domain`), defaults and required
//! flags drive the prompt flow.

use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::{Map, Value};
use tracing::debug;

use kosmo_common::{dynamic, Error, Result};

/// XRD name of the core module
pub const CORE_MODULE_XRD: &str = "core.modules.kosmo.io";

/// The CompositeResourceDefinition resource GVK
pub fn gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(
        "apiextensions.crossplane.io",
        "v1",
        "CompositeResourceDefinition",
    )
}

/// A flattened leaf field of a claim schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Dotted path of the field below `spec` (e.g. `ingress.domain`)
    pub name: String,
    /// Schema description, if present
    pub description: Option<String>,
    /// OpenAPI type (`string`, `boolean`, `integer`, ...)
    pub field_type: String,
    /// Default value rendered as a string, if present
    pub default: Option<String>,
    /// Whether the schema marks the field required
    pub required: bool,
}

impl SchemaField {
    /// Required fields without a default need a value from the operator
    pub fn needs_prompt(&self) -> bool {
        self.required && self.default.is_none()
    }
}

/// Fetch an XRD by name; `None` if not installed
pub async fn get(client: Client, name: &str) -> Result<Option<DynamicObject>> {
    let resolved = dynamic::resolve_gvk(&client, &gvk()).await?;
    let api = resolved.api(client, None);
    dynamic::get(&api, name).await
}

/// List all XRDs in the cluster; an absent XRD kind yields the empty vec
pub async fn list(client: Client) -> Result<Vec<DynamicObject>> {
    let resolved = match dynamic::resolve_gvk(&client, &gvk()).await {
        Ok(resolved) => resolved,
        Err(Error::NoKindMatch { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let api = resolved.api(client, None);
    dynamic::list(&api, None).await
}

/// Flatten the `spec` schema of an XRD into dotted leaf fields
///
/// Objects are recursed with dotted prefixes; array-valued nodes are
/// skipped without disturbing their siblings. Output is sorted by name.
pub fn spec_fields(xrd: &DynamicObject) -> Result<Vec<SchemaField>> {
    let schema = xrd
        .data
        .pointer("/spec/versions/0/schema/openAPIV3Schema/properties/spec")
        .ok_or_else(|| {
            Error::serialization_for_kind("CompositeResourceDefinition", "no spec schema")
        })?;

    let mut fields = Vec::new();
    flatten_object(schema, "", &mut fields);
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(fields)
}

fn flatten_object(schema: &Value, prefix: &str, out: &mut Vec<SchemaField>) {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for (key, prop) in properties {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let prop_type = prop.get("type").and_then(Value::as_str).unwrap_or("string");
        match prop_type {
            "object" => flatten_object(prop, &path, out),
            "array" => {
                // List-valued claim fields cannot be prompted for.
                debug!(path = %path, "skipping array-valued schema field");
            }
            _ => out.push(SchemaField {
                name: path,
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
                field_type: prop_type.to_string(),
                default: prop.get("default").map(render_scalar),
                required: required.contains(&key.as_str()),
            }),
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Derive the composite resource of an XRD for teardown
///
/// Built from the XRD spec (group, first served version, names) rather
/// than discovery, so instances can be found even while the package that
/// served them is being removed.
pub fn derived_resource(xrd: &DynamicObject) -> Result<ApiResource> {
    let spec = &xrd.data["spec"];
    let group = spec["group"].as_str().ok_or_else(|| {
        Error::serialization_for_kind("CompositeResourceDefinition", "spec.group missing")
    })?;
    let version = spec
        .pointer("/versions/0/name")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::serialization_for_kind("CompositeResourceDefinition", "spec.versions empty")
        })?;
    let kind = spec
        .pointer("/names/kind")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::serialization_for_kind("CompositeResourceDefinition", "spec.names.kind missing")
        })?;
    let plural = spec
        .pointer("/names/plural")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::serialization_for_kind(
                "CompositeResourceDefinition",
                "spec.names.plural missing",
            )
        })?;

    Ok(ApiResource {
        group: group.to_string(),
        version: version.to_string(),
        api_version: format!("{group}/{version}"),
        kind: kind.to_string(),
        plural: plural.to_string(),
    })
}

/// Whether an XRD belongs to the platform module group
pub fn is_module_xrd(xrd: &DynamicObject) -> bool {
    xrd.data
        .pointer("/spec/group")
        .and_then(Value::as_str)
        .is_some_and(|group| group.ends_with(kosmo_common::MODULES_GROUP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn xrd_with_schema(spec_schema: Value) -> DynamicObject {
        let ar = ApiResource::from_gvk(&gvk());
        let mut obj = DynamicObject::new(CORE_MODULE_XRD, &ar);
        obj.data = json!({
            "spec": {
                "group": "modules.kosmo.io",
                "names": {"kind": "Core", "plural": "cores"},
                "versions": [{
                    "name": "v1",
                    "schema": {"openAPIV3Schema": {"properties": {"spec": spec_schema}}}
                }]
            }
        });
        obj
    }

    /// Story: nested objects flatten to dotted paths; an array in the
    /// middle is skipped without corrupting its sibling fields.
    #[test]
    fn story_flattening_skips_arrays_and_keeps_siblings() {
        let xrd = xrd_with_schema(json!({
            "type": "object",
            "required": ["domain"],
            "properties": {
                "domain": {"type": "string", "description": "platform domain"},
                "ingress": {
                    "type": "object",
                    "properties": {
                        "annotations": {"type": "array", "items": {"type": "string"}},
                        "className": {"type": "string", "default": "nginx"},
                        "tls": {"type": "boolean", "default": true}
                    }
                }
            }
        }));

        let fields = spec_fields(&xrd).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["domain", "ingress.className", "ingress.tls"]);

        let class_name = &fields[1];
        assert_eq!(class_name.default.as_deref(), Some("nginx"));
        assert!(!class_name.required);

        let tls = &fields[2];
        assert_eq!(tls.field_type, "boolean");
        assert_eq!(tls.default.as_deref(), Some("true"));
    }

    /// Story: only required fields without defaults are put to the
    /// operator; everything else resolves silently.
    #[test]
    fn story_prompting_targets_required_without_default() {
        let xrd = xrd_with_schema(json!({
            "type": "object",
            "required": ["domain", "replicas"],
            "properties": {
                "domain": {"type": "string"},
                "replicas": {"type": "integer", "default": 1},
                "debug": {"type": "boolean"}
            }
        }));

        let fields = spec_fields(&xrd).unwrap();
        let prompted: Vec<&str> = fields
            .iter()
            .filter(|f| f.needs_prompt())
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(prompted, vec!["domain"]);
    }

    #[test]
    fn test_fields_are_sorted() {
        let xrd = xrd_with_schema(json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "string"},
                "mid": {"type": "object", "properties": {"b": {"type": "string"}}}
            }
        }));
        let names: Vec<String> = spec_fields(&xrd)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid.b", "zeta"]);
    }

    #[test]
    fn test_derived_resource_from_spec() {
        let xrd = xrd_with_schema(json!({"type": "object", "properties": {}}));
        let resource = derived_resource(&xrd).unwrap();
        assert_eq!(resource.group, "modules.kosmo.io");
        assert_eq!(resource.api_version, "modules.kosmo.io/v1");
        assert_eq!(resource.kind, "Core");
        assert_eq!(resource.plural, "cores");
        assert!(is_module_xrd(&xrd));
    }

    #[test]
    fn test_missing_schema_is_an_error() {
        let ar = ApiResource::from_gvk(&gvk());
        let obj = DynamicObject::new("broken", &ar);
        assert!(spec_fields(&obj).is_err());
    }
}
