//! Module claim-defaults documents
//!
//! `config <module>` assembles a defaults YAML from the module's XRD
//! schema and the operator's answers, then stores it in the user's
//! config repo; later installs read it back as the base value layer.

use serde_json::{json, Map, Value};

use kosmo_common::{Error, Result};

use crate::claims;
use crate::install::ValueSource;
use crate::values::{merge_layers, typed_value};
use crate::xrd::SchemaField;

/// Collect the defaults document values for a module schema
///
/// Schema defaults fill in silently; every required field is put to the
/// operator, with its default offered as the pre-filled answer. This
/// differs from the install flow, where a required field with a default
/// is not asked at all: configuring a module is an explicit review of
/// its required values.
pub fn collect_default_values(
    fields: &[SchemaField],
    answers: &mut dyn ValueSource,
) -> Result<Map<String, Value>> {
    let defaults: Vec<(String, Value)> = fields
        .iter()
        .filter_map(|field| {
            field
                .default
                .as_ref()
                .map(|raw| (field.name.clone(), typed_value(&field.field_type, raw)))
        })
        .collect();

    let mut answered = Vec::new();
    for field in fields.iter().filter(|f| f.required) {
        let answer = match field.field_type.as_str() {
            "boolean" => Value::Bool(answers.boolean(field)?),
            _ => typed_value(&field.field_type, &answers.string(field)?),
        };
        answered.push((field.name.clone(), answer));
    }

    Ok(merge_layers(&[defaults, answered]))
}

/// Render a module defaults document as YAML
///
/// The document is shaped like the module claim (`Core` kind in the
/// modules group) so a stored defaults file reads as the claim it seeds.
pub fn render(module: &str, values: Map<String, Value>) -> Result<String> {
    let gvk = claims::claim_gvk(module);
    let doc = json!({
        "apiVersion": format!("{}/{}", gvk.group, gvk.version),
        "kind": gvk.kind,
        "metadata": { "name": format!("kosmo-module-{module}") },
        "spec": values,
    });
    serde_yaml::to_string(&doc)
        .map_err(|err| Error::serialization_for_kind(gvk.kind, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapAnswers(HashMap<String, Value>);

    impl ValueSource for MapAnswers {
        fn string(&mut self, field: &SchemaField) -> Result<String> {
            self.0
                .get(&field.name)
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| Error::internal(format!("unexpected prompt for '{}'", field.name)))
        }

        fn boolean(&mut self, field: &SchemaField) -> Result<bool> {
            self.0
                .get(&field.name)
                .and_then(Value::as_bool)
                .ok_or_else(|| Error::internal(format!("unexpected prompt for '{}'", field.name)))
        }
    }

    fn field(name: &str, field_type: &str, default: Option<&str>, required: bool) -> SchemaField {
        SchemaField {
            name: name.to_string(),
            description: None,
            field_type: field_type.to_string(),
            default: default.map(String::from),
            required,
        }
    }

    /// Story: required fields are reviewed even when they carry a
    /// default, and the operator's answer wins over the schema default.
    #[test]
    fn story_required_fields_are_reviewed() {
        let fields = vec![
            field("domain", "string", Some("example.com"), true),
            field("ingress.tls", "boolean", Some("true"), false),
        ];
        let mut answers = MapAnswers(HashMap::from([(
            "domain".to_string(),
            serde_json::json!("corp.internal"),
        )]));

        let values = collect_default_values(&fields, &mut answers).unwrap();
        assert_eq!(values["domain"], "corp.internal");
        assert_eq!(values["ingress"]["tls"], serde_json::json!(true));
    }

    #[test]
    fn test_optional_fields_fill_in_silently() {
        // MapAnswers errors on any unexpected prompt.
        let fields = vec![field("replicas", "integer", Some("2"), false)];
        let mut answers = MapAnswers(HashMap::new());

        let values = collect_default_values(&fields, &mut answers).unwrap();
        assert_eq!(values["replicas"], serde_json::json!(2));
    }

    /// Story: the rendered document is the claim shape a later install
    /// reads back through its `/spec` base layer.
    #[test]
    fn story_rendered_document_round_trips_as_base_layer() {
        let mut values = Map::new();
        values.insert("domain".to_string(), serde_json::json!("demo.kosmo.io"));
        values.insert(
            "ingress".to_string(),
            serde_json::json!({"tls": false}),
        );

        let yaml = render("core", values).unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["apiVersion"], "modules.kosmo.io/v1");
        assert_eq!(doc["kind"], "Core");
        assert_eq!(doc["metadata"]["name"], "kosmo-module-core");
        assert_eq!(doc["spec"]["domain"], "demo.kosmo.io");
        assert_eq!(doc["spec"]["ingress"]["tls"], serde_json::json!(false));
    }
}
