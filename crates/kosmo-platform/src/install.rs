//! The platform install pipeline
//!
//! Bootstraps the Crossplane runtime, the provider packages, RBAC, the
//! core module package and finally the core module claim, reporting
//! progress on the event bus. Every step is idempotent so a failed run
//! can simply be repeated.

use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::{json, Map, Value};
use tracing::info;

use kosmo_common::eventbus::Bus;
use kosmo_common::events::Event;
use kosmo_common::{dynamic, Error, Result, DEFAULT_NAMESPACE};

use crate::configurations::{self, CORE_MODULE_IMAGE, CORE_MODULE_NAME, HEALTHY_TIMEOUT};
use crate::controllerconfigs::{ProxySettings, PACKAGES_GROUP};
use crate::values::{flatten_pairs, merge_layers, parse_set_flag, typed_value};
use crate::xrd::{self, SchemaField, CORE_MODULE_XRD};
use crate::{catalog, claims, helm, packages, pods};

/// Pod selector of the runtime deployment
pub const RUNTIME_POD_SELECTOR: &str = "app=crossplane";

/// How long the runtime pod may take to become Ready
pub const RUNTIME_READY_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_secs(300);

/// Source of claim values the schema cannot provide
///
/// Required fields without defaults need an answer from somewhere: the
/// CLI asks the operator interactively, tests supply a map.
pub trait ValueSource {
    /// Answer a free-form field
    fn string(&mut self, field: &SchemaField) -> Result<String>;
    /// Answer a boolean field
    fn boolean(&mut self, field: &SchemaField) -> Result<bool>;
}

/// Everything the install pipeline needs, injected by the caller
pub struct InstallOptions {
    /// Cluster connection
    pub client: Client,
    /// Progress event bus
    pub bus: Bus,
    /// Whether to publish debug events
    pub verbose: bool,
    /// Namespace to install into
    pub namespace: String,
    /// Platform selector (`kubernetes` or `openshift`)
    pub platform: String,
    /// Proxy settings forwarded to runtime and package controllers
    pub proxy: ProxySettings,
    /// Raw `--set` override flags
    pub set_values: Vec<String>,
    /// Chart repository index for the runtime
    pub chart_index_url: String,
    /// Package catalog index
    pub catalog_url: String,
    /// Skip the runtime chart (a pre-provisioned Crossplane is in place)
    pub skip_runtime: bool,
}

impl InstallOptions {
    /// Options with production defaults
    pub fn new(client: Client, bus: Bus) -> Self {
        Self {
            client,
            bus,
            verbose: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            platform: "kubernetes".to_string(),
            proxy: ProxySettings::default(),
            set_values: Vec::new(),
            chart_index_url: helm::CHART_INDEX_URL.to_string(),
            catalog_url: catalog::CATALOG_INDEX_URL.to_string(),
            skip_runtime: false,
        }
    }

    fn debug(&self, message: impl Into<String>) {
        if self.verbose {
            self.bus.publish(Event::debug(message));
        }
    }
}

/// Run the full install pipeline
pub async fn install(opts: &InstallOptions, answers: &mut dyn ValueSource) -> Result<()> {
    info!(namespace = %opts.namespace, platform = %opts.platform, "starting platform install");

    ensure_namespace(opts).await?;
    if opts.skip_runtime {
        opts.debug("runtime install skipped by request");
    } else {
        install_runtime(opts).await?;
    }
    install_packages(opts).await?;
    create_rbac(opts).await?;
    install_core_module(opts).await?;
    let values = collect_core_claim_values(opts, answers).await?;
    apply_claim(opts, values).await?;

    Ok(())
}

async fn ensure_namespace(opts: &InstallOptions) -> Result<()> {
    opts.bus
        .publish(Event::start_wait(format!("Preparing namespace '{}'", opts.namespace)));

    let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Namespace"));
    let api = kube::Api::<DynamicObject>::all_with(opts.client.clone(), &resource);
    dynamic::create(&api, DynamicObject::new(&opts.namespace, &resource)).await?;

    opts.bus.publish(Event::stop_wait());
    opts.bus
        .publish(Event::done(format!("Namespace '{}' ready", opts.namespace)));
    Ok(())
}

async fn install_runtime(opts: &InstallOptions) -> Result<()> {
    if pods::any_exists(opts.client.clone(), &opts.namespace, RUNTIME_POD_SELECTOR).await? {
        opts.bus
            .publish(Event::done("Runtime already installed".to_string()));
        return Ok(());
    }

    opts.bus.publish(Event::start_wait("Resolving runtime chart"));
    let index = helm::fetch_index(&opts.chart_index_url).await?;
    let release = helm::latest_release(&index, helm::RUNTIME_CHART)?;
    opts.debug(format!(
        "runtime chart {} {} at {}",
        helm::RUNTIME_CHART,
        release.version,
        release.url
    ));
    opts.bus.publish(Event::stop_wait());

    opts.bus.publish(Event::start_wait(format!(
        "Installing runtime {}",
        release.version
    )));
    helm::install_chart(
        helm::RUNTIME_CHART,
        &release.url,
        &opts.namespace,
        &runtime_chart_values(&opts.proxy),
    )
    .await?;
    pods::wait_until_ready(
        opts.client.clone(),
        &opts.namespace,
        RUNTIME_POD_SELECTOR,
        RUNTIME_READY_TIMEOUT,
        "runtime pod to become Ready",
    )
    .await?;
    opts.bus.publish(Event::stop_wait());
    opts.bus
        .publish(Event::done(format!("Runtime {} installed", release.version)));
    Ok(())
}

/// Chart value flags forwarding the proxies to the runtime containers
fn runtime_chart_values(proxy: &ProxySettings) -> Vec<(String, String)> {
    proxy
        .env_entries()
        .iter()
        .enumerate()
        .flat_map(|(i, entry)| {
            vec![
                (
                    format!("extraEnvVarsCrossplane[{i}].name"),
                    entry["name"].as_str().unwrap_or_default().to_string(),
                ),
                (
                    format!("extraEnvVarsCrossplane[{i}].value"),
                    entry["value"].as_str().unwrap_or_default().to_string(),
                ),
            ]
        })
        .collect()
}

async fn install_packages(opts: &InstallOptions) -> Result<()> {
    opts.bus.publish(Event::start_wait("Fetching package catalog"));
    let all = catalog::fetch(&opts.catalog_url).await?;
    let selected = catalog::for_cli(all);
    opts.bus.publish(Event::stop_wait());
    opts.debug(format!("{} packages selected for install", selected.len()));

    for pkg in &selected {
        opts.bus
            .publish(Event::start_wait(format!("Installing package '{}'", pkg.slug())));
        packages::install(opts.client.clone(), pkg, &opts.proxy, &opts.namespace).await?;
        opts.bus.publish(Event::stop_wait());
        opts.bus
            .publish(Event::done(format!("Package '{}' installed", pkg.slug())));
    }
    Ok(())
}

async fn create_rbac(opts: &InstallOptions) -> Result<()> {
    opts.bus
        .publish(Event::start_wait("Binding provider service accounts"));
    let created = crate::rbac::create_for_providers(opts.client.clone(), &opts.namespace).await?;
    opts.bus.publish(Event::stop_wait());
    for name in &created {
        opts.debug(format!("created binding '{name}'"));
    }
    opts.bus.publish(Event::done(format!(
        "Provider access configured ({} bindings)",
        created.len()
    )));
    Ok(())
}

async fn install_core_module(opts: &InstallOptions) -> Result<()> {
    opts.bus.publish(Event::start_wait("Installing core module"));
    configurations::install(
        opts.client.clone(),
        CORE_MODULE_NAME,
        CORE_MODULE_IMAGE,
        "latest",
    )
    .await?;
    configurations::wait_until_healthy_and_installed(
        opts.client.clone(),
        CORE_MODULE_NAME,
        HEALTHY_TIMEOUT,
    )
    .await?;
    opts.bus.publish(Event::stop_wait());
    opts.bus.publish(Event::done("Core module installed"));
    Ok(())
}

async fn collect_core_claim_values(
    opts: &InstallOptions,
    answers: &mut dyn ValueSource,
) -> Result<Map<String, Value>> {
    let xrd = xrd::get(opts.client.clone(), CORE_MODULE_XRD)
        .await?
        .ok_or_else(|| {
            Error::internal_with_context("install", format!("XRD '{CORE_MODULE_XRD}' not found"))
        })?;
    let fields = xrd::spec_fields(&xrd)?;

    let seeds = vec![
        ("namespace".to_string(), json!(opts.namespace)),
        ("platform".to_string(), json!(opts.platform)),
    ];
    collect_claim_values(&fields, Vec::new(), seeds, &opts.set_values, answers)
}

/// Assemble claim values: base, schema defaults, seeds and prompts,
/// then `--set` overrides (last wins)
pub fn collect_claim_values(
    fields: &[SchemaField],
    base: Vec<(String, Value)>,
    seeds: Vec<(String, Value)>,
    set_values: &[String],
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

    let mut prompted = seeds.clone();
    for field in fields.iter().filter(|f| f.needs_prompt()) {
        if seeds.iter().any(|(name, _)| name == &field.name) {
            continue;
        }
        let answer = match field.field_type.as_str() {
            "boolean" => Value::Bool(answers.boolean(field)?),
            _ => typed_value(&field.field_type, &answers.string(field)?),
        };
        prompted.push((field.name.clone(), answer));
    }

    let mut overrides = Vec::new();
    for flag in set_values {
        overrides.extend(parse_set_flag(flag)?);
    }

    Ok(merge_layers(&[base, defaults, prompted, overrides]))
}

async fn apply_claim(opts: &InstallOptions, values: Map<String, Value>) -> Result<()> {
    opts.bus.publish(Event::start_wait("Applying core module claim"));
    let domain = values
        .get("domain")
        .and_then(Value::as_str)
        .map(String::from);

    claims::apply(opts.client.clone(), "core", &opts.namespace, values).await?;
    claims::wait_until_ready(
        opts.client.clone(),
        "core",
        &opts.namespace,
        claims::READY_TIMEOUT,
    )
    .await?;
    opts.bus.publish(Event::stop_wait());

    match domain {
        Some(domain) => opts.bus.publish(Event::done(format!(
            "Platform ready at https://app.{domain}"
        ))),
        None => opts.bus.publish(Event::done("Platform ready")),
    }
    Ok(())
}

/// Install a single module from pre-fetched package and defaults
///
/// Used by `install <module>`: the package manifest comes from the
/// product catalog repo, the claim defaults from the user's config repo.
pub async fn install_module(
    opts: &InstallOptions,
    module: &str,
    package_manifest: &str,
    claim_defaults: Option<&str>,
    answers: &mut dyn ValueSource,
) -> Result<()> {
    opts.bus
        .publish(Event::start_wait(format!("Installing module '{module}'")));

    let value: Value = serde_yaml::from_str(package_manifest)
        .map_err(|err| Error::invalid_package(module, format!("package is not YAML: {err}")))?;
    let obj: DynamicObject = serde_json::from_value(value)
        .map_err(|err| Error::invalid_package(module, format!("package decode: {err}")))?;
    let types = obj
        .types
        .clone()
        .ok_or_else(|| Error::invalid_package(module, "package has no apiVersion/kind"))?;
    let (group, version) = types
        .api_version
        .split_once('/')
        .ok_or_else(|| Error::invalid_package(module, "apiVersion has no group"))?;
    if group != PACKAGES_GROUP {
        return Err(Error::invalid_package(
            module,
            format!("unexpected API group '{group}', want '{PACKAGES_GROUP}'"),
        ));
    }
    let name = obj
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::invalid_package(module, "package has no name"))?;

    let gvk = GroupVersionKind::gvk(group, version, &types.kind);
    let resolved = dynamic::resolve_gvk(&opts.client, &gvk).await?;
    let api = resolved.api(opts.client.clone(), None);
    dynamic::apply(&api, &name, obj).await?;

    // Package names follow the `<name>-configuration` convention.
    let package = name.strip_suffix("-configuration").unwrap_or(&name);
    configurations::wait_until_healthy_and_installed(opts.client.clone(), package, HEALTHY_TIMEOUT)
        .await?;
    opts.bus.publish(Event::stop_wait());
    opts.bus
        .publish(Event::done(format!("Module package '{module}' installed")));

    let xrd_name = format!("{module}.{}", kosmo_common::MODULES_GROUP_SUFFIX);
    let xrd = xrd::get(opts.client.clone(), &xrd_name)
        .await?
        .ok_or_else(|| {
            Error::internal_with_context("install", format!("XRD '{xrd_name}' not found"))
        })?;
    let fields = xrd::spec_fields(&xrd)?;

    let base = match claim_defaults {
        Some(yaml) => defaults_to_pairs(module, yaml)?,
        None => Vec::new(),
    };
    let seeds = vec![
        ("namespace".to_string(), json!(opts.namespace)),
        ("platform".to_string(), json!(opts.platform)),
    ];
    let values = collect_claim_values(&fields, base, seeds, &opts.set_values, answers)?;

    opts.bus
        .publish(Event::start_wait(format!("Applying '{module}' claim")));
    claims::apply(opts.client.clone(), module, &opts.namespace, values).await?;
    claims::wait_until_ready(
        opts.client.clone(),
        module,
        &opts.namespace,
        claims::READY_TIMEOUT,
    )
    .await?;
    opts.bus.publish(Event::stop_wait());
    opts.bus
        .publish(Event::done(format!("Module '{module}' ready")));
    Ok(())
}

/// Flatten the spec of a stored claim-defaults document into value pairs
fn defaults_to_pairs(module: &str, yaml: &str) -> Result<Vec<(String, Value)>> {
    let doc: Value = serde_yaml::from_str(yaml).map_err(|err| {
        Error::serialization_for_kind("claim defaults", format!("module '{module}': {err}"))
    })?;
    let spec = doc
        .pointer("/spec")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Ok(flatten_pairs(&spec))
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

    /// Story: defaults fill in silently, seeded fields are never asked,
    /// required fields without defaults are asked, and --set wins over
    /// everything.
    #[test]
    fn story_value_layering_end_to_end() {
        let fields = vec![
            field("domain", "string", None, true),
            field("namespace", "string", None, true),
            field("ingress.tls", "boolean", Some("true"), false),
            field("replicas", "integer", Some("1"), true),
        ];
        let mut answers = MapAnswers(HashMap::from([(
            "domain".to_string(),
            json!("corp.internal"),
        )]));
        let seeds = vec![("namespace".to_string(), json!("kosmo-system"))];
        let set_values = vec!["replicas=3".to_string()];

        let merged =
            collect_claim_values(&fields, Vec::new(), seeds, &set_values, &mut answers).unwrap();

        assert_eq!(merged["domain"], "corp.internal");
        assert_eq!(merged["namespace"], "kosmo-system");
        assert_eq!(merged["ingress"]["tls"], json!(true));
        assert_eq!(merged["replicas"], json!(3));
    }

    /// Story: a boolean prompt produces a real boolean in the claim.
    #[test]
    fn story_boolean_prompts_stay_typed() {
        let fields = vec![field("debug", "boolean", None, true)];
        let mut answers = MapAnswers(HashMap::from([("debug".to_string(), json!(false))]));

        let merged =
            collect_claim_values(&fields, Vec::new(), Vec::new(), &[], &mut answers).unwrap();
        assert_eq!(merged["debug"], json!(false));
    }

    #[test]
    fn test_optional_fields_are_not_prompted() {
        // MapAnswers errors on any unexpected prompt, so this passing
        // means nothing optional was asked.
        let fields = vec![
            field("extra", "string", None, false),
            field("replicas", "integer", Some("2"), true),
        ];
        let mut answers = MapAnswers(HashMap::new());

        let merged =
            collect_claim_values(&fields, Vec::new(), Vec::new(), &[], &mut answers).unwrap();
        assert_eq!(merged["replicas"], json!(2));
        assert!(!merged.contains_key("extra"));
    }

    #[test]
    fn test_defaults_yaml_becomes_base_layer() {
        let yaml = "apiVersion: modules.kosmo.io/v1\nkind: Core\nspec:\n  domain: stored.example\n  ingress:\n    tls: false\n";
        let pairs = defaults_to_pairs("core", yaml).unwrap();
        let merged = merge_layers(&[pairs]);
        assert_eq!(merged["domain"], "stored.example");
        assert_eq!(merged["ingress"]["tls"], json!(false));
    }

    #[test]
    fn test_runtime_chart_values_index_env_entries() {
        let proxy = ProxySettings {
            http_proxy: Some("http://proxy:3128".to_string()),
            https_proxy: None,
            no_proxy: Some("10.0.0.0/8".to_string()),
        };
        let values = runtime_chart_values(&proxy);
        assert_eq!(
            values[0],
            (
                "extraEnvVarsCrossplane[0].name".to_string(),
                "HTTP_PROXY".to_string()
            )
        );
        assert_eq!(
            values[3],
            (
                "extraEnvVarsCrossplane[1].value".to_string(),
                "10.0.0.0/8".to_string()
            )
        );
        assert!(runtime_chart_values(&ProxySettings::default()).is_empty());
    }
}
