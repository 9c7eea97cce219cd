//! Schema-agnostic resource access via server discovery
//!
//! Everything the installer touches (core resources, Crossplane packages,
//! module claims) goes through `Api<DynamicObject>` with discovery-resolved
//! [`ApiResource`]s, so no CRD needs a typed struct. Not-found responses on
//! read and teardown paths are data, not errors; create and apply stamp the
//! installed-by label so teardown can find what we own.

use std::collections::BTreeMap;

use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::discovery::{verbs, Discovery, Scope};
use kube::{Api, Client};
use tracing::debug;

use crate::error::Error;
use crate::{Result, FIELD_MANAGER, INSTALLED_BY_LABEL, INSTALLED_BY_VALUE};

/// A discovery-resolved resource together with its scope
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// The API resource (group, version, kind, plural)
    pub resource: ApiResource,
    /// Whether the resource is namespaced
    pub namespaced: bool,
}

impl ResolvedResource {
    /// Build a dynamic API handle for this resource
    ///
    /// `namespace` is ignored for cluster-scoped resources.
    pub fn api(&self, client: Client, namespace: Option<&str>) -> Api<DynamicObject> {
        match (self.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(client, ns, &self.resource),
            _ => Api::all_with(client, &self.resource),
        }
    }
}

/// Resolve a group/version/kind against live server discovery
///
/// Discovery is run per call on the requested group: callers install CRDs
/// mid-pipeline, so cached mappings would go stale. A kind the server does
/// not know yields [`Error::NoKindMatch`].
pub async fn resolve_gvk(client: &Client, gvk: &GroupVersionKind) -> Result<ResolvedResource> {
    let discovery = Discovery::new(client.clone())
        .filter(&[gvk.group.as_str()])
        .run()
        .await?;

    let (resource, capabilities) = discovery
        .resolve_gvk(gvk)
        .ok_or_else(|| Error::no_kind_match(&gvk.group, &gvk.kind))?;

    Ok(ResolvedResource {
        resource,
        namespaced: capabilities.scope == Scope::Namespaced,
    })
}

/// Resolve a free-form query (kind or plural, any case) across all groups
///
/// Only listable resources are considered. Ambiguity resolves to the first
/// discovery match, which favors the recommended (most stable) version.
pub async fn resolve_query(client: &Client, query: &str) -> Result<ResolvedResource> {
    let discovery = Discovery::new(client.clone()).run().await?;
    let wanted = query.to_lowercase();

    for group in discovery.groups() {
        for (resource, capabilities) in group.recommended_resources() {
            if !capabilities.supports_operation(verbs::LIST) {
                continue;
            }
            if resource.kind.to_lowercase() == wanted || resource.plural.to_lowercase() == wanted {
                return Ok(ResolvedResource {
                    resource,
                    namespaced: capabilities.scope == Scope::Namespaced,
                });
            }
        }
    }

    Err(Error::discovery(format!(
        "no API resource matches query '{query}'"
    )))
}

/// Get an object by name; 404 is `None`
pub async fn get(api: &Api<DynamicObject>, name: &str) -> Result<Option<DynamicObject>> {
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(err) if is_api_error(&err, 404) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// List objects, optionally restricted by a label selector
///
/// A 404 (the kind's CRD vanished between resolve and list) yields the
/// empty vec.
pub async fn list(
    api: &Api<DynamicObject>,
    label_selector: Option<&str>,
) -> Result<Vec<DynamicObject>> {
    let mut params = ListParams::default();
    if let Some(selector) = label_selector {
        params = params.labels(selector);
    }
    match api.list(&params).await {
        Ok(objects) => Ok(objects.items),
        Err(err) if is_api_error(&err, 404) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Keep the items matching the predicate, preserving order
pub fn filter<F>(items: Vec<DynamicObject>, predicate: F) -> Vec<DynamicObject>
where
    F: Fn(&DynamicObject) -> bool,
{
    items.into_iter().filter(|item| predicate(item)).collect()
}

/// Create an object, stamping the installed-by label
///
/// An existing object with the same name (409) counts as success so the
/// pipelines can be re-run.
pub async fn create(api: &Api<DynamicObject>, mut obj: DynamicObject) -> Result<()> {
    stamp_installed_by(&mut obj);
    let params = PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    };
    match api.create(&params, &obj).await {
        Ok(_) => Ok(()),
        Err(err) if is_api_error(&err, 409) => {
            debug!(name = %obj.metadata.name.as_deref().unwrap_or_default(), "already exists, continuing");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Server-side apply an object, stamping the installed-by label
///
/// Conflicts are forced: this tool owns the fields it applies.
pub async fn apply(
    api: &Api<DynamicObject>,
    name: &str,
    mut obj: DynamicObject,
) -> Result<DynamicObject> {
    stamp_installed_by(&mut obj);
    let params = PatchParams::apply(FIELD_MANAGER).force();
    Ok(api.patch(name, &params, &Patch::Apply(&obj)).await?)
}

/// JSON merge-patch an object; 404 is success
///
/// Used to clear finalizers on objects that may already be gone.
pub async fn patch_merge(
    api: &Api<DynamicObject>,
    name: &str,
    patch: &serde_json::Value,
) -> Result<()> {
    match api
        .patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
    {
        Ok(_) => Ok(()),
        Err(err) if is_api_error(&err, 404) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Delete an object by name; 404 is success
pub async fn delete(api: &Api<DynamicObject>, name: &str) -> Result<()> {
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(err) if is_api_error(&err, 404) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Stamp the ownership label on an object's metadata
pub fn stamp_installed_by(obj: &mut DynamicObject) {
    obj.metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(INSTALLED_BY_LABEL.to_string(), INSTALLED_BY_VALUE.to_string());
}

fn is_api_error(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == code)
}
