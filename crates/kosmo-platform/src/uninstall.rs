//! The platform uninstall pipeline
//!
//! Mirrors the install steps in reverse, best-effort: a failing step is
//! published as a warning and teardown continues, so a half-broken
//! installation can still be removed. Only objects carrying the
//! installed-by label are deleted; anything else is reported and left
//! in place.

use kube::Client;
use tracing::info;

use kosmo_common::eventbus::Bus;
use kosmo_common::events::Event;
use kosmo_common::{dynamic, Result, DEFAULT_NAMESPACE, INSTALLED_BY_SELECTOR};

use crate::{configurations, controllerconfigs, crds, helm, packages, rbac, xrd};

/// Everything the uninstall pipeline needs, injected by the caller
pub struct UninstallOptions {
    /// Cluster connection
    pub client: Client,
    /// Progress event bus
    pub bus: Bus,
    /// Whether to publish debug events
    pub verbose: bool,
    /// Namespace the platform was installed into
    pub namespace: String,
    /// List what would be removed without deleting anything
    pub dry_run: bool,
}

impl UninstallOptions {
    /// Options with production defaults
    pub fn new(client: Client, bus: Bus) -> Self {
        Self {
            client,
            bus,
            verbose: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            dry_run: false,
        }
    }

    fn debug(&self, message: impl Into<String>) {
        if self.verbose {
            self.bus.publish(Event::debug(message));
        }
    }

    fn warn(&self, step: &str, err: &kosmo_common::Error) {
        self.bus
            .publish(Event::warning(format!("{step}: {err}, continuing")));
    }

    fn report(&self, what: &str, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let verb = if self.dry_run { "Would remove" } else { "Removed" };
        self.bus.publish(Event::done(format!(
            "{verb} {} {what}: {}",
            names.len(),
            names.join(", ")
        )));
    }
}

/// Run the full uninstall pipeline
pub async fn uninstall(opts: &UninstallOptions) -> Result<()> {
    info!(namespace = %opts.namespace, dry_run = opts.dry_run, "starting platform uninstall");

    match delete_claims(opts).await {
        Ok(names) => opts.report("module claims", &names),
        Err(err) => opts.warn("module claims", &err),
    }

    match delete_packages(opts).await {
        Ok(names) => opts.report("packages", &names),
        Err(err) => opts.warn("packages", &err),
    }

    match delete_controllerconfigs(opts).await {
        Ok(names) => opts.report("controller configs", &names),
        Err(err) => opts.warn("controller configs", &err),
    }

    match delete_rbac(opts).await {
        Ok(names) => opts.report("role bindings", &names),
        Err(err) => opts.warn("role bindings", &err),
    }

    match uninstall_runtime(opts).await {
        Ok(()) => {}
        Err(err) => opts.warn("runtime", &err),
    }

    match cleanup_crds(opts).await {
        Ok(names) => opts.report("resource definitions", &names),
        Err(err) => opts.warn("resource definitions", &err),
    }

    match delete_namespace(opts).await {
        Ok(()) => {}
        Err(err) => opts.warn("namespace", &err),
    }

    let message = if opts.dry_run {
        "Dry run complete, nothing was deleted"
    } else {
        "Platform removed"
    };
    opts.bus.publish(Event::done(message));
    Ok(())
}

/// Delete module claim instances, found through their XRDs
///
/// The claim kinds are derived from each module XRD's spec rather than
/// discovery, so instances are found even while their package is going
/// away. Unlabelled instances are reported but kept.
async fn delete_claims(opts: &UninstallOptions) -> Result<Vec<String>> {
    opts.bus.publish(Event::start_wait("Removing module claims"));

    let mut deleted = Vec::new();
    let xrds = xrd::list(opts.client.clone()).await?;
    for module_xrd in xrds.iter().filter(|x| xrd::is_module_xrd(x)) {
        let resource = xrd::derived_resource(module_xrd)?;
        opts.debug(format!(
            "inspecting {}.{} instances",
            resource.plural, resource.group
        ));
        let api = kube::Api::all_with(opts.client.clone(), &resource);

        let owned = dynamic::list(&api, Some(INSTALLED_BY_SELECTOR)).await?;
        let all = dynamic::list(&api, None).await?;
        if all.len() > owned.len() {
            opts.bus.publish(Event::warning(format!(
                "{} {} instance(s) not installed by this tool were kept",
                all.len() - owned.len(),
                resource.kind
            )));
        }

        for obj in owned {
            let Some(name) = obj.metadata.name else { continue };
            if !opts.dry_run {
                dynamic::delete(&api, &name).await?;
            }
            deleted.push(format!("{}/{name}", resource.kind));
        }
    }

    opts.bus.publish(Event::stop_wait());
    Ok(deleted)
}

/// Remove installed packages: Providers first, then the module
/// Configurations they served
async fn delete_packages(opts: &UninstallOptions) -> Result<Vec<String>> {
    opts.bus
        .publish(Event::start_wait("Removing provider packages"));
    let mut names: Vec<String> = if opts.dry_run {
        packages::list_installed(opts.client.clone())
            .await?
            .into_iter()
            .filter_map(|obj| obj.metadata.name)
            .collect()
    } else {
        packages::delete_installed(opts.client.clone(), &opts.namespace).await?
    };

    let configurations = if opts.dry_run {
        configurations::list_installed(opts.client.clone())
            .await?
            .into_iter()
            .filter_map(|obj| obj.metadata.name)
            .collect()
    } else {
        configurations::delete_installed(opts.client.clone()).await?
    };
    names.extend(configurations);

    opts.bus.publish(Event::stop_wait());
    Ok(names)
}

async fn delete_controllerconfigs(opts: &UninstallOptions) -> Result<Vec<String>> {
    opts.bus
        .publish(Event::start_wait("Removing controller configs"));
    let names = if opts.dry_run {
        controllerconfigs::list_installed(opts.client.clone()).await?
    } else {
        controllerconfigs::delete_installed(opts.client.clone()).await?
    };
    opts.bus.publish(Event::stop_wait());
    Ok(names)
}

async fn delete_rbac(opts: &UninstallOptions) -> Result<Vec<String>> {
    opts.bus
        .publish(Event::start_wait("Removing provider role bindings"));
    let names = if opts.dry_run {
        rbac::list_installed(opts.client.clone()).await?
    } else {
        rbac::delete_installed(opts.client.clone()).await?
    };
    opts.bus.publish(Event::stop_wait());
    Ok(names)
}

async fn uninstall_runtime(opts: &UninstallOptions) -> Result<()> {
    opts.bus.publish(Event::start_wait("Removing runtime"));
    if !opts.dry_run {
        helm::uninstall_chart(helm::RUNTIME_CHART, &opts.namespace).await?;
    }
    opts.bus.publish(Event::stop_wait());
    let verb = if opts.dry_run {
        "Would remove"
    } else {
        "Removed"
    };
    opts.bus
        .publish(Event::done(format!("{verb} runtime release")));
    Ok(())
}

async fn cleanup_crds(opts: &UninstallOptions) -> Result<Vec<String>> {
    opts.bus
        .publish(Event::start_wait("Cleaning up resource definitions"));
    let names = if opts.dry_run {
        crds::list_platform_crds(opts.client.clone()).await?
    } else {
        crds::cleanup(opts.client.clone()).await?
    };
    opts.bus.publish(Event::stop_wait());
    Ok(names)
}

async fn delete_namespace(opts: &UninstallOptions) -> Result<()> {
    opts.bus.publish(Event::start_wait(format!(
        "Removing namespace '{}'",
        opts.namespace
    )));
    if !opts.dry_run {
        crds::force_delete_namespace(opts.client.clone(), &opts.namespace).await?;
    }
    opts.bus.publish(Event::stop_wait());
    let verb = if opts.dry_run {
        "Would remove"
    } else {
        "Removed"
    };
    opts.bus.publish(Event::done(format!(
        "{verb} namespace '{}'",
        opts.namespace
    )));
    Ok(())
}
