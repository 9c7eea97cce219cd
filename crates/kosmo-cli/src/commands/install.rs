//! `kosmo install <MODULE>` - install a platform module
//!
//! The module's package manifest comes from the product catalog repo;
//! its claim defaults come from the user's config repo, falling back to
//! the product defaults (which are then pushed to the user repo so the
//! next run finds them there).

use std::path::PathBuf;

use clap::Args;

use kosmo_common::eventbus::Bus;
use kosmo_common::events::Event;
use kosmo_common::DEFAULT_NAMESPACE;
use kosmo_platform::install::{self, InstallOptions};

use crate::logger::ConsoleRenderer;
use crate::prompt::InteractivePrompts;
use crate::store::{self, GitStore};
use crate::Result;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Module to install (e.g. core)
    pub module: String,

    /// Git repository url for pulling and pushing module configuration
    #[arg(short = 'r', long = "repo", env = "KOSMO_GIT_URL")]
    pub git_url: String,

    /// Token for git repository authentication
    #[arg(short = 't', long = "token", env = "KOSMO_GIT_TOKEN")]
    pub git_token: String,

    /// Absolute path to the kubeconfig file
    #[arg(short, long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace the platform is installed into
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Platform selector; i.e. openshift, kubernetes
    #[arg(short, long, default_value = "kubernetes")]
    pub platform: String,

    /// Override claim values (key=value, may repeat)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,

    /// Dump verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: InstallArgs) -> Result<()> {
    let client = super::make_client(args.kubeconfig.as_deref()).await?;

    let bus = Bus::new();
    let renderer = ConsoleRenderer::new(args.verbose);
    let _subscriptions = renderer.attach(&bus);

    let package = pull_module_package(&args.module, &bus, args.verbose)?;
    let defaults = pull_module_defaults(&args, &bus)?;

    let opts = InstallOptions {
        verbose: args.verbose,
        namespace: args.namespace,
        platform: args.platform,
        set_values: args.set_values,
        ..InstallOptions::new(client, bus)
    };

    install::install_module(
        &opts,
        &args.module,
        &package,
        defaults.as_deref(),
        &mut InteractivePrompts,
    )
    .await?;
    Ok(())
}

/// Pull the module's package manifest from the product catalog repo
fn pull_module_package(module: &str, bus: &Bus, verbose: bool) -> Result<String> {
    let product = GitStore::open(&store::module_repo_url(module), None)?;
    let entry = product.get(&store::package_path(module))?;
    if verbose {
        bus.publish(Event::debug(format!(
            "pulled '{}' (rev: {:.8})",
            entry.path, entry.revision
        )));
    }
    Ok(String::from_utf8_lossy(&entry.content).into_owned())
}

/// Pull the module's claim defaults, preferring the user's config repo
fn pull_module_defaults(args: &InstallArgs, bus: &Bus) -> Result<Option<String>> {
    let path = store::defaults_path(&args.module);
    let user_repo = GitStore::open(&args.git_url, Some(&args.git_token))?;

    let entry = match user_repo.get(&path) {
        Ok(entry) => entry,
        Err(err) if err.is_entry_not_found() => {
            // First install of this module: seed the user repo from the
            // product defaults.
            let product = GitStore::open(&store::module_repo_url(&args.module), None)?;
            let entry = product.get(&path)?;
            user_repo.put(&path, &entry.content)?;
            bus.publish(Event::debug(format!(
                "seeded '{path}' into {}",
                args.git_url
            )));
            entry
        }
        Err(err) => return Err(err),
    };

    if args.verbose {
        bus.publish(Event::debug(format!(
            "pulled '{}' (rev: {:.8})",
            entry.path, entry.revision
        )));
    }
    Ok(Some(String::from_utf8_lossy(&entry.content).into_owned()))
}
