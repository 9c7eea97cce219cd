//! `kosmo config <MODULE>` - assemble and store module configuration
//!
//! Pulls the module's XRD definition from the product repo, walks the
//! operator through its required values, and pushes the assembled
//! defaults document to the user's config repo, where a later
//! `install <MODULE>` picks it up as the base value layer.

use clap::Args;
use kube::core::DynamicObject;

use kosmo_common::eventbus::Bus;
use kosmo_common::events::Event;
use kosmo_platform::{defaults, xrd};

use crate::logger::ConsoleRenderer;
use crate::prompt::InteractivePrompts;
use crate::store::{self, GitStore};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Module to configure (e.g. core)
    pub module: String,

    /// Git repository url for pushing module configuration
    #[arg(short = 'r', long = "repo", env = "KOSMO_GIT_URL")]
    pub git_url: String,

    /// Token for git repository authentication
    #[arg(short = 't', long = "token", env = "KOSMO_GIT_TOKEN")]
    pub git_token: String,

    /// Dump verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: ConfigArgs) -> Result<()> {
    let bus = Bus::new();
    let renderer = ConsoleRenderer::new(args.verbose);
    let _subscriptions = renderer.attach(&bus);

    bus.publish(Event::start_wait(format!(
        "Fetching definition of module '{}'",
        args.module
    )));
    let fields = pull_module_fields(&args.module)?;
    bus.publish(Event::stop_wait());
    bus.publish(Event::done(format!(
        "Definition of module '{}' fetched",
        args.module
    )));

    let values = defaults::collect_default_values(&fields, &mut InteractivePrompts)
        .map_err(Error::Platform)?;
    let document = defaults::render(&args.module, values).map_err(Error::Platform)?;

    bus.publish(Event::start_wait(format!(
        "Pushing module '{}' configuration to '{}'",
        args.module, args.git_url
    )));
    let user_repo = GitStore::open(&args.git_url, Some(&args.git_token))?;
    user_repo.put(&store::defaults_path(&args.module), document.as_bytes())?;
    bus.publish(Event::stop_wait());
    bus.publish(Event::done(format!(
        "Module '{}' configuration pushed to '{}'",
        args.module, args.git_url
    )));

    Ok(())
}

/// Pull and flatten the module's XRD definition from the product repo
fn pull_module_fields(module: &str) -> Result<Vec<xrd::SchemaField>> {
    let product = GitStore::open(&store::module_repo_url(module), None)?;
    let entry = product.get(store::definition_path())?;

    let value: serde_json::Value = serde_yaml::from_slice(&entry.content)?;
    let definition: DynamicObject = serde_json::from_value(value)?;
    xrd::spec_fields(&definition).map_err(Error::Platform)
}
