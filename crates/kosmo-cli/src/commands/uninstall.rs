//! `kosmo uninstall` - remove the platform from the current cluster

use std::path::PathBuf;

use clap::Args;

use kosmo_common::eventbus::Bus;
use kosmo_common::DEFAULT_NAMESPACE;
use kosmo_platform::uninstall::{self, UninstallOptions};

use crate::logger::ConsoleRenderer;
use crate::Result;

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Absolute path to the kubeconfig file
    #[arg(short, long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace the platform was installed into
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// List what would be removed without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Dump verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: UninstallArgs) -> Result<()> {
    let client = super::make_client(args.kubeconfig.as_deref()).await?;

    let bus = Bus::new();
    let renderer = ConsoleRenderer::new(args.verbose);
    let _subscriptions = renderer.attach(&bus);

    let opts = UninstallOptions {
        verbose: args.verbose,
        namespace: args.namespace,
        dry_run: args.dry_run,
        ..UninstallOptions::new(client, bus)
    };

    uninstall::uninstall(&opts).await?;
    Ok(())
}
