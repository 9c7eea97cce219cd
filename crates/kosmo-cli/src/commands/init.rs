//! `kosmo init` - bootstrap the platform on the current cluster

use std::path::PathBuf;

use clap::Args;

use kosmo_common::eventbus::Bus;
use kosmo_common::DEFAULT_NAMESPACE;
use kosmo_platform::controllerconfigs::ProxySettings;
use kosmo_platform::install::{self, InstallOptions};

use crate::logger::ConsoleRenderer;
use crate::prompt::InteractivePrompts;
use crate::Result;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Absolute path to the kubeconfig file
    #[arg(short, long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace to install the platform into
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Platform selector; i.e. openshift, kubernetes
    #[arg(short, long, default_value = "kubernetes")]
    pub platform: String,

    /// Use the specified HTTP proxy
    #[arg(long, env = "HTTP_PROXY")]
    pub http_proxy: Option<String>,

    /// Use the specified HTTPS proxy
    #[arg(long, env = "HTTPS_PROXY")]
    pub https_proxy: Option<String>,

    /// Comma-separated hosts and domains which do not use the proxy
    #[arg(long, env = "NO_PROXY")]
    pub no_proxy: Option<String>,

    /// Override claim values (key=value, may repeat)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,

    /// Skip the runtime chart (a Crossplane install is already in place)
    #[arg(long)]
    pub skip_runtime: bool,

    /// Dump verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: InitArgs) -> Result<()> {
    let client = super::make_client(args.kubeconfig.as_deref()).await?;

    let bus = Bus::new();
    let renderer = ConsoleRenderer::new(args.verbose);
    let _subscriptions = renderer.attach(&bus);

    let opts = InstallOptions {
        verbose: args.verbose,
        namespace: args.namespace,
        platform: args.platform,
        proxy: ProxySettings {
            http_proxy: args.http_proxy,
            https_proxy: args.https_proxy,
            no_proxy: args.no_proxy,
        },
        set_values: args.set_values,
        skip_runtime: args.skip_runtime,
        ..InstallOptions::new(client, bus)
    };

    install::install(&opts, &mut InteractivePrompts).await?;
    Ok(())
}
