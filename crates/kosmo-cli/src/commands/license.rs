//! `kosmo license` - license management

use std::path::PathBuf;

use clap::{Args, Subcommand};

use kosmo_common::eventbus::Bus;
use kosmo_common::events::Event;
use kosmo_platform::license;

use crate::logger::ConsoleRenderer;
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct LicenseArgs {
    #[command(subcommand)]
    pub action: LicenseCommands,
}

#[derive(Subcommand, Debug)]
pub enum LicenseCommands {
    /// Activate the platform license for this cluster
    Activate(ActivateArgs),
}

#[derive(Args, Debug)]
pub struct ActivateArgs {
    /// Order number of the license purchase
    pub order_number: String,

    /// Absolute path to the kubeconfig file
    #[arg(short, long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// License verification server URL
    #[arg(short = 'u', long, default_value = license::LICENSE_SERVER_URL, hide = true)]
    pub server_url: String,

    /// Dump verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run(args: LicenseArgs) -> Result<()> {
    match args.action {
        LicenseCommands::Activate(args) => activate(args).await,
    }
}

async fn activate(args: ActivateArgs) -> Result<()> {
    let order_number = args.order_number.trim();
    if order_number.is_empty() {
        return Err(Error::validation("order number must not be empty"));
    }

    let client = super::make_client(args.kubeconfig.as_deref()).await?;

    let bus = Bus::new();
    let renderer = ConsoleRenderer::new(args.verbose);
    let _subscriptions = renderer.attach(&bus);

    bus.publish(Event::start_wait("Computing cluster identifier"));
    let cluster_id = license::cluster_id(client.clone()).await?;
    bus.publish(Event::stop_wait());
    bus.publish(Event::done("Cluster identifier computed"));

    bus.publish(Event::start_wait("Synching license information"));
    let key = license::activate(&args.server_url, order_number, &cluster_id).await?;
    bus.publish(Event::stop_wait());
    bus.publish(Event::done("Synch completed"));

    bus.publish(Event::start_wait("Storing license data"));
    license::store_key(client, &key).await?;
    bus.publish(Event::stop_wait());
    bus.publish(Event::done("License data stored"));

    Ok(())
}
