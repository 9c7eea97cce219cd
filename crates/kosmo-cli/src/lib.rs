//! kosmo CLI library

pub mod commands;
pub mod error;
pub mod logger;
pub mod prompt;
pub mod store;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// kosmo - bootstrap a Crossplane-based platform
#[derive(Parser, Debug)]
#[command(name = "kosmo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the platform on the current cluster
    Init(commands::init::InitArgs),
    /// Install a platform module
    Install(commands::install::InstallArgs),
    /// Assemble and store a module's configuration
    Config(commands::config::ConfigArgs),
    /// Remove the platform from the current cluster
    Uninstall(commands::uninstall::UninstallArgs),
    /// Manage the platform license
    License(commands::license::LicenseArgs),
    /// Print client and cluster version information
    Version(commands::version::VersionArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init(args) => commands::init::run(args).await,
            Commands::Install(args) => commands::install::run(args).await,
            Commands::Config(args) => commands::config::run(args).await,
            Commands::Uninstall(args) => commands::uninstall::run(args).await,
            Commands::License(args) => commands::license::run(args).await,
            Commands::Version(args) => commands::version::run(args).await,
        }
    }
}
