//! CLI subcommands

pub mod config;
pub mod init;
pub mod install;
pub mod license;
pub mod uninstall;
pub mod version;

use std::path::Path;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::{Error, Result};

/// Build a cluster client from an explicit kubeconfig path or the
/// ambient configuration (in-cluster or `~/.kube/config`)
pub async fn make_client(kubeconfig: Option<&Path>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            let parsed = Kubeconfig::read_from(path)
                .map_err(|err| Error::config(format!("kubeconfig {}: {err}", path.display())))?;
            let config = Config::from_custom_kubeconfig(parsed, &KubeConfigOptions::default())
                .await
                .map_err(|err| Error::config(format!("kubeconfig {}: {err}", path.display())))?;
            Client::try_from(config).map_err(|err| Error::Platform(err.into()))
        }
        None => Client::try_default()
            .await
            .map_err(|err| Error::Platform(err.into())),
    }
}
