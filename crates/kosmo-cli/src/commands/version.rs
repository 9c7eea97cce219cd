//! `kosmo version` - client and cluster version information

use std::path::PathBuf;

use clap::Args;

use crate::Result;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Absolute path to the kubeconfig file
    #[arg(short, long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Print the client version only, without contacting the cluster
    #[arg(long)]
    pub client_only: bool,
}

pub async fn run(args: VersionArgs) -> Result<()> {
    println!("client version: {}", env!("CARGO_PKG_VERSION"));
    if args.client_only {
        return Ok(());
    }

    // Server version is best-effort: the command works offline too.
    match super::make_client(args.kubeconfig.as_deref()).await {
        Ok(client) => match client.apiserver_version().await {
            Ok(info) => println!("server version: {}.{}", info.major, info.minor),
            Err(err) => println!("server version: unavailable ({err})"),
        },
        Err(err) => println!("server version: unavailable ({err})"),
    }
    Ok(())
}
