//! CLI definition and dispatch.

mod run;

use clap::Parser;

/// Azure Container Registry sample.
///
/// Creates a resource group and a container registry, finds a Docker engine
/// (local, or a VM provisioned for the run), pulls `hello-world`, commits it
/// into the registry, pushes and pulls it back, then deletes the resource
/// group.
///
/// Credentials come from CLIENT_ID, CLIENT_SECRET, TENANT_ID and optionally
/// SUBSCRIPTION_ID.
#[derive(Parser, Debug)]
#[command(name = "acr-sample", version, about)]
pub struct Cli {}

/// Run the sample for the parsed command line.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    run::execute(cli).await
}
