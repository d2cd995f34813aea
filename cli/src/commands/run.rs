//! Wire up the Azure and Docker clients and run the walkthrough.

use std::sync::Arc;

use acr_sample_core::{log, LogFormat, SampleConfig};
use acr_sample_runtime::{
    ArmClient, AzureResourceManager, ClientSecretCredential, ContainerRegistrySample,
    EngineConnector,
};

use super::Cli;
use crate::output;

pub async fn execute(_cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = SampleConfig::from_env();
    log::init(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Text),
    );
    let config = config?;

    tracing::debug!(
        location = %config.location,
        authority = %config.endpoints.authority_host,
        resource_manager = %config.endpoints.resource_manager,
        "Loaded configuration"
    );

    let credential = Arc::new(ClientSecretCredential::new(
        &config.credentials,
        &config.endpoints,
    ));
    let client = ArmClient::new(
        credential,
        &config.endpoints.resource_manager,
        config.polling.clone(),
    );
    let resources = Arc::new(AzureResourceManager::new(
        client,
        config.credentials.subscription_id.clone(),
    ));
    let connector = Arc::new(EngineConnector::new(
        config.docker.clone(),
        config.vm.clone(),
    ));

    let report = ContainerRegistrySample::new(resources, connector, config)
        .run()
        .await?;

    println!("{}", output::summary_table(&report));
    println!();
    println!("{}", output::images_table(&report.images));
    println!();
    println!("{}", output::containers_table(&report.containers));
    Ok(())
}
