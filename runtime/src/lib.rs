//! ACR Sample Runtime - Azure Resource Manager access, Docker engine access
//! and the container registry walkthrough.

#![allow(clippy::result_large_err)]

pub mod azure;
pub mod docker;
pub mod sample;

#[cfg(test)]
mod testing;

// Re-export common types
pub use azure::{
    ArmClient, AzureResourceManager, ClientSecretCredential, ResourceId, ResourceManager,
    TokenCredential,
};
pub use docker::{
    BollardEngine, ContainerSummary, DockerConnection, DockerConnector, DockerEngine,
    DockerHostKind, EngineConnector, ImageReference, ImageSummary, RegistryAuth,
};
pub use sample::{CleanupOutcome, ContainerRegistrySample, SampleReport};

/// ACR sample runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
