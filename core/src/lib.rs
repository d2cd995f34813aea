//! ACR Sample Core - Configuration, Errors and Naming
//!
//! This module provides the foundational types shared by the runtime and
//! the CLI of the Azure Container Registry sample.

pub mod config;
pub mod error;
pub mod log;
pub mod naming;

// Re-export commonly used types
pub use config::{
    CredentialConfig, DockerConfig, EndpointConfig, PollingConfig, RegistryConfig, SampleConfig,
    VmConfig,
};
pub use error::{Result, SampleError};
pub use log::LogFormat;
pub use naming::NameGenerator;

/// ACR sample version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
