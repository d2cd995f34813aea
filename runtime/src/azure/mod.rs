//! Azure Resource Manager access.
//!
//! - [`credential`]: service principal token acquisition
//! - [`client`]: authenticated REST client with long-running operation waits
//! - [`lro`]: polling strategy rules
//! - [`models`]: wire models
//! - [`resource_id`]: resource identifier parsing
//! - [`resources`]: the [`ResourceManager`] seam and its Azure implementation

pub mod client;
pub mod credential;
pub mod lro;
pub mod models;
pub mod resource_id;
pub mod resources;

pub use client::ArmClient;
pub use credential::{ClientSecretCredential, TokenCredential};
pub use resource_id::ResourceId;
pub use resources::{AzureResourceManager, ResourceManager};
