//! Docker engine access: the Engine API seam, image references, and
//! locating (or provisioning) an engine.

pub mod engine;
pub mod host;
pub mod reference;
pub mod vm;

pub use engine::{
    local_endpoint, BollardEngine, ContainerSummary, DockerEngine, ImageSummary, RegistryAuth,
};
pub use host::{
    provision_docker_vm, wait_for_engine, DockerConnection, DockerConnector, DockerHostKind,
    EngineConnector, ProvisionedHost,
};
pub use reference::ImageReference;
