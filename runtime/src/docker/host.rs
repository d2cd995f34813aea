//! Locating a Docker engine for the walkthrough.
//!
//! Order of preference:
//! 1. `DOCKER_HOST`, when configured. Failure to reach it is an error.
//! 2. The platform-default local engine, when it answers a ping.
//! 3. A Linux VM provisioned in the sample's resource group, with Docker
//!    installed by a CustomScript extension and exposed over TCP.

use std::time::Duration;

use acr_sample_core::error::{Result, SampleError};
use acr_sample_core::{DockerConfig, NameGenerator, VmConfig};
use async_trait::async_trait;

use super::engine::{BollardEngine, DockerEngine};
use super::vm;
use crate::azure::{ResourceId, ResourceManager};

/// Seconds between readiness pings while a VM engine starts.
const READY_POLL_INTERVAL_SECS: u64 = 10;

/// Request timeout for Engine API calls, in seconds.
const ENGINE_TIMEOUT_SECS: u64 = 120;

/// Upper bound on a single readiness ping, in seconds.
const PING_TIMEOUT_SECS: u64 = 10;

/// Where the engine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerHostKind {
    /// The engine on this machine (or `DOCKER_HOST`).
    Local,
    /// An engine on a VM created for this run.
    VirtualMachine {
        name: String,
        public_ip: String,
        fqdn: Option<String>,
    },
}

impl std::fmt::Display for DockerHostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerHostKind::Local => write!(f, "local"),
            DockerHostKind::VirtualMachine { name, public_ip, .. } => {
                write!(f, "vm {} ({})", name, public_ip)
            }
        }
    }
}

/// A reachable engine and where it lives.
pub struct DockerConnection {
    pub engine: Box<dyn DockerEngine>,
    pub host: DockerHostKind,
}

impl std::fmt::Debug for DockerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerConnection")
            .field("endpoint", &self.engine.endpoint())
            .field("host", &self.host)
            .finish()
    }
}

/// Produces a Docker engine for the walkthrough.
///
/// Any cloud resources the connector creates go into `group`, so deleting
/// the group releases them.
#[async_trait]
pub trait DockerConnector: Send + Sync {
    async fn connect(
        &self,
        resources: &dyn ResourceManager,
        group: &ResourceId,
        location: &str,
        names: &mut NameGenerator,
    ) -> Result<DockerConnection>;
}

/// Connector that prefers a local engine and falls back to a VM.
pub struct EngineConnector {
    docker: DockerConfig,
    vm: VmConfig,
}

impl EngineConnector {
    pub fn new(docker: DockerConfig, vm: VmConfig) -> Self {
        Self { docker, vm }
    }

    async fn connect_local(&self) -> Option<BollardEngine> {
        let engine = match BollardEngine::connect_local() {
            Ok(engine) => engine,
            Err(e) => {
                tracing::info!(error = %e, "No local Docker engine configured");
                return None;
            }
        };
        match engine.ping().await {
            Ok(()) => Some(engine),
            Err(e) => {
                tracing::info!(
                    endpoint = engine.endpoint(),
                    error = %e,
                    "Local Docker engine did not answer"
                );
                None
            }
        }
    }
}

#[async_trait]
impl DockerConnector for EngineConnector {
    async fn connect(
        &self,
        resources: &dyn ResourceManager,
        group: &ResourceId,
        location: &str,
        names: &mut NameGenerator,
    ) -> Result<DockerConnection> {
        if let Some(address) = &self.docker.host {
            let engine = BollardEngine::connect(address, ENGINE_TIMEOUT_SECS)?;
            engine.ping().await?;
            tracing::info!(endpoint = address.as_str(), "Using Docker engine from DOCKER_HOST");
            return Ok(DockerConnection {
                engine: Box::new(engine),
                host: DockerHostKind::Local,
            });
        }

        if let Some(engine) = self.connect_local().await {
            tracing::info!(endpoint = engine.endpoint(), "Using local Docker engine");
            return Ok(DockerConnection {
                engine: Box::new(engine),
                host: DockerHostKind::Local,
            });
        }

        tracing::info!("Creating a Linux VM to host the Docker engine");
        let host =
            provision_docker_vm(resources, group, location, names, self.docker.daemon_port, &self.vm)
                .await?;

        let address = format!("tcp://{}:{}", host.public_ip, self.docker.daemon_port);
        let engine = BollardEngine::connect(&address, ENGINE_TIMEOUT_SECS)?;
        wait_for_engine(
            &engine,
            Duration::from_secs(self.docker.ready_timeout_secs),
            Duration::from_secs(READY_POLL_INTERVAL_SECS),
        )
        .await?;

        Ok(DockerConnection {
            engine: Box::new(engine),
            host: DockerHostKind::VirtualMachine {
                name: host.name,
                public_ip: host.public_ip,
                fqdn: host.fqdn,
            },
        })
    }
}

/// A VM provisioned to run Docker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedHost {
    pub name: String,
    pub public_ip: String,
    pub fqdn: Option<String>,
}

/// Create the network, the VM and the Docker extension in `group`.
pub async fn provision_docker_vm(
    resources: &dyn ResourceManager,
    group: &ResourceId,
    location: &str,
    names: &mut NameGenerator,
    docker_port: u16,
    config: &VmConfig,
) -> Result<ProvisionedHost> {
    let pip_name = names.create("pip");
    let nsg_name = names.create("nsg");
    let vnet_name = names.create("vnet");
    let nic_name = names.create("nic");
    let vm_name = names.create("dockervm");

    let pip = resources
        .create_public_ip(group, &pip_name, &vm::public_ip_request(location, &pip_name))
        .await?;
    let public_ip = pip.properties.ip_address.clone().ok_or_else(|| {
        SampleError::Other(format!("Public IP {} has no address assigned", pip_name))
    })?;
    let fqdn = pip.properties.dns_settings.and_then(|d| d.fqdn);
    tracing::info!(name = %pip_name, ip = %public_ip, "Created public IP");

    let nsg = resources
        .create_network_security_group(
            group,
            &nsg_name,
            &vm::network_security_group_request(location, docker_port),
        )
        .await?;
    tracing::info!(name = %nsg_name, "Created network security group");

    let vnet = resources
        .create_virtual_network(group, &vnet_name, &vm::virtual_network_request(location))
        .await?;
    let subnet_id = match vnet.properties.subnets.first() {
        Some(subnet) if !subnet.id.is_empty() => subnet.id.clone(),
        Some(subnet) => ResourceId::parse(&vnet.id)?
            .child("subnets", &subnet.name)
            .to_string(),
        None => {
            return Err(SampleError::Other(format!(
                "Virtual network {} has no subnets",
                vnet_name
            )))
        }
    };
    tracing::info!(name = %vnet_name, subnet = %subnet_id, "Created virtual network");

    let nic = resources
        .create_network_interface(
            group,
            &nic_name,
            &vm::network_interface_request(location, &subnet_id, &pip.id, &nsg.id),
        )
        .await?;
    tracing::info!(name = %nic_name, "Created network interface");

    let machine = resources
        .create_virtual_machine(
            group,
            &vm_name,
            &vm::virtual_machine_request(location, &vm_name, &nic.id, config),
        )
        .await?;
    tracing::info!(name = %vm_name, size = %config.size, "Created virtual machine");

    resources
        .create_vm_extension(
            &ResourceId::parse(&machine.id)?,
            vm::DOCKER_EXTENSION_NAME,
            &vm::docker_extension_request(location, docker_port),
        )
        .await?;
    tracing::info!(vm = %vm_name, port = docker_port, "Installed Docker engine");

    Ok(ProvisionedHost {
        name: vm_name,
        public_ip,
        fqdn,
    })
}

/// Ping `engine` until it answers or `timeout` passes.
pub async fn wait_for_engine(
    engine: &dyn DockerEngine,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let bound = remaining.min(Duration::from_secs(PING_TIMEOUT_SECS));
        let outcome = match tokio::time::timeout(bound, engine.ping()).await {
            Ok(result) => result,
            Err(_) => Err(SampleError::DockerError {
                endpoint: engine.endpoint().to_string(),
                message: format!("ping not answered within {}ms", bound.as_millis()),
            }),
        };
        match outcome {
            Ok(()) => {
                tracing::info!(endpoint = engine.endpoint(), attempts, "Docker engine is ready");
                return Ok(());
            }
            Err(e) => {
                if tokio::time::Instant::now() + interval > deadline {
                    return Err(SampleError::TimeoutError(format!(
                        "Docker engine at {} not ready after {} attempts: {}",
                        engine.endpoint(),
                        attempts,
                        e
                    )));
                }
                tracing::debug!(endpoint = engine.endpoint(), error = %e, "Waiting for Docker engine");
                tokio::time::sleep(interval).await;
            }
        }
    }
}
