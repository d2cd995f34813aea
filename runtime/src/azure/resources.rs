//! Resource operations the sample performs against Azure.
//!
//! [`ResourceManager`] is the seam the walkthrough drives; the production
//! implementation is [`AzureResourceManager`] over [`ArmClient`].

use acr_sample_core::error::{Result, SampleError};
use async_trait::async_trait;

use super::client::ArmClient;
use super::models::{
    NetworkInterface, NetworkSecurityGroup, PublicIpAddress, Registry, RegistryCredentials,
    ResourceGroup, Subscription, VirtualMachine, VirtualMachineExtension, VirtualNetwork,
};
use super::resource_id::ResourceId;

/// API version for Microsoft.Resources/subscriptions.
pub const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";

/// API version for resource groups.
pub const RESOURCES_API_VERSION: &str = "2021-04-01";

/// API version for Microsoft.ContainerRegistry.
pub const CONTAINER_REGISTRY_API_VERSION: &str = "2023-07-01";

/// API version for Microsoft.Network.
pub const NETWORK_API_VERSION: &str = "2023-09-01";

/// API version for Microsoft.Compute.
pub const COMPUTE_API_VERSION: &str = "2023-09-01";

/// Cloud operations used by the container registry walkthrough.
///
/// Every mutating call returns only after the provider reports completion.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// The subscription the sample works in.
    async fn default_subscription(&self) -> Result<Subscription>;

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup>;

    async fn delete_resource_group(&self, id: &ResourceId) -> Result<()>;

    async fn create_registry(
        &self,
        group: &ResourceId,
        name: &str,
        registry: &Registry,
    ) -> Result<Registry>;

    /// Admin credentials of a registry.
    async fn registry_credentials(&self, registry: &ResourceId) -> Result<RegistryCredentials>;

    async fn create_public_ip(
        &self,
        group: &ResourceId,
        name: &str,
        address: &PublicIpAddress,
    ) -> Result<PublicIpAddress>;

    async fn create_network_security_group(
        &self,
        group: &ResourceId,
        name: &str,
        nsg: &NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup>;

    async fn create_virtual_network(
        &self,
        group: &ResourceId,
        name: &str,
        network: &VirtualNetwork,
    ) -> Result<VirtualNetwork>;

    async fn create_network_interface(
        &self,
        group: &ResourceId,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface>;

    async fn create_virtual_machine(
        &self,
        group: &ResourceId,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine>;

    async fn create_vm_extension(
        &self,
        vm: &ResourceId,
        name: &str,
        extension: &VirtualMachineExtension,
    ) -> Result<VirtualMachineExtension>;
}

/// [`ResourceManager`] backed by the Azure Resource Manager REST API.
pub struct AzureResourceManager {
    client: ArmClient,
    subscription_id: Option<String>,
}

impl AzureResourceManager {
    /// Create a resource manager. Without a subscription ID the first
    /// enabled subscription of the credential is used.
    pub fn new(client: ArmClient, subscription_id: Option<String>) -> Self {
        Self {
            client,
            subscription_id,
        }
    }
}

#[async_trait]
impl ResourceManager for AzureResourceManager {
    async fn default_subscription(&self) -> Result<Subscription> {
        if let Some(ref id) = self.subscription_id {
            return self
                .client
                .get(&ResourceId::subscription(id.as_str()), SUBSCRIPTIONS_API_VERSION)
                .await;
        }

        let subscriptions = self.client.list_subscriptions().await?;
        tracing::debug!(count = subscriptions.len(), "Listed subscriptions");
        subscriptions
            .into_iter()
            .find(|s| s.state.eq_ignore_ascii_case("Enabled"))
            .ok_or_else(|| {
                SampleError::ConfigError(
                    "No enabled subscription is visible to the service principal; set SUBSCRIPTION_ID"
                        .to_string(),
                )
            })
    }

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup> {
        let id = ResourceId::resource_group(subscription_id, name);
        let body = ResourceGroup {
            location: location.to_string(),
            ..Default::default()
        };
        self.client
            .create_or_update(&id, RESOURCES_API_VERSION, &body)
            .await
    }

    async fn delete_resource_group(&self, id: &ResourceId) -> Result<()> {
        self.client.delete(id, RESOURCES_API_VERSION).await
    }

    async fn create_registry(
        &self,
        group: &ResourceId,
        name: &str,
        registry: &Registry,
    ) -> Result<Registry> {
        let id = group.provider_resource("Microsoft.ContainerRegistry", "registries", name);
        self.client
            .create_or_update(&id, CONTAINER_REGISTRY_API_VERSION, registry)
            .await
    }

    async fn registry_credentials(&self, registry: &ResourceId) -> Result<RegistryCredentials> {
        self.client
            .post(registry, "listCredentials", CONTAINER_REGISTRY_API_VERSION)
            .await
    }

    async fn create_public_ip(
        &self,
        group: &ResourceId,
        name: &str,
        address: &PublicIpAddress,
    ) -> Result<PublicIpAddress> {
        let id = group.provider_resource("Microsoft.Network", "publicIPAddresses", name);
        self.client
            .create_or_update(&id, NETWORK_API_VERSION, address)
            .await
    }

    async fn create_network_security_group(
        &self,
        group: &ResourceId,
        name: &str,
        nsg: &NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup> {
        let id = group.provider_resource("Microsoft.Network", "networkSecurityGroups", name);
        self.client
            .create_or_update(&id, NETWORK_API_VERSION, nsg)
            .await
    }

    async fn create_virtual_network(
        &self,
        group: &ResourceId,
        name: &str,
        network: &VirtualNetwork,
    ) -> Result<VirtualNetwork> {
        let id = group.provider_resource("Microsoft.Network", "virtualNetworks", name);
        self.client
            .create_or_update(&id, NETWORK_API_VERSION, network)
            .await
    }

    async fn create_network_interface(
        &self,
        group: &ResourceId,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface> {
        let id = group.provider_resource("Microsoft.Network", "networkInterfaces", name);
        self.client
            .create_or_update(&id, NETWORK_API_VERSION, nic)
            .await
    }

    async fn create_virtual_machine(
        &self,
        group: &ResourceId,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine> {
        let id = group.provider_resource("Microsoft.Compute", "virtualMachines", name);
        self.client
            .create_or_update(&id, COMPUTE_API_VERSION, vm)
            .await
    }

    async fn create_vm_extension(
        &self,
        vm: &ResourceId,
        name: &str,
        extension: &VirtualMachineExtension,
    ) -> Result<VirtualMachineExtension> {
        let id = vm.child("extensions", name);
        self.client
            .create_or_update(&id, COMPUTE_API_VERSION, extension)
            .await
    }
}
