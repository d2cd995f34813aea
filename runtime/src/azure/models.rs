//! Wire models for the Azure Resource Manager resources the sample touches.
//!
//! Only the fields the sample reads or writes are modelled; everything else
//! in a response is ignored on deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A subscription visible to the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: String,
}

/// Paged list wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// Resource group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGroup {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// SKU by name (registries, public IPs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl Sku {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier: None,
        }
    }
}

/// Reference to another resource by ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Container registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub sku: Sku,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: RegistryProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryProperties {
    #[serde(default)]
    pub admin_user_enabled: bool,
    #[serde(default, skip_serializing)]
    pub login_server: String,
    #[serde(default, skip_serializing)]
    pub provisioning_state: String,
}

/// Response of `registries/{name}/listCredentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    #[serde(default)]
    pub passwords: Vec<RegistryPassword>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryPassword {
    pub name: String,
    pub value: String,
}

impl RegistryCredentials {
    /// The first admin password, as used for `docker login`.
    pub fn primary_password(&self) -> Option<&str> {
        self.passwords.first().map(|p| p.value.as_str())
    }
}

/// Public IP address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpAddress {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(default)]
    pub properties: PublicIpAddressProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddressProperties {
    #[serde(rename = "publicIPAllocationMethod", default)]
    pub public_ip_allocation_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_settings: Option<DnsSettings>,
    #[serde(default, skip_serializing)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSettings {
    pub domain_name_label: String,
    #[serde(default, skip_serializing)]
    pub fqdn: Option<String>,
}

/// Network security group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSecurityGroup {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub properties: NetworkSecurityGroupProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroupProperties {
    #[serde(default)]
    pub security_rules: Vec<SecurityRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
    pub properties: SecurityRuleProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuleProperties {
    pub protocol: String,
    pub source_address_prefix: String,
    pub source_port_range: String,
    pub destination_address_prefix: String,
    pub destination_port_range: String,
    pub access: String,
    pub priority: u32,
    pub direction: String,
}

impl SecurityRule {
    /// Inbound TCP allow rule for a single destination port.
    pub fn allow_inbound_tcp(name: &str, port: u16, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            properties: SecurityRuleProperties {
                protocol: "Tcp".to_string(),
                source_address_prefix: "*".to_string(),
                source_port_range: "*".to_string(),
                destination_address_prefix: "*".to_string(),
                destination_port_range: port.to_string(),
                access: "Allow".to_string(),
                priority,
                direction: "Inbound".to_string(),
            },
        }
    }
}

/// Virtual network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualNetwork {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub properties: VirtualNetworkProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    pub address_space: AddressSpace,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    pub properties: SubnetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    pub address_prefix: String,
}

impl Subnet {
    pub fn new(name: &str, address_prefix: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            properties: SubnetProperties {
                address_prefix: address_prefix.to_string(),
            },
        }
    }
}

/// Network interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub properties: NetworkInterfaceProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    #[serde(rename = "ipConfigurations")]
    pub ip_configurations: Vec<IpConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_security_group: Option<SubResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpConfiguration {
    pub name: String,
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    #[serde(rename = "privateIPAllocationMethod")]
    pub private_ip_allocation_method: String,
    pub subnet: SubResource,
    #[serde(rename = "publicIPAddress", default, skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<SubResource>,
}

/// Virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub properties: VirtualMachineProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
    pub os_profile: OsProfile,
    pub network_profile: NetworkProfile,
    #[serde(default, skip_serializing)]
    pub provisioning_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub image_reference: ImageReference,
    pub os_disk: OsDisk,
}

/// Marketplace image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    pub os_type: String,
    pub create_option: String,
    pub caching: String,
    pub managed_disk: ManagedDisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDisk {
    pub storage_account_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    pub computer_name: String,
    pub admin_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_configuration: Option<LinuxConfiguration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxConfiguration {
    pub disable_password_authentication: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    pub network_interfaces: Vec<SubResource>,
}

/// Virtual machine extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachineExtension {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub properties: VirtualMachineExtensionProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineExtensionProperties {
    pub publisher: String,
    #[serde(rename = "type")]
    pub extension_type: String,
    pub type_handler_version: String,
    pub auto_upgrade_minor_version: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default, skip_serializing)]
    pub provisioning_state: String,
}
