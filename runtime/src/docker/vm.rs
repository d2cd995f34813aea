//! Request bodies for a Linux VM that hosts a Docker engine.
//!
//! Used when no local engine answers: a public IP, a network security group
//! opening the Docker API and SSH, a virtual network, a NIC, the VM itself,
//! and a CustomScript extension that installs Docker and exposes the daemon
//! over TCP.

use acr_sample_core::VmConfig;
use base64::Engine;

use crate::azure::models::{
    AddressSpace, DnsSettings, HardwareProfile, ImageReference, IpConfiguration,
    IpConfigurationProperties, LinuxConfiguration, ManagedDisk, NetworkInterface,
    NetworkInterfaceProperties, NetworkProfile, NetworkSecurityGroup,
    NetworkSecurityGroupProperties, OsDisk, OsProfile, PublicIpAddress,
    PublicIpAddressProperties, SecurityRule, Sku, StorageProfile, SubResource, Subnet,
    VirtualMachine, VirtualMachineExtension, VirtualMachineExtensionProperties,
    VirtualMachineProperties, VirtualNetwork, VirtualNetworkProperties,
};

/// SSH port opened next to the Docker API.
const SSH_PORT: u16 = 22;

/// Name of the extension that installs Docker.
pub const DOCKER_EXTENSION_NAME: &str = "docker-setup";

/// Static Standard-SKU public IP with a DNS label equal to its name.
pub fn public_ip_request(location: &str, name: &str) -> PublicIpAddress {
    PublicIpAddress {
        id: String::new(),
        name: String::new(),
        location: location.to_string(),
        sku: Some(Sku {
            name: "Standard".to_string(),
            tier: Some("Regional".to_string()),
        }),
        properties: PublicIpAddressProperties {
            public_ip_allocation_method: "Static".to_string(),
            dns_settings: Some(DnsSettings {
                domain_name_label: name.to_lowercase(),
                fqdn: None,
            }),
            ip_address: None,
        },
    }
}

/// Security group admitting the Docker API port and SSH from anywhere.
pub fn network_security_group_request(location: &str, docker_port: u16) -> NetworkSecurityGroup {
    NetworkSecurityGroup {
        id: String::new(),
        name: String::new(),
        location: location.to_string(),
        properties: NetworkSecurityGroupProperties {
            security_rules: vec![
                SecurityRule::allow_inbound_tcp("allow-docker-api", docker_port, 1000),
                SecurityRule::allow_inbound_tcp("allow-ssh", SSH_PORT, 1010),
            ],
        },
    }
}

/// `10.10.0.0/16` with three `/24` subnets; the NIC joins the first.
pub fn virtual_network_request(location: &str) -> VirtualNetwork {
    VirtualNetwork {
        id: String::new(),
        name: String::new(),
        location: location.to_string(),
        properties: VirtualNetworkProperties {
            address_space: AddressSpace {
                address_prefixes: vec!["10.10.0.0/16".to_string()],
            },
            subnets: vec![
                Subnet::new("default", "10.10.1.0/24"),
                Subnet::new("subnet1", "10.10.2.0/24"),
                Subnet::new("subnet2", "10.10.3.0/24"),
            ],
        },
    }
}

pub fn network_interface_request(
    location: &str,
    subnet_id: &str,
    public_ip_id: &str,
    nsg_id: &str,
) -> NetworkInterface {
    NetworkInterface {
        id: String::new(),
        name: String::new(),
        location: location.to_string(),
        properties: NetworkInterfaceProperties {
            ip_configurations: vec![IpConfiguration {
                name: "default-config".to_string(),
                properties: IpConfigurationProperties {
                    private_ip_allocation_method: "Dynamic".to_string(),
                    subnet: SubResource::new(subnet_id),
                    public_ip_address: Some(SubResource::new(public_ip_id)),
                },
            }],
            network_security_group: Some(SubResource::new(nsg_id)),
        },
    }
}

pub fn virtual_machine_request(
    location: &str,
    vm_name: &str,
    nic_id: &str,
    vm: &VmConfig,
) -> VirtualMachine {
    VirtualMachine {
        id: String::new(),
        name: String::new(),
        location: location.to_string(),
        properties: VirtualMachineProperties {
            hardware_profile: HardwareProfile {
                vm_size: vm.size.clone(),
            },
            storage_profile: StorageProfile {
                image_reference: ImageReference {
                    publisher: vm.image_publisher.clone(),
                    offer: vm.image_offer.clone(),
                    sku: vm.image_sku.clone(),
                    version: vm.image_version.clone(),
                },
                os_disk: OsDisk {
                    os_type: "Linux".to_string(),
                    create_option: "FromImage".to_string(),
                    caching: "ReadWrite".to_string(),
                    managed_disk: ManagedDisk {
                        storage_account_type: "Standard_LRS".to_string(),
                    },
                },
            },
            os_profile: OsProfile {
                computer_name: vm_name.to_string(),
                admin_username: vm.admin_username.clone(),
                admin_password: Some(vm.admin_password.clone()),
                linux_configuration: Some(LinuxConfiguration {
                    disable_password_authentication: false,
                }),
            },
            network_profile: NetworkProfile {
                network_interfaces: vec![SubResource::new(nic_id)],
            },
            provisioning_state: String::new(),
        },
    }
}

/// CustomScript extension running [`docker_install_script`].
pub fn docker_extension_request(location: &str, docker_port: u16) -> VirtualMachineExtension {
    let script = base64::engine::general_purpose::STANDARD.encode(docker_install_script(docker_port));
    VirtualMachineExtension {
        id: String::new(),
        name: String::new(),
        location: location.to_string(),
        properties: VirtualMachineExtensionProperties {
            publisher: "Microsoft.Azure.Extensions".to_string(),
            extension_type: "CustomScript".to_string(),
            type_handler_version: "2.1".to_string(),
            auto_upgrade_minor_version: true,
            settings: serde_json::json!({ "script": script }),
            provisioning_state: String::new(),
        },
    }
}

/// Shell script that installs Docker and binds the daemon to `tcp://0.0.0.0:{port}`.
///
/// The daemon is unauthenticated; the VM lives only as long as the run.
pub fn docker_install_script(docker_port: u16) -> String {
    format!(
        "#!/bin/bash
set -euo pipefail
export DEBIAN_FRONTEND=noninteractive
apt-get update -q
apt-get install -y -q docker.io
mkdir -p /etc/systemd/system/docker.service.d
cat > /etc/systemd/system/docker.service.d/override.conf <<'EOF'
[Service]
ExecStart=
ExecStart=/usr/bin/dockerd -H fd:// -H tcp://0.0.0.0:{docker_port}
EOF
systemctl daemon-reload
systemctl restart docker
"
    )
}
