use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SampleError};
use crate::log::LogFormat;
use crate::naming;

/// Default Azure region for every resource the sample creates.
pub const DEFAULT_LOCATION: &str = "eastus";

/// Default Microsoft Entra authority.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default Azure Resource Manager endpoint.
pub const DEFAULT_RESOURCE_MANAGER: &str = "https://management.azure.com";

/// Sample configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Service principal credentials
    pub credentials: CredentialConfig,

    /// Authority and management endpoints
    pub endpoints: EndpointConfig,

    /// Region for all created resources
    pub location: String,

    /// Prefix for the randomized resource group name
    pub resource_group_prefix: String,

    /// Container registry settings
    pub registry: RegistryConfig,

    /// Docker engine and image settings
    pub docker: DockerConfig,

    /// Docker host VM settings (used when no local engine answers)
    pub vm: VmConfig,

    /// Long-running operation polling
    pub polling: PollingConfig,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialConfig::default(),
            endpoints: EndpointConfig::default(),
            location: DEFAULT_LOCATION.to_string(),
            resource_group_prefix: "ACRTemplateRG".to_string(),
            registry: RegistryConfig::default(),
            docker: DockerConfig::default(),
            vm: VmConfig::default(),
            polling: PollingConfig::default(),
            log_format: LogFormat::Text,
        }
    }
}

impl SampleConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// `CLIENT_ID`, `CLIENT_SECRET` and `TENANT_ID` are required.
    /// `SUBSCRIPTION_ID` is optional; without it the first enabled
    /// subscription visible to the service principal is used.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| SampleError::ConfigError(format!("{key} is not set")))
        };

        let mut config = Self {
            credentials: CredentialConfig {
                client_id: require("CLIENT_ID")?,
                client_secret: require("CLIENT_SECRET")?,
                tenant_id: require("TENANT_ID")?,
                subscription_id: get("SUBSCRIPTION_ID"),
            },
            ..Self::default()
        };

        if let Some(location) = get("AZURE_LOCATION") {
            config.location = location.to_lowercase();
        }
        if let Some(authority) = get("AZURE_AUTHORITY_HOST") {
            config.endpoints.authority_host = authority.trim_end_matches('/').to_string();
        }
        if let Some(arm) = get("AZURE_RESOURCE_MANAGER") {
            config.endpoints.resource_manager = arm.trim_end_matches('/').to_string();
        }
        config.docker.host = get("DOCKER_HOST");
        if let Some(format) = get("ACR_SAMPLE_LOG_FORMAT") {
            config.log_format = format.parse().map_err(SampleError::ConfigError)?;
        }

        Ok(config)
    }
}

/// Service principal credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: Option<String>,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Authority and management endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Token authority host
    pub authority_host: String,

    /// Azure Resource Manager base URL (also the token audience)
    pub resource_manager: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            resource_manager: DEFAULT_RESOURCE_MANAGER.to_string(),
        }
    }
}

/// Container registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Prefix for the randomized registry name
    pub name_prefix: String,

    /// Registry SKU (Basic, Standard, Premium)
    pub sku: String,

    /// Enable the admin user so credentials can be listed
    pub admin_user_enabled: bool,

    /// Tags applied to the registry
    pub tags: BTreeMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("key1".to_string(), "value1".to_string());
        tags.insert("key2".to_string(), "value2".to_string());

        Self {
            name_prefix: "acrsample".to_string(),
            sku: "Basic".to_string(),
            admin_user_enabled: true,
            tags,
        }
    }
}

/// Docker engine and image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Explicit engine address (`DOCKER_HOST`), skips local probing
    pub host: Option<String>,

    /// Public image pulled at the start of the run
    pub image_name: String,

    /// Tag used for every pull, commit and push
    pub image_tag: String,

    /// Name of the first container; also the private repository leaf
    pub container_name: String,

    /// Path segment between the login server and the repository leaf
    pub repository_path: String,

    /// Port the provisioned VM exposes the Docker API on
    pub daemon_port: u16,

    /// Seconds to wait for a provisioned daemon to answer
    pub ready_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: None,
            image_name: "hello-world".to_string(),
            image_tag: "latest".to_string(),
            container_name: "sample-hello".to_string(),
            repository_path: "samplesrust".to_string(),
            daemon_port: 2375,
            ready_timeout_secs: 300,
        }
    }
}

/// Docker host VM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    /// VM size
    pub size: String,

    /// Marketplace image publisher
    pub image_publisher: String,

    /// Marketplace image offer
    pub image_offer: String,

    /// Marketplace image SKU
    pub image_sku: String,

    /// Marketplace image version
    pub image_version: String,

    /// Administrator user name
    pub admin_username: String,

    /// Administrator password
    pub admin_password: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            size: "Standard_B4ms".to_string(),
            image_publisher: "Canonical".to_string(),
            image_offer: "0001-com-ubuntu-server-jammy".to_string(),
            image_sku: "22_04-lts-gen2".to_string(),
            image_version: "latest".to_string(),
            admin_username: naming::create_username(),
            admin_password: naming::create_password(),
        }
    }
}

/// Long-running operation polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between polls when the service sends no Retry-After
    pub interval_secs: u64,

    /// Upper bound for a single operation (0 = unlimited)
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 1800, // 30 minutes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("CLIENT_ID", "client"),
        ("CLIENT_SECRET", "secret"),
        ("TENANT_ID", "tenant"),
    ];

    #[test]
    fn test_from_lookup_required_only() {
        let config = SampleConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.credentials.client_id, "client");
        assert_eq!(config.credentials.client_secret, "secret");
        assert_eq!(config.credentials.tenant_id, "tenant");
        assert_eq!(config.credentials.subscription_id, None);
        assert_eq!(config.location, "eastus");
        assert_eq!(config.endpoints.resource_manager, DEFAULT_RESOURCE_MANAGER);
        assert!(config.docker.host.is_none());
    }

    #[test]
    fn test_from_lookup_missing_client_id() {
        let err = SampleConfig::from_lookup(lookup(&[
            ("CLIENT_SECRET", "secret"),
            ("TENANT_ID", "tenant"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: CLIENT_ID is not set");
    }

    #[test]
    fn test_from_lookup_blank_value_is_missing() {
        let err = SampleConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "client"),
            ("CLIENT_SECRET", "   "),
            ("TENANT_ID", "tenant"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLIENT_SECRET"));
    }

    #[test]
    fn test_from_lookup_optional_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("SUBSCRIPTION_ID", "00000000-0000-0000-0000-000000000001"),
            ("AZURE_LOCATION", "WestEurope"),
            ("AZURE_RESOURCE_MANAGER", "https://management.usgovcloudapi.net/"),
            ("DOCKER_HOST", "tcp://127.0.0.1:2375"),
            ("ACR_SAMPLE_LOG_FORMAT", "json"),
        ]);
        let config = SampleConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.credentials.subscription_id.as_deref(),
            Some("00000000-0000-0000-0000-000000000001")
        );
        assert_eq!(config.location, "westeurope");
        assert_eq!(
            config.endpoints.resource_manager,
            "https://management.usgovcloudapi.net"
        );
        assert_eq!(config.docker.host.as_deref(), Some("tcp://127.0.0.1:2375"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_from_lookup_rejects_unknown_log_format() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACR_SAMPLE_LOG_FORMAT", "xml"));
        let err = SampleConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, SampleError::ConfigError(_)));
    }

    #[test]
    fn test_registry_defaults() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.sku, "Basic");
        assert!(registry.admin_user_enabled);
        assert_eq!(registry.tags.get("key1").map(String::as_str), Some("value1"));
        assert_eq!(registry.tags.get("key2").map(String::as_str), Some("value2"));
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let config = SampleConfig::from_lookup(lookup(REQUIRED)).unwrap();
        let debug = format!("{:?}", config.credentials);
        assert!(debug.contains("client"));
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("<redacted>"));
    }
}
