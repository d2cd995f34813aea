//! In-memory fakes for the cloud and Docker seams.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use acr_sample_core::error::{Result, SampleError};
use acr_sample_core::{NameGenerator, PollingConfig};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::azure::models::{
    NetworkInterface, NetworkSecurityGroup, PublicIpAddress, Registry, RegistryCredentials,
    RegistryPassword, ResourceGroup, Subscription, VirtualMachine, VirtualMachineExtension,
    VirtualNetwork,
};
use crate::azure::{ArmClient, ResourceId, ResourceManager, TokenCredential};
use crate::docker::{
    ContainerSummary, DockerConnection, DockerConnector, DockerEngine, DockerHostKind,
    ImageSummary, RegistryAuth,
};

pub(crate) const FAKE_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";
pub(crate) const FAKE_PUBLIC_IP: &str = "20.1.2.3";

/// Credential that always hands out the same bearer token.
pub(crate) struct StaticToken;

#[async_trait]
impl TokenCredential for StaticToken {
    async fn token(&self, _scope: &str) -> Result<String> {
        Ok("token".to_string())
    }
}

/// One HTTP/1.1 response served by [`CannedServer`].
pub(crate) struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Canned {
    /// Response with `Retry-After: 0` so polling loops never sleep.
    pub(crate) fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Retry-After".to_string(), "0".to_string())],
            body: body.to_string(),
        }
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Loopback HTTP server answering one connection per canned response, in order.
pub(crate) struct CannedServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    /// Bind a port, then build the responses from the server's base URL.
    pub(crate) async fn start(responses: impl FnOnce(&str) -> Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let responses = responses(&base);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            for canned in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                recorded.lock().unwrap().push(request);

                let status = reqwest::StatusCode::from_u16(canned.status).unwrap();
                let mut response = format!(
                    "HTTP/1.1 {} {}\r\n",
                    canned.status,
                    status.canonical_reason().unwrap_or("Unknown")
                );
                for (name, value) in &canned.headers {
                    response.push_str(&format!("{}: {}\r\n", name, value));
                }
                response.push_str(&format!(
                    "Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    canned.body.len(),
                    canned.body
                ));
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });

        Self { base, requests }
    }

    /// Client pointed at this server with a zero poll interval.
    pub(crate) fn client(&self) -> ArmClient {
        ArmClient::new(
            Arc::new(StaticToken),
            &self.base,
            PollingConfig {
                interval_secs: 0,
                timeout_secs: 30,
            },
        )
    }

    /// `METHOD /path` of every request served so far, query strings dropped.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed the connection mid-request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default();
    format!("{} {}", method, path)
}

fn injected(kind: &str) -> SampleError {
    SampleError::ArmError {
        status: 500,
        code: "InternalServerError".to_string(),
        message: format!("injected failure in {}", kind),
    }
}

/// Records every call and answers like a successful provider.
#[derive(Default)]
pub(crate) struct FakeResourceManager {
    calls: Mutex<Vec<(&'static str, String)>>,
    failing: HashSet<&'static str>,
    without_passwords: bool,
}

impl FakeResourceManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every call of `kind` fail.
    pub(crate) fn failing(mut self, kind: &'static str) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Report registry credentials with no passwords.
    pub(crate) fn without_passwords(mut self) -> Self {
        self.without_passwords = true;
        self
    }

    pub(crate) fn calls_of_kind(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    /// Targets of `delete_resource_group` calls.
    pub(crate) fn deletes(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == "delete_resource_group")
            .map(|(_, target)| target.clone())
            .collect()
    }

    fn record(&self, kind: &'static str, target: String) -> Result<()> {
        self.calls.lock().unwrap().push((kind, target));
        if self.failing.contains(kind) {
            return Err(injected(kind));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceManager for FakeResourceManager {
    async fn default_subscription(&self) -> Result<Subscription> {
        self.record("default_subscription", String::new())?;
        Ok(Subscription {
            subscription_id: FAKE_SUBSCRIPTION.to_string(),
            display_name: "Fake subscription".to_string(),
            state: "Enabled".to_string(),
        })
    }

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup> {
        let id = ResourceId::resource_group(subscription_id, name);
        self.record("create_resource_group", id.to_string())?;
        Ok(ResourceGroup {
            id: id.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            ..Default::default()
        })
    }

    async fn delete_resource_group(&self, id: &ResourceId) -> Result<()> {
        self.record("delete_resource_group", id.to_string())
    }

    async fn create_registry(
        &self,
        group: &ResourceId,
        name: &str,
        registry: &Registry,
    ) -> Result<Registry> {
        let id = group.provider_resource("Microsoft.ContainerRegistry", "registries", name);
        self.record("create_registry", id.to_string())?;
        let mut created = registry.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        created.properties.login_server = format!("{}.azurecr.io", name);
        created.properties.provisioning_state = "Succeeded".to_string();
        Ok(created)
    }

    async fn registry_credentials(&self, registry: &ResourceId) -> Result<RegistryCredentials> {
        self.record("registry_credentials", registry.to_string())?;
        let passwords = if self.without_passwords {
            Vec::new()
        } else {
            vec![
                RegistryPassword {
                    name: "password".to_string(),
                    value: "secret-1".to_string(),
                },
                RegistryPassword {
                    name: "password2".to_string(),
                    value: "secret-2".to_string(),
                },
            ]
        };
        Ok(RegistryCredentials {
            username: registry.name().to_string(),
            passwords,
        })
    }

    async fn create_public_ip(
        &self,
        group: &ResourceId,
        name: &str,
        address: &PublicIpAddress,
    ) -> Result<PublicIpAddress> {
        let id = group.provider_resource("Microsoft.Network", "publicIPAddresses", name);
        self.record("create_public_ip", id.to_string())?;
        let mut created = address.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        created.properties.ip_address = Some(FAKE_PUBLIC_IP.to_string());
        if let Some(dns) = created.properties.dns_settings.as_mut() {
            dns.fqdn = Some(format!("{}.{}.cloudapp.azure.com", dns.domain_name_label, created.location));
        }
        Ok(created)
    }

    async fn create_network_security_group(
        &self,
        group: &ResourceId,
        name: &str,
        nsg: &NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup> {
        let id = group.provider_resource("Microsoft.Network", "networkSecurityGroups", name);
        self.record("create_network_security_group", id.to_string())?;
        let mut created = nsg.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        Ok(created)
    }

    async fn create_virtual_network(
        &self,
        group: &ResourceId,
        name: &str,
        network: &VirtualNetwork,
    ) -> Result<VirtualNetwork> {
        let id = group.provider_resource("Microsoft.Network", "virtualNetworks", name);
        self.record("create_virtual_network", id.to_string())?;
        let mut created = network.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        Ok(created)
    }

    async fn create_network_interface(
        &self,
        group: &ResourceId,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface> {
        let id = group.provider_resource("Microsoft.Network", "networkInterfaces", name);
        self.record("create_network_interface", id.to_string())?;
        let mut created = nic.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        Ok(created)
    }

    async fn create_virtual_machine(
        &self,
        group: &ResourceId,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine> {
        let id = group.provider_resource("Microsoft.Compute", "virtualMachines", name);
        self.record("create_virtual_machine", id.to_string())?;
        let mut created = vm.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        created.properties.provisioning_state = "Succeeded".to_string();
        Ok(created)
    }

    async fn create_vm_extension(
        &self,
        vm: &ResourceId,
        name: &str,
        extension: &VirtualMachineExtension,
    ) -> Result<VirtualMachineExtension> {
        let id = vm.child("extensions", name);
        self.record("create_vm_extension", id.to_string())?;
        let mut created = extension.clone();
        created.id = id.to_string();
        created.name = name.to_string();
        Ok(created)
    }
}

#[derive(Default)]
struct EngineState {
    pings: u32,
    failing_pings: u32,
    hanging_pings: bool,
    failing: HashSet<&'static str>,
    ops: Vec<String>,
    images: Vec<ImageSummary>,
    containers: Vec<ContainerSummary>,
    auths: Vec<RegistryAuth>,
}

/// Engine that keeps images and containers in memory.
///
/// Clones share state, so a test can inspect an engine it handed away.
#[derive(Clone, Default)]
pub(crate) struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail the first `count` pings.
    pub(crate) fn failing_pings(self, count: u32) -> Self {
        self.state.lock().unwrap().failing_pings = count;
        self
    }

    /// Never answer a ping, like a daemon behind a filtered port.
    pub(crate) fn hanging_pings(self) -> Self {
        self.state.lock().unwrap().hanging_pings = true;
        self
    }

    /// Make every call of `op` fail.
    pub(crate) fn failing(self, op: &'static str) -> Self {
        self.state.lock().unwrap().failing.insert(op);
        self
    }

    pub(crate) fn ping_count(&self) -> u32 {
        self.state.lock().unwrap().pings
    }

    pub(crate) fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Credentials passed to pulls and pushes, in call order.
    pub(crate) fn auths(&self) -> Vec<RegistryAuth> {
        self.state.lock().unwrap().auths.clone()
    }

    fn record(&self, op: &'static str, detail: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("{} {}", op, detail));
        if state.failing.contains(op) {
            return Err(SampleError::DockerError {
                endpoint: "fake".to_string(),
                message: format!("injected failure in {}", op),
            });
        }
        Ok(())
    }

    fn add_image(&self, reference: String) {
        let mut state = self.state.lock().unwrap();
        if !state.images.iter().any(|i| i.repo_tags.contains(&reference)) {
            let id = format!("sha256:{:04}", state.images.len());
            state.images.push(ImageSummary {
                id,
                repo_tags: vec![reference],
                size_bytes: 13_256,
            });
        }
    }
}

#[async_trait]
impl DockerEngine for FakeEngine {
    fn endpoint(&self) -> &str {
        "fake://engine"
    }

    async fn ping(&self) -> Result<()> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.pings += 1;
            state.hanging_pings
        };
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let state = self.state.lock().unwrap();
        if state.pings <= state.failing_pings {
            return Err(SampleError::DockerError {
                endpoint: "fake".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn pull_image(&self, image: &str, tag: &str, auth: &RegistryAuth) -> Result<()> {
        self.record("pull", format!("{}:{}", image, tag))?;
        self.state.lock().unwrap().auths.push(auth.clone());
        self.add_image(format!("{}:{}", image, tag));
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.record("list_images", String::new())?;
        Ok(self.state.lock().unwrap().images.clone())
    }

    async fn create_container(&self, name: &str, image: &str) -> Result<String> {
        self.record("create_container", format!("{} {}", name, image))?;
        let mut state = self.state.lock().unwrap();
        let id = format!("container{}", state.containers.len());
        state.containers.push(ContainerSummary {
            id: id.clone(),
            names: vec![format!("/{}", name)],
            image: image.to_string(),
            state: "created".to_string(),
        });
        Ok(id)
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.record("list_containers", String::new())?;
        Ok(self.state.lock().unwrap().containers.clone())
    }

    async fn commit_container(&self, container: &str, repository: &str, tag: &str) -> Result<()> {
        self.record("commit", format!("{} {}:{}", container, repository, tag))?;
        self.add_image(format!("{}:{}", repository, tag));
        Ok(())
    }

    async fn push_image(&self, repository: &str, tag: &str, auth: &RegistryAuth) -> Result<()> {
        self.record("push", format!("{}:{}", repository, tag))?;
        self.state.lock().unwrap().auths.push(auth.clone());
        Ok(())
    }
}

/// Connector handing out a shared [`FakeEngine`].
pub(crate) struct FakeConnector {
    engine: FakeEngine,
    fail: bool,
    connects: Mutex<u32>,
}

impl FakeConnector {
    pub(crate) fn new(engine: FakeEngine) -> Self {
        Self {
            engine,
            fail: false,
            connects: Mutex::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeEngine::new())
        }
    }

    pub(crate) fn connect_count(&self) -> u32 {
        *self.connects.lock().unwrap()
    }
}

#[async_trait]
impl DockerConnector for FakeConnector {
    async fn connect(
        &self,
        _resources: &dyn ResourceManager,
        _group: &ResourceId,
        _location: &str,
        _names: &mut NameGenerator,
    ) -> Result<DockerConnection> {
        *self.connects.lock().unwrap() += 1;
        if self.fail {
            return Err(SampleError::DockerError {
                endpoint: "fake".to_string(),
                message: "no engine available".to_string(),
            });
        }
        Ok(DockerConnection {
            engine: Box::new(self.engine.clone()),
            host: DockerHostKind::Local,
        })
    }
}
