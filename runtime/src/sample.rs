//! The container registry walkthrough.
//!
//! Creates a resource group and a registry, obtains a Docker engine, then
//! moves an image through the registry:
//!
//! 1. pull `hello-world:latest` from the public registry
//! 2. create a container from it and commit that container into the
//!    private repository `{loginServer}/{relativePath}/{containerName}`
//! 3. push the commit to the registry, pull it back, and create a second
//!    container from the pulled image
//!
//! The resource group is deleted at the end whether or not the run succeeded.

use std::sync::Arc;

use acr_sample_core::error::{Result, SampleError};
use acr_sample_core::{NameGenerator, SampleConfig};

use crate::azure::models::{Registry, RegistryProperties, Sku};
use crate::azure::{ResourceId, ResourceManager};
use crate::docker::{
    ContainerSummary, DockerConnection, DockerConnector, DockerEngine, DockerHostKind,
    ImageReference, ImageSummary, RegistryAuth,
};

/// Suffix appended to the container name for the container created from
/// the image pulled back out of the registry.
const SECOND_CONTAINER_SUFFIX: &str = "fromazure";

/// What happened to the resource group at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// No resource group was created; nothing was deleted.
    NothingToClean,
    /// The resource group with this ID was deleted.
    Deleted(String),
    /// Deleting the resource group failed. It may still exist.
    Failed {
        resource_group: String,
        message: String,
    },
}

impl std::fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupOutcome::NothingToClean => write!(f, "nothing to clean up"),
            CleanupOutcome::Deleted(id) => write!(f, "deleted {}", id),
            CleanupOutcome::Failed {
                resource_group,
                message,
            } => write!(f, "failed to delete {}: {}", resource_group, message),
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub subscription_id: String,
    pub resource_group: String,
    pub registry_name: String,
    pub login_server: String,
    pub docker_endpoint: String,
    pub docker_host: DockerHostKind,
    /// Private image pushed to and pulled from the registry.
    pub image: ImageReference,
    /// Images on the engine after the final pull.
    pub images: Vec<ImageSummary>,
    /// Containers on the engine after the second container was created.
    pub containers: Vec<ContainerSummary>,
    pub cleanup: CleanupOutcome,
}

/// Registry the run created, with the credentials used for push and pull.
struct ProvisionedRegistry {
    name: String,
    login_server: String,
    auth: RegistryAuth,
}

/// Output of the Docker block.
struct EngineRun {
    endpoint: String,
    host: DockerHostKind,
    image: ImageReference,
    images: Vec<ImageSummary>,
    containers: Vec<ContainerSummary>,
}

/// Holds the Docker connection for the duration of the Docker block and
/// logs its release.
struct EngineSession {
    connection: DockerConnection,
}

impl EngineSession {
    fn engine(&self) -> &dyn DockerEngine {
        self.connection.engine.as_ref()
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        tracing::debug!(
            endpoint = self.connection.engine.endpoint(),
            "Released Docker client"
        );
    }
}

/// Runs the walkthrough against a [`ResourceManager`] and a [`DockerConnector`].
pub struct ContainerRegistrySample {
    resources: Arc<dyn ResourceManager>,
    connector: Arc<dyn DockerConnector>,
    config: SampleConfig,
}

impl ContainerRegistrySample {
    pub fn new(
        resources: Arc<dyn ResourceManager>,
        connector: Arc<dyn DockerConnector>,
        config: SampleConfig,
    ) -> Self {
        Self {
            resources,
            connector,
            config,
        }
    }

    /// Run the walkthrough, then delete the resource group if one was created.
    ///
    /// An error from the walkthrough is returned after cleanup. A failed
    /// cleanup is logged and reported in [`SampleReport::cleanup`], never
    /// returned as an error.
    pub async fn run(&self) -> Result<SampleReport> {
        let mut names = NameGenerator::new();
        let mut group: Option<ResourceId> = None;

        let result = self.execute(&mut names, &mut group).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Sample run failed, cleaning up");
        }

        let cleanup = self.cleanup(group.as_ref()).await;
        result.map(|mut report| {
            report.cleanup = cleanup;
            report
        })
    }

    async fn execute(
        &self,
        names: &mut NameGenerator,
        group_slot: &mut Option<ResourceId>,
    ) -> Result<SampleReport> {
        let subscription = self.resources.default_subscription().await?;
        tracing::info!(
            subscription = %subscription.subscription_id,
            name = %subscription.display_name,
            "Using subscription"
        );

        let group_name = names.create(&self.config.resource_group_prefix);
        tracing::info!(name = %group_name, location = %self.config.location, "Creating resource group");
        let created = self
            .resources
            .create_resource_group(&subscription.subscription_id, &group_name, &self.config.location)
            .await?;
        let group = ResourceId::resource_group(subscription.subscription_id.as_str(), group_name.as_str());
        *group_slot = Some(group.clone());
        tracing::info!(name = %group_name, "Created a resource group with name: {}", group_name);

        let location = if created.location.is_empty() {
            self.config.location.clone()
        } else {
            created.location
        };

        let registry = self.create_registry(&group, &location, names).await?;

        let connection = self
            .connector
            .connect(self.resources.as_ref(), &group, &location, names)
            .await?;
        let run = self.exercise_engine(EngineSession { connection }, &registry).await?;

        Ok(SampleReport {
            subscription_id: subscription.subscription_id,
            resource_group: group.to_string(),
            registry_name: registry.name,
            login_server: registry.login_server,
            docker_endpoint: run.endpoint,
            docker_host: run.host,
            image: run.image,
            images: run.images,
            containers: run.containers,
            cleanup: CleanupOutcome::NothingToClean,
        })
    }

    async fn create_registry(
        &self,
        group: &ResourceId,
        location: &str,
        names: &mut NameGenerator,
    ) -> Result<ProvisionedRegistry> {
        let settings = &self.config.registry;
        let name = names.create(&settings.name_prefix);
        tracing::info!(name = %name, sku = %settings.sku, "Creating an Azure Container Registry");

        let request = Registry {
            id: String::new(),
            name: String::new(),
            location: location.to_string(),
            sku: Sku::named(settings.sku.as_str()),
            tags: settings.tags.clone(),
            properties: RegistryProperties {
                admin_user_enabled: settings.admin_user_enabled,
                ..Default::default()
            },
        };
        let registry = self.resources.create_registry(group, &name, &request).await?;
        let login_server = registry.properties.login_server.clone();
        if login_server.is_empty() {
            return Err(SampleError::RegistryError {
                registry: name,
                message: "registry reported no login server".to_string(),
            });
        }
        tracing::info!(name = %name, login_server = %login_server, "Created container registry");

        let registry_id = if registry.id.is_empty() {
            group.provider_resource("Microsoft.ContainerRegistry", "registries", &name)
        } else {
            ResourceId::parse(&registry.id)?
        };
        let credentials = self.resources.registry_credentials(&registry_id).await?;
        let password = credentials.primary_password().ok_or_else(|| SampleError::RegistryError {
            registry: name.clone(),
            message: "no admin password returned; is the admin user enabled?".to_string(),
        })?;
        let auth = RegistryAuth::basic(credentials.username.as_str(), password, login_server.as_str());

        Ok(ProvisionedRegistry {
            name,
            login_server,
            auth,
        })
    }

    async fn exercise_engine(
        &self,
        session: EngineSession,
        registry: &ProvisionedRegistry,
    ) -> Result<EngineRun> {
        let docker = &self.config.docker;
        let engine = session.engine();
        let endpoint = engine.endpoint().to_string();
        tracing::info!(endpoint = %endpoint, host = %session.connection.host, "Connected to Docker engine");

        let public = ImageReference::parse(&format!("{}:{}", docker.image_name, docker.image_tag))?;
        tracing::info!(image = %public, "Pulling public image");
        engine
            .pull_image(&public.repository_path(), &public.tag, &RegistryAuth::anonymous())
            .await?;
        log_images(engine).await?;

        engine
            .create_container(&docker.container_name, &public.full_reference())
            .await?;
        log_containers(engine).await?;

        let image = ImageReference::private(
            &registry.login_server,
            &docker.repository_path,
            &docker.container_name,
            &docker.image_tag,
        )?;
        let repository = image.repository_path();
        tracing::info!("Committing image at: {}", repository);
        engine
            .commit_container(&docker.container_name, &repository, &image.tag)
            .await?;

        tracing::info!(image = %image, "Pushing image to the registry");
        engine.push_image(&repository, &image.tag, &registry.auth).await?;

        tracing::info!(image = %image, "Pulling image back from the registry");
        engine.pull_image(&repository, &image.tag, &registry.auth).await?;
        let images = log_images(engine).await?;

        let second = format!("{}{}", docker.container_name, SECOND_CONTAINER_SUFFIX);
        engine.create_container(&second, &image.full_reference()).await?;
        let containers = log_containers(engine).await?;

        Ok(EngineRun {
            endpoint,
            host: session.connection.host.clone(),
            image,
            images,
            containers,
        })
    }

    async fn cleanup(&self, group: Option<&ResourceId>) -> CleanupOutcome {
        let Some(group) = group else {
            tracing::info!("Did not create any resources in Azure. No clean up is necessary");
            return CleanupOutcome::NothingToClean;
        };

        tracing::info!(resource_group = %group, "Deleting Resource Group: {}", group);
        match self.resources.delete_resource_group(group).await {
            Ok(()) => {
                tracing::info!(resource_group = %group, "Deleted Resource Group: {}", group);
                CleanupOutcome::Deleted(group.to_string())
            }
            Err(e) => {
                tracing::warn!(
                    resource_group = %group,
                    error = %e,
                    "Failed to delete resource group; it may need to be removed manually"
                );
                CleanupOutcome::Failed {
                    resource_group: group.to_string(),
                    message: e.to_string(),
                }
            }
        }
    }
}

async fn log_images(engine: &dyn DockerEngine) -> Result<Vec<ImageSummary>> {
    tracing::info!("List Docker images for: {}", engine.endpoint());
    let images = engine.list_images().await?;
    for image in &images {
        tracing::info!("\tFound image {} (id:{})", image.display_tag(), image.id);
    }
    Ok(images)
}

async fn log_containers(engine: &dyn DockerEngine) -> Result<Vec<ContainerSummary>> {
    tracing::info!("List Docker containers for: {}", engine.endpoint());
    let containers = engine.list_containers().await?;
    for container in &containers {
        tracing::info!("\tFound container {} (id:{})", container.display_name(), container.id);
    }
    Ok(containers)
}
