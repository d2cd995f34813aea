//! Docker engine access.
//!
//! [`DockerEngine`] covers the handful of Engine API calls the walkthrough
//! makes; [`BollardEngine`] implements it with `bollard`.

use acr_sample_core::error::{Result, SampleError};
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{Config, CreateContainerOptions, ListContainersOptions};
use bollard::image::{CommitContainerOptions, CreateImageOptions, ListImagesOptions, PushImageOptions};
use bollard::Docker;
use futures::StreamExt;

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
    server: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
            server: None,
        }
    }

    /// Create basic authentication for a registry server.
    pub fn basic(
        username: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            server: Some(server.into()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none() || self.password.is_none()
    }

    /// Registry server the credentials belong to.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Convert to bollard credentials; `None` when anonymous.
    fn to_docker_credentials(&self) -> Option<DockerCredentials> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some(DockerCredentials {
                username: Some(u.clone()),
                password: Some(p.clone()),
                serveraddress: self.server.clone(),
                ..Default::default()
            }),
            _ => None,
        }
    }
}

/// An image known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub id: String,
    pub repo_tags: Vec<String>,
    pub size_bytes: u64,
}

impl ImageSummary {
    /// First repository tag, or `<none>:<none>` for dangling images.
    pub fn display_tag(&self) -> &str {
        self.repo_tags
            .first()
            .map(String::as_str)
            .unwrap_or("<none>:<none>")
    }
}

/// A container known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
}

impl ContainerSummary {
    /// First container name without the leading slash the engine reports.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or("<unnamed>")
    }
}

/// Docker Engine operations used by the walkthrough.
#[async_trait]
pub trait DockerEngine: Send + Sync {
    /// Address of the engine (e.g., `unix:///var/run/docker.sock`).
    fn endpoint(&self) -> &str;

    async fn ping(&self) -> Result<()>;

    /// Pull `image:tag`, waiting for the pull to finish.
    async fn pull_image(&self, image: &str, tag: &str, auth: &RegistryAuth) -> Result<()>;

    /// List all images, including intermediate ones.
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    /// Create (but do not start) a container. Returns its ID.
    async fn create_container(&self, name: &str, image: &str) -> Result<String>;

    /// List all containers, including stopped ones.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Commit a container's filesystem as `repository:tag`.
    async fn commit_container(&self, container: &str, repository: &str, tag: &str) -> Result<()>;

    /// Push `repository:tag`, waiting for the push to finish.
    async fn push_image(&self, repository: &str, tag: &str, auth: &RegistryAuth) -> Result<()>;
}

/// [`DockerEngine`] backed by the `bollard` client.
pub struct BollardEngine {
    docker: Docker,
    endpoint: String,
}

impl BollardEngine {
    /// Connect to the platform-default local engine.
    pub fn connect_local() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| SampleError::DockerError {
            endpoint: "local".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            docker,
            endpoint: local_endpoint().to_string(),
        })
    }

    /// Connect to an engine at an explicit address.
    ///
    /// `tcp://` and `http://` addresses use plain HTTP; anything else is
    /// treated as a local socket path.
    pub fn connect(address: &str, timeout_secs: u64) -> Result<Self> {
        let docker_err = |e: bollard::errors::Error| SampleError::DockerError {
            endpoint: address.to_string(),
            message: e.to_string(),
        };

        let docker = if address.starts_with("tcp://") || address.starts_with("http://") {
            let http = address.replacen("tcp://", "http://", 1);
            Docker::connect_with_http(&http, timeout_secs, bollard::API_DEFAULT_VERSION)
                .map_err(docker_err)?
        } else {
            Docker::connect_with_socket(address, timeout_secs, bollard::API_DEFAULT_VERSION)
                .map_err(docker_err)?
        };

        Ok(Self {
            docker,
            endpoint: address.to_string(),
        })
    }

    fn error(&self, action: &str, e: impl std::fmt::Display) -> SampleError {
        SampleError::DockerError {
            endpoint: self.endpoint.clone(),
            message: format!("{}: {}", action, e),
        }
    }
}

#[async_trait]
impl DockerEngine for BollardEngine {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| self.error("ping failed", e))
    }

    async fn pull_image(&self, image: &str, tag: &str, auth: &RegistryAuth) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut stream = self
            .docker
            .create_image(Some(options), None, auth.to_docker_credentials());
        while let Some(progress) = stream.next().await {
            let info = progress.map_err(|e| self.error(&format!("pull {}:{}", image, tag), e))?;
            if let Some(status) = info.status {
                tracing::debug!(image, tag, status = %status, "Pull progress");
            }
        }
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let options = ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| self.error("list images", e))?;

        Ok(images
            .into_iter()
            .map(|img| ImageSummary {
                id: img.id,
                repo_tags: img.repo_tags,
                size_bytes: img.size.max(0) as u64,
            })
            .collect())
    }

    async fn create_container(&self, name: &str, image: &str) -> Result<String> {
        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };
        let config = Config {
            image: Some(image.to_string()),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| self.error(&format!("create container {}", name), e))?;

        for warning in &created.warnings {
            tracing::warn!(container = name, warning = %warning, "Engine warning");
        }
        Ok(created.id)
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| self.error("list containers", e))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
            })
            .collect())
    }

    async fn commit_container(&self, container: &str, repository: &str, tag: &str) -> Result<()> {
        let options = CommitContainerOptions {
            container: container.to_string(),
            repo: repository.to_string(),
            tag: tag.to_string(),
            pause: true,
            ..Default::default()
        };
        self.docker
            .commit_container(options, Config::<String>::default())
            .await
            .map(|_| ())
            .map_err(|e| self.error(&format!("commit {}", container), e))
    }

    async fn push_image(&self, repository: &str, tag: &str, auth: &RegistryAuth) -> Result<()> {
        let options = PushImageOptions {
            tag: tag.to_string(),
        };
        let mut stream = self
            .docker
            .push_image(repository, Some(options), auth.to_docker_credentials());
        while let Some(progress) = stream.next().await {
            let info =
                progress.map_err(|e| self.error(&format!("push {}:{}", repository, tag), e))?;
            if let Some(status) = info.status {
                tracing::debug!(repository, tag, status = %status, "Push progress");
            }
        }
        Ok(())
    }
}

/// Display form of the platform-default local engine address.
pub fn local_endpoint() -> &'static str {
    if cfg!(windows) {
        "npipe:////./pipe/docker_engine"
    } else {
        "unix:///var/run/docker.sock"
    }
}
