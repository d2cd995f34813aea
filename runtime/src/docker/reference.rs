//! Image reference parsing and private repository paths.
//!
//! Parses references like `acrsample12.azurecr.io/samplesrust/sample-hello:latest`
//! into structured components.

use acr_sample_core::error::{Result, SampleError};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "acrsample12.azurecr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "samplesrust/sample-hello", "library/hello-world")
    pub repository: String,
    /// Tag (e.g., "latest")
    pub tag: String,
}

impl ImageReference {
    /// Reference inside a private registry:
    /// `{login_server}/{relative_path}/{name}:{tag}`.
    pub fn private(login_server: &str, relative_path: &str, name: &str, tag: &str) -> Result<Self> {
        let registry = login_server.trim().trim_end_matches('/');
        if registry.is_empty() {
            return Err(SampleError::ImageReferenceError(
                "Registry login server is empty".to_string(),
            ));
        }

        let relative_path = relative_path.trim_matches('/');
        let repository = if relative_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", relative_path, name)
        };
        validate_repository(&repository)?;
        validate_tag(tag)?;

        Ok(Self {
            registry: registry.to_string(),
            repository,
            tag: tag.to_string(),
        })
    }

    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `hello-world` → docker.io/library/hello-world:latest
    /// - `hello-world:linux` → docker.io/library/hello-world:linux
    /// - `myuser/myimage` → docker.io/myuser/myimage:latest
    /// - `acr.azurecr.io/path/image:tag` → acr.azurecr.io/path/image:tag
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SampleError::ImageReferenceError(
                "Empty image reference".to_string(),
            ));
        }
        if reference.contains('@') {
            return Err(SampleError::ImageReferenceError(format!(
                "Digest references are not supported: '{}'",
                reference
            )));
        }

        // Split tag on the last colon after the last slash
        let last_segment_start = reference.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match reference[last_segment_start..].rfind(':') {
            Some(colon) => {
                let colon = last_segment_start + colon;
                (&reference[..colon], &reference[colon + 1..])
            }
            None => (reference, DEFAULT_TAG),
        };

        let (registry, repository) = split_registry_repository(name)?;
        validate_repository(&repository)?;
        validate_tag(tag)?;

        Ok(Self {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }

    /// Repository with its registry, as passed to push and pull.
    pub fn repository_path(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        format!("{}:{}", self.repository_path(), self.tag)
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

/// Split a name into registry and repository components.
fn split_registry_repository(name: &str) -> Result<(String, String)> {
    // The first component is a registry hostname when it contains a dot or
    // colon, or is "localhost"
    if let Some(slash_pos) = name.find('/') {
        let first = &name[..slash_pos];
        if first.contains('.') || first.contains(':') || first == "localhost" {
            let repo = &name[slash_pos + 1..];
            if repo.is_empty() {
                return Err(SampleError::ImageReferenceError(format!(
                    "Empty repository in reference '{}'",
                    name
                )));
            }
            return Ok((first.to_string(), repo.to_string()));
        }
    }

    let repository = if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{}", name)
    };
    Ok((DEFAULT_REGISTRY.to_string(), repository))
}

/// Repository components are lowercase alphanumerics separated by `.`, `_` or `-`.
fn validate_repository(repository: &str) -> Result<()> {
    for component in repository.split('/') {
        let valid = !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
            && component.starts_with(|c: char| c.is_ascii_alphanumeric())
            && component.ends_with(|c: char| c.is_ascii_alphanumeric());
        if !valid {
            return Err(SampleError::ImageReferenceError(format!(
                "Invalid repository component '{}' in '{}'",
                component, repository
            )));
        }
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<()> {
    let valid = !tag.is_empty()
        && tag.len() <= 128
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        && !tag.starts_with(['.', '-']);
    if !valid {
        return Err(SampleError::ImageReferenceError(format!(
            "Invalid tag '{}'",
            tag
        )));
    }
    Ok(())
}
