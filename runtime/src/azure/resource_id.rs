//! Azure Resource Manager resource identifiers.
//!
//! Parses identifiers like
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ContainerRegistry/registries/{name}`
//! into structured components and renders them back.

use acr_sample_core::error::{Result, SampleError};

/// Parsed ARM resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// Subscription ID
    pub subscription_id: String,
    /// Resource group name (absent for subscription-level IDs)
    pub resource_group: Option<String>,
    /// Provider namespace (e.g., "Microsoft.Network")
    pub namespace: Option<String>,
    /// `(type, name)` pairs from outermost to innermost resource
    pub segments: Vec<(String, String)>,
}

impl ResourceId {
    /// ID of a subscription.
    pub fn subscription(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: None,
            namespace: None,
            segments: Vec::new(),
        }
    }

    /// ID of a resource group in a subscription.
    pub fn resource_group(subscription_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: Some(name.into()),
            ..Self::subscription(subscription_id)
        }
    }

    /// ID of a top-level provider resource inside this resource group.
    pub fn provider_resource(
        &self,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            namespace: Some(namespace.to_string()),
            segments: vec![(resource_type.to_string(), name.to_string())],
        }
    }

    /// ID of a child resource (e.g., a VM extension) of this resource.
    pub fn child(&self, resource_type: &str, name: &str) -> Self {
        let mut child = self.clone();
        child
            .segments
            .push((resource_type.to_string(), name.to_string()));
        child
    }

    /// Innermost resource name (or the group / subscription name).
    pub fn name(&self) -> &str {
        if let Some((_, name)) = self.segments.last() {
            name
        } else if let Some(ref group) = self.resource_group {
            group
        } else {
            &self.subscription_id
        }
    }

    /// Parse a resource ID string. Segment keywords are matched case-insensitively.
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| SampleError::ResourceIdError {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = id.trim().trim_matches('/').split('/').collect();
        if parts.len() < 2 || !parts[0].eq_ignore_ascii_case("subscriptions") {
            return Err(invalid("expected /subscriptions/{id}"));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty segment"));
        }

        let mut parsed = Self::subscription(parts[1]);
        let mut rest = &parts[2..];

        if rest.len() >= 2 && rest[0].eq_ignore_ascii_case("resourceGroups") {
            parsed.resource_group = Some(rest[1].to_string());
            rest = &rest[2..];
        }

        if !rest.is_empty() {
            if !rest[0].eq_ignore_ascii_case("providers") || rest.len() < 2 {
                return Err(invalid("expected /providers/{namespace}"));
            }
            parsed.namespace = Some(rest[1].to_string());
            let pairs = &rest[2..];
            if pairs.is_empty() || pairs.len() % 2 != 0 {
                return Err(invalid("expected {type}/{name} pairs after namespace"));
            }
            parsed.segments = pairs
                .chunks(2)
                .map(|pair| (pair[0].to_string(), pair[1].to_string()))
                .collect();
        }

        Ok(parsed)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if let Some(ref group) = self.resource_group {
            write!(f, "/resourceGroups/{}", group)?;
        }
        if let Some(ref namespace) = self.namespace {
            write!(f, "/providers/{}", namespace)?;
            for (resource_type, name) in &self.segments {
                write!(f, "/{}/{}", resource_type, name)?;
            }
        }
        Ok(())
    }
}
