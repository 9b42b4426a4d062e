//! Container image references and image-request defaults

use crate::event::{keys, Event, EventKind, Metadata};
use serde::{Deserialize, Serialize};

/// A container image the Docker-dependent resources run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerImage {
    #[serde(rename = "image_name")]
    pub name: String,

    #[serde(rename = "image_version")]
    pub version: String,

    /// Fully qualified image reference, when already published
    #[serde(rename = "image_url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DockerImage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// `name:version`
    pub fn tag(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    /// Image reference relative to `registry`, unless an explicit url was given
    pub fn reference(&self, registry: &str) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("{}/{}", registry, self.tag()),
        }
    }
}

impl std::fmt::Display for DockerImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} ({})", self.tag(), url),
            None => write!(f, "{}", self.tag()),
        }
    }
}

/// What to ask the image pipeline for once infrastructure is up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub name: String,
    pub version: String,
    /// Variant and runtime-version tags forwarded to the build pipeline
    pub metadata: Metadata,
}

impl Default for ImageSettings {
    fn default() -> Self {
        let metadata = [
            ("variant", "azure"),
            ("python_version", "3.11"),
            ("azure_base_image_version", "4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "licdata".to_string(),
            version: "latest".to_string(),
            metadata,
        }
    }
}

impl ImageSettings {
    pub fn image(&self) -> DockerImage {
        DockerImage::new(&self.name, &self.version)
    }

    /// Builds a `DockerImageRequested` caused by `trigger`
    ///
    /// Registry metadata comes from the arguments only, never from `trigger`.
    pub fn request(
        &self,
        trigger: &Event,
        credential_name: Option<&str>,
        registry_url: Option<&str>,
    ) -> Event {
        let mut event = Event::caused_by(trigger, EventKind::DockerImageRequested)
            .with_image(self.image())
            .with_metadata_map(&self.metadata)
            .without_metadata(keys::CREDENTIAL_NAME)
            .without_metadata(keys::DOCKER_REGISTRY_URL);

        if let Some(name) = credential_name {
            event = event.with_metadata(keys::CREDENTIAL_NAME, name);
        }
        if let Some(url) = registry_url {
            event = event.with_metadata(keys::DOCKER_REGISTRY_URL, url);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackIdentity;

    #[test]
    fn test_reference_prefers_explicit_url() {
        let image = DockerImage::new("licdata", "1.2.3");
        assert_eq!(image.reference("crlicdata.azurecr.io"), "crlicdata.azurecr.io/licdata:1.2.3");

        let image = image.with_url("ghcr.io/acmsl/licdata:1.2.3");
        assert_eq!(image.reference("crlicdata.azurecr.io"), "ghcr.io/acmsl/licdata:1.2.3");
    }

    #[test]
    fn test_request_carries_defaults_and_credentials() {
        let trigger = Event::infrastructure_update_requested(StackIdentity::new(
            "acme-prod",
            "licdata",
            "westeurope",
        ));
        let request = ImageSettings::default().request(
            &trigger,
            Some("crlicdataacmeprod"),
            Some("crlicdataacmeprod.azurecr.io"),
        );

        assert_eq!(request.kind(), EventKind::DockerImageRequested);
        assert_eq!(request.image().unwrap().tag(), "licdata:latest");
        assert_eq!(request.metadata_value("variant"), Some("azure"));
        assert_eq!(request.metadata_value("python_version"), Some("3.11"));
        assert_eq!(
            request.metadata_value(keys::CREDENTIAL_NAME),
            Some("crlicdataacmeprod")
        );
        assert_eq!(request.previous_event_ids(), &[trigger.id()]);
    }

    #[test]
    fn test_request_drops_registry_keys_of_trigger() {
        let trigger = Event::infrastructure_update_requested(StackIdentity::new(
            "acme-prod",
            "licdata",
            "westeurope",
        ))
        .with_metadata(keys::CREDENTIAL_NAME, "old-user")
        .with_metadata(keys::DOCKER_REGISTRY_URL, "old.azurecr.io")
        .with_metadata("ticket", "42");

        let request = ImageSettings::default().request(&trigger, None, None);

        assert_eq!(request.metadata_value(keys::CREDENTIAL_NAME), None);
        assert_eq!(request.metadata_value(keys::DOCKER_REGISTRY_URL), None);
        assert_eq!(request.metadata_value("ticket"), Some("42"));
    }
}
