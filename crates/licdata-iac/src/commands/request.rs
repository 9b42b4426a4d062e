use super::output::Output;
use colored::Colorize;
use licdata_iac_core::{keys, DockerImage, Event, ImageSettings, StackIdentity, StackOperationFactory};

pub fn update_infrastructure(stack: StackIdentity) -> Event {
    Event::infrastructure_update_requested(stack)
}

pub fn remove_infrastructure(stack: StackIdentity) -> Event {
    Event::infrastructure_removal_requested(stack)
}

/// Unset name and version fall back to the configured image
pub fn update_docker_resources(
    stack: StackIdentity,
    defaults: &ImageSettings,
    name: Option<String>,
    version: Option<String>,
    url: Option<String>,
) -> Event {
    let mut image = DockerImage::new(
        name.unwrap_or_else(|| defaults.name.clone()),
        version.unwrap_or_else(|| defaults.version.clone()),
    );
    if let Some(url) = url {
        image = image.with_url(url);
    }
    Event::docker_resources_update_requested(stack, image)
}

pub fn remove_docker_resources(stack: StackIdentity) -> Event {
    Event::docker_resources_removal_requested(stack)
}

pub fn docker_image_details(
    stack: StackIdentity,
    credential_name: Option<String>,
    registry_url: Option<String>,
) -> Event {
    let mut event = Event::docker_image_details_requested(stack);
    if let Some(name) = credential_name {
        event = event.with_metadata(keys::CREDENTIAL_NAME, name);
    }
    if let Some(url) = registry_url {
        event = event.with_metadata(keys::DOCKER_REGISTRY_URL, url);
    }
    event
}

/// Runs a single request and prints what it produced
pub async fn handle(
    factory: &StackOperationFactory,
    request: &Event,
    output: &mut Output,
) -> anyhow::Result<()> {
    eprintln!(
        "{} {} ({})",
        "▶".blue(),
        request.kind().as_str().bold(),
        request.stack().to_string().cyan()
    );

    let events = factory
        .dispatch(request)
        .await
        .ok_or_else(|| anyhow::anyhow!("{} is not a request", request.kind().as_str()))?;

    output.emit_all(&events)
}
