//! Table formatting helpers for CLI output.

use acr_sample_runtime::{CleanupOutcome, ContainerSummary, DockerHostKind, ImageSummary, SampleReport};
use comfy_table::{ContentArrangement, Table};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Shorten an image or container ID the way `docker` prints it.
pub fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    &id[..id.len().min(12)]
}

/// Key/value overview of a finished run.
pub fn summary_table(report: &SampleReport) -> Table {
    let mut table = new_table(&["FIELD", "VALUE"]);
    table.add_row(["Subscription", report.subscription_id.as_str()]);
    table.add_row(["Resource group", report.resource_group.as_str()]);
    table.add_row(["Registry", report.registry_name.as_str()]);
    table.add_row(["Login server", report.login_server.as_str()]);
    table.add_row(["Docker endpoint", report.docker_endpoint.as_str()]);
    let host = match &report.docker_host {
        DockerHostKind::Local => "local".to_string(),
        DockerHostKind::VirtualMachine {
            name,
            public_ip,
            fqdn,
        } => match fqdn {
            Some(fqdn) => format!("{} ({}, {})", name, public_ip, fqdn),
            None => format!("{} ({})", name, public_ip),
        },
    };
    table.add_row(["Docker host".to_string(), host]);
    table.add_row(["Image".to_string(), report.image.full_reference()]);
    let cleanup = match &report.cleanup {
        CleanupOutcome::NothingToClean => "nothing to clean up".to_string(),
        CleanupOutcome::Deleted(_) => "resource group deleted".to_string(),
        CleanupOutcome::Failed { message, .. } => format!("FAILED: {}", message),
    };
    table.add_row(["Cleanup".to_string(), cleanup]);
    table
}

pub fn images_table(images: &[ImageSummary]) -> Table {
    let mut table = new_table(&["IMAGE", "IMAGE ID", "SIZE"]);
    for image in images {
        table.add_row([
            image.display_tag().to_string(),
            short_id(&image.id).to_string(),
            format_bytes(image.size_bytes),
        ]);
    }
    table
}

pub fn containers_table(containers: &[ContainerSummary]) -> Table {
    let mut table = new_table(&["CONTAINER ID", "NAME", "IMAGE", "STATE"]);
    for container in containers {
        table.add_row([
            short_id(&container.id),
            container.display_name(),
            container.image.as_str(),
            container.state.as_str(),
        ]);
    }
    table
}
