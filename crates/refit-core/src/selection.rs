use refit_runtime::{normalize_container_name, ContainerRef};

use crate::options::{UpdaterOptions, LABEL_ENABLE};
use crate::recreate::BACKUP_SUFFIX;

/// Decides which listed containers a session looks at.
#[derive(Debug, Clone)]
pub struct ContainerSelectionPolicy {
    options: UpdaterOptions,
}

impl ContainerSelectionPolicy {
    pub fn new(options: UpdaterOptions) -> Self {
        Self { options }
    }

    pub fn should_monitor(&self, container: &ContainerRef) -> bool {
        let name = normalize_container_name(&container.name);

        // Parked originals belong to an in-flight or failed recreation
        if name.ends_with(BACKUP_SUFFIX) {
            return false;
        }

        if !self.options.target_containers.is_empty()
            && !self.options.target_containers.contains(&name)
        {
            return false;
        }

        if self.options.disable_containers.contains(&name) {
            return false;
        }

        let label_enabled = enable_label(container);
        if self.options.label_enable {
            return label_enabled == Some(true);
        }
        if label_enabled == Some(false) {
            return false;
        }

        if !self.options.include_stopped && container.is_stopped() {
            return false;
        }

        true
    }
}

/// Value of the enable label; unparsable values count as absent.
fn enable_label(container: &ContainerRef) -> Option<bool> {
    container
        .labels
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(LABEL_ENABLE))
        .and_then(|(_, value)| match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })
}
