use serde::{Deserialize, Serialize};

pub const DEFAULT_REGISTRY: &str = "index.docker.io";
pub const DEFAULT_TAG: &str = "latest";

/// A parsed image reference: `[registry/]repository[:tag][@digest]`.
///
/// `repository` keeps the registry prefix when one was given, since that is
/// what the pull API expects as `fromImage`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn parse(image_name: &str) -> Self {
        let without_digest = image_name.split('@').next().unwrap_or_default().trim();

        let last_slash = without_digest.rfind('/');
        let last_colon = without_digest.rfind(':');

        let (repository, tag) = match (last_colon, last_slash) {
            (Some(colon), Some(slash)) if colon > slash => {
                (&without_digest[..colon], &without_digest[colon + 1..])
            }
            (Some(colon), None) => (&without_digest[..colon], &without_digest[colon + 1..]),
            _ => (without_digest, DEFAULT_TAG),
        };

        Self {
            registry: registry_of(repository),
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }

    /// `repository:tag`
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    pub fn is_docker_hub(&self) -> bool {
        self.registry.eq_ignore_ascii_case(DEFAULT_REGISTRY)
            || self.registry.eq_ignore_ascii_case("docker.io")
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Registry host implied by a repository path.
fn registry_of(repository: &str) -> String {
    let first_segment = repository.split('/').next().unwrap_or_default().trim();
    let has_path = repository.contains('/');
    let explicit = has_path
        && (first_segment.contains('.')
            || first_segment.contains(':')
            || first_segment.eq_ignore_ascii_case("localhost"));

    if explicit {
        first_segment.to_string()
    } else {
        DEFAULT_REGISTRY.to_string()
    }
}
