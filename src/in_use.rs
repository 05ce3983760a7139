use crate::image_reference::ImageReference;
use k8s_openapi::api::core::v1::{Container, Pod};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Tags referenced by at least one running container, keyed by repository.
/// Built once per cleanup pass and read-only afterwards.
pub type InUseSet = HashMap<String, HashSet<String>>;

/// Collects every tagged image reference from the given pods into a set of
/// in-use tags per repository.
///
/// Unparseable references are skipped silently; a pod may run images from
/// registries this tool does not manage. Init containers count as in use
/// too, since their images are pulled whenever the pod restarts.
pub fn build_in_use_set(pods: &[Pod]) -> InUseSet {
    let mut in_use = InUseSet::new();

    for pod in pods {
        let Some(spec) = pod.spec.as_ref() else {
            continue;
        };
        let containers = spec
            .containers
            .iter()
            .chain(spec.init_containers.iter().flatten());

        for container in containers {
            record_container_image(&mut in_use, container);
        }
    }

    in_use
}

fn record_container_image(in_use: &mut InUseSet, container: &Container) {
    let Some(image) = container.image.as_deref() else {
        return;
    };

    match ImageReference::parse(image) {
        Ok(reference) => {
            in_use
                .entry(reference.repository)
                .or_default()
                .insert(reference.tag);
        }
        Err(err) => {
            debug!(
                "Ignoring image {} of container {}: {}",
                image, container.name, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;

    fn container(image: &str) -> Container {
        Container {
            name: "app".to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    fn pod(containers: Vec<Container>) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn collects_tags_per_repository() {
        let pods = vec![
            pod(vec![container("registry.example.com/app:v1")]),
            pod(vec![container("registry.example.com/app:v2")]),
            pod(vec![container("registry.example.com/worker:v1")]),
        ];

        let in_use = build_in_use_set(&pods);

        assert_eq!(in_use.len(), 2);
        assert!(in_use["app"].contains("v1"));
        assert!(in_use["app"].contains("v2"));
        assert_eq!(in_use["worker"], HashSet::from(["v1".to_string()]));
    }

    #[test]
    fn duplicate_references_collapse() {
        let pods = vec![
            pod(vec![container("registry.example.com/app:v1")]),
            pod(vec![container("registry.example.com/app:v1")]),
        ];

        let in_use = build_in_use_set(&pods);

        assert_eq!(in_use["app"].len(), 1);
    }

    #[test]
    fn init_containers_count_as_in_use() {
        let mut migration_pod = pod(vec![container("registry.example.com/app:v1")]);
        migration_pod.spec.as_mut().unwrap().init_containers =
            Some(vec![container("registry.example.com/migrations:v3")]);

        let in_use = build_in_use_set(&[migration_pod]);

        assert!(in_use["migrations"].contains("v3"));
    }

    #[test]
    fn unparseable_images_are_skipped() {
        let pods = vec![pod(vec![
            container("registry.example.com/app@sha256:abcdef"),
            container("no-registry:latest"),
            container("registry.example.com/app:v1"),
        ])];

        let in_use = build_in_use_set(&pods);

        assert_eq!(in_use.len(), 1);
        assert_eq!(in_use["app"], HashSet::from(["v1".to_string()]));
    }

    #[test]
    fn pods_without_spec_or_containers_contribute_nothing() {
        let pods = vec![Pod::default(), pod(vec![])];

        let in_use = build_in_use_set(&pods);

        assert!(in_use.is_empty());
    }
}
