use crate::config::RepositoryConfig;
use crate::in_use::{InUseSet, build_in_use_set};
use crate::kube_workloads::WorkloadSource;
use crate::oci_registry::{RegistryService, RepositoryRecord};
use crate::retention::select_for_deletion;
use anyhow::Context;
use futures::future::join_all;
use tracing::info;

/// Configuration of one cleanup pass: which namespaces to scan for running
/// images and which repositories to clean. Collaborators are passed into
/// [`CleanupTask::remove_old_images`] per call, never stored, so every pass
/// runs with fresh clients and tests can substitute mocks.
pub struct CleanupTask {
    pub namespaces: Vec<String>,
    pub repositories: Vec<RepositoryConfig>,
}

impl CleanupTask {
    /// Runs one cleanup pass and returns every error that occurred; an empty
    /// list is the only success signal.
    ///
    /// The pass has two fatal prefix steps: listing the running pods and
    /// resolving the configured repositories. Either failing returns a
    /// single-element error list before any repository is touched. After
    /// that, repositories are cleaned independently and a failure in one
    /// never blocks the others.
    pub async fn remove_old_images<W: WorkloadSource, R: RegistryService>(
        &self,
        workloads: &W,
        registry: &R,
    ) -> Vec<anyhow::Error> {
        let pods = match workloads
            .list_all_pods(&self.namespaces)
            .await
            .context("Failed to list running pods")
        {
            Ok(pods) => pods,
            Err(err) => return vec![err],
        };

        let in_use = build_in_use_set(&pods);
        info!(
            "Found in-use tags for {} repositories across {} pods",
            in_use.len(),
            pods.len()
        );

        let names: Vec<String> = self.repositories.iter().map(|r| r.name.clone()).collect();
        let records = match registry
            .list_repositories(&names)
            .await
            .context("Failed to resolve configured repositories")
        {
            Ok(records) => records,
            Err(err) => return vec![err],
        };

        // Repositories have no cross-dependencies; clean them concurrently
        // and collect whatever failed without aborting the rest
        let passes = self.repositories.iter().map(|repository| {
            let record = records.iter().find(|r| r.name == repository.name);
            let in_use = &in_use;
            async move {
                let record = record.with_context(|| {
                    format!("Registry did not resolve repository {}", repository.name)
                })?;
                self.clean_repository(registry, repository, record, in_use)
                    .await
            }
        });

        join_all(passes)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }

    async fn clean_repository<R: RegistryService>(
        &self,
        registry: &R,
        repository: &RepositoryConfig,
        record: &RepositoryRecord,
        in_use: &InUseSet,
    ) -> anyhow::Result<()> {
        let inventory = registry
            .list_images(&record.name)
            .await
            .with_context(|| format!("Failed to list images of repository {}", record.name))?;
        let total = inventory.len();

        let selection =
            select_for_deletion(inventory, in_use.get(&record.name), repository.max_images);
        if selection.is_empty() {
            info!(
                "Repository {}: {} images, nothing beyond the retention budget of {}",
                record.name, total, repository.max_images
            );
            return Ok(());
        }

        info!(
            "Repository {}: removing {} of {} images",
            record.name,
            selection.len(),
            total
        );
        registry
            .batch_remove_images(&record.name, &selection)
            .await
            .with_context(|| {
                format!(
                    "Failed to remove {} images from repository {}",
                    selection.len(),
                    record.name
                )
            })?;
        Ok(())
    }
}
