use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::{debug, info};

/// Source of running workloads. Implemented by [`KubeWorkloadSource`] in
/// production and by hand-rolled mocks in the orchestrator tests.
pub trait WorkloadSource {
    /// Lists every pod in the given namespaces in one pass. A failing list
    /// call fails the whole query, partial results are never returned.
    async fn list_all_pods(&self, namespaces: &[String]) -> Result<Vec<Pod>>;
}

pub async fn create_client() -> Result<Client> {
    let client = Client::try_default().await?;
    let api_server_info = client.apiserver_version().await?;
    info!(
        "Connected to namespace {}, in-cluster Kubernetes API server with version {}.{}",
        client.default_namespace(),
        api_server_info.major,
        api_server_info.minor
    );
    Ok(client)
}

pub struct KubeWorkloadSource {
    client: Client,
}

impl KubeWorkloadSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl WorkloadSource for KubeWorkloadSource {
    async fn list_all_pods(&self, namespaces: &[String]) -> Result<Vec<Pod>> {
        let lp = ListParams::default();
        let mut pods = Vec::new();

        for namespace in namespaces {
            let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
            let pod_list = api
                .list(&lp)
                .await
                .with_context(|| format!("Failed to list pods in namespace {}", namespace))?;
            debug!(
                "Found {} pods in namespace {}",
                pod_list.items.len(),
                namespace
            );
            pods.extend(pod_list.items);
        }

        info!(
            "Found {} pods across {} namespaces",
            pods.len(),
            namespaces.len()
        );
        Ok(pods)
    }
}
