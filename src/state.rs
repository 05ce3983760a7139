use crate::config::Config;
use crate::oci_registry::OciRegistryClient;

/// Everything one scheduled cleanup tick needs; cloned into the cron job
/// closure per run.
#[derive(Clone)]
pub struct CleanupContext {
    pub(crate) kube_client: kube::Client,
    pub(crate) registry_client: OciRegistryClient,
    pub(crate) config: Config,
}
