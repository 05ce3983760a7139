use crate::cleanup::CleanupTask;
use crate::kube_workloads::KubeWorkloadSource;
use crate::state::CleanupContext;
use std::env;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

mod cleanup;
mod config;
mod image_reference;
mod in_use;
mod kube_workloads;
mod oci_registry;
mod retention;
mod secret_string;
mod state;
mod webserver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting kube-registry-gc {}", env!("CARGO_PKG_VERSION"));

    let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_string());
    let config = config::load_config(&config_path)?;
    let webserver_port = config.webserver.port;
    let cron_schedule = config.cron_schedule.clone();

    info!("Initializing K8s client");
    let kube_client = kube_workloads::create_client().await?;
    let registry_client = oci_registry::OciRegistryClient::new(&config.registry)?;

    let ctx = CleanupContext {
        kube_client,
        registry_client,
        config,
    };

    info!("Executing cleanup job at cron schedule {}", cron_schedule);
    let scheduler = JobScheduler::new().await?;

    // Add a job scheduled to run one cleanup pass per tick
    let job = Job::new_async(cron_schedule, move |_uuid, _l| {
        let ctx = ctx.clone();
        Box::pin(async move {
            info!("Starting scheduled registry cleanup pass");
            let task = CleanupTask {
                namespaces: ctx.config.namespaces.clone(),
                repositories: ctx.config.repositories.clone(),
            };
            let workloads = KubeWorkloadSource::new(ctx.kube_client.clone());

            let errors = task
                .remove_old_images(&workloads, &ctx.registry_client)
                .await;
            if errors.is_empty() {
                info!("Cleanup pass finished without errors");
            } else {
                for err in &errors {
                    error!("Cleanup error: {:?}", err);
                }
                error!("Cleanup pass finished with {} errors", errors.len());
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;

    let app = webserver::create_app();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], webserver_port));
    info!("Starting webserver on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
