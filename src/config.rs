use crate::secret_string::SecretString;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::{env, fs, path::Path};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub webserver: Webserver,
    #[serde(rename = "cronSchedule", default = "default_cron_schedule")]
    pub cron_schedule: String,
    pub registry: Registry,
    pub namespaces: Vec<String>,
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    pub host: String,
    pub token: SecretString,
    #[serde(default, rename = "caCertificatePaths")]
    pub ca_certificate_paths: Vec<PathBuf>,
}

/// One registry repository to clean, with its retention budget: the maximum
/// number of images without an in-use tag to keep around. Negative budgets
/// are unrepresentable, the type rejects them at configuration time.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(rename = "maxImages")]
    pub max_images: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Webserver {
    pub port: u16,
}

fn default_cron_schedule() -> String {
    // Daily at 03:00
    "0 0 3 * * *".to_string()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&yaml_str)?;

    let config = serde_yaml_ng::from_str(&expanded)
        .context("Failed to parse YAML config after environment variable expansion")?;

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error if any env var is missing or regex fails.
fn expand_env_vars(input: &str) -> Result<String> {
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| panic!("Missing environment variable: {}", var_name))
    });

    Ok(result.into_owned())
}
