use crate::config::Registry;
use crate::secret_string::SecretString;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Certificate, Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use tracing::{debug, info, warn};

static MANIFEST_ACCEPT_HEADER: &str = "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json, application/vnd.oci.image.index.v1+json";

/// Registry-side identity of a repository, resolved once per cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub name: String,
}

/// One digest in a repository inventory. A digest may carry several tags or
/// none at all; `pushed_at` comes from the image config's `created` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetail {
    pub digest: String,
    pub tags: Vec<String>,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Capability surface of the registry as consumed by the cleanup pipeline.
/// Implemented by [`OciRegistryClient`] in production and by hand-rolled
/// mocks in the orchestrator tests.
pub trait RegistryService {
    /// Resolves the given repository names in one batched query. A name
    /// unknown to the registry fails the whole resolution.
    async fn list_repositories(&self, names: &[String]) -> Result<Vec<RepositoryRecord>>;

    /// Returns the full digest inventory of a repository, ordered most
    /// recent first. Callers rely on that order and must not re-sort.
    async fn list_images(&self, repository_name: &str) -> Result<Vec<ImageDetail>>;

    /// Best-effort batched deletion by digest. Failures inside the batch
    /// surface as a single error after every digest has been attempted.
    async fn batch_remove_images(
        &self,
        repository_name: &str,
        images: &[ImageDetail],
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct OciRegistryClient {
    http: Client,
    host: String,
    token: SecretString,
}

#[derive(Deserialize)]
struct Catalog {
    repositories: Vec<String>,
}

#[derive(Deserialize)]
struct TagList {
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ImageManifest {
    // Absent for multi-arch manifest indexes
    config: Option<Descriptor>,
}

#[derive(Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Deserialize)]
struct ImageConfigBlob {
    created: Option<DateTime<Utc>>,
}

impl OciRegistryClient {
    pub fn new(config: &Registry) -> Result<Self> {
        info!("Initializing OCI registry HTTP client for {}", config.host);
        // System certificates are loaded automatically with rustls-tls-native-roots
        let mut client_builder = Client::builder();

        for file_path in &config.ca_certificate_paths {
            let file_content = fs::read(file_path)
                .with_context(|| format!("Failed to read file {}", file_path.display()))?;
            let cert =
                Certificate::from_pem(&file_content).context("Failed to parse certificate")?;
            client_builder = client_builder.add_root_certificate(cert);
        }

        Ok(Self {
            http: client_builder
                .build()
                .context("Failed to build HTTP client")?,
            host: config.host.clone(),
            token: config.token.clone(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Fetching {}", url);
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await
            .with_context(|| format!("Failed to send request to registry {}", self.host))?;

        if !response.status().is_success() {
            bail!(
                "Registry {} returned error status {} for {}",
                self.host,
                response.status(),
                url
            );
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize registry response from {}", url))
    }

    /// Fetches the manifest of one tag: the digest comes from the
    /// Docker-Content-Digest header, the push timestamp from the image
    /// config blob the manifest points at.
    async fn fetch_image_detail(
        &self,
        repository_name: &str,
        tag: &str,
    ) -> Result<(String, Option<DateTime<Utc>>)> {
        let url = format!(
            "https://{}/v2/{}/manifests/{}",
            self.host, repository_name, tag
        );
        debug!("Fetching manifest from URL {}", url);
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, MANIFEST_ACCEPT_HEADER)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await
            .context("Failed to send request to fetch manifest")?;

        if !response.status().is_success() {
            bail!(
                "Registry {} returned error status {} while fetching manifest {}:{}",
                self.host,
                response.status(),
                repository_name,
                tag
            );
        }

        let digest = digest_from_response(&response)?;
        let manifest: ImageManifest = response
            .json()
            .await
            .context("Failed to deserialize image manifest")?;

        let pushed_at = match manifest.config {
            Some(config) => {
                let blob_url = format!(
                    "https://{}/v2/{}/blobs/{}",
                    self.host, repository_name, config.digest
                );
                let blob: ImageConfigBlob = self.get_json(&blob_url).await.with_context(|| {
                    format!("Failed to fetch image config blob for {}:{}", repository_name, tag)
                })?;
                blob.created
            }
            // A manifest index has no single config blob to date it by
            None => None,
        };

        Ok((digest, pushed_at))
    }
}

impl RegistryService for OciRegistryClient {
    async fn list_repositories(&self, names: &[String]) -> Result<Vec<RepositoryRecord>> {
        // A single catalog page; names beyond it fail resolution and abort
        // the run instead of being cleaned blind
        let url = format!("https://{}/v2/_catalog?n=1000", self.host);
        let catalog: Catalog = self
            .get_json(&url)
            .await
            .context("Failed to list registry catalog")?;

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            if !catalog.repositories.iter().any(|r| r == name) {
                bail!("Repository {} does not exist in registry {}", name, self.host);
            }
            records.push(RepositoryRecord { name: name.clone() });
        }

        info!(
            "Resolved {} repositories from registry {}",
            records.len(),
            self.host
        );
        Ok(records)
    }

    async fn list_images(&self, repository_name: &str) -> Result<Vec<ImageDetail>> {
        let url = format!("https://{}/v2/{}/tags/list", self.host, repository_name);
        let tag_list: TagList = self
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to list tags of repository {}", repository_name))?;
        let tags = tag_list.tags.unwrap_or_default();
        debug!("Repository {} has {} tags", repository_name, tags.len());

        // Several tags may point at the same digest; group them so the
        // retention filter sees one entry per image
        let mut by_digest: HashMap<String, ImageDetail> = HashMap::new();
        for tag in tags {
            let (digest, pushed_at) = self
                .fetch_image_detail(repository_name, &tag)
                .await
                .with_context(|| {
                    format!("Failed to fetch manifest for {}:{}", repository_name, tag)
                })?;
            by_digest
                .entry(digest.clone())
                .or_insert_with(|| ImageDetail {
                    digest,
                    tags: Vec::new(),
                    pushed_at,
                })
                .tags
                .push(tag);
        }

        // The tag listing itself is lexicographic; impose the order the
        // retention filter expects: most recent first, undated images last
        let mut images: Vec<ImageDetail> = by_digest.into_values().collect();
        images.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
        Ok(images)
    }

    async fn batch_remove_images(
        &self,
        repository_name: &str,
        images: &[ImageDetail],
    ) -> Result<()> {
        let mut failed: Vec<String> = Vec::new();

        for image in images {
            let url = format!(
                "https://{}/v2/{}/manifests/{}",
                self.host, repository_name, image.digest
            );
            debug!(
                "Deleting manifest {} from repository {}",
                image.digest, repository_name
            );
            let response = match self
                .http
                .delete(&url)
                .header(AUTHORIZATION, self.bearer())
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    warn!("Failed to send delete request for {}: {}", image.digest, err);
                    failed.push(image.digest.clone());
                    continue;
                }
            };

            // A manifest that is already gone counts as deleted
            if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
                warn!(
                    "Registry {} returned status {} while deleting {}",
                    self.host,
                    response.status(),
                    image.digest
                );
                failed.push(image.digest.clone());
            }
        }

        if !failed.is_empty() {
            bail!(
                "Failed to delete {} of {} images from repository {}: {}",
                failed.len(),
                images.len(),
                repository_name,
                failed.join(", ")
            );
        }
        Ok(())
    }
}

fn digest_from_response(response: &Response) -> Result<String> {
    Ok(response
        .headers()
        .get("Docker-Content-Digest")
        .context("Response does not contain HTTP header Docker-Content-Digest")?
        .to_str()
        .context("Received invalid UTF-8 content in Docker-Content-Digest header")?
        .to_owned())
}
