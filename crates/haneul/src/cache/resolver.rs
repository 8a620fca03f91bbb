//! # Checkpoint Resolution
//!
//! A checkpoint is either a local file or an artifact in a remote model
//! store, addressed ``{endpoint}/{repo_id}/resolve/{revision}/{filename}``.
//! Remote artifacts are read through the [`DiskCacheConfig`] cache.

use crate::cache::disk::{DiskCacheConfig, url_to_cache_key, write_atomic};
use crate::errors::{self, HaneulError};
use burn::config::Config;
use burn::data::network::downloader;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

/// Default artifact filename.
pub const DEFAULT_FILENAME: &str = "cloud_model_best.mpk";

/// Default remote model store.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Revision used when none is configured.
pub const DEFAULT_REVISION: &str = "main";

/// Where to find the checkpoint.
#[derive(Config, Debug)]
pub struct ResolverConfig {
    /// A local checkpoint; bypasses the remote store.
    #[config(default = "None")]
    pub local_path: Option<PathBuf>,

    /// Remote repository id, ``owner/name``.
    #[config(default = "None")]
    pub repo_id: Option<String>,

    /// Artifact name within the repository.
    #[config(default = "DEFAULT_FILENAME.to_string()")]
    pub filename: String,

    /// Branch, tag or commit; ``main`` when unset.
    #[config(default = "None")]
    pub revision: Option<String>,

    /// Cache root; ``$HOME/.cache/haneul`` when unset.
    #[config(default = "None")]
    pub cache_dir: Option<PathBuf>,

    /// Remote store base URL.
    #[config(default = "DEFAULT_ENDPOINT.to_string()")]
    pub endpoint: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverConfig {
    /// The configured revision, or ``main``.
    pub fn revision_or_default(&self) -> &str {
        self.revision.as_deref().unwrap_or(DEFAULT_REVISION)
    }

    /// The artifact URL for a repository.
    pub fn artifact_url(
        &self,
        repo_id: &str,
    ) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint.trim_end_matches('/'),
            repo_id,
            self.revision_or_default(),
            self.filename
        )
    }

    /// The cache resource key for a repository artifact.
    ///
    /// ``artifacts/{repo_id with '/' -> '--'}/{revision}/{crc-key}``
    pub fn cache_resource_key(
        &self,
        repo_id: &str,
    ) -> Vec<String> {
        vec![
            "artifacts".to_string(),
            repo_id.replace('/', "--"),
            self.revision_or_default().to_string(),
            url_to_cache_key(&self.artifact_url(repo_id)),
        ]
    }

    /// The disk cache this config points at.
    pub fn disk_cache(&self) -> DiskCacheConfig {
        DiskCacheConfig::new().with_cache_dir(self.cache_dir.clone())
    }
}

/// Remote artifact source.
pub trait ArtifactFetcher {
    /// Fetch the full content at `url`.
    fn fetch(
        &self,
        url: &str,
    ) -> errors::Result<Vec<u8>>;
}

/// Fetches over HTTP with the `burn` downloader.
#[derive(Debug, Default, Clone, Copy)]
pub struct HubFetcher;

impl ArtifactFetcher for HubFetcher {
    fn fetch(
        &self,
        url: &str,
    ) -> errors::Result<Vec<u8>> {
        let name = url.rsplit_once('/').map_or(url, |(_, name)| name);

        // The downloader panics on transport and status errors.
        panic::catch_unwind(AssertUnwindSafe(|| {
            downloader::download_file_as_bytes(url, name)
        }))
        .map_err(|cause| {
            let reason = cause
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| cause.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "download failed".to_string());
            HaneulError::Fetch {
                url: url.to_string(),
                reason,
            }
        })
    }
}

/// Resolve a checkpoint to a local file.
///
/// # Errors
///
/// * [`HaneulError::Configuration`] when ``local_path`` does not exist, or
///   neither ``local_path`` nor ``repo_id`` is set.
/// * [`HaneulError::Fetch`] when the remote fetch fails.
pub fn resolve_checkpoint(
    config: &ResolverConfig,
    fetcher: &dyn ArtifactFetcher,
) -> errors::Result<PathBuf> {
    if let Some(path) = &config.local_path {
        if !path.exists() {
            return Err(HaneulError::Configuration(format!(
                "checkpoint path does not exist: {}",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), "using local checkpoint");
        return Ok(path.clone());
    }

    let repo_id = config.repo_id.as_deref().ok_or_else(|| {
        HaneulError::Configuration(
            "no checkpoint source: set a local model path or a remote repository id".to_string(),
        )
    })?;

    let cache = config.disk_cache();
    let path = cache.ensure_resource_parent_dir(&config.cache_resource_key(repo_id))?;
    if path.exists() {
        tracing::debug!(path = %path.display(), "checkpoint cache hit");
        return Ok(path);
    }

    let url = config.artifact_url(repo_id);
    tracing::info!(%url, "downloading checkpoint");
    let bytes = fetcher.fetch(&url)?;
    write_atomic(&path, &bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "checkpoint cached");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeFetcher {
        fail: bool,
        calls: RefCell<Vec<String>>,
    }

    impl ArtifactFetcher for FakeFetcher {
        fn fetch(
            &self,
            url: &str,
        ) -> errors::Result<Vec<u8>> {
            self.calls.borrow_mut().push(url.to_string());
            if self.fail {
                return Err(HaneulError::Fetch {
                    url: url.to_string(),
                    reason: "404".to_string(),
                });
            }
            Ok(b"weights".to_vec())
        }
    }

    #[test]
    fn test_artifact_url() {
        let config = ResolverConfig::new()
            .with_repo_id(Some("org/clouds".to_string()))
            .with_endpoint("https://hub.example/".to_string());
        assert_eq!(
            config.artifact_url("org/clouds"),
            "https://hub.example/org/clouds/resolve/main/cloud_model_best.mpk"
        );

        let config = config.with_revision(Some("v2".to_string()));
        let key = config.cache_resource_key("org/clouds");
        assert_eq!(key[..3], ["artifacts", "org--clouds", "v2"]);
        assert!(key[3].ends_with("-cloud_model_best.mpk"));
    }

    #[test]
    fn test_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        std::fs::write(&path, b"x").unwrap();

        let fetcher = FakeFetcher::default();
        let config = ResolverConfig::new()
            .with_local_path(Some(path.clone()))
            .with_repo_id(Some("org/clouds".to_string()));
        assert_eq!(resolve_checkpoint(&config, &fetcher).unwrap(), path);
        assert!(fetcher.calls.borrow().is_empty());

        let config = ResolverConfig::new().with_local_path(Some(dir.path().join("absent.mpk")));
        assert!(matches!(
            resolve_checkpoint(&config, &fetcher),
            Err(HaneulError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_repo_id() {
        let fetcher = FakeFetcher::default();
        assert!(matches!(
            resolve_checkpoint(&ResolverConfig::new(), &fetcher),
            Err(HaneulError::Configuration(_))
        ));
    }

    #[test]
    fn test_remote_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default();
        let config = ResolverConfig::new()
            .with_repo_id(Some("org/clouds".to_string()))
            .with_cache_dir(Some(dir.path().to_path_buf()));

        let first = resolve_checkpoint(&config, &fetcher).unwrap();
        let second = resolve_checkpoint(&config, &fetcher).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(dir.path().join("artifacts").join("org--clouds").join("main")));
        assert_eq!(std::fs::read(&first).unwrap(), b"weights");
        assert_eq!(
            *fetcher.calls.borrow(),
            vec!["https://huggingface.co/org/clouds/resolve/main/cloud_model_best.mpk".to_string()]
        );
    }

    #[test]
    fn test_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher {
            fail: true,
            ..Default::default()
        };
        let config = ResolverConfig::new()
            .with_repo_id(Some("org/clouds".to_string()))
            .with_cache_dir(Some(dir.path().to_path_buf()));

        assert!(matches!(
            resolve_checkpoint(&config, &fetcher),
            Err(HaneulError::Fetch { .. })
        ));
        let cached = config
            .disk_cache()
            .resource_to_path(&config.cache_resource_key("org/clouds"))
            .unwrap();
        assert!(!cached.exists());
    }
}
