//! # Disk Cache Policy

use crate::errors::{self, HaneulError};
use burn::config::Config;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const X25: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Disk cache location.
#[derive(Config, Debug)]
pub struct DiskCacheConfig {
    /// Key for the root cache directory, under ``$HOME/.cache``.
    #[config(default = "\"haneul\".to_string()")]
    pub root_cache_key: String,

    /// Explicit cache root; overrides ``root_cache_key``.
    #[config(default = "None")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskCacheConfig {
    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, does not create it.
    pub fn base_cache_dir(&self) -> errors::Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir().ok_or_else(|| {
            HaneulError::Configuration("cannot locate a home directory for the cache".to_string())
        })?;
        Ok(home.join(".cache").join(&self.root_cache_key))
    }

    /// Map a resource key to a cache path.
    ///
    /// Does not ensure that the path (or any of the parents) exist.
    pub fn resource_to_path(
        &self,
        resource_key: &[String],
    ) -> errors::Result<PathBuf> {
        let path = self.base_cache_dir()?;
        Ok(resource_key.iter().fold(path, |acc, s| acc.join(s)))
    }

    /// Map a resource key to a cache path and ensure the parent directory exists.
    pub fn ensure_resource_parent_dir(
        &self,
        resource_key: &[String],
    ) -> errors::Result<PathBuf> {
        let path = self.resource_to_path(resource_key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

/// Build a cache key (bare cache file name) from a URL.
///
/// The key is ``{url crc hash}-{url basename}``.
pub fn url_to_cache_key(url: &str) -> String {
    let hash = X25.checksum(url.as_bytes());
    let base_name = url.rsplit_once('/').map_or(url, |(_, name)| name);
    format!("{hash}-{base_name}")
}

/// Write `bytes` to `path` through a process-unique temporary sibling.
///
/// The final rename is atomic, so concurrent writers of the same content
/// leave one complete file behind.
pub fn write_atomic(
    path: &Path,
    bytes: &[u8],
) -> errors::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            HaneulError::Configuration(format!("not a file path: {}", path.display()))
        })?;
    let tmp_path = path.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| -> errors::Result<()> {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
