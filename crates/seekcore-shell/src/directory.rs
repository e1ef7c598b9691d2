use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use seekcore_config::Settings;
use seekcore_index::{is_root, DirectoryListing, Disk, Entry};
use sysinfo::Disks;

use crate::{DirectoryService, ServiceError};

/// Directory backend over the local filesystem with a TTL-bounded listing
/// cache keyed by canonical path.
#[derive(Clone)]
pub struct LocalDirectoryService {
    listings: Cache<String, DirectoryListing>,
}

impl LocalDirectoryService {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let listings = Cache::builder()
            .max_capacity(capacity.max(1))
            .time_to_live(ttl)
            .build();
        Self { listings }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Duration::from_secs(settings.listing_cache_ttl_secs),
            settings.listing_cache_capacity,
        )
    }

    pub fn invalidate(&self, path: &str) {
        self.listings.invalidate(path);
    }

    /// Drops the cached listing of `path` under both the given and the
    /// canonical key.
    async fn forget(&self, path: &Path) {
        self.invalidate(&path.to_string_lossy());
        if let Ok(canonical) = tokio::fs::canonicalize(path).await {
            self.invalidate(&canonical.to_string_lossy());
        }
    }

    async fn forget_parent(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.forget(parent).await;
        }
    }

    async fn describe(path: &Path) -> Result<Entry, ServiceError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|err| ServiceError::mutation(&path.to_string_lossy(), err))?;
        Ok(entry_from_metadata(path, &metadata))
    }

    async fn read_listing(path: &str) -> Result<DirectoryListing, ServiceError> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(|err| ServiceError::unreadable(path, err))?;
        let normalized = canonical.to_string_lossy().to_string();

        let mut reader = tokio::fs::read_dir(&canonical)
            .await
            .map_err(|err| ServiceError::unreadable(&normalized, err))?;

        let mut listing = DirectoryListing {
            path: normalized.clone(),
            ..DirectoryListing::default()
        };
        loop {
            let next = reader
                .next_entry()
                .await
                .map_err(|err| ServiceError::unreadable(&normalized, err))?;
            let Some(dir_entry) = next else {
                break;
            };

            // Broken symlinks and entries removed mid-read are skipped.
            let metadata = match tokio::fs::metadata(dir_entry.path()).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(path = %dir_entry.path().display(), %err, "skipping entry");
                    continue;
                }
            };

            let entry = entry_from_metadata(&dir_entry.path(), &metadata);
            if entry.is_dir {
                listing.sub_dirs.push(entry);
            } else {
                listing.files.push(entry);
            }
        }

        listing.sub_dirs.sort_by_key(|entry| entry.name.to_lowercase());
        listing.files.sort_by_key(|entry| entry.name.to_lowercase());
        Ok(listing)
    }
}

impl Default for LocalDirectoryService {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn validate_name(name: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ServiceError::InvalidRequest(format!("invalid entry name `{name}`")));
    }
    Ok(())
}

pub(crate) fn entry_from_metadata(path: &Path, metadata: &std::fs::Metadata) -> Entry {
    let modified_at = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Entry {
        path: path.to_string_lossy().to_string(),
        name: path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
        is_dir: metadata.is_dir(),
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        modified_at,
    }
}

#[async_trait]
impl DirectoryService for LocalDirectoryService {
    async fn list_devices(&self) -> Result<Vec<Disk>, ServiceError> {
        let disks = tokio::task::spawn_blocking(|| {
            Disks::new_with_refreshed_list()
                .list()
                .iter()
                .map(|disk| {
                    Disk::new(
                        disk.name().to_string_lossy(),
                        disk.mount_point().to_string_lossy(),
                        disk.file_system().to_string_lossy(),
                        disk.total_space(),
                        disk.available_space(),
                    )
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|err| ServiceError::Backend(err.to_string()))?;

        tracing::debug!(count = disks.len(), "listed devices");
        Ok(disks)
    }

    async fn list_directory(
        &self,
        path: &str,
        use_cache: bool,
    ) -> Result<DirectoryListing, ServiceError> {
        if use_cache {
            if let Some(listing) = self.listings.get(path) {
                tracing::debug!(path, "listing cache hit");
                return Ok(listing);
            }
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|err| ServiceError::unreadable(path, err))?;
        if !metadata.is_dir() {
            return Err(ServiceError::unreadable(path, "not a directory"));
        }

        let listing = Self::read_listing(path).await?;
        self.listings.insert(path.to_string(), listing.clone());
        if listing.path != path {
            self.listings.insert(listing.path.clone(), listing.clone());
        }
        Ok(listing)
    }

    async fn create_entry(
        &self,
        parent: &str,
        name: &str,
        is_dir: bool,
    ) -> Result<Entry, ServiceError> {
        if is_root(parent) {
            return Err(ServiceError::InvalidRequest(
                "entries cannot be created in the device list".to_string(),
            ));
        }
        validate_name(name)?;

        let target = Path::new(parent).join(name);
        let created = if is_dir {
            tokio::fs::create_dir(&target).await
        } else {
            tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
                .map(drop)
        };
        created.map_err(|err| ServiceError::mutation(&target.to_string_lossy(), err))?;
        self.forget_parent(&target).await;

        tracing::info!(path = %target.display(), is_dir, "entry created");
        Self::describe(&target).await
    }

    async fn rename_entry(&self, path: &str, new_name: &str) -> Result<Entry, ServiceError> {
        validate_name(new_name)?;
        let source = Path::new(path);
        let Some(parent) = source.parent().filter(|_| !is_root(path)) else {
            return Err(ServiceError::InvalidRequest(format!("cannot rename `{path}`")));
        };

        let target = parent.join(new_name);
        if tokio::fs::symlink_metadata(&target).await.is_ok() {
            return Err(ServiceError::mutation(
                &target.to_string_lossy(),
                "an entry with that name already exists",
            ));
        }

        self.forget(source).await;
        tokio::fs::rename(source, &target)
            .await
            .map_err(|err| ServiceError::mutation(path, err))?;
        self.forget_parent(&target).await;

        tracing::info!(from = path, to = %target.display(), "entry renamed");
        Self::describe(&target).await
    }

    async fn delete_entry(&self, path: &str) -> Result<(), ServiceError> {
        if is_root(path) {
            return Err(ServiceError::InvalidRequest(
                "the device list cannot be deleted".to_string(),
            ));
        }
        let target = Path::new(path);
        let metadata = tokio::fs::symlink_metadata(target)
            .await
            .map_err(|err| ServiceError::mutation(path, err))?;

        self.forget(target).await;
        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir(target).await
        } else {
            tokio::fs::remove_file(target).await
        };
        removed.map_err(|err| ServiceError::mutation(path, err))?;
        self.forget_parent(target).await;

        tracing::info!(path, "entry deleted");
        Ok(())
    }
}
