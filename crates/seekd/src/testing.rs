//! Hand-written service doubles shared by the controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use seekcore_events::EventBus;
use seekcore_index::{DirectoryListing, Disk, Entry, RawEntry};
use seekcore_query::{SearchRequest, SearchStreamEvent};
use seekcore_shell::{DirectoryService, SearchService, ServiceError};
use tokio::sync::Notify;

pub(crate) const CHANNEL: &str = "search_stream";

pub(crate) fn raw_entry(name: &str) -> RawEntry {
    RawEntry::from(Entry {
        path: format!("/srv/{name}"),
        name: name.to_string(),
        is_dir: false,
        size: 2 << 20,
        modified_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    })
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

fn dir_entry(path: &str) -> Entry {
    Entry {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        is_dir: true,
        size: 0,
        modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[derive(Default)]
pub(crate) struct StubDirectory {
    listings: Mutex<HashMap<String, DirectoryListing>>,
    aliases: Mutex<HashMap<String, String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<(String, bool)>>,
    device_calls: AtomicUsize,
}

impl StubDirectory {
    /// Every path becomes a listable directory whose sub-directories are the
    /// other given paths directly below it.
    pub(crate) fn with_dirs(paths: &[&str]) -> Arc<Self> {
        let stub = Self::default();
        {
            let mut listings = stub.listings.lock();
            for path in paths {
                let prefix = format!("{path}/");
                let sub_dirs = paths
                    .iter()
                    .filter(|other| {
                        other
                            .strip_prefix(&prefix)
                            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
                    })
                    .map(|other| dir_entry(other))
                    .collect();
                listings.insert(
                    path.to_string(),
                    DirectoryListing {
                        path: path.to_string(),
                        sub_dirs,
                        files: Vec::new(),
                    },
                );
            }
        }
        Arc::new(stub)
    }

    pub(crate) fn remove(&self, path: &str) {
        self.listings.lock().remove(path);
    }

    /// Requests for `from` resolve to the listing of `to`.
    pub(crate) fn alias(&self, from: &str, to: &str) {
        self.aliases.lock().insert(from.to_string(), to.to_string());
    }

    /// Holds loads of `path` until the returned notify fires.
    pub(crate) fn gate(&self, path: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().insert(path.to_string(), notify.clone());
        notify
    }

    pub(crate) fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().clone()
    }

    pub(crate) fn device_calls(&self) -> usize {
        self.device_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryService for StubDirectory {
    async fn list_devices(&self) -> Result<Vec<Disk>, ServiceError> {
        self.device_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Disk::new("/dev/sda1", "/", "ext4", 1000, 250)])
    }

    async fn list_directory(
        &self,
        path: &str,
        use_cache: bool,
    ) -> Result<DirectoryListing, ServiceError> {
        self.calls.lock().push((path.to_string(), use_cache));

        let gate = self.gates.lock().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let target = self
            .aliases
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_else(|| path.to_string());
        self.listings
            .lock()
            .get(&target)
            .cloned()
            .ok_or_else(|| ServiceError::DirectoryUnreadable {
                path: path.to_string(),
                reason: "permission denied".to_string(),
            })
    }

    async fn create_entry(
        &self,
        parent: &str,
        name: &str,
        is_dir: bool,
    ) -> Result<Entry, ServiceError> {
        let mut listings = self.listings.lock();
        let path = format!("{parent}/{name}");
        let listing = listings
            .get_mut(parent)
            .ok_or_else(|| ServiceError::MutationFailed {
                path: path.clone(),
                reason: "no such directory".to_string(),
            })?;

        let entry = Entry {
            is_dir,
            size: 0,
            ..dir_entry(&path)
        };
        if is_dir {
            listing.sub_dirs.push(entry.clone());
        } else {
            listing.files.push(entry.clone());
        }
        Ok(entry)
    }

    async fn rename_entry(&self, path: &str, new_name: &str) -> Result<Entry, ServiceError> {
        let mut listings = self.listings.lock();
        let entry = listings
            .get_mut(parent_of(path))
            .and_then(|listing| {
                listing
                    .sub_dirs
                    .iter_mut()
                    .chain(listing.files.iter_mut())
                    .find(|entry| entry.path == path)
            })
            .ok_or_else(|| ServiceError::MutationFailed {
                path: path.to_string(),
                reason: "no such entry".to_string(),
            })?;

        entry.path = format!("{}/{new_name}", parent_of(path));
        entry.name = new_name.to_string();
        Ok(entry.clone())
    }

    async fn delete_entry(&self, path: &str) -> Result<(), ServiceError> {
        let mut listings = self.listings.lock();
        let listing = listings.get_mut(parent_of(path));
        let removed = listing.is_some_and(|listing| {
            let before = listing.sub_dirs.len() + listing.files.len();
            listing.sub_dirs.retain(|entry| entry.path != path);
            listing.files.retain(|entry| entry.path != path);
            listing.sub_dirs.len() + listing.files.len() < before
        });
        if !removed {
            return Err(ServiceError::MutationFailed {
                path: path.to_string(),
                reason: "no such entry".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) struct StubSearch {
    bus: EventBus<SearchStreamEvent>,
    requests: Mutex<Vec<SearchRequest>>,
    failure: Mutex<Option<String>>,
    echo: Mutex<Vec<String>>,
    llm_calls: AtomicUsize,
}

impl StubSearch {
    pub(crate) fn new(bus: EventBus<SearchStreamEvent>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            requests: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            echo: Mutex::new(Vec::new()),
            llm_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_next(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    /// Makes the next stream publish these items and the sentinel before the
    /// start call returns.
    pub(crate) fn echo_items(&self, names: &[&str]) {
        *self.echo.lock() = names.iter().map(|name| name.to_string()).collect();
    }

    pub(crate) fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn llm_calls(&self) -> usize {
        self.llm_calls.load(Ordering::SeqCst)
    }

    fn open(&self, request: SearchRequest) -> Result<(), ServiceError> {
        let request_id = request.request_id;
        self.requests.lock().push(request);
        if let Some(reason) = self.failure.lock().take() {
            return Err(ServiceError::Backend(reason));
        }

        let echo = std::mem::take(&mut *self.echo.lock());
        if !echo.is_empty() {
            for name in echo {
                self.bus
                    .publish(CHANNEL, SearchStreamEvent::item(request_id, raw_entry(&name)));
            }
            self.bus.publish(CHANNEL, SearchStreamEvent::end(request_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchService for StubSearch {
    async fn start_stream(&self, request: SearchRequest) -> Result<(), ServiceError> {
        self.open(request)
    }

    async fn start_llm_stream(&self, request: SearchRequest) -> Result<(), ServiceError> {
        self.llm_calls.fetch_add(1, Ordering::SeqCst);
        self.open(request)
    }
}
