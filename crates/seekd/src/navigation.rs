use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use seekcore_index::{is_root, DirectoryListing, Disk, Entry, ROOT_PATH};
use seekcore_shell::SharedDirectoryService;

use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Drives,
    Files,
    SearchResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub current_path: String,
    pub history: Vec<String>,
    pub view_mode: ViewMode,
    pub is_loading: bool,
    pub devices: Vec<Disk>,
    pub listing: DirectoryListing,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_path: ROOT_PATH.to_string(),
            history: Vec::new(),
            view_mode: ViewMode::Drives,
            is_loading: true,
            devices: Vec::new(),
            listing: DirectoryListing::default(),
        }
    }
}

/// What a successful load does to the history stack.
#[derive(Debug, Clone)]
enum HistoryStep {
    Keep,
    Push(String),
    Pop,
}

enum Loaded {
    Devices(Vec<Disk>),
    Listing(DirectoryListing),
}

struct Inner {
    state: NavigationState,
    latest_request: u64,
}

type RootResetHook = Box<dyn Fn() + Send + Sync>;

/// Owns the current path, view mode and back-history. Loads may overlap;
/// only the most recently issued one is applied.
pub struct NavigationController {
    directory: SharedDirectoryService,
    inner: Mutex<Inner>,
    on_root_reset: Option<RootResetHook>,
}

impl NavigationController {
    pub fn new(directory: SharedDirectoryService) -> Self {
        Self {
            directory,
            inner: Mutex::new(Inner {
                state: NavigationState::default(),
                latest_request: 0,
            }),
            on_root_reset: None,
        }
    }

    /// Registers a callback run after every successful load of the root.
    pub fn with_root_reset<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_root_reset = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> NavigationState {
        self.inner.lock().state.clone()
    }

    pub fn current_path(&self) -> String {
        self.inner.lock().state.current_path.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.inner.lock().state.history.clone()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.inner.lock().state.view_mode
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.is_loading
    }

    pub fn listing(&self) -> DirectoryListing {
        self.inner.lock().state.listing.clone()
    }

    pub fn devices(&self) -> Vec<Disk> {
        self.inner.lock().state.devices.clone()
    }

    pub async fn load_path(
        &self,
        path: &str,
        use_cache: bool,
    ) -> Result<ViewMode, ControllerError> {
        self.load(path, use_cache, HistoryStep::Keep).await
    }

    /// Navigates forward. Re-submitting the current path refreshes it.
    pub async fn navigate_to(&self, path: &str) -> Result<ViewMode, ControllerError> {
        let current = self.current_path();
        if path == current {
            return self.refresh().await;
        }
        self.load(path, true, HistoryStep::Push(current)).await
    }

    pub async fn go_back(&self) -> Result<ViewMode, ControllerError> {
        let (target, view_mode) = {
            let inner = self.inner.lock();
            (inner.state.history.last().cloned(), inner.state.view_mode)
        };

        match target {
            Some(previous) => self.load(&previous, true, HistoryStep::Pop).await,
            None if view_mode == ViewMode::Drives => Ok(ViewMode::Drives),
            None => self.load(ROOT_PATH, true, HistoryStep::Keep).await,
        }
    }

    pub async fn refresh(&self) -> Result<ViewMode, ControllerError> {
        let (path, view_mode) = {
            let inner = self.inner.lock();
            (inner.state.current_path.clone(), inner.state.view_mode)
        };

        match view_mode {
            ViewMode::Drives => self.load(ROOT_PATH, false, HistoryStep::Keep).await,
            ViewMode::Files | ViewMode::SearchResults => {
                self.load(&path, false, HistoryStep::Keep).await
            }
        }
    }

    /// Creates an empty file or directory in the directory in view.
    pub async fn create_entry(&self, name: &str, is_dir: bool) -> Result<Entry, ControllerError> {
        let parent = self.current_path();
        let entry = self
            .directory
            .create_entry(&parent, name, is_dir)
            .await
            .map_err(|err| ControllerError::mutation(&parent, err))?;
        self.reload_after_mutation().await?;
        Ok(entry)
    }

    pub async fn rename_entry(
        &self,
        path: &str,
        new_name: &str,
    ) -> Result<Entry, ControllerError> {
        self.ensure_not_in_view(path)?;
        let entry = self
            .directory
            .rename_entry(path, new_name)
            .await
            .map_err(|err| ControllerError::mutation(path, err))?;
        self.reload_after_mutation().await?;
        Ok(entry)
    }

    pub async fn delete_entry(&self, path: &str) -> Result<(), ControllerError> {
        self.ensure_not_in_view(path)?;
        self.directory
            .delete_entry(path)
            .await
            .map_err(|err| ControllerError::mutation(path, err))?;
        self.reload_after_mutation().await
    }

    fn ensure_not_in_view(&self, path: &str) -> Result<(), ControllerError> {
        if is_root(path) || path == self.current_path() {
            return Err(ControllerError::MutationFailed {
                path: path.to_string(),
                reason: "the directory in view cannot be changed".to_string(),
            });
        }
        Ok(())
    }

    /// Reloads the listing in view. Search results are left alone.
    async fn reload_after_mutation(&self) -> Result<(), ControllerError> {
        if self.view_mode() != ViewMode::Files {
            return Ok(());
        }
        match self.refresh().await {
            Ok(_) | Err(ControllerError::Superseded) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Switches to the search results view, keeping path and history.
    /// Loads still in flight are superseded.
    pub fn enter_search_results(&self) {
        let mut inner = self.inner.lock();
        inner.latest_request += 1;
        inner.state.view_mode = ViewMode::SearchResults;
        inner.state.is_loading = false;
    }

    async fn load(
        &self,
        path: &str,
        use_cache: bool,
        step: HistoryStep,
    ) -> Result<ViewMode, ControllerError> {
        let request = {
            let mut inner = self.inner.lock();
            inner.latest_request += 1;
            inner.state.is_loading = true;
            inner.latest_request
        };
        tracing::debug!(request, path, use_cache, "loading");

        let outcome = if is_root(path) {
            self.directory.list_devices().await.map(Loaded::Devices)
        } else {
            self.directory
                .list_directory(path, use_cache)
                .await
                .map(Loaded::Listing)
        };

        let view_mode = {
            let mut inner = self.inner.lock();
            if inner.latest_request != request {
                tracing::debug!(request, path, "discarding stale load");
                return Err(ControllerError::Superseded);
            }
            inner.state.is_loading = false;

            let loaded = match outcome {
                Ok(loaded) => loaded,
                Err(err) => {
                    tracing::warn!(path, error = %err, "load failed");
                    return Err(ControllerError::unreadable(path, err));
                }
            };
            apply(&mut inner.state, loaded, step)
        };

        if view_mode == ViewMode::Drives {
            if let Some(hook) = &self.on_root_reset {
                hook();
            }
        }
        Ok(view_mode)
    }
}

fn apply(state: &mut NavigationState, loaded: Loaded, step: HistoryStep) -> ViewMode {
    match loaded {
        Loaded::Devices(devices) => {
            state.devices = devices;
            state.listing = DirectoryListing::default();
            state.history.clear();
            state.current_path = ROOT_PATH.to_string();
            state.view_mode = ViewMode::Drives;
        }
        Loaded::Listing(listing) => {
            match step {
                HistoryStep::Keep => {}
                HistoryStep::Push(previous) => {
                    let already_top = state.history.last() == Some(&previous);
                    if !already_top && previous != listing.path {
                        state.history.push(previous);
                    }
                }
                HistoryStep::Pop => {
                    state.history.pop();
                }
            }
            // The top entry never equals the path in view.
            if state.history.last() == Some(&listing.path) {
                state.history.pop();
            }

            state.current_path = listing.path.clone();
            state.listing = listing;
            state.devices.clear();
            state.view_mode = ViewMode::Files;
        }
    }
    state.view_mode
}
