use std::sync::Arc;

use parking_lot::Mutex;
use seekcore_config::Settings;
use seekcore_events::EventBus;
use seekcore_index::DirectoryListing;
use seekcore_query::{Filter, FilterId, FilterSet, SearchMode, SearchStreamEvent};
use seekcore_shell::{SharedDirectoryService, SharedSearchService};

use crate::error::ControllerError;
use crate::navigation::{NavigationController, ViewMode};
use crate::session::{SearchSessionController, SessionToken};

/// Where a toolbar submission should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Navigate(String),
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    Navigated(ViewMode),
    Searching(SessionToken),
}

/// Unix `/..`, UNC `\\..`, or a drive letter followed by `:\` or `:/`.
pub fn is_absolute_path(input: &str) -> bool {
    if input.starts_with('/') || input.starts_with("\\\\") {
        return true;
    }
    let bytes = input.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/')
}

/// Classifies trimmed toolbar input against the current history and listing.
pub fn classify(input: &str, history: &[String], listing: &DirectoryListing) -> Intent {
    let input = input.trim();
    if input.is_empty() {
        return Intent::Navigate(String::new());
    }
    if is_absolute_path(input) || history.iter().any(|path| path == input) {
        return Intent::Navigate(input.to_string());
    }
    if let Some(dir) = listing.find_sub_dir(input) {
        return Intent::Navigate(dir.path.clone());
    }
    Intent::Search(input.to_string())
}

/// Ties navigation, the filter set and search sessions to one entry surface.
pub struct Explorer {
    navigation: NavigationController,
    session: Arc<SearchSessionController>,
    filters: Arc<Mutex<FilterSet>>,
    mode: Mutex<SearchMode>,
}

impl Explorer {
    pub fn new(
        directory: SharedDirectoryService,
        search: SharedSearchService,
        bus: EventBus<SearchStreamEvent>,
        channel: impl Into<String>,
    ) -> Self {
        let filters = Arc::new(Mutex::new(FilterSet::new()));
        let reset = Arc::clone(&filters);
        let navigation = NavigationController::new(directory).with_root_reset(move || {
            let mut filters = reset.lock();
            if !filters.is_empty() {
                tracing::debug!(cleared = filters.len(), "clearing filters at root");
                filters.clear();
            }
        });

        Self {
            navigation,
            session: Arc::new(SearchSessionController::new(search, bus, channel)),
            filters,
            mode: Mutex::new(SearchMode::Standard),
        }
    }

    pub fn from_settings(
        directory: SharedDirectoryService,
        search: SharedSearchService,
        bus: EventBus<SearchStreamEvent>,
        settings: &Settings,
    ) -> Self {
        Self::new(directory, search, bus, settings.stream_channel.clone())
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    pub fn session(&self) -> &Arc<SearchSessionController> {
        &self.session
    }

    pub fn add_filter(&self, filter: Filter) -> Result<FilterId, ControllerError> {
        let id = self.filters.lock().add(filter)?;
        Ok(id)
    }

    pub fn remove_filter(&self, id: FilterId) -> bool {
        self.filters.lock().remove(id)
    }

    pub fn clear_filters(&self) {
        self.filters.lock().clear();
    }

    pub fn filters(&self) -> Vec<(FilterId, Filter)> {
        self.filters
            .lock()
            .iter()
            .map(|(id, filter)| (id, filter.clone()))
            .collect()
    }

    pub fn search_mode(&self) -> SearchMode {
        *self.mode.lock()
    }

    pub fn set_llm(&self, enabled: bool) {
        *self.mode.lock() = SearchMode::from_llm_flag(enabled);
    }

    pub async fn start(&self) -> Result<ViewMode, ControllerError> {
        self.navigation.load_path("", true).await
    }

    pub async fn submit(&self, input: &str) -> Result<Submitted, ControllerError> {
        let state = self.navigation.state();
        match classify(input, &state.history, &state.listing) {
            Intent::Navigate(path) => self
                .navigation
                .navigate_to(&path)
                .await
                .map(Submitted::Navigated),
            Intent::Search(text) => self.search(&text).await.map(Submitted::Searching),
        }
    }

    /// Searches the current directory with the active filters and mode.
    pub async fn search(&self, free_text: &str) -> Result<SessionToken, ControllerError> {
        let filters = self.filters.lock().clone();
        let current_path = self.navigation.current_path();
        let is_llm = self.search_mode().is_llm();

        self.navigation.enter_search_results();
        self.session
            .start(free_text, is_llm, &filters, &current_path)
            .await
    }

    pub fn cancel_search(&self) -> bool {
        self.session.cancel()
    }

    pub async fn go_back(&self) -> Result<ViewMode, ControllerError> {
        self.navigation.go_back().await
    }

    pub async fn refresh(&self) -> Result<ViewMode, ControllerError> {
        self.navigation.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use seekcore_query::{SizeOperator, SizeUnit};

    use super::*;
    use crate::session::SessionPhase;
    use crate::testing::{StubDirectory, StubSearch, CHANNEL};

    fn explorer(dirs: &[&str]) -> (Explorer, Arc<StubDirectory>, Arc<StubSearch>) {
        let bus = EventBus::new();
        let directory = StubDirectory::with_dirs(dirs);
        let search = StubSearch::new(bus.clone());
        let explorer = Explorer::new(directory.clone(), search.clone(), bus, CHANNEL);
        (explorer, directory, search)
    }

    #[test]
    fn absolute_path_forms() {
        assert!(is_absolute_path("/home/u"));
        assert!(is_absolute_path("C:\\Users"));
        assert!(is_absolute_path("d:/data"));
        assert!(is_absolute_path("\\\\server\\share"));
        assert!(!is_absolute_path("C:"));
        assert!(!is_absolute_path("docs"));
        assert!(!is_absolute_path("report.pdf"));
    }

    #[test]
    fn classification_order() {
        let listing = DirectoryListing {
            path: "/home/u".into(),
            sub_dirs: vec![seekcore_index::Entry {
                path: "/home/u/Docs".into(),
                name: "Docs".into(),
                is_dir: true,
                size: 0,
                modified_at: chrono::Utc::now(),
            }],
            files: Vec::new(),
        };
        let history = vec!["projects".to_string()];

        assert_eq!(classify("  ", &history, &listing), Intent::Navigate(String::new()));
        assert_eq!(classify("/etc", &history, &listing), Intent::Navigate("/etc".into()));
        assert_eq!(
            classify("projects", &history, &listing),
            Intent::Navigate("projects".into())
        );
        assert_eq!(
            classify("docs", &history, &listing),
            Intent::Navigate("/home/u/Docs".into())
        );
        assert_eq!(classify("budget", &history, &listing), Intent::Search("budget".into()));
    }

    #[tokio::test]
    async fn submit_routes_paths_and_subdirs() {
        let (explorer, _dir, search) = explorer(&["/home/u", "/home/u/docs"]);
        explorer.start().await.unwrap();

        assert_eq!(
            explorer.submit("/home/u").await,
            Ok(Submitted::Navigated(ViewMode::Files))
        );
        assert_eq!(
            explorer.submit("DOCS").await,
            Ok(Submitted::Navigated(ViewMode::Files))
        );
        assert_eq!(explorer.navigation().current_path(), "/home/u/docs");
        assert_eq!(explorer.navigation().history(), vec!["", "/home/u"]);
        assert!(search.requests().is_empty());
    }

    #[tokio::test]
    async fn submit_searches_with_filters() {
        let (explorer, _dir, search) = explorer(&["/home/u"]);
        explorer.navigation().load_path("/home/u", true).await.unwrap();
        explorer
            .add_filter(Filter::size(SizeOperator::Greater, 1.0, SizeUnit::Mb))
            .unwrap();

        let submitted = explorer.submit("report").await.unwrap();
        assert!(matches!(submitted, Submitted::Searching(_)));
        assert_eq!(explorer.navigation().view_mode(), ViewMode::SearchResults);
        assert_eq!(explorer.navigation().current_path(), "/home/u");

        let request = &search.requests()[0];
        assert_eq!(request.payload.query, "report size:>1MB");
        assert_eq!(request.payload.current_path, "/home/u");
    }

    #[tokio::test]
    async fn duplicate_filter_is_reported() {
        let (explorer, _dir, _search) = explorer(&[]);
        explorer.add_filter(Filter::file_type("pdf")).unwrap();

        let err = explorer.add_filter(Filter::file_type("PDF")).unwrap_err();
        assert!(matches!(err, ControllerError::DuplicateFilter(_)));
        assert_eq!(explorer.filters().len(), 1);
    }

    #[tokio::test]
    async fn root_navigation_clears_filters() {
        let (explorer, _dir, _search) = explorer(&["/a"]);
        explorer.navigation().load_path("/a", true).await.unwrap();
        explorer.add_filter(Filter::file_type("rs")).unwrap();

        explorer.submit("").await.unwrap();
        assert!(explorer.filters().is_empty());
        assert_eq!(explorer.navigation().view_mode(), ViewMode::Drives);
    }

    #[tokio::test]
    async fn back_from_search_results_returns_to_listing() {
        let (explorer, _dir, _search) = explorer(&["/a", "/a/b"]);
        explorer.navigation().load_path("/a", true).await.unwrap();
        explorer.navigation().navigate_to("/a/b").await.unwrap();
        explorer.search("x").await.unwrap();

        assert_eq!(explorer.go_back().await, Ok(ViewMode::Files));
        assert_eq!(explorer.navigation().current_path(), "/a");
    }

    #[tokio::test]
    async fn llm_toggle_selects_mode() {
        let (explorer, _dir, search) = explorer(&["/pics"]);
        explorer.navigation().load_path("/pics", true).await.unwrap();
        explorer.set_llm(true);

        explorer.submit("beach sunset").await.unwrap();
        assert_eq!(search.llm_calls(), 1);
        assert_eq!(search.requests()[0].mode, SearchMode::LanguageModel);
    }

    #[tokio::test]
    async fn echoed_stream_completes_session() {
        let (explorer, _dir, search) = explorer(&["/srv"]);
        explorer.navigation().load_path("/srv", true).await.unwrap();
        search.echo_items(&["one", "two", "three"]);

        explorer.submit("anything").await.unwrap();
        let mut status = explorer.session().subscribe_status();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| s.phase == SessionPhase::Completed),
        )
        .await
        .expect("timeout")
        .expect("status closed");

        assert_eq!(explorer.session().results().len(), 3);
        explorer.cancel_search();
        assert_eq!(explorer.session().results().len(), 3);
    }
}
