use async_trait::async_trait;
use seekcore_config::Settings;
use seekcore_events::EventBus;
use seekcore_index::{is_root, RawEntry};
use seekcore_query::{ParsedQuery, SearchRequest, SearchStreamEvent};
use walkdir::WalkDir;

use crate::directory::entry_from_metadata;
use crate::{SearchService, ServiceError};

/// Walks the request's current path on a blocking thread and publishes every
/// match on the stream channel, followed by the end-of-stream sentinel.
#[derive(Clone)]
pub struct LocalSearchService {
    bus: EventBus<SearchStreamEvent>,
    channel: String,
    result_limit: Option<usize>,
}

impl LocalSearchService {
    pub fn new(
        bus: EventBus<SearchStreamEvent>,
        channel: impl Into<String>,
        result_limit: Option<usize>,
    ) -> Self {
        Self {
            bus,
            channel: channel.into(),
            result_limit,
        }
    }

    pub fn from_settings(bus: EventBus<SearchStreamEvent>, settings: &Settings) -> Self {
        Self::new(bus, settings.stream_channel.clone(), settings.search_result_limit)
    }
}

#[async_trait]
impl SearchService for LocalSearchService {
    async fn start_stream(&self, request: SearchRequest) -> Result<(), ServiceError> {
        let root = request.payload.current_path.trim().to_string();
        if is_root(&root) {
            return Err(ServiceError::InvalidRequest(
                "search needs a current directory".to_string(),
            ));
        }

        let parsed = ParsedQuery::parse(&request.payload.query)
            .map_err(|err| ServiceError::InvalidRequest(err.to_string()))?
            .with_date_bounds(
                &request.payload.modified_after,
                &request.payload.modified_before,
            );

        let bus = self.bus.clone();
        let channel = self.channel.clone();
        let limit = self.result_limit;
        let request_id = request.request_id;
        tracing::debug!(request_id, %root, query = %request.payload.query, "starting local search");

        tokio::task::spawn_blocking(move || {
            let found = walk_and_publish(&bus, &channel, request_id, &root, &parsed, limit);
            bus.publish(&channel, SearchStreamEvent::end(request_id));
            tracing::debug!(request_id, found, "local search finished");
        });
        Ok(())
    }

    async fn start_llm_stream(&self, _request: SearchRequest) -> Result<(), ServiceError> {
        Err(ServiceError::Unsupported("language-model search"))
    }
}

fn walk_and_publish(
    bus: &EventBus<SearchStreamEvent>,
    channel: &str,
    request_id: u64,
    root: &str,
    parsed: &ParsedQuery,
    limit: Option<usize>,
) -> usize {
    let mut found = 0usize;

    for dir_entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        let Ok(metadata) = dir_entry.metadata() else {
            continue;
        };
        let entry = entry_from_metadata(dir_entry.path(), &metadata);
        if !parsed.matches(&entry) {
            continue;
        }

        let event = SearchStreamEvent::item(request_id, RawEntry::from(entry));
        if bus.publish(channel, event) == 0 {
            tracing::debug!(request_id, "no listeners left, stopping walk");
            break;
        }
        found += 1;

        if limit.is_some_and(|limit| found >= limit) {
            tracing::debug!(request_id, found, "result limit reached");
            break;
        }
    }

    found
}
