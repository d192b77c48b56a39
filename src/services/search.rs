//! Search service - cached, cursor-paginated listing search
//!
//! Orchestrates a search request:
//! - Validates filter and cursor before anything executes
//! - Resolves the requested fields into a projection
//! - Serves from the result cache, or runs the page + count queries

use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::config::{CacheConfig, SearchConfig};
use crate::db::cache::CacheStore;
use crate::db::executor::QueryExecutor;
use crate::db::projection::{project, ProjectionSpec};
use crate::db::search::{cursor, PageArgs, SearchFilter, SearchQueryBuilder};
use crate::models::{Edge, Page, PageInfo};
use crate::services::result_cache::{cache_key, ResultCache};
use crate::{Error, Result};

/// Search service coordinating projection, caching and query execution.
pub struct SearchService {
    executor: Arc<dyn QueryExecutor>,
    cache: ResultCache,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        store: Arc<dyn CacheStore>,
        search_config: SearchConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            executor,
            cache: ResultCache::new(store, cache_config.search_ttl_seconds),
            config: search_config,
        }
    }

    /// Search listings, returning one page of projected rows.
    ///
    /// `fields` is the flat list of logical dot-path fields the client
    /// selected; unknown names are dropped by projection.
    pub async fn search(
        &self,
        filter: &SearchFilter,
        page: &PageArgs,
        fields: &[String],
    ) -> Result<Page> {
        filter.validate()?;
        let after_id = page.after_id()?;
        let first = page.effective_first(self.config.default_page_size, self.config.max_page_size);

        let projection = project(fields);
        let logical_fields = projection.logical_fields();
        let key = cache_key(filter, first, page.after.as_deref(), &logical_fields);

        self.cache
            .get_or_compute(&key, || self.execute(filter, &projection, first, after_id))
            .await
    }

    /// Run the page and count queries and assemble the page.
    async fn execute(
        &self,
        filter: &SearchFilter,
        projection: &ProjectionSpec,
        first: i64,
        after_id: Option<i64>,
    ) -> Result<Page> {
        let builder = SearchQueryBuilder::new(filter, projection, first, after_id);

        let (page_sql, page_binds) = builder.build_page();
        let mut rows = self.executor.query_rows(&page_sql, &page_binds).await?;

        let (count_sql, count_binds) = builder.build_count();
        let total_count = self.executor.query_scalar(&count_sql, &count_binds).await?;

        // The extra row only signals another page.
        let has_next_page = rows.len() as i64 > first;
        if has_next_page {
            rows.truncate(first as usize);
        }

        let edges = rows
            .into_iter()
            .map(|node| {
                let id = node_id(&node)?;
                Ok(Edge {
                    node,
                    cursor: cursor::encode(id),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let end_cursor = edges.last().map(|edge| edge.cursor.clone());

        tracing::debug!(
            rows = edges.len(),
            total_count,
            has_next_page,
            "listing search executed"
        );

        Ok(Page {
            edges,
            page_info: PageInfo {
                has_next_page,
                end_cursor,
            },
            total_count,
        })
    }
}

fn node_id(node: &JsonValue) -> Result<i64> {
    node.get("id")
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| Error::Internal("projected row is missing its id".to_string()))
}
