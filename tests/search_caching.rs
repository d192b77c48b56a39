//! Result-cache behavior: hits, key normalization, soft failure, TTL.

mod support;

use std::sync::Arc;

use roost::db::cache::MemoryCacheStore;
use roost::db::search::{PageArgs, SearchFilter};
use roost::{Config, Resolver};
use support::{listing, FailingCacheStore, TestDb};

fn seeded_db() -> TestDb {
    TestDb::new().with_listings(vec![
        listing(1, 1, "Sea view flat", 120.0),
        listing(2, 1, "Garden studio", 75.0),
    ])
}

#[tokio::test]
async fn identical_searches_hit_the_cache() {
    let executor = seeded_db().into_executor();
    let resolver = Resolver::new(
        executor.clone(),
        Arc::new(MemoryCacheStore::new()),
        &Config::default(),
    );
    let filter = SearchFilter::default();
    let page = PageArgs::default();

    let first = resolver.search_listings(&filter, &page, &[]).await.unwrap();
    // One page query + one count query.
    assert_eq!(executor.query_count("FROM listings l"), 2);

    let second = resolver.search_listings(&filter, &page, &[]).await.unwrap();
    assert_eq!(executor.query_count("FROM listings l"), 2);
    assert_eq!(first.total_count, second.total_count);
    assert_eq!(first.edges.len(), second.edges.len());
}

#[tokio::test]
async fn projection_field_order_does_not_defeat_the_cache() {
    let executor = seeded_db().into_executor();
    let resolver = Resolver::new(
        executor.clone(),
        Arc::new(MemoryCacheStore::new()),
        &Config::default(),
    );
    let filter = SearchFilter::default();
    let page = PageArgs::default();

    resolver
        .search_listings(
            &filter,
            &page,
            &["title".to_string(), "id".to_string()],
        )
        .await
        .unwrap();
    resolver
        .search_listings(
            &filter,
            &page,
            &["id".to_string(), "title".to_string(), "title".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(executor.query_count("FROM listings l"), 2);
}

#[tokio::test]
async fn different_filters_compute_separately() {
    let executor = seeded_db().into_executor();
    let resolver = Resolver::new(
        executor.clone(),
        Arc::new(MemoryCacheStore::new()),
        &Config::default(),
    );
    let page = PageArgs::default();

    resolver
        .search_listings(&SearchFilter::default(), &page, &[])
        .await
        .unwrap();
    resolver
        .search_listings(
            &SearchFilter {
                min_price: Some(100.0),
                ..Default::default()
            },
            &page,
            &[],
        )
        .await
        .unwrap();

    assert_eq!(executor.query_count("FROM listings l"), 4);
}

#[tokio::test]
async fn broken_cache_store_degrades_to_direct_computation() {
    let executor = seeded_db().into_executor();
    let resolver = Resolver::new(
        executor.clone(),
        Arc::new(FailingCacheStore),
        &Config::default(),
    );
    let filter = SearchFilter::default();
    let page = PageArgs::default();

    // Both calls succeed; neither is served from cache.
    let result = resolver.search_listings(&filter, &page, &[]).await.unwrap();
    assert_eq!(result.total_count, 2);
    resolver.search_listings(&filter, &page, &[]).await.unwrap();
    assert_eq!(executor.query_count("FROM listings l"), 4);
}

#[tokio::test]
async fn expired_entries_recompute() {
    let executor = seeded_db().into_executor();
    let mut config = Config::default();
    config.cache.search_ttl_seconds = 0;
    let resolver = Resolver::new(
        executor.clone(),
        Arc::new(MemoryCacheStore::new()),
        &config,
    );
    let filter = SearchFilter::default();
    let page = PageArgs::default();

    resolver.search_listings(&filter, &page, &[]).await.unwrap();
    resolver.search_listings(&filter, &page, &[]).await.unwrap();

    assert_eq!(executor.query_count("FROM listings l"), 4);
}
