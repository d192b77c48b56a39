//! Batched fetchers, one per relation
//!
//! Each fetcher turns a deduplicated key list into a single SQL round trip
//! through the shared [`QueryExecutor`], then maps rows back by key.
//! One-to-many fetchers group rows by foreign key before returning; order
//! within a group follows the underlying query order.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::db::executor::{BindValue, QueryExecutor};
use crate::models::{Booking, Host, Image, Itinerary, Review};
use crate::{Error, Result};

use super::BatchFetch;

/// Group fetched rows by foreign key, preserving row order inside a group.
pub fn group_rows<K, T, F>(rows: Vec<T>, key_fn: F) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut grouped: HashMap<K, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key_fn(&row)).or_default().push(row);
    }
    grouped
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<JsonValue>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Error::from))
        .collect()
}

/// Hosts by id (many-to-one).
pub struct HostFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl HostFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchFetch for HostFetcher {
    type Key = i64;
    type Value = Host;

    async fn fetch(&self, keys: &[i64]) -> Result<HashMap<i64, Host>> {
        let sql = "SELECT jsonb_build_object('id', h.id, 'name', h.name, 'email', h.email, \
                   'avatarUrl', h.avatar_url, 'superhost', h.superhost) \
                   FROM hosts h WHERE h.id = ANY($1)";
        let rows = self
            .executor
            .query_rows(sql, &[BindValue::IntArray(keys.to_vec())])
            .await?;
        let hosts: Vec<Host> = decode_rows(rows)?;
        Ok(hosts.into_iter().map(|h| (h.id, h)).collect())
    }
}

/// Listing images by listing id (one-to-many, gallery order).
pub struct ImageFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl ImageFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchFetch for ImageFetcher {
    type Key = i64;
    type Value = Vec<Image>;

    async fn fetch(&self, keys: &[i64]) -> Result<HashMap<i64, Vec<Image>>> {
        let sql = "SELECT jsonb_build_object('id', li.id, 'listingId', li.listing_id, \
                   'url', li.url, 'position', li.position) \
                   FROM listing_images li WHERE li.listing_id = ANY($1) \
                   ORDER BY li.listing_id, li.position";
        let rows = self
            .executor
            .query_rows(sql, &[BindValue::IntArray(keys.to_vec())])
            .await?;
        let images: Vec<Image> = decode_rows(rows)?;
        Ok(group_rows(images, |i| i.listing_id))
    }
}

/// Bookings by listing id (one-to-many).
pub struct BookingFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl BookingFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchFetch for BookingFetcher {
    type Key = i64;
    type Value = Vec<Booking>;

    async fn fetch(&self, keys: &[i64]) -> Result<HashMap<i64, Vec<Booking>>> {
        let sql = "SELECT jsonb_build_object('id', b.id, 'listingId', b.listing_id, \
                   'travelerId', b.traveler_id, 'status', b.status, 'startDate', b.start_date, \
                   'endDate', b.end_date, 'totalPrice', b.total_price) \
                   FROM bookings b WHERE b.listing_id = ANY($1) \
                   ORDER BY b.listing_id, b.start_date";
        let rows = self
            .executor
            .query_rows(sql, &[BindValue::IntArray(keys.to_vec())])
            .await?;
        let bookings: Vec<Booking> = decode_rows(rows)?;
        Ok(group_rows(bookings, |b| b.listing_id))
    }
}

/// Reviews by listing id (one-to-many, newest first).
pub struct ReviewFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl ReviewFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchFetch for ReviewFetcher {
    type Key = i64;
    type Value = Vec<Review>;

    async fn fetch(&self, keys: &[i64]) -> Result<HashMap<i64, Vec<Review>>> {
        let sql = "SELECT jsonb_build_object('id', rv.id, 'listingId', rv.listing_id, \
                   'authorId', rv.author_id, 'rating', rv.rating, 'comment', rv.comment, \
                   'createdAt', rv.created_at) \
                   FROM reviews rv WHERE rv.listing_id = ANY($1) \
                   ORDER BY rv.listing_id, rv.created_at DESC";
        let rows = self
            .executor
            .query_rows(sql, &[BindValue::IntArray(keys.to_vec())])
            .await?;
        let reviews: Vec<Review> = decode_rows(rows)?;
        Ok(group_rows(reviews, |r| r.listing_id))
    }
}

/// Itineraries by traveler id (one-to-many).
pub struct ItineraryFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl ItineraryFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchFetch for ItineraryFetcher {
    type Key = i64;
    type Value = Vec<Itinerary>;

    async fn fetch(&self, keys: &[i64]) -> Result<HashMap<i64, Vec<Itinerary>>> {
        let sql = "SELECT jsonb_build_object('id', it.id, 'travelerId', it.traveler_id, \
                   'name', it.name, 'startDate', it.start_date, 'endDate', it.end_date) \
                   FROM itineraries it WHERE it.traveler_id = ANY($1) \
                   ORDER BY it.traveler_id, it.start_date";
        let rows = self
            .executor
            .query_rows(sql, &[BindValue::IntArray(keys.to_vec())])
            .await?;
        let itineraries: Vec<Itinerary> = decode_rows(rows)?;
        Ok(group_rows(itineraries, |i| i.traveler_id))
    }
}

/// Composite loader key: one listing, one stay window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvailabilityKey {
    pub listing_id: i64,
    /// Stay start (inclusive)
    pub start_date: NaiveDate,
    /// Stay end (exclusive)
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookedRange {
    listing_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// Availability per listing/date-range key.
///
/// One superset query fetches every confirmed booking that could conflict
/// with any requested window; per-key overlap is resolved in memory so keys
/// with different ranges still batch into one round trip.
pub struct AvailabilityFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl AvailabilityFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl BatchFetch for AvailabilityFetcher {
    type Key = AvailabilityKey;
    type Value = bool;

    async fn fetch(&self, keys: &[AvailabilityKey]) -> Result<HashMap<AvailabilityKey, bool>> {
        let Some(window_end) = keys.iter().map(|k| k.end_date).max() else {
            return Ok(HashMap::new());
        };
        let window_start = keys
            .iter()
            .map(|k| k.start_date)
            .min()
            .unwrap_or(window_end);
        let listing_ids: Vec<i64> = keys.iter().map(|k| k.listing_id).collect();

        let sql = "SELECT jsonb_build_object('listingId', b.listing_id, \
                   'startDate', b.start_date, 'endDate', b.end_date) \
                   FROM bookings b WHERE b.status = $1 AND b.listing_id = ANY($2) \
                   AND b.start_date < $3 AND b.end_date > $4";
        let rows = self
            .executor
            .query_rows(
                sql,
                &[
                    BindValue::Text("confirmed".to_string()),
                    BindValue::IntArray(listing_ids),
                    BindValue::Date(window_end),
                    BindValue::Date(window_start),
                ],
            )
            .await?;
        let booked: Vec<BookedRange> = decode_rows(rows)?;

        Ok(keys
            .iter()
            .map(|key| {
                let conflict = booked.iter().any(|b| {
                    b.listing_id == key.listing_id
                        && b.start_date < key.end_date
                        && b.end_date > key.start_date
                });
                (key.clone(), !conflict)
            })
            .collect())
    }
}
