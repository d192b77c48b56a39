//! Shared fixtures: an in-memory executor over a small seeded dataset.
//!
//! The executor understands exactly the query shapes this crate builds
//! (keyset-paginated listing pages, `= ANY($n)` batch fetches, availability
//! windows, booking writes) and records every statement so tests can assert
//! on round-trip counts.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use roost::db::cache::CacheStore;
use roost::db::executor::{BindValue, QueryExecutor};
use roost::models::{Booking, BookingStatus, Host, Image, Itinerary, Review};
use roost::{Error, Result};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Debug, Clone)]
pub struct TestListing {
    pub id: i64,
    pub host_id: i64,
    pub title: String,
    pub price_per_night: f64,
}

pub fn listing(id: i64, host_id: i64, title: &str, price: f64) -> TestListing {
    TestListing {
        id,
        host_id,
        title: title.to_string(),
        price_per_night: price,
    }
}

pub fn host(id: i64, name: &str) -> Host {
    Host {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        avatar_url: None,
        superhost: false,
    }
}

pub fn image(id: i64, listing_id: i64, position: i32) -> Image {
    Image {
        id,
        listing_id,
        url: format!("https://img.example.com/{listing_id}/{position}.jpg"),
        position,
    }
}

pub fn review(id: i64, listing_id: i64, rating: f64) -> Review {
    Review {
        id,
        listing_id,
        author_id: 500 + id,
        rating,
        comment: Some("Great stay".to_string()),
        created_at: chrono::DateTime::parse_from_rfc3339("2025-07-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc),
    }
}

pub fn itinerary(id: i64, traveler_id: i64, name: &str) -> Itinerary {
    Itinerary {
        id,
        traveler_id,
        name: name.to_string(),
        start_date: date(2025, 10, 1),
        end_date: date(2025, 10, 8),
    }
}

pub fn confirmed_booking(
    id: i64,
    listing_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Booking {
    Booking {
        id,
        listing_id,
        traveler_id: 900 + id,
        status: BookingStatus::Confirmed,
        start_date: start,
        end_date: end,
        total_price: 100.0,
    }
}

/// In-memory stand-in for the Postgres executor.
#[derive(Default)]
pub struct TestDb {
    pub listings: Vec<TestListing>,
    pub hosts: Vec<Host>,
    pub images: Vec<Image>,
    pub bookings: Mutex<Vec<Booking>>,
    pub reviews: Vec<Review>,
    pub itineraries: Vec<Itinerary>,
    /// Every executed statement, in order.
    pub log: Mutex<Vec<String>>,
    next_booking_id: AtomicI64,
}

impl TestDb {
    pub fn new() -> Self {
        Self {
            next_booking_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn with_listings(mut self, listings: Vec<TestListing>) -> Self {
        self.listings = listings;
        self
    }

    pub fn with_hosts(mut self, hosts: Vec<Host>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_images(mut self, images: Vec<Image>) -> Self {
        self.images = images;
        self
    }

    pub fn with_bookings(self, bookings: Vec<Booking>) -> Self {
        *self.bookings.lock().unwrap() = bookings;
        self
    }

    pub fn with_reviews(mut self, reviews: Vec<Review>) -> Self {
        self.reviews = reviews;
        self
    }

    pub fn with_itineraries(mut self, itineraries: Vec<Itinerary>) -> Self {
        self.itineraries = itineraries;
        self
    }

    pub fn into_executor(self) -> Arc<TestDb> {
        Arc::new(self)
    }

    /// Number of executed statements containing `needle`.
    pub fn query_count(&self, needle: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.contains(needle))
            .count()
    }

    fn record(&self, sql: &str) {
        self.log.lock().unwrap().push(sql.to_string());
    }

    /// Ids of listings matching the availability window, ascending.
    fn matching_listing_ids(&self, sql: &str, binds: &[BindValue]) -> Vec<i64> {
        let mut ids: Vec<i64> = self.listings.iter().map(|l| l.id).collect();
        ids.sort_unstable();

        if sql.contains("NOT EXISTS") {
            // The builder binds the window as (end, start), in that order.
            let dates: Vec<NaiveDate> = binds
                .iter()
                .filter_map(|b| match b {
                    BindValue::Date(d) => Some(*d),
                    _ => None,
                })
                .collect();
            if let [end, start] = dates[..] {
                let bookings = self.bookings.lock().unwrap();
                ids.retain(|id| {
                    !bookings.iter().any(|b| {
                        b.listing_id == *id
                            && b.status == BookingStatus::Confirmed
                            && b.start_date < end
                            && b.end_date > start
                    })
                });
            }
        }

        ids
    }

    fn listing_page(&self, sql: &str, binds: &[BindValue]) -> Vec<JsonValue> {
        let mut ids = self.matching_listing_ids(sql, binds);

        if let Some(at) = sql.find("l.id > $") {
            let idx: usize = sql[at + "l.id > $".len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .expect("cursor bind index");
            let BindValue::Int(after) = &binds[idx - 1] else {
                panic!("cursor bind is not an Int");
            };
            ids.retain(|id| id > after);
        }

        let limit: usize = sql
            .rsplit("LIMIT ")
            .next()
            .and_then(|s| s.trim().parse().ok())
            .expect("page query has a LIMIT");
        ids.truncate(limit);

        ids.into_iter()
            .map(|id| {
                let l = self
                    .listings
                    .iter()
                    .find(|l| l.id == id)
                    .expect("listing exists");
                json!({
                    "id": l.id,
                    "title": l.title,
                    "pricePerNight": l.price_per_night,
                    "hostId": l.host_id,
                })
            })
            .collect()
    }

    fn int_array_bind(binds: &[BindValue]) -> Vec<i64> {
        binds
            .iter()
            .find_map(|b| match b {
                BindValue::IntArray(ids) => Some(ids.clone()),
                _ => None,
            })
            .expect("batch query binds an id array")
    }

    fn to_rows<T: serde::Serialize>(items: Vec<&T>) -> Vec<JsonValue> {
        items
            .into_iter()
            .map(|item| serde_json::to_value(item).expect("model serializes"))
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for TestDb {
    async fn query_rows(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<JsonValue>> {
        self.record(sql);

        if sql.contains("FROM listings l") {
            return Ok(self.listing_page(sql, binds));
        }

        if sql.contains("FROM hosts h") {
            let ids = Self::int_array_bind(binds);
            return Ok(Self::to_rows(
                self.hosts.iter().filter(|h| ids.contains(&h.id)).collect(),
            ));
        }

        if sql.contains("FROM listing_images li") {
            let ids = Self::int_array_bind(binds);
            let mut images: Vec<&Image> = self
                .images
                .iter()
                .filter(|i| ids.contains(&i.listing_id))
                .collect();
            images.sort_by_key(|i| (i.listing_id, i.position));
            return Ok(Self::to_rows(images));
        }

        if sql.contains("FROM bookings b WHERE b.status") {
            // Availability superset query: confirmed bookings inside the
            // widest requested window.
            let ids = Self::int_array_bind(binds);
            let dates: Vec<NaiveDate> = binds
                .iter()
                .filter_map(|b| match b {
                    BindValue::Date(d) => Some(*d),
                    _ => None,
                })
                .collect();
            let [end, start] = dates[..] else {
                panic!("availability query binds (end, start)");
            };
            let bookings = self.bookings.lock().unwrap();
            return Ok(bookings
                .iter()
                .filter(|b| {
                    b.status == BookingStatus::Confirmed
                        && ids.contains(&b.listing_id)
                        && b.start_date < end
                        && b.end_date > start
                })
                .map(|b| {
                    json!({
                        "listingId": b.listing_id,
                        "startDate": b.start_date,
                        "endDate": b.end_date,
                    })
                })
                .collect());
        }

        if sql.contains("FROM bookings b") {
            let ids = Self::int_array_bind(binds);
            let bookings = self.bookings.lock().unwrap();
            let mut matching: Vec<Booking> = bookings
                .iter()
                .filter(|b| ids.contains(&b.listing_id))
                .cloned()
                .collect();
            matching.sort_by_key(|b| (b.listing_id, b.start_date));
            return Ok(matching
                .iter()
                .map(|b| serde_json::to_value(b).expect("booking serializes"))
                .collect());
        }

        if sql.contains("FROM reviews rv") {
            let ids = Self::int_array_bind(binds);
            return Ok(Self::to_rows(
                self.reviews
                    .iter()
                    .filter(|r| ids.contains(&r.listing_id))
                    .collect(),
            ));
        }

        if sql.contains("FROM itineraries it") {
            let ids = Self::int_array_bind(binds);
            return Ok(Self::to_rows(
                self.itineraries
                    .iter()
                    .filter(|i| ids.contains(&i.traveler_id))
                    .collect(),
            ));
        }

        if sql.starts_with("INSERT INTO bookings") {
            let [BindValue::Int(listing_id), BindValue::Int(traveler_id), BindValue::Text(_status), BindValue::Date(start), BindValue::Date(end), BindValue::Float(total)] =
                binds
            else {
                panic!("unexpected insert binds: {binds:?}");
            };
            let booking = Booking {
                id: self.next_booking_id.fetch_add(1, Ordering::SeqCst),
                listing_id: *listing_id,
                traveler_id: *traveler_id,
                status: BookingStatus::Confirmed,
                start_date: *start,
                end_date: *end,
                total_price: *total,
            };
            self.bookings.lock().unwrap().push(booking.clone());
            return Ok(vec![serde_json::to_value(&booking).unwrap()]);
        }

        if sql.starts_with("UPDATE bookings SET status") {
            let BindValue::Int(booking_id) = &binds[1] else {
                panic!("unexpected update binds: {binds:?}");
            };
            let mut bookings = self.bookings.lock().unwrap();
            let Some(booking) = bookings.iter_mut().find(|b| b.id == *booking_id) else {
                return Ok(Vec::new());
            };
            booking.status = BookingStatus::Cancelled;
            return Ok(vec![serde_json::to_value(&*booking).unwrap()]);
        }

        panic!("unexpected query: {sql}");
    }

    async fn query_scalar(&self, sql: &str, binds: &[BindValue]) -> Result<i64> {
        self.record(sql);
        if sql.starts_with("SELECT COUNT(*) FROM listings l") {
            return Ok(self.matching_listing_ids(sql, binds).len() as i64);
        }
        panic!("unexpected scalar query: {sql}");
    }

    async fn execute(&self, sql: &str, _binds: &[BindValue]) -> Result<u64> {
        self.record(sql);
        Ok(0)
    }
}

/// Cache store whose reads and writes always fail.
#[derive(Debug, Default)]
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Cache("store unreachable".to_string()))
    }

    async fn set_ex(&self, _key: &str, _ttl_seconds: u64, _value: &str) -> Result<()> {
        Err(Error::Cache("store unreachable".to_string()))
    }
}
