//! Resolver adapter
//!
//! The surface the GraphQL layer calls into. [`Resolver`] owns the shared
//! executor/cache handles and the services built on them; every inbound
//! request gets a fresh [`RequestContext`] with its own loader set.
//!
//! Each method resolves one field independently and returns its own
//! `Result`, so a failing field never takes its siblings down: the caller
//! can map individual errors into a partial response.

use std::sync::Arc;

use crate::config::Config;
use crate::db::cache::CacheStore;
use crate::db::executor::QueryExecutor;
use crate::db::search::{PageArgs, SearchFilter};
use crate::loader::fetchers::AvailabilityKey;
use crate::models::{Booking, Host, Image, Itinerary, Page, Review};
use crate::request_context::RequestContext;
use crate::services::{BookingService, NewBooking, SearchService};
use crate::Result;

pub struct Resolver {
    executor: Arc<dyn QueryExecutor>,
    search: SearchService,
    bookings: BookingService,
}

impl Resolver {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        cache_store: Arc<dyn CacheStore>,
        config: &Config,
    ) -> Self {
        let search = SearchService::new(
            executor.clone(),
            cache_store,
            config.search.clone(),
            &config.cache,
        );
        let bookings = BookingService::new(executor.clone());
        Self {
            executor,
            search,
            bookings,
        }
    }

    /// Start a request: one fresh loader set, never reused.
    pub fn begin_request(&self) -> RequestContext {
        RequestContext::new(self.executor.clone())
    }

    /// Top-level search field.
    pub async fn search_listings(
        &self,
        filter: &SearchFilter,
        page: &PageArgs,
        fields: &[String],
    ) -> Result<Page> {
        self.search.search(filter, page, fields).await
    }

    /// `listing.host`
    pub async fn listing_host(&self, ctx: &RequestContext, host_id: i64) -> Result<Option<Host>> {
        ctx.loaders.hosts.load(host_id).await
    }

    /// `listing.images`
    pub async fn listing_images(
        &self,
        ctx: &RequestContext,
        listing_id: i64,
    ) -> Result<Vec<Image>> {
        Ok(ctx
            .loaders
            .images
            .load(listing_id)
            .await?
            .unwrap_or_default())
    }

    /// `listing.bookings`
    pub async fn listing_bookings(
        &self,
        ctx: &RequestContext,
        listing_id: i64,
    ) -> Result<Vec<Booking>> {
        Ok(ctx
            .loaders
            .bookings
            .load(listing_id)
            .await?
            .unwrap_or_default())
    }

    /// `listing.reviews`
    pub async fn listing_reviews(
        &self,
        ctx: &RequestContext,
        listing_id: i64,
    ) -> Result<Vec<Review>> {
        Ok(ctx
            .loaders
            .reviews
            .load(listing_id)
            .await?
            .unwrap_or_default())
    }

    /// `listing.isAvailable(start, end)` - listings without bookings are
    /// available.
    pub async fn listing_availability(
        &self,
        ctx: &RequestContext,
        listing_id: i64,
        start_date: chrono::NaiveDate,
        end_date: chrono::NaiveDate,
    ) -> Result<bool> {
        let key = AvailabilityKey {
            listing_id,
            start_date,
            end_date,
        };
        Ok(ctx.loaders.availability.load(key).await?.unwrap_or(true))
    }

    /// `traveler.itineraries`
    pub async fn traveler_itineraries(
        &self,
        ctx: &RequestContext,
        traveler_id: i64,
    ) -> Result<Vec<Itinerary>> {
        Ok(ctx
            .loaders
            .itineraries
            .load(traveler_id)
            .await?
            .unwrap_or_default())
    }

    /// `createBooking` mutation.
    pub async fn create_booking(
        &self,
        ctx: &RequestContext,
        input: &NewBooking,
    ) -> Result<Booking> {
        self.bookings.create_booking(ctx, input).await
    }

    /// `cancelBooking` mutation.
    pub async fn cancel_booking(
        &self,
        ctx: &RequestContext,
        booking_id: i64,
    ) -> Result<Option<Booking>> {
        self.bookings.cancel_booking(ctx, booking_id).await
    }
}
