//! Per-request context
//!
//! One [`RequestContext`] is constructed for every inbound request (see
//! [`crate::resolver::Resolver::begin_request`]) and dropped with it. The
//! loader set inside is the only place batch/cache state lives, so nothing
//! leaks between requests.

use std::sync::Arc;
use uuid::Uuid;

use crate::db::executor::QueryExecutor;
use crate::loader::fetchers::{
    AvailabilityFetcher, BookingFetcher, HostFetcher, ImageFetcher, ItineraryFetcher,
    ReviewFetcher,
};
use crate::loader::BatchLoader;

/// One batch loader per relation type.
pub struct Loaders {
    pub hosts: BatchLoader<HostFetcher>,
    pub images: BatchLoader<ImageFetcher>,
    pub bookings: BatchLoader<BookingFetcher>,
    pub reviews: BatchLoader<ReviewFetcher>,
    pub itineraries: BatchLoader<ItineraryFetcher>,
    pub availability: BatchLoader<AvailabilityFetcher>,
}

impl Loaders {
    pub fn new(executor: &Arc<dyn QueryExecutor>) -> Self {
        Self {
            hosts: BatchLoader::new(HostFetcher::new(executor.clone())),
            images: BatchLoader::new(ImageFetcher::new(executor.clone())),
            bookings: BatchLoader::new(BookingFetcher::new(executor.clone())),
            reviews: BatchLoader::new(ReviewFetcher::new(executor.clone())),
            itineraries: BatchLoader::new(ItineraryFetcher::new(executor.clone())),
            availability: BatchLoader::new(AvailabilityFetcher::new(executor.clone())),
        }
    }
}

/// Context carried through all field resolvers of a single request.
pub struct RequestContext {
    pub request_id: String,
    pub loaders: Loaders,
}

impl RequestContext {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            loaders: Loaders::new(&executor),
        }
    }
}
