//! Booking mutations
//!
//! Writes go through the shared executor. Every mutation invalidates the
//! per-request loaders whose backing rows it touched (the listing's booking
//! list and the availability loader) so later fields in the same request see
//! their own writes.

use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::db::executor::{BindValue, QueryExecutor};
use crate::models::Booking;
use crate::request_context::RequestContext;
use crate::{Error, Result};

const BOOKING_COLUMNS: &str = "jsonb_build_object('id', id, 'listingId', listing_id, \
     'travelerId', traveler_id, 'status', status, 'startDate', start_date, \
     'endDate', end_date, 'totalPrice', total_price)";

/// Input for creating a booking (instant-book: created confirmed).
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub listing_id: i64,
    pub traveler_id: i64,
    pub start_date: chrono::NaiveDate,
    /// Stay end (exclusive)
    pub end_date: chrono::NaiveDate,
    pub total_price: f64,
}

pub struct BookingService {
    executor: Arc<dyn QueryExecutor>,
}

impl BookingService {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Create a confirmed booking and invalidate the affected loaders.
    pub async fn create_booking(
        &self,
        ctx: &RequestContext,
        input: &NewBooking,
    ) -> Result<Booking> {
        if input.end_date <= input.start_date {
            return Err(Error::Validation(format!(
                "endDate {} must be after startDate {}",
                input.end_date, input.start_date
            )));
        }

        let sql = format!(
            "INSERT INTO bookings (listing_id, traveler_id, status, start_date, end_date, total_price) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {BOOKING_COLUMNS}"
        );
        let binds = [
            BindValue::Int(input.listing_id),
            BindValue::Int(input.traveler_id),
            BindValue::Text("confirmed".to_string()),
            BindValue::Date(input.start_date),
            BindValue::Date(input.end_date),
            BindValue::Float(input.total_price),
        ];
        let rows = self.executor.query_rows(&sql, &binds).await?;
        let booking = decode_booking(rows.into_iter().next())?
            .ok_or_else(|| Error::Internal("insert returned no booking row".to_string()))?;

        self.invalidate(ctx, booking.listing_id);
        tracing::info!(booking_id = booking.id, listing_id = booking.listing_id, "booking created");

        Ok(booking)
    }

    /// Cancel a booking. Returns `None` when the booking does not exist.
    pub async fn cancel_booking(
        &self,
        ctx: &RequestContext,
        booking_id: i64,
    ) -> Result<Option<Booking>> {
        let sql = format!(
            "UPDATE bookings SET status = $1 WHERE id = $2 RETURNING {BOOKING_COLUMNS}"
        );
        let binds = [
            BindValue::Text("cancelled".to_string()),
            BindValue::Int(booking_id),
        ];
        let rows = self.executor.query_rows(&sql, &binds).await?;
        let cancelled = decode_booking(rows.into_iter().next())?;

        if let Some(booking) = &cancelled {
            self.invalidate(ctx, booking.listing_id);
            tracing::info!(booking_id, listing_id = booking.listing_id, "booking cancelled");
        }

        Ok(cancelled)
    }

    /// Invalidate-on-write: clear every loader whose rows the mutation
    /// touched.
    fn invalidate(&self, ctx: &RequestContext, listing_id: i64) {
        ctx.loaders.bookings.clear(&listing_id);
        ctx.loaders.availability.clear_all();
    }
}

fn decode_booking(row: Option<JsonValue>) -> Result<Option<Booking>> {
    row.map(|value| serde_json::from_value(value).map_err(Error::from))
        .transpose()
}
