//! Search filter and pagination inputs
//!
//! Structured inputs only: the filter is typed data, never raw SQL, and the
//! cursor is validated before any query is built.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Structured search predicate supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilter {
    /// Free-text query matched against title, city, country and street
    pub query: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
    /// Listings must carry every requested amenity
    pub amenities: Vec<String>,
    pub min_rating: Option<f64>,
    /// Requested stay start (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Requested stay end (exclusive)
    pub end_date: Option<NaiveDate>,
}

impl SearchFilter {
    /// Reject inconsistent input before anything reaches the query layer.
    ///
    /// The date range is all-or-nothing: availability filtering needs both
    /// bounds, and a lone bound is more likely a client bug than intent.
    pub fn validate(&self) -> Result<()> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end <= start => Err(Error::Validation(format!(
                "endDate {} must be after startDate {}",
                end, start
            ))),
            (Some(_), None) | (None, Some(_)) => Err(Error::Validation(
                "startDate and endDate must be provided together".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// The availability window, when date filtering is active.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start_date.zip(self.end_date)
    }
}

/// Requested page size and position.
#[derive(Debug, Clone, Default)]
pub struct PageArgs {
    pub first: Option<i64>,
    /// Opaque cursor from a previous page's `end_cursor`
    pub after: Option<String>,
}

impl PageArgs {
    /// Effective page size, clamped into `[1, max_page_size]`.
    ///
    /// Out-of-range sizes are clamped rather than rejected: a forgiving
    /// boundary keeps pagination UX stable when clients send junk sizes.
    pub fn effective_first(&self, default_page_size: i64, max_page_size: i64) -> i64 {
        self.first
            .unwrap_or(default_page_size)
            .clamp(1, max_page_size)
    }

    /// Decode the `after` cursor, if present.
    pub fn after_id(&self) -> Result<Option<i64>> {
        self.after.as_deref().map(cursor::decode).transpose()
    }
}

/// Cursor codec: the decimal string form of the last-seen primary key.
///
/// Paging is keyset on ascending id, so successive cursors are monotonic
/// non-decreasing.
pub mod cursor {
    use crate::{Error, Result};

    pub fn encode(id: i64) -> String {
        id.to_string()
    }

    pub fn decode(raw: &str) -> Result<i64> {
        raw.parse::<i64>()
            .map_err(|_| Error::Validation(format!("invalid cursor: {:?}", raw)))
    }
}
