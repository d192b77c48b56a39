//! Domain models for listings, relations and paginated results

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A listing host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub superhost: bool,
}

/// A listing photo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i64,
    pub listing_id: i64,
    pub url: String,
    /// Display order within the listing's gallery
    pub position: i32,
}

/// Booking lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// A stay booking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub listing_id: i64,
    pub traveler_id: i64,
    pub status: BookingStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: f64,
}

/// A guest review on a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub listing_id: i64,
    pub author_id: i64,
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A traveler's planned trip
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub id: i64,
    pub traveler_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One element of a paginated result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Projected listing row, shaped by the requested field set
    pub node: JsonValue,
    pub cursor: String,
}

/// Relay-style page metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// A page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub total_count: i64,
}

impl Page {
    /// An empty page with a zero total.
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo {
                has_next_page: false,
                end_cursor: None,
            },
            total_count: 0,
        }
    }
}
