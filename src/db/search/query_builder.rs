//! SQL query builder for listing searches
//!
//! Builds the page and count queries from a validated [`SearchFilter`] and a
//! resolved [`ProjectionSpec`]. Predicates are appended in a fixed order so
//! identical logical filters always produce identical SQL text and bind
//! order; the result cache keys depend on that stability.

use std::collections::BTreeSet;

use crate::db::executor::{push_date, push_float, push_int, push_text, push_text_array, BindValue};
use crate::db::projection::{JoinRelation, ProjectionSpec};
use crate::db::search::params::SearchFilter;

/// Listings visible to search.
const ACTIVE_STATUS: &str = "active";

/// Booking state that blocks a date range.
const BLOCKING_STATUS: &str = "confirmed";

/// Escape LIKE wildcards in user text; the pattern is bound, never inlined.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Query builder for listing searches.
#[derive(Debug)]
pub struct SearchQueryBuilder<'a> {
    filter: &'a SearchFilter,
    projection: &'a ProjectionSpec,
    /// Effective (already clamped) page size
    first: i64,
    /// Decoded cursor: page starts strictly after this id
    after: Option<i64>,
}

impl<'a> SearchQueryBuilder<'a> {
    pub fn new(
        filter: &'a SearchFilter,
        projection: &'a ProjectionSpec,
        first: i64,
        after: Option<i64>,
    ) -> Self {
        Self {
            filter,
            projection,
            first,
            after,
        }
    }

    /// Build the page query.
    ///
    /// Selects one JSONB object per row and requests `first + 1` rows; the
    /// extra row only signals `has_next_page` and is dropped by the caller.
    pub fn build_page(&self) -> (String, Vec<BindValue>) {
        let mut sql = format!("SELECT {} FROM listings l", self.projection.select_expr());
        let mut bind_params = Vec::new();

        self.push_joins(&mut sql, self.page_joins());
        self.push_predicates(&mut sql, &mut bind_params);

        if let Some(after_id) = self.after {
            let idx = push_int(&mut bind_params, after_id);
            sql.push_str(&format!(" AND l.id > ${}", idx));
        }

        sql.push_str(&format!(" ORDER BY l.id ASC LIMIT {}", self.first + 1));

        (sql, bind_params)
    }

    /// Build the count query.
    ///
    /// Shares the predicate code with [`build_page`](Self::build_page) minus
    /// the cursor bound and limit, so the total is independent of page
    /// position and size. Projection joins are skipped; only joins the
    /// predicates themselves need are kept.
    pub fn build_count(&self) -> (String, Vec<BindValue>) {
        let mut sql = String::from("SELECT COUNT(*) FROM listings l");
        let mut bind_params = Vec::new();

        self.push_joins(&mut sql, self.filter_joins());
        self.push_predicates(&mut sql, &mut bind_params);

        (sql, bind_params)
    }

    /// Joins the filter predicates need regardless of projection.
    fn filter_joins(&self) -> BTreeSet<JoinRelation> {
        let mut joins = BTreeSet::new();
        if self.filter.query.is_some() {
            // Text search matches city/country/street columns.
            joins.insert(JoinRelation::Address);
            joins.insert(JoinRelation::City);
            joins.insert(JoinRelation::Country);
        }
        joins
    }

    fn page_joins(&self) -> BTreeSet<JoinRelation> {
        let mut joins = self.filter_joins();
        joins.extend(self.projection.joins());
        joins
    }

    fn push_joins(&self, sql: &mut String, joins: BTreeSet<JoinRelation>) {
        for join in joins {
            sql.push(' ');
            sql.push_str(join.clause());
        }
    }

    /// Append WHERE predicates in fixed order: status, text search, price
    /// bounds, category, amenities, rating, availability.
    fn push_predicates(&self, sql: &mut String, bind_params: &mut Vec<BindValue>) {
        let idx = push_text(bind_params, ACTIVE_STATUS.to_string());
        sql.push_str(&format!(" WHERE l.status = ${}", idx));

        if let Some(query) = self.filter.query.as_deref() {
            let pattern = format!("%{}%", escape_like(query));
            let idx = push_text(bind_params, pattern);
            sql.push_str(&format!(
                " AND (l.title ILIKE ${i} OR c.name ILIKE ${i} OR co.name ILIKE ${i} OR a.street ILIKE ${i})",
                i = idx
            ));
        }

        if let Some(min_price) = self.filter.min_price {
            let idx = push_float(bind_params, min_price);
            sql.push_str(&format!(" AND l.price_per_night >= ${}", idx));
        }

        if let Some(max_price) = self.filter.max_price {
            let idx = push_float(bind_params, max_price);
            sql.push_str(&format!(" AND l.price_per_night <= ${}", idx));
        }

        if let Some(category) = &self.filter.category {
            let idx = push_text(bind_params, category.clone());
            sql.push_str(&format!(" AND l.category = ${}", idx));
        }

        if !self.filter.amenities.is_empty() {
            let idx = push_text_array(bind_params, self.filter.amenities.clone());
            sql.push_str(&format!(" AND l.amenities @> ${}", idx));
        }

        if let Some(min_rating) = self.filter.min_rating {
            let idx = push_float(bind_params, min_rating);
            sql.push_str(&format!(" AND l.rating >= ${}", idx));
        }

        // Availability: exclude listings with a confirmed booking that
        // overlaps [start, end). Half-open test: a booking ending exactly on
        // the requested start (or starting on the requested end) does not
        // conflict.
        if let Some((start, end)) = self.filter.date_range() {
            let status_idx = push_text(bind_params, BLOCKING_STATUS.to_string());
            let end_idx = push_date(bind_params, end);
            let start_idx = push_date(bind_params, start);
            sql.push_str(&format!(
                " AND NOT EXISTS (SELECT 1 FROM bookings b WHERE b.listing_id = l.id AND b.status = ${} AND b.start_date < ${} AND b.end_date > ${})",
                status_idx, end_idx, start_idx
            ));
        }
    }
}
