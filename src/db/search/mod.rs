//! Listing search: filter/pagination inputs and SQL generation

pub mod params;
pub mod query_builder;

pub use params::{cursor, PageArgs, SearchFilter};
pub use query_builder::SearchQueryBuilder;
