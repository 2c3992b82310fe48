//! Fetch stage.
//!
//! This module turns topics into deduplicated category buckets and
//! assembles them into a [`Dataset`](crate::models::Dataset).

pub mod aggregator;
pub mod fetcher;

pub use aggregator::{aggregate, summary_line};
pub use fetcher::{plan_queries, Fetcher};
