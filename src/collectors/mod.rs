//! Source collectors that turn remote APIs into normalized [`Record`]s.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | NewsAPI | [`news`] | `/v2/everything` search | One search per configured query, paginated |
//! | Reddit | [`reddit`] | OAuth `/r/{sub}/new` listing | Posts kept only if the relevance filter matches |
//!
//! # Common Patterns
//!
//! Each collector exposes `collect(...)` returning at most `total_records`
//! records in source order. Individual request failures are logged and
//! skipped; the collector returns whatever it gathered. Text is always run
//! through [`crate::utils::clean_text`] before it lands in a record.
//!
//! [`Record`]: crate::models::Record

pub mod news;
pub mod reddit;
