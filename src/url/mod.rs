//! URL handling module for Site-Trawler
//!
//! Normalization produces the dedup key for every URL the crawl sees, and the
//! [`UrlFilter`] decides which discovered URLs are in scope.

mod domain;
mod filter;
mod matcher;
mod normalize;

pub use domain::{extract_domain, strip_www};
pub use filter::{Admission, UrlFilter};
pub use matcher::{matches_allowed, matches_wildcard};
pub use normalize::normalize_url;
