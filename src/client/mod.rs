pub mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpReviewClient;

use std::future::Future;

use crate::error::Result;
use crate::models::{Review, ReviewId};

/// Remote review analysis and storage service
///
/// Implementations make exactly one call per method: no retries, no caching.
pub trait ReviewService: Send + Sync {
    /// Fetch the whole review collection, newest first
    fn list(&self) -> impl Future<Output = Result<Vec<Review>>> + Send;

    /// Submit text for analysis, returning the stored review
    fn create(&self, text: &str) -> impl Future<Output = Result<Review>> + Send;

    /// Delete a review by id
    fn delete(&self, id: &ReviewId) -> impl Future<Output = Result<()>> + Send;

    /// Check that the service is up
    fn health(&self) -> impl Future<Output = Result<()>> + Send;
}
