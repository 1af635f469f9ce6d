//! Client-side pacing of scripture API requests

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

/// Shared request pacer for one API client.
///
/// A bulk import issues one request per chapter back to back; pacing keeps
/// that from hammering the API.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl RequestPacer {
    /// Create a pacer allowing `requests_per_second` requests
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_second(rps);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        trace!("Waiting for request slot");
        self.limiter.until_ready().await;
    }
}
