//! Retry requests
//!
//! A [`RetryMiddleware`](crate::client::layer::retry::RetryMiddleware) asks a
//! decider after every attempt whether the request should be sent again.
//! The decider sees an [`Attempt`]: how many retries already happened, the
//! request, and either the response or the error.
//!
//! **Requests should not be retried** if the server cannot safely handle the
//! same request twice. Checking the method for idempotency is a good start.
//!
//! ```
//! use reqstack::retry::Attempt;
//!
//! fn decide(attempt: &Attempt<'_>) -> bool {
//!     attempt.retries() < 3
//!         && (attempt.is_error() || attempt.status().is_some_and(|s| s.is_server_error()))
//! }
//! # let _ = decide;
//! ```
//!
//! The middleware never sleeps by itself. It stores the delay computed for
//! the next attempt in the `delay` option and the transport honours it.

use std::time::Duration;

use http::{Method, StatusCode};
use url::Url;

use crate::{Error, Request, Response};

/// One finished attempt, as seen by a retry decider.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    pub(crate) retries: u32,
    pub(crate) request: &'a Request,
    pub(crate) outcome: Result<&'a Response, &'a Error>,
}

impl<'a> Attempt<'a> {
    /// Number of retries performed before this attempt.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The request that was sent.
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// Returns the HTTP method of the request.
    pub fn method(&self) -> &'a Method {
        self.request.method()
    }

    /// Returns the URL of the request.
    pub fn url(&self) -> &'a Url {
        self.request.url()
    }

    /// The response, if the attempt produced one.
    pub fn response(&self) -> Option<&'a Response> {
        self.outcome.ok()
    }

    /// Returns the HTTP status code if the attempt produced a response.
    pub fn status(&self) -> Option<StatusCode> {
        self.outcome.ok().map(Response::status)
    }

    /// The error, if the attempt failed.
    pub fn error(&self) -> Option<&'a Error> {
        self.outcome.err()
    }

    /// Returns true if the attempt failed.
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Default delay before the next attempt: zero for the first retry
/// computation, then `2^(retries - 1)` milliseconds.
///
/// ```
/// use std::time::Duration;
/// use reqstack::retry::exponential_delay;
///
/// assert_eq!(exponential_delay(0), Duration::ZERO);
/// assert_eq!(exponential_delay(1), Duration::from_millis(1));
/// assert_eq!(exponential_delay(4), Duration::from_millis(8));
/// ```
pub fn exponential_delay(retries: u32) -> Duration {
    if retries == 0 {
        return Duration::ZERO;
    }
    let millis = 1u64.checked_shl(retries - 1).unwrap_or(u64::MAX);
    Duration::from_millis(millis)
}
