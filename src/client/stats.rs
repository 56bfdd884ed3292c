use std::time::Duration;

use crate::{Error, Request, Response};

/// Statistics about one transfer, handed to the `on_stats` option callback.
#[derive(Debug, Clone)]
pub struct TransferStats {
    request: Request,
    response: Option<Response>,
    error: Option<Error>,
    transfer_time: Duration,
}

impl TransferStats {
    pub(crate) fn new(
        request: Request,
        outcome: std::result::Result<&Response, &Error>,
        transfer_time: Duration,
    ) -> Self {
        let (response, error) = match outcome {
            Ok(response) => (Some(response.clone()), None),
            Err(error) => (error.response().cloned(), Some(error.clone())),
        };
        TransferStats {
            request,
            response,
            error,
            transfer_time,
        }
    }

    /// The request that was sent.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response received, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Returns true if a response was received.
    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// The error the transfer failed with, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Time spent on the transfer.
    pub fn transfer_time(&self) -> Duration {
        self.transfer_time
    }
}
