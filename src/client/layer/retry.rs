//! Middleware for retrying requests.

use std::{fmt, sync::Arc, time::Duration};

use log::trace;

use crate::{
    client::{handler::Handler, stack::Middleware},
    error::Error,
    promise::{Next, Promise},
    retry::{exponential_delay, Attempt},
    Options, Request, Response,
};

type Decider = Arc<dyn Fn(&Attempt<'_>) -> bool + Send + Sync>;
type Delay = Arc<dyn Fn(u32, Option<&Response>) -> Duration + Send + Sync>;

/// Middleware that sends a request again while a decider asks for it.
///
/// Each retry increments the `retries` option and stores the delay for the
/// next attempt in the `delay` option before calling itself again, so the
/// decider sees every attempt of the chain.
#[derive(Clone)]
pub struct RetryMiddleware {
    next: Handler,
    decider: Decider,
    delay: Delay,
}

// ===== impl RetryMiddleware =====

impl RetryMiddleware {
    /// Wrap `next`, retrying whenever `decider` returns true.
    ///
    /// The delay before each retry defaults to [`exponential_delay`].
    pub fn new<D>(decider: D, next: Handler) -> Self
    where
        D: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
    {
        RetryMiddleware {
            next,
            decider: Arc::new(decider),
            delay: Arc::new(|retries: u32, _: Option<&Response>| exponential_delay(retries)),
        }
    }

    /// Compute the delay before a retry from the retry count and, when the
    /// attempt produced one, the response.
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(u32, Option<&Response>) -> Duration + Send + Sync + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    /// Send `request`, retrying as decided.
    pub fn call(&self, request: Request, options: Options) -> Promise<Response> {
        let retries = options.retries().unwrap_or(0);
        let options = options.with_retries(retries);

        let on_fulfilled = {
            let this = self.clone();
            let request = request.clone();
            let options = options.clone();
            move |response: Response| -> crate::Result<Next<Response>> {
                let attempt = Attempt {
                    retries,
                    request: &request,
                    outcome: Ok(&response),
                };
                if !(this.decider)(&attempt) {
                    return Ok(Next::Value(response));
                }
                Ok(Next::Promise(this.retry(request, options, Some(&response))))
            }
        };

        let on_rejected = {
            let this = self.clone();
            let request = request.clone();
            let options = options.clone();
            move |error: Error| -> crate::Result<Next<Response>> {
                let attempt = Attempt {
                    retries,
                    request: &request,
                    outcome: Err(&error),
                };
                if !(this.decider)(&attempt) {
                    return Err(error);
                }
                Ok(Next::Promise(this.retry(request, options, None)))
            }
        };

        self.next
            .call(request, options)
            .then(on_fulfilled, on_rejected)
    }

    fn retry(&self, request: Request, options: Options, response: Option<&Response>) -> Promise<Response> {
        let retries = options.retries().unwrap_or(0) + 1;
        let delay = (self.delay)(retries, response);
        trace!("retrying {} {} (retry {retries}, delay {delay:?})", request.method(), request.url());

        let options = options.with_retries(retries).with_delay(delay);
        self.call(request, options)
    }
}

impl fmt::Debug for RetryMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RetryMiddleware")
            .field("next", &self.next)
            .finish()
    }
}

impl From<RetryMiddleware> for Handler {
    fn from(retry: RetryMiddleware) -> Self {
        Handler::new(move |request, options| retry.call(request, options)).named("RetryMiddleware")
    }
}

/// Middleware retrying requests while `decider` returns true, with the
/// default exponential delay.
pub fn retry<D>(decider: D) -> Middleware
where
    D: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
{
    let decider: Decider = Arc::new(decider);
    Middleware::new(move |next| {
        let decider = decider.clone();
        RetryMiddleware::new(move |attempt: &Attempt<'_>| decider(attempt), next).into()
    })
    .named("retry")
}

/// Like [`retry`], with a custom delay function.
pub fn retry_with_delay<D, F>(decider: D, delay: F) -> Middleware
where
    D: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
    F: Fn(u32, Option<&Response>) -> Duration + Send + Sync + 'static,
{
    let decider: Decider = Arc::new(decider);
    let delay: Delay = Arc::new(delay);
    Middleware::new(move |next| {
        let decider = decider.clone();
        let delay = delay.clone();
        RetryMiddleware::new(move |attempt: &Attempt<'_>| decider(attempt), next)
            .with_delay(move |retries, response| delay(retries, response))
            .into()
    })
    .named("retry")
}
