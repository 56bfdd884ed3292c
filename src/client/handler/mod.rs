//! Handlers: the unit of composition of a [`HandlerStack`](crate::HandlerStack).
//!
//! A [`Handler`] turns a request and its options into a
//! [`Promise`] of a response. Transports are handlers, and so is the result
//! of wrapping a handler in middleware.

use std::{any::type_name, borrow::Cow, fmt, future::Future, sync::Arc, time::Instant};

use log::trace;

use crate::{
    client::stats::TransferStats,
    error::{Error, Result},
    promise::Promise,
    Options, Request, Response,
};

pub mod mock;
pub mod proxy;

pub use self::mock::{MockHandler, MockItem};
pub use self::proxy::{wrap_streaming, wrap_sync};

type HandlerFn = dyn Fn(Request, Options) -> Promise<Response> + Send + Sync;

/// A cloneable function `(Request, Options) -> Promise<Response>`.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerFn>,
    name: Cow<'static, str>,
}

impl Handler {
    /// Wrap a function as a handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Request, Options) -> Promise<Response> + Send + Sync + 'static,
    {
        Handler {
            inner: Arc::new(f),
            name: Cow::Borrowed(type_name::<F>()),
        }
    }

    /// Adapt an async transport function into a handler.
    ///
    /// The returned handler sleeps for the `delay` option before sending,
    /// enforces the `timeout` option, runs the `on_headers` callback on the
    /// response and reports `on_stats`.
    ///
    /// ```
    /// use reqstack::{Handler, Options, Request, Response, StatusCode};
    ///
    /// let transport = Handler::from_async(|_req: Request, _opts: Options| async {
    ///     Ok(Response::new(StatusCode::NO_CONTENT))
    /// });
    /// let request = Request::new(reqstack::Method::GET, "http://example.com").unwrap();
    /// let response = transport.call(request, Options::new()).wait().unwrap();
    /// assert_eq!(response.status(), StatusCode::NO_CONTENT);
    /// ```
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, Options) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        let name = type_name::<F>();
        Handler::new(move |request: Request, options: Options| {
            let transfer = f(request.clone(), options.clone());
            Promise::from_future(async move {
                if let Some(delay) = options.delay().filter(|d| !d.is_zero()) {
                    trace!("delaying {} by {:?}", request.url(), delay);
                    tokio::time::sleep(delay).await;
                }

                let started = Instant::now();
                let result = match options.timeout().filter(|t| !t.is_zero()) {
                    Some(timeout) => tokio::time::timeout(timeout, transfer)
                        .await
                        .unwrap_or_else(|_| Err(Error::timed_out(request.clone()))),
                    None => transfer.await,
                };

                let result = result
                    .map_err(|e| {
                        if e.request_ref().is_none() {
                            e.with_request(request.clone())
                        } else {
                            e
                        }
                    })
                    .and_then(|response| check_headers(&request, &options, response));

                report_stats(&request, &options, result.as_ref(), started.elapsed());
                result
            })
        })
        .named(name)
    }

    /// Set the name shown when the handler is printed.
    pub fn named<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// The handler's name, by default the type name of its function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the handler.
    #[inline]
    pub fn call(&self, request: Request, options: Options) -> Promise<Response> {
        (self.inner)(request, options)
    }

    /// Returns true when both handlers share the same function.
    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Run the `on_headers` callback of `options` against `response`.
pub(crate) fn check_headers(
    request: &Request,
    options: &Options,
    response: Response,
) -> Result<Response> {
    match options.on_headers() {
        Some(on_headers) => match on_headers(&response) {
            Ok(()) => Ok(response),
            Err(e) => Err(Error::on_headers(e, request.clone(), response)),
        },
        None => Ok(response),
    }
}

pub(crate) fn report_stats(
    request: &Request,
    options: &Options,
    outcome: std::result::Result<&Response, &Error>,
    elapsed: std::time::Duration,
) {
    if let Some(on_stats) = options.on_stats() {
        on_stats(&TransferStats::new(request.clone(), outcome, elapsed));
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::*;
    use crate::{Method, StatusCode};

    fn request() -> Request {
        Request::new(Method::GET, "http://example.com/").unwrap()
    }

    #[test]
    fn call_and_name() {
        let handler = Handler::new(|_, _| Promise::fulfilled(Response::new(StatusCode::OK)));
        assert!(handler.name().contains("closure"));

        let handler = handler.named("ok");
        assert_eq!(handler.to_string(), "ok");
        assert!(handler.ptr_eq(&handler.clone()));

        let res = handler.call(request(), Options::new()).wait().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn from_async_times_out() {
        let handler = Handler::from_async(|_, _| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Response::default())
        });

        let options = Options::new().with_timeout(Duration::from_millis(10));
        let err = handler.call(request(), options).wait().unwrap_err();
        assert!(err.is_timeout());
        assert!(err.request_ref().is_some());
    }

    #[test]
    fn from_async_reports_stats_and_checks_headers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stats = seen.clone();

        let handler = Handler::from_async(|_, _| async { Ok(Response::new(StatusCode::ACCEPTED)) });
        let options = Options::new()
            .with_on_stats(move |s| stats.lock().unwrap().push(s.has_response()))
            .with_on_headers(|res| {
                if res.status() == StatusCode::ACCEPTED {
                    Err(Error::request("not accepted"))
                } else {
                    Ok(())
                }
            });

        let err = handler.call(request(), options).wait().unwrap_err();
        assert!(err.is_request());
        assert!(err
            .to_string()
            .contains("an error was encountered during the on_headers event"));
        assert_eq!(err.response().unwrap().status(), StatusCode::ACCEPTED);
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[test]
    fn from_async_attaches_request_to_errors() {
        let handler = Handler::from_async(|_, _| async { Err(Error::connect("refused")) });
        let err = handler.call(request(), Options::new()).wait().unwrap_err();
        assert!(err.is_connect());
        assert!(!err.has_response());
        assert_eq!(err.request_ref().unwrap().url().as_str(), "http://example.com/");
    }
}
