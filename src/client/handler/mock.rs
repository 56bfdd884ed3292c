//! A queue-driven handler for tests and offline use.

use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use super::{check_headers, report_stats, Handler};
use crate::{
    error::{Error, Result},
    promise::Promise,
    Options, Request, Response,
};

type Callback = Arc<dyn Fn(&Request, &Options) -> Result<Response> + Send + Sync>;
type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One queued outcome of a [`MockHandler`].
#[derive(Clone)]
pub enum MockItem {
    /// Fulfill with this response.
    Response(Response),
    /// Reject with this error.
    Error(Error),
    /// Settle like this promise.
    Promise(Promise<Response>),
    /// Compute the outcome from the request and options.
    Callback(Callback),
}

impl MockItem {
    /// Queue a function computing the outcome.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Request, &Options) -> Result<Response> + Send + Sync + 'static,
    {
        MockItem::Callback(Arc::new(f))
    }
}

impl From<Response> for MockItem {
    fn from(response: Response) -> Self {
        MockItem::Response(response)
    }
}

impl From<Error> for MockItem {
    fn from(error: Error) -> Self {
        MockItem::Error(error)
    }
}

impl From<Promise<Response>> for MockItem {
    fn from(promise: Promise<Response>) -> Self {
        MockItem::Promise(promise)
    }
}

impl fmt::Debug for MockItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MockItem::Response(response) => f.debug_tuple("Response").field(response).finish(),
            MockItem::Error(error) => f.debug_tuple("Error").field(error).finish(),
            MockItem::Promise(_) => f.pad("Promise"),
            MockItem::Callback(_) => f.pad("Callback"),
        }
    }
}

/// A handler that answers each call with the next queued [`MockItem`].
///
/// Clones share the queue, so a test can keep a clone to inspect
/// [`last_request`](MockHandler::last_request) after handing the handler to
/// a stack.
///
/// ```
/// use reqstack::{handler::MockHandler, Handler, Method, Options, Request, Response, StatusCode};
///
/// let mock = MockHandler::new([Response::new(StatusCode::OK)]);
/// let handler = Handler::from(mock.clone());
///
/// let request = Request::new(Method::GET, "http://example.com").unwrap();
/// let response = handler.call(request, Options::new()).wait().unwrap();
/// assert_eq!(response.status(), StatusCode::OK);
/// assert!(mock.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockHandler {
    state: Arc<Mutex<State>>,
    on_fulfilled: Option<Observer<Response>>,
    on_rejected: Option<Observer<Error>>,
}

#[derive(Default)]
struct State {
    queue: VecDeque<MockItem>,
    last_request: Option<Request>,
    last_options: Option<Options>,
}

impl MockHandler {
    /// Create a mock handler answering with `items`, in order.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MockItem>,
    {
        let mock = MockHandler::default();
        mock.lock().queue.extend(items.into_iter().map(Into::into));
        mock
    }

    /// Observe every fulfilled response.
    pub fn on_fulfilled<F>(mut self, f: F) -> Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.on_fulfilled = Some(Arc::new(f));
        self
    }

    /// Observe every rejection.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_rejected = Some(Arc::new(f));
        self
    }

    /// Queue another item.
    pub fn append<T: Into<MockItem>>(&self, item: T) {
        self.lock().queue.push_back(item.into());
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Drop every queued item.
    pub fn reset(&self) {
        self.lock().queue.clear();
    }

    /// The request of the last call.
    pub fn last_request(&self) -> Option<Request> {
        self.lock().last_request.clone()
    }

    /// The options of the last call.
    pub fn last_options(&self) -> Option<Options> {
        self.lock().last_options.clone()
    }

    /// Answer a call with the next queued item.
    ///
    /// An empty queue rejects with a logic error. The `delay` option is
    /// honoured with a timer before the outcome settles.
    pub fn call(&self, request: Request, options: Options) -> Promise<Response> {
        let item = {
            let mut state = self.lock();
            let Some(item) = state.queue.pop_front() else {
                return Promise::rejected(Error::logic("mock queue is empty"));
            };
            state.last_request = Some(request.clone());
            state.last_options = Some(options.clone());
            item
        };

        let outcome = match item {
            MockItem::Response(response) => Promise::fulfilled(response),
            MockItem::Error(error) => Promise::rejected(error),
            MockItem::Promise(promise) => promise,
            MockItem::Callback(f) => Promise::ready(f(&request, &options)),
        };

        let on_fulfilled = self.on_fulfilled.clone();
        let on_rejected = self.on_rejected.clone();

        Promise::from_future(async move {
            if let Some(delay) = options.delay().filter(|d| !d.is_zero()) {
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let result = outcome
                .await
                .and_then(|response| check_headers(&request, &options, response));
            report_stats(&request, &options, result.as_ref(), started.elapsed());

            match &result {
                Ok(response) => {
                    if let Some(f) = &on_fulfilled {
                        f(response);
                    }
                }
                Err(error) => {
                    if let Some(f) = &on_rejected {
                        f(error);
                    }
                }
            }

            result
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl From<MockHandler> for Handler {
    fn from(mock: MockHandler) -> Self {
        Handler::new(move |request, options| mock.call(request, options)).named("MockHandler")
    }
}

impl fmt::Debug for MockHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MockHandler")
            .field("queued", &self.len())
            .finish()
    }
}
