//! Sending many requests with bounded concurrency.
//!
//! A [`Pool`] pulls items lazily from an iterator and keeps at most a
//! window of them in flight. Every completion is reported to the configured
//! callbacks together with the item's key, and the freed slot is refilled
//! right away.
//!
//! ```
//! use reqstack::{handler::MockHandler, pool::{Pool, PoolConfig}, Client, Method, Request, Response};
//!
//! let mock = MockHandler::new((0..3).map(|_| Response::default()));
//! let client = Client::builder().handler(mock.into()).build().unwrap();
//!
//! let requests = (0..3).map(|i| {
//!     Request::new(Method::GET, format!("http://example.com/{i}").as_str()).unwrap()
//! });
//! let results = Pool::batch(&client, requests, PoolConfig::new().concurrency(2));
//! assert!(results.iter().all(Result::is_ok));
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{debug, trace};

use crate::{
    error::{Error, Result},
    promise::Promise,
    Client, Options, Request, Response,
};

type Task = Box<dyn FnOnce(Options) -> Promise<Response> + Send>;
type OnFulfilled<K> = Arc<dyn Fn(Response, &K) -> Result<()> + Send + Sync>;
type OnRejected<K> = Arc<dyn Fn(Error, &K) -> Result<()> + Send + Sync>;

/// Default number of items in flight.
pub const DEFAULT_CONCURRENCY: usize = 25;

/// One unit of work for a [`Pool`].
pub enum PoolItem {
    /// A request sent through the pool's client.
    Request(Request),
    /// A function producing the response promise from the pool options.
    Task(Task),
}

impl PoolItem {
    /// Wrap a function as a pool item.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce(Options) -> Promise<Response> + Send + 'static,
    {
        PoolItem::Task(Box::new(f))
    }
}

impl From<Request> for PoolItem {
    fn from(request: Request) -> Self {
        PoolItem::Request(request)
    }
}

impl fmt::Debug for PoolItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolItem::Request(request) => f.debug_tuple("Request").field(request).finish(),
            PoolItem::Task(_) => f.pad("Task"),
        }
    }
}

/// How many items a [`Pool`] keeps in flight.
#[derive(Clone)]
pub enum Concurrency {
    /// A fixed window.
    Fixed(usize),
    /// A window computed from the number of items currently in flight,
    /// asked again before every refill.
    Dynamic(Arc<dyn Fn(usize) -> usize + Send + Sync>),
}

impl Concurrency {
    fn limit(&self, in_flight: usize) -> usize {
        let limit = match self {
            Concurrency::Fixed(n) => *n,
            Concurrency::Dynamic(f) => f(in_flight),
        };
        // A window of zero with nothing in flight would never finish.
        if in_flight == 0 {
            limit.max(1)
        } else {
            limit
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::Fixed(DEFAULT_CONCURRENCY)
    }
}

impl From<usize> for Concurrency {
    fn from(n: usize) -> Self {
        Concurrency::Fixed(n)
    }
}

impl fmt::Debug for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Concurrency::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Concurrency::Dynamic(_) => f.pad("Dynamic"),
        }
    }
}

/// Configuration of a [`Pool`] whose items are keyed by `K`.
pub struct PoolConfig<K = usize> {
    concurrency: Concurrency,
    options: Options,
    fulfilled: Option<OnFulfilled<K>>,
    rejected: Option<OnRejected<K>>,
}

impl<K> PoolConfig<K> {
    /// Default configuration: 25 items in flight, no options, no callbacks.
    pub fn new() -> Self {
        PoolConfig {
            concurrency: Concurrency::default(),
            options: Options::new(),
            fulfilled: None,
            rejected: None,
        }
    }

    /// Set the window size.
    pub fn concurrency<C: Into<Concurrency>>(mut self, concurrency: C) -> Self {
        self.concurrency = concurrency.into();
        self
    }

    /// Compute the window size from the number of items in flight.
    pub fn dynamic_concurrency<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> usize + Send + Sync + 'static,
    {
        self.concurrency = Concurrency::Dynamic(Arc::new(f));
        self
    }

    /// Options passed with every item.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Called with every response and its key. Returning an error rejects
    /// the pool and stops pulling new items.
    pub fn fulfilled<F>(mut self, f: F) -> Self
    where
        F: Fn(Response, &K) -> Result<()> + Send + Sync + 'static,
    {
        self.fulfilled = Some(Arc::new(f));
        self
    }

    /// Called with every error and its key. Returning an error rejects the
    /// pool and stops pulling new items.
    pub fn rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Error, &K) -> Result<()> + Send + Sync + 'static,
    {
        self.rejected = Some(Arc::new(f));
        self
    }
}

impl<K> Default for PoolConfig<K> {
    fn default() -> Self {
        PoolConfig::new()
    }
}

impl<K> fmt::Debug for PoolConfig<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("concurrency", &self.concurrency)
            .field("options", &self.options)
            .field("fulfilled", &self.fulfilled.is_some())
            .field("rejected", &self.rejected.is_some())
            .finish()
    }
}

/// Sends the items of an iterator through a [`Client`], a window at a time.
///
/// The pool settles once the iterator is exhausted and nothing is in flight.
/// Failed items are reported to the `rejected` callback and never reject the
/// pool itself; only a callback returning an error does.
#[derive(Clone)]
pub struct Pool {
    promise: Promise<()>,
}

impl Pool {
    /// A pool over `items`, keyed by their position.
    pub fn new<I>(client: &Client, items: I, config: PoolConfig<usize>) -> Pool
    where
        I: IntoIterator,
        I::Item: Into<PoolItem>,
        I::IntoIter: Send + 'static,
    {
        Pool::keyed(client, items.into_iter().enumerate(), config)
    }

    /// A pool over `(key, item)` pairs; callbacks receive the key.
    pub fn keyed<K, T, I>(client: &Client, items: I, config: PoolConfig<K>) -> Pool
    where
        K: Send + 'static,
        T: Into<PoolItem>,
        I: IntoIterator<Item = (K, T)>,
        I::IntoIter: Send + 'static,
    {
        let client = client.clone();
        let mut source = items.into_iter();

        let promise = Promise::from_future(async move {
            let PoolConfig {
                concurrency,
                options,
                fulfilled,
                rejected,
            } = config;
            let mut in_flight = FuturesUnordered::new();
            let mut exhausted = false;

            loop {
                if !exhausted {
                    let limit = concurrency.limit(in_flight.len());
                    while in_flight.len() < limit {
                        let Some((key, item)) = source.next() else {
                            exhausted = true;
                            break;
                        };
                        let promise = match item.into() {
                            PoolItem::Request(request) => {
                                trace!("pool dispatching {} {}", request.method(), request.url());
                                client.send_async(request, options.clone())
                            }
                            PoolItem::Task(task) => task(options.clone()),
                        };
                        in_flight.push(async move { (key, promise.await) });
                    }
                }

                let Some((key, result)) = in_flight.next().await else {
                    break;
                };
                match result {
                    Ok(response) => {
                        if let Some(f) = &fulfilled {
                            f(response, &key)?;
                        }
                    }
                    Err(error) => {
                        if let Some(f) = &rejected {
                            f(error, &key)?;
                        }
                    }
                }
            }

            debug!("pool drained");
            Ok(())
        });

        Pool { promise }
    }

    /// The promise settling when the pool is done.
    pub fn promise(&self) -> Promise<()> {
        self.promise.clone()
    }

    /// Send every item and wait for all of them.
    ///
    /// Results come back in the order of `items`, errors as values. The
    /// callbacks in `config` still run. If a callback fails, the items it
    /// left unfinished report its error.
    pub fn batch<I>(client: &Client, items: I, config: PoolConfig<usize>) -> Vec<Result<Response>>
    where
        I: IntoIterator,
        I::Item: Into<PoolItem>,
    {
        let items: Vec<PoolItem> = items.into_iter().map(Into::into).collect();
        let results: Arc<Mutex<Vec<Option<Result<Response>>>>> =
            Arc::new(Mutex::new((0..items.len()).map(|_| None).collect()));

        let user_fulfilled = config.fulfilled.clone();
        let user_rejected = config.rejected.clone();
        let store = results.clone();
        let config = config.fulfilled(move |response, &idx| {
            store_result(&store, idx, Ok(response.clone()));
            match &user_fulfilled {
                Some(f) => f(response, &idx),
                None => Ok(()),
            }
        });
        let store = results.clone();
        let config = config.rejected(move |error, &idx| {
            store_result(&store, idx, Err(error.clone()));
            match &user_rejected {
                Some(f) => f(error, &idx),
                None => Ok(()),
            }
        });

        let outcome = Pool::new(client, items, config).promise().wait();

        let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
        results
            .drain(..)
            .map(|slot| match (slot, &outcome) {
                (Some(result), _) => result,
                (None, Err(error)) => Err(error.clone()),
                (None, Ok(())) => Err(Error::unresolved("pool item was never settled")),
            })
            .collect()
    }
}

fn store_result(results: &Mutex<Vec<Option<Result<Response>>>>, idx: usize, result: Result<Response>) {
    let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(slot) = results.get_mut(idx) {
        *slot = Some(result);
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Pool")
            .field("state", &self.promise.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_still_progresses() {
        assert_eq!(Concurrency::Fixed(0).limit(0), 1);
        assert_eq!(Concurrency::Fixed(0).limit(2), 0);
        assert_eq!(Concurrency::Dynamic(Arc::new(|n| n + 2)).limit(1), 3);
    }
}
