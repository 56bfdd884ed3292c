#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # reqstack
//!
//! The `reqstack` crate provides a composable HTTP client pipeline. It does
//! not open connections itself: a transport is any [`Handler`], a function
//! turning a [`Request`] and its [`Options`] into a [`Promise`] of a
//! [`Response`]. Everything else is built by wrapping handlers.
//!
//! - [`HandlerStack`]: a named, ordered list of [`Middleware`] around a
//!   transport
//! - [`Promise`]: a shareable, chainable eventual result that can be awaited
//!   or waited on
//! - [Retries](crate::retry) and [redirects](crate::redirect) as middleware
//! - [`Pool`](crate::pool::Pool): many requests with bounded concurrency
//! - Cookies, transaction history, error statuses, request/response mapping
//!
//! ## Making a request
//!
//! A [`Client`] resolves its stack once and merges its own options under the
//! options of every call. The [`MockHandler`](crate::handler::MockHandler)
//! answers from a queue, which makes it a convenient transport for tests.
//!
//! ```rust
//! use reqstack::{handler::MockHandler, Client, Options, Response, StatusCode};
//!
//! let mock = MockHandler::new([Response::new(StatusCode::OK).with_body("hello")]);
//! let client = Client::builder().handler(mock.into()).build()?;
//!
//! let response = client.get("http://example.com/", Options::new())?;
//! assert_eq!(response.text(), "hello");
//! # Ok::<(), reqstack::Error>(())
//! ```
//!
//! Inside async code, use the `_async` variants and `.await` the promise:
//!
//! ```rust
//! # use reqstack::{handler::MockHandler, Client, Options, Response};
//! # async fn run() -> Result<(), reqstack::Error> {
//! # let client = Client::builder().handler(MockHandler::new([Response::default()]).into()).build()?;
//! let response = client.get_async("http://example.com/", Options::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Middleware
//!
//! Middleware wraps the handler below it. The first entry of a stack is the
//! outermost layer: it sees the request first and the response last.
//!
//! ```rust
//! use reqstack::{handler::MockHandler, layer, HandlerStack, Response};
//!
//! let mut stack = HandlerStack::create(MockHandler::new([Response::default()]).into());
//! stack.unshift(layer::log(log::Level::Debug), "log");
//! stack.push(layer::retry(|attempt| attempt.is_error() && attempt.retries() < 2), "retry");
//! println!("{stack}");
//! ```
//!
//! ## Optional Features
//!
//! The following are a list of [Cargo features][cargo-features] that can be
//! enabled or disabled:
//!
//! - **cookies** *(enabled by default)*: Provides cookie session support.
//! - **json** *(enabled by default)*: Provides serialization and
//!   deserialization for JSON bodies and loading [`Options`] from JSON.
//!
//! [cargo-features]: https://doc.rust-lang.org/stable/cargo/reference/manifest.html#the-features-section

pub use http::header;
pub use http::Method;
pub use http::{StatusCode, Version};
pub use url::Url;

// universal mods
mod error;
mod into_url;

pub use self::error::{BoxError, Error, Result};
pub use self::into_url::IntoUrl;

fn _assert_impls() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    fn assert_clone<T: Clone>() {}

    assert_send::<Client>();
    assert_sync::<Client>();
    assert_clone::<Client>();

    assert_send::<Request>();
    assert_send::<Response>();
    assert_send::<Options>();

    assert_send::<Promise<Response>>();
    assert_sync::<Promise<Response>>();

    assert_send::<HandlerStack>();
    assert_sync::<Handler>();

    assert_send::<Error>();
    assert_sync::<Error>();
}

pub use self::client::{
    handler, layer, Client, ClientBuilder, Credentials, Expect, HandlerStack, Middleware,
    OnHeaders, OnStats, Options, Removal, Request, Response, TransferStats,
};
pub use self::client::handler::Handler;
pub use self::promise::{Next, Promise, PromiseState};

mod client;
#[cfg(feature = "cookies")]
pub mod cookie;
pub mod pool;
pub mod promise;
pub mod redirect;
pub mod retry;
mod util;
