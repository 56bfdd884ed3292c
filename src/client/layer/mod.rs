//! Middleware for a [`HandlerStack`](crate::HandlerStack).
//!
//! Every function here returns a [`Middleware`](crate::Middleware) ready to
//! be pushed onto a stack under a name of your choice.

#[cfg(feature = "cookies")]
mod cookie;
mod history;
mod http_errors;
mod logging;
mod prepare_body;
pub mod redirect;
pub mod retry;
mod tap;

#[cfg(feature = "cookies")]
pub use self::cookie::cookies;
pub use self::{
    history::{history, History, Transaction},
    http_errors::http_errors,
    logging::log,
    prepare_body::prepare_body,
    redirect::{redirect, RedirectMiddleware},
    retry::{retry, retry_with_delay, RetryMiddleware},
    tap::{map_request, map_response, tap},
};
