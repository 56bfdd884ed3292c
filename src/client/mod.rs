pub use self::http::{Client, ClientBuilder};
pub use self::options::{Credentials, Expect, OnHeaders, OnStats, Options};
pub use self::request::Request;
pub use self::response::Response;
pub use self::stack::{HandlerStack, Middleware, Removal};
pub use self::stats::TransferStats;

pub mod handler;
mod http;
pub mod layer;
pub(crate) mod options;
mod request;
mod response;
pub(crate) mod stack;
mod stats;
