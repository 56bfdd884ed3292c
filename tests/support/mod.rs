#![allow(dead_code)]

use reqstack::{
    handler::MockHandler,
    header::{HeaderValue, LOCATION},
    Client, HandlerStack, Response, StatusCode,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ok() -> Response {
    Response::new(StatusCode::OK)
}

pub fn redirect_to(status: u16, location: &str) -> Response {
    Response::new(StatusCode::from_u16(status).unwrap())
        .with_header(LOCATION, HeaderValue::from_str(location).unwrap())
}

/// A client with the default stack in front of `mock`.
pub fn client(mock: &MockHandler) -> Client {
    init_logging();
    Client::builder()
        .handler(mock.clone().into())
        .build()
        .unwrap()
}

/// A client sending through `stack`, with `mock` as its handler.
pub fn client_with_stack(mock: &MockHandler, stack: HandlerStack) -> Client {
    init_logging();
    Client::builder()
        .stack(stack)
        .handler(mock.clone().into())
        .build()
        .unwrap()
}
