mod support;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use reqstack::{
    handler::{mock::MockItem, MockHandler},
    layer,
    retry::{exponential_delay, Attempt},
    Error, HandlerStack, Method, Options, Request, Response, StatusCode,
};
use support::ok;

fn request() -> Request {
    Request::new(Method::GET, "http://example.com/").unwrap()
}

#[test]
fn test_retries_server_errors_through_stack() {
    let mock = MockHandler::new([
        Response::new(StatusCode::SERVICE_UNAVAILABLE),
        Response::new(StatusCode::SERVICE_UNAVAILABLE),
        ok(),
    ]);
    let mut stack = HandlerStack::with_handler(mock.clone().into());
    stack.push(
        layer::retry(|attempt: &Attempt<'_>| {
            attempt.retries() < 5 && attempt.status().is_some_and(|s| s.is_server_error())
        }),
        "retry",
    );

    let res = stack.call(request(), Options::new()).wait().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(mock.is_empty());

    let options = mock.last_options().unwrap();
    assert_eq!(options.retries(), Some(2));
    assert_eq!(options.delay(), Some(exponential_delay(2)));
}

#[test]
fn test_decider_twice_then_stop_computes_two_delays() {
    let mock = MockHandler::new([
        ok().with_body("first"),
        ok().with_body("second"),
        ok().with_body("third"),
    ]);
    let decisions = Arc::new(Mutex::new(0u32));
    let delays = Arc::new(Mutex::new(Vec::new()));
    let (decided, computed) = (decisions.clone(), delays.clone());

    let mut stack = HandlerStack::with_handler(mock.clone().into());
    stack.push(
        layer::retry_with_delay(
            move |attempt: &Attempt<'_>| {
                *decided.lock().unwrap() += 1;
                attempt.retries() < 2
            },
            move |retries, _: Option<&Response>| {
                computed.lock().unwrap().push(retries);
                exponential_delay(retries)
            },
        ),
        "retry",
    );

    let res = stack.call(request(), Options::new()).wait().unwrap();
    assert_eq!(res.text(), "third");
    assert!(mock.is_empty());
    assert_eq!(*decisions.lock().unwrap(), 3);
    assert_eq!(*delays.lock().unwrap(), [1, 2]);
}

#[test]
fn test_gives_up_and_returns_last_outcome() {
    let mock = MockHandler::new([
        MockItem::from(Error::connect("refused")),
        MockItem::from(Error::connect("refused again")),
    ]);
    let mut stack = HandlerStack::with_handler(mock.clone().into());
    stack.push(
        layer::retry(|attempt: &Attempt<'_>| attempt.is_error() && attempt.retries() < 1),
        "retry",
    );

    let err = stack.call(request(), Options::new()).wait().unwrap_err();
    assert!(err.is_connect());
    assert!(err.to_string().contains("refused again"));
    assert!(mock.is_empty());
}

#[test]
fn test_custom_delay_sees_response() {
    let mock = MockHandler::new([
        Response::new(StatusCode::TOO_MANY_REQUESTS)
            .with_header(
                reqstack::header::RETRY_AFTER,
                reqstack::header::HeaderValue::from_static("2"),
            ),
        ok(),
    ]);
    let delays = Arc::new(Mutex::new(Vec::new()));
    let seen = delays.clone();

    let mut stack = HandlerStack::with_handler(mock.clone().into());
    stack.push(
        layer::retry_with_delay(
            |attempt: &Attempt<'_>| attempt.status() == Some(StatusCode::TOO_MANY_REQUESTS),
            move |retries, response: Option<&Response>| {
                let secs = response
                    .and_then(|r| r.headers().get(reqstack::header::RETRY_AFTER))
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                seen.lock().unwrap().push(retries);
                Duration::from_millis(secs)
            },
        ),
        "retry",
    );

    stack.call(request(), Options::new()).wait().unwrap();
    assert_eq!(*delays.lock().unwrap(), [1]);
    assert_eq!(mock.last_options().unwrap().delay(), Some(Duration::from_millis(2)));
}

#[test]
fn test_retry_count_starts_from_options() {
    let mock = MockHandler::new([Response::new(StatusCode::BAD_GATEWAY), ok()]);
    let mut stack = HandlerStack::with_handler(mock.clone().into());
    stack.push(
        layer::retry(|attempt: &Attempt<'_>| attempt.retries() < 4 && attempt.status() != Some(StatusCode::OK)),
        "retry",
    );

    stack
        .call(request(), Options::new().with_retries(3))
        .wait()
        .unwrap();
    assert_eq!(mock.last_options().unwrap().retries(), Some(4));
}
