mod support;

use std::sync::{Arc, Mutex};

use reqstack::{
    handler::MockHandler, Handler, HandlerStack, Method, Middleware, Options, Promise, Request,
    Response, StatusCode,
};

type CallLog = Arc<Mutex<Vec<(String, String)>>>;

// The terminal handler answers "Hello - <value>" where the value travels in
// the request body; each layer appends its digit on the way in.
fn hello() -> Handler {
    Handler::new(|req: Request, _| {
        let v = String::from_utf8_lossy(req.body()).into_owned();
        Promise::fulfilled(Response::new(StatusCode::OK).with_body(format!("Hello - {v}")))
    })
    .named("hello")
}

fn append(name: &'static str, digit: &'static str, calls: &CallLog) -> Middleware {
    let calls = calls.clone();
    Middleware::new(move |next: Handler| {
        let calls = calls.clone();
        Handler::new(move |req: Request, options: Options| {
            let v = String::from_utf8_lossy(req.body()).into_owned();
            calls.lock().unwrap().push((name.to_owned(), v.clone()));
            next.call(req.with_body(format!("{v}{digit}")), options)
        })
    })
    .named(name)
}

fn send(stack: &HandlerStack) -> String {
    let req = Request::new(Method::GET, "http://example.com/")
        .unwrap()
        .with_body("test");
    stack.call(req, Options::new()).wait().unwrap().text()
}

fn logged(calls: &CallLog) -> Vec<(String, String)> {
    calls.lock().unwrap().clone()
}

fn entry(name: &str, value: &str) -> (String, String) {
    (name.to_owned(), value.to_owned())
}

#[test]
fn test_pushed_middleware_wraps_outside_in() {
    let calls = CallLog::default();
    let mut stack = HandlerStack::with_handler(hello());
    stack.push(append("a", "1", &calls), "a");
    stack.push(append("b", "2", &calls), "b");
    stack.push(append("c", "3", &calls), "c");

    assert_eq!(send(&stack), "Hello - test123");
    assert_eq!(
        logged(&calls),
        [entry("a", "test"), entry("b", "test1"), entry("c", "test12")]
    );
}

#[test]
fn test_unshifted_middleware_becomes_outermost() {
    let calls = CallLog::default();
    let mut stack = HandlerStack::with_handler(hello());
    stack.unshift(append("a", "1", &calls), "a");
    stack.unshift(append("b", "2", &calls), "b");
    stack.unshift(append("c", "3", &calls), "c");

    assert_eq!(send(&stack), "Hello - test321");
    assert_eq!(
        logged(&calls),
        [entry("c", "test"), entry("b", "test3"), entry("a", "test32")]
    );
}

#[test]
fn test_before_and_after_splice_next_to_named_entry() {
    let calls = CallLog::default();
    let mut stack = HandlerStack::with_handler(hello());
    stack.push(append("b", "2", &calls), "b");
    stack.before("b", append("a", "1", &calls), "a").unwrap();
    stack.after("b", append("c", "3", &calls), "c").unwrap();

    assert_eq!(send(&stack), "Hello - test123");
    assert!(stack
        .after("missing", append("d", "4", &calls), "d")
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
fn test_remove_by_name_and_instance() {
    let calls = CallLog::default();
    let mut stack = HandlerStack::with_handler(hello());
    let b = append("b", "2", &calls);
    stack.push(append("a", "1", &calls), "a");
    stack.push(b.clone(), "b");
    stack.push(append("c", "3", &calls), "c");
    stack.push(append("a", "1", &calls), "a");

    stack.remove("a");
    stack.remove(&b);
    assert_eq!(stack.len(), 1);
    assert_eq!(send(&stack), "Hello - test3");
}

#[test]
fn test_resolve_reflects_current_state() {
    let calls = CallLog::default();
    let mut stack = HandlerStack::new();
    assert!(!stack.has_handler());
    assert!(stack.resolve().unwrap_err().is_logic());

    stack.set_handler(hello());
    let before = stack.resolve().unwrap();
    stack.push(append("a", "1", &calls), "a");

    let req = Request::new(Method::GET, "http://example.com/")
        .unwrap()
        .with_body("x");
    assert_eq!(before.call(req, Options::new()).wait().unwrap().text(), "Hello - x");
    assert_eq!(send(&stack), "Hello - test1");
}

#[test]
fn test_display_lists_names_and_functions() {
    let calls = CallLog::default();
    let mut stack = HandlerStack::with_handler(hello());
    stack.push(append("a", "1", &calls), "first");
    stack.push(append("b", "2", &calls), "second");

    let printed = stack.to_string();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(
        lines,
        [
            "> 2) Name: 'first', Function: a",
            "> 1) Name: 'second', Function: b",
            "< 0) Handler: hello",
            "< 1) Name: 'second', Function: b",
            "< 2) Name: 'first', Function: a",
        ]
    );
}

#[test]
fn test_create_installs_default_middleware() {
    let mock = MockHandler::new([Response::new(StatusCode::NOT_FOUND)]);
    let stack = HandlerStack::create(mock.into());
    let printed = stack.to_string();
    assert!(printed.contains("Name: 'http_errors'"));
    assert!(printed.contains("Name: 'allow_redirects'"));
    assert!(printed.contains("Name: 'prepare_body'"));

    let req = Request::new(Method::GET, "http://example.com/").unwrap();
    let err = stack
        .call(req, Options::new().with_http_errors(true))
        .wait()
        .unwrap_err();
    assert!(err.is_client_error());
}
