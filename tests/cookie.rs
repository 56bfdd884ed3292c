mod support;

use std::sync::Arc;

use reqstack::{
    cookie::{CookieJar, Jar},
    handler::MockHandler,
    header::{HeaderValue, COOKIE, SET_COOKIE},
    Client, Options, Url,
};
use support::ok;

#[test]
fn jar_scopes_cookies_by_url() {
    let jar = Jar::default();
    let url: Url = "https://example.com/app/login".parse().unwrap();

    let values = [
        HeaderValue::from_static("session=abc; Path=/app"),
        HeaderValue::from_static("theme=dark; Path=/"),
        HeaderValue::from_static("secure_only=1; Secure"),
    ];
    jar.set_cookies(&mut values.iter(), &url);
    assert_eq!(jar.len(), 3);

    let app = jar.cookies(&"https://example.com/app/page".parse().unwrap()).unwrap();
    let app = app.to_str().unwrap();
    assert!(app.contains("session=abc"));
    assert!(app.contains("theme=dark"));

    let root = jar.cookies(&"http://example.com/".parse().unwrap()).unwrap();
    assert_eq!(root, "theme=dark");

    assert!(jar.cookies(&"https://other.test/".parse().unwrap()).is_none());

    jar.remove("theme", &"https://example.com/".parse().unwrap());
    assert_eq!(jar.len(), 2);
    jar.clear();
    assert!(jar.is_empty());
}

#[test]
fn expired_cookies_are_dropped() {
    let jar = Jar::default();
    let url: Url = "http://example.com/".parse().unwrap();
    jar.add_cookie_str("gone=1; Max-Age=0", &url);
    assert!(jar.cookies(&url).is_none());
    assert!(jar.iter().is_empty());
}

#[test]
fn client_cookie_store_round_trip() {
    let mock = MockHandler::new([
        ok().with_header(SET_COOKIE, HeaderValue::from_static("id=42; Path=/")),
        ok(),
    ]);
    let client = Client::builder()
        .handler(mock.clone().into())
        .cookie_store(true)
        .build()
        .unwrap();

    client.get("http://example.com/login", Options::new()).unwrap();
    assert!(!mock.last_request().unwrap().has_header(COOKIE));

    client
        .get(
            "http://example.com/home",
            Options::new().with_header(COOKIE, HeaderValue::from_static("stale=1")),
        )
        .unwrap();
    assert_eq!(mock.last_request().unwrap().headers()[COOKIE], "id=42");
}

#[test]
fn shared_provider_and_per_call_jar() {
    let shared = Arc::new(Jar::default());
    let url: Url = "http://example.com/".parse().unwrap();
    shared.add_cookie_str("pre=filled", &url);

    let mock = MockHandler::new([ok(), ok()]);
    let client = Client::builder()
        .handler(mock.clone().into())
        .cookie_provider(shared.clone())
        .build()
        .unwrap();

    client.get("http://example.com/", Options::new()).unwrap();
    assert_eq!(mock.last_request().unwrap().headers()[COOKIE], "pre=filled");

    let other: Arc<dyn CookieJar> = Arc::new(Jar::default());
    other.set_cookies(
        &mut [HeaderValue::from_static("call=only")].iter(),
        &url,
    );
    client
        .get("http://example.com/", Options::new().with_cookies(other))
        .unwrap();
    assert_eq!(mock.last_request().unwrap().headers()[COOKIE], "call=only");
}
