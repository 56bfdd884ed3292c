use std::{fmt, sync::Arc};

use http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderMap, HeaderValue, Method,
};
use log::trace;
use url::ParseError;

#[cfg(feature = "cookies")]
use crate::cookie::{self, CookieJar};
use crate::{
    client::{handler::Handler, stack::HandlerStack},
    error::{Error, Result},
    into_url::{IntoUrl, IntoUrlSealed},
    promise::Promise,
    redirect::RedirectOption,
    util, Options, Request, Response, Url,
};

/// A `Client` sends requests through a [`HandlerStack`].
///
/// The stack is resolved once, when the client is built. Client options are
/// merged under the options of every call, so a call can override any of
/// them.
///
/// You do **not** have to wrap the `Client` in an [`Rc`] or [`Arc`] to
/// **reuse** it, because it already uses an [`Arc`] internally.
///
/// [`Rc`]: std::rc::Rc
///
/// ```
/// use reqstack::{handler::MockHandler, Client, Options, Response, StatusCode};
///
/// let client = Client::builder()
///     .handler(MockHandler::new([Response::new(StatusCode::OK)]).into())
///     .base_url("http://example.com/api/")
///     .build()
///     .unwrap();
///
/// let response = client.get("users", Options::new()).unwrap();
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

struct ClientRef {
    handler: Handler,
    base_url: Option<Url>,
    headers: HeaderMap,
    options: Options,
}

/// A `ClientBuilder` can be used to create a `Client` with custom
/// configuration.
#[must_use]
pub struct ClientBuilder {
    config: Config,
}

struct Config {
    error: Option<Error>,
    handler: Option<Handler>,
    stack: Option<HandlerStack>,
    base_url: Option<Url>,
    headers: HeaderMap,
    options: Options,
    #[cfg(feature = "cookies")]
    cookie_store: Option<Arc<dyn CookieJar>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Constructs a new `ClientBuilder`.
    ///
    /// This is the same as `Client::builder()`.
    pub fn new() -> ClientBuilder {
        ClientBuilder {
            config: Config {
                error: None,
                handler: None,
                stack: None,
                base_url: None,
                headers: HeaderMap::new(),
                options: Options::new(),
                #[cfg(feature = "cookies")]
                cookie_store: None,
            },
        }
    }

    /// Returns a `Client` that uses this `ClientBuilder` configuration.
    ///
    /// # Errors
    ///
    /// This method fails if an earlier setter received an invalid value, or
    /// if neither a handler nor a stack with a handler was given.
    pub fn build(self) -> Result<Client> {
        let config = self.config;

        if let Some(err) = config.error {
            return Err(err);
        }

        let stack = match (config.stack, config.handler) {
            (Some(mut stack), Some(handler)) => {
                stack.set_handler(handler);
                stack
            }
            (Some(stack), None) => stack,
            (None, Some(handler)) => HandlerStack::create(handler),
            (None, None) => {
                return Err(Error::invalid_argument(
                    "a handler or a handler stack is required",
                ))
            }
        };
        let handler = stack.resolve()?;
        trace!("client stack:\n{stack}");

        let mut options = Options::new()
            .with_http_errors(true)
            .with_allow_redirects(RedirectOption::default());
        #[cfg(feature = "cookies")]
        if let Some(jar) = config.cookie_store {
            options = options.with_cookies(jar);
        }
        options = options.merge(config.options);

        Ok(Client {
            inner: Arc::new(ClientRef {
                handler,
                base_url: config.base_url,
                headers: config.headers,
                options,
            }),
        })
    }

    /// Use `handler` as the terminal handler.
    ///
    /// Without an explicit [`stack`](ClientBuilder::stack) the handler is
    /// wrapped in [`HandlerStack::create`]. With one, it becomes the stack's
    /// handler.
    pub fn handler(mut self, handler: Handler) -> ClientBuilder {
        self.config.handler = Some(handler);
        self
    }

    /// Send requests through `stack`.
    pub fn stack(mut self, stack: HandlerStack) -> ClientBuilder {
        self.config.stack = Some(stack);
        self
    }

    /// Resolve relative request URIs against `url`.
    pub fn base_url<U: IntoUrl>(mut self, url: U) -> ClientBuilder {
        match url.into_url() {
            Ok(url) => self.config.base_url = Some(url),
            Err(err) => self.config.error = Some(err),
        }
        self
    }

    /// Sets the default headers for every request.
    ///
    /// A default header is only added when the request and its options do
    /// not set a header of the same name.
    pub fn default_headers(mut self, mut headers: HeaderMap) -> ClientBuilder {
        std::mem::swap(&mut self.config.headers, &mut headers);
        self
    }

    /// Sets the options every call starts from.
    ///
    /// They are merged over the client's own defaults (`http_errors`
    /// enabled, redirects followed).
    pub fn default_options(mut self, options: Options) -> ClientBuilder {
        self.config.options = options;
        self
    }

    /// Enable a persistent cookie store for the client.
    ///
    /// Cookies received in responses will be preserved and included in
    /// additional requests.
    ///
    /// By default, no cookie store is used.
    #[cfg(feature = "cookies")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cookies")))]
    pub fn cookie_store(mut self, enable: bool) -> ClientBuilder {
        self.config.cookie_store = if enable {
            Some(Arc::new(cookie::Jar::default()))
        } else {
            None
        };
        self
    }

    /// Set the persistent cookie store for the client.
    ///
    /// Cookies received in responses will be passed to this store, and
    /// additional requests will query this store for cookies.
    #[cfg(feature = "cookies")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cookies")))]
    pub fn cookie_provider<C: CookieJar + 'static>(mut self, cookie_store: Arc<C>) -> ClientBuilder {
        self.config.cookie_store = Some(cookie_store as _);
        self
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("ClientBuilder");
        builder
            .field("handler", &self.config.handler)
            .field("stack", &self.config.stack)
            .field("base_url", &self.config.base_url.as_ref().map(Url::as_str))
            .field("headers", &self.config.headers)
            .field("options", &self.config.options);
        #[cfg(feature = "cookies")]
        builder.field("cookie_store", &self.config.cookie_store.is_some());
        builder.finish()
    }
}

impl Client {
    /// Creates a `ClientBuilder` to configure a `Client`.
    ///
    /// This is the same as `ClientBuilder::new()`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The options every call starts from.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// The base URL relative URIs are resolved against.
    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    /// Send a request asynchronously.
    ///
    /// The client options are merged under `options`, the request options
    /// (headers, query, auth and body options) are applied to `request`, and
    /// the result goes through the client's handler.
    pub fn send_async(&self, request: Request, options: Options) -> Promise<Response> {
        let options = self.inner.options.clone().merge(options);
        match self.prepare(request, &options) {
            Ok(request) => self.inner.handler.call(request, options),
            Err(err) => Promise::rejected(err),
        }
    }

    /// Send a request and wait for the response.
    ///
    /// Sets the `synchronous` option so that handlers can tell blocking
    /// callers apart.
    pub fn send(&self, request: Request, options: Options) -> Result<Response> {
        self.send_async(request, options.with_synchronous(true)).wait()
    }

    /// Build a request for `uri` and send it asynchronously.
    ///
    /// A relative `uri` is resolved against the base URL.
    pub fn request_async<U: AsRef<str>>(&self, method: Method, uri: U, options: Options) -> Promise<Response> {
        match self.resolve_url(uri.as_ref()) {
            Ok(url) => self.send_async(Request::from_url(method, url), options),
            Err(err) => Promise::rejected(err),
        }
    }

    /// Build a request for `uri`, send it and wait for the response.
    pub fn request<U: AsRef<str>>(&self, method: Method, uri: U, options: Options) -> Result<Response> {
        self.request_async(method, uri, options.with_synchronous(true))
            .wait()
    }

    /// Convenience method to send a `GET` request asynchronously.
    pub fn get_async<U: AsRef<str>>(&self, uri: U, options: Options) -> Promise<Response> {
        self.request_async(Method::GET, uri, options)
    }

    /// Convenience method to send a `GET` request and wait for the response.
    pub fn get<U: AsRef<str>>(&self, uri: U, options: Options) -> Result<Response> {
        self.request(Method::GET, uri, options)
    }

    fn resolve_url(&self, uri: &str) -> Result<Url> {
        match Url::parse(uri) {
            Ok(url) => url.into_url(),
            Err(ParseError::RelativeUrlWithoutBase) => match &self.inner.base_url {
                Some(base) => base
                    .join(uri)
                    .map_err(|e| Error::builder(e).with_url(base.clone())),
                None => Err(Error::invalid_argument(format!(
                    "relative URI {uri:?} requires a base_url"
                ))),
            },
            Err(e) => Err(Error::builder(e)),
        }
    }

    fn prepare(&self, request: Request, options: &Options) -> Result<Request> {
        let mut headers = request.headers().clone();

        if let Some(overrides) = options.headers() {
            util::replace_headers(&mut headers, overrides.clone());
        }

        for name in self.inner.headers.keys() {
            if !headers.contains_key(name) {
                for value in self.inner.headers.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }

        if let Some(credentials) = options.auth() {
            headers.insert(AUTHORIZATION, credentials.header());
        }

        let mut url = request.url().clone();
        if let Some(query) = options.query() {
            url.set_query(Some(query).filter(|q| !q.is_empty()));
        }

        let mut body = None;
        if let Some(raw) = options.body() {
            body = Some(raw.clone());
        }
        if let Some(form) = options.form_params() {
            body = Some(bytes::Bytes::from(form.to_owned()));
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/x-www-form-urlencoded"));
        }
        #[cfg(feature = "json")]
        if let Some(json) = options.json() {
            body = Some(serde_json::to_vec(json).map_err(Error::builder)?.into());
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
        }

        let mut request = request.with_url(url).with_headers(headers);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        Ok(request)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("handler", &self.inner.handler)
            .field("base_url", &self.inner.base_url.as_ref().map(Url::as_str))
            .field("headers", &self.inner.headers)
            .field("options", &self.inner.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::handler::mock::MockHandler, StatusCode};

    fn client(mock: &MockHandler) -> Client {
        Client::builder()
            .handler(mock.clone().into())
            .base_url("http://example.com/api/")
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_handler() {
        let err = Client::builder().build().unwrap_err();
        assert!(err.is_invalid_argument());

        let err = Client::builder()
            .handler(MockHandler::default().into())
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn resolves_relative_uris() {
        let mock = MockHandler::new([Response::default(), Response::default()]);
        let client = client(&mock);

        client.get("users?id=1", Options::new()).unwrap();
        assert_eq!(
            mock.last_request().unwrap().url().as_str(),
            "http://example.com/api/users?id=1"
        );

        client.get("https://other.test/x", Options::new()).unwrap();
        assert_eq!(mock.last_request().unwrap().url().as_str(), "https://other.test/x");

        let no_base = Client::builder()
            .handler(MockHandler::default().into())
            .build()
            .unwrap();
        assert!(no_base.get("users", Options::new()).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn defaults_to_http_errors() {
        let mock = MockHandler::new([
            Response::new(StatusCode::NOT_FOUND),
            Response::new(StatusCode::NOT_FOUND),
        ]);
        let client = client(&mock);

        assert!(client.get("x", Options::new()).unwrap_err().is_client_error());
        let res = client
            .get("x", Options::new().with_http_errors(false))
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(mock.last_options().unwrap().synchronous());
    }

    #[test]
    fn applies_request_options() {
        let mock = MockHandler::new([Response::default()]);
        let mut defaults = HeaderMap::new();
        defaults.insert("x-default", HeaderValue::from_static("1"));
        defaults.insert("x-kept", HeaderValue::from_static("default"));
        let client = Client::builder()
            .handler(mock.clone().into())
            .default_headers(defaults)
            .build()
            .unwrap();

        let request = Request::new(Method::POST, "http://example.com/?old=1")
            .unwrap()
            .with_header(
                http::HeaderName::from_static("x-kept"),
                HeaderValue::from_static("request"),
            );
        let options = Options::new()
            .with_query(&[("a", "1"), ("b", "two")])
            .unwrap()
            .with_basic_auth("user", Some("pass"))
            .with_form(&[("k", "v")])
            .unwrap();
        client.send(request, options).unwrap();

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.url().query(), Some("a=1&b=two"));
        assert_eq!(sent.headers()["x-default"], "1");
        assert_eq!(sent.headers()["x-kept"], "request");
        assert_eq!(sent.headers()[AUTHORIZATION], "Basic dXNlcjpwYXNz");
        assert_eq!(sent.headers()[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert_eq!(&sent.body()[..], b"k=v");
        assert_eq!(sent.headers()[http::header::CONTENT_LENGTH], "3");
    }
}
