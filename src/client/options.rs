use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Extensions,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "cookies")]
use crate::cookie::CookieJar;
use crate::{
    client::stats::TransferStats, error::Error, redirect::RedirectOption, util, Response,
};

/// Callback receiving the [`TransferStats`] of every transfer.
pub type OnStats = Arc<dyn Fn(&TransferStats) + Send + Sync>;

/// Callback inspecting a response before it is handed back; an error
/// rejects the transfer.
pub type OnHeaders = Arc<dyn Fn(&Response) -> crate::Result<()> + Send + Sync>;

/// Per-request options passed through the handler stack along with every
/// request.
///
/// Every field is optional so that client defaults and per-call options can
/// be combined with [`merge`](Options::merge). Each call works on its own
/// copy: middleware that records state here (retry counts, redirect
/// counters) only affects the current call chain.
///
/// Options can be loaded from any serde format; callbacks, the cookie jar and
/// extensions are code-only.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    retries: Option<u32>,
    #[serde(deserialize_with = "de::millis")]
    delay: Option<Duration>,
    allow_redirects: Option<RedirectOption>,
    http_errors: Option<bool>,
    synchronous: Option<bool>,
    stream: Option<bool>,
    expect: Option<Expect>,
    #[serde(deserialize_with = "de::headers")]
    headers: Option<HeaderMap>,
    #[serde(deserialize_with = "de::urlencoded")]
    query: Option<String>,
    auth: Option<Credentials>,
    #[serde(deserialize_with = "de::body")]
    body: Option<Bytes>,
    #[cfg(feature = "json")]
    json: Option<serde_json::Value>,
    #[serde(deserialize_with = "de::urlencoded")]
    form_params: Option<String>,
    #[serde(deserialize_with = "de::seconds")]
    timeout: Option<Duration>,
    #[serde(deserialize_with = "de::seconds")]
    connect_timeout: Option<Duration>,
    #[cfg(feature = "cookies")]
    #[serde(skip)]
    cookies: Option<Arc<dyn CookieJar>>,
    #[serde(skip)]
    on_stats: Option<OnStats>,
    #[serde(skip)]
    on_headers: Option<OnHeaders>,
    #[serde(skip)]
    redirect_count: Option<u32>,
    #[serde(skip)]
    extensions: Extensions,
}

/// The `expect` option: whether to send `Expect: 100-Continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expect {
    /// Always (`true`) or never (`false`).
    Enabled(bool),
    /// Only for bodies of at least this many bytes.
    Threshold(u64),
}

/// Credentials for the `auth` option, sent as HTTP Basic authentication.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    username: String,
    password: Option<String>,
}

impl Credentials {
    /// Create basic credentials.
    pub fn basic<U, P>(username: U, password: Option<P>) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        Credentials {
            username: username.into(),
            password: password.map(Into::into),
        }
    }

    /// The user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub(crate) fn header(&self) -> HeaderValue {
        util::basic_auth(&self.username, self.password.as_ref())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Options {
    /// Empty options.
    pub fn new() -> Self {
        Options::default()
    }

    /// Parse options from a JSON value.
    ///
    /// Unknown keys and malformed values are invalid-argument errors.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        serde_json::from_value(value).map_err(Error::builder)
    }

    /// Combine `self` (the defaults) with `overrides`: every field set in
    /// `overrides` wins, headers are merged by name and extensions are
    /// merged by type.
    pub fn merge(mut self, overrides: Options) -> Options {
        fn pick<T>(dst: &mut Option<T>, src: Option<T>) {
            if src.is_some() {
                *dst = src;
            }
        }

        pick(&mut self.retries, overrides.retries);
        pick(&mut self.delay, overrides.delay);
        pick(&mut self.allow_redirects, overrides.allow_redirects);
        pick(&mut self.http_errors, overrides.http_errors);
        pick(&mut self.synchronous, overrides.synchronous);
        pick(&mut self.stream, overrides.stream);
        pick(&mut self.expect, overrides.expect);
        pick(&mut self.query, overrides.query);
        pick(&mut self.auth, overrides.auth);
        pick(&mut self.body, overrides.body);
        pick(&mut self.form_params, overrides.form_params);
        pick(&mut self.timeout, overrides.timeout);
        pick(&mut self.connect_timeout, overrides.connect_timeout);
        pick(&mut self.on_stats, overrides.on_stats);
        pick(&mut self.on_headers, overrides.on_headers);
        pick(&mut self.redirect_count, overrides.redirect_count);
        #[cfg(feature = "json")]
        pick(&mut self.json, overrides.json);
        #[cfg(feature = "cookies")]
        pick(&mut self.cookies, overrides.cookies);

        if let Some(src) = overrides.headers {
            match &mut self.headers {
                Some(dst) => util::replace_headers(dst, src),
                None => self.headers = Some(src),
            }
        }

        self.extensions.extend(overrides.extensions);
        self
    }

    /// Number of retries performed so far in this call chain.
    pub fn retries(&self) -> Option<u32> {
        self.retries
    }

    /// Delay to apply before sending.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// The `allow_redirects` option.
    pub fn allow_redirects(&self) -> Option<&RedirectOption> {
        self.allow_redirects.as_ref()
    }

    /// Whether 4xx and 5xx responses are turned into errors.
    pub fn http_errors(&self) -> bool {
        self.http_errors.unwrap_or(false)
    }

    /// Whether the caller is going to block on the response.
    pub fn synchronous(&self) -> bool {
        self.synchronous.unwrap_or(false)
    }

    /// Whether the response body should be streamed.
    pub fn stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// The `expect` option.
    pub fn expect(&self) -> Option<Expect> {
        self.expect
    }

    /// Headers to set on the request.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// Encoded query string replacing the request's query.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Credentials to authenticate with.
    pub fn auth(&self) -> Option<&Credentials> {
        self.auth.as_ref()
    }

    /// Raw request body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// JSON request body.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    /// Encoded `application/x-www-form-urlencoded` body.
    pub fn form_params(&self) -> Option<&str> {
        self.form_params.as_deref()
    }

    /// Total timeout of a transfer.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Connection timeout, for transports that can tell the phases apart.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// The cookie jar to use.
    #[cfg(feature = "cookies")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cookies")))]
    pub fn cookies(&self) -> Option<&Arc<dyn CookieJar>> {
        self.cookies.as_ref()
    }

    /// The `on_stats` callback.
    pub fn on_stats(&self) -> Option<&OnStats> {
        self.on_stats.as_ref()
    }

    /// The `on_headers` callback.
    pub fn on_headers(&self) -> Option<&OnHeaders> {
        self.on_headers.as_ref()
    }

    /// Typed extensions for middleware-private state.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn redirect_count(&self) -> u32 {
        self.redirect_count.unwrap_or(0)
    }

    pub(crate) fn with_redirect_count(mut self, count: u32) -> Self {
        self.redirect_count = Some(count);
        self
    }

    /// Set the retry counter.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the delay applied before sending.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the `allow_redirects` option: a `bool`, a
    /// [`Config`](crate::redirect::Config) or a [`RedirectOption`].
    pub fn with_allow_redirects<R: Into<RedirectOption>>(mut self, redirects: R) -> Self {
        self.allow_redirects = Some(redirects.into());
        self
    }

    /// Turn 4xx and 5xx responses into errors.
    pub fn with_http_errors(mut self, enabled: bool) -> Self {
        self.http_errors = Some(enabled);
        self
    }

    /// Mark the request as one the caller blocks on.
    pub fn with_synchronous(mut self, enabled: bool) -> Self {
        self.synchronous = Some(enabled);
        self
    }

    /// Ask for a streamed response.
    pub fn with_stream(mut self, enabled: bool) -> Self {
        self.stream = Some(enabled);
        self
    }

    /// Set the `expect` option.
    pub fn with_expect(mut self, expect: Expect) -> Self {
        self.expect = Some(expect);
        self
    }

    /// Add a header, replacing an earlier one with the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(name, value);
        self
    }

    /// Merge a set of headers into the option headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        match &mut self.headers {
            Some(dst) => util::replace_headers(dst, headers),
            None => self.headers = Some(headers),
        }
        self
    }

    /// Set the query string from any serializable value.
    ///
    /// ```
    /// let options = reqstack::Options::new()
    ///     .with_query(&[("foo", "a"), ("bar", "b")])
    ///     .unwrap();
    /// assert_eq!(options.query(), Some("foo=a&bar=b"));
    /// ```
    pub fn with_query<T: Serialize + ?Sized>(mut self, query: &T) -> crate::Result<Self> {
        self.query = Some(serde_urlencoded::to_string(query).map_err(Error::builder)?);
        Ok(self)
    }

    /// Set an already encoded query string.
    pub fn with_query_string<S: Into<String>>(mut self, query: S) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Authenticate with HTTP Basic credentials.
    pub fn with_basic_auth<U, P>(mut self, username: U, password: Option<P>) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        self.auth = Some(Credentials::basic(username, password));
        self
    }

    /// Set the raw request body.
    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Send a JSON body.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn with_json<T: Serialize + ?Sized>(mut self, json: &T) -> crate::Result<Self> {
        self.json = Some(serde_json::to_value(json).map_err(Error::builder)?);
        Ok(self)
    }

    /// Send a url-encoded form body.
    pub fn with_form<T: Serialize + ?Sized>(mut self, form: &T) -> crate::Result<Self> {
        self.form_params = Some(serde_urlencoded::to_string(form).map_err(Error::builder)?);
        Ok(self)
    }

    /// Set the total transfer timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Use a cookie jar.
    #[cfg(feature = "cookies")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cookies")))]
    pub fn with_cookies(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    /// Set the `on_stats` callback.
    pub fn with_on_stats<F>(mut self, f: F) -> Self
    where
        F: Fn(&TransferStats) + Send + Sync + 'static,
    {
        self.on_stats = Some(Arc::new(f));
        self
    }

    /// Set the `on_headers` callback.
    pub fn with_on_headers<F>(mut self, f: F) -> Self
    where
        F: Fn(&Response) -> crate::Result<()> + Send + Sync + 'static,
    {
        self.on_headers = Some(Arc::new(f));
        self
    }

    /// Insert a typed extension.
    pub fn with_extension<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.extensions.insert(value);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("Options");

        let fields: [(&str, Option<&dyn fmt::Debug>); 14] = [
            ("retries", self.retries.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("delay", self.delay.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("allow_redirects", self.allow_redirects.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("http_errors", self.http_errors.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("synchronous", self.synchronous.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("stream", self.stream.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("expect", self.expect.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("headers", self.headers.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("query", self.query.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("auth", self.auth.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("form_params", self.form_params.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("timeout", self.timeout.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("connect_timeout", self.connect_timeout.as_ref().map(|v| v as &dyn fmt::Debug)),
            ("redirect_count", self.redirect_count.as_ref().map(|v| v as &dyn fmt::Debug)),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                builder.field(name, value);
            }
        }

        if let Some(body) = &self.body {
            builder.field("body", &body.len());
        }
        #[cfg(feature = "json")]
        {
            if let Some(json) = &self.json {
                builder.field("json", json);
            }
        }
        #[cfg(feature = "cookies")]
        {
            if self.cookies.is_some() {
                builder.field("cookies", &true);
            }
        }
        if self.on_stats.is_some() {
            builder.field("on_stats", &true);
        }
        if self.on_headers.is_some() {
            builder.field("on_headers", &true);
        }

        builder.finish()
    }
}

mod de {
    use std::{collections::BTreeMap, time::Duration};

    use bytes::Bytes;
    use http::header::{HeaderMap, HeaderName, HeaderValue};
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Raw(String),
        Pairs(Vec<(String, String)>),
        Map(BTreeMap<String, String>),
    }

    fn duration<E: Error>(secs: f64) -> Result<Duration, E> {
        Duration::try_from_secs_f64(secs).map_err(E::custom)
    }

    pub(super) fn millis<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(d)?
            .map(|ms| duration(ms / 1000.0))
            .transpose()
    }

    pub(super) fn seconds<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(d)?.map(duration).transpose()
    }

    pub(super) fn body<'de, D>(d: D) -> Result<Option<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(d)?.map(Bytes::from))
    }

    pub(super) fn headers<'de, D>(d: D) -> Result<Option<HeaderMap>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<BTreeMap<String, OneOrMany>>::deserialize(d)? else {
            return Ok(None);
        };

        let mut headers = HeaderMap::new();
        for (name, values) in raw {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(D::Error::custom)?;
            let values = match values {
                OneOrMany::One(value) => vec![value],
                OneOrMany::Many(values) => values,
            };
            for value in values {
                let value = HeaderValue::from_str(&value).map_err(D::Error::custom)?;
                headers.append(name.clone(), value);
            }
        }
        Ok(Some(headers))
    }

    pub(super) fn urlencoded<'de, D>(d: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = match Option::<Encoded>::deserialize(d)? {
            None => return Ok(None),
            Some(Encoded::Raw(raw)) => raw,
            Some(Encoded::Pairs(pairs)) => {
                serde_urlencoded::to_string(pairs).map_err(D::Error::custom)?
            }
            Some(Encoded::Map(map)) => serde_urlencoded::to_string(map).map_err(D::Error::custom)?,
        };
        Ok(Some(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::Config;

    #[test]
    fn merge_prefers_overrides() {
        let defaults = Options::new()
            .with_http_errors(true)
            .with_retries(1)
            .with_header(
                HeaderName::from_static("x-default"),
                HeaderValue::from_static("a"),
            )
            .with_header(
                HeaderName::from_static("x-shared"),
                HeaderValue::from_static("default"),
            );

        let call = Options::new()
            .with_http_errors(false)
            .with_header(
                HeaderName::from_static("x-shared"),
                HeaderValue::from_static("call"),
            );

        let merged = defaults.clone().merge(call);
        assert!(!merged.http_errors());
        assert_eq!(merged.retries(), Some(1));

        let headers = merged.headers().unwrap();
        assert_eq!(headers["x-default"], "a");
        assert_eq!(headers["x-shared"], "call");

        // defaults are untouched
        assert!(defaults.http_errors());
        assert_eq!(defaults.headers().unwrap()["x-shared"], "default");
    }

    #[test]
    fn merge_keeps_extensions_of_both_sides() {
        #[derive(Clone, Debug, PartialEq)]
        struct A(u8);
        #[derive(Clone, Debug, PartialEq)]
        struct B(u8);

        let merged = Options::new()
            .with_extension(A(1))
            .with_extension(B(1))
            .merge(Options::new().with_extension(B(2)));
        assert_eq!(merged.extensions().get::<A>(), Some(&A(1)));
        assert_eq!(merged.extensions().get::<B>(), Some(&B(2)));
    }

    #[test]
    fn flag_defaults() {
        let options = Options::new();
        assert!(!options.http_errors());
        assert!(!options.synchronous());
        assert!(!options.stream());
        assert!(options.allow_redirects().is_none());
        assert_eq!(options.redirect_count(), 0);
    }

    #[test]
    fn allow_redirects_from_bool_and_config() {
        let options = Options::new().with_allow_redirects(false);
        assert!(matches!(
            options.allow_redirects(),
            Some(RedirectOption::Disabled)
        ));

        let config = Config {
            max: 2,
            ..Config::default()
        };
        let options = Options::new().with_allow_redirects(config);
        assert_eq!(options.allow_redirects().unwrap().config().unwrap().max, 2);
    }

    #[test]
    fn form_and_query_encoding() {
        let options = Options::new()
            .with_form(&[("foo", "bar bam"), ("baz", "1")])
            .unwrap();
        assert_eq!(options.form_params(), Some("foo=bar+bam&baz=1"));
    }

    #[test]
    fn credentials_are_redacted() {
        let options = Options::new().with_basic_auth("user", Some("secret"));
        let debug = format!("{options:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }
}
