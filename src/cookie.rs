//! HTTP Cookies
//!
//! The [`cookies`](crate::client::layer::cookies) middleware reads and fills a
//! [`CookieJar`] carried in the request [`Options`](crate::Options).

use std::{
    borrow::Cow,
    fmt,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use bytes::BufMut;
pub use cookie_crate::{Cookie as RawCookie, Expiration};

use crate::{
    header::{HeaderValue, SET_COOKIE},
    Url,
};

/// A cookie jar shared between requests.
pub trait CookieJar: Send + Sync {
    /// Store a set of Set-Cookie header values received from `url`.
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url);

    /// Get the `Cookie` header value the jar holds for `url`.
    fn cookies(&self, url: &Url) -> Option<HeaderValue>;

    /// Remove every cookie.
    fn clear(&self);

    /// Number of stored cookies, expired ones excluded.
    fn len(&self) -> usize;

    /// Returns true if the jar holds no unexpired cookie.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stored, unexpired cookies.
    fn iter(&self) -> Vec<Cookie<'static>>;
}

/// A single HTTP cookie.
#[derive(Debug, Clone)]
pub struct Cookie<'a>(cookie_crate::Cookie<'a>);

/// The default [`CookieJar`], backed by `cookie_store`.
///
/// This is the jar installed by `ClientBuilder::cookie_store(true)`. Build
/// one yourself to pre-fill it before handing it to a client.
#[derive(Debug, Default)]
pub struct Jar(RwLock<cookie_store::CookieStore>);

// ===== impl Cookie =====

impl<'a> Cookie<'a> {
    fn parse(value: &'a HeaderValue) -> Result<Cookie<'a>, CookieParseError> {
        std::str::from_utf8(value.as_bytes())
            .map_err(cookie_crate::ParseError::from)
            .and_then(cookie_crate::Cookie::parse)
            .map_err(CookieParseError)
            .map(Cookie)
    }

    /// Creates a new `Cookie` instance from the given name and value.
    pub fn new<N, V>(name: N, value: V) -> Cookie<'a>
    where
        N: Into<Cow<'a, str>>,
        V: Into<Cow<'a, str>>,
    {
        Cookie(RawCookie::new(name, value))
    }

    /// The name of the cookie.
    #[inline]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The value of the cookie.
    #[inline]
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// Returns true if the 'HttpOnly' directive is enabled.
    #[inline]
    pub fn http_only(&self) -> bool {
        self.0.http_only().unwrap_or(false)
    }

    /// Returns true if the 'Secure' directive is enabled.
    #[inline]
    pub fn secure(&self) -> bool {
        self.0.secure().unwrap_or(false)
    }

    /// Returns the path directive of the cookie, if set.
    #[inline]
    pub fn path(&self) -> Option<&str> {
        self.0.path()
    }

    /// Returns the domain directive of the cookie, if set.
    #[inline]
    pub fn domain(&self) -> Option<&str> {
        self.0.domain()
    }

    /// Get the Max-Age information.
    #[inline]
    pub fn max_age(&self) -> Option<std::time::Duration> {
        self.0.max_age().and_then(|d| d.try_into().ok())
    }

    /// The cookie expiration time.
    #[inline]
    pub fn expires(&self) -> Option<SystemTime> {
        match self.0.expires() {
            Some(Expiration::DateTime(offset)) => Some(SystemTime::from(offset)),
            None | Some(Expiration::Session) => None,
        }
    }

    /// Converts `self` into a `Cookie` with a static lifetime.
    #[inline]
    pub fn into_owned(self) -> Cookie<'static> {
        Cookie(self.0.into_owned())
    }
}

impl fmt::Display for Cookie<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error representing a parse failure of a 'Set-Cookie' header.
struct CookieParseError(cookie_crate::ParseError);

impl fmt::Debug for CookieParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for CookieParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for CookieParseError {}

// ===== impl Jar =====

impl Jar {
    /// Add a cookie str to this jar, as if received from `url`.
    ///
    /// # Example
    ///
    /// ```
    /// use reqstack::{cookie::{CookieJar, Jar}, Url};
    ///
    /// let cookie = "foo=bar; Domain=yolo.local";
    /// let url = "https://yolo.local".parse::<Url>().unwrap();
    ///
    /// let jar = Jar::default();
    /// jar.add_cookie_str(cookie, &url);
    /// assert_eq!(jar.len(), 1);
    /// ```
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        let cookies = cookie_crate::Cookie::parse(cookie)
            .ok()
            .map(|c| c.into_owned())
            .into_iter();
        self.write().store_response_cookies(cookies, url);
    }

    /// Removes the cookie named `name` that applies to `url`.
    pub fn remove(&self, name: &str, url: &Url) {
        if let Some(domain) = url.host_str() {
            self.write().remove(domain, url.path(), name);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, cookie_store::CookieStore> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, cookie_store::CookieStore> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CookieJar for Jar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let iter =
            cookie_headers.filter_map(|val| Cookie::parse(val).map(|c| c.0.into_owned()).ok());

        self.write().store_response_cookies(iter, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let mut header = bytes::BytesMut::with_capacity(64);
        for (name, value) in self.read().get_request_values(url) {
            if !header.is_empty() {
                header.put(&b"; "[..]);
            }
            header.put(name.as_bytes());
            header.put(&b"="[..]);
            header.put(value.as_bytes());
        }

        if header.is_empty() {
            return None;
        }

        HeaderValue::from_maybe_shared(header.freeze()).ok()
    }

    fn clear(&self) {
        self.write().clear();
    }

    fn len(&self) -> usize {
        self.read().iter_unexpired().count()
    }

    fn iter(&self) -> Vec<Cookie<'static>> {
        self.read()
            .iter_unexpired()
            .map(|c| {
                let raw: &cookie_crate::Cookie<'static> = c;
                Cookie(raw.clone())
            })
            .collect()
    }
}

pub(crate) fn store_response_cookies(
    jar: &dyn CookieJar,
    headers: &http::HeaderMap,
    url: &Url,
) {
    let mut cookies = headers.get_all(SET_COOKIE).iter().peekable();
    if cookies.peek().is_some() {
        jar.set_cookies(&mut cookies, url);
    }
}
