use std::{convert::TryFrom, fmt};

use bytes::Bytes;
use http::{
    header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue},
    Method, Version,
};
use url::Url;

use crate::{error::Error, into_url::IntoUrlSealed, IntoUrl};

/// A request which can be sent through a [`Handler`](crate::Handler).
///
/// Requests are values: the `with_*` methods consume the request and return
/// a modified copy, leaving clones held elsewhere untouched.
#[derive(Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    version: Version,
}

impl Request {
    /// Constructs a new request.
    pub fn new<U: IntoUrl>(method: Method, url: U) -> crate::Result<Self> {
        Ok(Request::from_url(method, url.into_url()?))
    }

    pub(crate) fn from_url(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            version: Version::HTTP_11,
        }
    }

    /// Get the method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the url.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the http version.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if a header named `name` is present.
    pub fn has_header<K: AsHeaderName>(&self, name: K) -> bool {
        self.headers.contains_key(name)
    }

    /// Replace the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replace the url.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Set a header, replacing any existing values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a header value, keeping existing values.
    pub fn with_added_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Remove every value of a header.
    pub fn without_header<K: AsHeaderName>(mut self, name: K) -> Self {
        self.headers.remove(name);
        self
    }

    /// Replace the whole header map.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the body.
    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Replace the http version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("version", &self.version)
            .finish()
    }
}

impl TryFrom<http::Request<Bytes>> for Request {
    type Error = Error;

    fn try_from(req: http::Request<Bytes>) -> crate::Result<Self> {
        let (parts, body) = req.into_parts();
        let url = Url::parse(&parts.uri.to_string())
            .map_err(Error::builder)?
            .into_url()?;
        Ok(Request {
            method: parts.method,
            url,
            headers: parts.headers,
            body,
            version: parts.version,
        })
    }
}

impl TryFrom<Request> for http::Request<Bytes> {
    type Error = Error;

    fn try_from(req: Request) -> crate::Result<Self> {
        let Request {
            method,
            url,
            headers,
            body,
            version,
        } = req;

        let mut req = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .version(version)
            .body(body)
            .map_err(Error::builder)?;
        *req.headers_mut() = headers;
        Ok(req)
    }
}
