use std::{borrow::Cow, fmt};

use bytes::Bytes;
use http::{
    header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue},
    StatusCode, Version,
};

/// A Response to a submitted `Request`.
///
/// Like [`Request`](crate::Request), a response is an immutable value.
#[derive(Clone)]
pub struct Response {
    status: StatusCode,
    reason: Option<Cow<'static, str>>,
    headers: HeaderMap,
    body: Bytes,
    version: Version,
}

impl Response {
    /// Create a response with the given status, no headers and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            reason: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            version: Version::HTTP_11,
        }
    }

    /// Get the `StatusCode` of this `Response`.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase: a custom one if set, otherwise the canonical
    /// reason of the status code.
    pub fn reason(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
    }

    /// Get the `Headers` of this `Response`.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns true if a header named `name` is present.
    pub fn has_header<K: AsHeaderName>(&self, name: K) -> bool {
        self.headers.contains_key(name)
    }

    /// Get the HTTP `Version` of this `Response`.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the full response body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the response text, decoded lossily as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Try to deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// This method fails whenever the response body is not in JSON format,
    /// or it cannot be properly deserialized to target type `T`.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.body).map_err(crate::Error::request)
    }

    /// Replace the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a custom reason phrase.
    pub fn with_reason(mut self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.reason = Some(reason.into());
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

impl Default for Response {
    fn default() -> Self {
        Response::new(StatusCode::OK)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("version", &self.version)
            .finish()
    }
}

impl From<http::Response<Bytes>> for Response {
    fn from(res: http::Response<Bytes>) -> Self {
        let (parts, body) = res.into_parts();
        Response {
            status: parts.status,
            reason: None,
            headers: parts.headers,
            body,
            version: parts.version,
        }
    }
}

impl From<Response> for http::Response<Bytes> {
    fn from(res: Response) -> Self {
        let mut out = http::Response::new(res.body);
        *out.status_mut() = res.status;
        *out.headers_mut() = res.headers;
        *out.version_mut() = res.version;
        out
    }
}
