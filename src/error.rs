use std::{borrow::Cow, error::Error as StdError, fmt, io, sync::Arc};

use url::Url;

use crate::{Request, Response, StatusCode};

/// A `Result` alias where the `Err` case is `reqstack::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type that can be used for dynamic error handling.
pub type BoxError = Box<dyn StdError + Send + Sync>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// The Errors that may occur when processing a `Request`.
///
/// Errors are cheap to clone: a settled promise hands the same rejection to
/// every consumer that waits on it.
///
/// Note: Errors may include the full URL used to make the `Request`. If the URL
/// contains sensitive information (e.g. an API key as a query parameter), be
/// sure to remove it ([`without_url`](Error::without_url))
#[derive(Clone)]
pub struct Error {
    inner: Arc<Inner>,
}

#[derive(Clone)]
struct Inner {
    kind: Kind,
    message: Option<Cow<'static, str>>,
    source: Option<SharedError>,
    url: Option<Url>,
    request: Option<Request>,
    response: Option<Response>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Arc::new(Inner {
                kind,
                message: None,
                source: source.map(|e| SharedError::from(e.into())),
                url: None,
                request: None,
                response: None,
            }),
        }
    }

    /// Wrap an arbitrary error as a request error.
    ///
    /// If `e` already is a `reqstack::Error` it is returned unchanged, so
    /// errors flowing back through the pipeline are never nested twice.
    pub fn request<E: Into<BoxError>>(e: E) -> Error {
        let e = e.into();
        match e.downcast::<Error>() {
            Ok(err) => *err,
            Err(e) => Error::new(Kind::Request, Some(e)),
        }
    }

    /// A transport could not establish a connection; no response exists.
    pub fn connect<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Connect, Some(e))
    }

    pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::InvalidArgument, Some(e))
    }

    pub(crate) fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Error {
        Error::new(Kind::InvalidArgument, None::<Error>).with_message(message)
    }

    pub(crate) fn logic(message: impl Into<Cow<'static, str>>) -> Error {
        Error::new(Kind::Logic, None::<Error>).with_message(message)
    }

    pub(crate) fn unresolved(message: impl Into<Cow<'static, str>>) -> Error {
        Error::new(Kind::Unresolved, None::<Error>).with_message(message)
    }

    pub(crate) fn too_many_redirects(max: u32, request: Request, response: Response) -> Error {
        let url = request.url().clone();
        Error::new(Kind::TooManyRedirects, None::<Error>)
            .with_message(format!("will not follow more than {max} redirects"))
            .with_url(url)
            .with_request(request)
            .with_response(response)
    }

    pub(crate) fn bad_response(
        message: impl Into<Cow<'static, str>>,
        request: Request,
        response: Response,
    ) -> Error {
        let url = request.url().clone();
        Error::new(Kind::BadResponse, None::<Error>)
            .with_message(message)
            .with_url(url)
            .with_request(request)
            .with_response(response)
    }

    pub(crate) fn status_code(request: Request, response: Response) -> Error {
        let status = response.status();
        let label = if status.is_client_error() {
            "Client error"
        } else if status.is_server_error() {
            "Server error"
        } else {
            "Unsuccessful request"
        };

        let mut message = format!(
            "{label}: `{} {}` resulted in a `{} {}` response",
            request.method(),
            request.url(),
            status.as_str(),
            response.reason().unwrap_or_default(),
        );
        if let Some(summary) = crate::util::body_summary(response.body()) {
            message.push_str(":\n");
            message.push_str(&summary);
            message.push('\n');
        }

        let url = request.url().clone();
        Error::new(Kind::Status(status), None::<Error>)
            .with_message(message)
            .with_url(url)
            .with_request(request)
            .with_response(response)
    }

    pub(crate) fn on_headers(source: Error, request: Request, response: Response) -> Error {
        let url = request.url().clone();
        Error::new(Kind::Request, Some(source))
            .with_message("an error was encountered during the on_headers event")
            .with_url(url)
            .with_request(request)
            .with_response(response)
    }

    pub(crate) fn timed_out(request: Request) -> Error {
        let url = request.url().clone();
        Error::new(Kind::Request, Some(TimedOut))
            .with_url(url)
            .with_request(request)
    }

    fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    pub(crate) fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.inner_mut().message = Some(message.into());
        self
    }
}

impl Error {
    /// Returns a possible URL related to this error.
    pub fn url(&self) -> Option<&Url> {
        self.inner.url.as_ref()
    }

    /// Add a url related to this error (overwriting any existing)
    pub fn with_url(mut self, url: Url) -> Self {
        self.inner_mut().url = Some(url);
        self
    }

    /// Strip the related url from this error (if, for example, it contains
    /// sensitive information)
    pub fn without_url(mut self) -> Self {
        self.inner_mut().url = None;
        self
    }

    /// Returns the request that was being sent when this error occurred.
    pub fn request_ref(&self) -> Option<&Request> {
        self.inner.request.as_ref()
    }

    /// Attach the request that was being sent.
    pub fn with_request(mut self, request: Request) -> Self {
        self.inner_mut().request = Some(request);
        self
    }

    /// Returns the (possibly partial) response attached to this error.
    pub fn response(&self) -> Option<&Response> {
        self.inner.response.as_ref()
    }

    /// Attach a response to this error.
    pub fn with_response(mut self, response: Response) -> Self {
        self.inner_mut().response = Some(response);
        self
    }

    /// Returns true if a response is attached to this error.
    pub fn has_response(&self) -> bool {
        self.inner.response.is_some()
    }

    /// Returns true if the error is a connection failure.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if the error is related to the request
    pub fn is_request(&self) -> bool {
        matches!(self.inner.kind, Kind::Request)
    }

    /// Returns true if the redirect limit was exceeded.
    pub fn is_redirect(&self) -> bool {
        matches!(self.inner.kind, Kind::TooManyRedirects)
    }

    /// Returns true for any error produced from an unacceptable response:
    /// a bad redirect target or an HTTP error status.
    pub fn is_bad_response(&self) -> bool {
        matches!(self.inner.kind, Kind::BadResponse | Kind::Status(_))
    }

    /// Returns true if the error was generated from an HTTP error status.
    pub fn is_status(&self) -> bool {
        matches!(self.inner.kind, Kind::Status(_))
    }

    /// Returns true if the error was generated from a `4xx` response.
    pub fn is_client_error(&self) -> bool {
        matches!(self.inner.kind, Kind::Status(code) if code.is_client_error())
    }

    /// Returns true if the error was generated from a `5xx` response.
    pub fn is_server_error(&self) -> bool {
        matches!(self.inner.kind, Kind::Status(code) if code.is_server_error())
    }

    /// Returns true if the error comes from malformed options or arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.inner.kind, Kind::InvalidArgument)
    }

    /// Returns true if the error signals misuse of the API, such as resolving
    /// an empty handler stack or settling a promise twice.
    pub fn is_logic(&self) -> bool {
        matches!(self.inner.kind, Kind::Logic)
    }

    /// Returns true if a promise could not be driven to settlement.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.inner.kind, Kind::Unresolved)
    }

    /// Returns true if the error is related to a timeout.
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if err.is::<TimedOut>() {
                return true;
            }

            if let Some(io) = err.downcast_ref::<io::Error>() {
                if io.kind() == io::ErrorKind::TimedOut {
                    return true;
                }
            }

            source = err.source();
        }

        false
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self.inner.kind {
            Kind::Status(code) => Some(code),
            _ => self.inner.response.as_ref().map(Response::status),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("reqstack::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref message) = self.inner.message {
            builder.field("message", message);
        }

        if let Some(ref url) = self.inner.url {
            builder.field("url", &url.as_str());
        }

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner.kind {
            Kind::Connect => f.write_str("error connecting")?,
            Kind::Request => f.write_str("error sending request")?,
            Kind::TooManyRedirects => f.write_str("error following redirect")?,
            Kind::BadResponse => f.write_str("bad response")?,
            Kind::Status(_) => f.write_str("HTTP status error")?,
            Kind::InvalidArgument => f.write_str("invalid argument")?,
            Kind::Logic => f.write_str("logic error")?,
            Kind::Unresolved => f.write_str("unresolved promise")?,
        };

        if let Some(message) = &self.inner.message {
            write!(f, ": {message}")?;
        } else if let Some(url) = &self.inner.url {
            write!(f, " for url ({})", url.as_str())?;
        }

        if let Some(e) = &self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Kind {
    Connect,
    Request,
    TooManyRedirects,
    BadResponse,
    Status(StatusCode),
    InvalidArgument,
    Logic,
    Unresolved,
}

#[derive(Debug)]
pub(crate) struct TimedOut;

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("operation timed out")
    }
}

impl StdError for TimedOut {}
