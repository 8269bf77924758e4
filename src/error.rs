use std::{error::Error as StdError, fmt, io};

use url::Url;

use crate::{util::EscapeControl, StatusCode};

/// A `Result` alias where the `Err` case is `gmi::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type that can be used for dynamic error handling.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The Errors that may occur when fetching a Gemini resource.
///
/// Note: Errors may include the full URL that was fetched. If the URL
/// contains sensitive information (e.g. a token in the query), be sure to
/// remove it ([`without_url`](Error::without_url))
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    url: Option<Url>,
    meta: Option<String>,
    redirects: Vec<Url>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                url: None,
                meta: None,
                redirects: Vec::new(),
            }),
        }
    }

    pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Builder, Some(e))
    }

    pub(crate) fn invalid_url<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Url, Some(e))
    }

    pub(crate) fn url_bad_scheme(url: Url) -> Error {
        let scheme = url.scheme().to_owned();
        Error::new(Kind::Scheme, Some(BadScheme(scheme))).with_url(url)
    }

    pub(crate) fn connect<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Connect, Some(e))
    }

    pub(crate) fn request<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Request, Some(e))
    }

    pub(crate) fn header<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Header, Some(e))
    }

    pub(crate) fn header_parse<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::HeaderParse, Some(e))
    }

    pub(crate) fn body<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Body, Some(e))
    }

    pub(crate) fn mime(meta: Option<String>) -> Error {
        Error::new(Kind::Mime, None::<Error>).with_meta(meta)
    }

    pub(crate) fn redirect<E: Into<BoxError>>(e: E, url: Url) -> Error {
        Error::new(Kind::Redirect, Some(e)).with_url(url)
    }

    /// Builds the error a non-success status maps to.
    pub(crate) fn status_code(url: Url, status: StatusCode, meta: Option<String>) -> Error {
        let kind = match status.as_u16() {
            10 | 11 => Kind::Input(status),
            59 => Kind::ClientError(status),
            40..=44 | 50..=53 => Kind::ServerError(status),
            60 => Kind::CertificateRequired,
            61 | 62 => Kind::Certificate(status),
            _ => Kind::UnknownStatus(status),
        };
        Error::new(kind, None::<Error>)
            .with_url(url)
            .with_meta(meta)
    }

    pub(crate) fn with_meta(mut self, meta: Option<String>) -> Self {
        self.inner.meta = meta;
        self
    }

    pub(crate) fn with_redirect_chain(mut self, chain: &[Url]) -> Self {
        if self.inner.redirects.is_empty() {
            self.inner.redirects = chain.to_vec();
        }
        self
    }
}

impl Error {
    /// Returns a possible URL related to this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # async fn run() {
    /// // displays last stop of a redirect loop
    /// let response = gmi::get("gemini://site.with.redirect.loop/").await;
    /// if let Err(e) = response {
    ///     if e.is_redirect() {
    ///         if let Some(final_stop) = e.url() {
    ///             println!("redirect loop at {}", final_stop);
    ///         }
    ///     }
    /// }
    /// # }
    /// ```
    pub fn url(&self) -> Option<&Url> {
        self.inner.url.as_ref()
    }

    /// Returns a mutable reference to the URL related to this error
    ///
    /// This is useful if you need to remove sensitive information from the URL
    /// (e.g. a token in the query), but do not want to remove the URL
    /// entirely.
    pub fn url_mut(&mut self) -> Option<&mut Url> {
        self.inner.url.as_mut()
    }

    /// Add a url related to this error (overwriting any existing)
    pub fn with_url(mut self, url: Url) -> Self {
        self.inner.url = Some(url);
        self
    }

    /// Strip the related url from this error (if, for example, it contains
    /// sensitive information)
    pub fn without_url(mut self) -> Self {
        self.inner.url = None;
        self
    }

    /// The meta string the server sent along with a failure status, if any.
    pub fn meta(&self) -> Option<&str> {
        self.inner.meta.as_deref()
    }

    /// The URLs visited before this error occurred, oldest first.
    ///
    /// Empty unless at least one redirect was followed.
    pub fn redirect_chain(&self) -> &[Url] {
        &self.inner.redirects
    }

    /// Returns true if the error came from configuring a `ClientBuilder`.
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// Returns true if the URL could not be parsed or used.
    pub fn is_url(&self) -> bool {
        matches!(self.inner.kind, Kind::Url)
    }

    /// Returns true if the URL used a scheme other than `gemini`.
    pub fn is_scheme(&self) -> bool {
        matches!(self.inner.kind, Kind::Scheme)
    }

    /// Returns true if the error is related to connect
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if the error is related to the request
    pub fn is_request(&self) -> bool {
        matches!(self.inner.kind, Kind::Request)
    }

    /// Returns true if the response header could not be read.
    pub fn is_header(&self) -> bool {
        matches!(self.inner.kind, Kind::Header)
    }

    /// Returns true if the response header was read but is malformed.
    pub fn is_header_parse(&self) -> bool {
        matches!(self.inner.kind, Kind::HeaderParse)
    }

    /// Returns true if the error is related to the response body
    pub fn is_body(&self) -> bool {
        matches!(self.inner.kind, Kind::Body)
    }

    /// Returns true if a success response carried an unsupported MIME type.
    pub fn is_mime(&self) -> bool {
        matches!(self.inner.kind, Kind::Mime)
    }

    /// Returns true if the server asked for user input (status 10 or 11).
    pub fn is_input(&self) -> bool {
        matches!(self.inner.kind, Kind::Input(_))
    }

    /// Returns true if the server rejected the request as malformed (59).
    pub fn is_client_error(&self) -> bool {
        matches!(self.inner.kind, Kind::ClientError(_))
    }

    /// Returns true if the server reported a temporary or permanent failure.
    pub fn is_server_error(&self) -> bool {
        matches!(self.inner.kind, Kind::ServerError(_))
    }

    /// Returns true if the resource requires a client certificate (60).
    pub fn is_certificate_required(&self) -> bool {
        matches!(self.inner.kind, Kind::CertificateRequired)
    }

    /// Returns true if a client certificate was rejected (61 or 62).
    pub fn is_certificate(&self) -> bool {
        matches!(self.inner.kind, Kind::Certificate(_))
    }

    /// Returns true if the server sent a status code outside the protocol's table.
    pub fn is_unknown_status(&self) -> bool {
        matches!(self.inner.kind, Kind::UnknownStatus(_))
    }

    /// Returns true if the error is from a `redirect::Policy`.
    pub fn is_redirect(&self) -> bool {
        matches!(self.inner.kind, Kind::Redirect)
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
            Kind::Input(code)
            | Kind::ClientError(code)
            | Kind::ServerError(code)
            | Kind::Certificate(code)
            | Kind::UnknownStatus(code) => Some(code),
            Kind::CertificateRequired => Some(StatusCode::CLIENT_CERTIFICATE_REQUIRED),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("gmi::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref url) = self.inner.url {
            builder.field("url", &url.as_str());
        }

        if let Some(ref meta) = self.inner.meta {
            builder.field("meta", meta);
        }

        if !self.inner.redirects.is_empty() {
            builder.field("redirects", &self.inner.redirects.len());
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
            Kind::Builder => f.write_str("builder error")?,
            Kind::Url => f.write_str("invalid URL")?,
            Kind::Scheme => f.write_str("unsupported URL scheme")?,
            Kind::Connect => f.write_str("error connecting to server")?,
            Kind::Request => f.write_str("error sending request")?,
            Kind::Header => f.write_str("could not read response header")?,
            Kind::HeaderParse => f.write_str("could not parse response header")?,
            Kind::Body => f.write_str("error reading response body")?,
            Kind::Mime => f.write_str("unsupported MIME type")?,
            Kind::Input(code) => write!(f, "unsupported feature ({code})")?,
            Kind::ClientError(code) => {
                write!(f, "server could not process request ({code})")?
            }
            Kind::ServerError(code) => write!(f, "server error ({code})")?,
            Kind::CertificateRequired => {
                f.write_str("resource requires a client certificate")?
            }
            Kind::Certificate(code) => write!(f, "certificate problem ({code})")?,
            Kind::UnknownStatus(code) => write!(f, "unknown status code ({code})")?,
            Kind::Redirect => f.write_str("error following redirect")?,
        };

        if let Some(url) = &self.inner.url {
            write!(f, " for url ({})", url.as_str())?;
        }

        if let Some(meta) = &self.inner.meta {
            write!(f, ": {}", EscapeControl::new(meta))?;
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

#[derive(Debug)]
pub(crate) enum Kind {
    Builder,
    Url,
    Scheme,
    Connect,
    Request,
    Header,
    HeaderParse,
    Body,
    Mime,
    Input(StatusCode),
    ClientError(StatusCode),
    ServerError(StatusCode),
    CertificateRequired,
    Certificate(StatusCode),
    UnknownStatus(StatusCode),
    Redirect,
}

#[derive(Debug)]
pub(crate) struct TimedOut;

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("operation timed out")
    }
}

impl StdError for TimedOut {}

#[derive(Debug)]
pub(crate) struct BadScheme(String);

impl fmt::Display for BadScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "URL scheme '{}' is not allowed", self.0)
    }
}

impl StdError for BadScheme {}
