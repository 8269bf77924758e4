use std::{borrow::Cow, fmt, time::Duration};

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use mime::Mime;
use url::Url;

use crate::StatusCode;

/// A Response to a fetched Gemini URL.
///
/// The body has already been read in full by the time a `Response` is
/// handed out, so every accessor is synchronous and the value is immutable.
#[derive(Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    meta: Option<String>,
    body: Bytes,
    elapsed: Duration,
}

impl Response {
    pub(super) fn new(
        url: Url,
        status: StatusCode,
        meta: Option<String>,
        body: Bytes,
        elapsed: Duration,
    ) -> Response {
        Response {
            url,
            status,
            meta,
            body,
            elapsed,
        }
    }

    /// Get the final `Url` of this `Response`, after any redirects.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the `StatusCode` of this `Response`.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the meta string from the response header.
    ///
    /// For a success this is the MIME type; for a redirect returned because
    /// the policy stopped, it is the target URL.
    #[inline]
    pub fn meta(&self) -> Option<&str> {
        self.meta.as_deref()
    }

    /// Parse the meta of a success response as a `Mime`.
    ///
    /// Returns `None` for other statuses, or when the meta does not parse.
    pub fn mime(&self) -> Option<Mime> {
        if !self.status.is_success() {
            return None;
        }
        self.meta.as_deref().and_then(|m| m.parse().ok())
    }

    /// Get the length of the body in bytes.
    #[inline]
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Time from the start of the fetch, including any redirects, until the
    /// body was read.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Borrow the raw body.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get a cheap clone of the body.
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Take ownership of the body.
    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Get the full response text.
    ///
    /// This method decodes the response body with BOM sniffing
    /// and with malformed sequences replaced with the [`char::REPLACEMENT_CHARACTER`].
    /// Encoding is determined from the `charset` parameter of the meta,
    /// and defaults to `utf-8` if not presented.
    ///
    /// Note that the BOM is stripped from the returned String.
    pub fn text(&self) -> Cow<'_, str> {
        self.text_with_charset("utf-8")
    }

    /// Get the full response text given a specific encoding.
    ///
    /// The `charset` parameter of the meta still takes priority over
    /// `default_encoding`. For the possible encoding names see the
    /// [`encoding_rs`] docs.
    ///
    /// [`encoding_rs`]: https://docs.rs/encoding_rs/0.8/encoding_rs/#relationship-with-windows-code-pages
    pub fn text_with_charset(&self, default_encoding: impl AsRef<str>) -> Cow<'_, str> {
        let content_type = self.mime();
        let encoding_name = content_type
            .as_ref()
            .and_then(|mime| mime.get_param("charset").map(|charset| charset.as_str()))
            .unwrap_or(default_encoding.as_ref());
        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let (text, _, _) = encoding.decode(&self.body);
        text
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("meta", &self.meta)
            .field("content_length", &self.body.len())
            .finish()
    }
}
