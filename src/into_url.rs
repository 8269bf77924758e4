use url::Url;

use crate::{proto, Error};

/// A trait to try to convert some type into a Gemini `Url`.
///
/// Strings without a `://` separator are treated as `gemini://` URLs, so
/// `"example.org/page"` and `"gemini://example.org/page"` name the same
/// resource.
///
/// This trait is "sealed", such that only types within gmi can
/// implement it.
pub trait IntoUrl: IntoUrlSealed {}

impl IntoUrl for Url {}
impl IntoUrl for String {}
impl IntoUrl for &Url {}
impl IntoUrl for &str {}
impl IntoUrl for &String {}

pub trait IntoUrlSealed {
    // Besides parsing as a valid `Url`, the `Url` must be something a
    // Gemini server will accept on a request line.
    fn into_url(self) -> crate::Result<Url>;

    fn as_str(&self) -> &str;
}

impl IntoUrlSealed for Url {
    fn into_url(self) -> crate::Result<Url> {
        validate_url(self)
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for &Url {
    fn into_url(self) -> crate::Result<Url> {
        validate_url(self.clone())
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl<T> IntoUrlSealed for T
where
    T: AsRef<str> + sealed::Sealed,
{
    fn into_url(self) -> crate::Result<Url> {
        let s = self.as_ref().trim();
        let url = if s.contains("://") {
            Url::parse(s)
        } else {
            Url::parse(&format!("{}://{}", proto::SCHEME, s))
        };
        url.map_err(Error::invalid_url)?.into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

/// Checks that `url` can be sent on a request line.
///
/// Used for caller-supplied URLs and for every redirect target.
pub(crate) fn validate_url(url: Url) -> crate::Result<Url> {
    if url.scheme() != proto::SCHEME {
        return Err(Error::url_bad_scheme(url));
    }

    if !url.host_str().map_or(false, |h| !h.is_empty()) {
        return Err(Error::invalid_url("URL has no host").with_url(url));
    }

    if url.as_str().len() > proto::URL_MAX_LEN {
        let len = url.as_str().len();
        return Err(Error::invalid_url(format!(
            "URL is {len} bytes, longer than the {} byte limit",
            proto::URL_MAX_LEN
        ))
        .with_url(url));
    }

    Ok(url)
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for &str {}
    impl Sealed for String {}
    impl Sealed for &String {}
}
