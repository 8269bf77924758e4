//! Gemini status codes.
//!
//! A response header always begins with a two digit status code. The first
//! digit selects one of six classes, the second refines it. [`StatusCode`]
//! wraps any integer a server sends, while the associated constants cover the
//! codes the protocol defines.

use std::{error::Error as StdError, fmt, str::FromStr};

/// A Gemini response status code.
///
/// Constants are provided for each code the protocol defines. Any other
/// integer may still be represented, since a misbehaving server can send
/// one; [`StatusCode::is_known`] tells the two apart.
///
/// # Examples
///
/// ```
/// use gmi::StatusCode;
///
/// assert_eq!(StatusCode::from_u16(51), StatusCode::NOT_FOUND);
/// assert_eq!(StatusCode::NOT_FOUND.as_u16(), 51);
/// assert!(StatusCode::NOT_FOUND.is_permanent_failure());
/// assert_eq!(StatusCode::NOT_FOUND.to_string(), "51 (Not Found)");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u16);

/// The six status classes, selected by the first digit of a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// `1x`: the server wants a line of user input.
    Input,
    /// `2x`: the body follows the header.
    Success,
    /// `3x`: the resource lives elsewhere; meta holds the new URL.
    Redirect,
    /// `4x`: the request failed, but may succeed if retried later.
    TemporaryFailure,
    /// `5x`: the request failed and will keep failing.
    PermanentFailure,
    /// `6x`: a client certificate is needed or was rejected.
    ClientCertificate,
}

/// The error returned when a status token is not an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatusCode {
    token: String,
}

impl StatusCode {
    /// Wraps an integer status code.
    ///
    /// Codes outside the protocol's table are accepted; check
    /// [`StatusCode::is_known`] before relying on one.
    #[inline]
    pub const fn from_u16(code: u16) -> StatusCode {
        StatusCode(code)
    }

    /// Returns the `u16` corresponding to this `StatusCode`.
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Get the class this code belongs to.
    ///
    /// Returns `None` for anything outside `10..=69`.
    pub fn class(&self) -> Option<StatusClass> {
        match self.0 {
            10..=19 => Some(StatusClass::Input),
            20..=29 => Some(StatusClass::Success),
            30..=39 => Some(StatusClass::Redirect),
            40..=49 => Some(StatusClass::TemporaryFailure),
            50..=59 => Some(StatusClass::PermanentFailure),
            60..=69 => Some(StatusClass::ClientCertificate),
            _ => None,
        }
    }

    /// Get the human readable label for this code, if the protocol defines it.
    ///
    /// ```
    /// assert_eq!(gmi::StatusCode::SLOW_DOWN.canonical_reason(), Some("Slow Down"));
    /// assert_eq!(gmi::StatusCode::from_u16(25).canonical_reason(), None);
    /// ```
    pub fn canonical_reason(&self) -> Option<&'static str> {
        canonical_reason(self.0)
    }

    /// Check if this code appears in the protocol's status table.
    pub fn is_known(&self) -> bool {
        self.canonical_reason().is_some()
    }

    /// Check if status is within 10-19.
    #[inline]
    pub fn is_input(&self) -> bool {
        self.class() == Some(StatusClass::Input)
    }

    /// Check if status is within 20-29.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.class() == Some(StatusClass::Success)
    }

    /// Check if status is within 30-39.
    #[inline]
    pub fn is_redirect(&self) -> bool {
        self.class() == Some(StatusClass::Redirect)
    }

    /// Check if status is within 40-49.
    #[inline]
    pub fn is_temporary_failure(&self) -> bool {
        self.class() == Some(StatusClass::TemporaryFailure)
    }

    /// Check if status is within 50-59.
    #[inline]
    pub fn is_permanent_failure(&self) -> bool {
        self.class() == Some(StatusClass::PermanentFailure)
    }

    /// Check if status is within 60-69.
    #[inline]
    pub fn is_client_certificate(&self) -> bool {
        self.class() == Some(StatusClass::ClientCertificate)
    }
}

/// Returns the label for a numeric status code, e.g. `"Not Found"` for 51.
///
/// This is a pure lookup with no connection to a fetch, intended for
/// diagnostics and command-line display.
pub fn status_text(code: u16) -> Option<&'static str> {
    canonical_reason(code)
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Formats the code followed by its label, e.g. `20 (Success)`.
impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.0,
            self.canonical_reason().unwrap_or("<unknown status code>")
        )
    }
}

impl From<StatusCode> for u16 {
    #[inline]
    fn from(status: StatusCode) -> u16 {
        status.0
    }
}

impl PartialEq<u16> for StatusCode {
    #[inline]
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

impl FromStr for StatusCode {
    type Err = InvalidStatusCode;

    fn from_str(token: &str) -> Result<StatusCode, InvalidStatusCode> {
        match token.parse::<u16>() {
            Ok(code) => Ok(StatusCode(code)),
            // all digits but too large: still a status, just not one we know
            Err(_) if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(StatusCode(u16::MAX))
            }
            Err(_) => Err(InvalidStatusCode {
                token: token.to_owned(),
            }),
        }
    }
}

impl InvalidStatusCode {
    /// The token that failed to parse.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for InvalidStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not extract response status code from '{}'", self.token)
    }
}

impl StdError for InvalidStatusCode {}

macro_rules! status_codes {
    (
        $(
            $(#[$docs:meta])*
            ($num:expr, $konst:ident, $phrase:expr);
        )+
    ) => {
        impl StatusCode {
        $(
            $(#[$docs])*
            pub const $konst: StatusCode = StatusCode($num);
        )+
        }

        fn canonical_reason(num: u16) -> Option<&'static str> {
            match num {
                $(
                $num => Some($phrase),
                )+
                _ => None
            }
        }
    }
}

status_codes! {
    /// 10 Input
    (10, INPUT, "Input");
    /// 11 Sensitive Input
    (11, SENSITIVE_INPUT, "Sensitive Input");

    /// 20 Success
    (20, SUCCESS, "Success");

    /// 30 Temporary Redirect
    (30, REDIRECT_TEMPORARY, "Temporary Redirect");
    /// 31 Permanent Redirect
    (31, REDIRECT_PERMANENT, "Permanent Redirect");

    /// 40 Temporary Failure
    (40, TEMPORARY_FAILURE, "Temporary Failure");
    /// 41 Server Unavailable
    (41, SERVER_UNAVAILABLE, "Server Unavailable");
    /// 42 CGI Error
    (42, CGI_ERROR, "CGI Error");
    /// 43 Proxy Error
    (43, PROXY_ERROR, "Proxy Error");
    /// 44 Slow Down
    (44, SLOW_DOWN, "Slow Down");

    /// 50 Permanent Failure
    (50, PERMANENT_FAILURE, "Permanent Failure");
    /// 51 Not Found
    (51, NOT_FOUND, "Not Found");
    /// 52 Gone
    (52, GONE, "Gone");
    /// 53 Proxy Request Refused
    (53, PROXY_REQUEST_REFUSED, "Proxy Request Refused");
    /// 59 Bad Request
    (59, BAD_REQUEST, "Bad Request");

    /// 60 Client Certificate Required
    (60, CLIENT_CERTIFICATE_REQUIRED, "Client Certificate Required");
    /// 61 Certificate Not Authorised
    (61, CERTIFICATE_NOT_AUTHORISED, "Certificate Not Authorised");
    /// 62 Certificate Not Valid
    (62, CERTIFICATE_NOT_VALID, "Certificate Not Valid");
}
