#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # gmi
//!
//! The `gmi` crate provides a [`Client`][client] for the
//! [Gemini protocol](https://geminiprotocol.net/), plus the pieces the
//! `gmiget`, `gmifmt` and `gmilinks` programs are built from.
//!
//! A Gemini exchange is small: open a TLS connection, send the URL on a
//! single line, read back a status line and, on success, a `text/gemini`
//! body. The client takes care of the parts around that:
//!
//! - Async and [blocking] Clients
//! - Customizable [redirect policy](#redirect-policies)
//! - Typed [status codes](StatusCode) and classified [errors](Error)
//! - Connect, read and total timeouts
//! - rustls [TLS](#tls), with verification opt-in
//! - [Gemtext](gemtext) formatting and link extraction
//!
//! ## Making a fetch
//!
//! For a single fetch, you can use the [`get`][get] shortcut method.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), gmi::Error> {
//! let rsp = gmi::get("gemini://geminiprotocol.net/").await?;
//!
//! println!("status = {}", rsp.status());
//! println!("body = {}", rsp.text());
//! # Ok(())
//! # }
//! ```
//!
//! URLs without a scheme are treated as `gemini://` URLs. Any other scheme
//! is rejected before a connection is opened.
//!
//! **NOTE**: If you plan to perform multiple fetches, it is best to create a
//! [`Client`][client] and reuse it, so its TLS configuration is built once.
//!
//! ## Statuses
//!
//! Only a success (`2x`) with a `text/gemini` body is returned as a
//! [`Response`]. Redirects (`3x`) are followed. Every other status is
//! returned as an [`Error`] carrying the status and the server's meta text:
//!
//! ```rust,no_run
//! # async fn run() {
//! match gmi::get("gemini://example.org/missing").await {
//!     Ok(rsp) => println!("{}", rsp.text()),
//!     Err(e) if e.is_server_error() => {
//!         println!("{:?}: {:?}", e.status(), e.meta());
//!     }
//!     Err(e) => println!("failed: {}", e),
//! }
//! # }
//! ```
//!
//! ## Redirect Policies
//!
//! By default, a `Client` will automatically follow up to 5 redirects.
//! Customize this with a [`redirect::Policy`](redirect::Policy) set on the
//! [`ClientBuilder`].
//!
//! ## TLS
//!
//! Gemini servers usually present self-signed certificates, so by default
//! certificates are **not** verified. Call
//! [`ClientBuilder::danger_accept_invalid_certs`] with `false` to verify
//! them against the built-in roots and any added with
//! [`ClientBuilder::add_root_certificate`].
//!
//! ## Optional Features
//!
//! - **blocking** *(enabled by default)*: Provides the [blocking][] client API.
//! - **cli** *(enabled by default)*: Builds the command-line programs.
//! - **rustls-tls-webpki-roots** *(enabled by default)*: Trust the
//!   Mozilla root set from `webpki-roots` when verifying.
//! - **rustls-tls-native-roots**: Trust the platform's root store when
//!   verifying.
//!
//! [client]: ./struct.Client.html
//! [get]: ./fn.get.html

pub use url::Url;

mod error;
mod into_url;
mod status;

pub use self::error::{BoxError, Error, Result};
pub use self::into_url::IntoUrl;
pub use self::status::{status_text, InvalidStatusCode, StatusClass, StatusCode};

/// Shortcut method to quickly fetch a Gemini URL.
///
/// See also the methods on the [`gmi::Response`](./struct.Response.html)
/// type.
///
/// **NOTE**: This function creates a new internal `Client` on each call,
/// and so should not be used if making many fetches. Create a
/// [`Client`](./struct.Client.html) instead.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn run() -> Result<(), gmi::Error> {
/// let body = gmi::get("gemini://geminiprotocol.net/").await?
///     .text()
///     .into_owned();
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// This function fails if:
///
/// - the TLS configuration cannot be built
/// - supplied `Url` cannot be parsed or is not `gemini://`
/// - there was an error while connecting or reading the response
/// - the server answered with anything but success
/// - redirect limit was exhausted
pub async fn get<T: IntoUrl>(url: T) -> crate::Result<Response> {
    Client::builder().build()?.get(url).await
}

fn _assert_impls() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    fn assert_clone<T: Clone>() {}

    assert_send::<Client>();
    assert_sync::<Client>();
    assert_clone::<Client>();

    assert_send::<Response>();
    assert_sync::<Response>();

    assert_send::<Error>();
    assert_sync::<Error>();
}

pub use self::async_impl::{Client, ClientBuilder, Response};
pub use self::tls::Certificate;

mod async_impl;
#[cfg(feature = "blocking")]
pub mod blocking;
pub mod config;
pub mod connect;
pub mod gemtext;
pub mod proto;
pub mod redirect;
pub mod terminal;
pub mod tls;
mod util;
