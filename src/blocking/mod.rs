//! A blocking Client API.
//!
//! The blocking `Client` will block the current thread to execute, instead
//! of returning futures that need to be executed on a runtime.
//!
//! Conversely, the functionality in `gmi::blocking` must *not* be executed
//! within an async runtime, or it will panic when attempting to block. If
//! calling directly from an async function, consider using an async
//! [`gmi::Client`][crate::Client] instead.
//!
//! # Optional
//!
//! This requires the optional `blocking` feature to be enabled.
//!
//! # Making a fetch
//!
//! For a single fetch, you can use the [`get`] shortcut method.
//!
//! ```rust,no_run
//! # fn run() -> Result<(), gmi::Error> {
//! let rsp = gmi::blocking::get("gemini://geminiprotocol.net/")?;
//!
//! println!("status = {}", rsp.status());
//! println!("body = {}", rsp.text());
//! # Ok(())
//! # }
//! ```
//!
//! Additionally, the blocking [`Response`] struct is the same one the async
//! client returns, so its body is already fully read.
//!
//! **NOTE**: If you plan to perform multiple fetches, it is best to create a
//! [`Client`] and reuse it, so the background runtime thread is started once.

mod client;

pub use self::client::{Client, ClientBuilder};
pub use crate::Response;

/// Shortcut method to quickly fetch a Gemini URL.
///
/// **NOTE**: This function creates a new internal `Client` on each call,
/// and so should not be used if making many fetches. Create a
/// [`Client`](./struct.Client.html) instead.
///
/// # Examples
///
/// ```rust,no_run
/// # fn run() -> Result<(), gmi::Error> {
/// let body = gmi::blocking::get("geminiprotocol.net/")?.text().into_owned();
/// # Ok(())
/// # }
/// # fn main() { }
/// ```
///
/// # Errors
///
/// This function fails if:
///
/// - the runtime thread cannot be started
/// - supplied `Url` cannot be parsed or is not `gemini://`
/// - there was an error while connecting or reading the response
/// - the server answered with anything but success
/// - redirect limit was exhausted
pub fn get<T: crate::IntoUrl>(url: T) -> crate::Result<Response> {
    Client::builder().build()?.get(url)
}
