use std::{
    error::Error as StdError,
    fmt, io,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use url::Url;

use super::response::Response;
use crate::{
    connect::{with_timeout, Connect, Dst, TlsConnector},
    error::{BoxError, TimedOut},
    into_url::validate_url,
    proto,
    redirect::{self, ActionKind},
    status::StatusClass,
    tls::{Certificate, TlsSettings},
    Error, IntoUrl, StatusCode,
};

/// An asynchronous `Client` to fetch Gemini resources with.
///
/// The Client has various configuration values to tweak, but the defaults
/// are set to what is usually the most commonly desired value. To configure a
/// `Client`, use `Client::builder()`.
///
/// Every fetch opens its own connection, since the protocol closes the
/// connection after each response. Configuration is fixed once built, so one
/// `Client` can be shared across tasks.
///
/// You do **not** have to wrap the `Client` in an [`Rc`] or [`Arc`] to **reuse** it,
/// because it already uses an [`Arc`] internally.
///
/// [`Rc`]: std::rc::Rc
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

/// A `ClientBuilder` can be used to create a `Client` with custom configuration.
#[must_use]
pub struct ClientBuilder {
    config: Config,
}

struct Config {
    // NOTE: When adding a new field, update `fmt::Debug for ClientBuilder`
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    timeout: Option<Duration>,
    certs_verification: bool,
    tls_built_in_root_certs: bool,
    root_certs: Vec<Certificate>,
    redirect_policy: redirect::Policy,
    connection_verbose: bool,
    connector: Option<Arc<dyn Connect>>,
    error: Option<crate::Error>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Constructs a new `ClientBuilder`.
    ///
    /// This is the same as `Client::builder()`.
    pub fn new() -> ClientBuilder {
        ClientBuilder {
            config: Config {
                connect_timeout: Some(Duration::from_secs(9)),
                read_timeout: None,
                timeout: None,
                certs_verification: false,
                tls_built_in_root_certs: true,
                root_certs: Vec::new(),
                redirect_policy: redirect::Policy::default(),
                connection_verbose: false,
                connector: None,
                error: None,
            },
        }
    }

    /// Returns a `Client` that uses this `ClientBuilder` configuration.
    ///
    /// # Errors
    ///
    /// This method fails if an added root certificate could not be loaded or
    /// the TLS configuration cannot be built.
    pub fn build(self) -> crate::Result<Client> {
        let config = self.config;

        if let Some(err) = config.error {
            return Err(err);
        }

        let connector = match config.connector {
            Some(connector) => connector,
            None => {
                let tls = TlsSettings {
                    certs_verification: config.certs_verification,
                    built_in_root_certs: config.tls_built_in_root_certs,
                    root_certs: config.root_certs,
                }
                .build()?;
                Arc::new(TlsConnector::new(tls, config.connection_verbose)) as Arc<dyn Connect>
            }
        };

        Ok(Client {
            inner: Arc::new(ClientRef {
                connector,
                connect_timeout: config.connect_timeout,
                read_timeout: config.read_timeout,
                request_timeout: config.timeout,
                redirect_policy: config.redirect_policy,
            }),
        })
    }

    // Timeout options

    /// Enables a total timeout for each fetch.
    ///
    /// The timeout is applied from when the fetch starts connecting until the
    /// last body of the redirect chain has been read.
    ///
    /// Default is no timeout.
    pub fn timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set a timeout for only the connect phase of a `Client`.
    ///
    /// This covers name resolution, the TCP connect and the TLS handshake.
    ///
    /// Default is 9 seconds. Pass `None` to wait indefinitely.
    ///
    /// # Note
    ///
    /// This **requires** the futures be executed in a tokio runtime with
    /// a tokio timer enabled.
    pub fn connect_timeout<D>(mut self, timeout: D) -> ClientBuilder
    where
        D: Into<Option<Duration>>,
    {
        self.config.connect_timeout = timeout.into();
        self
    }

    /// Set a timeout for each read from the server.
    ///
    /// The timeout restarts after every successful read, so a slow but
    /// steady body is not cut off.
    ///
    /// Default is no timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Set whether connections should emit verbose logs.
    ///
    /// Enabling this option will emit [log][] messages at the `TRACE` level
    /// for read and write operations on connections.
    ///
    /// [log]: https://crates.io/crates/log
    pub fn connection_verbose(mut self, verbose: bool) -> ClientBuilder {
        self.config.connection_verbose = verbose;
        self
    }

    // Redirect options

    /// Set a `redirect::Policy` for this client.
    ///
    /// Default will follow redirects up to a maximum of 5.
    pub fn redirect(mut self, policy: redirect::Policy) -> ClientBuilder {
        self.config.redirect_policy = policy;
        self
    }

    // TLS options

    /// Add a custom root certificate.
    ///
    /// Only consulted when certificate verification is switched on with
    /// `danger_accept_invalid_certs(false)`.
    pub fn add_root_certificate(mut self, cert: Certificate) -> ClientBuilder {
        self.config.root_certs.push(cert);
        self
    }

    /// Add every certificate in a PEM bundle file as a trusted root.
    ///
    /// A file that cannot be read or holds no certificate makes `build()`
    /// fail with a builder error.
    pub fn ca_cert_file<P: AsRef<Path>>(mut self, path: P) -> ClientBuilder {
        let path = path.as_ref();
        let loaded = std::fs::read(path)
            .map_err(|e| Error::builder(format!("{}: {e}", path.display())))
            .and_then(|pem| Certificate::from_pem_bundle(&pem))
            .and_then(|certs| {
                if certs.is_empty() {
                    Err(Error::builder(format!(
                        "{}: no certificates found",
                        path.display()
                    )))
                } else {
                    Ok(certs)
                }
            });

        match loaded {
            Ok(certs) => self.config.root_certs.extend(certs),
            Err(err) => {
                self.config.error.get_or_insert(err);
            }
        }
        self
    }

    /// Controls the use of built-in/preloaded certificates during certificate validation.
    ///
    /// Defaults to `true` -- the roots from the enabled `rustls-tls-*-roots`
    /// feature will be used.
    pub fn tls_built_in_root_certs(mut self, tls_built_in_root_certs: bool) -> ClientBuilder {
        self.config.tls_built_in_root_certs = tls_built_in_root_certs;
        self
    }

    /// Controls the use of certificate validation.
    ///
    /// Defaults to `true`, since almost every Gemini server presents a
    /// self-signed certificate.
    ///
    /// # Warning
    ///
    /// While this is `true`, *any* certificate for *any* site will be
    /// trusted for use. This includes expired certificates. Pass `false` to
    /// verify servers against the trusted roots instead.
    pub fn danger_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> ClientBuilder {
        self.config.certs_verification = !accept_invalid_certs;
        self
    }

    /// Use a custom connector instead of TCP plus TLS.
    ///
    /// TLS options on this builder are ignored when a connector is set; the
    /// connect timeout still applies.
    pub fn connector<C>(mut self, connector: C) -> ClientBuilder
    where
        C: Connect + 'static,
    {
        self.config.connector = Some(Arc::new(connector));
        self
    }
}

impl Client {
    /// Constructs a new `Client`.
    ///
    /// # Panics
    ///
    /// This method panics if the TLS configuration cannot be built.
    ///
    /// Use `Client::builder()` if you wish to handle the failure as an `Error`
    /// instead of panicking.
    pub fn new() -> Client {
        ClientBuilder::new().build().expect("Client::new()")
    }

    /// Creates a `ClientBuilder` to configure a `Client`.
    ///
    /// This is the same as `ClientBuilder::new()`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Fetch a Gemini URL, following redirects per the client's policy.
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), gmi::Error> {
    /// let client = gmi::Client::new();
    /// let rsp = client.get("geminiprotocol.net/").await?;
    /// println!("{}", rsp.text());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// This method fails if the URL is invalid or not `gemini://`, if the
    /// server cannot be reached, if the exchange breaks off, or if the final
    /// status is anything but a success. See [`Error`] for how to tell these
    /// apart.
    pub async fn get<U: IntoUrl>(&self, url: U) -> crate::Result<Response> {
        let url = url.into_url()?;

        match self.inner.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.fetch(url.clone())).await {
                Ok(res) => res,
                Err(_elapsed) => Err(Error::request(TimedOut).with_url(url)),
            },
            None => self.fetch(url).await,
        }
    }

    async fn fetch(&self, mut url: Url) -> crate::Result<Response> {
        let start = Instant::now();
        let mut previous = Vec::new();

        loop {
            let hop = self
                .exchange(&url)
                .await
                .map_err(|e| e.with_redirect_chain(&previous))?;

            match hop.status.class() {
                Some(StatusClass::Success) => {
                    return Ok(Response::new(
                        url,
                        hop.status,
                        hop.meta,
                        hop.body,
                        start.elapsed(),
                    ));
                }
                Some(StatusClass::Redirect) => {
                    let next = redirect_target(&url, hop.meta.as_deref())
                        .map_err(|e| e.with_redirect_chain(&previous))?;

                    previous.push(url.clone());

                    match self.inner.redirect_policy.check(hop.status, &next, &previous) {
                        ActionKind::Follow => {
                            let next = validate_url(next)
                                .map_err(|e| e.with_redirect_chain(&previous))?;
                            debug!("redirect ({}) {} -> {}", hop.status.as_u16(), url, next);
                            url = next;
                        }
                        ActionKind::Stop => {
                            debug!("redirect policy disallowed redirection to '{next}'");
                            return Ok(Response::new(
                                url,
                                hop.status,
                                hop.meta,
                                Bytes::new(),
                                start.elapsed(),
                            ));
                        }
                        ActionKind::Error(err) => {
                            return Err(Error::redirect(err, url).with_redirect_chain(&previous));
                        }
                    }
                }
                // `exchange` only hands back statuses that carry on the fetch.
                Some(StatusClass::Input)
                | Some(StatusClass::TemporaryFailure)
                | Some(StatusClass::PermanentFailure)
                | Some(StatusClass::ClientCertificate)
                | None => {
                    return Err(Error::status_code(url, hop.status, hop.meta)
                        .with_redirect_chain(&previous));
                }
            }
        }
    }

    /// Runs one request/response exchange on a fresh connection.
    async fn exchange(&self, url: &Url) -> crate::Result<Hop> {
        let dst = Dst::from_url(url)?;

        let conn = with_timeout(self.inner.connector.connect(dst), self.inner.connect_timeout)
            .await
            .map_err(|e| Error::connect(e).with_url(url.clone()))?;

        let mut conn = BufReader::new(conn);

        let request = proto::request_line(url.as_str());
        conn.write_all(&request)
            .await
            .map_err(|e| Error::request(e).with_url(url.clone()))?;
        conn.flush()
            .await
            .map_err(|e| Error::request(e).with_url(url.clone()))?;

        let read_timeout = self.inner.read_timeout;
        let line = with_timeout(
            async {
                proto::read_header_line(&mut conn, proto::MAX_HEADER_LEN)
                    .await
                    .map_err(BoxError::from)
            },
            read_timeout,
        )
        .await
        .map_err(|e| Error::header(e).with_url(url.clone()))?;

        let header = std::str::from_utf8(&line)
            .map_err(|e| Error::header_parse(e).with_url(url.clone()))?;
        let (status, meta) = proto::parse_header(header)
            .map_err(|e| Error::header_parse(e).with_url(url.clone()))?;

        debug!("{} {}", url, status);

        if !status.is_known() {
            return Err(Error::status_code(url.clone(), status, meta));
        }

        let body = match status.class() {
            Some(StatusClass::Success) => {
                if !proto::is_gemtext(meta.as_deref()) {
                    return Err(Error::mime(meta).with_url(url.clone()));
                }
                read_body(&mut conn, read_timeout)
                    .await
                    .map_err(|e| Error::body(e).with_url(url.clone()))?
            }
            Some(StatusClass::Redirect) => Bytes::new(),
            Some(StatusClass::Input)
            | Some(StatusClass::TemporaryFailure)
            | Some(StatusClass::PermanentFailure)
            | Some(StatusClass::ClientCertificate)
            | None => {
                return Err(Error::status_code(url.clone(), status, meta));
            }
        };

        Ok(Hop { status, meta, body })
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("Client");
        self.inner.fmt_fields(&mut builder);
        builder.finish()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("ClientBuilder");
        self.config.fmt_fields(&mut builder);
        builder.finish()
    }
}

impl Config {
    fn fmt_fields(&self, f: &mut fmt::DebugStruct<'_, '_>) {
        // Instead of deriving Debug, only print fields when their output
        // would provide relevant or interesting data.

        f.field("redirect_policy", &self.redirect_policy);

        if let Some(ref d) = self.connect_timeout {
            f.field("connect_timeout", d);
        }

        if let Some(ref d) = self.read_timeout {
            f.field("read_timeout", d);
        }

        if let Some(ref d) = self.timeout {
            f.field("timeout", d);
        }

        if !self.certs_verification {
            f.field("danger_accept_invalid_certs", &true);
        }

        if !self.root_certs.is_empty() {
            f.field("root_certs", &self.root_certs.len());
        }

        if self.connection_verbose {
            f.field("connection_verbose", &true);
        }

        if self.connector.is_some() {
            f.field("connector", &"custom");
        }
    }
}

struct ClientRef {
    connector: Arc<dyn Connect>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    redirect_policy: redirect::Policy,
}

impl ClientRef {
    fn fmt_fields(&self, f: &mut fmt::DebugStruct<'_, '_>) {
        f.field("redirect_policy", &self.redirect_policy);

        if let Some(ref d) = self.connect_timeout {
            f.field("connect_timeout", d);
        }

        if let Some(ref d) = self.read_timeout {
            f.field("read_timeout", d);
        }

        if let Some(ref d) = self.request_timeout {
            f.field("timeout", d);
        }
    }
}

/// The parts of one response the redirect loop needs.
struct Hop {
    status: StatusCode,
    meta: Option<String>,
    body: Bytes,
}

fn redirect_target(current: &Url, meta: Option<&str>) -> crate::Result<Url> {
    let target = meta.ok_or_else(|| {
        Error::invalid_url("redirect response has no target URL").with_url(current.clone())
    })?;

    current
        .join(target)
        .map_err(|e| Error::invalid_url(e).with_url(current.clone()))
}

async fn read_body<R>(reader: &mut R, read_timeout: Option<Duration>) -> Result<Bytes, BoxError>
where
    R: AsyncRead + Unpin,
{
    let mut body = BytesMut::with_capacity(8 * 1024);

    loop {
        let read = with_timeout(
            async { reader.read_buf(&mut body).await.map_err(BoxError::from) },
            read_timeout,
        )
        .await;

        match read {
            Ok(0) => break,
            Ok(_) => {}
            // Servers commonly close without a TLS close_notify.
            Err(e) if is_unexpected_eof(&*e) => {
                debug!("body ended without close_notify after {} bytes", body.len());
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(body.freeze())
}

fn is_unexpected_eof(err: &(dyn StdError + Send + Sync + 'static)) -> bool {
    err.downcast_ref::<io::Error>()
        .map_or(false, |e| e.kind() == io::ErrorKind::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn client_is_send_sync() {
        assert_send_sync::<Client>();
        assert_send_sync::<ClientBuilder>();
    }

    #[test]
    fn builder_debug_shows_defaults() {
        let s = format!("{:?}", Client::builder());
        assert!(s.contains("Limit(5)"), "{s}");
        assert!(s.contains("connect_timeout: 9s"), "{s}");
        assert!(s.contains("danger_accept_invalid_certs: true"), "{s}");
    }

    #[test]
    fn ca_cert_file_missing_fails_build() {
        let err = Client::builder()
            .ca_cert_file("/definitely/not/here.pem")
            .build()
            .unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn ca_cert_file_loads_bundle() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/support/certs/server.crt");
        let builder = Client::builder().ca_cert_file(path);
        assert_eq!(builder.config.root_certs.len(), 1);
        assert!(builder.danger_accept_invalid_certs(false).build().is_ok());
    }

    #[test]
    fn redirect_target_resolves_relative() {
        let base = Url::parse("gemini://example.org/dir/page").unwrap();
        assert_eq!(
            redirect_target(&base, Some("other")).unwrap().as_str(),
            "gemini://example.org/dir/other"
        );
        assert_eq!(
            redirect_target(&base, Some("/root")).unwrap().as_str(),
            "gemini://example.org/root"
        );
        assert_eq!(
            redirect_target(&base, Some("gemini://elsewhere.org/")).unwrap().as_str(),
            "gemini://elsewhere.org/"
        );
        assert!(redirect_target(&base, None).unwrap_err().is_url());
    }

    #[tokio::test]
    async fn read_body_treats_unexpected_eof_as_end() {
        struct Truncated(Option<&'static [u8]>);

        impl AsyncRead for Truncated {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                match self.0.take() {
                    Some(data) => {
                        buf.put_slice(data);
                        std::task::Poll::Ready(Ok(()))
                    }
                    None => std::task::Poll::Ready(Err(io::ErrorKind::UnexpectedEof.into())),
                }
            }
        }

        let mut reader = Truncated(Some(b"# partial"));
        let body = read_body(&mut reader, None).await.unwrap();
        assert_eq!(&body[..], b"# partial");
    }
}
