use std::{
    fmt,
    future::Future,
    path::Path,
    sync::Arc,
    thread,
    time::Duration,
};

use log::{error, trace};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::{
    async_impl, connect::Connect, redirect, tls::Certificate, IntoUrl,
    Response,
};

/// A `Client` to fetch Gemini resources with, blocking the calling thread.
///
/// The Client has various configuration values to tweak, but the defaults
/// are set to what is usually the most commonly desired value. To configure a
/// `Client`, use `Client::builder()`.
///
/// Each `Client` runs an async client on its own background thread. Cloning
/// is cheap and shares that thread; it shuts down once the last clone drops.
///
/// # Panics
///
/// Fetching from inside an async runtime panics. Use the async
/// [`crate::Client`] there instead.
///
/// # Examples
///
/// ```rust,no_run
/// use gmi::blocking::Client;
/// #
/// # fn run() -> Result<(), gmi::Error> {
/// let client = Client::new();
/// let rsp = client.get("gemini://geminiprotocol.net/")?;
/// #   drop(rsp);
/// #   Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: ClientHandle,
}

/// A `ClientBuilder` can be used to create a `Client` with custom configuration.
///
/// # Example
///
/// ```
/// # fn run() -> Result<(), gmi::Error> {
/// use std::time::Duration;
///
/// let client = gmi::blocking::Client::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct ClientBuilder {
    inner: async_impl::ClientBuilder,
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
            inner: async_impl::ClientBuilder::new(),
        }
    }

    /// Returns a `Client` that uses this `ClientBuilder` configuration.
    ///
    /// # Errors
    ///
    /// This method fails if the background runtime cannot be started or the
    /// async client cannot be built.
    pub fn build(self) -> crate::Result<Client> {
        ClientHandle::new(self).map(|handle| Client { inner: handle })
    }

    // Timeout options

    /// Set a timeout for the whole fetch, redirects included.
    ///
    /// Default is no timeout.
    pub fn timeout(self, timeout: Duration) -> ClientBuilder {
        self.with_inner(|inner| inner.timeout(timeout))
    }

    /// Set a timeout for only the connect phase of a `Client`.
    ///
    /// Default is 9 seconds.
    pub fn connect_timeout<D>(self, timeout: D) -> ClientBuilder
    where
        D: Into<Option<Duration>>,
    {
        self.with_inner(|inner| inner.connect_timeout(timeout))
    }

    /// Set a timeout for each read from the server.
    ///
    /// Default is no timeout.
    pub fn read_timeout(self, timeout: Duration) -> ClientBuilder {
        self.with_inner(|inner| inner.read_timeout(timeout))
    }

    /// Set whether connections should emit verbose logs.
    pub fn connection_verbose(self, verbose: bool) -> ClientBuilder {
        self.with_inner(|inner| inner.connection_verbose(verbose))
    }

    // Redirect options

    /// Set a `redirect::Policy` for this client.
    ///
    /// Default will follow redirects up to a maximum of 5.
    pub fn redirect(self, policy: redirect::Policy) -> ClientBuilder {
        self.with_inner(move |inner| inner.redirect(policy))
    }

    // TLS options

    /// Add a custom root certificate.
    pub fn add_root_certificate(self, cert: Certificate) -> ClientBuilder {
        self.with_inner(move |inner| inner.add_root_certificate(cert))
    }

    /// Add every certificate in a PEM bundle file as a trusted root.
    pub fn ca_cert_file<P: AsRef<Path>>(self, path: P) -> ClientBuilder {
        self.with_inner(move |inner| inner.ca_cert_file(path))
    }

    /// Controls the use of built-in/preloaded certificates during certificate validation.
    pub fn tls_built_in_root_certs(self, tls_built_in_root_certs: bool) -> ClientBuilder {
        self.with_inner(move |inner| inner.tls_built_in_root_certs(tls_built_in_root_certs))
    }

    /// Controls the use of certificate validation.
    ///
    /// Defaults to `true`. See
    /// [`async_impl::ClientBuilder::danger_accept_invalid_certs`](crate::ClientBuilder::danger_accept_invalid_certs).
    pub fn danger_accept_invalid_certs(self, accept_invalid_certs: bool) -> ClientBuilder {
        self.with_inner(|inner| inner.danger_accept_invalid_certs(accept_invalid_certs))
    }

    /// Use a custom connector instead of TCP plus TLS.
    pub fn connector<C>(self, connector: C) -> ClientBuilder
    where
        C: Connect + 'static,
    {
        self.with_inner(move |inner| inner.connector(connector))
    }

    // private

    fn with_inner<F>(mut self, func: F) -> ClientBuilder
    where
        F: FnOnce(async_impl::ClientBuilder) -> async_impl::ClientBuilder,
    {
        self.inner = func(self.inner);
        self
    }
}

impl Client {
    /// Constructs a new `Client`.
    ///
    /// # Panic
    ///
    /// This method panics if the TLS configuration cannot be built, or the
    /// runtime thread cannot be started.
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
    /// # Errors
    ///
    /// Fails for the same reasons as the async
    /// [`Client::get`](crate::Client::get).
    pub fn get<U: IntoUrl>(&self, url: U) -> crate::Result<Response> {
        let url = url.into_url()?;
        self.inner.execute(url)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client").finish()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

#[derive(Clone)]
struct ClientHandle {
    inner: Arc<InnerClientHandle>,
}

type OneshotResponse = oneshot::Sender<crate::Result<Response>>;
type ThreadSender = mpsc::UnboundedSender<(Url, OneshotResponse)>;

struct InnerClientHandle {
    tx: Option<ThreadSender>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for InnerClientHandle {
    fn drop(&mut self) {
        let id = self.thread.as_ref().map(|h| h.thread().id());

        trace!("closing runtime thread ({:?})", id);
        self.tx.take();
        trace!("signaled close for runtime thread ({:?})", id);
        self.thread.take().map(|h| h.join());
        trace!("closed runtime thread ({:?})", id);
    }
}

impl ClientHandle {
    fn new(builder: ClientBuilder) -> crate::Result<ClientHandle> {
        let builder = builder.inner;
        let (tx, rx) = mpsc::unbounded_channel::<(Url, OneshotResponse)>();
        let (spawn_tx, spawn_rx) = oneshot::channel::<crate::Result<()>>();
        let handle = thread::Builder::new()
            .name("gmi-internal-sync-runtime".into())
            .spawn(move || {
                use tokio::runtime;
                let rt = match runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(crate::Error::builder)
                {
                    Err(e) => {
                        if let Err(e) = spawn_tx.send(Err(e)) {
                            error!("Failed to communicate runtime creation failure: {:?}", e);
                        }
                        return;
                    }
                    Ok(v) => v,
                };

                let f = async move {
                    let client = match builder.build() {
                        Err(e) => {
                            if let Err(e) = spawn_tx.send(Err(e)) {
                                error!("Failed to communicate client creation failure: {:?}", e);
                            }
                            return;
                        }
                        Ok(v) => v,
                    };
                    if let Err(e) = spawn_tx.send(Ok(())) {
                        error!("Failed to communicate successful startup: {:?}", e);
                        return;
                    }

                    let mut rx = rx;

                    while let Some((url, rsp_tx)) = rx.recv().await {
                        let client = client.clone();
                        tokio::spawn(forward(async move { client.get(url).await }, rsp_tx));
                    }

                    trace!("({:?}) Receiver is shutdown", thread::current().id());
                };

                trace!("({:?}) start runtime::block_on", thread::current().id());
                rt.block_on(f);
                trace!("({:?}) end runtime::block_on", thread::current().id());
                drop(rt);
                trace!("({:?}) finished", thread::current().id());
            })
            .map_err(crate::Error::builder)?;

        // Wait for the runtime thread to start up...
        match spawn_rx.blocking_recv() {
            Ok(Ok(())) => (),
            Ok(Err(err)) => return Err(err),
            Err(_canceled) => return Err(event_loop_panicked()),
        }

        let inner_handle = Arc::new(InnerClientHandle {
            tx: Some(tx),
            thread: Some(handle),
        });

        Ok(ClientHandle {
            inner: inner_handle,
        })
    }

    fn execute(&self, url: Url) -> crate::Result<Response> {
        let (tx, rx) = oneshot::channel();

        let sent = self
            .inner
            .tx
            .as_ref()
            .map(|sender| sender.send((url.clone(), tx)).is_ok())
            .unwrap_or(false);
        if !sent {
            return Err(event_loop_panicked().with_url(url));
        }

        match rx.blocking_recv() {
            Ok(res) => res,
            Err(_canceled) => Err(event_loop_panicked().with_url(url)),
        }
    }
}

async fn forward<F>(fut: F, mut tx: OneshotResponse)
where
    F: Future<Output = crate::Result<Response>>,
{
    // "select" on the sender being canceled, and the future completing
    tokio::select! {
        res = fut => {
            let _ = tx.send(res);
        }
        _ = tx.closed() => {
            // else request is canceled
        }
    }
}

#[cold]
#[inline(never)]
fn event_loop_panicked() -> crate::Error {
    // The only way the channel can be closed or canceled is if the runtime
    // panicked (a panic is caught and the runtime is dropped).
    crate::Error::request("event loop thread panicked")
}
