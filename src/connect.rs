//! Opening connections to Gemini servers.
//!
//! The client asks a [`Connect`] implementation for a stream to each hop's
//! destination, bounding the whole attempt by the connect timeout. The
//! default, [`TlsConnector`], resolves the host, opens a TCP connection and
//! runs a rustls handshake. Tests and callers with unusual transports can
//! plug in their own.

use std::{
    fmt,
    future::Future,
    net::IpAddr,
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use url::{Host, Url};

use crate::{
    error::{BoxError, Error},
    proto,
};

/// A byte stream a Gemini exchange can run over.
pub trait AsyncConn: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncConn for T {}

/// A boxed connection, as handed to the client by a connector.
pub type BoxConn = Box<dyn AsyncConn>;

/// The future a connector returns.
pub type Connecting = Pin<Box<dyn Future<Output = Result<BoxConn, BoxError>> + Send>>;

/// Opens connections for a `Client`.
///
/// Implementations must be shareable between fetches; each call opens one
/// fresh connection that the client drops once the exchange is over.
pub trait Connect: Send + Sync {
    /// Opens a connection to `dst`.
    fn connect(&self, dst: Dst) -> Connecting;
}

impl<F> Connect for F
where
    F: Fn(Dst) -> Connecting + Send + Sync,
{
    fn connect(&self, dst: Dst) -> Connecting {
        (self)(dst)
    }
}

/// Where a connection should go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dst {
    url: Url,
    host: String,
    port: u16,
}

impl Dst {
    pub(crate) fn from_url(url: &Url) -> crate::Result<Dst> {
        let host = match url.host() {
            Some(Host::Domain(d)) if !d.is_empty() => d.to_owned(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(Error::invalid_url("URL has no host").with_url(url.clone())),
        };

        Ok(Dst {
            url: url.clone(),
            host,
            port: url.port().unwrap_or(proto::DEFAULT_PORT),
        })
    }

    /// The URL being fetched.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The host name, without brackets for IPv6 literals.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, 1965 unless the URL names another.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Dst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Builds the `host:port` string a connection to `url` targets.
///
/// The port defaults to 1965. IPv6 literals keep their brackets.
///
/// ```
/// let url = url::Url::parse("gemini://example.org/page").unwrap();
/// assert_eq!(gmi::connect::host_string(&url).unwrap(), "example.org:1965");
/// ```
pub fn host_string(url: &Url) -> crate::Result<String> {
    Dst::from_url(url).map(|dst| dst.to_string())
}

/// The default connector: TCP followed by a rustls handshake.
#[derive(Clone)]
pub struct TlsConnector {
    tls: tokio_rustls::TlsConnector,
    verbose: verbose::Wrapper,
}

impl TlsConnector {
    pub(crate) fn new(config: rustls::ClientConfig, verbose: bool) -> TlsConnector {
        TlsConnector {
            tls: tokio_rustls::TlsConnector::from(Arc::new(config)),
            verbose: verbose::Wrapper(verbose),
        }
    }

    async fn connect_tls(self, dst: Dst) -> Result<BoxConn, BoxError> {
        let server_name = server_name(dst.host())?;

        log::debug!("connecting to {dst}");
        let tcp = TcpStream::connect((dst.host(), dst.port())).await?;
        let _ = tcp.set_nodelay(true);

        log::trace!("tcp connected to {dst}, starting tls handshake");
        let tls = self.tls.connect(server_name, tcp).await?;
        log::debug!("tls established with {dst}");

        Ok(self.verbose.wrap(tls))
    }
}

impl Connect for TlsConnector {
    fn connect(&self, dst: Dst) -> Connecting {
        Box::pin(self.clone().connect_tls(dst))
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("verbose", &self.verbose.0)
            .finish()
    }
}

fn server_name(host: &str) -> Result<rustls::ServerName, BoxError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(rustls::ServerName::IpAddress(ip));
    }
    rustls::ServerName::try_from(host).map_err(Into::into)
}

pub(crate) async fn with_timeout<T, F>(f: F, timeout: Option<Duration>) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    if let Some(to) = timeout {
        match tokio::time::timeout(to, f).await {
            Err(_elapsed) => Err(Box::new(crate::error::TimedOut) as BoxError),
            Ok(Ok(try_res)) => Ok(try_res),
            Ok(Err(e)) => Err(e),
        }
    } else {
        f.await
    }
}

mod verbose {
    use std::{
        fmt,
        io::{self, IoSlice},
        pin::Pin,
        task::{Context, Poll},
    };

    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    use super::{AsyncConn, BoxConn};
    use crate::util::Escape;

    #[derive(Clone, Copy)]
    pub(super) struct Wrapper(pub(super) bool);

    impl Wrapper {
        pub(super) fn wrap<T: AsyncConn + 'static>(&self, conn: T) -> BoxConn {
            if self.0 {
                Box::new(Verbose {
                    // truncate is fine
                    id: crate::util::fast_random() as u32,
                    inner: conn,
                })
            } else {
                Box::new(conn)
            }
        }
    }

    struct Verbose<T> {
        id: u32,
        inner: T,
    }

    impl<T: AsyncRead + AsyncWrite + Unpin> AsyncRead for Verbose<T> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let before = buf.filled().len();
            match Pin::new(&mut self.inner).poll_read(cx, buf) {
                Poll::Ready(Ok(())) => {
                    log::trace!(
                        "{:08x} read: {:?}",
                        self.id,
                        Escape::new(&buf.filled()[before..])
                    );
                    Poll::Ready(Ok(()))
                }
                Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                Poll::Pending => Poll::Pending,
            }
        }
    }

    impl<T: AsyncRead + AsyncWrite + Unpin> AsyncWrite for Verbose<T> {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match Pin::new(&mut self.inner).poll_write(cx, buf) {
                Poll::Ready(Ok(n)) => {
                    log::trace!("{:08x} write: {:?}", self.id, Escape::new(&buf[..n]));
                    Poll::Ready(Ok(n))
                }
                Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                Poll::Pending => Poll::Pending,
            }
        }

        fn poll_write_vectored(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            bufs: &[IoSlice<'_>],
        ) -> Poll<io::Result<usize>> {
            match Pin::new(&mut self.inner).poll_write_vectored(cx, bufs) {
                Poll::Ready(Ok(nwritten)) => {
                    log::trace!(
                        "{:08x} write (vectored): {:?}",
                        self.id,
                        Vectored { bufs, nwritten }
                    );
                    Poll::Ready(Ok(nwritten))
                }
                Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                Poll::Pending => Poll::Pending,
            }
        }

        fn is_write_vectored(&self) -> bool {
            self.inner.is_write_vectored()
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    struct Vectored<'a, 'b> {
        bufs: &'a [IoSlice<'b>],
        nwritten: usize,
    }

    impl fmt::Debug for Vectored<'_, '_> {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            let mut left = self.nwritten;
            for buf in self.bufs.iter() {
                if left == 0 {
                    break;
                }
                let n = std::cmp::min(left, buf.len());
                fmt::Debug::fmt(&Escape::new(&buf[..n]), f)?;
                left -= n;
            }
            Ok(())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn host_string_default_port() {
        assert_eq!(
            host_string(&url("gemini://example.org/")).unwrap(),
            "example.org:1965"
        );
    }

    #[test]
    fn host_string_explicit_port() {
        assert_eq!(
            host_string(&url("gemini://example.org:1966/x")).unwrap(),
            "example.org:1966"
        );
    }

    #[test]
    fn host_string_ip_literals() {
        assert_eq!(
            host_string(&url("gemini://127.0.0.1/")).unwrap(),
            "127.0.0.1:1965"
        );
        assert_eq!(
            host_string(&url("gemini://[::1]:1970/")).unwrap(),
            "[::1]:1970"
        );
    }

    #[test]
    fn host_string_requires_host() {
        let err = host_string(&url("gemini:///nohost")).unwrap_err();
        assert!(err.is_url());
    }

    #[test]
    fn dst_parts() {
        let dst = Dst::from_url(&url("gemini://[::1]:1970/a")).unwrap();
        assert_eq!(dst.host(), "::1");
        assert_eq!(dst.port(), 1970);
        assert_eq!(dst.url().path(), "/a");
    }

    #[test]
    fn server_names() {
        assert!(matches!(
            server_name("127.0.0.1").unwrap(),
            rustls::ServerName::IpAddress(_)
        ));
        assert!(matches!(
            server_name("::1").unwrap(),
            rustls::ServerName::IpAddress(_)
        ));
        assert!(matches!(
            server_name("example.org").unwrap(),
            rustls::ServerName::DnsName(_)
        ));
        assert!(server_name("bad name!").is_err());
    }

    #[tokio::test]
    async fn with_timeout_elapses() {
        let never = std::future::pending::<Result<(), BoxError>>();
        let err = with_timeout(never, Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(err.is::<crate::error::TimedOut>());
    }

    #[tokio::test]
    async fn with_timeout_passes_through() {
        let ok = async { Ok::<_, BoxError>(7) };
        assert_eq!(with_timeout(ok, None).await.unwrap(), 7);
    }
}
