use std::{
    io::BufReader as StdBufReader, net, sync::mpsc as std_mpsc, sync::Arc, thread,
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    runtime,
    sync::oneshot,
};
use tokio_rustls::{rustls, TlsAcceptor};

const CERT: &[u8] = include_bytes!("certs/server.crt");
const KEY: &[u8] = include_bytes!("certs/server.key");

/// A Gemini server on localhost, presenting the self-signed test certificate.
pub struct Server {
    addr: net::SocketAddr,
    panic_rx: std_mpsc::Receiver<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Server {
    pub fn addr(&self) -> net::SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("gemini://localhost:{}{}", self.addr.port(), path)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if !::std::thread::panicking() {
            self.panic_rx
                .recv_timeout(Duration::from_secs(3))
                .expect("test server should not panic");
        }
    }
}

/// Serves every request with the bytes `func` returns for its request line
/// (without `\r\n`), then closes with a TLS close_notify.
pub fn gemini<F>(func: F) -> Server
where
    F: Fn(&str) -> Vec<u8> + Clone + Send + 'static,
{
    gemini_with(func, true)
}

/// Like [`gemini`], but drops the connection without a close_notify.
pub fn gemini_abrupt<F>(func: F) -> Server
where
    F: Fn(&str) -> Vec<u8> + Clone + Send + 'static,
{
    gemini_with(func, false)
}

pub fn certificate() -> gmi::Certificate {
    gmi::Certificate::from_pem(CERT).expect("test certificate")
}

fn acceptor() -> TlsAcceptor {
    let certs = rustls_pemfile::certs(&mut StdBufReader::new(CERT))
        .expect("certs")
        .into_iter()
        .map(rustls::Certificate)
        .collect();
    let key = rustls_pemfile::pkcs8_private_keys(&mut StdBufReader::new(KEY))
        .expect("key")
        .pop()
        .map(rustls::PrivateKey)
        .expect("one key");

    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .expect("server config");
    TlsAcceptor::from(Arc::new(config))
}

fn gemini_with<F>(func: F, close_notify: bool) -> Server
where
    F: Fn(&str) -> Vec<u8> + Clone + Send + 'static,
{
    // Spawn new runtime in thread to prevent reactor execution context conflict
    let test_name = thread::current().name().unwrap_or("<unknown>").to_string();
    thread::spawn(move || {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("new rt");
        let listener = rt.block_on(async move {
            tokio::net::TcpListener::bind(&std::net::SocketAddr::from(([127, 0, 0, 1], 0)))
                .await
                .unwrap()
        });
        let addr = listener.local_addr().unwrap();
        let acceptor = acceptor();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (panic_tx, panic_rx) = std_mpsc::channel();
        let tname = format!("test({})-support-server", test_name);
        thread::Builder::new()
            .name(tname)
            .spawn(move || {
                rt.block_on(async move {
                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => {
                                break;
                            }
                            accepted = listener.accept() => {
                                let (io, _) = accepted.expect("accepted");
                                let func = func.clone();
                                let acceptor = acceptor.clone();
                                tokio::spawn(async move {
                                    // handshakes fail when the client rejects the certificate
                                    let Ok(tls) = acceptor.accept(io).await else {
                                        return;
                                    };
                                    let mut tls = BufReader::new(tls);
                                    let mut line = String::new();
                                    if tls.read_line(&mut line).await.is_err() {
                                        return;
                                    }
                                    let rsp = func(line.trim_end_matches(['\r', '\n']));
                                    let _ = tls.write_all(&rsp).await;
                                    let _ = tls.flush().await;
                                    if close_notify {
                                        let _ = tls.shutdown().await;
                                    }
                                });
                            }
                        }
                    }
                    let _ = panic_tx.send(());
                });
            })
            .expect("thread spawn");
        Server {
            addr,
            panic_rx,
            shutdown_tx: Some(shutdown_tx),
        }
    })
    .join()
    .unwrap()
}
