#![allow(dead_code)]

pub mod server;

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use gmi::connect::{BoxConn, Connect, Connecting, Dst};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

/// What a scripted server does once it has read the request line.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Write these bytes, then close.
    Raw(Vec<u8>),
    /// Write these bytes, then keep the connection open without writing more.
    Stall(Vec<u8>),
    /// Never answer.
    Hang,
    /// Take this long to connect, then never answer.
    SlowConnect(Duration),
    /// Fail to connect.
    Refuse,
}

/// An in-memory connector answering each URL with a scripted reply.
///
/// Unscripted URLs answer `51 not scripted`.
#[derive(Clone, Default)]
pub struct Scripted {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    replies: HashMap<String, Reply>,
    dsts: Vec<Dst>,
    requests: Vec<String>,
}

impl Scripted {
    pub fn new() -> Scripted {
        Scripted::default()
    }

    pub fn reply(self, url: &str, raw: impl Into<Vec<u8>>) -> Scripted {
        self.with(url, Reply::Raw(raw.into()))
    }

    pub fn with(self, url: &str, reply: Reply) -> Scripted {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(url.to_owned(), reply);
        self
    }

    /// Every destination connected to, in order.
    pub fn dsts(&self) -> Vec<Dst> {
        self.state.lock().unwrap().dsts.clone()
    }

    /// Every request line received, including its `\r\n`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Connect for Scripted {
    fn connect(&self, dst: Dst) -> Connecting {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.dsts.push(dst.clone());
            state.replies.get(dst.url().as_str()).cloned()
        }
        .unwrap_or_else(|| Reply::Raw(b"51 not scripted\r\n".to_vec()));
        let state = self.state.clone();

        Box::pin(async move {
            match reply {
                Reply::Refuse => {
                    return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
                }
                Reply::SlowConnect(delay) => tokio::time::sleep(delay).await,
                _ => (),
            }

            let (client, server) = tokio::io::duplex(64 * 1024);
            tokio::spawn(serve(server, reply, state));
            Ok(Box::new(client) as BoxConn)
        })
    }
}

async fn serve(io: DuplexStream, reply: Reply, state: Arc<Mutex<State>>) {
    let mut io = BufReader::new(io);
    let mut line = Vec::new();
    if io.read_until(b'\n', &mut line).await.is_err() {
        return;
    }
    state
        .lock()
        .unwrap()
        .requests
        .push(String::from_utf8_lossy(&line).into_owned());

    match reply {
        Reply::Raw(bytes) => {
            let _ = io.write_all(&bytes).await;
            let _ = io.shutdown().await;
        }
        Reply::Stall(bytes) => {
            let _ = io.write_all(&bytes).await;
            let _ = io.flush().await;
            std::future::pending::<()>().await;
        }
        Reply::Hang | Reply::SlowConnect(_) => std::future::pending::<()>().await,
        Reply::Refuse => unreachable!("refused connections are never served"),
    }
}

/// A gemtext success response with `body`.
pub fn gemtext(body: &str) -> Vec<u8> {
    format!("20 text/gemini\r\n{}", body).into_bytes()
}
