//! gmiget - gets Gemini pages

use std::{
    io::{self, IsTerminal, Read, Write},
    process,
    time::Duration,
};

use clap::Parser;
use env_logger::Env;
use log::debug;

use gmi::{blocking::Client, redirect};

/// gmiget - gets Gemini pages
///
/// Without a URL argument, the URL is read from piped stdin.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gemini URL to fetch
    url: Option<String>,

    /// Output the response status only
    #[arg(short = 'I')]
    status_only: bool,

    /// Seconds to wait for a connection
    #[arg(long, value_name = "SECS", default_value_t = 9)]
    connect_timeout: u64,

    /// Maximum number of redirects to follow
    #[arg(long, default_value_t = 5)]
    max_redirects: usize,

    /// Verify the server certificate against trusted roots
    #[arg(long)]
    verify: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let url = match target_url(&args) {
        Ok(url) => url,
        Err(msg) => {
            eprintln!("gmiget: {}", msg);
            process::exit(1);
        }
    };
    debug!("fetching {}", url);

    let rsp = Client::builder()
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .redirect(redirect::Policy::limited(args.max_redirects))
        .danger_accept_invalid_certs(!args.verify)
        .connection_verbose(args.verbose)
        .build()
        .and_then(|client| client.get(url.as_str()));

    let rsp = match rsp {
        Ok(rsp) => rsp,
        Err(e) => {
            eprintln!("gmiget: could not open URL: {}", e);
            process::exit(1);
        }
    };

    let mut out = io::stdout().lock();
    let written = if args.status_only {
        writeln!(out, "{}", rsp.status())
    } else {
        out.write_all(rsp.body()).and_then(|()| out.write_all(b"\n"))
    };
    if let Err(e) = written.and_then(|()| out.flush()) {
        if e.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("gmiget: {}", e);
            process::exit(1);
        }
    }
}

fn target_url(args: &Args) -> Result<String, String> {
    pick_url(args.url.as_deref(), || {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Ok(String::new());
        }
        let mut piped = String::new();
        stdin.lock().read_to_string(&mut piped)?;
        Ok(piped)
    })
}

// stdin is only consulted without an argument
fn pick_url<F>(arg: Option<&str>, read_stdin: F) -> Result<String, String>
where
    F: FnOnce() -> io::Result<String>,
{
    if let Some(url) = arg {
        return Ok(url.to_owned());
    }

    let piped = read_stdin().map_err(|e| e.to_string())?;
    let piped = piped.trim_end_matches(['\r', '\n']);
    if piped.is_empty() {
        return Err("missing Gemini URL".to_owned());
    }
    Ok(piped.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_skips_stdin() {
        let url = pick_url(Some("gemini://example.org/"), || {
            panic!("stdin read with an argument present")
        });
        assert_eq!(url.unwrap(), "gemini://example.org/");
    }

    #[test]
    fn stdin_without_argument() {
        let url = pick_url(None, || Ok("gemini://example.org/a\r\n".to_owned()));
        assert_eq!(url.unwrap(), "gemini://example.org/a");

        let err = pick_url(None, || Ok("\n".to_owned())).unwrap_err();
        assert_eq!(err, "missing Gemini URL");

        let err = pick_url(None, || Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(err.is_err());
    }
}
