//! gmilinks - extracts the links from gemtext

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write},
    path::PathBuf,
    process,
};

use clap::Parser;
use env_logger::Env;

use gmi::gemtext;

/// gmilinks - extracts the links from the supplied raw gemtext
///
/// Prints one `name|url` line per link, for example:
///
///   gmiget gemini://some-url/ | gmilinks | fzf
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gemtext file to extract links from
    #[arg(short, long)]
    file: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(msg) = run(args) {
        eprintln!("gmilinks: {}", msg);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let input: Box<dyn BufRead> = match args.file {
        Some(path) => {
            let f = File::open(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
            Box::new(BufReader::new(f))
        }
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                return Err("nothing passed into stdin - exiting.".to_owned());
            }
            Box::new(stdin.lock())
        }
    };

    let links = gemtext::extract_links(input).map_err(|e| e.to_string())?;

    let mut out = BufWriter::new(io::stdout().lock());
    let res = links
        .iter()
        .try_for_each(|link| {
            writeln!(out, "{}|{}", link.name.as_deref().unwrap_or(""), link.url)
        })
        .and_then(|()| out.flush());
    match res {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e.to_string()),
        _ => Ok(()),
    }
}
