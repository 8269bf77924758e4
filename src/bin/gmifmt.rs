//! gmifmt - formats and colours gemtext

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write},
    path::PathBuf,
    process,
};

use clap::Parser;
use env_logger::Env;

use gmi::{
    config::Config,
    gemtext::{Formatter, Theme},
    terminal,
};

/// gmifmt - formats and colours gemtext
///
/// Reads gemtext from a file, or from stdin when something is piped in:
///
///   gmiget gemini://some-url/ | gmifmt
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Width of margin to apply to formatted gemtext
    #[arg(short, long, default_value_t = 0)]
    margin: usize,

    /// Gemtext file to format
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to gmifmt configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(msg) = run(args) {
        eprintln!("gmifmt: {}", msg);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let input = open_input(args.file.as_ref())?;

    let theme = match Config::load(args.config.as_deref()).map_err(|e| e.to_string())? {
        Some(config) => Theme::from_config(&config),
        None => Theme::default(),
    };

    let formatter = Formatter::new(terminal::width_or_default(), args.margin, theme);
    let mut out = BufWriter::new(io::stdout().lock());
    let res = writeln!(out).and_then(|()| formatter.format(input, &mut out));
    match res {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e.to_string()),
        _ => Ok(()),
    }
}

fn open_input(file: Option<&PathBuf>) -> Result<Box<dyn BufRead>, String> {
    if let Some(path) = file {
        let f = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        return Ok(Box::new(BufReader::new(f)));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err("nothing passed into stdin - exiting.".to_owned());
    }
    Ok(Box::new(stdin.lock()))
}
