//! `key=value` configuration files for `gmifmt`.
//!
//! A configuration file holds one `key=value` pair per line, for example
//! colours for gemtext elements:
//!
//! ```text
//! header=#00ffff
//! link=#00ff00
//! ```
//!
//! Unless a file is given explicitly, [`Config::load`] looks in the
//! following places and uses the first file that exists:
//!
//! - `$XDG_CONFIG_HOME/gemini/.gmifmtconf`
//! - `$HOME/.config/gemini/.gmifmtconf`
//! - `$HOME/.gmifmtconf`

use std::{
    collections::BTreeMap,
    env, fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
};

use log::debug;

const DIR_NAME: &str = "gemini";
const FILE_NAME: &str = ".gmifmtconf";

/// Parsed configuration, ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    entries: BTreeMap<String, String>,
}

impl Config {
    /// Loads configuration from `explicit`, or from the first file found on
    /// the search path.
    ///
    /// Returns `Ok(None)` when no explicit file was given and none of the
    /// search locations exist.
    ///
    /// # Errors
    ///
    /// An explicit file that cannot be opened is an error, including when it
    /// does not exist. Search locations that do not exist are skipped, but
    /// any other I/O error is returned. A malformed line fails the load.
    pub fn load(explicit: Option<&Path>) -> Result<Option<Config>, Error> {
        if let Some(path) = explicit {
            return Config::from_file(path).map(Some);
        }

        let paths = search_paths(
            env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
        );
        Config::load_first(&paths)
    }

    /// Loads the first of `paths` that exists.
    pub fn load_first<I>(paths: I) -> Result<Option<Config>, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            match Config::from_file(path) {
                Ok(config) => return Ok(Some(config)),
                Err(Error::Io { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                    debug!("no configuration at {}", path.display());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Reads and parses the file at `path`.
    pub fn from_file(path: &Path) -> Result<Config, Error> {
        let io_err = |source| Error::Io {
            path: path.to_owned(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        debug!("loading configuration from {}", path.display());
        Config::parse(BufReader::new(file)).map_err(|e| match e {
            Error::Io { source, .. } => io_err(source),
            e => e,
        })
    }

    /// Parses `key=value` lines. Blank lines are skipped and surrounding
    /// whitespace is trimmed. A later duplicate key replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Any other line that does not split on `=` into exactly two parts
    /// fails with [`Error::Parse`], carrying its 1-based line number.
    pub fn parse<R: BufRead>(reader: R) -> Result<Config, Error> {
        let mut entries = BTreeMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| Error::Io {
                path: PathBuf::new(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let mut parts = line.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => {
                    entries.insert(key.trim().to_owned(), value.trim().to_owned());
                }
                _ => {
                    return Err(Error::Parse {
                        line: i + 1,
                        text: line,
                    })
                }
            }
        }

        Ok(Config { entries })
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<String>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.insert(key.into(), value.into())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Config::parse(s.as_bytes())
    }
}

/// The configuration search locations, most specific first.
pub fn search_paths(xdg_config_home: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);
    if let Some(xdg) = xdg_config_home.filter(|p| !p.as_os_str().is_empty()) {
        paths.push(xdg.join(DIR_NAME).join(FILE_NAME));
    }
    if let Some(home) = home.filter(|p| !p.as_os_str().is_empty()) {
        paths.push(home.join(".config").join(DIR_NAME).join(FILE_NAME));
        paths.push(home.join(FILE_NAME));
    }
    paths
}

/// Errors loading a configuration file.
#[derive(Debug)]
pub enum Error {
    /// A file could not be read.
    Io {
        /// The file being read. Empty when parsing from a reader.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// A line is not a `key=value` pair.
    Parse {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, source } if path.as_os_str().is_empty() => {
                write!(f, "error reading configuration: {}", source)
            }
            Error::Io { path, source } => {
                write!(f, "error reading {}: {}", path.display(), source)
            }
            Error::Parse { line, text } => {
                write!(f, "invalid configuration item at line {} ('{}')", line, text)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Parse { .. } => None,
        }
    }
}
