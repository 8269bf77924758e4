//! Gemtext formatting and link extraction.
//!
//! A gemtext document is read one line at a time. Every line is classified
//! by its prefix into a [`LineKind`], then turned into a [`Block`]: the line
//! with its prefix stripped and word-wrapped to the available width. Blocks
//! render with a left margin, an optional 24-bit colour and their prefix.
//!
//! ```
//! use gmi::gemtext::{Formatter, Theme};
//!
//! let doc = "# Hello\n=> gemini://example.org/ Example\n";
//! let mut out = Vec::new();
//! Formatter::new(40, 2, Theme::default())
//!     .format(doc.as_bytes(), &mut out)
//!     .unwrap();
//!
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "  # Hello\n  Example [gemini://example.org/]\n",
//! );
//! ```

use std::io::{self, BufRead, Write};

use log::warn;

use crate::config::Config;

pub mod colour;

pub use self::colour::Colour;

use self::colour::RESET;

const WHITESPACE: &[char] = &[' ', '\t'];

/// The kind of a gemtext line, decided by its prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Plain text.
    Text,
    /// `=>` link line.
    Link,
    /// ```` ``` ```` line, switching preformatted mode on or off.
    PreformatToggle,
    /// A line inside a preformatted block.
    Preformatted,
    /// `#` heading.
    Heading1,
    /// `##` heading.
    Heading2,
    /// `###` heading.
    Heading3,
    /// `*` list item.
    ListItem,
    /// `>` quote.
    Quote,
}

impl LineKind {
    /// Classifies `line`. Inside a preformatted block only a toggle line is
    /// recognised; everything else is [`LineKind::Preformatted`].
    pub fn classify(line: &str, preformatted: bool) -> LineKind {
        if line.starts_with(LineKind::PreformatToggle.prefix()) {
            return LineKind::PreformatToggle;
        }
        if preformatted {
            return LineKind::Preformatted;
        }

        // headings longest first, `#` would match all three
        [
            LineKind::Quote,
            LineKind::Heading3,
            LineKind::Heading2,
            LineKind::Heading1,
            LineKind::ListItem,
            LineKind::Link,
        ]
        .into_iter()
        .find(|kind| line.starts_with(kind.prefix()))
        .unwrap_or(LineKind::Text)
    }

    /// The prefix marking this kind of line.
    pub fn prefix(self) -> &'static str {
        match self {
            LineKind::Text | LineKind::Preformatted => "",
            LineKind::Link => "=>",
            LineKind::PreformatToggle => "```",
            LineKind::Heading1 => "#",
            LineKind::Heading2 => "##",
            LineKind::Heading3 => "###",
            LineKind::ListItem => "*",
            LineKind::Quote => ">",
        }
    }
}

/// Output colours per line kind. Kinds without a colour use the terminal
/// default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Theme {
    /// Lines inside preformatted blocks.
    pub preformatted: Option<Colour>,
    /// `#` headings.
    pub header: Option<Colour>,
    /// `##` headings.
    pub header2: Option<Colour>,
    /// `###` headings.
    pub header3: Option<Colour>,
    /// Quotes.
    pub quoted: Option<Colour>,
    /// Links.
    pub link: Option<Colour>,
}

impl Theme {
    /// Builds a theme from the `preformatted`, `header`, `header2`,
    /// `header3`, `quoted` and `link` keys of `config`.
    ///
    /// Values that are not hex colours are logged and ignored.
    pub fn from_config(config: &Config) -> Theme {
        let colour = |key: &str| {
            let value = config.get(key)?;
            let colour = Colour::from_hex(value);
            if colour.is_none() {
                warn!("ignoring invalid colour for {:?}: {:?}", key, value);
            }
            colour
        };

        Theme {
            preformatted: colour("preformatted"),
            header: colour("header"),
            header2: colour("header2"),
            header3: colour("header3"),
            quoted: colour("quoted"),
            link: colour("link"),
        }
    }

    /// The colour for lines of `kind`, if one is set.
    pub fn colour(&self, kind: LineKind) -> Option<Colour> {
        match kind {
            LineKind::Preformatted => self.preformatted,
            LineKind::Heading1 => self.header,
            LineKind::Heading2 => self.header2,
            LineKind::Heading3 => self.header3,
            LineKind::Quote => self.quoted,
            LineKind::Link => self.link,
            LineKind::Text | LineKind::ListItem | LineKind::PreformatToggle => None,
        }
    }
}

/// One classified source line, wrapped into output lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    kind: LineKind,
    lines: Vec<String>,
}

impl Block {
    /// Classifies and wraps `line` for a terminal `width` columns wide with
    /// `margin` columns on both sides.
    pub fn new(width: usize, margin: usize, preformatted: bool, line: &str) -> Block {
        let kind = LineKind::classify(line, preformatted);
        let rest = &line[kind.prefix().len()..];

        let lines = match kind {
            LineKind::PreformatToggle => Vec::new(),
            LineKind::Preformatted => vec![rest.to_owned()],
            LineKind::Link => vec![parse_link(rest).to_string()],
            _ => {
                let available = width
                    .saturating_sub(margin * 2)
                    .saturating_sub(kind.prefix().len() + 1);
                wrap(available, rest)
            }
        };

        Block { kind, lines }
    }

    /// The kind of the source line.
    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// The wrapped output lines, without margin or prefix.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Writes every line: margin, colour, prefix, text, reset, newline.
    ///
    /// Continuation lines of a list item are indented instead of repeating
    /// the bullet. Links carry no prefix.
    pub fn render<W: Write + ?Sized>(
        &self,
        margin: usize,
        colour: Option<Colour>,
        w: &mut W,
    ) -> io::Result<()> {
        let prefix = match self.kind {
            LineKind::Link => "",
            kind => kind.prefix(),
        };

        for (i, line) in self.lines.iter().enumerate() {
            write!(w, "{:margin$}", "", margin = margin)?;
            if let Some(colour) = colour {
                colour.write_ansi_fg(w)?;
            }

            if !prefix.is_empty() {
                if i > 0 && self.kind == LineKind::ListItem {
                    w.write_all(b"  ")?;
                } else {
                    write!(w, "{} ", prefix)?;
                }
            }

            w.write_all(line.as_bytes())?;

            if colour.is_some() {
                w.write_all(RESET.as_bytes())?;
            }
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Reformats gemtext for a terminal.
#[derive(Clone, Debug)]
pub struct Formatter {
    width: usize,
    margin: usize,
    theme: Theme,
}

impl Formatter {
    /// Creates a formatter for a terminal `width` columns wide.
    pub fn new(width: usize, margin: usize, theme: Theme) -> Formatter {
        Formatter {
            width,
            margin,
            theme,
        }
    }

    /// Formats every line of `reader` into `writer`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn format<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> io::Result<()> {
        let mut preformatted = false;

        for line in Lines::new(reader) {
            let line = line?;
            let block = Block::new(self.width, self.margin, preformatted, &line);
            if block.kind == LineKind::PreformatToggle {
                preformatted = !preformatted;
                continue;
            }
            block.render(self.margin, self.theme.colour(block.kind), &mut writer)?;
        }

        writer.flush()
    }
}

/// Wraps `line` on word boundaries so no output line is longer than `width`,
/// unless a single word already is.
///
/// An empty line yields one empty line. A line of only whitespace yields
/// nothing.
///
/// ```
/// assert_eq!(
///     gmi::gemtext::wrap(10, "one two three four"),
///     ["one two", "three four"],
/// );
/// assert_eq!(gmi::gemtext::wrap(10, ""), [""]);
/// assert!(gmi::gemtext::wrap(10, "   ").is_empty());
/// ```
pub fn wrap(width: usize, line: &str) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }

    let mut words = line.split_whitespace();
    let mut current = match words.next() {
        Some(word) => word.to_owned(),
        None => return Vec::new(),
    };

    let mut wrapped = Vec::new();
    let mut space_left = width.saturating_sub(text_width(&current));
    for word in words {
        let len = text_width(word);
        if len + 1 > space_left {
            wrapped.push(std::mem::replace(&mut current, word.to_owned()));
            space_left = width.saturating_sub(len);
        } else {
            current.push(' ');
            current.push_str(word);
            space_left -= len + 1;
        }
    }
    wrapped.push(current);
    wrapped
}

fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// A link from a gemtext document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    /// The link target, as written. May be relative.
    pub url: String,
    /// The link's display text, if any.
    pub name: Option<String>,
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{} [{}]", name, self.url),
            None => write!(f, "[{}]", self.url),
        }
    }
}

/// Splits the text after `=>` into its target and optional name.
///
/// ```
/// let link = gmi::gemtext::parse_link(" gemini://example.org/\tAn example");
/// assert_eq!(link.url, "gemini://example.org/");
/// assert_eq!(link.name.as_deref(), Some("An example"));
/// ```
pub fn parse_link(rest: &str) -> Link {
    let rest = rest.trim_start_matches(WHITESPACE);
    match rest.split_once(WHITESPACE) {
        Some((url, name)) => {
            let name = name.trim_matches(WHITESPACE);
            Link {
                url: url.to_owned(),
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_owned())
                },
            }
        }
        None => Link {
            url: rest.to_owned(),
            name: None,
        },
    }
}

/// Collects the links of a document in order, skipping anything inside
/// preformatted blocks. Link lines without a target are dropped.
pub fn extract_links<R: BufRead>(reader: R) -> io::Result<Vec<Link>> {
    let mut links = Vec::new();
    let mut preformatted = false;

    for line in Lines::new(reader) {
        let line = line?;
        match LineKind::classify(&line, preformatted) {
            LineKind::PreformatToggle => preformatted = !preformatted,
            LineKind::Link => {
                let link = parse_link(&line[LineKind::Link.prefix().len()..]);
                if !link.url.is_empty() {
                    links.push(link);
                }
            }
            _ => (),
        }
    }

    Ok(links)
}

/// Lines of a reader without their `\n` or `\r\n`, decoded lossily.
struct Lines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Lines {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
