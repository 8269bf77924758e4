//! 24-bit terminal colours.

use std::{fmt, io};

/// Resets the foreground colour to the terminal default.
pub const RESET: &str = "\x1b[39m";

/// An RGB colour, written as an ANSI 24-bit foreground escape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Colour {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
}

impl Colour {
    /// Creates a colour from its components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Colour {
        Colour { r, g, b }
    }

    /// Parses `#rrggbb` or `#rgb`. The leading `#` is optional.
    ///
    /// Short forms expand each digit, so `#f80` is `#ff8800`.
    ///
    /// ```
    /// use gmi::gemtext::colour::Colour;
    ///
    /// assert_eq!(Colour::from_hex("#00ff7f"), Some(Colour::rgb(0, 255, 127)));
    /// assert_eq!(Colour::from_hex("f80"), Some(Colour::rgb(255, 136, 0)));
    /// assert_eq!(Colour::from_hex("#12345"), None);
    /// ```
    pub fn from_hex(s: &str) -> Option<Colour> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        match hex.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some(Colour::rgb(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Colour::rgb(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => None,
        }
    }

    /// Writes the escape sequence that switches the foreground to this colour.
    pub fn write_ansi_fg<W: io::Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{}", self.ansi_fg())
    }

    /// The foreground escape as a displayable value.
    pub fn ansi_fg(&self) -> AnsiFg {
        AnsiFg(*self)
    }
}

/// Display adapter returned by [`Colour::ansi_fg`].
#[derive(Clone, Copy, Debug)]
pub struct AnsiFg(Colour);

impl fmt::Display for AnsiFg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[38;2;{};{};{}m", self.0.r, self.0.g, self.0.b)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
