use std::fmt;

// xor-shift
pub(crate) fn fast_random() -> u64 {
    use std::cell::Cell;
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::num::Wrapping;

    thread_local! {
        static RNG: Cell<Wrapping<u64>> = Cell::new(Wrapping(seed()));
    }

    fn seed() -> u64 {
        let seed = RandomState::new();

        let mut out = 0;
        let mut cnt = 0;
        while out == 0 {
            cnt += 1;
            let mut hasher = seed.build_hasher();
            hasher.write_usize(cnt);
            out = hasher.finish();
        }
        out
    }

    RNG.with(|rng| {
        let mut n = rng.get();
        debug_assert_ne!(n.0, 0);
        n ^= n >> 12;
        n ^= n << 25;
        n ^= n >> 27;
        rng.set(n);
        n.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
    })
}

/// Renders raw bytes with control and non-ASCII bytes escaped.
///
/// `Debug` wraps the output as a byte string literal (`b"..."`); `Display`
/// writes the escaped text alone.
pub(crate) struct Escape<'a>(&'a [u8]);

impl<'a> Escape<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Escape(bytes)
    }

    fn write_escaped(&self, f: &mut fmt::Formatter<'_>, quote: bool) -> fmt::Result {
        for &c in self.0 {
            // https://doc.rust-lang.org/reference.html#byte-escapes
            if c == b'\n' {
                write!(f, "\\n")?;
            } else if c == b'\r' {
                write!(f, "\\r")?;
            } else if c == b'\t' {
                write!(f, "\\t")?;
            } else if c == b'\\' || (quote && c == b'"') {
                write!(f, "\\{}", c as char)?;
            } else if c == b'\0' {
                write!(f, "\\0")?;
                // ASCII printable
            } else if (0x20..0x7f).contains(&c) {
                write!(f, "{}", c as char)?;
            } else {
                write!(f, "\\x{:02x}", c)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Escape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"")?;
        self.write_escaped(f, true)?;
        write!(f, "\"")
    }
}

impl fmt::Display for Escape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_escaped(f, false)
    }
}

/// Renders text with control characters escaped and everything else,
/// non-ASCII included, as is.
pub(crate) struct EscapeControl<'a>(&'a str);

impl<'a> EscapeControl<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        EscapeControl(text)
    }
}

impl fmt::Display for EscapeControl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if c.is_control() {
                write!(f, "{}", c.escape_default())?;
            } else {
                fmt::Write::write_char(f, c)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_debug() {
        let s = format!("{:?}", Escape::new(b"20 text/gemini\r\n\"\x01"));
        assert_eq!(s, r#"b"20 text/gemini\r\n\"\x01""#);
    }

    #[test]
    fn escape_display() {
        let s = Escape::new("café \"ok\"".as_bytes()).to_string();
        assert_eq!(s, r#"caf\xc3\xa9 "ok""#);
    }

    #[test]
    fn escape_control_keeps_text() {
        let s = EscapeControl::new("Página \u{1b}[31mroja\r\n").to_string();
        assert_eq!(s, "Página \\u{1b}[31mroja\\r\\n");
    }

    #[test]
    fn random_is_nonzero_and_varies() {
        let a = fast_random();
        let b = fast_random();
        assert_ne!(a, b);
    }
}
