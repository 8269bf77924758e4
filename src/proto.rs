//! Wire framing for a single Gemini exchange.
//!
//! A request is the absolute URL followed by CRLF. A response starts with one
//! header line, `<status><SP><meta>\r\n`, followed on success by a body that
//! runs until the server closes the connection.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::status::{InvalidStatusCode, StatusCode};

/// The port servers listen on when a URL does not name one.
pub const DEFAULT_PORT: u16 = 1965;

/// The only URL scheme a Gemini client will fetch.
pub const SCHEME: &str = "gemini";

/// The MIME type a success response must carry.
pub const MIME_TYPE: &str = "text/gemini";

/// The longest URL a request line may carry, in bytes.
pub const URL_MAX_LEN: usize = 1024;

/// The longest header line accepted: status, space, meta and CRLF.
pub const MAX_HEADER_LEN: usize = 2 + 1 + URL_MAX_LEN + 2;

/// Frames a request line for `url`.
pub(crate) fn request_line(url: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(url.len() + 2);
    line.extend_from_slice(url.as_bytes());
    line.extend_from_slice(b"\r\n");
    line
}

/// Splits a response header into its status code and meta.
///
/// Carriage returns, newlines and spaces are trimmed from both ends first.
/// The line is then split at the first space; the status token must be an
/// integer, and whatever follows the space is the meta. A header with nothing
/// after the status yields `None`.
///
/// ```
/// use gmi::{proto::parse_header, StatusCode};
///
/// let (status, meta) = parse_header("20 text/gemini; lang=en\r\n").unwrap();
/// assert_eq!(status, StatusCode::SUCCESS);
/// assert_eq!(meta.as_deref(), Some("text/gemini; lang=en"));
/// ```
pub fn parse_header(header: &str) -> Result<(StatusCode, Option<String>), InvalidStatusCode> {
    let header = header.trim_matches(|c| c == '\r' || c == '\n' || c == ' ');

    let (token, meta) = match header.split_once(' ') {
        Some((token, meta)) => (token, Some(meta)),
        None => (header, None),
    };

    let status = token.parse::<StatusCode>()?;
    let meta = meta
        .map(|m| m.strip_suffix('\n').unwrap_or(m))
        .filter(|m| !m.is_empty())
        .map(str::to_owned);

    Ok((status, meta))
}

/// Returns true when a success meta names a type this client renders.
pub fn is_gemtext(meta: Option<&str>) -> bool {
    meta.map_or(false, |m| m.starts_with(MIME_TYPE))
}

/// Reads one header line, up to and including its `\n`.
///
/// Fails with `UnexpectedEof` if the stream ends before a newline and with
/// `InvalidData` if no newline appears within `limit` bytes.
pub(crate) async fn read_header_line<R>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(64);
    let n = reader
        .take(limit as u64)
        .read_until(b'\n', &mut line)
        .await?;

    if line.last() == Some(&b'\n') {
        return Ok(line);
    }

    if n >= limit {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("response header exceeds {limit} bytes"),
        ))
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before end of response header",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let (status, meta) = parse_header("20 text/gemini").unwrap();
        assert_eq!(status, StatusCode::SUCCESS);
        assert_eq!(meta.as_deref(), Some("text/gemini"));
    }

    #[test]
    fn parse_trims_line_endings_and_spaces() {
        let (status, meta) = parse_header(" 31 gemini://example.org/new \r\n").unwrap();
        assert_eq!(status, StatusCode::REDIRECT_PERMANENT);
        assert_eq!(meta.as_deref(), Some("gemini://example.org/new"));
    }

    #[test]
    fn parse_without_meta() {
        let (status, meta) = parse_header("60\r\n").unwrap();
        assert_eq!(status, StatusCode::CLIENT_CERTIFICATE_REQUIRED);
        assert_eq!(meta, None);

        let (_, meta) = parse_header("20 \r\n").unwrap();
        assert_eq!(meta, None);
    }

    #[test]
    fn parse_keeps_inner_spaces() {
        let (status, meta) = parse_header("51 not  found here\n").unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(meta.as_deref(), Some("not  found here"));
    }

    #[test]
    fn parse_unknown_code_is_not_an_error() {
        let (status, _) = parse_header("99 hmm").unwrap();
        assert_eq!(status.as_u16(), 99);
    }

    #[test]
    fn parse_bad_token() {
        let err = parse_header("invalid header").unwrap_err();
        assert_eq!(err.token(), "invalid");
        assert!(err
            .to_string()
            .contains("could not extract response status code"));

        assert!(parse_header("").is_err());
    }

    #[test]
    fn gemtext_mime() {
        assert!(is_gemtext(Some("text/gemini")));
        assert!(is_gemtext(Some("text/gemini; charset=utf-8")));
        assert!(!is_gemtext(Some("text/invalid")));
        assert!(!is_gemtext(Some("text/plain")));
        assert!(!is_gemtext(None));
    }

    #[test]
    fn request_line_framing() {
        assert_eq!(
            request_line("gemini://example.org/"),
            b"gemini://example.org/\r\n".to_vec()
        );
    }

    #[test]
    fn header_limit_fits_longest_meta() {
        assert_eq!(MAX_HEADER_LEN, 1029);
    }

    #[tokio::test]
    async fn read_header_leaves_body_buffered() {
        let mut reader = tokio::io::BufReader::new(&b"20 text/gemini\r\n# Title\n"[..]);
        let line = read_header_line(&mut reader, MAX_HEADER_LEN).await.unwrap();
        assert_eq!(line, b"20 text/gemini\r\n");

        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"# Title\n");
    }

    #[tokio::test]
    async fn read_header_eof() {
        let mut reader = tokio::io::BufReader::new(&b"20 text/gem"[..]);
        let err = read_header_line(&mut reader, MAX_HEADER_LEN)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn read_header_too_long() {
        let long = vec![b'a'; MAX_HEADER_LEN + 10];
        let mut reader = tokio::io::BufReader::new(&long[..]);
        let err = read_header_line(&mut reader, MAX_HEADER_LEN)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
