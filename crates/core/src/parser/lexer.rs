//! PDF tokenizer.
//!
//! Tokens are maximal runs of non-whitespace, non-delimiter bytes. A
//! delimiter met as the first byte of a token is returned on its own; met
//! later, it ends the token and is re-read on the next call. Numbers, names
//! and keywords are only told apart after tokenization.

use super::cursor::ByteCursor;
use tracing::trace;

/// Structural keywords and single-byte delimiters the reader dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    AngleOpen,  // <
    AngleClose, // >
    ParenOpen,  // (
    ParenClose, // )
    ArrayStart, // [
    ArrayEnd,   // ]
    BraceOpen,  // {
    BraceClose, // }
    Slash,      // /

    True,
    False,
    Null,

    Obj,
    EndObj,
    R,
    Stream,
    EndStream,
    Xref,
    Trailer,
    StartXref,
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        let kw = match b {
            b"<" => Self::AngleOpen,
            b">" => Self::AngleClose,
            b"(" => Self::ParenOpen,
            b")" => Self::ParenClose,
            b"[" => Self::ArrayStart,
            b"]" => Self::ArrayEnd,
            b"{" => Self::BraceOpen,
            b"}" => Self::BraceClose,
            b"/" => Self::Slash,
            b"true" => Self::True,
            b"false" => Self::False,
            b"null" => Self::Null,
            b"obj" => Self::Obj,
            b"endobj" => Self::EndObj,
            b"R" => Self::R,
            b"stream" => Self::Stream,
            b"endstream" => Self::EndStream,
            b"xref" => Self::Xref,
            b"trailer" => Self::Trailer,
            b"startxref" => Self::StartXref,
            _ => return None,
        };
        Some(kw)
    }

    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::AngleOpen => b"<",
            Self::AngleClose => b">",
            Self::ParenOpen => b"(",
            Self::ParenClose => b")",
            Self::ArrayStart => b"[",
            Self::ArrayEnd => b"]",
            Self::BraceOpen => b"{",
            Self::BraceClose => b"}",
            Self::Slash => b"/",
            Self::True => b"true",
            Self::False => b"false",
            Self::Null => b"null",
            Self::Obj => b"obj",
            Self::EndObj => b"endobj",
            Self::R => b"R",
            Self::Stream => b"stream",
            Self::EndStream => b"endstream",
            Self::Xref => b"xref",
            Self::Trailer => b"trailer",
            Self::StartXref => b"startxref",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&name_from_bytes(self.as_bytes()))
    }
}

/// A numeric token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Real(f64),
}

/// A raw token borrowed from the input. Empty at end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Offset of the first byte of the token.
    pub pos: usize,
    pub bytes: &'a [u8],
}

impl<'a> Token<'a> {
    pub const fn eof(pos: usize) -> Self {
        Self { pos, bytes: b"" }
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset just past the last byte of the token.
    pub const fn end(&self) -> usize {
        self.pos + self.bytes.len()
    }

    pub fn keyword(&self) -> Option<Keyword> {
        Keyword::from_bytes(self.bytes)
    }

    pub fn is(&self, kw: Keyword) -> bool {
        self.bytes == kw.as_bytes()
    }

    pub fn number(&self) -> Option<Number> {
        parse_number(self.bytes)
    }

    pub fn is_number(&self) -> bool {
        self.number().is_some()
    }

    /// Non-negative integer value, as used for object numbers, generations
    /// and offsets.
    pub fn as_uint(&self) -> Option<u64> {
        if self.bytes.is_empty() || !self.bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(self.bytes).ok()?.parse().ok()
    }

    pub fn text(&self) -> String {
        name_from_bytes(self.bytes)
    }
}

/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE.
pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

/// PDF delimiters that split tokens.
pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/'
    )
}

const fn ends_token(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b) || b == b'%'
}

/// Skip whitespace and `%` comments.
pub fn skip_whitespace(cursor: &mut ByteCursor<'_>) {
    while let Some(b) = cursor.peek_byte() {
        if is_whitespace(b) {
            cursor.read_byte();
        } else if b == b'%' {
            skip_comment(cursor);
        } else {
            break;
        }
    }
}

/// Consume a comment through its end-of-line byte.
fn skip_comment(cursor: &mut ByteCursor<'_>) {
    let start = cursor.tell();
    while let Some(b) = cursor.read_byte() {
        if b == b'\r' || b == b'\n' {
            break;
        }
    }
    trace!(
        "[COMMENT] {}",
        name_from_bytes(&cursor.data()[start..cursor.tell()]).trim_end()
    );
}

/// Read the next token. Returns an empty token at end of file.
pub fn next_token<'a>(cursor: &mut ByteCursor<'a>) -> Token<'a> {
    skip_whitespace(cursor);
    let start = cursor.tell();
    let Some(first) = cursor.read_byte() else {
        return Token::eof(start);
    };
    if !is_delimiter(first) {
        while let Some(b) = cursor.peek_byte() {
            if ends_token(b) {
                break;
            }
            cursor.read_byte();
        }
    }
    let token = Token {
        pos: start,
        bytes: &cursor.data()[start..cursor.tell()],
    };
    trace!("{{POS: {}, token: {:?}}}", token.pos, token.text());
    token
}

/// Peek at the next two tokens without consuming them.
pub fn peek_two<'a>(cursor: &mut ByteCursor<'a>) -> (Token<'a>, Token<'a>) {
    cursor.lookahead(|c| {
        let first = next_token(c);
        let second = next_token(c);
        (first, second)
    })
}

/// Peek at the next token without consuming it.
pub fn peek_token<'a>(cursor: &mut ByteCursor<'a>) -> Token<'a> {
    cursor.lookahead(next_token)
}

/// Parse a PDF number: optional sign, digits, at most one decimal point.
pub fn parse_number(bytes: &[u8]) -> Option<Number> {
    let digits = match bytes.first()? {
        b'+' | b'-' => &bytes[1..],
        _ => bytes,
    };
    let mut seen_digit = false;
    let mut seen_dot = false;
    for &b in digits {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
    }
    if !seen_digit {
        return None;
    }
    let s = std::str::from_utf8(bytes).ok()?;
    if seen_dot {
        s.parse().ok().map(Number::Real)
    } else {
        // Overlong integers degrade to reals rather than failing the token.
        s.parse()
            .map(Number::Int)
            .or_else(|_| s.parse().map(Number::Real))
            .ok()
    }
}

/// Decode `#XX` escapes in a name body. An invalid escape drops the `#`.
pub fn decode_name(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b == b'#' {
            if let (Some(h), Some(l)) = (
                raw.get(i + 1).copied().and_then(hex_nibble),
                raw.get(i + 2).copied().and_then(hex_nibble),
            ) {
                out.push((h << 4) | l);
                i += 3;
                continue;
            }
            i += 1;
            continue;
        }
        out.push(b);
        i += 1;
    }
    name_from_bytes(&out)
}

/// Read a name body. The cursor must sit just past the `/`.
pub fn read_name(cursor: &mut ByteCursor<'_>) -> String {
    let start = cursor.tell();
    while let Some(b) = cursor.peek_byte() {
        if ends_token(b) {
            break;
        }
        cursor.read_byte();
    }
    decode_name(&cursor.data()[start..cursor.tell()])
}

/// Capture the raw body of a literal string. The cursor must sit just past
/// the opening `(`; on return it sits past the balancing `)`.
///
/// Returns `None` when the input ends before the string is closed; the
/// bytes captured so far are still handed back through `partial`.
pub fn capture_literal(cursor: &mut ByteCursor<'_>, partial: &mut Vec<u8>) -> Option<()> {
    let mut depth = 1usize;
    let mut escaped = false;
    loop {
        let b = cursor.read_byte()?;
        if escaped {
            partial.push(b);
            escaped = false;
            continue;
        }
        match b {
            b'\\' => {
                partial.push(b);
                escaped = true;
            }
            b'(' => {
                depth += 1;
                partial.push(b);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(());
                }
                partial.push(b);
            }
            _ => partial.push(b),
        }
    }
}

/// Translate backslash escapes in a captured literal string body.
pub fn unescape_literal(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&c) = raw.get(i) else {
            break;
        };
        i += 1;
        match c {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'\\' => out.push(b'\\'),
            b'(' => out.push(b'('),
            b')' => out.push(b')'),
            b'\r' => {
                // Line continuation, CRLF counts as one line end
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(c - b'0');
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            // Unknown escape: the backslash is dropped, the byte kept
            other => out.push(other),
        }
    }
    out
}

/// Read a hex string body. The cursor must sit just past the opening `<`;
/// on return it sits past the closing `>` (or at EOF).
pub fn read_hex_string(cursor: &mut ByteCursor<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pending: Option<u8> = None;
    while let Some(b) = cursor.read_byte() {
        if b == b'>' {
            break;
        }
        let Some(nibble) = hex_nibble(b) else {
            continue;
        };
        match pending.take() {
            Some(high) => out.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }
    if let Some(high) = pending {
        out.push(high << 4);
    }
    out
}

pub const fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Bytes to a Latin-1 string, one char per byte.
pub(crate) fn name_from_bytes(bytes: &[u8]) -> String {
    let mut name = String::with_capacity(bytes.len());
    for &b in bytes {
        name.push(char::from(b));
    }
    name
}
