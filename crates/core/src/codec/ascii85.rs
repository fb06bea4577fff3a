//! ASCII85 and ASCIIHex stream decoders.

use crate::error::{PdfError, Result};
use crate::parser::lexer::hex_nibble;

/// Decode ASCII85-encoded data (PDF variant).
///
/// Accepts an optional `<~` prefix, stops at `~>` (or at the end of data
/// when the marker is missing), skips whitespace and expands `z`.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut digits = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\x00' => {}
            b'z' if digits.len() % 5 == 0 => digits.extend_from_slice(b"!!!!!"),
            b'!'..=b'u' => digits.push(byte),
            other => {
                return Err(PdfError::DecodeError(format!(
                    "invalid ASCII85 byte 0x{other:02x}"
                )));
            }
        }
    }

    let mut result = Vec::with_capacity(digits.len() / 5 * 4 + 4);
    for chunk in digits.chunks(5) {
        if chunk.len() == 1 {
            // A lone trailing digit carries no full byte
            break;
        }
        let mut padded = [b'u'; 5];
        padded[..chunk.len()].copy_from_slice(chunk);
        let mut value: u32 = 0;
        for &byte in &padded {
            value = value.wrapping_mul(85).wrapping_add(u32::from(byte - b'!'));
        }
        let bytes = value.to_be_bytes();
        result.extend_from_slice(&bytes[..chunk.len() - 1]);
    }

    Ok(result)
}

/// Decode ASCIIHex-encoded data. Stops at `>`; an odd trailing digit is
/// padded with a zero nibble.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        if let Some(nibble) = hex_nibble(byte) {
            match pending.take() {
                Some(high) => result.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        } else if !crate::parser::lexer::is_whitespace(byte) {
            return Err(PdfError::DecodeError(format!(
                "invalid ASCIIHex byte 0x{byte:02x}"
            )));
        }
    }
    if let Some(high) = pending {
        result.push(high << 4);
    }
    Ok(result)
}
