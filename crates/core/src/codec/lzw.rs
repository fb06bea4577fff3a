//! LZW decoder for `LZWDecode` streams.

use crate::error::{PdfError, Result};
use weezl::{BitOrder, LzwError, decode::Decoder};

/// Decode LZW data the way PDF writers produce it: MSB-first codes, 8-bit
/// alphabet and early code-width change.
///
/// Truncated input (no EOD code) yields what was decoded so far.
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
    let mut out = Vec::with_capacity(data.len() * 2);
    let result = decoder.into_vec(&mut out).decode(data);
    match result.status {
        Ok(_) => Ok(out),
        Err(LzwError::InvalidCode) if !out.is_empty() => Ok(out),
        Err(err) => Err(PdfError::DecodeError(format!("LZW: {err}"))),
    }
}
