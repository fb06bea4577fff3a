//! Stream decoder: applies a declared filter chain to raw stream bytes.
//!
//! Decoding is best effort. A stage that fails or is not supported stops
//! the chain and the bytes produced so far are kept.

use crate::codec::{ascii85decode, asciihexdecode, lzwdecode, rldecode};
use crate::model::objects::PdfValue;
use std::io::Read;
use tracing::{debug, trace, warn};

/// Result of running a filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStream {
    pub data: Vec<u8>,
    /// Every declared filter was applied successfully.
    pub complete: bool,
}

/// Filters the decoder knows by name (full and abbreviated forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFilter {
    Flate,
    Ascii85,
    AsciiHex,
    Lzw,
    RunLength,
    CcittFax,
}

impl StreamFilter {
    pub fn from_name(name: &str) -> Option<Self> {
        let filter = match name {
            "FlateDecode" | "Fl" => Self::Flate,
            "ASCII85Decode" | "A85" => Self::Ascii85,
            "ASCIIHexDecode" | "AHx" => Self::AsciiHex,
            "LZWDecode" | "LZW" => Self::Lzw,
            "RunLengthDecode" | "RL" => Self::RunLength,
            "CCITTFaxDecode" | "CCF" => Self::CcittFax,
            _ => return None,
        };
        Some(filter)
    }

    /// Decode one stage. `None` means the stage could not be applied.
    fn apply(self, input: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Flate => {
                let mut decoder = flate2::read::ZlibDecoder::new(input);
                let mut out = Vec::with_capacity(input.len() * 4);
                match decoder.read_to_end(&mut out) {
                    Ok(_) => Some(out),
                    Err(e) => {
                        warn!("Decompression error FlateDecode: {e}");
                        None
                    }
                }
            }
            Self::Ascii85 => ascii85decode(input)
                .map_err(|e| warn!("Decompression error ASCII85Decode: {e}"))
                .ok(),
            Self::AsciiHex => asciihexdecode(input)
                .map_err(|e| warn!("Decompression error ASCIIHexDecode: {e}"))
                .ok(),
            Self::Lzw => lzwdecode(input)
                .map_err(|e| warn!("Decompression error LZWDecode: {e}"))
                .ok(),
            Self::RunLength => Some(rldecode(input)),
            Self::CcittFax => {
                warn!("Filter not implemented: CCITTFaxDecode");
                None
            }
        }
    }
}

/// Apply the filter chain declared by a stream's `Filter` value.
pub fn decode_stream(raw: &[u8], filter: Option<&PdfValue>) -> DecodedStream {
    let Some(filter) = filter else {
        return DecodedStream {
            data: raw.to_vec(),
            complete: true,
        };
    };
    let names = match filter.as_name_list() {
        Ok(names) => names,
        Err(e) => {
            warn!("unusable Filter entry {filter}: {e}");
            return DecodedStream {
                data: raw.to_vec(),
                complete: false,
            };
        }
    };

    let mut data = raw.to_vec();
    for name in names {
        debug!("[FILTER]: {name}");
        let Some(stage) = StreamFilter::from_name(name) else {
            warn!("Filter not implemented: {name}");
            return DecodedStream {
                data,
                complete: false,
            };
        };
        match stage.apply(&data) {
            Some(decoded) => data = decoded,
            None => {
                return DecodedStream {
                    data,
                    complete: false,
                };
            }
        }
    }
    trace!("{}", String::from_utf8_lossy(&data));
    DecodedStream {
        data,
        complete: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> PdfValue {
        PdfValue::Array(list.iter().map(|n| PdfValue::Name((*n).into())).collect())
    }

    #[test]
    fn no_filter_passes_bytes_through() {
        let out = decode_stream(b"plain", None);
        assert_eq!(out.data, b"plain");
        assert!(out.complete);
    }

    #[test]
    fn abbreviated_names_are_accepted() {
        let out = decode_stream(b"68656c6c6f>", Some(&PdfValue::Name("AHx".into())));
        assert_eq!(out.data, b"hello");
        assert!(out.complete);
    }

    #[test]
    fn chain_applies_in_order() {
        // ASCIIHex of the run-length encoding of "aaaa"
        let out = decode_stream(b"FD6180>", Some(&names(&["ASCIIHexDecode", "RunLengthDecode"])));
        assert_eq!(out.data, b"aaaa");
    }

    #[test]
    fn unknown_filter_stops_chain() {
        let out = decode_stream(b"6162>", Some(&names(&["ASCIIHexDecode", "JBIG2Decode", "AHx"])));
        assert_eq!(out.data, b"ab");
        assert!(!out.complete);
    }

    #[test]
    fn flate_failure_keeps_undecoded_bytes() {
        let out = decode_stream(b"not zlib", Some(&PdfValue::Name("FlateDecode".into())));
        assert_eq!(out.data, b"not zlib");
        assert!(!out.complete);
    }
}
