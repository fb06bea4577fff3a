//! Byte-level codecs for PDF stream filters.
//!
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `lzw`: LZW decompression
//! - `runlength`: Run-length decoding
//!
//! Flate goes through `flate2` directly in the stream decoder.

pub mod ascii85;
pub mod lzw;
pub mod runlength;

// Re-export main functions for convenience
pub use ascii85::{ascii85decode, asciihexdecode};
pub use lzw::lzwdecode;
pub use runlength::rldecode;
