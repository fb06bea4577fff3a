//! PDF Document module - object reading, cross-references and the audit
//! session.
//!
//! This module contains:
//! - `session` - AuditSession and the audit driver (AuditReport)
//! - `reader` - object, dictionary, stream and object stream reading
//! - `filters` - stream filter chain decoding
//! - `xref` - classic xref tables, xref streams and the Prev chain
//! - `scanner` - whole-file structure scan
//! - `cache` - object cache and reference resolution

pub mod cache;
pub mod filters;
pub mod reader;
pub mod scanner;
pub mod session;
pub mod xref;

// Re-export main types for convenience
pub use cache::{ObjectCache, ObjectSource};
pub use filters::{DecodedStream, StreamFilter, decode_stream};
pub use scanner::{ScannedObject, StructureScan};
pub use session::{AuditReport, AuditSession, SessionStats, XrefSource, audit, header_version};
pub use xref::{XrefEntry, XrefTable, find_startxref};
