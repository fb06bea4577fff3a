//! PDF model types.
//!
//! - `objects` - PDF value types (PdfValue, PdfStream, ObjectKey)

pub mod objects;

// Re-export main types for convenience
pub use objects::{ObjectKey, PdfDict, PdfStream, PdfValue};
