//! pdfaudit - audit PDF documents for active content and privacy risks.
//!
//! The document is parsed from its low-level object model: a tokenizer, a
//! recursive object reader, a cross-reference resolver with a whole-file
//! structure scan as fallback, and a stream filter pipeline. Every
//! dictionary the reader produces is checked against a risk table.

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod parser;
pub mod threat;

pub use config::AuditOptions;
pub use document::{AuditReport, AuditSession, audit};
pub use error::{PdfError, Result};
pub use model::{ObjectKey, PdfValue};
pub use threat::{Location, RiskFinding, RiskRule, RiskTable};
