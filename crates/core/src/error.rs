//! Error types for the pdfaudit parsing engine.

use crate::model::objects::ObjectKey;
use thiserror::Error;

/// Primary error type for PDF auditing.
///
/// Every variant returned from the engine aborts the audit run. Recoverable
/// conditions (bad filters, corrupt streams, unusable declared xref chains)
/// are logged where they happen and never surface here.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("unexpected token at position {pos}: {token:?}")]
    UnexpectedToken { pos: usize, token: String },

    #[error("unexpected end of input at position {0}")]
    UnexpectedEof(usize),

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("object not found in cross-reference table: {0}")]
    ObjectNotFound(ObjectKey),

    #[error("circular reference detected for object {0}")]
    CircularReference(ObjectKey),

    #[error("xref chain cycle detected at offset {0}")]
    XrefChainCycle(usize),

    #[error("xref stream predictor not implemented: selector {0}")]
    PredictorNotImplemented(u8),

    #[error("nesting deeper than {limit} levels at position {pos}")]
    NestingTooDeep { pos: usize, limit: usize },

    #[error("no valid xref table found")]
    NoValidXRef,

    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    #[error("decode error: {0}")]
    DecodeError(String),
}

impl PdfError {
    /// Whether a failure while loading the declared xref chain must abort the
    /// run instead of falling back to the structure scan.
    pub const fn is_structural_fatal(&self) -> bool {
        matches!(
            self,
            Self::XrefChainCycle(_)
                | Self::PredictorNotImplemented(_)
                | Self::CircularReference(_)
                | Self::NestingTooDeep { .. }
        )
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
