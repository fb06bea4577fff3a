//! Byte-level parsing modules.
//!
//! - `cursor`: random-access byte cursor with scoped lookahead
//! - `lexer`: PDF tokenizer and string/name/number lexical helpers

pub mod cursor;
pub mod lexer;

// Re-export main types for convenience
pub use cursor::ByteCursor;
pub use lexer::{Keyword, Number, Token, next_token, peek_token, peek_two};
