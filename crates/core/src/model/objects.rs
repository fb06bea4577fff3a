//! PDF value types.

use crate::error::{PdfError, Result};
use crate::parser::lexer::Keyword;
use indexmap::IndexMap;
use std::fmt;

/// Dictionary: name → value, kept in document order.
pub type PdfDict = IndexMap<String, PdfValue>;

/// PDF value - exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object, `#XX` escapes decoded
    Name(String),
    /// Literal string, escapes decoded
    String(Vec<u8>),
    /// Hex string
    HexString(Vec<u8>),
    /// Array of values
    Array(Vec<Self>),
    /// Dictionary
    Dict(PdfDict),
    /// Indirect object reference
    Ref(ObjectKey),
    /// Stream (dictionary + decoded payload)
    Stream(Box<PdfStream>),
    /// Structural keyword returned as-is (`endobj`, `>`, `]`)
    Keyword(Keyword),
}

impl PdfValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Integer that must be non-negative (lengths, offsets, counts).
    pub const fn as_usize(&self) -> Result<usize> {
        match self {
            Self::Int(n) if *n >= 0 => Ok(*n as usize),
            _ => Err(self.type_error("non-negative int")),
        }
    }

    /// Numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    /// Bytes of a literal or hex string.
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) | Self::HexString(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    /// Dictionary, or the dictionary of a stream.
    pub fn as_dict(&self) -> Result<&PdfDict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&PdfStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_ref(&self) -> Result<ObjectKey> {
        match self {
            Self::Ref(r) => Ok(*r),
            _ => Err(self.type_error("ref")),
        }
    }

    /// A name, or every name of an array of names (as used by `Filter`).
    pub fn as_name_list(&self) -> Result<Vec<&str>> {
        match self {
            Self::Name(s) => Ok(vec![s.as_str()]),
            Self::Array(arr) => arr.iter().map(Self::as_name).collect(),
            _ => Err(self.type_error("name or array of names")),
        }
    }

    /// Type name for error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::HexString(_) => "hexstring",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Ref(_) => "ref",
            Self::Stream(_) => "stream",
            Self::Keyword(_) => "keyword",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }
}

/// Renders values in PDF syntax; this is the text that appears in finding
/// details.
impl fmt::Display for PdfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Real(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
            Self::String(s) => f.write_str(&String::from_utf8_lossy(s)),
            Self::HexString(s) => {
                f.write_str("<")?;
                for b in s {
                    write!(f, "{b:02X}")?;
                }
                f.write_str(">")
            }
            Self::Array(arr) => {
                f.write_str("[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write_nested(f, item)?;
                }
                f.write_str("]")
            }
            Self::Dict(dict) => write_dict(f, dict),
            Self::Ref(key) => write!(f, "{} {} R", key.objid, key.genno),
            Self::Stream(stream) => {
                write_dict(f, &stream.attrs)?;
                write!(f, " stream[{} bytes]", stream.data.len())
            }
            Self::Keyword(kw) => write!(f, "{kw}"),
        }
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, value: &PdfValue) -> fmt::Result {
    match value {
        PdfValue::Name(name) => write!(f, "/{name}"),
        PdfValue::String(s) => write!(f, "({})", String::from_utf8_lossy(s)),
        other => write!(f, "{other}"),
    }
}

fn write_dict(f: &mut fmt::Formatter<'_>, dict: &PdfDict) -> fmt::Result {
    f.write_str("<<")?;
    for (key, value) in dict {
        write!(f, "/{key} ")?;
        write_nested(f, value)?;
        f.write_str(" ")?;
    }
    f.write_str(">>")
}

/// Identity of an indirect object: (object number, generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub objid: u32,
    pub genno: u32,
}

impl ObjectKey {
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.objid, self.genno)
    }
}

/// PDF stream - dictionary attributes + decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    /// Stream dictionary attributes
    pub attrs: PdfDict,
    /// Payload after the filter chain (best effort)
    pub data: Vec<u8>,
    /// Length of the raw payload as found in the file
    pub raw_len: usize,
}

impl PdfStream {
    pub const fn new(attrs: PdfDict, data: Vec<u8>, raw_len: usize) -> Self {
        Self {
            attrs,
            data,
            raw_len,
        }
    }

    pub fn get(&self, name: &str) -> Option<&PdfValue> {
        self.attrs.get(name)
    }

    /// The `/Type` name of the stream, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.attrs.get("Type").and_then(|t| t.as_name().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_type_errors_name_both_sides() {
        let err = PdfValue::Array(vec![]).as_num().unwrap_err();
        assert_eq!(err.to_string(), "type error: expected number, got array");
    }

    #[test]
    fn name_list_accepts_single_name_or_array() {
        let single = PdfValue::Name("FlateDecode".into());
        assert_eq!(single.as_name_list().unwrap(), ["FlateDecode"]);
        let many = PdfValue::Array(vec![
            PdfValue::Name("ASCII85Decode".into()),
            PdfValue::Name("FlateDecode".into()),
        ]);
        assert_eq!(
            many.as_name_list().unwrap(),
            ["ASCII85Decode", "FlateDecode"]
        );
        assert!(PdfValue::Int(1).as_name_list().is_err());
    }

    #[test]
    fn display_uses_pdf_syntax() {
        let mut dict = PdfDict::new();
        dict.insert("S".into(), PdfValue::Name("URI".into()));
        dict.insert("Next".into(), PdfValue::Ref(ObjectKey::new(4, 0)));
        assert_eq!(PdfValue::Dict(dict).to_string(), "<</S /URI /Next 4 0 R >>");
        assert_eq!(PdfValue::HexString(vec![0xab, 0xc0]).to_string(), "<ABC0>");
    }
}
