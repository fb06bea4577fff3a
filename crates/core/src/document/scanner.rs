//! Whole-document structure scan.
//!
//! One linear pass over the file that finds every `n g obj ... endobj`
//! pair without trusting any declared offset. The audit falls back on it
//! when the cross-reference data is missing, wrong or hostile.

use crate::model::objects::ObjectKey;
use crate::parser::cursor::ByteCursor;
use crate::parser::lexer::{Keyword, Token, capture_literal, next_token, read_hex_string};
use indexmap::IndexMap;
use tracing::{debug, trace};

/// An indirect object found by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedObject {
    pub key: ObjectKey,
    /// Offset of the object number.
    pub offset: usize,
    /// Offset just past `endobj` (or where the object was cut off).
    pub end: usize,
    /// The object names `ObjStm`, so it probably packs other objects.
    pub objstm: bool,
}

/// Everything the scan found, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureScan {
    objects: IndexMap<ObjectKey, ScannedObject>,
    /// Offsets of `trailer` keywords.
    pub trailers: Vec<usize>,
    /// Offsets of `startxref` keywords.
    pub startxrefs: Vec<usize>,
}

impl StructureScan {
    /// Scan `data` from start to end.
    pub fn scan(data: &[u8]) -> Self {
        let mut scan = Self::default();
        let mut cursor = ByteCursor::new(data);
        let mut history: [Option<Token<'_>>; 2] = [None, None];

        loop {
            let token = next_token(&mut cursor);
            if token.is_empty() {
                break;
            }
            match token.keyword() {
                Some(Keyword::Obj) => {
                    if let Some(key) = object_header(&history) {
                        let offset = history[0].map_or(token.pos, |t| t.pos);
                        let object = scan_object_body(&mut cursor, key, offset);
                        trace!("[SCAN] {} at {:#x}", key, offset);
                        scan.insert(object);
                    }
                    history = [None, None];
                    continue;
                }
                Some(Keyword::Trailer) => scan.trailers.push(token.pos),
                Some(Keyword::StartXref) => scan.startxrefs.push(token.pos),
                Some(Keyword::Stream) => skip_stream_body(&mut cursor, token),
                Some(Keyword::ParenOpen) | Some(Keyword::AngleOpen) => {
                    skip_string(&mut cursor, token);
                }
                _ => {}
            }
            history = [history[1], Some(token)];
        }

        debug!(
            "structure scan: {} objects, {} trailers, {} startxref markers",
            scan.objects.len(),
            scan.trailers.len(),
            scan.startxrefs.len()
        );
        scan
    }

    /// Record an object. A later definition of the same key supersedes the
    /// earlier one and takes its place in file order.
    fn insert(&mut self, object: ScannedObject) {
        self.objects.shift_remove(&object.key);
        self.objects.insert(object.key, object);
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&ScannedObject> {
        self.objects.get(key)
    }

    pub fn offset_of(&self, key: &ObjectKey) -> Option<usize> {
        self.objects.get(key).map(|o| o.offset)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    /// Scanned objects in file order.
    pub fn objects(&self) -> impl Iterator<Item = &ScannedObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// `n g` from the two tokens preceding `obj`.
fn object_header(history: &[Option<Token<'_>>; 2]) -> Option<ObjectKey> {
    let objid = u32::try_from(history[0]?.as_uint()?).ok()?;
    let genno = u32::try_from(history[1]?.as_uint()?).ok()?;
    Some(ObjectKey::new(objid, genno))
}

/// Walk forward to the `endobj` closing the object that starts at `offset`.
fn scan_object_body(cursor: &mut ByteCursor<'_>, key: ObjectKey, offset: usize) -> ScannedObject {
    let mut objstm = false;
    let mut after_slash = false;
    let mut history: [Option<Token<'_>>; 2] = [None, None];

    loop {
        let token = next_token(cursor);
        if token.is_empty() {
            return ScannedObject {
                key,
                offset,
                end: cursor.tell(),
                objstm,
            };
        }
        match token.keyword() {
            Some(Keyword::EndObj) => {
                return ScannedObject {
                    key,
                    offset,
                    end: token.end(),
                    objstm,
                };
            }
            Some(Keyword::Obj) if object_header(&history).is_some() => {
                // Missing endobj: the next object starts here
                let next = history[0].map_or(token.pos, |t| t.pos);
                cursor.seek(next);
                return ScannedObject {
                    key,
                    offset,
                    end: next,
                    objstm,
                };
            }
            Some(Keyword::Stream) => skip_stream_body(cursor, token),
            Some(Keyword::ParenOpen) | Some(Keyword::AngleOpen) => skip_string(cursor, token),
            _ => {
                if after_slash && token.bytes == b"ObjStm" {
                    objstm = true;
                }
            }
        }
        after_slash = token.is(Keyword::Slash);
        history = [history[1], Some(token)];
    }
}

/// Jump past `endstream`, or to the end of the file when it is missing.
fn skip_stream_body(cursor: &mut ByteCursor<'_>, token: Token<'_>) {
    match cursor.find_from(token.end(), Keyword::EndStream.as_bytes()) {
        Some(pos) => cursor.seek(pos + Keyword::EndStream.as_bytes().len()),
        None => cursor.seek(cursor.len()),
    }
}

/// Skip a literal or hex string so its contents are never read as tokens.
fn skip_string(cursor: &mut ByteCursor<'_>, token: Token<'_>) {
    if token.is(Keyword::ParenOpen) {
        let mut ignored = Vec::new();
        let _ = capture_literal(cursor, &mut ignored);
    } else if cursor.peek_byte() == Some(b'<') {
        // Dictionary start, nothing to skip
        cursor.read_byte();
    } else {
        read_hex_string(cursor);
    }
}
