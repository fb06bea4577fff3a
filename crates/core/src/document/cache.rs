//! Object cache and reference resolution.

use super::session::{AuditSession, Frame};
use super::xref::XrefEntry;
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjectKey, PdfValue};
use crate::parser::cursor::ByteCursor;
use crate::parser::lexer::{Keyword, next_token};
use crate::threat::Location;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Write-once map from key to resolved value.
#[derive(Debug, Default)]
pub struct ObjectCache {
    map: HashMap<ObjectKey, Arc<PdfValue>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<Arc<PdfValue>> {
        self.map.get(key).map(Arc::clone)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.map.contains_key(key)
    }

    /// Store `value` unless the key is already cached; either way return
    /// the value now held for the key.
    pub fn insert(&mut self, key: ObjectKey, value: PdfValue) -> Arc<PdfValue> {
        Arc::clone(self.map.entry(key).or_insert_with(|| Arc::new(value)))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Where an object can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSource {
    Offset(usize),
    Compressed { container: ObjectKey },
}

/// Read `n g obj` at the cursor. Returns the key and the offset of `n`.
pub fn read_object_header(cursor: &mut ByteCursor<'_>) -> Result<(ObjectKey, usize)> {
    let num = next_token(cursor);
    let genno = next_token(cursor);
    let kw = next_token(cursor);
    let header = num
        .as_uint()
        .zip(genno.as_uint())
        .filter(|_| kw.is(Keyword::Obj))
        .and_then(|(n, g)| Some(ObjectKey::new(u32::try_from(n).ok()?, u32::try_from(g).ok()?)));
    match header {
        Some(key) => Ok((key, num.pos)),
        None if num.is_empty() => Err(PdfError::UnexpectedEof(num.pos)),
        None => Err(PdfError::UnexpectedToken {
            pos: num.pos,
            token: format!("{} {} {}", num.text(), genno.text(), kw.text()),
        }),
    }
}

impl AuditSession<'_> {
    /// Key of the object header at `offset`, if there is one.
    fn header_at(&self, offset: usize) -> Option<ObjectKey> {
        let mut cursor = ByteCursor::new(self.data());
        cursor.seek(offset);
        read_object_header(&mut cursor).ok().map(|(key, _)| key)
    }

    /// Where `key` can be read from. A declared offset that does not hold
    /// the matching header gives way to the structure scan.
    pub fn locate(&self, key: ObjectKey) -> Option<ObjectSource> {
        match self.xref.get(&key) {
            Some(&XrefEntry::InUse(offset)) => {
                if !self.options().trust_structure_scan || self.header_at(offset) == Some(key) {
                    return Some(ObjectSource::Offset(offset));
                }
                let scanned = self.scan.offset_of(&key)?;
                debug!("declared offset {offset:#x} of {key} contradicted; using {scanned:#x}");
                Some(ObjectSource::Offset(scanned))
            }
            Some(&XrefEntry::Compressed { container, .. }) => Some(ObjectSource::Compressed {
                container: ObjectKey::new(container, 0),
            }),
            Some(XrefEntry::Free(_)) | None => self.scan.offset_of(&key).map(ObjectSource::Offset),
        }
    }

    /// Resolve `key` through the cache. A miss reads the object (or its
    /// containing object stream) exactly once.
    pub fn resolve(&mut self, key: ObjectKey) -> Result<Arc<PdfValue>> {
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }
        if self.resolving.contains(&key) {
            return Err(PdfError::CircularReference(key));
        }
        debug!("[JUMPTO:{},{}]", key.objid, key.genno);
        match self.locate(key).ok_or(PdfError::ObjectNotFound(key))? {
            ObjectSource::Offset(offset) => Ok(self.read_indirect_at(offset, Some(key))?.1),
            ObjectSource::Compressed { container } => {
                self.resolving.insert(key);
                let loaded = self.resolve(container);
                self.resolving.remove(&key);
                loaded?;
                self.cache.get(&key).ok_or(PdfError::ObjectNotFound(key))
            }
        }
    }

    /// Read the indirect object whose header sits at `offset` and cache it.
    /// With `expected`, the header must carry that key.
    pub(crate) fn read_indirect_at(
        &mut self,
        offset: usize,
        expected: Option<ObjectKey>,
    ) -> Result<(ObjectKey, Arc<PdfValue>)> {
        let mut cursor = ByteCursor::new(self.data());
        cursor.seek(offset);
        let (key, start) = read_object_header(&mut cursor)?;
        if let Some(expected) = expected
            && expected != key
        {
            return Err(PdfError::SyntaxError(format!(
                "expected object {expected} at {offset:#x}, found {key}"
            )));
        }
        if let Some(value) = self.cache.get(&key) {
            return Ok((key, value));
        }
        if !self.resolving.insert(key) {
            return Err(PdfError::CircularReference(key));
        }

        debug!("[OBJ:{},{}]", key.objid, key.genno);
        self.frames.push(Frame {
            key,
            location: Location::Offset(start),
        });
        let value = self.read_object(&mut cursor, false);
        self.frames.pop();
        self.resolving.remove(&key);

        let value = match value? {
            PdfValue::Keyword(Keyword::EndObj) => PdfValue::Null,
            other => other,
        };
        self.stats.objects_parsed += 1;
        self.stats.seeks += cursor.seek_count();
        Ok((key, self.cache.insert(key, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_write_once() {
        let mut cache = ObjectCache::new();
        let key = ObjectKey::new(1, 0);
        let first = cache.insert(key, PdfValue::Int(1));
        let second = cache.insert(key, PdfValue::Int(2));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, PdfValue::Int(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn header_parse() {
        let mut cursor = ByteCursor::new(b"  12 3 obj <<>>");
        assert_eq!(
            read_object_header(&mut cursor).unwrap(),
            (ObjectKey::new(12, 3), 2)
        );
        let mut cursor = ByteCursor::new(b"12 3 R");
        assert!(matches!(
            read_object_header(&mut cursor),
            Err(PdfError::UnexpectedToken { pos: 0, .. })
        ));
    }
}
