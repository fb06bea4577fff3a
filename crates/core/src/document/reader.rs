//! Object reader: recursive descent over tokens into [`PdfValue`]s.
//!
//! Dictionaries are checked against the risk table as soon as they are
//! complete; findings go to the object on top of the frame stack.

use super::filters::decode_stream;
use super::session::{AuditSession, Frame};
use super::xref::XrefEntry;
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjectKey, PdfDict, PdfStream, PdfValue};
use crate::parser::cursor::ByteCursor;
use crate::parser::lexer::{
    Keyword, Number, Token, capture_literal, next_token, peek_token, peek_two, read_hex_string,
    read_name, unescape_literal,
};
use crate::threat::Location;
use tracing::{debug, trace, warn};

const END_STREAM: &[u8] = b"endstream";

impl AuditSession<'_> {
    /// Read one value at the cursor.
    ///
    /// With `follow_references`, an `n g R` is resolved through the cache
    /// and its value returned instead of the reference.
    pub fn read_object(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        follow_references: bool,
    ) -> Result<PdfValue> {
        let token = next_token(cursor);
        if token.is_empty() {
            return Err(PdfError::UnexpectedEof(token.pos));
        }
        match token.keyword() {
            Some(Keyword::AngleOpen) => {
                if cursor.peek_byte() == Some(b'<') {
                    cursor.read_byte();
                    self.read_dictionary(cursor, token.pos)
                } else {
                    let value = PdfValue::HexString(read_hex_string(cursor));
                    trace!("[HEX]{value}");
                    Ok(value)
                }
            }
            Some(Keyword::ParenOpen) => {
                let mut raw = Vec::new();
                if capture_literal(cursor, &mut raw).is_none() {
                    return Err(PdfError::UnexpectedEof(token.pos));
                }
                let string = unescape_literal(&raw);
                trace!("[STR]{}", String::from_utf8_lossy(&string));
                Ok(PdfValue::String(string))
            }
            Some(Keyword::ArrayStart) => self.read_array(cursor, token.pos),
            Some(Keyword::Slash) => {
                let name = read_name(cursor);
                trace!("[NAME]{name}");
                Ok(PdfValue::Name(name))
            }
            Some(Keyword::True) => Ok(PdfValue::Bool(true)),
            Some(Keyword::False) => Ok(PdfValue::Bool(false)),
            Some(Keyword::Null) => Ok(PdfValue::Null),
            Some(kw @ (Keyword::EndObj | Keyword::AngleClose | Keyword::ArrayEnd)) => {
                Ok(PdfValue::Keyword(kw))
            }
            _ => match token.number() {
                Some(number) => self.read_number_or_ref(cursor, token, number, follow_references),
                None => Err(PdfError::UnexpectedToken {
                    pos: token.pos,
                    token: token.text(),
                }),
            },
        }
    }

    fn read_number_or_ref(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        token: Token<'_>,
        number: Number,
        follow_references: bool,
    ) -> Result<PdfValue> {
        let (genno, r) = peek_two(cursor);
        let key = token
            .as_uint()
            .zip(genno.as_uint())
            .filter(|_| r.is(Keyword::R))
            .and_then(|(n, g)| Some(ObjectKey::new(u32::try_from(n).ok()?, u32::try_from(g).ok()?)));

        let Some(key) = key else {
            return Ok(match number {
                Number::Int(n) => PdfValue::Int(n),
                Number::Real(n) => PdfValue::Real(n),
            });
        };
        next_token(cursor);
        next_token(cursor);
        if !follow_references {
            return Ok(PdfValue::Ref(key));
        }
        Ok((*self.resolve(key)?).clone())
    }

    /// Count one level of nesting; too deep is fatal.
    fn enter(&mut self, pos: usize) -> Result<()> {
        let limit = self.options().max_nesting;
        if self.depth >= limit {
            return Err(PdfError::NestingTooDeep { pos, limit });
        }
        self.depth += 1;
        Ok(())
    }

    fn read_array(&mut self, cursor: &mut ByteCursor<'_>, pos: usize) -> Result<PdfValue> {
        self.enter(pos)?;
        let items = self.read_array_items(cursor);
        self.depth -= 1;
        let mut items = items?;
        if self.options().collapse_single_arrays && items.len() == 1 {
            return Ok(items.remove(0));
        }
        Ok(PdfValue::Array(items))
    }

    fn read_array_items(&mut self, cursor: &mut ByteCursor<'_>) -> Result<Vec<PdfValue>> {
        trace!("[ARRAY]");
        let mut items = Vec::new();
        loop {
            let pos = cursor.tell();
            match self.read_object(cursor, false)? {
                PdfValue::Keyword(Keyword::ArrayEnd) => return Ok(items),
                PdfValue::Keyword(kw) => {
                    return Err(PdfError::UnexpectedToken {
                        pos,
                        token: kw.to_string(),
                    });
                }
                value => items.push(value),
            }
        }
    }

    /// Read a dictionary (the cursor sits past `<<`) and the stream that
    /// may follow it.
    fn read_dictionary(&mut self, cursor: &mut ByteCursor<'_>, pos: usize) -> Result<PdfValue> {
        self.enter(pos)?;
        let dict = self.read_dict_entries(cursor, pos);
        self.depth -= 1;
        let dict = dict?;

        let value = if peek_token(cursor).is(Keyword::Stream) {
            self.read_stream(cursor, dict)?
        } else {
            PdfValue::Dict(dict)
        };
        if let Ok(dict) = value.as_dict() {
            self.check_for_risks(dict);
        }
        debug!("[DICT: end]");
        Ok(value)
    }

    fn read_dict_entries(&mut self, cursor: &mut ByteCursor<'_>, pos: usize) -> Result<PdfDict> {
        debug!("[DICT]");
        let mut dict = PdfDict::new();
        loop {
            let key_pos = cursor.tell();
            let key = match self.read_object(cursor, false)? {
                PdfValue::Keyword(Keyword::AngleClose) => {
                    close_dict(cursor);
                    return Ok(dict);
                }
                PdfValue::Keyword(kw) => {
                    warn!("dictionary at {pos} not closed before `{kw}`");
                    cursor.seek(key_pos);
                    return Ok(dict);
                }
                PdfValue::Name(name) => Some(name),
                other => {
                    warn!("dictionary at {pos}: non-name key {other} skipped");
                    None
                }
            };

            let value_pos = cursor.tell();
            let follow = key.as_deref() == Some("Length");
            match self.read_object(cursor, follow)? {
                PdfValue::Keyword(Keyword::AngleClose) => {
                    warn!("dictionary at {pos}: key without value");
                    close_dict(cursor);
                    return Ok(dict);
                }
                PdfValue::Keyword(kw) => {
                    warn!("dictionary at {pos} not closed before `{kw}`");
                    cursor.seek(value_pos);
                    return Ok(dict);
                }
                value => {
                    if let Some(key) = key {
                        trace!("[KEY] /{key} {value}");
                        dict.insert(key, value);
                    }
                }
            }
        }
    }

    /// Read the stream body following `dict`. The cursor sits before the
    /// `stream` keyword; on return it sits past `endstream`.
    fn read_stream(&mut self, cursor: &mut ByteCursor<'_>, dict: PdfDict) -> Result<PdfValue> {
        let keyword = next_token(cursor);
        let data = cursor.data();

        let mut start = keyword.end();
        if data[start..].starts_with(b"\r\n") {
            start += 2;
        } else if matches!(data.get(start), Some(b'\n' | b'\r')) {
            start += 1;
        }

        let declared = dict.get("Length").and_then(|l| l.as_usize().ok());
        let (end, resume) = match declared.and_then(|len| declared_body(data, start, len)) {
            Some(bounds) => bounds,
            None => {
                warn!(
                    "stream at {start}: bad Length {}; scanning for endstream",
                    dict.get("Length")
                        .map_or_else(|| "(missing)".to_string(), ToString::to_string)
                );
                scanned_body(cursor, start)
            }
        };
        cursor.seek(resume);

        let raw = &data[start..end];
        debug!("[STREAM] {} bytes", raw.len());
        let decoded = decode_stream(raw, dict.get("Filter"));
        let stream = PdfStream::new(dict, decoded.data, raw.len());

        match stream.type_name() {
            Some("XRef") => debug!("[XRef]"),
            Some("ObjStm") if decoded.complete => self.read_object_stream(&stream)?,
            Some("ObjStm") => warn!("object stream could not be decoded; embedded objects skipped"),
            _ => {}
        }
        Ok(PdfValue::Stream(Box::new(stream)))
    }

    /// Parse the objects packed in an object stream and cache each as
    /// `(number, 0)`.
    fn read_object_stream(&mut self, stream: &PdfStream) -> Result<()> {
        let Some(container) = self.frames.last().map(|f| f.key) else {
            warn!("object stream outside an indirect object; embedded objects skipped");
            return Ok(());
        };
        let count = stream.get("N").and_then(|n| n.as_usize().ok()).unwrap_or(0);
        let first = stream.get("First").and_then(|f| f.as_usize().ok());
        debug!("[STREAM]: open ObjStm {container}");

        let mut cursor = ByteCursor::new(&stream.data);
        let mut entries = Vec::new();
        for _ in 0..count {
            let num = next_token(&mut cursor);
            let offset = next_token(&mut cursor);
            let entry = num
                .as_uint()
                .and_then(|n| u32::try_from(n).ok())
                .zip(offset.as_uint().and_then(|o| usize::try_from(o).ok()));
            match entry {
                Some(entry) => entries.push(entry),
                None => {
                    warn!("object stream {container}: malformed header");
                    break;
                }
            }
        }

        for (i, (objid, offset)) in entries.into_iter().enumerate() {
            let positioned = match first
                .and_then(|first| first.checked_add(offset))
                .filter(|&pos| pos < stream.data.len())
            {
                Some(pos) => {
                    cursor.seek(pos);
                    true
                }
                None => false,
            };
            let key = ObjectKey::new(objid, 0);
            if !self.is_current_member(key, container) {
                debug!("[ObjStm Object]: {i} ({key}) superseded; skipped");
                if !positioned {
                    // Sequential layout: read past the member without auditing it
                    let mark = self.findings.len();
                    let skipped = self.read_object(&mut cursor, false);
                    self.findings.truncate(mark);
                    if let Err(e) = skipped {
                        if e.is_structural_fatal() {
                            return Err(e);
                        }
                        warn!("object stream {container}: object {key} unreadable: {e}");
                        break;
                    }
                }
                continue;
            }
            debug!("[ObjStm Object]: {i} ({key})");
            self.frames.push(Frame {
                key,
                location: Location::ObjStm(container),
            });
            let value = self.read_object(&mut cursor, false);
            self.frames.pop();
            match value {
                Ok(value) => {
                    self.stats.embedded_objects += 1;
                    self.cache.insert(key, value);
                }
                Err(e) if e.is_structural_fatal() => return Err(e),
                Err(e) => {
                    warn!("object stream {container}: object {key} unreadable: {e}");
                    break;
                }
            }
        }
        debug!("[STREAM]: close ObjStm");
        Ok(())
    }

    /// Whether the cross-reference data still places `key` in `container`.
    /// Without an entry (scan-only audits, members the table never lists)
    /// the member counts as current.
    fn is_current_member(&self, key: ObjectKey, container: ObjectKey) -> bool {
        match self.xref.get(&key) {
            None => !self.xref.is_freed(&key),
            Some(&XrefEntry::Compressed { container: c, .. }) => c == container.objid,
            Some(_) => false,
        }
    }

    fn check_for_risks(&mut self, dict: &PdfDict) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let found = self
            .options()
            .risk_table
            .check_dictionary(dict, frame.key, frame.location);
        self.findings.extend(found);
    }
}

/// Consume the second `>` of `>>` when present.
fn close_dict(cursor: &mut ByteCursor<'_>) {
    if peek_token(cursor).is(Keyword::AngleClose) {
        next_token(cursor);
    }
}

/// Body bounds from a declared length, when `endstream` follows it.
/// Returns `(end of body, offset past endstream)`.
fn declared_body(data: &[u8], start: usize, len: usize) -> Option<(usize, usize)> {
    let end = start.checked_add(len).filter(|&end| end <= data.len())?;
    let mut probe = ByteCursor::new(data);
    probe.seek(end);
    let token = next_token(&mut probe);
    token.is(Keyword::EndStream).then_some((end, token.end()))
}

/// Body bounds found by searching for `endstream`, dropping the end-of-line
/// that precedes it.
fn scanned_body(cursor: &ByteCursor<'_>, start: usize) -> (usize, usize) {
    let data = cursor.data();
    let Some(found) = cursor.find_from(start, END_STREAM) else {
        warn!("stream at {start}: no endstream before end of file");
        return (data.len(), data.len());
    };
    let body = &data[start..found];
    let end = if body.ends_with(b"\r\n") {
        found - 2
    } else if body.ends_with(b"\n") || body.ends_with(b"\r") {
        found - 1
    } else {
        found
    };
    (end, found + END_STREAM.len())
}
