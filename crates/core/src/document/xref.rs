//! Cross-reference resolver.
//!
//! Loads classic `xref` tables and compressed xref streams, follows the
//! `Prev` chain across revisions and merges everything into one
//! [`XrefTable`] where the newest revision wins.

use super::session::AuditSession;
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjectKey, PdfDict, PdfValue};
use crate::parser::cursor::ByteCursor;
use crate::parser::lexer::{Keyword, Token, next_token, peek_token, peek_two};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, trace, warn};

/// Location of one object according to the cross-reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Byte offset of `n g obj`.
    InUse(usize),
    /// Free; carries the generation the number would be reused with.
    Free(u32),
    /// Packed in an object stream: (container object number, index).
    Compressed { container: u32, index: u32 },
}

impl fmt::Display for XrefEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InUse(offset) => write!(f, "in use at {offset:#x}"),
            Self::Free(next) => write!(f, "free (next generation {next})"),
            Self::Compressed { container, index } => {
                write!(f, "compressed in {container} 0 at index {index}")
            }
        }
    }
}

/// Merged cross-reference table.
///
/// Free entries are never stored: applying one removes the key it frees
/// and remembers it so the structure scan cannot bring it back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XrefTable {
    entries: IndexMap<ObjectKey, XrefEntry>,
    freed: HashSet<ObjectKey>,
    /// Trailer dictionaries, newest revision first.
    trailers: Vec<PdfDict>,
    /// Offsets of the loaded sections, newest first.
    sections: Vec<usize>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one row. In-use and compressed rows insert or overwrite; a free
    /// row removes the previous generation of the same number.
    pub fn apply(&mut self, key: ObjectKey, entry: XrefEntry) {
        match entry {
            XrefEntry::Free(next_gen) => {
                if let Some(prev_gen) = next_gen.checked_sub(1) {
                    let stale = ObjectKey::new(key.objid, prev_gen);
                    self.entries.shift_remove(&stale);
                    self.freed.insert(stale);
                }
            }
            _ => {
                self.freed.remove(&key);
                self.entries.insert(key, entry);
            }
        }
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&XrefEntry> {
        self.entries.get(key)
    }

    pub fn is_freed(&self, key: &ObjectKey) -> bool {
        self.freed.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &XrefEntry)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trailer of the newest revision.
    pub fn trailer(&self) -> Option<&PdfDict> {
        self.trailers.first()
    }

    pub fn sections(&self) -> &[usize] {
        &self.sections
    }
}

/// One revision's cross-reference data before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct XrefSection {
    pub offset: usize,
    pub rows: Vec<(ObjectKey, XrefEntry)>,
    pub trailer: PdfDict,
}

/// Offset declared after the last `startxref` in the file.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let marker = Keyword::StartXref.as_bytes();
    let pos = data
        .windows(marker.len())
        .rposition(|w| w == marker)
        .ok_or(PdfError::NoValidXRef)?;
    let mut cursor = ByteCursor::new(data);
    cursor.seek(pos + marker.len());
    let token = next_token(&mut cursor);
    let offset = token.as_uint().ok_or(PdfError::NoValidXRef)?;
    debug!("[STARTXREF]: {offset}");
    usize::try_from(offset).map_err(|_| PdfError::NoValidXRef)
}

fn expect_uint(token: Token<'_>) -> Result<u64> {
    token.as_uint().ok_or_else(|| PdfError::UnexpectedToken {
        pos: token.pos,
        token: token.text(),
    })
}

fn expect_u32(token: Token<'_>) -> Result<u32> {
    u32::try_from(expect_uint(token)?)
        .map_err(|_| PdfError::SyntaxError(format!("xref number out of range at {}", token.pos)))
}

/// Parse the rows of a classic table. The cursor must sit just past `xref`;
/// on return it sits past `trailer`.
pub fn parse_xref_table(cursor: &mut ByteCursor<'_>) -> Result<Vec<(ObjectKey, XrefEntry)>> {
    let mut rows = Vec::new();
    loop {
        let (first, second) = peek_two(cursor);
        if first.as_uint().is_none() || second.as_uint().is_none() {
            break;
        }
        let start = expect_u32(next_token(cursor))?;
        let count = expect_u32(next_token(cursor))?;
        debug!("[XREF]:{start} {count}");

        let mut base = start;
        for i in 0..count {
            let offset = expect_uint(next_token(cursor))?;
            let genno = expect_u32(next_token(cursor))?;
            let marker = next_token(cursor);

            // Writers sometimes start the first subsection at 1 while still
            // listing the object 0 free entry first.
            if i == 0 && base > 0 && marker.bytes == b"f" && offset == 0 && genno == 65535 {
                base -= 1;
            }
            let objid = base.saturating_add(i);
            trace!("{objid} {offset} {genno} {}", marker.text());

            let entry = match marker.bytes {
                b"n" => XrefEntry::InUse(usize::try_from(offset).map_err(|_| {
                    PdfError::SyntaxError(format!("xref offset out of range: {offset}"))
                })?),
                b"f" => XrefEntry::Free(genno),
                _ => {
                    return Err(PdfError::UnexpectedToken {
                        pos: marker.pos,
                        token: marker.text(),
                    });
                }
            };
            rows.push((ObjectKey::new(objid, genno), entry));
        }
    }

    let token = next_token(cursor);
    if !token.is(Keyword::Trailer) {
        return Err(PdfError::UnexpectedToken {
            pos: token.pos,
            token: token.text(),
        });
    }
    Ok(rows)
}

/// Undo the PNG "Up" predictor on xref stream rows of `columns` bytes plus
/// one selector byte each. Selector 2 is accepted on every row; the first
/// row also takes selector 0, which matches Up over the zero prior row.
/// A trailing partial row is dropped.
pub fn apply_up_predictor(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    let row_len = columns + 1;
    let mut out = Vec::with_capacity(data.len() / row_len * columns);
    let mut prev = vec![0u8; columns];
    for (i, row) in data.chunks_exact(row_len).enumerate() {
        match row[0] {
            2 => {}
            0 if i == 0 => {}
            selector => return Err(PdfError::PredictorNotImplemented(selector)),
        }
        for (p, &b) in prev.iter_mut().zip(&row[1..]) {
            *p = p.wrapping_add(b);
        }
        out.extend_from_slice(&prev);
    }
    if data.len() % row_len != 0 {
        warn!(
            "xref stream has {} trailing bytes after the last row",
            data.len() % row_len
        );
    }
    Ok(out)
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Decode the rows of an xref stream. `widths` are the `W` field widths,
/// `index` the `(first object, count)` subsections.
pub fn decode_xref_stream_rows(
    data: &[u8],
    widths: [usize; 3],
    index: &[(u32, u32)],
) -> Vec<(ObjectKey, XrefEntry)> {
    let row_len: usize = widths.iter().sum();
    let mut rows = Vec::new();
    if row_len == 0 {
        return rows;
    }
    let mut chunks = data.chunks_exact(row_len);
    for &(start, count) in index {
        for i in 0..count {
            let objid = start.saturating_add(i);
            let Some(row) = chunks.next() else {
                return rows;
            };
            let (kind, rest) = row.split_at(widths[0]);
            let (field1, field2) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { read_field(kind) };
            let field1 = read_field(field1);
            let field2 = u32::try_from(read_field(field2)).unwrap_or(u32::MAX);
            let row = match kind {
                0 => (ObjectKey::new(objid, field2), XrefEntry::Free(field2)),
                1 => (
                    ObjectKey::new(objid, field2),
                    XrefEntry::InUse(usize::try_from(field1).unwrap_or(usize::MAX)),
                ),
                2 => (
                    ObjectKey::new(objid, 0),
                    XrefEntry::Compressed {
                        container: u32::try_from(field1).unwrap_or(u32::MAX),
                        index: field2,
                    },
                ),
                other => {
                    trace!("xref stream row {objid}: unknown type {other}");
                    continue;
                }
            };
            rows.push(row);
        }
    }
    rows
}

fn widths_of(dict: &PdfDict) -> Result<[usize; 3]> {
    let w = dict
        .get("W")
        .ok_or_else(|| PdfError::KeyError("W".into()))?
        .as_array()?;
    if w.len() != 3 {
        return Err(PdfError::SyntaxError("W must have 3 elements".into()));
    }
    let mut widths = [0usize; 3];
    for (slot, value) in widths.iter_mut().zip(w) {
        *slot = value.as_usize()?;
        if *slot > 8 {
            return Err(PdfError::SyntaxError(format!("W field too wide: {slot}")));
        }
    }
    Ok(widths)
}

fn index_of(dict: &PdfDict) -> Result<Vec<(u32, u32)>> {
    let to_u32 = |v: &PdfValue| -> Result<u32> {
        u32::try_from(v.as_usize()?)
            .map_err(|_| PdfError::SyntaxError("xref stream Index out of range".into()))
    };
    match dict.get("Index") {
        Some(index) => index
            .as_array()?
            .chunks_exact(2)
            .map(|pair| Ok((to_u32(&pair[0])?, to_u32(&pair[1])?)))
            .collect(),
        None => {
            let size = dict
                .get("Size")
                .ok_or_else(|| PdfError::KeyError("Size".into()))?;
            Ok(vec![(0, to_u32(size)?)])
        }
    }
}

/// Whether `DecodeParms` asks for a row predictor.
fn has_predictor(dict: &PdfDict) -> bool {
    let parms = match dict.get("DecodeParms") {
        Some(PdfValue::Array(arr)) => arr.first(),
        other => other,
    };
    parms
        .and_then(|p| p.as_dict().ok())
        .and_then(|p| p.get("Predictor"))
        .and_then(|p| p.as_int().ok())
        .is_some_and(|p| p > 1)
}

impl AuditSession<'_> {
    /// Load the declared chain starting at `start` and merge it into the
    /// session's table, oldest revision first.
    pub(crate) fn load_xref_chain(&mut self, start: usize) -> Result<XrefTable> {
        let mut visited = HashSet::new();
        let mut sections = Vec::new();
        let mut pos = start;
        loop {
            if !visited.insert(pos) {
                return Err(PdfError::XrefChainCycle(pos));
            }
            let section = self.load_xref_section(pos, &mut visited)?;
            let prev = section
                .trailer
                .get("Prev")
                .map(PdfValue::as_usize)
                .transpose()?;
            sections.push(section);
            match prev {
                Some(prev) => {
                    debug!("[Prevxref]: {prev}");
                    info!("Reading previous version of pdf");
                    pos = prev;
                }
                None => break,
            }
        }

        let mut table = XrefTable::new();
        for section in sections.iter().rev() {
            for &(key, entry) in &section.rows {
                table.apply(key, entry);
            }
        }
        for section in sections {
            table.sections.push(section.offset);
            table.trailers.push(section.trailer);
        }
        debug!("[XREF: End] {} entries", table.len());
        Ok(table)
    }

    /// Load the section at `pos`, classic table or xref stream.
    fn load_xref_section(&mut self, pos: usize, visited: &mut HashSet<usize>) -> Result<XrefSection> {
        if pos >= self.data().len() {
            return Err(PdfError::SyntaxError(format!(
                "xref offset {pos} beyond end of file"
            )));
        }
        let mut cursor = ByteCursor::new(self.data());
        cursor.seek(pos);
        if !peek_token(&mut cursor).is(Keyword::Xref) {
            debug!("[XREF Stream] at {pos}");
            return self.load_xref_stream(pos);
        }

        debug!("[XREF] at {pos}");
        next_token(&mut cursor);
        let table_rows = parse_xref_table(&mut cursor)?;
        let trailer = self.read_object(&mut cursor, false)?;
        let PdfValue::Dict(trailer) = trailer else {
            return Err(PdfError::TypeError {
                expected: "dict",
                got: trailer.type_name(),
            });
        };

        // Hybrid file: the stream's rows come first, the table overrides
        let mut rows = Vec::new();
        if let Some(stm) = trailer.get("XRefStm").and_then(|v| v.as_usize().ok()) {
            if visited.insert(stm) {
                match self.load_xref_stream(stm) {
                    Ok(section) => rows.extend(section.rows),
                    Err(e) if e.is_structural_fatal() => return Err(e),
                    Err(e) => warn!("XRefStm at {stm} unusable: {e}"),
                }
            }
        }
        rows.extend(table_rows);

        Ok(XrefSection {
            offset: pos,
            rows,
            trailer,
        })
    }

    /// Load an xref stream object at `pos`.
    fn load_xref_stream(&mut self, pos: usize) -> Result<XrefSection> {
        let (_, value) = self.read_indirect_at(pos, None)?;
        let stream = value.as_stream()?;
        let widths = widths_of(&stream.attrs)?;
        let index = index_of(&stream.attrs)?;

        let rows_data = if has_predictor(&stream.attrs) {
            debug!("[Predictor]");
            apply_up_predictor(&stream.data, widths.iter().sum())?
        } else {
            stream.data.clone()
        };
        let rows = decode_xref_stream_rows(&rows_data, widths, &index);
        debug!("[XREF Stream objects]: {}", rows.len());

        Ok(XrefSection {
            offset: pos,
            rows,
            trailer: stream.attrs.clone(),
        })
    }
}
