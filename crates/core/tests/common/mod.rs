//! In-memory PDF builder for integration tests.
//!
//! Offsets are recorded while writing, so cross-reference data always
//! matches the bytes unless a test corrupts it on purpose.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

pub const HEADER: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

pub struct PdfBuilder {
    buf: Vec<u8>,
    /// `(objid, genno, offset)` in write order.
    objects: Vec<(u32, u32, usize)>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            buf: HEADER.to_vec(),
            objects: Vec::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Write `n g obj <body> endobj` and return its offset.
    pub fn object(&mut self, objid: u32, genno: u32, body: &str) -> usize {
        let offset = self.offset();
        self.buf
            .extend_from_slice(format!("{objid} {genno} obj\n{body}\nendobj\n").as_bytes());
        self.objects.push((objid, genno, offset));
        offset
    }

    /// Write a stream object; `/Length` is appended to `dict_entries`.
    pub fn stream(&mut self, objid: u32, dict_entries: &str, data: &[u8]) -> usize {
        let offset = self.offset();
        self.buf.extend_from_slice(
            format!(
                "{objid} 0 obj\n<< {dict_entries} /Length {} >>\nstream\n",
                data.len()
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self.objects.push((objid, 0, offset));
        offset
    }

    /// Write an uncompressed object stream holding `members` and return
    /// the container's offset.
    pub fn object_stream(&mut self, objid: u32, members: &[(u32, &str)]) -> usize {
        let mut header = String::new();
        let mut body = String::new();
        for (num, text) in members {
            header.push_str(&format!("{num} {} ", body.len()));
            body.push_str(text);
            body.push(' ');
        }
        let first = header.len();
        let data = format!("{header}{body}");
        self.stream(
            objid,
            &format!("/Type /ObjStm /N {} /First {first}", members.len()),
            data.as_bytes(),
        )
    }

    /// Write a classic table covering every object written since the last
    /// call (or the start), plus the object 0 free entry, and a trailer.
    /// Returns the table offset.
    pub fn xref_table(&mut self, trailer_entries: &str) -> usize {
        let offset = self.offset();
        let mut table = String::from("xref\n0 1\n0000000000 65535 f \n");
        for (objid, genno, pos) in self.objects.drain(..) {
            table.push_str(&format!("{objid} 1\n{pos:010} {genno:05} n \n"));
        }
        table.push_str(&format!("trailer\n<< {trailer_entries} >>\n"));
        self.buf.extend_from_slice(table.as_bytes());
        offset
    }

    /// Write a classic table with explicit rows `(objid, genno, offset, in_use)`.
    pub fn xref_rows(&mut self, rows: &[(u32, u32, usize, bool)], trailer_entries: &str) -> usize {
        let offset = self.offset();
        let mut table = String::from("xref\n");
        for &(objid, genno, pos, in_use) in rows {
            let marker = if in_use { 'n' } else { 'f' };
            table.push_str(&format!("{objid} 1\n{pos:010} {genno:05} {marker} \n"));
        }
        table.push_str(&format!("trailer\n<< {trailer_entries} >>\n"));
        self.buf.extend_from_slice(table.as_bytes());
        offset
    }

    pub fn startxref(&mut self, offset: usize) -> &mut Self {
        self.buf
            .extend_from_slice(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
        self
    }

    /// Forget recorded objects so the next table starts a new revision.
    pub fn clear_recorded(&mut self) {
        self.objects.clear();
    }

    pub fn finish(&self) -> Vec<u8> {
        self.buf.clone()
    }

    /// Classic table for everything written, trailer with `/Size` and
    /// `trailer_entries`, then `startxref`.
    pub fn finish_with_xref(mut self, trailer_entries: &str) -> Vec<u8> {
        let size = self.objects.iter().map(|o| o.0).max().unwrap_or(0) + 1;
        let xref = self.xref_table(&format!("/Size {size} {trailer_entries}"));
        self.startxref(xref);
        self.buf
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Encode rows of `columns` bytes with the PNG "Up" predictor.
pub fn up_encode(data: &[u8], columns: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev = vec![0u8; columns];
    for row in data.chunks(columns) {
        out.push(2);
        for (p, &b) in prev.iter_mut().zip(row) {
            out.push(b.wrapping_sub(*p));
            *p = b;
        }
    }
    out
}
