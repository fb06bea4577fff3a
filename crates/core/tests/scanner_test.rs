//! Structure scan over whole documents.

mod common;

use common::PdfBuilder;
use pdfaudit_core::ObjectKey;
use pdfaudit_core::document::StructureScan;

#[test]
fn scan_matches_written_offsets() {
    let mut pdf = PdfBuilder::new();
    let first = pdf.object(1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let second = pdf.object(2, 0, "<< /Type /Pages /Kids [] /Count 0 >>");
    let data = pdf.finish_with_xref("/Root 1 0 R");

    let scan = StructureScan::scan(&data);
    assert_eq!(scan.len(), 2);
    assert_eq!(scan.offset_of(&ObjectKey::new(1, 0)), Some(first));
    assert_eq!(scan.offset_of(&ObjectKey::new(2, 0)), Some(second));
    assert_eq!(scan.trailers.len(), 1);
    assert_eq!(scan.startxrefs.len(), 1);
}

#[test]
fn object_without_endobj_ends_at_next_header() {
    let data = b"%PDF-1.4\n1 0 obj\n<< /A 1 >>\n2 0 obj\n<< /B 2 >>\nendobj\n";
    let scan = StructureScan::scan(data);
    let first = scan.get(&ObjectKey::new(1, 0)).unwrap();
    let second = scan.get(&ObjectKey::new(2, 0)).unwrap();
    assert_eq!(first.end, second.offset);
}

#[test]
fn object_streams_are_flagged() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, 0, "<< /Type /Catalog >>");
    pdf.object_stream(2, &[(3, "<< /A 1 >>")]);
    let scan = StructureScan::scan(&pdf.finish());
    assert!(!scan.get(&ObjectKey::new(1, 0)).unwrap().objstm);
    assert!(scan.get(&ObjectKey::new(2, 0)).unwrap().objstm);
    assert!(!scan.contains(&ObjectKey::new(3, 0)));
}

#[test]
fn strings_hide_object_markers() {
    let data = b"1 0 obj\n(2 0 obj) <32 30 6f626a>\nendobj\n";
    let scan = StructureScan::scan(data);
    assert_eq!(scan.len(), 1);
}
