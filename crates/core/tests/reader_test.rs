//! Object reader tests.

mod common;

use common::PdfBuilder;
use pdfaudit_core::parser::cursor::ByteCursor;
use pdfaudit_core::{AuditOptions, AuditSession, ObjectKey, PdfError, PdfValue};

fn read(data: &[u8]) -> pdfaudit_core::Result<PdfValue> {
    read_with(data, &AuditOptions::default())
}

fn read_with(data: &[u8], options: &AuditOptions) -> pdfaudit_core::Result<PdfValue> {
    let mut session = AuditSession::new(data, options);
    let mut cursor = ByteCursor::new(data);
    session.read_object(&mut cursor, false)
}

#[test]
fn nested_dictionary() {
    let value = read(b"<< /Resources << /Font << /F1 1 0 R >> >> /Count 5 >>").unwrap();
    let dict = value.as_dict().unwrap();
    let font = dict["Resources"].as_dict().unwrap()["Font"].as_dict().unwrap();
    assert_eq!(font["F1"].as_ref().unwrap(), ObjectKey::new(1, 0));
    assert_eq!(dict["Count"].as_int().unwrap(), 5);
}

#[test]
fn array_of_mixed_values() {
    let value = read(b"[1 -2.5 /Name (str) <4142> true null 3 0 R]").unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 8);
    assert_eq!(items[1], PdfValue::Real(-2.5));
    assert_eq!(items[3].as_string().unwrap(), b"str");
    assert_eq!(items[4], PdfValue::HexString(b"AB".to_vec()));
    assert_eq!(items[7], PdfValue::Ref(ObjectKey::new(3, 0)));
}

#[test]
fn escaped_and_balanced_literals() {
    assert_eq!(read(br"(a\(b\)c)").unwrap().as_string().unwrap(), b"a(b)c");
    assert_eq!(read(b"(a(b)c)").unwrap().as_string().unwrap(), b"a(b)c");
}

#[test]
fn odd_hex_string() {
    assert_eq!(read(b"<ABC>").unwrap(), PdfValue::HexString(vec![0xAB, 0xC0]));
}

#[test]
fn single_element_array_kept_by_default() {
    let value = read(b"[/Fit]").unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);

    let options = AuditOptions::default().with_collapse_single_arrays(true);
    assert_eq!(read_with(b"[/Fit]", &options).unwrap(), PdfValue::Name("Fit".into()));
}

#[test]
fn nesting_limit_is_fatal() {
    let options = AuditOptions::default().with_max_nesting(4);
    assert!(read_with(b"[[[[1]]]]", &options).is_ok());
    let err = read_with(b"[[[[[1]]]]]", &options).unwrap_err();
    assert!(matches!(err, PdfError::NestingTooDeep { limit: 4, .. }));
    assert!(err.is_structural_fatal());
}

#[test]
fn unterminated_literal_is_eof() {
    assert!(matches!(read(b"(open"), Err(PdfError::UnexpectedEof(_))));
}

#[test]
fn stray_keyword_is_unexpected() {
    assert!(matches!(
        read(b"stream"),
        Err(PdfError::UnexpectedToken { pos: 0, .. })
    ));
}

#[test]
fn unclosed_dictionary_ends_at_endobj() {
    let data = b"<< /A 1 /B 2 endobj";
    let options = AuditOptions::default();
    let mut session = AuditSession::new(data, &options);
    let mut cursor = ByteCursor::new(data);
    let value = session.read_object(&mut cursor, false).unwrap();
    assert_eq!(value.as_dict().unwrap().len(), 2);
    assert_eq!(cursor.tell(), 12);
}

#[test]
fn stream_length_given_by_reference() {
    let mut pdf = PdfBuilder::new();
    pdf.raw(b"1 0 obj\n<< /Length 2 0 R >>\nstream\nhello world\nendstream\nendobj\n");
    pdf.object(2, 0, "11");
    let data = pdf.finish();

    let options = AuditOptions::default();
    let mut session = AuditSession::new(&data, &options);
    session.prepare().unwrap();
    let value = session.resolve(ObjectKey::new(1, 0)).unwrap();
    let stream = value.as_stream().unwrap();
    assert_eq!(stream.data, b"hello world");
    assert_eq!(stream.attrs["Length"], PdfValue::Int(11));
}

#[test]
fn dangling_length_reference_is_not_found() {
    let mut pdf = PdfBuilder::new();
    pdf.raw(b"1 0 obj\n<< /Length 9 0 R >>\nstream\nhello world\r\nendstream\nendobj\n");
    let data = pdf.finish();

    let options = AuditOptions::default();
    let mut session = AuditSession::new(&data, &options);
    session.prepare().unwrap();
    assert!(matches!(
        session.resolve(ObjectKey::new(1, 0)),
        Err(PdfError::ObjectNotFound(key)) if key == ObjectKey::new(9, 0)
    ));
}

#[test]
fn non_integer_length_falls_back_to_endstream() {
    let mut pdf = PdfBuilder::new();
    pdf.raw(b"1 0 obj\n<< /Length 2 0 R >>\nstream\nhello world\r\nendstream\nendobj\n");
    pdf.raw(b"2 0 obj\n/Foo\nendobj\n");
    let data = pdf.finish();

    let options = AuditOptions::default();
    let mut session = AuditSession::new(&data, &options);
    session.prepare().unwrap();
    let value = session.resolve(ObjectKey::new(1, 0)).unwrap();
    assert_eq!(value.as_stream().unwrap().data, b"hello world");
}

#[test]
fn wrong_length_falls_back_to_endstream() {
    let mut pdf = PdfBuilder::new();
    pdf.raw(b"1 0 obj\n<< /Length 4 >>\nstream\nhello world\nendstream\nendobj\n");
    let data = pdf.finish();

    let options = AuditOptions::default();
    let mut session = AuditSession::new(&data, &options);
    session.prepare().unwrap();
    let value = session.resolve(ObjectKey::new(1, 0)).unwrap();
    assert_eq!(value.as_stream().unwrap().data, b"hello world");
}
