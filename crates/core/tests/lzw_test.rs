//! LZW decoder vectors.

use pdfaudit_core::codec::lzwdecode;

#[test]
fn lzw_reference_sample() {
    let input = b"\x80\x0b\x60\x50\x22\x0c\x0c\x85\x01";
    assert_eq!(lzwdecode(input).unwrap(), b"-----A---B");
}

#[test]
fn lzw_empty_input() {
    assert!(lzwdecode(b"").unwrap().is_empty());
}
