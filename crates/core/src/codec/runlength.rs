//! Run-length decoder for `RunLengthDecode` streams.

/// Decode run-length data.
///
/// A length byte `0..=127` copies the next `n + 1` bytes literally,
/// `129..=255` repeats the next byte `257 - n` times and 128 ends the data.
/// Truncated runs are copied as far as the input goes.
pub fn rldecode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while let Some(&len) = data.get(i) {
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let end = (i + usize::from(len) + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                let Some(&byte) = data.get(i) else {
                    break;
                };
                i += 1;
                out.extend(std::iter::repeat_n(byte, 257 - usize::from(len)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_repeat_runs() {
        let data = [2, b'a', b'b', b'c', 254, b'z', 128, b'x'];
        assert_eq!(rldecode(&data), b"abczzz");
    }

    #[test]
    fn truncated_literal_is_kept() {
        assert_eq!(rldecode(&[5, b'a', b'b']), b"ab");
    }
}
