//! Random-access byte cursor over an in-memory PDF snapshot.

/// Byte cursor with explicit save/restore.
///
/// All lexical lookahead goes through [`ByteCursor::lookahead`], which
/// restores the position once the closure returns.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    seeks: usize,
}

impl<'a> ByteCursor<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            seeks: 0,
        }
    }

    /// Underlying bytes.
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current position.
    pub const fn tell(&self) -> usize {
        self.pos
    }

    /// Move to an absolute position. Positions past the end clamp to EOF.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
        self.seeks += 1;
    }

    /// Number of explicit seeks performed so far.
    pub const fn seek_count(&self) -> usize {
        self.seeks
    }

    pub const fn at_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    /// Read up to `len` bytes; shorter at EOF.
    pub fn read_n(&mut self, len: usize) -> &'a [u8] {
        let end = self.pos.saturating_add(len).min(self.data.len());
        let slice = &self.data[self.pos..end];
        self.pos = end;
        slice
    }

    /// Remaining bytes from the current position.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Run `f` and restore the position afterwards, whatever `f` did.
    pub fn lookahead<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.pos;
        let out = f(self);
        self.pos = saved;
        out
    }

    /// Find `needle` at or after `from`, returning its absolute position.
    pub fn find_from(&self, from: usize, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || from >= self.data.len() {
            return None;
        }
        self.data[from..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| from + p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookahead_restores_position() {
        let mut cursor = ByteCursor::new(b"abcdef");
        cursor.read_byte();
        let taken = cursor.lookahead(|c| c.read_n(3).to_vec());
        assert_eq!(taken, b"bcd");
        assert_eq!(cursor.tell(), 1);
    }

    #[test]
    fn read_n_is_clamped_at_eof() {
        let mut cursor = ByteCursor::new(b"abc");
        cursor.seek(1);
        assert_eq!(cursor.read_n(10), b"bc");
        assert!(cursor.at_eof());
        assert_eq!(cursor.read_byte(), None);
    }

    #[test]
    fn seek_past_end_clamps() {
        let mut cursor = ByteCursor::new(b"abc");
        cursor.seek(99);
        assert_eq!(cursor.tell(), 3);
        assert_eq!(cursor.seek_count(), 1);
    }

    #[test]
    fn find_from_locates_needle() {
        let cursor = ByteCursor::new(b"xx endstream yy endstream");
        assert_eq!(cursor.find_from(0, b"endstream"), Some(3));
        assert_eq!(cursor.find_from(4, b"endstream"), Some(16));
        assert_eq!(cursor.find_from(17, b"endstream"), None);
    }
}
