//! Tagged-chunk savestate stream.
//!
//! A savestate is a sequence of `[4-byte tag][4-byte LE length][payload]`
//! records, one per live component, optionally run through a byte codec as a
//! whole. Tags are three ASCII characters plus a NUL. The reader stops at the
//! first malformed record or at the end of the buffer, so a truncated state
//! restores every chunk that survived.
//!
//! Component payloads are fixed-layout little-endian snapshots; cross-build
//! portability of a snapshot is not guaranteed and not attempted.

/// Byte compressor applied to the whole chunk stream. The real implementation
/// lives outside this crate; the default passes bytes through untouched.
pub trait SnapshotCodec {
    fn compress(&self, raw: &[u8]) -> Vec<u8>;
    /// `limit` is the maximum plausible decoded size; return `None` when the
    /// input cannot be decoded within it.
    fn decompress(&self, data: &[u8], limit: usize) -> Option<Vec<u8>>;
}

/// Identity codec.
pub struct PassthroughCodec;

impl SnapshotCodec for PassthroughCodec {
    fn compress(&self, raw: &[u8]) -> Vec<u8> {
        raw.to_vec()
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Option<Vec<u8>> {
        if data.len() <= limit {
            Some(data.to_vec())
        } else {
            None
        }
    }
}

pub struct ChunkWriter {
    buf: Vec<u8>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn chunk(&mut self, tag: &[u8; 4], payload: &[u8]) {
        self.buf.extend_from_slice(tag);
        self.buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(payload);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterates `(tag, payload)` records, ending at the first malformed one.
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.data[self.pos..];
        if rest.len() < 8 {
            return None;
        }
        let tag: [u8; 4] = rest[0..4].try_into().unwrap();
        if tag[3] != 0 {
            return None;
        }
        let len = u32::from_le_bytes(rest[4..8].try_into().unwrap()) as usize;
        if len < 1 || rest.len() - 8 < len {
            return None;
        }
        self.pos += 8 + len;
        Some((tag, &rest[8..8 + len]))
    }
}

/// Little-endian field writer for component context snapshots.
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Counterpart reader. Reads past the end yield zero so that a truncated
/// payload restores what it carried and leaves the rest at power-on values.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.data.len() - self.pos >= n {
            let s = &self.data[self.pos..self.pos + n];
            self.pos += n;
            Some(s)
        } else {
            self.pos = self.data.len();
            None
        }
    }

    pub fn u8(&mut self) -> u8 {
        self.take(1).map(|s| s[0]).unwrap_or(0)
    }

    pub fn u16(&mut self) -> u16 {
        self.take(2)
            .map(|s| u16::from_le_bytes(s.try_into().unwrap()))
            .unwrap_or(0)
    }

    pub fn u32(&mut self) -> u32 {
        self.take(4)
            .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
            .unwrap_or(0)
    }

    pub fn i32(&mut self) -> i32 {
        self.take(4)
            .map(|s| i32::from_le_bytes(s.try_into().unwrap()))
            .unwrap_or(0)
    }

    pub fn i64(&mut self) -> i64 {
        self.take(8)
            .map(|s| i64::from_le_bytes(s.try_into().unwrap()))
            .unwrap_or(0)
    }

    pub fn f64(&mut self) -> f64 {
        self.take(8)
            .map(|s| f64::from_le_bytes(s.try_into().unwrap()))
            .unwrap_or(0.0)
    }

    pub fn bytes(&mut self, out: &mut [u8]) {
        let n = out.len();
        if let Some(s) = self.take(n) {
            out.copy_from_slice(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_stream_round_trip() {
        let mut w = ChunkWriter::new();
        w.chunk(b"AAA\0", &[1, 2, 3]);
        w.chunk(b"BBB\0", &[4]);
        let bytes = w.into_bytes();

        let chunks: Vec<_> = ChunkIter::new(&bytes).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0].0, b"AAA\0");
        assert_eq!(chunks[0].1, &[1, 2, 3]);
        assert_eq!(&chunks[1].0, b"BBB\0");
        assert_eq!(chunks[1].1, &[4]);
    }

    #[test]
    fn reader_stops_at_malformed_length() {
        let mut w = ChunkWriter::new();
        w.chunk(b"AAA\0", &[9; 8]);
        let mut bytes = w.into_bytes();
        // zero-length trailing record must end the scan
        bytes.extend_from_slice(b"BBB\0");
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let chunks: Vec<_> = ChunkIter::new(&bytes).collect();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn truncated_payload_is_dropped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"AAA\0");
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 10]);
        assert_eq!(ChunkIter::new(&bytes).count(), 0);
    }

    #[test]
    fn byte_reader_zero_fills_past_end() {
        let mut r = ByteReader::new(&[0xAB]);
        assert_eq!(r.u8(), 0xAB);
        assert_eq!(r.u32(), 0);
        assert_eq!(r.u16(), 0);
    }
}
