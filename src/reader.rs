//! Replayable byte source.
//!
//! [`MultiReader`] materializes an input stream exactly once and hands out
//! any number of independent readers over the stored bytes. The analyzer
//! uses it so every registered response parser observes the same body.

use std::io::{self, Cursor, Read};

use bytes::Bytes;

/// A byte buffer that can be read from the start any number of times.
#[derive(Clone)]
pub struct MultiReader {
    data: Bytes,
}

impl MultiReader {
    /// Drains `source` to completion and stores the bytes. The source is
    /// read exactly once; read errors surface to the caller.
    pub fn new<R: Read>(mut source: R) -> io::Result<Self> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Ok(MultiReader {
            data: Bytes::from(data),
        })
    }

    /// Wraps bytes that are already in memory.
    pub fn from_bytes(data: Bytes) -> Self {
        MultiReader { data }
    }

    /// A fresh reader positioned at the start of the stored bytes. Readers
    /// are independent of each other and of the `MultiReader` itself.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    /// The stored bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for MultiReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiReader")
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_source_once() {
        let source: &[u8] = b"hello, crawler";
        let mr = MultiReader::new(source).unwrap();
        assert_eq!(mr.len(), 14);
    }

    #[test]
    fn readers_replay_identical_bytes() {
        let mr = MultiReader::from_bytes(Bytes::from_static(b"replay me"));
        let mut first = String::new();
        let mut second = String::new();
        mr.reader().read_to_string(&mut first).unwrap();
        mr.reader().read_to_string(&mut second).unwrap();
        assert_eq!(first, "replay me");
        assert_eq!(first, second);
    }

    #[test]
    fn readers_are_independent() {
        let mr = MultiReader::from_bytes(Bytes::from_static(b"abcdef"));
        let mut a = mr.reader();
        let mut b = mr.reader();
        let mut buf = [0u8; 3];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn empty_source() {
        let mr = MultiReader::new(io::empty()).unwrap();
        assert!(mr.is_empty());
        let mut out = Vec::new();
        mr.reader().read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
