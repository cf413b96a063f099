use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::row::{self, Row};

/// Forward cursor over one sorted run file.
///
/// Holds a buffered reader plus a single pre-read row. A stream is either in
/// the `has_data` state (the current row is valid) or at `end` (file
/// exhausted). Lines that fail to parse are skipped, matching the reader's
/// behaviour during the split phase.
pub struct ChunkStream {
    reader: BufReader<File>,
    current: Option<Row>,
    line: String,
}

impl ChunkStream {
    /// Opens the run file and immediately advances to the first parsable
    /// row. A file with no parsable line yields a stream already at `end`;
    /// a missing file is an error.
    pub fn open(path: &Path, buf_capacity: usize) -> io::Result<ChunkStream> {
        let file = File::open(path)?;
        let mut stream = ChunkStream {
            reader: BufReader::with_capacity(buf_capacity, file),
            current: None,
            line: String::new(),
        };
        stream.move_next()?;
        Ok(stream)
    }

    pub fn has_data(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Reads lines until one parses and becomes the current row. At EOF the
    /// stream enters the `end` state. Any read error is fatal; only line
    /// content decides whether a line is skipped.
    pub fn move_next(&mut self) -> io::Result<()> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                self.current = None;
                return Ok(());
            }

            if self.line.ends_with('\n') {
                self.line.pop();
                if self.line.ends_with('\r') {
                    self.line.pop();
                }
            }
            if self.line.is_empty() {
                continue;
            }

            if let Some((number, text_offset)) = row::parse_parts(&self.line) {
                let line = std::mem::take(&mut self.line);
                self.current = Some(Row::from_parts(number, line, text_offset));
                return Ok(());
            }
        }
    }

    /// Takes the current row and pre-reads the next one. `None` once the
    /// stream is at `end`.
    pub fn next_row(&mut self) -> io::Result<Option<Row>> {
        let row = self.current.take();
        if row.is_some() {
            self.move_next()?;
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const BUF: usize = 8 * 1024;

    #[test]
    fn yields_rows_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.tmp");
        fs::write(&path, "1. Apple\n415. Apple\n2. Banana is yellow\n").unwrap();

        let mut stream = ChunkStream::open(&path, BUF).unwrap();
        assert!(stream.has_data());

        let mut numbers = Vec::new();
        while let Some(row) = stream.next_row().unwrap() {
            numbers.push(row.number());
        }
        assert_eq!(numbers, vec![1, 415, 2]);
        assert!(!stream.has_data());
    }

    #[test]
    fn skips_blank_and_unparsable_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.tmp");
        fs::write(&path, "InvalidLine\n1. First\n\n123 NoDot\n2. Second\n").unwrap();

        let mut stream = ChunkStream::open(&path, BUF).unwrap();
        let mut lines = Vec::new();
        while let Some(row) = stream.next_row().unwrap() {
            lines.push(row.line().to_string());
        }
        assert_eq!(lines, vec!["1. First", "2. Second"]);
    }

    #[test]
    fn empty_file_starts_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.tmp");
        fs::write(&path, "").unwrap();

        let mut stream = ChunkStream::open(&path, BUF).unwrap();
        assert!(!stream.has_data());
        assert!(stream.next_row().unwrap().is_none());
    }

    #[test]
    fn junk_only_file_starts_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.tmp");
        fs::write(&path, "nope\nstill nope\n").unwrap();

        let stream = ChunkStream::open(&path, BUF).unwrap();
        assert!(!stream.has_data());
    }

    #[test]
    fn invalid_utf8_is_a_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tmp");
        fs::write(&path, b"1. ok\n\xff\xfe broken\n2. never reached\n").unwrap();

        let mut stream = ChunkStream::open(&path, BUF).unwrap();
        assert_eq!(stream.current().unwrap().line(), "1. ok");
        assert!(stream.next_row().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ChunkStream::open(&dir.path().join("absent.tmp"), BUF).is_err());
    }

    #[test]
    fn handles_crlf_terminators() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crlf.tmp");
        fs::write(&path, "1. Apple\r\n2. Banana\r\n").unwrap();

        let mut stream = ChunkStream::open(&path, BUF).unwrap();
        let row = stream.next_row().unwrap().unwrap();
        assert_eq!(row.line(), "1. Apple");
        assert_eq!(row.text(), b"Apple");
    }
}
