//! Buffered PAF reader working on any `io::Read` source.
//!
//! # Example
//!
//! ```
//! use paf_io::Reader;
//!
//! let input = b"q1\t100\t0\t90\t+\tt1\t1000\t10\t100\t80\t90\t60
//! q2\t100\t0\t90\t-\tt1\t1000\t10\t100\t80\t90\t60\ttp:A:P
//! ";
//!
//! let mut reader = Reader::new(&input[..]);
//! let mut output = vec![];
//!
//! while let Some(record) = reader.next() {
//!     let record = record.expect("Error reading record");
//!     println!("query: {}", record.qname);
//!     record.write(&mut output).unwrap();
//! }
//!
//! assert_eq!(input, output.as_slice());
//! ```
//!
//! # Details on parsing behaviour
//!
//! * The parser handles UNIX (LF) and Windows (CRLF) line endings.
//! * Each line is one record; a last line without terminator is read as
//!   well. Empty lines are not skipped, they result in a
//!   `MalformattedRecord` error.
//! * Errors that concern the content of a line carry its
//!   [`Position`](Position). They do not end the stream, the next call to
//!   `next()` continues with the following line. The caller decides whether
//!   to abort or to skip.
//! * I/O errors and `BufferLimit` end the stream: `next()` returns `None`
//!   afterwards.
//! * Empty input results in `None` being returned immediately.

use std::fs::File;
use std::io::{self, BufRead, Seek};
use std::iter;
use std::path::Path;
use std::slice;

use memchr::memchr;

use super::*;
use crate::error::{Error, ErrorKind, Result};
use crate::policy::{BufPolicy, LineLimit};
use crate::record::PafRecord;

type DefaultPolicy = LineLimit;

/// Default buffer size (64 KiB)
pub const BUFSIZE: usize = 64 * 1024;

/// Parser for PAF lines from any `io::Read` source.
pub struct Reader<R: io::Read, P = DefaultPolicy> {
    buffer: buffer_redux::BufReader<R>,
    buf_pos: BufferPosition,
    position: Position,
    next_byte: u64,
    search_pos: usize,
    has_line: bool,
    finished: bool,
    buf_policy: P,
}

impl<R> Reader<R, DefaultPolicy>
where
    R: io::Read,
{
    /// Creates a new reader with the default buffer size of 64 KiB
    ///
    /// # Example:
    ///
    /// ```
    /// use paf_io::Reader;
    /// let paf = b"q\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60";
    ///
    /// let mut reader = Reader::new(&paf[..]);
    /// let record = reader.next().unwrap().unwrap();
    /// assert_eq!(record.tname, "t");
    /// ```
    #[inline]
    pub fn new(reader: R) -> Reader<R, DefaultPolicy> {
        Reader::with_capacity(reader, BUFSIZE)
    }

    /// Creates a new reader with a given buffer capacity. The minimum allowed
    /// capacity is 3. Lines longer than
    /// [`MAX_BUFSIZE`](crate::policy::MAX_BUFSIZE) result in an error, use
    /// [`set_policy()`](#method.set_policy) to change this.
    #[inline]
    pub fn with_capacity(reader: R, capacity: usize) -> Reader<R, DefaultPolicy> {
        assert!(capacity >= 3);
        Reader {
            buffer: buffer_redux::BufReader::with_capacity(capacity, reader),
            buf_pos: BufferPosition { start: 0, end: 0 },
            position: Position::new(0, 0),
            next_byte: 0,
            search_pos: 0,
            has_line: false,
            finished: false,
            buf_policy: LineLimit::default(),
        }
    }
}

impl Reader<File, DefaultPolicy> {
    /// Creates a reader from a file path. The file is read as is, use
    /// [`PafFile`](crate::PafFile) for transparent decompression.
    ///
    /// # Example:
    ///
    /// ```no_run
    /// use paf_io::Reader;
    ///
    /// let mut reader = Reader::from_path("aln.paf").unwrap();
    ///
    /// // (... do something with the reader)
    /// ```
    #[inline]
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Reader<File>> {
        File::open(path).map(Reader::new)
    }
}

impl<R, P> Reader<R, P>
where
    R: io::Read,
    P: BufPolicy,
{
    /// Returns a reader with the given buffer policy applied
    #[inline]
    pub fn set_policy<T: BufPolicy>(self, policy: T) -> Reader<R, T> {
        Reader {
            buffer: self.buffer,
            buf_pos: self.buf_pos,
            position: self.position,
            next_byte: self.next_byte,
            search_pos: self.search_pos,
            has_line: self.has_line,
            finished: self.finished,
            buf_policy: policy,
        }
    }

    /// Returns the `BufPolicy` of the reader
    #[inline]
    pub fn policy(&self) -> &P {
        &self.buf_policy
    }

    /// Reads and decodes the next line. Returns `None` at the end of the
    /// input.
    ///
    /// # Example:
    ///
    /// ```no_run
    /// use paf_io::Reader;
    ///
    /// let mut reader = Reader::from_path("aln.paf").unwrap();
    ///
    /// while let Some(record) = reader.next() {
    ///     let record = record.unwrap();
    ///     println!("{}\t{}", record.qname, record.blast_identity());
    /// }
    /// ```
    pub fn next(&mut self) -> Option<Result<PafRecord>> {
        if !try_opt!(self.advance()) {
            return None;
        }
        Some(PafRecord::from_line(self.line()).map_err(|e| e.with_position(&self.position)))
    }

    /// Returns the next line without decoding it. The line terminator
    /// (`\n` or `\r\n`) is removed.
    pub fn next_line(&mut self) -> Option<Result<&[u8]>> {
        if !try_opt!(self.advance()) {
            return None;
        }
        Some(Ok(self.line()))
    }

    /// Updates a [RecordSet](struct.RecordSet.html) with new lines. Lines are
    /// copied over until the amount of data in the set reaches the capacity
    /// of the internal buffer. Old data will be erased. Returns `None` if the
    /// input reached its end.
    pub fn read_record_set(&mut self, rset: &mut RecordSet) -> Option<Result<()>> {
        rset.clear();
        let limit = self.buffer.capacity();
        loop {
            match self.advance() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Some(Err(e)),
            }
            rset.push(&self.position, self.line());
            if rset.buffer.len() >= limit {
                break;
            }
        }
        if rset.is_empty() {
            None
        } else {
            Some(Ok(()))
        }
    }

    /// Returns the current position, which is the position of the line
    /// returned by the last call to `next()`.
    /// If `next()` has not yet been called, `None` will be returned.
    ///
    /// # Example
    ///
    /// ```
    /// use paf_io::{Reader, Position};
    ///
    /// let paf = b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60
    /// q2\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60";
    ///
    /// let mut reader = Reader::new(&paf[..]);
    ///
    /// reader.next().unwrap().unwrap();
    /// reader.next().unwrap().unwrap();
    ///
    /// assert_eq!(reader.position(), Some(&Position::new(2, 32)));
    /// ```
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        if self.position.line == 0 {
            return None;
        }
        Some(&self.position)
    }

    /// Returns a borrowed iterator over all PAF records.
    ///
    /// # Example
    ///
    /// ```
    /// use paf_io::Reader;
    ///
    /// let paf = b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60
    /// q2\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60";
    ///
    /// let mut reader = Reader::new(&paf[..]);
    ///
    /// let names: Vec<_> = reader
    ///     .records()
    ///     .map(|r| r.unwrap().qname)
    ///     .collect();
    ///
    /// assert_eq!(names, vec!["q1", "q2"]);
    /// ```
    pub fn records(&mut self) -> RecordsIter<R, P> {
        RecordsIter { rdr: self }
    }

    /// Returns an iterator over all PAF records like `Reader::records()`,
    /// but with the difference that it owns the underlying reader.
    pub fn into_records(self) -> RecordsIntoIter<R, P> {
        RecordsIntoIter { rdr: self }
    }

    /// Returns a reference to the underlying reader.
    #[inline]
    pub fn get_ref(&self) -> &R {
        self.buffer.get_ref()
    }

    /// Unwraps the underlying reader. Buffered data is lost.
    #[inline]
    pub fn into_inner(self) -> R {
        self.buffer.into_inner()
    }

    #[inline(always)]
    fn get_buf(&self) -> &[u8] {
        self.buffer.buffer()
    }

    #[inline]
    fn line(&self) -> &[u8] {
        trim_cr(&self.get_buf()[self.buf_pos.start..self.buf_pos.end])
    }

    // Moves to the next line; errors are final.
    fn advance(&mut self) -> Result<bool> {
        let res = self.find_line();
        if res.is_err() {
            self.finished = true;
        }
        res
    }

    /// Searches the end of the next line and returns true if found,
    /// false if the input is exhausted.
    fn find_line(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }

        if self.has_line {
            // skip the previous line including '\n'
            self.buf_pos.start = self.buf_pos.end + 1;
            self.has_line = false;
        }
        self.search_pos = self.buf_pos.start;

        loop {
            if let Some(i) = memchr(b'\n', &self.get_buf()[self.search_pos..]) {
                self.buf_pos.end = self.search_pos + i;
                break;
            }
            self.search_pos = self.get_buf().len();

            if self.buf_pos.start == 0 && self.search_pos == self.buffer.capacity() {
                // line does not fit
                self.grow()?;
            } else {
                self.make_room();
            }

            if fill_buf(&mut self.buffer)? == 0 {
                // EOF reached
                self.finished = true;
                let bufsize = self.get_buf().len();
                if self.buf_pos.start == bufsize {
                    return Ok(false);
                }
                // last line without terminator
                self.buf_pos.end = bufsize;
                break;
            }
        }

        self.has_line = true;
        self.position = Position::new(self.position.line + 1, self.next_byte);
        self.next_byte += (self.buf_pos.end + 1 - self.buf_pos.start) as u64;
        Ok(true)
    }

    // grow buffer
    fn grow(&mut self) -> Result<()> {
        let cap = self.buffer.capacity();
        let new_size = self
            .buf_policy
            .grow_to(cap)
            .ok_or_else(|| Error::new(ErrorKind::BufferLimit))?;
        let additional = new_size - cap;
        self.buffer.reserve(additional);
        Ok(())
    }

    // move incomplete bytes to start of buffer
    fn make_room(&mut self) {
        let consumed = self.buf_pos.start;
        self.buffer.consume(consumed);
        self.buffer.make_room();
        self.buf_pos.start = 0;
        self.search_pos -= consumed;
    }

    fn reset(&mut self) {
        self.buf_pos = BufferPosition { start: 0, end: 0 };
        self.position = Position::new(0, 0);
        self.next_byte = 0;
        self.search_pos = 0;
        self.has_line = false;
        self.finished = false;
    }
}

impl<R, P> Reader<R, P>
where
    R: io::Read + Seek,
    P: BufPolicy,
{
    /// Seeks back to the start of the input, so that the next call to
    /// `next()` returns the first record again. The buffer is discarded.
    ///
    /// # Example
    ///
    /// ```
    /// use paf_io::Reader;
    /// use std::io::Cursor;
    ///
    /// let paf = b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60";
    ///
    /// let mut reader = Reader::new(Cursor::new(&paf[..]));
    ///
    /// let first = reader.next().unwrap().unwrap();
    /// assert!(reader.next().is_none());
    ///
    /// reader.rewind().unwrap();
    /// assert_eq!(reader.next().unwrap().unwrap(), first);
    /// ```
    pub fn rewind(&mut self) -> Result<()> {
        self.buffer.seek(io::SeekFrom::Start(0))?;
        self.reset();
        Ok(())
    }
}

/// Borrowed iterator of `PafRecord`
pub struct RecordsIter<'a, R, P = DefaultPolicy>
where
    P: 'a,
    R: io::Read + 'a,
{
    rdr: &'a mut Reader<R, P>,
}

impl<'a, R, P> Iterator for RecordsIter<'a, R, P>
where
    P: BufPolicy + 'a,
    R: io::Read + 'a,
{
    type Item = Result<PafRecord>;
    fn next(&mut self) -> Option<Self::Item> {
        self.rdr.next()
    }
}

/// Iterator of `PafRecord` that owns the underlying reader
pub struct RecordsIntoIter<R: io::Read, P = DefaultPolicy> {
    rdr: Reader<R, P>,
}

impl<R, P> Iterator for RecordsIntoIter<R, P>
where
    P: BufPolicy,
    R: io::Read,
{
    type Item = Result<PafRecord>;
    fn next(&mut self) -> Option<Self::Item> {
        self.rdr.next()
    }
}

/// Holds line number and byte offset of a PAF line
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    line: u64,
    byte: u64,
}

impl Position {
    pub fn new(line: u64, byte: u64) -> Position {
        Position { line, byte }
    }

    /// Line number (starting with 1)
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Byte offset of the line start within the (decompressed) input
    pub fn byte(&self) -> u64 {
        self.byte
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct BufferPosition {
    /// index of the first byte of the line
    start: usize,
    /// index of '\n', or of the buffer end for a last line without terminator
    end: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LinePosition {
    start: usize,
    end: usize,
    pos: Position,
}

/// Set of raw PAF lines that owns its buffer and knows the position of each
/// line in the input. Lines are only decoded when iterating.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordSet {
    buffer: Vec<u8>,
    lines: Vec<LinePosition>,
}

impl RecordSet {
    /// Number of lines in the set
    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterates over the raw lines together with their positions.
    pub fn lines(&self) -> Lines {
        Lines {
            buffer: &self.buffer,
            pos: self.lines.iter(),
        }
    }

    /// Iterates over the decoded records.
    pub fn records(&self) -> RecordSetIter {
        RecordSetIter { lines: self.lines() }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.lines.clear();
    }

    fn push(&mut self, pos: &Position, line: &[u8]) {
        let start = self.buffer.len();
        self.buffer.extend_from_slice(line);
        self.lines.push(LinePosition {
            start,
            end: self.buffer.len(),
            pos: pos.clone(),
        });
    }
}

impl<'a> iter::IntoIterator for &'a RecordSet {
    type Item = Result<PafRecord>;
    type IntoIter = RecordSetIter<'a>;
    fn into_iter(self) -> Self::IntoIter {
        self.records()
    }
}

/// Iterator over the raw lines of a record set
pub struct Lines<'a> {
    buffer: &'a [u8],
    pos: slice::Iter<'a, LinePosition>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (&'a Position, &'a [u8]);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.pos
            .next()
            .map(|p| (&p.pos, &self.buffer[p.start..p.end]))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pos.size_hint()
    }
}

impl<'a> ExactSizeIterator for Lines<'a> {}

/// Iterator over the decoded records of a record set
pub struct RecordSetIter<'a> {
    lines: Lines<'a>,
}

impl<'a> Iterator for RecordSetIter<'a> {
    type Item = Result<PafRecord>;

    fn next(&mut self) -> Option<Result<PafRecord>> {
        self.lines
            .next()
            .map(|(pos, line)| PafRecord::from_line(line).map_err(|e| e.with_position(pos)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lines.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAF: &[u8] = b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60\nq2\t10\t0\t10\t-\tt\t20\t0\t10\t10\t10\t60\n";

    #[test]
    fn raw_lines() {
        let mut reader = Reader::new(PAF);
        assert_eq!(
            reader.next_line().unwrap().unwrap(),
            &b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60"[..]
        );
        assert_eq!(reader.position(), Some(&Position::new(1, 0)));
        assert!(reader.next_line().unwrap().is_ok());
        assert_eq!(reader.position(), Some(&Position::new(2, 32)));
        assert!(reader.next_line().is_none());
        assert!(reader.next_line().is_none());
    }

    #[test]
    fn no_position_before_first_line() {
        let reader = Reader::new(PAF);
        assert_eq!(reader.position(), None);
    }

    #[test]
    fn empty_input() {
        let mut reader = Reader::new(&b""[..]);
        assert!(reader.next().is_none());
        assert_eq!(reader.position(), None);
    }

    #[test]
    fn record_set_positions() {
        let mut reader = Reader::new(PAF);
        let mut rset = RecordSet::default();
        reader.read_record_set(&mut rset).unwrap().unwrap();
        assert_eq!(rset.len(), 2);
        let pos: Vec<_> = rset.lines().map(|(p, _)| p.clone()).collect();
        assert_eq!(pos, vec![Position::new(1, 0), Position::new(2, 32)]);
        assert!(reader.read_record_set(&mut rset).is_none());
    }

    #[test]
    fn into_inner() {
        let reader = Reader::new(PAF);
        assert_eq!(reader.into_inner(), PAF);
    }
}
