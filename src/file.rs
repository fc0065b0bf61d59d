//! Opening PAF files from paths, handles or stdin, with transparent gzip
//! decompression.
//!
//! A [`PafFile`](PafFile) is either closed or open. Path and stdin sources
//! start closed and are opened with [`open()`](PafFile::open); stdin is also
//! opened automatically on the first read. Compression is detected from the
//! first two bytes (the gzip magic number `1F 8B`), never from the file name.
//!
//! # Example
//!
//! ```no_run
//! use paf_io::PafFile;
//!
//! let mut paf = PafFile::new("aln.paf.gz");
//! paf.open().unwrap();
//!
//! while let Some(record) = paf.next() {
//!     let record = record.unwrap();
//!     if record.is_primary().unwrap_or(false) {
//!         println!("{}\t{:.3}", record.qname, record.blast_identity());
//!     }
//! }
//!
//! // reading the file again
//! paf.open().unwrap();
//! assert!(paf.next().is_some());
//! paf.close();
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::bufread;
use flate2::read::MultiGzDecoder;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::reader::{Reader, RecordSet, BUFSIZE};
use crate::record::PafRecord;

/// The first two bytes of any gzip stream
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Path argument that stands for standard input
pub const STDIN_PATH: &str = "-";

/// Reads up to `n` bytes from the start of `reader`. Fewer bytes are
/// returned if the input is shorter.
pub fn first_n_bytes<R: Read>(reader: R, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    reader.take(n as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Checks whether the data at the current position of `reader` starts with
/// the gzip magic number. The position is restored afterwards.
///
/// ```
/// use std::io::Cursor;
/// use paf_io::file::is_compressed;
///
/// assert!(is_compressed(Cursor::new(b"\x1f\x8b\x08")).unwrap());
/// assert!(!is_compressed(Cursor::new(b"read1\t")).unwrap());
/// ```
pub fn is_compressed<R: Read + Seek>(mut reader: R) -> io::Result<bool> {
    let start = reader.stream_position()?;
    let magic = first_n_bytes(&mut reader, GZIP_MAGIC.len())?;
    reader.seek(SeekFrom::Start(start))?;
    Ok(magic == GZIP_MAGIC)
}

trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Non-seekable source whose first bytes were inspected without consuming them
type Peeked = buffer_redux::BufReader<Box<dyn Read + Send>>;

/// The byte source of an open file
enum Stream {
    Plain(File),
    Gzip(MultiGzDecoder<File>),
    Peeked(Peeked),
    PeekedGz(bufread::MultiGzDecoder<Peeked>),
    Handle(Box<dyn Read + Send>),
    Seekable(Box<dyn ReadSeek + Send>),
}

impl Stream {
    fn is_seekable(&self) -> bool {
        matches!(
            self,
            Stream::Plain(_) | Stream::Gzip(_) | Stream::Seekable(_)
        )
    }

    /// Moves back to the start of the data. Gzip streams are re-wound at
    /// the file level and decoded again from the start.
    fn rewind(self) -> io::Result<Stream> {
        Ok(match self {
            Stream::Plain(mut f) => {
                f.seek(SeekFrom::Start(0))?;
                Stream::Plain(f)
            }
            Stream::Gzip(dec) => {
                let mut f = dec.into_inner();
                f.seek(SeekFrom::Start(0))?;
                Stream::Gzip(MultiGzDecoder::new(f))
            }
            Stream::Seekable(mut h) => {
                h.seek(SeekFrom::Start(0))?;
                Stream::Seekable(h)
            }
            _ => return Err(not_seekable()),
        })
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(r) => r.read(buf),
            Stream::Gzip(r) => r.read(buf),
            Stream::Peeked(r) => r.read(buf),
            Stream::PeekedGz(r) => r.read(buf),
            Stream::Handle(r) => r.read(buf),
            Stream::Seekable(r) => r.read(buf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Path(PathBuf),
    Stdin,
    Handle,
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "PAF file is closed")
}

fn not_seekable() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "cannot reopen a PAF source that is not seekable",
    )
}

fn open_path(path: &Path, capacity: usize) -> io::Result<Reader<Stream>> {
    let mut file = File::open(path)?;
    let stream = if is_compressed(&mut file)? {
        debug!("{}: gzip compressed", path.display());
        Stream::Gzip(MultiGzDecoder::new(file))
    } else {
        debug!("{}: not compressed", path.display());
        Stream::Plain(file)
    };
    Ok(Reader::with_capacity(stream, capacity))
}

fn open_stdin(capacity: usize) -> io::Result<Reader<Stream>> {
    open_peeked("stdin", io::stdin(), capacity)
}

/// Chooses between gzip and plain reading for a source that cannot seek
/// back, based on its first two bytes. These are buffered, not consumed.
fn open_peeked<R>(name: &str, reader: R, capacity: usize) -> io::Result<Reader<Stream>>
where
    R: Read + Send + 'static,
{
    let source: Box<dyn Read + Send> = Box::new(reader);
    let mut buf = buffer_redux::BufReader::with_capacity(capacity, source);
    while buf.buffer().len() < GZIP_MAGIC.len() {
        match buf.read_into_buf() {
            Ok(0) => break,
            Ok(_) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let stream = if buf.buffer().starts_with(&GZIP_MAGIC) {
        debug!("{}: gzip compressed", name);
        Stream::PeekedGz(bufread::MultiGzDecoder::new(buf))
    } else {
        debug!("{}: not compressed", name);
        Stream::Peeked(buf)
    };
    Ok(Reader::with_capacity(stream, capacity))
}

/// A PAF file, stdin or adopted handle that can be opened, read, reopened
/// and closed.
///
/// The source is released when the file is closed or dropped.
pub struct PafFile {
    source: Source,
    reader: Option<Reader<Stream>>,
    capacity: usize,
}

impl PafFile {
    /// Creates a closed `PafFile` for the given path. No I/O is done until
    /// [`open()`](PafFile::open) is called. The path `-` stands for stdin.
    pub fn new<P: AsRef<Path>>(path: P) -> PafFile {
        let path = path.as_ref();
        let source = if path == Path::new(STDIN_PATH) {
            Source::Stdin
        } else {
            Source::Path(path.to_owned())
        };
        PafFile {
            source,
            reader: None,
            capacity: BUFSIZE,
        }
    }

    /// Creates a closed `PafFile` reading from stdin. Stdin is opened
    /// automatically when reading.
    pub fn stdin() -> PafFile {
        PafFile::new(STDIN_PATH)
    }

    /// Creates and opens a `PafFile` for the given path.
    ///
    /// ```no_run
    /// use paf_io::PafFile;
    ///
    /// let mut paf = PafFile::from_path("aln.paf").unwrap();
    /// let records: Result<Vec<_>, _> = paf.records().collect();
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<PafFile> {
        let mut f = PafFile::new(path);
        f.open()?;
        Ok(f)
    }

    /// Adopts an already open, non-seekable handle. The file starts open and
    /// can neither be reopened while open nor after it was closed. The data
    /// is read as is, without checking for compression.
    ///
    /// ```
    /// use paf_io::PafFile;
    ///
    /// let data = b"q\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60\n";
    /// let mut paf = PafFile::from_reader(&data[..]);
    /// assert!(!paf.is_closed());
    /// assert_eq!(paf.next().unwrap().unwrap().qname, "q");
    /// assert!(paf.next().is_none());
    /// ```
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> PafFile {
        PafFile {
            source: Source::Handle,
            reader: Some(Reader::new(Stream::Handle(Box::new(reader)))),
            capacity: BUFSIZE,
        }
    }

    /// Adopts an already open, seekable handle. Calling
    /// [`open()`](PafFile::open) on the open file rewinds it to the start.
    pub fn from_seekable<R: Read + Seek + Send + 'static>(reader: R) -> PafFile {
        PafFile {
            source: Source::Handle,
            reader: Some(Reader::new(Stream::Seekable(Box::new(reader)))),
            capacity: BUFSIZE,
        }
    }

    /// Sets the initial buffer capacity (default: 64 KiB). The minimum
    /// allowed capacity is 3. If the file is already open, the buffer is
    /// replaced, so this should be called before reading.
    pub fn with_capacity(mut self, capacity: usize) -> PafFile {
        assert!(capacity >= 3);
        self.capacity = capacity;
        self.reader = self
            .reader
            .take()
            .map(|r| Reader::with_capacity(r.into_inner(), capacity));
        self
    }

    /// Opens the file if it is closed. If it is already open, the source is
    /// rewound so that the next read returns the first record again. This
    /// only works for seekable sources (regular files, gzip files and
    /// seekable handles); for stdin and other handles an error of kind
    /// `io::ErrorKind::Unsupported` is returned.
    ///
    /// A gzip file is rewound by seeking the compressed file to the start
    /// and decoding it again. If rewinding fails, the file is closed.
    pub fn open(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            if !reader.get_ref().is_seekable() {
                self.reader = Some(reader);
                return Err(not_seekable().into());
            }
            trace!("rewinding {}", self);
            let stream = reader.into_inner().rewind()?;
            self.reader = Some(Reader::with_capacity(stream, self.capacity));
            return Ok(());
        }

        let reader = match self.source {
            Source::Path(ref path) => open_path(path, self.capacity)?,
            Source::Stdin => open_stdin(self.capacity)?,
            Source::Handle => {
                return Err(Error::from(io::Error::new(
                    io::ErrorKind::Other,
                    "cannot reopen a closed handle",
                )))
            }
        };
        self.reader = Some(reader);
        Ok(())
    }

    /// Closes the file, releasing the source. Closing a closed file has no
    /// effect.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            trace!("closed {}", self);
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// The path of the file, `-` for stdin, or `None` for adopted handles.
    pub fn path(&self) -> Option<&Path> {
        match self.source {
            Source::Path(ref p) => Some(p),
            Source::Stdin => Some(Path::new(STDIN_PATH)),
            Source::Handle => None,
        }
    }

    /// Reads and decodes the next record. Returns `None` at the end of the
    /// input.
    ///
    /// Reading from a closed file returns an error of kind
    /// `io::ErrorKind::NotConnected`, except for stdin, which is opened
    /// automatically.
    pub fn next(&mut self) -> Option<Result<PafRecord>> {
        try_opt!(self.ensure_open());
        self.reader.as_mut().and_then(|r| r.next())
    }

    /// Like [`Reader::read_record_set`](Reader::read_record_set).
    pub fn read_record_set(&mut self, rset: &mut RecordSet) -> Option<Result<()>> {
        try_opt!(self.ensure_open());
        self.reader.as_mut().and_then(|r| r.read_record_set(rset))
    }

    /// Returns an iterator over the remaining records. Iteration stops after
    /// the first error that is not a decoding error (e.g. if the file is
    /// closed).
    pub fn records(&mut self) -> PafRecords {
        PafRecords {
            file: self,
            done: false,
        }
    }

    fn ensure_open(&mut self) -> Result<()> {
        if self.reader.is_none() {
            if self.source == Source::Stdin {
                return self.open();
            }
            return Err(closed_error().into());
        }
        Ok(())
    }
}

impl fmt::Display for PafFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.path() {
            Some(p) => write!(f, "{}", p.display()),
            None => write!(f, "<handle>"),
        }
    }
}

impl fmt::Debug for PafFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PafFile")
            .field("source", &self.source)
            .field("closed", &self.is_closed())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Borrowed iterator over the records of a `PafFile`
pub struct PafRecords<'a> {
    file: &'a mut PafFile,
    done: bool,
}

impl<'a> Iterator for PafRecords<'a> {
    type Item = Result<PafRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.file.next();
        if let Some(Err(ref e)) = res {
            if !e.is_decode_error() {
                self.done = true;
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const PAF: &[u8] = b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60\nq2\t10\t0\t10\t-\tt\t20\t0\t10\t10\t10\t60\n";

    #[test]
    fn first_bytes() {
        assert_eq!(first_n_bytes(&b"abc"[..], 2).unwrap(), b"ab");
        assert_eq!(first_n_bytes(&b"a"[..], 2).unwrap(), b"a");
        assert_eq!(first_n_bytes(&b""[..], 2).unwrap(), b"");
    }

    #[test]
    fn compressed_restores_position() {
        let mut c = Cursor::new(b"xx\x1f\x8b".to_vec());
        c.set_position(2);
        assert!(is_compressed(&mut c).unwrap());
        assert_eq!(c.position(), 2);
        assert!(!is_compressed(Cursor::new(b"\x1f")).unwrap());
    }

    #[test]
    fn stdin_path() {
        assert_eq!(PafFile::new("-").source, Source::Stdin);
        assert_eq!(PafFile::stdin().path(), Some(Path::new("-")));
        assert!(PafFile::stdin().is_closed());
    }

    #[test]
    fn handle_rewind() {
        let mut paf = PafFile::from_seekable(Cursor::new(PAF));
        assert_eq!(paf.next().unwrap().unwrap().qname, "q1");
        paf.open().unwrap();
        let names: Vec<_> = paf.records().map(|r| r.unwrap().qname).collect();
        assert_eq!(names, vec!["q1", "q2"]);
    }

    #[test]
    fn handle_not_reopenable() {
        let mut paf = PafFile::from_reader(PAF);
        let e = paf.open().unwrap_err();
        assert!(matches!(e.kind(), crate::ErrorKind::Io(e) if e.kind() == io::ErrorKind::Unsupported));
        // still open
        assert_eq!(paf.next().unwrap().unwrap().qname, "q1");

        paf.close();
        assert!(paf.is_closed());
        assert!(paf.open().is_err());
        assert!(paf.next().unwrap().is_err());
        assert_eq!(paf.path(), None);
    }

    #[test]
    fn small_capacity() {
        let mut paf = PafFile::from_reader(PAF).with_capacity(3);
        assert_eq!(paf.records().count(), 2);
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(vec![], Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    // delivers at most one byte per read() call
    struct OneByte<R>(R);

    impl<R: Read> Read for OneByte<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(1);
            self.0.read(&mut buf[..n])
        }
    }

    fn read_peeked<R: Read + Send + 'static>(reader: R, cap: usize) -> (bool, Vec<String>) {
        let mut reader = open_peeked("test", reader, cap).unwrap();
        let is_gz = matches!(reader.get_ref(), Stream::PeekedGz(_));
        let names = reader.records().map(|r| r.unwrap().qname).collect();
        (is_gz, names)
    }

    #[test]
    fn peeked_source() {
        let names = vec!["q1".to_string(), "q2".to_string()];
        for cap in 3..40 {
            assert_eq!(read_peeked(Cursor::new(PAF), cap), (false, names.clone()));
            assert_eq!(read_peeked(Cursor::new(gzip(PAF)), cap), (true, names.clone()));
            assert_eq!(read_peeked(OneByte(Cursor::new(PAF)), cap), (false, names.clone()));
            assert_eq!(
                read_peeked(OneByte(Cursor::new(gzip(PAF))), cap),
                (true, names.clone())
            );
        }
    }

    #[test]
    fn peeked_short_input() {
        // too short for the magic number, read as plain text
        let mut reader = open_peeked("test", Cursor::new(b"\x1f".to_vec()), 3).unwrap();
        assert!(matches!(reader.get_ref(), Stream::Peeked(_)));
        assert_eq!(reader.next_line().unwrap().unwrap(), &b"\x1f"[..]);
        assert!(reader.next_line().is_none());

        let mut reader = open_peeked("test", Cursor::new(b"q".to_vec()), 3).unwrap();
        assert!(matches!(reader.get_ref(), Stream::Peeked(_)));
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::ErrorKind::MalformattedRecord { num_fields: 1, line, .. } if line == "q"
        ));

        let mut reader = open_peeked("test", Cursor::new(Vec::<u8>::new()), 3).unwrap();
        assert!(matches!(reader.get_ref(), Stream::Peeked(_)));
        assert!(reader.next().is_none());
    }
}
