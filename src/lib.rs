//! This library provides streaming reading of PAF (Pairwise mApping Format)
//! files, as written by [minimap2](https://github.com/lh3/minimap2) and other
//! aligners.
//!
//! Each line of a PAF file describes one alignment with 12 mandatory,
//! tab-separated columns, optionally followed by SAM-like tags
//! (`NM:i:12`, `tp:A:P`, ...). Lines are decoded into
//! [`PafRecord`](record::PafRecord) instances with typed fields and a map of
//! typed [`Tag`](tag::Tag)s.
//!
//! There are two ways of reading:
//!
//! * [`PafFile`](file::PafFile) opens paths and stdin, detects gzip
//!   compression from the content and supports closing and rewinding.
//! * [`Reader`](reader::Reader) decodes records from any `io::Read`
//!   instance.
//!
//! By default, a buffer of 64 KiB size is used. If a line is longer, the
//! buffer will automatically grow. How it grows can be configured, see
//! [below](#large-lines).
//!
//! # Example
//!
//! This code prints the query name and the identity of each primary
//! alignment:
//!
//! ```no_run
//! use paf_io::PafFile;
//!
//! let mut paf = PafFile::from_path("aln.paf.gz").unwrap();
//!
//! while let Some(record) = paf.next() {
//!     let record = record.expect("Error reading record");
//!     if record.is_primary() == Ok(true) {
//!         println!("{}\t{:.4}", record.qname, record.blast_identity());
//!     }
//! }
//! ```
//!
//! # Errors
//!
//! Errors that concern the content of a line (too few fields, invalid
//! numbers, invalid tags) contain the [`ErrorPosition`](error::ErrorPosition)
//! of the line. They do not end reading, the next call to `next()` continues
//! with the next line:
//!
//! ```
//! use paf_io::Reader;
//!
//! let paf = b"q1\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60
//! invalid line
//! q2\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60";
//!
//! let mut reader = Reader::new(&paf[..]);
//! let records: Vec<_> = reader.records().collect();
//!
//! assert!(records[0].is_ok());
//! let err = records[1].as_ref().unwrap_err();
//! assert_eq!(err.position().unwrap().position().unwrap().line(), 2);
//! assert!(records[2].is_ok());
//! ```
//!
//! # Large lines
//!
//! Each line must fit into the underlying buffer as a whole. It is possible
//! to configure the initial buffer size using `Reader::with_capacity()`.
//! If a line doesn't fit, the buffer doubles its size until 1 MiB, then
//! grows in steps of 1 MiB. Lines longer than 256 MiB result in
//! [`ErrorKind::BufferLimit`](error::ErrorKind::BufferLimit). The limit
//! can be changed using `set_policy()`:
//!
//! ```no_run
//! use paf_io::Reader;
//! use paf_io::policy::LineLimit;
//!
//! // lines without `cg` / `cs` tags are short
//! let policy = LineLimit::new(1 << 16);
//! let mut reader = Reader::from_path("input.paf").unwrap()
//!     .set_policy(policy);
//! // (...)
//! ```
//! For information on how to create a custom policy, refer to the
//! [`policy`](policy) module docs.
//!
//! # Parallel processing
//! Functions for parallel decoding can be found in the
//! [`parallel`](parallel/index.html) module

extern crate buffer_redux;
extern crate memchr;

#[macro_use]
extern crate serde_derive;
extern crate serde;

#[macro_use]
extern crate lazy_static;

use std::io;

macro_rules! try_opt {
    ($expr: expr) => {
        match $expr {
            Ok(item) => item,
            Err(e) => return Some(Err(::std::convert::From::from(e))),
        }
    };
}

pub mod error;
pub mod file;
pub mod parallel;
pub mod policy;
pub mod reader;
pub mod record;
pub mod strand;
pub mod tag;

pub use crate::error::{Error, ErrorKind, ErrorPosition, Result};
pub use crate::file::PafFile;
pub use crate::reader::{Position, Reader, RecordSet};
pub use crate::record::{AlignmentType, PafRecord, Tags};
pub use crate::strand::Strand;
pub use crate::tag::{Tag, TagType, TagValue};

/// Remove a final '\r' from a byte slice
#[inline]
fn trim_cr(line: &[u8]) -> &[u8] {
    if let Some((&b'\r', remaining)) = line.split_last() {
        remaining
    } else {
        line
    }
}

/// Makes sure the buffer is full after this call (unless EOF reached)
/// code adapted from `io::Read::read_exact`
fn fill_buf<R>(
    reader: &mut buffer_redux::BufReader<R, buffer_redux::policy::StdPolicy>,
) -> io::Result<usize>
where
    R: io::Read,
{
    let initial_size = reader.buffer().len();
    let mut num_read = 0;
    while initial_size + num_read < reader.capacity() {
        match reader.read_into_buf() {
            Ok(0) => break,
            Ok(n) => num_read += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(num_read)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cr_trimmed() {
        assert_eq!(trim_cr(b"abc\r"), b"abc");
        assert_eq!(trim_cr(b"abc"), b"abc");
        assert_eq!(trim_cr(b"\r\r"), b"\r");
        assert_eq!(trim_cr(b""), b"");
    }
}
