//! Buffer growth of the line reader.
//!
//! Each PAF line has to fit into the buffer of
//! [`Reader`](crate::reader::Reader) as a whole. Most lines are a few hundred
//! bytes, but `cg`/`cs` tags of long-read alignments can reach many
//! megabytes. If a line does not fit, the reader asks its `BufPolicy` for a
//! new buffer size.
//!
//! The default policy is [`LineLimit::default()`](LineLimit), which refuses
//! to grow beyond [`MAX_BUFSIZE`](MAX_BUFSIZE). Reading a longer line
//! results in `ErrorKind::BufferLimit` instead of exhausting memory on a
//! corrupt (e.g. newline-free) input.
//!
//! ```
//! use paf_io::Reader;
//! use paf_io::policy::LineLimit;
//!
//! let paf = b"q\t10\t0\t10\t+\tt\t20\t0\t10\t10\t10\t60\tcg:Z:10M\n";
//!
//! // no line may be longer than 32 bytes
//! let mut reader = Reader::with_capacity(&paf[..], 8)
//!     .set_policy(LineLimit::new(32));
//! assert!(reader.next().unwrap().is_err());
//!
//! let mut reader = Reader::with_capacity(&paf[..], 8)
//!     .set_policy(LineLimit::unlimited());
//! assert!(reader.next().unwrap().is_ok());
//! ```

/// Buffer size up to which the buffer doubles by default (1 MiB)
pub const DOUBLE_UNTIL: usize = 1 << 20;

/// Default maximum buffer size (256 MiB), which limits the length of a line
pub const MAX_BUFSIZE: usize = 1 << 28;

/// Decides how the buffer grows if a line does not fit.
///
/// Takes the current buffer size in bytes and returns the new size, which
/// must be larger. `None` means that the line is too long, and the reader
/// returns `ErrorKind::BufferLimit`.
///
/// Closures can be used as policies:
///
/// ```no_run
/// use paf_io::Reader;
///
/// // doubles without limit
/// let mut reader = Reader::from_path("aln.paf").unwrap()
///     .set_policy(|size: usize| size.checked_mul(2));
///
/// while let Some(record) = reader.next() {
///     println!("{}", record.unwrap().qname);
/// }
/// ```
pub trait BufPolicy {
    fn grow_to(&mut self, current_size: usize) -> Option<usize>;
}

impl<F> BufPolicy for F
where
    F: FnMut(usize) -> Option<usize>,
{
    #[inline]
    fn grow_to(&mut self, current_size: usize) -> Option<usize> {
        self(current_size)
    }
}

/// Doubles the buffer until it reaches `double_until` bytes, then grows in
/// steps of `double_until`. Growing beyond the maximum size fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLimit {
    double_until: usize,
    max_size: Option<usize>,
}

impl LineLimit {
    /// Limits the buffer (and thus the longest line, including its
    /// terminator) to `max_size` bytes.
    pub fn new(max_size: usize) -> LineLimit {
        LineLimit {
            double_until: DOUBLE_UNTIL,
            max_size: Some(max_size),
        }
    }

    /// No limit, lines of any length are read.
    pub fn unlimited() -> LineLimit {
        LineLimit {
            double_until: DOUBLE_UNTIL,
            max_size: None,
        }
    }

    /// Sets the size up to which the buffer doubles (minimum 1).
    pub fn double_until(mut self, size: usize) -> LineLimit {
        self.double_until = size.max(1);
        self
    }

    #[inline]
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }
}

impl Default for LineLimit {
    fn default() -> LineLimit {
        LineLimit::new(MAX_BUFSIZE)
    }
}

impl BufPolicy for LineLimit {
    fn grow_to(&mut self, current_size: usize) -> Option<usize> {
        let new_size = if current_size < self.double_until {
            current_size.checked_mul(2)?
        } else {
            current_size.checked_add(self.double_until)?
        };
        match self.max_size {
            Some(max) if new_size > max => {
                // a last step up to the limit itself
                if current_size < max {
                    Some(max)
                } else {
                    None
                }
            }
            _ => Some(new_size),
        }
    }
}
