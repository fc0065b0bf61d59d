use crate::reader::Position;
use crate::record::COLUMNS;
use crate::tag::{TagError, TagType};
use std::error;
use std::fmt;
use std::io;
use std::num::ParseIntError;
use std::str::Utf8Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Position of a decoding error within the file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorPosition {
    record_pos: Option<Position>,
    qname: Option<String>,
}

impl ErrorPosition {
    pub fn new(record_pos: Option<Position>, qname: Option<String>) -> Self {
        ErrorPosition { record_pos, qname }
    }

    /// Returns the position of the offending line. `None` is returned if the
    /// line was not decoded by a reader, but directly
    /// (e.g. using `PafRecord::from_str()`).
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.record_pos.as_ref()
    }

    /// Returns the query name of the record where the error occurred,
    /// if the first column could be read.
    #[inline]
    pub fn qname(&self) -> Option<&str> {
        self.qname.as_deref()
    }
}

impl fmt::Display for ErrorPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sep = "";
        if let Some(qname) = self.qname.as_ref() {
            write!(f, "record '{}'", qname)?;
            sep = " ";
        }
        if let Some(pos) = self.record_pos.as_ref() {
            write!(f, "{}at line {}", sep, pos.line())?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    /// `std::io::Error`, also used for reading from a closed file and for
    /// reopening a source that cannot be repositioned.
    Io(io::Error),
    /// Fewer than 12 tab-separated fields.
    MalformattedRecord {
        pos: ErrorPosition,
        /// The offending line (without line terminator)
        line: String,
        /// Number of fields found
        num_fields: usize,
    },
    /// The strand column (5th) is not one of `+`, `-`, `*`.
    InvalidStrand { pos: ErrorPosition, found: String },
    /// An integer column could not be parsed.
    InvalidField {
        pos: ErrorPosition,
        /// 0-based column index
        column: usize,
        /// Content of the column
        value: String,
        err: ParseIntError,
    },
    /// A tag is not in `TAG:TYPE:VALUE` format or the value does not match its
    /// type.
    InvalidTagFormat {
        pos: ErrorPosition,
        token: String,
        expected: Option<TagType>,
    },
    /// Unknown tag TYPE character.
    UnknownTagTypeChar {
        pos: ErrorPosition,
        token: String,
        found: char,
    },
    /// The line is not valid UTF-8.
    InvalidUtf8 { pos: ErrorPosition, err: Utf8Error },
    /// A line did not fit into the buffer, and `policy::BufPolicy::grow_to()`
    /// returned `None`. With the default policy, this happens for lines
    /// longer than `policy::MAX_BUFSIZE`.
    BufferLimit,
}

impl ErrorKind {
    /// Returns the position for this error, if one exists.
    pub fn position(&self) -> Option<&ErrorPosition> {
        match self {
            ErrorKind::MalformattedRecord { pos, .. }
            | ErrorKind::InvalidStrand { pos, .. }
            | ErrorKind::InvalidField { pos, .. }
            | ErrorKind::InvalidTagFormat { pos, .. }
            | ErrorKind::UnknownTagTypeChar { pos, .. }
            | ErrorKind::InvalidUtf8 { pos, .. } => Some(pos),
            _ => None,
        }
    }

    fn position_mut(&mut self) -> Option<&mut ErrorPosition> {
        match self {
            ErrorKind::MalformattedRecord { pos, .. }
            | ErrorKind::InvalidStrand { pos, .. }
            | ErrorKind::InvalidField { pos, .. }
            | ErrorKind::InvalidTagFormat { pos, .. }
            | ErrorKind::UnknownTagTypeChar { pos, .. }
            | ErrorKind::InvalidUtf8 { pos, .. } => Some(pos),
            _ => None,
        }
    }
}

/// PAF decoding error
#[derive(Debug)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl Error {
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    /// Returns a reference to the [`ErrorKind`](ErrorKind)
    /// associated with the error.
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the [`ErrorKind`](ErrorKind) associated with
    /// the error, thereby consuming the error.
    #[inline]
    pub fn into_kind(self) -> ErrorKind {
        *self.kind
    }

    /// Returns the [`ErrorPosition`](ErrorPosition) of
    /// the error within file.
    #[inline]
    pub fn position(&self) -> Option<&ErrorPosition> {
        self.kind().position()
    }

    /// Is this a decoding error (as opposed to an I/O error)? Readers continue
    /// with the next line after decoding errors.
    pub fn is_decode_error(&self) -> bool {
        self.position().is_some()
    }

    pub(crate) fn with_qname(mut self, qname: &str) -> Self {
        if let Some(pos) = self.kind.position_mut() {
            pos.qname = Some(qname.to_string());
        }
        self
    }

    pub(crate) fn with_position(mut self, record_pos: &Position) -> Self {
        if let Some(pos) = self.kind.position_mut() {
            pos.record_pos = Some(record_pos.clone());
        }
        self
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::new(ErrorKind::Io(e))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err.into_kind() {
            ErrorKind::Io(e) => e,
            kind => io::Error::new(io::ErrorKind::InvalidData, Error::new(kind)),
        }
    }
}

impl From<TagError> for Error {
    fn from(e: TagError) -> Error {
        let kind = match e {
            TagError::InvalidFormat { token, expected } => ErrorKind::InvalidTagFormat {
                pos: ErrorPosition::default(),
                token,
                expected,
            },
            TagError::UnknownTypeChar { token, found } => ErrorKind::UnknownTagTypeChar {
                pos: ErrorPosition::default(),
                token,
                found,
            },
        };
        Error::new(kind)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::InvalidField { ref err, .. } => Some(err),
            ErrorKind::InvalidUtf8 { ref err, .. } => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ErrorKind::Io(ref e) => return e.fmt(f),
            ErrorKind::MalformattedRecord { num_fields, .. } => write!(
                f,
                "PAF parse error: expected {} fields, but got {}",
                COLUMNS.len(),
                num_fields
            )?,
            ErrorKind::InvalidStrand { found, .. } => write!(
                f,
                "PAF parse error: invalid strand '{}', expected '+', '-' or '*'",
                found.escape_default()
            )?,
            ErrorKind::InvalidField {
                column, value, err, ..
            } => write!(
                f,
                "PAF parse error: invalid {} '{}' in column {}: {}",
                COLUMNS.get(*column).copied().unwrap_or("field"),
                value.escape_default(),
                column + 1,
                err
            )?,
            ErrorKind::InvalidTagFormat {
                token,
                expected: None,
                ..
            } => write!(
                f,
                "PAF parse error: '{}' is not in valid TAG:TYPE:VALUE format",
                token
            )?,
            ErrorKind::InvalidTagFormat {
                token,
                expected: Some(t),
                ..
            } => write!(
                f,
                "PAF parse error: VALUE of tag '{}' is not of the expected TYPE '{}'",
                token, t
            )?,
            ErrorKind::UnknownTagTypeChar { token, found, .. } => write!(
                f,
                "PAF parse error: unknown tag TYPE '{}' in '{}', expected one of '{}'",
                found.escape_default(),
                token,
                TagType::supported()
            )?,
            ErrorKind::InvalidUtf8 { err, .. } => write!(f, "PAF parse error: {}", err)?,
            ErrorKind::BufferLimit => return write!(f, "PAF parse error: Buffer limit reached."),
        }
        if let Some(pos) = self.position() {
            if pos.position().is_some() || pos.qname().is_some() {
                write!(f, " ({})", pos)?;
            }
        }
        if let ErrorKind::MalformattedRecord { line, .. } = self.kind() {
            write!(f, ":\n{}", line)?;
        }
        Ok(())
    }
}
