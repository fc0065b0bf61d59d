//! PAF records: decoding, encoding and derived alignment statistics.
//!
//! A record consists of 12 mandatory tab-separated columns, optionally
//! followed by any number of [tags](crate::tag):
//!
//! | col | field    | type     |
//! |-----|----------|----------|
//! | 1   | `qname`  | `String` |
//! | 2   | `qlen`   | `u64`    |
//! | 3   | `qstart` | `u64`    |
//! | 4   | `qend`   | `u64`    |
//! | 5   | `strand` | `Strand` |
//! | 6   | `tname`  | `String` |
//! | 7   | `tlen`   | `u64`    |
//! | 8   | `tstart` | `u64`    |
//! | 9   | `tend`   | `u64`    |
//! | 10  | `mlen`   | `u64`    |
//! | 11  | `blen`   | `u64`    |
//! | 12  | `mapq`   | `u8`     |
//!
//! # Example
//!
//! ```
//! use paf_io::{PafRecord, Strand};
//!
//! let line = "read1\t100\t0\t90\t+\tchr1\t1000\t10\t100\t80\t90\t60\tNM:i:10";
//! let record: PafRecord = line.parse().unwrap();
//!
//! assert_eq!(record.qname, "read1");
//! assert_eq!(record.strand, Strand::Forward);
//! assert_eq!(record.query_aligned_length(), 90);
//! assert_eq!(record.get_tag("NM").unwrap().to_string(), "NM:i:10");
//! assert_eq!(record.to_string(), line);
//! ```

use std::error;
use std::fmt;
use std::io;
use std::num::ParseIntError;
use std::str::{self, FromStr};

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, ErrorPosition, Result};
use crate::strand::Strand;
use crate::tag::{Tag, TagValue};

/// Field separator
pub const DELIM: char = '\t';

/// Names of the mandatory columns, in file order.
pub const COLUMNS: [&str; 12] = [
    "qname", "qlen", "qstart", "qend", "strand", "tname", "tlen", "tstart", "tend", "mlen",
    "blen", "mapq",
];

/// Minimum number of fields in a line.
pub const MIN_FIELDS: usize = COLUMNS.len();

/// Value of `mapq` indicating that the mapping quality is missing.
pub const MISSING_MAPQ: u8 = 255;

/// Name of the tag holding the alignment type.
pub const ALIGNMENT_TYPE_TAG: &str = "tp";

/// Tags of a record, keyed by tag name. Iteration order is insertion order,
/// which is also the order used when encoding; equality ignores the order.
pub type Tags = IndexMap<String, Tag>;

/// A single PAF record.
///
/// The default record represents an empty/unmapped alignment: both names are
/// `*`, all integers are zero, the strand is `Unmapped`, `mapq` is 255 and
/// there are no tags.
///
/// ```
/// use paf_io::{PafRecord, Strand};
///
/// let record = PafRecord {
///     qname: "q".to_string(),
///     qlen: 10,
///     qend: 10,
///     strand: Strand::Forward,
///     ..Default::default()
/// };
/// assert_eq!(record.to_string(), "q\t10\t0\t10\t+\t*\t0\t0\t0\t0\t0\t255");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PafRecord {
    /// Query sequence name
    pub qname: String,
    /// Query sequence length
    pub qlen: u64,
    /// Query start (0-based; BED-like; closed)
    pub qstart: u64,
    /// Query end (0-based; BED-like; open)
    pub qend: u64,
    /// Relative strand
    pub strand: Strand,
    /// Target sequence name
    pub tname: String,
    /// Target sequence length
    pub tlen: u64,
    /// Target start on original strand (0-based)
    pub tstart: u64,
    /// Target end on original strand (0-based)
    pub tend: u64,
    /// Number of matching bases in the mapping
    pub mlen: u64,
    /// Alignment block length; number of bases, including gaps
    pub blen: u64,
    /// Mapping quality (0-255; 255 for missing)
    pub mapq: u8,
    /// Optional SAM-like tags, `None` if there are none.
    ///
    /// Decoded records never contain `Some` with an empty map, and each key
    /// equals the name of its tag. Records assigned other values still
    /// encode (empty maps like `None`, tags under their own names), but do not
    /// decode back to an equal record. [`with_tags()`](PafRecord::with_tags)
    /// normalises both.
    pub tags: Option<Tags>,
}

impl Default for PafRecord {
    fn default() -> Self {
        PafRecord {
            qname: "*".to_string(),
            qlen: 0,
            qstart: 0,
            qend: 0,
            strand: Strand::Unmapped,
            tname: "*".to_string(),
            tlen: 0,
            tstart: 0,
            tend: 0,
            mlen: 0,
            blen: 0,
            mapq: MISSING_MAPQ,
            tags: None,
        }
    }
}

impl PafRecord {
    /// Decodes a raw line. A trailing `\n` or `\r\n` is ignored.
    ///
    /// The line has to be valid UTF-8, otherwise `ErrorKind::InvalidUtf8`
    /// is returned. See [`from_str`](#impl-FromStr-for-PafRecord) for the
    /// other errors.
    pub fn from_bytes(line: &[u8]) -> Result<PafRecord> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        PafRecord::from_line(line)
    }

    /// Decodes a line that has no terminator any more.
    pub(crate) fn from_line(line: &[u8]) -> Result<PafRecord> {
        let line = str::from_utf8(line).map_err(|err| {
            Error::new(ErrorKind::InvalidUtf8 {
                pos: ErrorPosition::default(),
                err,
            })
        })?;
        decode_fields(line)
    }

    /// Encodes the record as a single line without line terminator.
    /// Equivalent to `to_string()`.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Writes the record followed by `\n`.
    pub fn write<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{}", self)
    }

    /// Returns a copy of this record with the given tags. An empty map
    /// removes the tags. Tags are keyed by their own name; if the map
    /// contains a name twice, the last tag wins, like when decoding.
    pub fn with_tags(&self, tags: Tags) -> PafRecord {
        let tags: Tags = tags
            .into_values()
            .map(|tag| (tag.name().to_string(), tag))
            .collect();
        PafRecord {
            tags: if tags.is_empty() { None } else { Some(tags) },
            ..self.clone()
        }
    }

    /// Returns the tag with the given name, if present.
    #[inline]
    pub fn get_tag(&self, name: &str) -> Option<&Tag> {
        self.tags.as_ref().and_then(|tags| tags.get(name))
    }

    /// Returns the tag with the given name, or `default` if not present.
    ///
    /// ```
    /// use paf_io::PafRecord;
    /// use paf_io::tag::{Tag, TagValue};
    ///
    /// let record = PafRecord::default();
    /// let default = Tag::new("de", TagValue::Real(0.0)).unwrap();
    /// assert_eq!(record.get_tag_or("de", &default), &default);
    /// ```
    #[inline]
    pub fn get_tag_or<'a>(&'a self, name: &str, default: &'a Tag) -> &'a Tag {
        self.get_tag(name).unwrap_or(default)
    }

    /// Length of the aligned query sequence, equal to `|qend - qstart|`.
    #[inline]
    pub fn query_aligned_length(&self) -> u64 {
        self.qend.abs_diff(self.qstart)
    }

    /// Length of the aligned target sequence, equal to `|tend - tstart|`.
    #[inline]
    pub fn target_aligned_length(&self) -> u64 {
        self.tend.abs_diff(self.tstart)
    }

    /// Proportion of the query sequence involved in the alignment
    /// (`query_aligned_length / qlen`). Returns 0.0 if `qlen` is 0.
    pub fn query_coverage(&self) -> f64 {
        ratio(self.query_aligned_length(), self.qlen)
    }

    /// Proportion of the target sequence involved in the alignment
    /// (`target_aligned_length / tlen`). Returns 0.0 if `tlen` is 0.
    pub fn target_coverage(&self) -> f64 {
        ratio(self.target_aligned_length(), self.tlen)
    }

    /// Ratio of the aligned query length to the aligned target length.
    /// Returns 0.0 if the target aligned length is 0.
    pub fn relative_length(&self) -> f64 {
        ratio(self.query_aligned_length(), self.target_aligned_length())
    }

    /// BLAST-like identity: the number of matching bases divided by the
    /// number of alignment columns (`mlen / blen`). Returns 0.0 if `blen` is 0.
    ///
    /// See <https://lh3.github.io/2018/11/25/on-the-definition-of-sequence-identity>
    pub fn blast_identity(&self) -> f64 {
        ratio(self.mlen, self.blen)
    }

    /// Is the record unmapped? This is the case if the strand is `*`.
    #[inline]
    pub fn is_unmapped(&self) -> bool {
        self.strand == Strand::Unmapped
    }

    /// Returns the alignment type stored in the `tp` tag.
    ///
    /// Unmapped records yield `Ok(None)` without consulting the tag.
    /// For mapped records, the tag has to be present, and the first
    /// character of its value (upper-cased) has to be one of `P`, `S`, `I`
    /// or `*`.
    pub fn alignment_type(&self) -> std::result::Result<Option<AlignmentType>, AlignmentTypeError> {
        if self.is_unmapped() {
            return Ok(None);
        }
        let tag = self
            .get_tag(ALIGNMENT_TYPE_TAG)
            .ok_or(AlignmentTypeError::MissingTag)?;
        let first = match tag.value() {
            TagValue::Character(c) => Some(*c as char),
            TagValue::Text(s) => s.chars().next(),
            _ => None,
        };
        first
            .and_then(|c| AlignmentType::from_char(c.to_ascii_uppercase()))
            .map(Some)
            .ok_or_else(|| AlignmentTypeError::InvalidValue(tag.value().to_string()))
    }

    /// Is the record a primary alignment (according to the `tp` tag)?
    /// Supplementary alignments are also reported as primary.
    pub fn is_primary(&self) -> std::result::Result<bool, AlignmentTypeError> {
        self.is_alignment_type(AlignmentType::Primary)
    }

    /// Is the record a secondary alignment (according to the `tp` tag)?
    pub fn is_secondary(&self) -> std::result::Result<bool, AlignmentTypeError> {
        self.is_alignment_type(AlignmentType::Secondary)
    }

    /// Is the record an inversion (according to the `tp` tag)?
    pub fn is_inversion(&self) -> std::result::Result<bool, AlignmentTypeError> {
        self.is_alignment_type(AlignmentType::Inversion)
    }

    fn is_alignment_type(&self, t: AlignmentType) -> std::result::Result<bool, AlignmentTypeError> {
        Ok(self.alignment_type()? == Some(t))
    }
}

#[inline]
fn ratio(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[inline]
fn parse_column<T>(fields: &[&str], column: usize) -> Result<T>
where
    T: FromStr<Err = ParseIntError>,
{
    let value = fields[column];
    value.parse().map_err(|err| {
        Error::new(ErrorKind::InvalidField {
            pos: ErrorPosition::default(),
            column,
            value: value.to_string(),
            err,
        })
    })
}

fn parse_fields(fields: &[&str]) -> Result<PafRecord> {
    let strand = fields[4].parse::<Strand>().map_err(|e| {
        Error::new(ErrorKind::InvalidStrand {
            pos: ErrorPosition::default(),
            found: e.found().to_string(),
        })
    })?;

    let tags = if fields.len() > MIN_FIELDS {
        let mut tags = Tags::with_capacity(fields.len() - MIN_FIELDS);
        for token in &fields[MIN_FIELDS..] {
            let tag: Tag = token.parse()?;
            // a repeated name replaces the earlier value
            tags.insert(tag.name().to_string(), tag);
        }
        Some(tags)
    } else {
        None
    };

    Ok(PafRecord {
        qname: fields[0].to_string(),
        qlen: parse_column(fields, 1)?,
        qstart: parse_column(fields, 2)?,
        qend: parse_column(fields, 3)?,
        strand,
        tname: fields[5].to_string(),
        tlen: parse_column(fields, 6)?,
        tstart: parse_column(fields, 7)?,
        tend: parse_column(fields, 8)?,
        mlen: parse_column(fields, 9)?,
        blen: parse_column(fields, 10)?,
        mapq: parse_column(fields, 11)?,
        tags,
    })
}

impl FromStr for PafRecord {
    type Err = Error;

    /// Decodes a line. A single trailing `\n` and then a single `\r` are
    /// stripped before splitting the line on tabs.
    ///
    /// Errors:
    ///
    /// * `MalformattedRecord` if there are fewer than 12 fields
    /// * `InvalidStrand` / `InvalidField` if a mandatory column does not
    ///   have the required type
    /// * `InvalidTagFormat` / `UnknownTagTypeChar` for the first invalid tag
    fn from_str(line: &str) -> Result<PafRecord> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        decode_fields(line)
    }
}

fn decode_fields(line: &str) -> Result<PafRecord> {
    let fields: Vec<&str> = line.split(DELIM).collect();
    if fields.len() < MIN_FIELDS {
        return Err(Error::new(ErrorKind::MalformattedRecord {
            pos: ErrorPosition::default(),
            line: line.to_string(),
            num_fields: fields.len(),
        }));
    }

    parse_fields(&fields).map_err(|e| e.with_qname(fields[0]))
}

impl fmt::Display for PafRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.qname,
            self.qlen,
            self.qstart,
            self.qend,
            self.strand,
            self.tname,
            self.tlen,
            self.tstart,
            self.tend,
            self.mlen,
            self.blen,
            self.mapq
        )?;
        if let Some(tags) = self.tags.as_ref() {
            for tag in tags.values() {
                write!(f, "{}{}", DELIM, tag)?;
            }
        }
        Ok(())
    }
}

/// Alignment type as stored in the `tp` tag written by minimap2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignmentType {
    /// `P`
    Primary,
    /// `S`
    Secondary,
    /// `I`
    Inversion,
    /// `*`
    Unknown,
}

impl AlignmentType {
    pub fn from_char(c: char) -> Option<AlignmentType> {
        match c {
            'P' => Some(AlignmentType::Primary),
            'S' => Some(AlignmentType::Secondary),
            'I' => Some(AlignmentType::Inversion),
            '*' => Some(AlignmentType::Unknown),
            _ => None,
        }
    }

    pub fn char(self) -> char {
        match self {
            AlignmentType::Primary => 'P',
            AlignmentType::Secondary => 'S',
            AlignmentType::Inversion => 'I',
            AlignmentType::Unknown => '*',
        }
    }
}

impl fmt::Display for AlignmentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// Returned by the alignment type queries of [`PafRecord`](PafRecord).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentTypeError {
    /// Mapped record without `tp` tag
    MissingTag,
    /// The `tp` value does not start with a known alignment type
    InvalidValue(String),
}

impl fmt::Display for AlignmentTypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlignmentTypeError::MissingTag => {
                write!(f, "{} tag not in record", ALIGNMENT_TYPE_TAG)
            }
            AlignmentTypeError::InvalidValue(v) => write!(
                f,
                "unknown alignment type '{}' in {} tag, expected one of 'P', 'S', 'I' or '*'",
                v, ALIGNMENT_TYPE_TAG
            ),
        }
    }
}

impl error::Error for AlignmentTypeError {}
