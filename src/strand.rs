//! The strand column of a PAF record.

use std::convert::TryFrom;
use std::error;
use std::fmt;
use std::str::FromStr;

/// Relative orientation of query and target.
///
/// # Example
///
/// ```
/// use paf_io::Strand;
///
/// let strand: Strand = "-".parse().unwrap();
/// assert_eq!(strand, Strand::Reverse);
/// assert_eq!(strand.to_string(), "-");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strand {
    /// `+`: query and target on the same strand
    Forward,
    /// `-`: query and target on opposite strands
    Reverse,
    /// `*`: no alignment (minimap2 `--paf-no-hit`)
    #[default]
    Unmapped,
}

impl Strand {
    /// Returns the literal byte used in the PAF column.
    #[inline]
    pub fn as_byte(self) -> u8 {
        match self {
            Strand::Forward => b'+',
            Strand::Reverse => b'-',
            Strand::Unmapped => b'*',
        }
    }
}

impl TryFrom<u8> for Strand {
    type Error = InvalidStrand;

    #[inline]
    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            b'+' => Ok(Strand::Forward),
            b'-' => Ok(Strand::Reverse),
            b'*' => Ok(Strand::Unmapped),
            _ => Err(InvalidStrand {
                found: (b as char).to_string(),
            }),
        }
    }
}

impl TryFrom<char> for Strand {
    type Error = InvalidStrand;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        if c.is_ascii() {
            Strand::try_from(c as u8)
        } else {
            Err(InvalidStrand {
                found: c.to_string(),
            })
        }
    }
}

impl FromStr for Strand {
    type Err = InvalidStrand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [b] => Strand::try_from(*b),
            _ => Err(InvalidStrand {
                found: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Returned if the strand column is not one of `+`, `-` or `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStrand {
    found: String,
}

impl InvalidStrand {
    /// The text found instead of a strand character.
    pub fn found(&self) -> &str {
        &self.found
    }
}

impl fmt::Display for InvalidStrand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid strand '{}', expected one of '+', '-' or '*'",
            self.found.escape_default()
        )
    }
}

impl error::Error for InvalidStrand {}
