//! SAM-like optional fields (tags) as found after the 12 mandatory PAF
//! columns.
//!
//! A tag has the form `TAG:TYPE:VALUE`, where `TAG` consists of two word
//! characters and `TYPE` is one of the characters in the table below. The
//! value has to match the grammar of its type.
//!
//! | TYPE | value                                   | Rust type |
//! |------|-----------------------------------------|-----------|
//! | `A`  | one printable character (`!`-`~`)       | `u8`      |
//! | `i`  | signed integer                          | `i64`     |
//! | `f`  | decimal / exponential float, or `inf`   | `f64`     |
//! | `Z`  | printable string, spaces allowed        | `String`  |
//!
//! # Example
//!
//! ```
//! use paf_io::tag::{Tag, TagValue};
//!
//! let tag: Tag = "NM:i:50".parse().unwrap();
//! assert_eq!(tag.name(), "NM");
//! assert_eq!(tag.value(), &TagValue::Integer(50));
//! assert_eq!(tag.to_string(), "NM:i:50");
//! ```
//!
//! The full specification of SAM tags can be found
//! [here](https://samtools.github.io/hts-specs/SAMtags.pdf).

use std::error;
use std::fmt;
use std::str::FromStr;

use regex::Regex;

/// Separator between the parts of a tag.
pub const DELIM: char = ':';

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"^(\w{2}):(.):(.*)$").unwrap();
    static ref NAME_REGEX: Regex = Regex::new(r"^\w{2}$").unwrap();
    static ref CHAR_REGEX: Regex = Regex::new(r"^[!-~]$").unwrap();
    static ref INT_REGEX: Regex = Regex::new(r"^[-+]?[0-9]+$").unwrap();
    static ref FLOAT_REGEX: Regex =
        Regex::new(r"^[-+]?(?:[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?|inf)$").unwrap();
    static ref STRING_REGEX: Regex = Regex::new(r"^[ !-~]*$").unwrap();
}

/// The closed set of supported tag types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    /// `A`
    Char,
    /// `i`
    Int,
    /// `f`
    Float,
    /// `Z`
    String,
}

impl TagType {
    /// All supported types, in the order of their type characters in
    /// error messages.
    pub const ALL: [TagType; 4] = [TagType::Char, TagType::Int, TagType::Float, TagType::String];

    /// Looks up the type for a type character.
    pub fn from_char(c: char) -> Option<TagType> {
        TagType::ALL.iter().copied().find(|t| t.char() == c)
    }

    /// The single character identifying the type.
    #[inline]
    pub fn char(self) -> char {
        match self {
            TagType::Char => 'A',
            TagType::Int => 'i',
            TagType::Float => 'f',
            TagType::String => 'Z',
        }
    }

    /// Regular expression the whole value has to match.
    pub fn value_regex(self) -> &'static Regex {
        match self {
            TagType::Char => &CHAR_REGEX,
            TagType::Int => &INT_REGEX,
            TagType::Float => &FLOAT_REGEX,
            TagType::String => &STRING_REGEX,
        }
    }

    /// Parses a value of this type. The value is first validated against
    /// [`value_regex`](TagType::value_regex), the conversion is only done
    /// afterwards.
    ///
    /// On failure, `None` is returned. This only happens if the grammar is
    /// not matched, or if an integer does not fit into an `i64`. Digits are
    /// ASCII only, like in the `str::parse()` conversions.
    pub fn parse(self, value: &str) -> Option<TagValue> {
        if !self.value_regex().is_match(value) {
            return None;
        }
        match self {
            TagType::Char => Some(TagValue::Character(value.as_bytes()[0])),
            TagType::Int => value.parse().ok().map(TagValue::Integer),
            TagType::Float => value.parse().ok().map(TagValue::Real),
            TagType::String => Some(TagValue::Text(value.to_string())),
        }
    }

    pub(crate) fn supported() -> String {
        TagType::ALL.iter().map(|t| t.char()).collect()
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// A decoded tag value. The variant determines the type character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Character(u8),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl TagValue {
    /// Returns the type corresponding to the variant.
    #[inline]
    pub fn tag_type(&self) -> TagType {
        match self {
            TagValue::Character(_) => TagType::Char,
            TagValue::Integer(_) => TagType::Int,
            TagValue::Real(_) => TagType::Float,
            TagValue::Text(_) => TagType::String,
        }
    }

    pub fn as_char(&self) -> Option<u8> {
        match *self {
            TagValue::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            TagValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            TagValue::Real(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    // Checks the values that can be constructed by hand, but not decoded
    fn is_valid(&self) -> bool {
        match self {
            TagValue::Character(c) => (b'!'..=b'~').contains(c),
            TagValue::Integer(_) => true,
            TagValue::Real(f) => !f.is_nan(),
            TagValue::Text(s) => STRING_REGEX.is_match(s),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TagValue::Character(c) => write!(f, "{}", *c as char),
            TagValue::Integer(i) => write!(f, "{}", i),
            // shortest representation that parses back to the same value
            TagValue::Real(v) => write!(f, "{:?}", v),
            TagValue::Text(s) => f.write_str(s),
        }
    }
}

/// A single SAM-like optional field.
///
/// Tags are immutable; they are either decoded with
/// [`from_str`](#impl-FromStr-for-Tag) or constructed with
/// [`Tag::new`](Tag::new), which applies the same validation.
///
/// ```
/// use paf_io::tag::{Tag, TagValue};
///
/// let tag = Tag::new("de", TagValue::Real(0.5)).unwrap();
/// assert_eq!(tag.to_string(), "de:f:0.5");
/// assert_eq!("de:f:0.5".parse::<Tag>().unwrap(), tag);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    name: String,
    value: TagValue,
}

impl Tag {
    /// Creates a new tag, checking the name (two word characters) and
    /// the value grammar.
    pub fn new(name: &str, value: TagValue) -> Result<Tag, TagError> {
        if !NAME_REGEX.is_match(name) || !value.is_valid() {
            let expected = if NAME_REGEX.is_match(name) {
                Some(value.tag_type())
            } else {
                None
            };
            return Err(TagError::InvalidFormat {
                token: format!("{}{}{}{}{}", name, DELIM, value.tag_type(), DELIM, value),
                expected,
            });
        }
        Ok(Tag {
            name: name.to_string(),
            value,
        })
    }

    /// The two-character key, e.g. `NM` or `cg`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &TagValue {
        &self.value
    }

    #[inline]
    pub fn tag_type(&self) -> TagType {
        self.value.tag_type()
    }

    /// Returns name and value, consuming the tag.
    pub fn into_parts(self) -> (String, TagValue) {
        (self.name, self.value)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    /// Decodes a `TAG:TYPE:VALUE` token.
    fn from_str(token: &str) -> Result<Tag, TagError> {
        let caps = TAG_REGEX
            .captures(token)
            .ok_or_else(|| TagError::InvalidFormat {
                token: token.to_string(),
                expected: None,
            })?;

        // the type group always matches exactly one character
        let type_char = caps[2].chars().next().unwrap_or_default();
        let tag_type = TagType::from_char(type_char).ok_or_else(|| TagError::UnknownTypeChar {
            token: token.to_string(),
            found: type_char,
        })?;

        let value = tag_type
            .parse(&caps[3])
            .ok_or_else(|| TagError::InvalidFormat {
                token: token.to_string(),
                expected: Some(tag_type),
            })?;

        Ok(Tag {
            name: caps[1].to_string(),
            value,
        })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.name,
            DELIM,
            self.tag_type(),
            DELIM,
            self.value
        )
    }
}

/// Tag decoding error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The token is not in `TAG:TYPE:VALUE` format, or the value does not
    /// match the grammar of its type.
    InvalidFormat {
        token: String,
        /// The type whose value grammar was violated. `None` if the overall
        /// layout of the token was invalid.
        expected: Option<TagType>,
    },
    /// The type character is not one of `A`, `i`, `f`, `Z`.
    UnknownTypeChar { token: String, found: char },
}

impl TagError {
    /// The offending token.
    pub fn token(&self) -> &str {
        match self {
            TagError::InvalidFormat { token, .. } | TagError::UnknownTypeChar { token, .. } => token,
        }
    }
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TagError::InvalidFormat {
                token,
                expected: None,
            } => write!(f, "'{}' is not in valid TAG:TYPE:VALUE format", token),
            TagError::InvalidFormat {
                token,
                expected: Some(t),
            } => write!(f, "VALUE of tag '{}' is not of the expected TYPE '{}'", token, t),
            TagError::UnknownTypeChar { token, found } => write!(
                f,
                "unknown tag TYPE '{}' in '{}', expected one of '{}'",
                found.escape_default(),
                token,
                TagType::supported()
            ),
        }
    }
}

impl error::Error for TagError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Tag, TagError> {
        s.parse()
    }

    #[test]
    fn decode_each_type() {
        let cases = [
            ("tp:A:P", TagValue::Character(b'P')),
            ("tp:A:*", TagValue::Character(b'*')),
            ("NM:i:50", TagValue::Integer(50)),
            ("NM:i:-3", TagValue::Integer(-3)),
            ("NM:i:+3", TagValue::Integer(3)),
            ("de:f:0.0391", TagValue::Real(0.0391)),
            ("de:f:.5", TagValue::Real(0.5)),
            ("de:f:1e-5", TagValue::Real(1e-5)),
            ("de:f:inf", TagValue::Real(f64::INFINITY)),
            ("de:f:-inf", TagValue::Real(f64::NEG_INFINITY)),
            ("cg:Z:97M1I13M", TagValue::Text("97M1I13M".to_string())),
            ("cs:Z:with space", TagValue::Text("with space".to_string())),
            ("cs:Z:", TagValue::Text(String::new())),
        ];
        for (token, value) in &cases {
            let tag = parse(token).unwrap();
            assert_eq!(tag.name(), &token[..2]);
            assert_eq!(tag.value(), value, "{}", token);
            assert_eq!(tag.tag_type().char(), token.chars().nth(3).unwrap());
        }
    }

    #[test]
    fn encode() {
        let tag = Tag::new("tg", TagValue::Character(b'P')).unwrap();
        assert_eq!(tag.to_string(), "tg:A:P");
        let tag = Tag::new("NM", TagValue::Integer(50)).unwrap();
        assert_eq!(tag.to_string(), "NM:i:50");
        let tag = Tag::new("de", TagValue::Real(0.5)).unwrap();
        assert_eq!(tag.to_string(), "de:f:0.5");
        let tag = Tag::new("de", TagValue::Real(5.)).unwrap();
        assert_eq!(tag.to_string(), "de:f:5.0");
        let tag = Tag::new("de", TagValue::Real(f64::INFINITY)).unwrap();
        assert_eq!(tag.to_string(), "de:f:inf");
    }

    #[test]
    fn reencode_matches_token() {
        for token in &["tp:A:P", "NM:i:-3", "de:f:0.0391", "de:f:inf", "cg:Z:97M1I13M", "cs:Z:"] {
            assert_eq!(&parse(token).unwrap().to_string(), token);
        }
    }

    #[test]
    fn constructed_tags_decode_back() {
        let values = vec![
            TagValue::Character(b'~'),
            TagValue::Integer(i64::MIN),
            TagValue::Integer(i64::MAX),
            TagValue::Real(1e-7),
            TagValue::Real(1.5e300),
            TagValue::Real(-0.25),
            TagValue::Real(f64::NEG_INFINITY),
            TagValue::Text("a b:c".to_string()),
        ];
        for value in values {
            let tag = Tag::new("xy", value).unwrap();
            assert_eq!(parse(&tag.to_string()).unwrap(), tag);
        }
    }

    #[test]
    fn invalid_layout() {
        for token in &["foo", "NMP:i:5", "NM:ii:5", "N:i:5", "NM:i", "NM-i-5", ""] {
            match parse(token) {
                Err(TagError::InvalidFormat { expected: None, .. }) => {}
                other => panic!("unexpected result for {:?}: {:?}", token, other),
            }
        }
    }

    #[test]
    fn invalid_value() {
        let cases = [
            ("NM:i:", TagType::Int),
            ("NM:i:5a", TagType::Int),
            ("NM:i:1.5", TagType::Int),
            ("NM:i:99999999999999999999", TagType::Int),
            ("tp:A:PP", TagType::Char),
            ("tp:A:", TagType::Char),
            ("tp:A: ", TagType::Char),
            ("de:f:1.", TagType::Float),
            ("de:f:nan", TagType::Float),
            ("de:f:", TagType::Float),
            ("cs:Z:é", TagType::String),
        ];
        for (token, t) in &cases {
            assert_eq!(
                parse(token),
                Err(TagError::InvalidFormat {
                    token: token.to_string(),
                    expected: Some(*t)
                }),
                "{}",
                token
            );
        }
    }

    #[test]
    fn non_ascii_digits() {
        // ARABIC-INDIC DIGIT THREE
        for value in &["\u{663}", "+\u{663}", "1\u{663}"] {
            assert!(!TagType::Int.value_regex().is_match(value), "{}", value);
            assert!(!TagType::Float.value_regex().is_match(value), "{}", value);
        }
        assert!(!TagType::Float.value_regex().is_match("\u{663}.5"));
        assert!(!TagType::Float.value_regex().is_match("1e\u{663}"));
        assert_eq!(
            parse("NM:i:\u{663}"),
            Err(TagError::InvalidFormat {
                token: "NM:i:\u{663}".to_string(),
                expected: Some(TagType::Int)
            })
        );
    }

    #[test]
    fn grammar_match_converts() {
        for value in &["0", "-0", "+12", "007", "9223372036854775807"] {
            assert!(TagType::Int.value_regex().is_match(value));
            assert!(TagType::Int.parse(value).is_some(), "{}", value);
        }
        for value in &["0", ".5", "-1.25", "+3e5", "1E-7", "00.1", "inf", "+inf", "-inf"] {
            assert!(TagType::Float.value_regex().is_match(value));
            assert!(TagType::Float.parse(value).is_some(), "{}", value);
        }
    }

    #[test]
    fn unknown_type() {
        let err = parse("NM:x:5").unwrap_err();
        assert_eq!(
            err,
            TagError::UnknownTypeChar {
                token: "NM:x:5".to_string(),
                found: 'x'
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("'x'") && msg.contains("AifZ"), "{}", msg);
    }

    #[test]
    fn new_rejects_invalid() {
        assert!(Tag::new("NMP", TagValue::Integer(1)).is_err());
        assert!(Tag::new("N", TagValue::Integer(1)).is_err());
        assert!(Tag::new("tp", TagValue::Character(b' ')).is_err());
        assert!(Tag::new("de", TagValue::Real(f64::NAN)).is_err());
        assert!(Tag::new("cs", TagValue::Text("a\tb".to_string())).is_err());
    }

    #[test]
    fn type_table() {
        for t in &TagType::ALL {
            assert_eq!(TagType::from_char(t.char()), Some(*t));
        }
        assert_eq!(TagType::from_char('B'), None);
        assert_eq!(TagType::supported(), "AifZ");
    }
}
