//! Composite keys used to group records in each stage.
//!
//! Every key type derives its ordering from its field order, so the field
//! order of each struct *is* the comparison order of that stage. Equality
//! and ordering are therefore always consistent.
//!
//! # Binary layout
//!
//! Keys also have a fixed-field binary form, used to route keys to reduce
//! buckets (see [`crate::ihash`]) and as the wire form for an external
//! shuffle. Fields are written in comparison order, big endian:
//!
//! | field type | layout |
//! |---|---|
//! | string | `u32` byte length, then UTF-8 bytes |
//! | integer | `i32` |
//! | boolean | one byte, `0` or `1` |

use anyhow::{bail, ensure, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::hash::Hash;

/// A key the grouping engine can group, sort and route.
pub trait CompositeKey:
    Ord + Hash + Clone + fmt::Display + fmt::Debug + Send + Sync + 'static
{
    fn encode(&self, buf: &mut BytesMut);

    fn decode(buf: &mut Bytes) -> Result<Self>
    where
        Self: Sized;

    /// The encoded form of this key as a standalone buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// The start of the ten-year span containing `year`: `floor(year / 10) * 10`.
///
/// Rounds toward negative infinity, so `decade_of(-5) == Some(-10)`. Defined
/// for `year >= -2147483640`; below that the decade does not fit an `i32`.
#[inline]
pub fn decade_of(year: i32) -> Option<i32> {
    year.checked_sub(year.rem_euclid(10))
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_str(buf: &mut Bytes) -> Result<String> {
    ensure!(buf.remaining() >= 4, "truncated string length");
    let len = buf.get_u32() as usize;
    ensure!(
        buf.remaining() >= len,
        "truncated string: need {} bytes, have {}",
        len,
        buf.remaining()
    );
    let raw = buf.split_to(len);
    Ok(String::from_utf8(raw.to_vec())?)
}

fn get_i32(buf: &mut Bytes) -> Result<i32> {
    ensure!(buf.remaining() >= 4, "truncated integer");
    Ok(buf.get_i32())
}

fn get_bool(buf: &mut Bytes) -> Result<bool> {
    ensure!(buf.remaining() >= 1, "truncated boolean");
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => bail!("invalid boolean byte {}", other),
    }
}

/////////////////////////////////////////////////////////////////////////////
// Preprocessing
/////////////////////////////////////////////////////////////////////////////

/// Identifies one book: `(book_id, title, year)`.
///
/// Rendered as `book_id,title,year`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookKey {
    pub book_id: String,
    pub title: String,
    pub year: i32,
}

impl BookKey {
    pub fn new(book_id: impl Into<String>, title: impl Into<String>, year: i32) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            year,
        }
    }
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.book_id, self.title, self.year)
    }
}

impl CompositeKey for BookKey {
    fn encode(&self, buf: &mut BytesMut) {
        put_str(buf, &self.book_id);
        put_str(buf, &self.title);
        buf.put_i32(self.year);
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            book_id: get_str(buf)?,
            title: get_str(buf)?,
            year: get_i32(buf)?,
        })
    }
}

/////////////////////////////////////////////////////////////////////////////
// Lemma frequency
/////////////////////////////////////////////////////////////////////////////

/// One lemma within one book: `(book_id, lemma, year)`.
///
/// Rendered tab-separated, so a lemma-frequency output line reads
/// `book_id<TAB>lemma<TAB>year<TAB>count`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LemmaKey {
    pub book_id: String,
    pub lemma: String,
    pub year: i32,
}

impl LemmaKey {
    pub fn new(book_id: impl Into<String>, lemma: impl Into<String>, year: i32) -> Self {
        Self {
            book_id: book_id.into(),
            lemma: lemma.into(),
            year,
        }
    }
}

impl fmt::Display for LemmaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.book_id, self.lemma, self.year)
    }
}

impl CompositeKey for LemmaKey {
    fn encode(&self, buf: &mut BytesMut) {
        put_str(buf, &self.book_id);
        put_str(buf, &self.lemma);
        buf.put_i32(self.year);
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            book_id: get_str(buf)?,
            lemma: get_str(buf)?,
            year: get_i32(buf)?,
        })
    }
}

/////////////////////////////////////////////////////////////////////////////
// Sentiment
/////////////////////////////////////////////////////////////////////////////

/// A book in a given year: `(book_id, year)`, rendered `(book_id,year)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookYearKey {
    pub book_id: String,
    pub year: i32,
}

impl BookYearKey {
    pub fn new(book_id: impl Into<String>, year: i32) -> Self {
        Self {
            book_id: book_id.into(),
            year,
        }
    }
}

impl fmt::Display for BookYearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.book_id, self.year)
    }
}

impl CompositeKey for BookYearKey {
    fn encode(&self, buf: &mut BytesMut) {
        put_str(buf, &self.book_id);
        buf.put_i32(self.year);
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            book_id: get_str(buf)?,
            year: get_i32(buf)?,
        })
    }
}

/////////////////////////////////////////////////////////////////////////////
// Trends
/////////////////////////////////////////////////////////////////////////////

/// A decade bucket, either for all books or for one book.
///
/// Ordered by decade first. Within a decade the aggregate key (`book_id` is
/// `None`) sorts before every book key, and book keys sort by id, so a
/// decade summary is always emitted right before its per-book breakdown.
///
/// Rendered `1850s` for the aggregate and `(book_id,1850s)` for a book.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrendKey {
    pub decade: i32,
    pub book_id: Option<String>,
}

impl TrendKey {
    /// The aggregate key over all books in `decade`.
    pub fn overall(decade: i32) -> Self {
        Self {
            decade,
            book_id: None,
        }
    }

    pub fn book(book_id: impl Into<String>, decade: i32) -> Self {
        Self {
            decade,
            book_id: Some(book_id.into()),
        }
    }

    #[inline]
    pub fn is_aggregate(&self) -> bool {
        self.book_id.is_none()
    }
}

impl fmt::Display for TrendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.book_id {
            None => write!(f, "{}s", self.decade),
            Some(book_id) => write!(f, "({},{}s)", book_id, self.decade),
        }
    }
}

impl CompositeKey for TrendKey {
    // decade, is_aggregate, book_id ("" for the aggregate)
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.decade);
        buf.put_u8(u8::from(self.is_aggregate()));
        put_str(buf, self.book_id.as_deref().unwrap_or(""));
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        let decade = get_i32(buf)?;
        let aggregate = get_bool(buf)?;
        let book_id = get_str(buf)?;
        if aggregate {
            ensure!(book_id.is_empty(), "aggregate trend key carries book id `{}`", book_id);
            Ok(Self::overall(decade))
        } else {
            Ok(Self::book(book_id, decade))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decade_edges() {
        assert_eq!(decade_of(1851), Some(1850));
        assert_eq!(decade_of(1850), Some(1850));
        assert_eq!(decade_of(-5), Some(-10));
        assert_eq!(decade_of(i32::MAX), Some(2_147_483_640));
        assert_eq!(decade_of(-2_147_483_640), Some(-2_147_483_640));
        assert_eq!(decade_of(-2_147_483_641), None);
        assert_eq!(decade_of(i32::MIN), None);
    }

    #[test]
    fn trend_keys_put_decade_summary_before_books() {
        let mut keys = vec![
            TrendKey::book("b", 1850),
            TrendKey::overall(1860),
            TrendKey::book("a", 1850),
            TrendKey::book("a", 1840),
            TrendKey::overall(1850),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["(a,1840s)", "1850s", "(a,1850s)", "(b,1850s)", "1860s"]
        );
    }

    #[test]
    fn aggregate_and_book_keys_never_compare_equal() {
        let overall = TrendKey::overall(1850);
        let empty_book = TrendKey::book("", 1850);
        assert_ne!(overall, empty_book);
        assert!(overall < empty_book);
        assert_ne!(overall.to_bytes(), empty_book.to_bytes());
    }

    #[test]
    fn lemma_keys_order_by_book_then_lemma_then_year() {
        let mut keys = vec![
            LemmaKey::new("2", "apple", 1900),
            LemmaKey::new("1", "whale", 1851),
            LemmaKey::new("1", "sea", 1852),
            LemmaKey::new("1", "sea", 1851),
        ];
        keys.sort();
        assert_eq!(keys[0], LemmaKey::new("1", "sea", 1851));
        assert_eq!(keys[1], LemmaKey::new("1", "sea", 1852));
        assert_eq!(keys[2], LemmaKey::new("1", "whale", 1851));
        assert_eq!(keys[3], LemmaKey::new("2", "apple", 1900));
    }

    #[test]
    fn text_forms() {
        assert_eq!(
            BookKey::new("PG2701", "Moby Dick", 1851).to_string(),
            "PG2701,Moby Dick,1851"
        );
        assert_eq!(LemmaKey::new("PG2701", "whale", 1851).to_string(), "PG2701\twhale\t1851");
        assert_eq!(BookYearKey::new("PG2701", 1851).to_string(), "(PG2701,1851)");
        assert_eq!(TrendKey::book("PG2701", 1850).to_string(), "(PG2701,1850s)");
        assert_eq!(TrendKey::overall(1850).to_string(), "1850s");
    }

    #[test]
    fn decode_reads_encoded_fields_back() {
        let key = TrendKey::book("PG2701", 1850);
        let mut buf = key.to_bytes();
        assert_eq!(TrendKey::decode(&mut buf).unwrap(), key);
        assert!(buf.is_empty());

        let key = BookKey::new("PG2701", "Moby Dick", 1851);
        let mut buf = key.to_bytes();
        assert_eq!(BookKey::decode(&mut buf).unwrap(), key);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = LemmaKey::new("PG2701", "whale", 1851).to_bytes();
        let mut truncated = bytes.slice(..bytes.len() - 2);
        assert!(LemmaKey::decode(&mut truncated).is_err());

        let mut bad_flag = Bytes::from_static(&[0, 0, 7, 58, 9, 0, 0, 0, 0]);
        assert!(TrendKey::decode(&mut bad_flag).is_err());
    }

    proptest! {
        #[test]
        fn decade_bucket_contains_year(year in -2_147_483_640i32..=i32::MAX) {
            let decade = decade_of(year).unwrap();
            prop_assert!(decade <= year);
            prop_assert!(i64::from(year) < i64::from(decade) + 10);
            prop_assert_eq!(decade.rem_euclid(10), 0);
        }

        #[test]
        fn ordering_is_consistent_with_equality(
            a in ("[a-c]{0,2}", 1990i32..1993),
            b in ("[a-c]{0,2}", 1990i32..1993),
        ) {
            let ka = BookYearKey::new(a.0, a.1);
            let kb = BookYearKey::new(b.0, b.1);
            prop_assert_eq!(ka.cmp(&kb) == std::cmp::Ordering::Equal, ka == kb);
            prop_assert_eq!(ka.to_bytes() == kb.to_bytes(), ka == kb);
        }
    }
}
