use std::{
    fmt::{Display, Write},
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use url::Url;

/// A review score with one fractional digit, kept as an integer count of tenths
/// so that threshold comparisons are exact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Rating(u32);

impl Rating {
    pub fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    pub fn tenths(self) -> u32 {
        self.0
    }

    /// Finds the first digit, optionally followed by `.digit`, inside a rating
    /// as displayed on the page, e.g. `"3.5 / 5"` yields `3.5` and `"4/5"` yields `4.0`.
    pub fn from_display(display: &str) -> Result<Self, RatingParseError> {
        let found = regex!(r"[0-9](\.[0-9])?")
            .find(display)
            .ok_or_else(|| RatingParseError::NoRating(display.to_owned()))?;
        found.as_str().parse()
    }
}

impl FromStr for Rating {
    type Err = RatingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = regex!(r"^([0-9]+)(?:\.([0-9]))?$")
            .captures(s.trim())
            .ok_or_else(|| RatingParseError::InvalidDecimal(s.to_owned()))?;
        let whole: u32 = captures[1]
            .parse()
            .map_err(|_| RatingParseError::InvalidDecimal(s.to_owned()))?;
        let fraction = captures
            .get(2)
            .map_or(0, |m| u32::from(m.as_str().as_bytes()[0] - b'0'));
        whole
            .checked_mul(10)
            .and_then(|x| x.checked_add(fraction))
            .map(Self)
            .ok_or_else(|| RatingParseError::InvalidDecimal(s.to_owned()))
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buffer = String::new();
        write!(buffer, "{}.{}", self.0 / 10, self.0 % 10)?;
        f.pad(&buffer)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum RatingParseError {
    #[error("No rating could be found in {0:?}")]
    NoRating(String),
    #[error("Not a decimal with at most one fractional digit: {0:?}")]
    InvalidDecimal(String),
}

/// One movie review scraped from a listing page.
///
/// Two records are the same movie iff their titles and displayed ratings agree;
/// the link and the numeric rating do not take part in equality or hashing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord", into = "StoredRecord")]
pub struct Record {
    title: String,
    display_rating: String,
    numeric_rating: Rating,
    link: Url,
}

impl Record {
    /// Builds a record from the raw fields found on a page.
    ///
    /// Returns `Ok(None)` when any field is missing or blank.
    /// A present rating that contains no number is an error.
    pub fn parse(
        raw_title: Option<&str>,
        raw_rating: Option<&str>,
        raw_link: Option<Url>,
    ) -> Result<Option<Self>, RatingParseError> {
        fn non_blank(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        let (Some(title), Some(display_rating), Some(link)) =
            (non_blank(raw_title), non_blank(raw_rating), raw_link)
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            title: title.to_owned(),
            display_rating: display_rating.to_owned(),
            numeric_rating: Rating::from_display(display_rating)?,
            link,
        }))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn display_rating(&self) -> &str {
        &self.display_rating
    }

    pub fn numeric_rating(&self) -> Rating {
        self.numeric_rating
    }

    pub fn link(&self) -> &Url {
        &self.link
    }

    pub fn meets_threshold(&self, threshold: Rating) -> bool {
        self.numeric_rating >= threshold
    }

    fn key(&self) -> (&str, &str) {
        (&self.title, &self.display_rating)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Record {}
impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title, self.display_rating)
    }
}

/// On-disk shape of a [`Record`]; the numeric rating is derived again on load.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    title: String,
    display_rating: String,
    link: Url,
}

impl TryFrom<StoredRecord> for Record {
    type Error = StoredRecordError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        Record::parse(
            Some(stored.title.as_str()),
            Some(stored.display_rating.as_str()),
            Some(stored.link),
        )?
        .ok_or(StoredRecordError::Blank)
    }
}

impl From<Record> for StoredRecord {
    fn from(record: Record) -> Self {
        Self {
            title: record.title,
            display_rating: record.display_rating,
            link: record.link,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoredRecordError {
    #[error("Stored record has a blank title or rating")]
    Blank,
    #[error(transparent)]
    Rating(#[from] RatingParseError),
}
