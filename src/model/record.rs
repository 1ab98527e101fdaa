use crate::model::date::parse_publication_date;
use crate::model::SourceId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Fields every stored record must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    NaturalKey,
    Title,
    Url,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NaturalKey => "natural_key",
            Self::Title => "title",
            Self::Url => "url",
        })
    }
}

/// A record as extracted by a source adapter, before validation
///
/// Everything except the source is optional raw text; the persistence gate
/// decides whether it is good enough to store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: SourceId,
    pub natural_key: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub record_type: Option<String>,
    pub venue: Option<String>,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    /// Publication date exactly as the source printed it
    pub publication_date: Option<String>,
    pub citation_count: Option<u64>,
}

impl RawRecord {
    /// Creates an empty raw record for a source
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            natural_key: None,
            title: None,
            url: None,
            record_type: None,
            venue: None,
            authors: Vec::new(),
            abstract_text: None,
            publication_date: None,
            citation_count: None,
        }
    }

    /// Lists the required fields that are absent or blank
    pub fn missing_fields(&self) -> Vec<RequiredField> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let mut missing = Vec::new();
        // A bare DOI resolver prefix carries no key
        let key_blank = self
            .natural_key
            .as_deref()
            .map_or(true, |key| normalize_natural_key(key).is_empty());
        if key_blank {
            missing.push(RequiredField::NaturalKey);
        }
        if blank(&self.title) {
            missing.push(RequiredField::Title);
        }
        if blank(&self.url) {
            missing.push(RequiredField::Url);
        }
        missing
    }
}

/// A validated, normalized record that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub source: SourceId,
    pub natural_key: String,
    pub title: String,
    pub url: String,
    pub record_type: Option<String>,
    pub venue: Option<String>,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub citation_count: Option<u64>,
}

impl NewRecord {
    /// Validates and normalizes a raw record
    ///
    /// Strings are trimmed, blank optional fields dropped, whitespace runs in
    /// the title collapsed and DOI prefixes stripped from the natural key.
    /// An unparseable publication date becomes `None`.
    ///
    /// # Returns
    ///
    /// * `Ok(NewRecord)` - All required fields present
    /// * `Err(Vec<RequiredField>)` - The required fields that were missing
    pub fn from_raw(raw: RawRecord) -> Result<Self, Vec<RequiredField>> {
        let missing = raw.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }

        let (Some(natural_key), Some(title), Some(url)) = (raw.natural_key, raw.title, raw.url)
        else {
            return Err(vec![RequiredField::NaturalKey]);
        };

        Ok(Self {
            source: raw.source,
            natural_key: normalize_natural_key(&natural_key),
            title: collapse_whitespace(&title),
            url: url.trim().to_string(),
            record_type: non_blank(raw.record_type),
            venue: non_blank(raw.venue),
            authors: raw
                .authors
                .iter()
                .map(|a| collapse_whitespace(a))
                .filter(|a| !a.is_empty())
                .collect(),
            abstract_text: non_blank(raw.abstract_text),
            publication_date: raw
                .publication_date
                .as_deref()
                .and_then(parse_publication_date),
            citation_count: raw.citation_count,
        })
    }

    /// Stamps the record with its insertion time
    pub fn into_record(self, added_at: DateTime<Utc>) -> Record {
        Record {
            source: self.source,
            natural_key: self.natural_key,
            title: self.title,
            url: self.url,
            record_type: self.record_type,
            venue: self.venue,
            authors: self.authors,
            abstract_text: self.abstract_text,
            publication_date: self.publication_date,
            citation_count: self.citation_count,
            added_at,
        }
    }
}

/// A bibliographic record as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub source: SourceId,
    pub natural_key: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub venue: Option<String>,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub citation_count: Option<u64>,
    pub added_at: DateTime<Utc>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_natural_key(key: &str) -> String {
    let key = key.trim();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"] {
        let head = key.get(..prefix.len());
        if head.is_some_and(|head| head.eq_ignore_ascii_case(prefix)) {
            return key[prefix.len()..].trim().to_string();
        }
    }
    key.to_string()
}
