//! Core data types for Appraise
//!
//! This module defines the assessment aggregate and its parts: applicant
//! name fields, the spiritual checklist, the two rating groups, the final
//! decision and the derived scores. The serialized shape is camelCase JSON,
//! and every field deserializes leniently so older records with missing or
//! oddly typed fields still load.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::scoring::{self, RATINGS_PER_GROUP};

/// Placeholder used when no name field is present on a record
pub const UNKNOWN_APPLICANT: &str = "Unknown";

/// Prefix of every committed record id
pub const ID_PREFIX: &str = "INT-";

/// Unique identifier for committed records
///
/// Fresh ids have the form `INT-<epoch millis>`; ids loaded from storage are
/// kept verbatim even when they do not follow that form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterviewId(pub String);

impl InterviewId {
    /// Build an id from an epoch-millisecond stamp
    pub fn from_millis(millis: i64) -> Self {
        Self(format!("{}{}", ID_PREFIX, millis))
    }

    /// The millisecond stamp of a well-formed id
    pub fn millis(&self) -> Option<i64> {
        self.0.strip_prefix(ID_PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InterviewId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for InterviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final hiring recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    StronglyRecommend,
    Recommend,
    Consider,
    NotRecommend,
}

impl Recommendation {
    pub const ALL: [Recommendation; 4] = [
        Recommendation::StronglyRecommend,
        Recommendation::Recommend,
        Recommendation::Consider,
        Recommendation::NotRecommend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StronglyRecommend => "strongly-recommend",
            Recommendation::Recommend => "recommend",
            Recommendation::Consider => "consider",
            Recommendation::NotRecommend => "not-recommend",
        }
    }

    /// Human-readable label for badges and reports
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::StronglyRecommend => "Strongly Recommend",
            Recommendation::Recommend => "Recommend",
            Recommendation::Consider => "Consider",
            Recommendation::NotRecommend => "Not Recommend",
        }
    }

    /// Counted as "recommended" in dashboard statistics
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            Recommendation::StronglyRecommend | Recommendation::Recommend
        )
    }

    /// Label for an optional recommendation
    pub fn label_or_unspecified(rec: Option<Recommendation>) -> &'static str {
        rec.map(|r| r.label()).unwrap_or("Not Specified")
    }
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Recommendation::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| format!("unknown recommendation: {}", s))
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The five mandatory character checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpiritualChecklist {
    #[serde(deserialize_with = "lenient::flag")]
    pub born_again: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub active_church: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub integrity: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub obedient: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub communication: bool,
}

impl SpiritualChecklist {
    /// A checklist with every item confirmed
    pub fn all_confirmed() -> Self {
        Self {
            born_again: true,
            active_church: true,
            integrity: true,
            obedient: true,
            communication: true,
        }
    }

    /// Items in form order, keyed by their serialized names
    pub fn items(&self) -> [(&'static str, bool); 5] {
        [
            ("bornAgain", self.born_again),
            ("activeChurch", self.active_church),
            ("integrity", self.integrity),
            ("obedient", self.obedient),
            ("communication", self.communication),
        ]
    }

    /// First unconfirmed item, if any
    pub fn first_unmet(&self) -> Option<&'static str> {
        self.items()
            .into_iter()
            .find(|(_, checked)| !checked)
            .map(|(name, _)| name)
    }

    pub fn is_complete(&self) -> bool {
        self.first_unmet().is_none()
    }
}

/// Five ratings of one skill group, each in `0..=10`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingGroup {
    #[serde(deserialize_with = "lenient::rating")]
    pub skill1: u8,
    #[serde(deserialize_with = "lenient::rating")]
    pub skill2: u8,
    #[serde(deserialize_with = "lenient::rating")]
    pub skill3: u8,
    #[serde(deserialize_with = "lenient::rating")]
    pub skill4: u8,
    #[serde(deserialize_with = "lenient::rating")]
    pub skill5: u8,
}

impl RatingGroup {
    pub const KEYS: [&'static str; RATINGS_PER_GROUP] =
        ["skill1", "skill2", "skill3", "skill4", "skill5"];

    pub fn new(values: [u8; RATINGS_PER_GROUP]) -> Self {
        let [skill1, skill2, skill3, skill4, skill5] =
            values.map(|v| scoring::clamp_rating(v as i64));
        Self {
            skill1,
            skill2,
            skill3,
            skill4,
            skill5,
        }
    }

    /// Build from raw form values, filling every key even if unselected
    pub fn from_raw(raw: &BTreeMap<String, Value>) -> Self {
        let values = Self::KEYS.map(|key| raw.get(key).map(scoring::coerce_rating).unwrap_or(0));
        Self::new(values)
    }

    pub fn values(&self) -> [u8; RATINGS_PER_GROUP] {
        [self.skill1, self.skill2, self.skill3, self.skill4, self.skill5]
    }

    /// Group total; out-of-range fields are clamped before summing
    pub fn total(&self) -> u32 {
        self.values()
            .iter()
            .map(|v| scoring::clamp_rating(*v as i64) as u32)
            .sum()
    }
}

/// Derived score totals
///
/// Never stored on the aggregate; always computed from the rating groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub administrative: u32,
    pub financial: u32,
    pub total: u32,
}

impl Scores {
    pub fn from_groups(administrative: &RatingGroup, financial: &RatingGroup) -> Self {
        let administrative = administrative.total();
        let financial = financial.total();
        Self {
            administrative,
            financial,
            total: administrative + financial,
        }
    }
}

/// Applicant name fields as they appear across record generations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicantName {
    /// Combined name, current form
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub last_name: Option<String>,

    /// Single name field of older records
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub applicant_name: Option<String>,
}

/// Which name field a canonical name was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource<'a> {
    Combined(&'a str),
    Split { first: &'a str, last: &'a str },
    Legacy(&'a str),
    Unknown,
}

impl ApplicantName {
    pub fn combined(name: impl Into<String>) -> Self {
        Self {
            full_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn split(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            ..Default::default()
        }
    }

    pub fn legacy(name: impl Into<String>) -> Self {
        Self {
            applicant_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Resolve which field supplies the name; blank fields count as absent
    pub fn source(&self) -> NameSource<'_> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(name) = present(&self.full_name) {
            return NameSource::Combined(name);
        }
        if let (Some(first), Some(last)) = (present(&self.first_name), present(&self.last_name)) {
            return NameSource::Split { first, last };
        }
        if let Some(name) = present(&self.applicant_name) {
            return NameSource::Legacy(name);
        }
        NameSource::Unknown
    }

    /// The single display name used for rendering, search, sort and export
    pub fn canonical(&self) -> String {
        match self.source() {
            NameSource::Combined(name) | NameSource::Legacy(name) => name.to_string(),
            NameSource::Split { first, last } => format!("{} {}", first, last),
            NameSource::Unknown => UNKNOWN_APPLICANT.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.source() != NameSource::Unknown
    }
}

/// Who was interviewed, when, and by whom
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicInfo {
    #[serde(flatten)]
    pub applicant: ApplicantName,

    /// Interview date as entered (`YYYY-MM-DD`)
    #[serde(deserialize_with = "lenient::string")]
    pub date: String,

    #[serde(deserialize_with = "lenient::string")]
    pub interviewer: String,
}

/// Recommendation, remarks and sign-off
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalDecision {
    #[serde(deserialize_with = "lenient::recommendation")]
    pub recommendation: Option<Recommendation>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub remarks: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub interviewer_signature: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub signature_date: Option<String>,
}

/// One interview assessment, draft or committed
///
/// Drafts may be partial and carry no id. Records returned by the record
/// store always have `id`, `timestamp` and `saved_at` populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<InterviewId>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::instant")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::instant")]
    pub saved_at: Option<DateTime<Utc>>,

    pub basic_info: BasicInfo,

    pub spiritual_assessment: SpiritualChecklist,

    pub administrative_skills: RatingGroup,

    pub financial_skills: RatingGroup,

    #[serde(deserialize_with = "lenient::string")]
    pub ethics_check: String,

    pub final_decision: FinalDecision,
}

impl Assessment {
    /// Scores derived from the current ratings
    pub fn scores(&self) -> Scores {
        Scores::from_groups(&self.administrative_skills, &self.financial_skills)
    }

    pub fn canonical_name(&self) -> String {
        self.basic_info.applicant.canonical()
    }

    pub fn recommendation(&self) -> Option<Recommendation> {
        self.final_decision.recommendation
    }

    /// View that serializes the record together with its derived scores
    pub fn with_scores(&self) -> ScoredAssessment<'_> {
        ScoredAssessment {
            assessment: self,
            scores: self.scores(),
        }
    }
}

/// Serialized form of an assessment: its fields plus a `scores` object
///
/// Readers of persisted data ignore `scores` and recompute it.
#[derive(Debug, Serialize)]
pub struct ScoredAssessment<'a> {
    #[serde(flatten)]
    pub assessment: &'a Assessment,
    pub scores: Scores,
}

/// Field deserializers that fall back instead of failing
mod lenient {
    use super::*;
    use serde::Deserializer;

    pub fn rating<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(scoring::coerce_rating(&v))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(matches!(Value::deserialize(d)?, Value::Bool(true)))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn recommendation<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Recommendation>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }

    /// RFC 3339 strings or epoch milliseconds
    pub fn instant<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        })
    }
}
