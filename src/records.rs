//! Record store for committed assessments
//!
//! All records live as one JSON array under a single key. Every mutation is
//! a full read-modify-write of that array: load, change in memory, write the
//! complete new array back. Nothing is cached between calls, so records
//! written by another process sharing the same backend show up on the next
//! read. Two writers racing on the same key resolve as last-write-wins.
//!
//! Filtering, sorting and statistics are pure functions over a loaded
//! snapshot; the store methods of the same name just load first.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use icu_collator::{Collator, CollatorOptions};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assessment::validate;
use crate::error::{AppraiseError, Result};
use crate::storage::{KeyValueBackend, RECORDS_KEY};
use crate::types::{Assessment, InterviewId, Recommendation, ScoredAssessment};

/// Result of reading the collection, with any recovered parse failure
#[derive(Debug)]
pub struct LoadedRecords {
    pub records: Vec<Assessment>,

    /// Set when the stored blob was corrupt and treated as empty
    pub parse_error: Option<AppraiseError>,
}

/// Durable collection of committed assessments
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
}

impl RecordStore {
    /// Store under the default records key
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_key(backend, RECORDS_KEY)
    }

    pub fn with_key(backend: Arc<dyn KeyValueBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load every record, reporting rather than propagating corrupt data
    ///
    /// A missing key is an empty collection. A value that is not a JSON
    /// array of records is also an empty collection, with the failure
    /// returned in `parse_error`. Only a backend read failure is an `Err`.
    pub fn load_checked(&self) -> Result<LoadedRecords> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(LoadedRecords {
                records: Vec::new(),
                parse_error: None,
            });
        };

        match serde_json::from_str::<Vec<Assessment>>(&raw) {
            Ok(records) => {
                debug!("Loaded {} records from '{}'", records.len(), self.key);
                Ok(LoadedRecords {
                    records,
                    parse_error: None,
                })
            }
            Err(e) => {
                warn!("Stored records under '{}' are corrupt, treating as empty: {}", self.key, e);
                Ok(LoadedRecords {
                    records: Vec::new(),
                    parse_error: Some(AppraiseError::Parse {
                        key: self.key.clone(),
                        message: e.to_string(),
                    }),
                })
            }
        }
    }

    /// All records in insertion order
    pub fn list_all(&self) -> Result<Vec<Assessment>> {
        Ok(self.load_checked()?.records)
    }

    /// Look up one record by id
    pub fn get(&self, id: &InterviewId) -> Result<Option<Assessment>> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|r| r.id.as_ref() == Some(id)))
    }

    /// Validate and commit an assessment, returning the stored record
    pub fn append(&self, assessment: Assessment) -> Result<Assessment> {
        self.append_at(assessment, Utc::now())
    }

    /// [`append`](Self::append) with an explicit commit instant
    ///
    /// Assigns `id` and `timestamp` when unset and always stamps `saved_at`.
    /// A caller-supplied id that is already taken fails with `DuplicateId`.
    pub fn append_at(&self, mut assessment: Assessment, now: DateTime<Utc>) -> Result<Assessment> {
        validate(&assessment)?;

        let loaded = self.load_checked()?;
        if loaded.parse_error.is_some() {
            warn!("Overwriting corrupt data under '{}' with a fresh collection", self.key);
        }
        let mut records = loaded.records;

        match &assessment.id {
            Some(id) if records.iter().any(|r| r.id.as_ref() == Some(id)) => {
                return Err(AppraiseError::DuplicateId(id.to_string()));
            }
            Some(_) => {}
            None => assessment.id = Some(next_id(&records, now.timestamp_millis())?),
        }
        if assessment.timestamp.is_none() {
            assessment.timestamp = Some(now);
        }
        assessment.saved_at = Some(now);

        records.push(assessment.clone());
        self.persist(&records)?;

        info!(
            "Saved interview {} ({} records)",
            assessment.id.as_ref().map(|id| id.as_str()).unwrap_or_default(),
            records.len()
        );
        Ok(assessment)
    }

    /// Delete the record with `id`
    ///
    /// Returns whether a record was removed. Removing an unknown id is a
    /// no-op and performs no write. Confirmation is the caller's job.
    pub fn remove(&self, id: &InterviewId) -> Result<bool> {
        let mut records = self.list_all()?;
        let before = records.len();
        records.retain(|r| r.id.as_ref() != Some(id));

        if records.len() == before {
            debug!("Remove of unknown interview {} ignored", id);
            return Ok(false);
        }

        self.persist(&records)?;
        info!("Deleted interview {}", id);
        Ok(true)
    }

    /// Records matching every criterion of `filter`
    pub fn filter(&self, filter: &RecordFilter) -> Result<Vec<Assessment>> {
        Ok(filter_records(&self.list_all()?, filter))
    }

    /// All records in `order`
    pub fn sort(&self, order: SortOrder) -> Result<Vec<Assessment>> {
        let mut records = self.list_all()?;
        sort_records(&mut records, order);
        Ok(records)
    }

    /// Dashboard counters over the whole collection
    pub fn aggregate_statistics(&self) -> Result<Statistics> {
        Ok(Statistics::compute_at(&self.list_all()?, &Local::now()))
    }

    fn persist(&self, records: &[Assessment]) -> Result<()> {
        let stored: Vec<ScoredAssessment<'_>> =
            records.iter().map(Assessment::with_scores).collect();
        let json = serde_json::to_string(&stored)?;
        self.backend.set(&self.key, &json)
    }
}

/// Fresh id from `now_ms`, bumped past every existing `INT-<ms>` id
///
/// Fails when the bump would overflow or the result is already taken.
fn next_id(records: &[Assessment], now_ms: i64) -> Result<InterviewId> {
    let highest = records
        .iter()
        .filter_map(|r| r.id.as_ref()?.millis())
        .max();

    let millis = match highest {
        Some(ms) => ms
            .checked_add(1)
            .ok_or_else(|| AppraiseError::DuplicateId(InterviewId::from_millis(ms).to_string()))?
            .max(now_ms),
        None => now_ms,
    };

    let id = InterviewId::from_millis(millis);
    if records.iter().any(|r| r.id.as_ref() == Some(&id)) {
        return Err(AppraiseError::DuplicateId(id.to_string()));
    }
    Ok(id)
}

/// Admin list filter; `None` criteria match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Case-insensitive substring of the canonical applicant name
    pub name: Option<String>,

    pub recommendation: Option<Recommendation>,

    /// UTC calendar date of the record timestamp
    pub date: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().map_or(true, |n| n.trim().is_empty())
            && self.recommendation.is_none()
            && self.date.is_none()
    }

    pub fn matches(&self, record: &Assessment) -> bool {
        let name_match = match self.name.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => record
                .canonical_name()
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        };

        let recommendation_match = self
            .recommendation
            .map_or(true, |rec| record.recommendation() == Some(rec));

        let date_match = self.date.map_or(true, |date| {
            record
                .timestamp
                .map_or(false, |ts| ts.date_naive() == date)
        });

        name_match && recommendation_match && date_match
    }
}

/// Subsequence of `records` matching `filter`, order preserved
pub fn filter_records(records: &[Assessment], filter: &RecordFilter) -> Vec<Assessment> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Date,
    Name,
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort key plus direction, written `date-desc`, `name-asc`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

impl Default for SortOrder {
    /// Newest first
    fn default() -> Self {
        Self::new(SortKey::Date, SortDirection::Desc)
    }
}

impl FromStr for SortOrder {
    type Err = AppraiseError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, direction) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| AppraiseError::Other(format!("invalid sort order: {}", s)))?;

        let key = match key {
            "date" => SortKey::Date,
            "name" => SortKey::Name,
            "score" => SortKey::Score,
            other => return Err(AppraiseError::Other(format!("unknown sort key: {}", other))),
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(AppraiseError::Other(format!(
                    "unknown sort direction: {}",
                    other
                )))
            }
        };
        Ok(Self::new(key, direction))
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = match self.key {
            SortKey::Date => "date",
            SortKey::Name => "name",
            SortKey::Score => "score",
        };
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}-{}", key, direction)
    }
}

/// Locale-aware name ordering
///
/// Uses the root collation order, so accented names sort alongside their
/// base letters and case differences are secondary. Names the collator
/// considers equal fall back to raw string order.
pub struct NameCollator {
    collator: Option<Collator>,
}

impl NameCollator {
    pub fn new() -> Self {
        let collator = Collator::try_new(&Default::default(), CollatorOptions::new())
            .map_err(|e| warn!("Collation data unavailable, using case-folded order: {}", e))
            .ok();
        Self { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let primary = match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()),
        };
        primary.then_with(|| a.cmp(b))
    }
}

impl Default for NameCollator {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two names with a one-off [`NameCollator`]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    NameCollator::new().compare(a, b)
}

/// Stable in-place sort; equal keys keep their relative order
pub fn sort_records(records: &mut [Assessment], order: SortOrder) {
    let names = NameCollator::new();
    let compare = |a: &Assessment, b: &Assessment| match order.key {
        SortKey::Date => a.timestamp.cmp(&b.timestamp),
        SortKey::Name => names.compare(&a.canonical_name(), &b.canonical_name()),
        SortKey::Score => a.scores().total.cmp(&b.scores().total),
    };

    records.sort_by(|a, b| match order.direction {
        SortDirection::Asc => compare(a, b),
        SortDirection::Desc => compare(a, b).reverse(),
    });
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub count: usize,

    /// Strongly recommended or recommended
    pub recommended: usize,

    /// Created in the calendar month of `now`, in `now`'s time zone
    pub this_month: usize,

    /// Mean total score rounded to the nearest integer, 0 when empty
    pub avg_score: u32,
}

impl Statistics {
    pub fn compute_at<Tz: TimeZone>(records: &[Assessment], now: &DateTime<Tz>) -> Self {
        let count = records.len();
        if count == 0 {
            return Self::default();
        }

        let recommended = records
            .iter()
            .filter(|r| r.recommendation().map_or(false, |rec| rec.is_positive()))
            .count();

        let tz = now.timezone();
        let this_month = records
            .iter()
            .filter_map(|r| r.timestamp)
            .map(|ts| ts.with_timezone(&tz))
            .filter(|ts| ts.year() == now.year() && ts.month() == now.month())
            .count();

        let sum: u64 = records.iter().map(|r| r.scores().total as u64).sum();
        let count_u64 = count as u64;
        let avg_score = ((2 * sum + count_u64) / (2 * count_u64)) as u32;

        Self {
            count,
            recommended,
            this_month,
            avg_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::types::{ApplicantName, BasicInfo, FinalDecision, RatingGroup, SpiritualChecklist};
    use chrono::FixedOffset;

    fn record(name: &str, rec: Recommendation, admin: [u8; 5], ts: &str) -> Assessment {
        Assessment {
            timestamp: Some(DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)),
            basic_info: BasicInfo {
                applicant: ApplicantName::combined(name),
                date: "2024-05-01".into(),
                interviewer: "Pastor Lee".into(),
            },
            spiritual_assessment: SpiritualChecklist::all_confirmed(),
            administrative_skills: RatingGroup::new(admin),
            ethics_check: "Confidential".into(),
            final_decision: FinalDecision {
                recommendation: Some(rec),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn store() -> RecordStore {
        RecordStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_next_id_skips_past_existing() {
        let mut existing = record("A", Recommendation::Consider, [0; 5], "2024-05-01T12:00:00Z");
        existing.id = Some(InterviewId::from_millis(5_000));

        assert_eq!(next_id(&[], 1_000).unwrap(), InterviewId::from_millis(1_000));
        assert_eq!(
            next_id(std::slice::from_ref(&existing), 1_000).unwrap(),
            InterviewId::from_millis(5_001)
        );
        assert_eq!(
            next_id(std::slice::from_ref(&existing), 9_000).unwrap(),
            InterviewId::from_millis(9_000)
        );
    }

    #[test]
    fn test_append_after_max_id_is_rejected() {
        let store = store();
        let mut seeded = record("Max", Recommendation::Consider, [1; 5], "2024-05-01T12:00:00Z");
        seeded.id = Some(InterviewId::from("INT-9223372036854775807"));
        store.append(seeded).unwrap();

        let err = store
            .append(record("Next", Recommendation::Consider, [1; 5], "2024-05-02T12:00:00Z"))
            .unwrap_err();
        assert!(matches!(err, AppraiseError::DuplicateId(_)));

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].canonical_name(), "Max");
    }

    #[test]
    fn test_same_millisecond_appends_get_distinct_ids() {
        let store = store();
        let now = Utc::now();
        let a = store
            .append_at(record("A", Recommendation::Consider, [1; 5], "2024-05-01T12:00:00Z"), now)
            .unwrap();
        let b = store
            .append_at(record("B", Recommendation::Consider, [1; 5], "2024-05-01T12:00:00Z"), now)
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_append_rejects_invalid() {
        let store = store();
        let mut invalid = record("A", Recommendation::Consider, [1; 5], "2024-05-01T12:00:00Z");
        invalid.ethics_check = "  ".into();

        let err = store.append(invalid).unwrap_err();
        assert!(err.is_user_fixable());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_rejects_duplicate_preset_id() {
        let store = store();
        let saved = store
            .append(record("A", Recommendation::Consider, [1; 5], "2024-05-01T12:00:00Z"))
            .unwrap();

        let mut clash = record("B", Recommendation::Consider, [1; 5], "2024-05-01T12:00:00Z");
        clash.id = saved.id.clone();
        assert!(matches!(
            store.append(clash),
            Err(AppraiseError::DuplicateId(_))
        ));
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_filter_by_recommendation() {
        let records = vec![
            record("Alice", Recommendation::Recommend, [1; 5], "2024-05-01T12:00:00Z"),
            record("Bob", Recommendation::Consider, [1; 5], "2024-05-02T12:00:00Z"),
            record("Cara", Recommendation::StronglyRecommend, [1; 5], "2024-05-03T12:00:00Z"),
        ];
        let filter = RecordFilter {
            recommendation: Some(Recommendation::Recommend),
            ..Default::default()
        };

        let matched = filter_records(&records, &filter);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].canonical_name(), "Alice");
    }

    #[test]
    fn test_filter_name_and_date() {
        let alice =
            record("Alice Smith", Recommendation::Recommend, [1; 5], "2024-05-01T12:00:00Z");
        let filter = RecordFilter {
            name: Some("SMI".into()),
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        assert!(filter.matches(&alice));

        let wrong_day = RecordFilter {
            date: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };
        assert!(!wrong_day.matches(&alice));

        // Local 2024-05-02 09:30 at +14 is still May 1st in UTC
        let late = record("Bea", Recommendation::Recommend, [1; 5], "2024-05-02T09:30:00+14:00");
        let may_first = RecordFilter {
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        assert!(may_first.matches(&late));
        assert!(!wrong_day.matches(&late));

        assert!(RecordFilter::default().is_empty());
        assert!(RecordFilter::default().matches(&alice));
    }

    #[test]
    fn test_sort_by_score_desc() {
        let mut records = vec![
            record("A", Recommendation::Consider, [8; 5], "2024-05-01T12:00:00Z"),
            record("B", Recommendation::Consider, [10, 10, 10, 10, 10], "2024-05-02T12:00:00Z"),
            record("C", Recommendation::Consider, [10, 10, 10, 5, 0], "2024-05-03T12:00:00Z"),
        ];
        records[1].financial_skills = RatingGroup::new([8; 5]);
        records[2].financial_skills = RatingGroup::new([6, 6, 6, 6, 6]);

        let totals: Vec<u32> = records.iter().map(|r| r.scores().total).collect();
        assert_eq!(totals, vec![40, 90, 65]);

        sort_records(&mut records, SortOrder::new(SortKey::Score, SortDirection::Desc));
        let totals: Vec<u32> = records.iter().map(|r| r.scores().total).collect();
        assert_eq!(totals, vec![90, 65, 40]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![
            record("First", Recommendation::Consider, [5; 5], "2024-05-01T12:00:00Z"),
            record("Second", Recommendation::Consider, [5; 5], "2024-05-01T12:00:00Z"),
            record("Third", Recommendation::Consider, [5; 5], "2024-05-01T12:00:00Z"),
        ];

        sort_records(&mut records, SortOrder::new(SortKey::Score, SortDirection::Desc));
        let names: Vec<String> = records.iter().map(|r| r.canonical_name()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_sort_by_name_case_insensitive() {
        let mut records = vec![
            record("bob", Recommendation::Consider, [0; 5], "2024-05-01T12:00:00Z"),
            record("Alice", Recommendation::Consider, [0; 5], "2024-05-02T12:00:00Z"),
            record("Carol", Recommendation::Consider, [0; 5], "2024-05-03T12:00:00Z"),
        ];
        records.push(Assessment::default());

        sort_records(&mut records, SortOrder::new(SortKey::Name, SortDirection::Asc));
        let names: Vec<String> = records.iter().map(|r| r.canonical_name()).collect();
        assert_eq!(names, vec!["Alice", "bob", "Carol", "Unknown"]);
    }

    #[test]
    fn test_sort_by_name_accented() {
        let mut records = vec![
            record("Zoe", Recommendation::Consider, [0; 5], "2024-05-01T12:00:00Z"),
            record("Émile", Recommendation::Consider, [0; 5], "2024-05-02T12:00:00Z"),
            record("Adam", Recommendation::Consider, [0; 5], "2024-05-03T12:00:00Z"),
        ];

        sort_records(&mut records, "name-asc".parse().unwrap());
        let names: Vec<String> = records.iter().map(|r| r.canonical_name()).collect();
        assert_eq!(names, vec!["Adam", "Émile", "Zoe"]);

        assert_eq!(compare_names("Émile", "Zoe"), Ordering::Less);
        assert_ne!(compare_names("bob", "Bob"), Ordering::Equal);
    }

    #[test]
    fn test_sort_by_date() {
        let mut records = vec![
            record("Mid", Recommendation::Consider, [0; 5], "2024-05-02T12:00:00Z"),
            record("Old", Recommendation::Consider, [0; 5], "2024-05-01T12:00:00Z"),
            record("New", Recommendation::Consider, [0; 5], "2024-05-03T12:00:00Z"),
        ];

        sort_records(&mut records, "date-desc".parse().unwrap());
        let names: Vec<String> = records.iter().map(|r| r.canonical_name()).collect();
        assert_eq!(names, vec!["New", "Mid", "Old"]);
    }

    #[test]
    fn test_sort_order_parsing() {
        let order: SortOrder = "name-asc".parse().unwrap();
        assert_eq!(order, SortOrder::new(SortKey::Name, SortDirection::Asc));
        assert_eq!(order.to_string(), "name-asc");
        assert!("score".parse::<SortOrder>().is_err());
        assert!("height-asc".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::default().to_string(), "date-desc");
    }

    #[test]
    fn test_statistics() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();

        assert_eq!(Statistics::compute_at(&[], &now), Statistics::default());

        let records = vec![
            record("A", Recommendation::StronglyRecommend, [10; 5], "2024-05-01T12:00:00Z"),
            record("B", Recommendation::Recommend, [5; 5], "2024-05-15T12:00:00Z"),
            record("C", Recommendation::NotRecommend, [3, 0, 0, 0, 0], "2024-04-30T12:00:00Z"),
        ];
        let stats = Statistics::compute_at(&records, &now);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.recommended, 2);
        assert_eq!(stats.this_month, 2);
        // (50 + 25 + 3) / 3 = 26.0
        assert_eq!(stats.avg_score, 26);
    }

    #[test]
    fn test_statistics_average_rounds_half_up() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();
        let records = vec![
            record("A", Recommendation::Consider, [1, 0, 0, 0, 0], "2024-05-01T12:00:00Z"),
            record("B", Recommendation::Consider, [0; 5], "2024-05-01T12:00:00Z"),
        ];
        assert_eq!(Statistics::compute_at(&records, &now).avg_score, 1);
    }
}
