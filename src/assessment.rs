//! Draft building, validation and submission
//!
//! [`FormInput`] is the raw state of the assessment form. [`build_draft`]
//! turns it into an [`Assessment`] (partial is fine), [`validate`] is the
//! fail-fast submit gate, and [`submit`] runs the whole commit path:
//! build, validate, append to the record store, clear the draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::draft::{Autosaver, DraftStore};
use crate::error::{Result, ValidationError};
use crate::records::RecordStore;
use crate::scoring::ScoreSummary;
use crate::types::{
    ApplicantName, Assessment, BasicInfo, FinalDecision, RatingGroup, SpiritualChecklist,
};

/// Raw form field values
///
/// Ratings are kept as raw JSON values keyed by item name because the form
/// may hold nothing, a number, or a string for each item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormInput {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub applicant_name: Option<String>,
    pub date: String,
    pub interviewer: String,
    pub spiritual: SpiritualChecklist,
    pub administrative: BTreeMap<String, Value>,
    pub financial: BTreeMap<String, Value>,
    pub ethics_response: String,
    pub recommendation: String,
    pub remarks: String,
    pub signature: String,
    pub signature_date: String,
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Assemble a draft stamped with the current instant
pub fn build_draft(raw: &FormInput) -> Assessment {
    build_draft_at(raw, Utc::now())
}

/// Assemble a draft stamped with `now`
///
/// Every rating key is filled (unselected items are 0) and an unknown
/// recommendation value is dropped rather than rejected; the validator
/// reports it later.
pub fn build_draft_at(raw: &FormInput, now: DateTime<Utc>) -> Assessment {
    let draft = Assessment {
        id: None,
        timestamp: Some(now),
        saved_at: None,
        basic_info: BasicInfo {
            applicant: ApplicantName {
                full_name: raw.full_name.clone(),
                first_name: raw.first_name.clone(),
                last_name: raw.last_name.clone(),
                applicant_name: raw.applicant_name.clone(),
            },
            date: raw.date.clone(),
            interviewer: raw.interviewer.clone(),
        },
        spiritual_assessment: raw.spiritual.clone(),
        administrative_skills: RatingGroup::from_raw(&raw.administrative),
        financial_skills: RatingGroup::from_raw(&raw.financial),
        ethics_check: raw.ethics_response.clone(),
        final_decision: FinalDecision {
            recommendation: raw.recommendation.parse().ok(),
            remarks: non_empty(&raw.remarks),
            interviewer_signature: non_empty(&raw.signature),
            signature_date: non_empty(&raw.signature_date),
        },
    };

    debug!("Built draft, total score {}", draft.scores().total);
    draft
}

/// Live score summary for the current form state
pub fn summarize(raw: &FormInput) -> ScoreSummary {
    let draft = build_draft(raw);
    ScoreSummary::from(draft.scores())
}

/// Check an assessment against the submit gate
///
/// Checks run in a fixed order and the first failure is returned:
/// basic info, the checklist, the ethics response, the recommendation.
pub fn validate(assessment: &Assessment) -> std::result::Result<(), ValidationError> {
    let info = &assessment.basic_info;
    if !info.applicant.is_known() {
        return Err(ValidationError::MissingApplicantName);
    }
    if info.date.trim().is_empty() {
        return Err(ValidationError::MissingDate);
    }
    if info.interviewer.trim().is_empty() {
        return Err(ValidationError::MissingInterviewer);
    }

    if let Some(item) = assessment.spiritual_assessment.first_unmet() {
        return Err(ValidationError::ChecklistIncomplete(item));
    }

    if assessment.ethics_check.trim().is_empty() {
        return Err(ValidationError::MissingEthicsResponse);
    }

    if assessment.final_decision.recommendation.is_none() {
        return Err(ValidationError::MissingRecommendation);
    }

    Ok(())
}

/// Commit the form: build, validate, append, then clear the draft
///
/// Validation happens inside [`RecordStore::append`]. The draft is only
/// cleared after the append succeeds, so a rejected write leaves the
/// autosaved state in place for another attempt.
pub fn submit(raw: &FormInput, records: &RecordStore, drafts: &DraftStore) -> Result<Assessment> {
    let committed = records.append(build_draft(raw))?;
    drafts.clear_draft()?;

    info!(
        "Submitted assessment {} for {}",
        committed.id.as_ref().map(|id| id.as_str()).unwrap_or_default(),
        committed.canonical_name()
    );
    Ok(committed)
}

/// [`submit`] for a form that is being autosaved
///
/// After a successful append the pending autosave is cancelled before the
/// draft is cleared, so a late timer cannot bring the draft back. A failed
/// submit leaves the autosaver untouched.
pub fn submit_autosaved(
    raw: &FormInput,
    records: &RecordStore,
    autosaver: &mut Autosaver,
) -> Result<Assessment> {
    let committed = records.append(build_draft(raw))?;
    autosaver.cancel();
    autosaver.store().clear_draft()?;

    info!(
        "Submitted assessment {} for {}",
        committed.id.as_ref().map(|id| id.as_str()).unwrap_or_default(),
        committed.canonical_name()
    );
    Ok(committed)
}

impl From<&Assessment> for FormInput {
    /// Restore form fields from a saved draft
    ///
    /// Ratings of 0 are left unselected, matching how an untouched form looks.
    fn from(a: &Assessment) -> Self {
        fn raw_ratings(group: &RatingGroup) -> BTreeMap<String, Value> {
            RatingGroup::KEYS
                .iter()
                .zip(group.values())
                .filter(|(_, v)| *v > 0)
                .map(|(k, v)| (k.to_string(), Value::from(v)))
                .collect()
        }

        let applicant = &a.basic_info.applicant;
        let decision = &a.final_decision;
        Self {
            full_name: applicant.full_name.clone(),
            first_name: applicant.first_name.clone(),
            last_name: applicant.last_name.clone(),
            applicant_name: applicant.applicant_name.clone(),
            date: a.basic_info.date.clone(),
            interviewer: a.basic_info.interviewer.clone(),
            spiritual: a.spiritual_assessment.clone(),
            administrative: raw_ratings(&a.administrative_skills),
            financial: raw_ratings(&a.financial_skills),
            ethics_response: a.ethics_check.clone(),
            recommendation: decision
                .recommendation
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            remarks: decision.remarks.clone().unwrap_or_default(),
            signature: decision.interviewer_signature.clone().unwrap_or_default(),
            signature_date: decision.signature_date.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{compute_group_total, GROUP_MAX};
    use crate::types::Recommendation;
    use proptest::prelude::*;
    use serde_json::json;

    fn complete_input() -> FormInput {
        let ratings: BTreeMap<String, Value> = [
            ("skill1", json!(8)),
            ("skill2", json!(7)),
            ("skill3", json!(9)),
            ("skill4", json!(6)),
            ("skill5", json!(10)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        FormInput {
            full_name: Some("Jane Doe".into()),
            date: "2024-05-01".into(),
            interviewer: "Pastor Lee".into(),
            spiritual: SpiritualChecklist::all_confirmed(),
            administrative: ratings.clone(),
            financial: ratings,
            ethics_response: "Keep it within the finance committee".into(),
            recommendation: "recommend".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_draft_from_empty_form() {
        let draft = build_draft(&FormInput::default());
        assert_eq!(draft.administrative_skills.values(), [0; 5]);
        assert_eq!(draft.scores().total, 0);
        assert!(draft.timestamp.is_some());
        assert!(draft.id.is_none());
        assert_eq!(draft.final_decision.remarks, None);
    }

    #[test]
    fn test_build_draft_scores() {
        let draft = build_draft(&complete_input());
        let scores = draft.scores();
        assert_eq!(scores.administrative, 40);
        assert_eq!(scores.financial, 40);
        assert_eq!(scores.total, 80);

        let summary = summarize(&complete_input());
        assert_eq!(summary.administrative_percent, 80);
        assert_eq!(summary.total_percent, 80);
    }

    #[test]
    fn test_complete_assessment_passes() {
        let draft = build_draft(&complete_input());
        assert_eq!(validate(&draft), Ok(()));
        assert_eq!(
            draft.final_decision.recommendation,
            Some(Recommendation::Recommend)
        );
    }

    #[test]
    fn test_each_missing_checklist_item_fails() {
        let base = build_draft(&complete_input());
        for index in 0..5 {
            let mut draft = base.clone();
            let checklist = &mut draft.spiritual_assessment;
            match index {
                0 => checklist.born_again = false,
                1 => checklist.active_church = false,
                2 => checklist.integrity = false,
                3 => checklist.obedient = false,
                _ => checklist.communication = false,
            }
            assert!(matches!(
                validate(&draft),
                Err(ValidationError::ChecklistIncomplete(_))
            ));
        }
    }

    #[test]
    fn test_validation_order() {
        let mut input = complete_input();
        input.full_name = None;
        input.interviewer = String::new();
        input.spiritual.integrity = false;
        assert_eq!(
            validate(&build_draft(&input)),
            Err(ValidationError::MissingApplicantName)
        );

        input.first_name = Some("Jane".into());
        input.last_name = Some("Doe".into());
        assert_eq!(
            validate(&build_draft(&input)),
            Err(ValidationError::MissingInterviewer)
        );

        input.interviewer = "Pastor Lee".into();
        assert_eq!(
            validate(&build_draft(&input)),
            Err(ValidationError::ChecklistIncomplete("integrity"))
        );

        input.spiritual.integrity = true;
        input.ethics_response = "   \n".into();
        assert_eq!(
            validate(&build_draft(&input)),
            Err(ValidationError::MissingEthicsResponse)
        );

        input.ethics_response = "Confidential".into();
        input.recommendation = "hire-immediately".into();
        assert_eq!(
            validate(&build_draft(&input)),
            Err(ValidationError::MissingRecommendation)
        );
    }

    #[test]
    fn test_missing_date_fails() {
        let mut input = complete_input();
        input.date = String::new();
        assert_eq!(
            validate(&build_draft(&input)),
            Err(ValidationError::MissingDate)
        );
    }

    #[test]
    fn test_restore_form_from_draft() {
        let mut input = complete_input();
        input.administrative.insert("skill2".into(), json!(0));
        input.remarks = "Strong candidate".into();

        let draft = build_draft(&input);
        let restored = FormInput::from(&draft);

        assert_eq!(restored.full_name.as_deref(), Some("Jane Doe"));
        assert!(!restored.administrative.contains_key("skill2"));
        assert_eq!(restored.administrative["skill5"], json!(10));
        assert_eq!(restored.recommendation, "recommend");
        assert_eq!(restored.remarks, "Strong candidate");
        assert_eq!(build_draft(&restored).scores(), draft.scores());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_cancels_pending_autosave() {
        let backend = std::sync::Arc::new(crate::storage::MemoryBackend::new());
        let records = RecordStore::new(backend.clone());
        let mut autosaver = Autosaver::new(
            DraftStore::new(backend),
            tokio::time::Duration::from_millis(1000),
        );

        autosaver.record_change(build_draft(&complete_input()));
        assert!(autosaver.is_pending());

        submit_autosaved(&complete_input(), &records, &mut autosaver).unwrap();
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        assert!(!autosaver.store().has_draft().unwrap());
        assert_eq!(records.list_all().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_autosaved_submit_keeps_pending_draft() {
        let backend = std::sync::Arc::new(crate::storage::MemoryBackend::new());
        let records = RecordStore::new(backend.clone());
        let mut autosaver = Autosaver::new(
            DraftStore::new(backend),
            tokio::time::Duration::from_millis(1000),
        );

        let mut input = complete_input();
        input.interviewer = String::new();
        autosaver.record_change(build_draft(&input));

        assert!(submit_autosaved(&input, &records, &mut autosaver).is_err());
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        assert!(autosaver.store().has_draft().unwrap());
        assert!(records.list_all().unwrap().is_empty());
    }

    fn raw_rating() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_map(|f| json!(f)),
            "-?[0-9]{1,3}(\\.[0-9])?".prop_map(Value::from),
            ".{0,6}".prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    fn raw_group() -> impl Strategy<Value = BTreeMap<String, Value>> {
        prop::collection::vec(prop::option::of(raw_rating()), RatingGroup::KEYS.len()).prop_map(
            |values| {
                RatingGroup::KEYS
                    .iter()
                    .zip(values)
                    .filter_map(|(key, value)| Some((key.to_string(), value?)))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_draft_total_is_sum_of_groups(
            administrative in raw_group(),
            financial in raw_group(),
        ) {
            let input = FormInput {
                administrative,
                financial,
                ..Default::default()
            };
            let scores = build_draft(&input).scores();

            prop_assert_eq!(scores.total, scores.administrative + scores.financial);
            prop_assert_eq!(scores.administrative, compute_group_total(&input.administrative));
            prop_assert_eq!(scores.financial, compute_group_total(&input.financial));
            prop_assert!(scores.administrative <= GROUP_MAX);
            prop_assert!(scores.financial <= GROUP_MAX);
        }
    }
}
