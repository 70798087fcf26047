//! Tool layer: the three deterministic operations the model may request.
//!
//! Every outcome, including lookups that miss and leads that fail
//! validation, is returned as an [`Observation`] for the model to read.
//! Only the lead sink performs I/O.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::core::lead::{LeadDraft, LeadField, RecruiterLead};
use crate::core::profile::{NotFound, ProfileDocument};
use crate::core::tool::ToolCall;
use crate::io::sink::LeadSink;

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Stored profile data, returned as-is.
    Value(Value),
    NotFound(NotFound),
    /// Lead rejected before reaching the sink.
    Invalid { missing: Vec<LeadField> },
    LeadLogged(RecruiterLead),
    LeadCaptureFailed { reason: String },
    /// The call was not executed.
    Refused { reason: String },
}

impl Observation {
    /// Payload shown to the model.
    pub fn to_json(&self) -> Value {
        match self {
            Observation::Value(value) => value.clone(),
            Observation::NotFound(err) => json!({
                "error": "not_found",
                "kind": err.kind,
                "key": err.key,
                "message": err.to_string(),
            }),
            Observation::Invalid { missing } => json!({
                "error": "validation_error",
                "missing": missing,
                "message": "ask the recruiter for the missing fields before logging the lead",
            }),
            Observation::LeadLogged(lead) => json!({
                "status": "logged",
                "lead": lead,
            }),
            Observation::LeadCaptureFailed { reason } => json!({
                "error": "lead_capture_failed",
                "message": reason,
            }),
            Observation::Refused { reason } => json!({
                "error": "refused",
                "message": reason,
            }),
        }
    }
}

pub struct ToolLayer<S> {
    profile: ProfileDocument,
    sink: S,
}

impl<S: LeadSink> ToolLayer<S> {
    pub fn new(profile: ProfileDocument, sink: S) -> Self {
        Self { profile, sink }
    }

    pub fn profile(&self) -> &ProfileDocument {
        &self.profile
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn fetch_profile_section(&self, section: &str) -> Observation {
        match self.profile.get_section(section) {
            Ok(value) => Observation::Value(value.clone()),
            Err(err) => Observation::NotFound(err),
        }
    }

    pub fn fetch_project_details(&self, project: &str) -> Observation {
        match self.profile.get_project(project) {
            Ok(value) => Observation::Value(value.clone()),
            Err(err) => Observation::NotFound(err),
        }
    }

    /// Validate, stamp and append one lead. A sink failure is never retried.
    #[instrument(skip_all)]
    pub fn log_recruiter_lead(&self, draft: &LeadDraft) -> Observation {
        let lead = match draft.validate(Utc::now()) {
            Ok(lead) => lead,
            Err(err) => {
                info!(%err, "lead rejected");
                return Observation::Invalid {
                    missing: err.missing,
                };
            }
        };
        match self.sink.append_row(&lead.to_row()) {
            Ok(()) => {
                info!(company = %lead.company, sink = %self.sink.describe(), "lead captured");
                Observation::LeadLogged(lead)
            }
            Err(err) => {
                warn!(%err, "lead capture failed");
                Observation::LeadCaptureFailed {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn dispatch(&self, call: &ToolCall) -> Observation {
        match call {
            ToolCall::FetchProfileSection { section } => self.fetch_profile_section(section),
            ToolCall::FetchProjectDetails { project } => self.fetch_project_details(project),
            ToolCall::LogRecruiterLead(draft) => self.log_recruiter_lead(draft),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::LookupKind;
    use crate::test_support::{FailingSink, RecordingSink, sample_profile};

    fn draft() -> LeadDraft {
        LeadDraft {
            name: "Jane Doe".to_string(),
            company: "Acme".to_string(),
            role: "Staff Engineer".to_string(),
            contact: "jane@acme.test".to_string(),
            notes: "prefers email".to_string(),
        }
    }

    #[test]
    fn section_is_returned_verbatim() {
        let tools = ToolLayer::new(sample_profile(), RecordingSink::default());
        let expected = sample_profile().get_section("skills").expect("skills").clone();
        assert_eq!(tools.fetch_profile_section("skills"), Observation::Value(expected.clone()));
        assert_eq!(tools.fetch_profile_section("skills").to_json(), expected);
    }

    #[test]
    fn missing_section_is_an_observation() {
        let tools = ToolLayer::new(sample_profile(), RecordingSink::default());
        let observation = tools.fetch_profile_section("hobbies");
        let Observation::NotFound(err) = &observation else {
            panic!("expected not found, got {observation:?}");
        };
        assert_eq!(err.kind, LookupKind::Section);
        assert_eq!(observation.to_json()["error"], "not_found");
    }

    #[test]
    fn project_lookup_ignores_case() {
        let tools = ToolLayer::new(sample_profile(), RecordingSink::default());
        let Observation::Value(project) = tools.fetch_project_details("atlas") else {
            panic!("expected project");
        };
        assert_eq!(project["name"], "Atlas");
    }

    #[test]
    fn valid_lead_appends_one_row_stamped_now() {
        let tools = ToolLayer::new(sample_profile(), RecordingSink::default());
        let before = Utc::now();
        let observation = tools.log_recruiter_lead(&draft());
        let after = Utc::now();

        let Observation::LeadLogged(lead) = observation else {
            panic!("expected logged lead");
        };
        let rows = tools.sink().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], lead.to_row());
        assert_eq!(rows[0][1..], ["Jane Doe", "Acme", "Staff Engineer", "jane@acme.test", "prefers email"]);
        assert!(lead.timestamp >= before);
        assert!(lead.timestamp <= after);
    }

    #[test]
    fn incomplete_lead_writes_nothing() {
        let tools = ToolLayer::new(sample_profile(), RecordingSink::default());
        let observation = tools.log_recruiter_lead(&LeadDraft {
            company: String::new(),
            ..draft()
        });
        assert_eq!(
            observation,
            Observation::Invalid {
                missing: vec![LeadField::Company]
            }
        );
        assert_eq!(observation.to_json()["missing"], json!(["company"]));
        assert!(tools.sink().rows().is_empty());
    }

    #[test]
    fn identical_leads_are_not_deduplicated() {
        let tools = ToolLayer::new(sample_profile(), RecordingSink::default());
        tools.log_recruiter_lead(&draft());
        tools.log_recruiter_lead(&draft());
        assert_eq!(tools.sink().rows().len(), 2);
    }

    #[test]
    fn sink_failure_is_reported() {
        let tools = ToolLayer::new(sample_profile(), FailingSink::default());
        let observation = tools.dispatch(&ToolCall::LogRecruiterLead(draft()));
        let Observation::LeadCaptureFailed { reason } = &observation else {
            panic!("expected capture failure");
        };
        assert!(reason.contains("spreadsheet"));
        assert_eq!(tools.sink().attempts(), 1);
    }
}
