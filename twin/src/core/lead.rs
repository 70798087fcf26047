//! Recruiter lead validation and row layout.
//!
//! A lead arrives from the model as a [`LeadDraft`] whose fields may be blank
//! while the conversation is still collecting them. Only a draft with every
//! required field filled becomes a [`RecruiterLead`], and only a
//! `RecruiterLead` can be turned into a sink row.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column headers, in the fixed order rows are written.
pub const LEAD_COLUMNS: [&str; 6] = [
    "timestamp",
    "recruiter_name",
    "company",
    "role",
    "contact",
    "notes",
];

/// Timestamp layout used in sink rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lead fields as supplied by the model; any of them may still be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeadDraft {
    #[serde(alias = "recruiter_name")]
    pub name: String,
    pub company: String,
    pub role: String,
    pub contact: String,
    pub notes: String,
}

/// A required lead field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    Name,
    Company,
    Role,
    Contact,
}

impl LeadField {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadField::Name => "name",
            LeadField::Company => "company",
            LeadField::Role => "role",
            LeadField::Contact => "contact",
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing fields for recruiter lead: {}", join_fields(.missing))]
pub struct LeadValidationError {
    pub missing: Vec<LeadField>,
}

fn join_fields(fields: &[LeadField]) -> String {
    fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A complete lead, stamped at logging time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruiterLead {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub company: String,
    pub role: String,
    pub contact: String,
    pub notes: String,
}

impl LeadDraft {
    /// Required fields that are empty after trimming, in column order.
    pub fn missing_fields(&self) -> Vec<LeadField> {
        [
            (LeadField::Name, &self.name),
            (LeadField::Company, &self.company),
            (LeadField::Role, &self.role),
            (LeadField::Contact, &self.contact),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Promote the draft to a lead stamped with `timestamp`.
    pub fn validate(&self, timestamp: DateTime<Utc>) -> Result<RecruiterLead, LeadValidationError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(LeadValidationError { missing });
        }
        Ok(RecruiterLead {
            timestamp,
            name: self.name.trim().to_string(),
            company: self.company.trim().to_string(),
            role: self.role.trim().to_string(),
            contact: self.contact.trim().to_string(),
            notes: self.notes.trim().to_string(),
        })
    }
}

impl RecruiterLead {
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Cells in [`LEAD_COLUMNS`] order.
    pub fn to_row(&self) -> [String; 6] {
        [
            self.timestamp_string(),
            self.name.clone(),
            self.company.clone(),
            self.role.clone(),
            self.contact.clone(),
            self.notes.clone(),
        ]
    }
}

mod timestamp_format {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }
}
