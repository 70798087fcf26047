//! Read-only profile document and its lookups.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Section,
    Project,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Section => f.write_str("profile section"),
            LookupKind::Project => f.write_str("project"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{key}' not found")]
pub struct NotFound {
    pub kind: LookupKind,
    pub key: String,
}

/// Section aliases accepted from the model, mapped to canonical keys.
const SECTION_ALIASES: &[(&str, &str)] = &[
    ("skill", "skills"),
    ("project", "projects"),
    ("job", "job_preferences"),
    ("preferences", "job_preferences"),
    ("job preferences", "job_preferences"),
];

/// Structured profile keyed by section name. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDocument {
    sections: BTreeMap<String, Value>,
}

impl ProfileDocument {
    pub fn new(sections: BTreeMap<String, Value>) -> Self {
        Self { sections }
    }

    /// Build from a JSON value; only an object is a valid profile.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map.into_iter().collect())),
            _ => None,
        }
    }

    /// Look up a section by name, honouring case, whitespace and aliases.
    pub fn get_section(&self, name: &str) -> Result<&Value, NotFound> {
        let not_found = || NotFound {
            kind: LookupKind::Section,
            key: name.to_string(),
        };
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(not_found());
        }
        let resolved = SECTION_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(key.as_str());
        self.sections
            .get(resolved)
            .or_else(|| self.sections.get(key.as_str()))
            .ok_or_else(not_found)
    }

    /// Look up a project entry by its `name`, case-insensitively.
    pub fn get_project(&self, identifier: &str) -> Result<&Value, NotFound> {
        let wanted = identifier.trim().to_lowercase();
        let found = if wanted.is_empty() {
            None
        } else {
            self.projects().and_then(|projects| {
                projects.iter().find(|project| {
                    project_name(project).is_some_and(|name| name.trim().to_lowercase() == wanted)
                })
            })
        };
        found.ok_or_else(|| NotFound {
            kind: LookupKind::Project,
            key: identifier.to_string(),
        })
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    pub fn project_names(&self) -> Vec<&str> {
        self.projects()
            .map(|projects| projects.iter().filter_map(project_name).collect())
            .unwrap_or_default()
    }

    /// Top-level `name` string, when the document carries one.
    pub fn owner_name(&self) -> Option<&str> {
        self.sections
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    fn projects(&self) -> Option<&Vec<Value>> {
        self.sections.get("projects").and_then(Value::as_array)
    }
}

fn project_name(project: &Value) -> Option<&str> {
    project.get("name").and_then(Value::as_str)
}
