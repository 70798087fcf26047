//! Local CSV lead log.
//!
//! The header row is written when the file is created (or is empty); every
//! append opens the file in append mode so concurrent processes never
//! truncate each other's rows.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::lead::LEAD_COLUMNS;
use crate::io::error::{Collaborator, CollaboratorError};
use crate::io::sink::{LeadRow, LeadSink};

#[derive(Debug, Clone)]
pub struct CsvLeadLog {
    path: PathBuf,
}

impl CsvLeadLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, row: &LeadRow) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut buf = String::new();
        if file.metadata()?.len() == 0 {
            buf.push_str(&csv_line(LEAD_COLUMNS.iter().copied()));
        }
        buf.push_str(&csv_line(row.iter().map(String::as_str)));
        file.write_all(buf.as_bytes())?;
        file.flush()
    }
}

impl LeadSink for CsvLeadLog {
    fn append_row(&self, row: &LeadRow) -> Result<(), CollaboratorError> {
        self.write_line(row).map_err(|err| CollaboratorError::Io {
            collaborator: Collaborator::LeadLog,
            message: format!("{}: {err}", self.path.display()),
        })?;
        debug!(path = %self.path.display(), "appended lead row");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv file {}", self.path.display())
    }
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells.map(escape_field).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, notes: &str) -> LeadRow {
        [
            "2026-03-01 09:30:00".to_string(),
            name.to_string(),
            "Acme".to_string(),
            "Staff Engineer".to_string(),
            "jane@acme.test".to_string(),
            notes.to_string(),
        ]
    }

    #[test]
    fn escape_quotes_only_when_needed() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn header_written_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = CsvLeadLog::new(temp.path().join("leads/recruiter_leads.csv"));
        log.append_row(&row("Jane Doe", "")).expect("first");
        log.append_row(&row("John Roe", "remote, EU")).expect("second");

        let contents = fs::read_to_string(log.path()).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "timestamp,recruiter_name,company,role,contact,notes");
        assert_eq!(
            lines[1],
            "2026-03-01 09:30:00,Jane Doe,Acme,Staff Engineer,jane@acme.test,"
        );
        assert!(lines[2].ends_with(",\"remote, EU\""));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn identical_rows_are_both_kept() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = CsvLeadLog::new(temp.path().join("leads.csv"));
        log.append_row(&row("Jane Doe", "")).expect("first");
        log.append_row(&row("Jane Doe", "")).expect("second");

        let contents = fs::read_to_string(log.path()).expect("read");
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn unwritable_path_reports_lead_log_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = CsvLeadLog::new(temp.path());
        let err = log.append_row(&row("Jane Doe", "")).unwrap_err();
        assert_eq!(err.collaborator(), Collaborator::LeadLog);
    }
}
