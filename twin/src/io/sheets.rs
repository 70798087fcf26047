//! Google Sheets lead sink.
//!
//! Spreadsheet selection precedence:
//! 1. the configured `spreadsheet_id`;
//! 2. the first Drive spreadsheet whose title equals `spreadsheet_title`;
//! 3. a new spreadsheet with that title, seeded with the header row.
//!
//! The resolved id is cached for the lifetime of the sink. Authentication is
//! out of scope: the sink is handed a ready OAuth bearer token.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::core::lead::LEAD_COLUMNS;
use crate::io::config::SheetsConfig;
use crate::io::error::{Collaborator, CollaboratorError};
use crate::io::sink::{LeadRow, LeadSink};

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

pub struct GoogleSheets {
    client: Client,
    token: String,
    config: SheetsConfig,
    timeout: Duration,
    target: Mutex<Option<Target>>,
}

/// Spreadsheet that rows are appended to, once resolved.
struct Target {
    id: String,
    /// Created by this sink and the header row has not landed yet.
    needs_header: bool,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

impl GoogleSheets {
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let token = config
            .access_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow!("leads.sheets.access_token is not set"))?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build sheets http client")?;
        let explicit_id = config
            .spreadsheet_id
            .clone()
            .filter(|id| !id.trim().is_empty());
        Ok(Self {
            client,
            token,
            config: config.clone(),
            timeout,
            target: Mutex::new(explicit_id.map(|id| Target {
                id,
                needs_header: false,
            })),
        })
    }

    /// Resolve (and cache) the spreadsheet rows are appended to.
    ///
    /// A created spreadsheet is cached before its header is written, so a
    /// failed header append is retried on the next call instead of creating
    /// or finding the spreadsheet again.
    fn spreadsheet_id(&self) -> Result<String, CollaboratorError> {
        let mut cached = self
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut target = match cached.take() {
            Some(target) => target,
            None => self.locate()?,
        };

        let header = if target.needs_header {
            self.append_values(&target.id, &header_row())
        } else {
            Ok(())
        };
        target.needs_header = header.is_err();
        let id = target.id.clone();
        *cached = Some(target);
        header.map(|()| id)
    }

    fn locate(&self) -> Result<Target, CollaboratorError> {
        if let Some(id) = self.find_by_title()? {
            info!(spreadsheet_id = %id, "using existing spreadsheet");
            return Ok(Target {
                id,
                needs_header: false,
            });
        }
        let id = self.create_spreadsheet()?;
        info!(spreadsheet_id = %id, "created lead spreadsheet");
        Ok(Target {
            id,
            needs_header: true,
        })
    }

    fn find_by_title(&self) -> Result<Option<String>, CollaboratorError> {
        let url = self.url(&self.config.drive_api_base, &["drive", "v3", "files"])?;
        let request = self.client.get(url).query(&[
            ("q", drive_title_query(&self.config.spreadsheet_title)),
            ("fields", "files(id)".to_string()),
            ("pageSize", "1".to_string()),
        ]);
        let list: DriveFileList = self.send_json(request)?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    fn create_spreadsheet(&self) -> Result<String, CollaboratorError> {
        let url = self.url(&self.config.sheets_api_base, &["v4", "spreadsheets"])?;
        let body = json!({
            "properties": { "title": self.config.spreadsheet_title },
            "sheets": [{ "properties": { "title": self.config.worksheet } }],
        });
        let created: CreatedSpreadsheet = self.send_json(self.client.post(url).json(&body))?;
        Ok(created.spreadsheet_id)
    }

    fn append_values(&self, spreadsheet_id: &str, row: &LeadRow) -> Result<(), CollaboratorError> {
        let url = self.url(
            &self.config.sheets_api_base,
            &[
                "v4",
                "spreadsheets",
                spreadsheet_id,
                "values",
                &format!("{}:append", a1_range(&self.config.worksheet)),
            ],
        )?;
        let request = self
            .client
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [row] }));
        self.send(request)?;
        Ok(())
    }

    fn url(&self, base: &str, segments: &[&str]) -> Result<Url, CollaboratorError> {
        build_url(base, segments).map_err(|err| CollaboratorError::protocol(Collaborator::Spreadsheet, err))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, CollaboratorError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .map_err(|err| {
                CollaboratorError::from_reqwest(Collaborator::Spreadsheet, err, self.timeout)
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "spreadsheet api rejected request");
            return Err(CollaboratorError::status(
                Collaborator::Spreadsheet,
                status.as_u16(),
                &body,
            ));
        }
        Ok(response)
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CollaboratorError> {
        self.send(request)?.json().map_err(|err| {
            CollaboratorError::from_reqwest(Collaborator::Spreadsheet, err, self.timeout)
        })
    }
}

impl LeadSink for GoogleSheets {
    #[instrument(skip_all, fields(worksheet = %self.config.worksheet))]
    fn append_row(&self, row: &LeadRow) -> Result<(), CollaboratorError> {
        let id = self.spreadsheet_id()?;
        self.append_values(&id, row)?;
        debug!(spreadsheet_id = %id, "appended lead row");
        Ok(())
    }

    fn describe(&self) -> String {
        match self.config.spreadsheet_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => format!("google sheet {id} / {}", self.config.worksheet),
            None => format!(
                "google sheet titled '{}' / {}",
                self.config.spreadsheet_title, self.config.worksheet
            ),
        }
    }
}

fn header_row() -> LeadRow {
    LEAD_COLUMNS.map(str::to_string)
}

/// A1 range covering the six lead columns of `worksheet`.
fn a1_range(worksheet: &str) -> String {
    format!("'{}'!A:F", worksheet.replace('\'', "''"))
}

/// Drive search expression for a spreadsheet with exactly `title`.
fn drive_title_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false")
}

fn build_url(base: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|err| format!("invalid api base '{base}': {err}"))?;
    url.path_segments_mut()
        .map_err(|_| format!("api base '{base}' cannot hold a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{HttpStub, StubRequest};

    fn lead_row() -> LeadRow {
        [
            "2026-01-02 03:04:05",
            "Jane Doe",
            "Acme",
            "Staff Engineer",
            "jane@acme.test",
            "",
        ]
        .map(str::to_string)
    }

    fn sheets_against(stub: &HttpStub) -> GoogleSheets {
        let config = SheetsConfig {
            spreadsheet_title: "Recruiter Leads".to_string(),
            worksheet: "Leads".to_string(),
            access_token: Some("token".to_string()),
            sheets_api_base: stub.base_url().to_string(),
            drive_api_base: stub.base_url().to_string(),
            timeout_secs: 5,
            ..SheetsConfig::default()
        };
        GoogleSheets::new(&config).expect("sheets")
    }

    fn ok(body: &str) -> (u16, String) {
        (200, body.to_string())
    }

    fn is_append_to(request: &StubRequest, id: &str) -> bool {
        request.method == "POST"
            && request.target.starts_with(&format!("/v4/spreadsheets/{id}/values/"))
            && request.target.contains(":append?")
    }

    #[test]
    fn title_match_is_used_without_creating() {
        let stub = HttpStub::serve([
            ok(r#"{"files": [{"id": "found-1"}]}"#),
            ok("{}"),
            ok("{}"),
        ]);
        let sheets = sheets_against(&stub);

        sheets.append_row(&lead_row()).expect("first append");
        sheets.append_row(&lead_row()).expect("second append");

        let requests = stub.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].target.starts_with("/drive/v3/files?"));
        assert!(requests[0].target.contains("pageSize=1"));
        assert!(is_append_to(&requests[1], "found-1"));
        assert!(is_append_to(&requests[2], "found-1"));
        assert!(requests[1].body.contains("Jane Doe"));
        assert!(!requests.iter().any(|request| request.body.contains("\"timestamp\"")));
        assert!(
            requests
                .iter()
                .all(|request| request.authorization.as_deref() == Some("Bearer token"))
        );
    }

    #[test]
    fn missing_title_creates_once_and_writes_header_first() {
        let stub = HttpStub::serve([
            ok(r#"{"files": []}"#),
            ok(r#"{"spreadsheetId": "new-1"}"#),
            ok("{}"),
            ok("{}"),
            ok("{}"),
        ]);
        let sheets = sheets_against(&stub);

        sheets.append_row(&lead_row()).expect("first append");
        sheets.append_row(&lead_row()).expect("second append");

        let requests = stub.requests();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].target, "/v4/spreadsheets");
        assert!(requests[1].body.contains("Recruiter Leads"));
        assert!(is_append_to(&requests[2], "new-1"));
        assert!(requests[2].body.contains("\"timestamp\""));
        assert!(requests[2].body.contains("\"notes\""));
        assert!(is_append_to(&requests[3], "new-1"));
        assert!(requests[3].body.contains("Jane Doe"));
        assert!(is_append_to(&requests[4], "new-1"));
        assert!(requests[4].body.contains("Jane Doe"));
    }

    #[test]
    fn failed_header_is_retried_on_the_created_spreadsheet() {
        let stub = HttpStub::serve([
            ok(r#"{"files": []}"#),
            ok(r#"{"spreadsheetId": "new-2"}"#),
            (500, r#"{"error": "backend"}"#.to_string()),
            ok("{}"),
            ok("{}"),
        ]);
        let sheets = sheets_against(&stub);

        let err = sheets.append_row(&lead_row()).expect_err("header failure");
        assert!(matches!(err, CollaboratorError::Status { status: 500, .. }));
        assert_eq!(stub.requests().len(), 3);

        sheets.append_row(&lead_row()).expect("retry");
        let requests = stub.requests();
        assert_eq!(requests.len(), 5);
        assert!(is_append_to(&requests[3], "new-2"));
        assert!(requests[3].body.contains("\"timestamp\""));
        assert!(is_append_to(&requests[4], "new-2"));
        assert!(requests[4].body.contains("Jane Doe"));
        assert!(!requests[..2].iter().any(|request| request.body.contains("Jane Doe")));
    }

    #[test]
    fn lookup_failure_is_not_cached() {
        let stub = HttpStub::serve([
            (503, "unavailable".to_string()),
            ok(r#"{"files": [{"id": "found-2"}]}"#),
            ok("{}"),
        ]);
        let sheets = sheets_against(&stub);

        assert!(sheets.append_row(&lead_row()).is_err());
        sheets.append_row(&lead_row()).expect("second append");

        let requests = stub.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].target.starts_with("/drive/v3/files?"));
        assert!(is_append_to(&requests[2], "found-2"));
    }

    #[test]
    fn range_quotes_worksheet_names() {
        assert_eq!(a1_range("Leads"), "'Leads'!A:F");
        assert_eq!(a1_range("Bob's leads"), "'Bob''s leads'!A:F");
    }

    #[test]
    fn title_query_escapes_quotes() {
        assert_eq!(
            drive_title_query("Sam's Leads"),
            "name = 'Sam\\'s Leads' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
        );
    }

    #[test]
    fn append_url_encodes_range_segment() {
        let url = build_url(
            "https://sheets.googleapis.com/",
            &["v4", "spreadsheets", "abc", "values", "'My Leads'!A:F:append"],
        )
        .expect("url");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'My%20Leads'!A:F:append"
        );
    }

    #[test]
    fn header_matches_lead_columns() {
        assert_eq!(header_row()[0], "timestamp");
        assert_eq!(header_row()[5], "notes");
    }

    #[test]
    fn explicit_id_skips_lookup() {
        let config = SheetsConfig {
            spreadsheet_id: Some("sheet-123".to_string()),
            access_token: Some("token".to_string()),
            ..SheetsConfig::default()
        };
        let sheets = GoogleSheets::new(&config).expect("sheets");
        assert_eq!(sheets.spreadsheet_id(), Ok("sheet-123".to_string()));
        assert!(sheets.describe().contains("sheet-123"));
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = GoogleSheets::new(&SheetsConfig::default()).err().expect("error");
        assert!(err.to_string().contains("access_token"));
    }
}
