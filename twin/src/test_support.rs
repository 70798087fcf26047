//! Scripted collaborators and fixtures for tests.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::json;

use crate::core::profile::ProfileDocument;
use crate::io::error::{Collaborator, CollaboratorError};
use crate::io::model::{ChatModel, ModelRequest};
use crate::io::sink::{LeadRow, LeadSink};

/// Model that replays canned outputs and records every request.
///
/// Once the script runs out, every call fails with a protocol error.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    outputs: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new<I, T>(outputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Append more outputs, e.g. before the next turn.
    pub fn push(&self, output: impl Into<String>) {
        self.outputs.lock().expect("outputs lock").push_back(output.into());
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl ChatModel for ScriptedModel {
    fn complete(&self, request: &ModelRequest) -> Result<String, CollaboratorError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.outputs
            .lock()
            .expect("outputs lock")
            .pop_front()
            .ok_or_else(|| CollaboratorError::protocol(Collaborator::Model, "script exhausted"))
    }
}

/// Sink that keeps appended rows in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    rows: Mutex<Vec<LeadRow>>,
}

impl RecordingSink {
    pub fn rows(&self) -> Vec<LeadRow> {
        self.rows.lock().expect("rows lock").clone()
    }
}

impl LeadSink for RecordingSink {
    fn append_row(&self, row: &LeadRow) -> Result<(), CollaboratorError> {
        self.rows.lock().expect("rows lock").push(row.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory rows".to_string()
    }
}

/// Sink whose every append fails with a spreadsheet status error.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: Mutex<usize>,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().expect("attempts lock")
    }
}

impl LeadSink for FailingSink {
    fn append_row(&self, _row: &LeadRow) -> Result<(), CollaboratorError> {
        *self.attempts.lock().expect("attempts lock") += 1;
        Err(CollaboratorError::status(
            Collaborator::Spreadsheet,
            503,
            "backend unavailable",
        ))
    }

    fn describe(&self) -> String {
        "failing sink".to_string()
    }
}

/// Small but complete profile used across tests.
pub fn sample_profile() -> ProfileDocument {
    ProfileDocument::from_value(json!({
        "name": "Sam Rivera",
        "skills": ["Rust", "Python", "PostgreSQL"],
        "education": [{"institution": "University of Washington", "degree": "B.S. Computer Science"}],
        "experience": [{"company": "Northwind Logistics", "title": "Senior Software Engineer"}],
        "projects": [
            {"name": "Atlas", "summary": "Geospatial tile server", "stack": ["Rust", "tokio"]},
            {"name": "Beacon", "summary": "Uptime monitor", "stack": ["Rust", "SQLite"]}
        ],
        "job_preferences": {"roles": ["Staff Engineer"], "locations": ["Remote"]}
    }))
    .expect("sample profile is an object")
}

/// One request received by [`HttpStub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRequest {
    pub method: String,
    /// Request target, including the query string.
    pub target: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Local HTTP server that answers one connection per scripted response and
/// then stops listening.
pub struct HttpStub {
    base_url: String,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl HttpStub {
    /// Serve `(status, json body)` responses in order.
    pub fn serve<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = (u16, String)>,
    {
        let responses: Vec<(u16, String)> = responses.into_iter().collect();
        let (listener, base_url) = bind_local();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                if let Some(request) = read_request(&stream) {
                    seen.lock().expect("stub requests lock").push(request);
                }
                write_response(&stream, status, &body);
            }
        });
        Self { base_url, requests }
    }

    /// Accept connections and read requests without ever answering.
    pub fn silent() -> Self {
        let (listener, base_url) = bind_local();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            let mut open = Vec::new();
            for stream in listener.incoming().flatten() {
                if let Some(request) = read_request(&stream) {
                    seen.lock().expect("stub requests lock").push(request);
                }
                open.push(stream);
            }
        });
        Self { base_url, requests }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().expect("stub requests lock").clone()
    }
}

fn bind_local() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    (listener, format!("http://{addr}/"))
}

fn read_request(stream: &TcpStream) -> Option<StubRequest> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        let (name, value) = header.split_once(':')?;
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().ok()?;
        } else if name.eq_ignore_ascii_case("authorization") {
            authorization = Some(value.to_string());
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(StubRequest {
        method,
        target,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_response(mut stream: &TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
