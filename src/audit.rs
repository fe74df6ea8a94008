use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSONL record of what happened during a console session.
/// Passwords are never written.
pub struct AuditLog {
    pub path: Option<PathBuf>,
    session_id: String,
    file: Option<File>,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl AuditLog {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            session_id: session_id.to_string(),
            file: Some(file),
        })
    }

    /// A log that records nothing (`--no-audit` or `audit.enabled = false`)
    pub fn disabled(session_id: &str) -> Self {
        Self {
            path: None,
            session_id: session_id.to_string(),
            file: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    pub fn session_start(&mut self, data_dir: &Path, users: usize, sites: usize) -> Result<()> {
        self.log(
            "session_start",
            serde_json::json!({ "data_dir": data_dir, "users": users, "sites": sites }),
        )
    }

    pub fn load_warning(&mut self, message: &str) -> Result<()> {
        self.log("load_warning", serde_json::json!({ "message": message }))
    }

    pub fn login(&mut self, username: &str, ok: bool) -> Result<()> {
        self.log(
            if ok { "login_ok" } else { "login_failed" },
            serde_json::json!({ "username": username }),
        )
    }

    pub fn logout(&mut self, username: &str) -> Result<()> {
        self.log("logout", serde_json::json!({ "username": username }))
    }

    /// Log the outcome of a registry operation
    pub fn operation(
        &mut self,
        op: &str,
        key: &str,
        ok: bool,
        error_code: Option<&str>,
    ) -> Result<()> {
        self.log(
            "operation",
            serde_json::json!({
                "op": op,
                "key": key,
                "ok": ok,
                "error": error_code,
            }),
        )
    }
}
