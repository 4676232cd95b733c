use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

/// Append-only NDJSON log of protocol exchanges, for offline analysis of
/// undocumented payload positions. Envelopes are logged in plaintext (the
/// cipher is applied after logging); the password never appears in an
/// envelope and is never logged.
pub(crate) struct MessageLogger {
    file: File,
}

impl MessageLogger {
    pub fn new(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log_command(&mut self, action: &str, zone: u8, envelope: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "zone": zone,
            "body": envelope,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, zone: u8, plaintext: &[u8]) {
        let body: Value = serde_json::from_slice(plaintext).unwrap_or(Value::Null);
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "rsp",
            "zone": zone,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, action: &str, zone: u8, phase: &str, error: &str, attempts: u8) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "err",
            "action": action,
            "zone": zone,
            "phase": phase,
            "error": error,
            "attempts": attempts,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        let mut contents = String::new();
        std::fs::File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_command_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(path).unwrap();
        logger.log_command("get_status", 0, &json!({"Type": "Get Status", "Zone": 0}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["action"], "get_status");
        assert_eq!(lines[0]["zone"], 0);
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn log_response_parses_plaintext() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(path).unwrap();
        logger.log_response(0, br#"{"Z_sts": {"0": [65]}}"#);

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "rsp");
        assert_eq!(lines[0]["body"]["Z_sts"]["0"][0], 65);
    }

    #[test]
    fn log_failure_captures_phase_and_attempts() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(path).unwrap();
        logger.log_failure("get_status", 0, "awaiting response", "no response", 10);

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "err");
        assert_eq!(lines[0]["phase"], "awaiting response");
        assert_eq!(lines[0]["attempts"], 10);
    }

    #[test]
    fn entries_append() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(path).unwrap();
        logger.log_command("get_status", 0, &json!({}));
        logger.log_response(0, b"{}");

        assert_eq!(read_lines(path).len(), 2);
    }
}
