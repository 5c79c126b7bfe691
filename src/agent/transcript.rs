use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::errors::ScreenPilotResult;

#[derive(Debug, Serialize)]
struct TranscriptEntry {
    ts: i64,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<serde_json::Value>,
}

/// Append-only JSONL transcript of one session: user inputs, executed
/// actions and assistant messages. Best-effort: a write failure is logged
/// and never aborts the loop.
pub struct SessionTranscript {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionTranscript {
    pub fn new() -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = data_dir_or_cwd().join(format!("task_{session_id}.jsonl"));
        Self { session_id, file_path }
    }

    pub fn record_user(&self, text: &str) {
        self.append(TranscriptEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            kind: "user",
            text: Some(text.to_string()),
            action: None,
        });
    }

    pub fn record_assistant(&self, text: &str) {
        self.append(TranscriptEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            kind: "assistant",
            text: Some(text.to_string()),
            action: None,
        });
    }

    pub fn record_action(&self, name: &str, args: &serde_json::Value) {
        self.append(TranscriptEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            kind: "action",
            text: Some(name.to_string()),
            action: Some(args.clone()),
        });
    }

    fn append(&self, entry: TranscriptEntry) {
        if let Err(e) = self.try_append(&entry) {
            tracing::debug!(error = %e, path = %self.file_path.display(), "transcript write skipped");
        }
    }

    fn try_append(&self, entry: &TranscriptEntry) -> ScreenPilotResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl Default for SessionTranscript {
    fn default() -> Self {
        Self::new()
    }
}

/// `%LOCALAPPDATA%\screenpilot\sessions` on Windows,
/// `~/.local/share/screenpilot/sessions` elsewhere, falling back to the
/// working directory.
fn data_dir_or_cwd() -> PathBuf {
    #[cfg(target_os = "windows")]
    let base = std::env::var("LOCALAPPDATA").ok().map(PathBuf::from);

    #[cfg(not(target_os = "windows"))]
    let base = std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".local").join("share"));

    if let Some(data_dir) = base {
        let dir = data_dir.join("screenpilot").join("sessions");
        let _ = std::fs::create_dir_all(&dir);
        return dir;
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
