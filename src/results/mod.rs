//! Append-only raw results store in Allure v2 JSON layout.
//!
//! One `<uuid>-result.json` per test plus `<uuid>-attachment.<ext>` files,
//! written incrementally during the run and consumed once by the report
//! finalizer. The directory is not durable beyond that consumption; the
//! generator is invoked with `--clean`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;

/// Terminal status of one test, in the generator's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// One recorded step inside a test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: TestStatus,
    pub stage: String,
    pub start: i64,
    pub stop: i64,
}

impl StepRecord {
    pub fn new(name: impl Into<String>, status: TestStatus) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            name: name.into(),
            status,
            stage: "finished".to_string(),
            start: now,
            stop: now,
        }
    }
}

/// Reference to an attachment file living next to the result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Detail block carried by failed results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDetails {
    pub message: String,
    pub trace: String,
}

/// One test's result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultRecord {
    pub uuid: String,
    pub name: String,
    pub full_name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    pub stage: String,
    pub steps: Vec<StepRecord>,
    pub attachments: Vec<AttachmentRecord>,
    pub start: i64,
    pub stop: i64,
}

/// Writer for one run's raw results directory.
pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    /// Open (creating if needed) the results directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an attachment payload and return the record pointing at it.
    pub fn write_attachment(
        &self,
        label: &str,
        bytes: &[u8],
        mime_type: &str,
        ext: &str,
    ) -> Result<AttachmentRecord> {
        let source = format!("{}-attachment.{}", Uuid::new_v4(), ext);
        std::fs::write(self.dir.join(&source), bytes)?;
        Ok(AttachmentRecord {
            name: label.to_string(),
            source,
            mime_type: mime_type.to_string(),
        })
    }

    /// Append one finished test record.
    pub fn write_result(&self, record: &TestResultRecord) -> Result<()> {
        let path = self.dir.join(format!("{}-result.json", record.uuid));
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            crate::error::HarnessError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
