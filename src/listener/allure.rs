//! The Allure-side lifecycle observer.
//!
//! Records a step per lifecycle event, attaches forensic evidence on
//! failure, and triggers report finalization when the suite finishes.
//! Everything here is observation only: a broken disk or a dead generator
//! never changes a test's recorded outcome.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::evidence;
use crate::listener::{LifecycleListener, TestEvent};
use crate::report::ReportFinalizer;
use crate::results::{
    AttachmentRecord, ResultsStore, StatusDetails, StepRecord, TestResultRecord, TestStatus,
};
use crate::session::{SessionHandle, SessionRegistry, UnitId};

/// A test that has started but not yet reached a terminal state.
struct OpenCase {
    name: String,
    start: i64,
    steps: Vec<StepRecord>,
    attachments: Vec<AttachmentRecord>,
}

impl OpenCase {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: chrono::Utc::now().timestamp_millis(),
            steps: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

pub struct AllureListener<S: SessionHandle> {
    registry: Arc<SessionRegistry<S>>,
    store: Arc<ResultsStore>,
    finalizer: ReportFinalizer,
    open_cases: Mutex<HashMap<UnitId, OpenCase>>,
}

impl<S: SessionHandle> AllureListener<S> {
    pub fn new(
        registry: Arc<SessionRegistry<S>>,
        store: Arc<ResultsStore>,
        finalizer: ReportFinalizer,
    ) -> Self {
        Self {
            registry,
            store,
            finalizer,
            open_cases: Mutex::new(HashMap::new()),
        }
    }

    async fn record_step(&self, unit: UnitId, name: &str, text: String, status: TestStatus) {
        let mut cases = self.open_cases.lock().await;
        let case = cases.entry(unit).or_insert_with(|| OpenCase::new(name));
        case.steps.push(StepRecord::new(text, status));
    }

    async fn attach(&self, unit: UnitId, record: AttachmentRecord) {
        let mut cases = self.open_cases.lock().await;
        if let Some(case) = cases.get_mut(&unit) {
            case.attachments.push(record);
        }
    }

    /// Flush the unit's open case as a finished result record.
    async fn close_case(&self, unit: UnitId, status: TestStatus, details: Option<StatusDetails>) {
        let case = {
            let mut cases = self.open_cases.lock().await;
            cases.remove(&unit)
        };
        let Some(case) = cases_or_warn(case, unit) else {
            return;
        };

        let record = TestResultRecord {
            uuid: Uuid::new_v4().to_string(),
            full_name: case.name.clone(),
            name: case.name,
            status,
            status_details: details,
            stage: "finished".to_string(),
            steps: case.steps,
            attachments: case.attachments,
            start: case.start,
            stop: chrono::Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.store.write_result(&record) {
            log::error!("Could not write result record for {}: {}", record.name, e);
        }
    }

    async fn on_failure(&self, unit: UnitId, name: &str, error: &Option<String>) {
        self.record_step(unit, name, format!("Test failed: {}", name), TestStatus::Failed)
            .await;

        let mut details = None;
        if let Some(description) = error {
            let text = evidence::capture_log(description);
            details = Some(StatusDetails {
                message: description.clone(),
                trace: text.clone(),
            });
            match self.store.write_attachment(
                evidence::FAILURE_LOG_LABEL,
                text.as_bytes(),
                "text/plain",
                "txt",
            ) {
                Ok(record) => self.attach(unit, record).await,
                Err(e) => log::warn!("Could not write failure log: {}", e),
            }
        }

        if let Some(session) = self.registry.get(unit) {
            let shot = evidence::capture_screenshot(session.as_ref()).await;
            if !shot.is_empty() {
                match self.store.write_attachment(
                    evidence::SCREENSHOT_LABEL,
                    &shot,
                    "image/png",
                    "png",
                ) {
                    Ok(record) => self.attach(unit, record).await,
                    Err(e) => log::warn!("Could not write screenshot: {}", e),
                }
            }
        }

        self.close_case(unit, TestStatus::Failed, details).await;
    }
}

fn cases_or_warn(case: Option<OpenCase>, unit: UnitId) -> Option<OpenCase> {
    if case.is_none() {
        log::warn!("{} reached a terminal event with no open case", unit);
    }
    case
}

#[async_trait]
impl<S: SessionHandle> LifecycleListener for AllureListener<S> {
    async fn on_event(&self, event: &TestEvent) {
        match event {
            TestEvent::RunStarted { suite } => {
                log::info!("Executing suite: {}", suite);
            }
            TestEvent::TestStarted { unit, name } => {
                self.record_step(
                    *unit,
                    name,
                    format!("Starting test: {}", name),
                    TestStatus::Passed,
                )
                .await;
            }
            TestEvent::TestPassed { unit, name } => {
                self.record_step(
                    *unit,
                    name,
                    format!("Test passed: {}", name),
                    TestStatus::Passed,
                )
                .await;
                self.close_case(*unit, TestStatus::Passed, None).await;
            }
            TestEvent::TestFailed { unit, name, error } => {
                self.on_failure(*unit, name, error).await;
            }
            TestEvent::TestSkipped { unit, name } => {
                self.record_step(
                    *unit,
                    name,
                    format!("Test skipped: {}", name),
                    TestStatus::Skipped,
                )
                .await;
                self.close_case(*unit, TestStatus::Skipped, None).await;
            }
            TestEvent::RunFinished { suite } => {
                log::info!("Finished executing suite: {}", suite);
                // Reporting failures must never alter the run's outcome
                if let Err(e) = self.finalizer.finalize().await {
                    log::error!("Report finalization failed: {}", e);
                }
            }
        }
    }
}
