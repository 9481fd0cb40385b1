//! Suite runner: one fresh browser session per test, lifecycle events
//! dispatched synchronously, report finalized once after the last test.
//!
//! The session for each test travels as an explicit handle through the
//! test's execution context; there is no ambient thread-local lookup.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::RunConfig;
use crate::error::Result;
use crate::listener::{AllureListener, ConsoleListener, EventEmitter, TestEvent};
use crate::report;
use crate::results::{ResultsStore, TestStatus};
use crate::session::{SessionFactory, SessionRegistry, UnitId, WebSession};

type TestBody = Box<
    dyn Fn(Arc<WebSession>) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send
        + Sync,
>;

enum CaseKind {
    Runnable(TestBody),
    Skipped,
}

struct TestCase {
    name: String,
    kind: CaseKind,
}

/// Outcome tally for one run. Reporting problems never show up here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl RunSummary {
    fn count(&mut self, status: TestStatus) {
        self.total += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// A named collection of test cases sharing one run configuration.
///
/// ```no_run
/// # use webtrace::{RunConfig, Suite, SessionHandle};
/// # async fn demo() -> anyhow::Result<()> {
/// let config = RunConfig {
///     base_url: "https://example.com".to_string(),
///     ..Default::default()
/// };
/// let summary = Suite::new("smoke", config)
///     .case("title mentions example", |session| async move {
///         let title = session.page_title().await?;
///         anyhow::ensure!(title.contains("Example"), "unexpected title: {title}");
///         Ok(())
///     })
///     .run()
///     .await?;
/// assert!(summary.all_passed());
/// # Ok(())
/// # }
/// ```
pub struct Suite {
    name: String,
    config: RunConfig,
    cases: Vec<TestCase>,
    parallel: bool,
    open_report: bool,
}

impl Suite {
    pub fn new(name: impl Into<String>, config: RunConfig) -> Self {
        Self {
            name: name.into(),
            config,
            cases: Vec::new(),
            parallel: false,
            open_report: false,
        }
    }

    /// Run cases concurrently, one execution unit per case.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Open the final report in the platform viewer after the run.
    pub fn open_report(mut self, open: bool) -> Self {
        self.open_report = open;
        self
    }

    /// Register a test case. The body receives its own live session, already
    /// navigated to the configured base URL.
    pub fn case<F, Fut>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arc<WebSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cases.push(TestCase {
            name: name.into(),
            kind: CaseKind::Runnable(Box::new(move |session| Box::pin(body(session)))),
        });
        self
    }

    /// Register a case that is reported as skipped without a session.
    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.cases.push(TestCase {
            name: name.into(),
            kind: CaseKind::Skipped,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Execute every case, then finalize the report exactly once.
    pub async fn run(self) -> Result<RunSummary> {
        let store = Arc::new(ResultsStore::new(&self.config.results_dir)?);
        let registry = Arc::new(SessionRegistry::<WebSession>::new());
        let finalizer = report::finalizer_from_config(&self.config, self.open_report);

        let mut emitter = EventEmitter::new();
        emitter.register(Box::new(ConsoleListener::new()));
        emitter.register(Box::new(AllureListener::new(
            registry.clone(),
            store,
            finalizer,
        )));
        let emitter = Arc::new(emitter);
        let factory = Arc::new(SessionFactory::new(self.config.clone()));

        emitter
            .emit(TestEvent::RunStarted {
                suite: self.name.clone(),
            })
            .await;

        let mut summary = RunSummary::default();

        if self.parallel {
            let mut handles = Vec::new();
            for (index, case) in self.cases.into_iter().enumerate() {
                let unit = UnitId(index as u64);
                let name = case.name.clone();
                let factory = factory.clone();
                let registry = registry.clone();
                let emitter = emitter.clone();
                let handle = tokio::spawn(async move {
                    run_case(&factory, &registry, &emitter, unit, case).await
                });
                handles.push((unit, name, handle));
            }
            for (unit, name, handle) in handles {
                let status = settle_parallel_case(handle, unit, name, &registry, &emitter).await;
                summary.count(status);
            }
        } else {
            for (index, case) in self.cases.into_iter().enumerate() {
                let unit = UnitId(index as u64);
                let status = run_case(&factory, &registry, &emitter, unit, case).await;
                summary.count(status);
            }
        }

        // All units have completed; single-writer/single-reader handoff to
        // the finalizer happens inside the listener.
        emitter
            .emit(TestEvent::RunFinished { suite: self.name })
            .await;

        Ok(summary)
    }
}

/// Join one spawned case. A panicking body unwinds past the release in
/// `run_case`, so the panic is absorbed here: the test is reported failed
/// and the unit's session, if still registered, is closed. Sessions are
/// destroyed at test end regardless of outcome.
async fn settle_parallel_case<S: crate::session::SessionHandle>(
    handle: tokio::task::JoinHandle<TestStatus>,
    unit: UnitId,
    name: String,
    registry: &SessionRegistry<S>,
    emitter: &EventEmitter,
) -> TestStatus {
    match handle.await {
        Ok(status) => status,
        Err(e) => {
            log::error!("Test task for {} panicked: {}", name, e);
            emitter
                .emit(TestEvent::TestFailed {
                    unit,
                    name,
                    error: Some(format!("test body panicked: {}", e)),
                })
                .await;
            registry.clear(unit).await;
            TestStatus::Failed
        }
    }
}

/// One test's lifecycle: create session, register, run body, report
/// outcome, always release the session. A session-creation failure fails
/// this test only.
async fn run_case(
    factory: &SessionFactory,
    registry: &SessionRegistry<WebSession>,
    emitter: &EventEmitter,
    unit: UnitId,
    case: TestCase,
) -> TestStatus {
    let body = match case.kind {
        CaseKind::Skipped => {
            emitter
                .emit(TestEvent::TestSkipped {
                    unit,
                    name: case.name,
                })
                .await;
            return TestStatus::Skipped;
        }
        CaseKind::Runnable(body) => body,
    };

    emitter
        .emit(TestEvent::TestStarted {
            unit,
            name: case.name.clone(),
        })
        .await;

    let session = match factory.create_session().await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            emitter
                .emit(TestEvent::TestFailed {
                    unit,
                    name: case.name,
                    error: Some(e.to_string()),
                })
                .await;
            return TestStatus::Failed;
        }
    };

    registry.set(unit, session.clone());
    let outcome = body(session).await;

    let status = match outcome {
        Ok(()) => {
            emitter
                .emit(TestEvent::TestPassed {
                    unit,
                    name: case.name,
                })
                .await;
            TestStatus::Passed
        }
        Err(e) => {
            // Evidence capture inside the listener needs the session still
            // registered; release happens after the event settles.
            emitter
                .emit(TestEvent::TestFailed {
                    unit,
                    name: case.name,
                    error: Some(format!("{:#}", e)),
                })
                .await;
            TestStatus::Failed
        }
    };

    registry.clear(unit).await;
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::LifecycleListener;
    use crate::session::SessionHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeSession {
        closed: AtomicBool,
    }

    impl FakeSession {
        fn new() -> Self {
            Self {
                closed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SessionHandle for FakeSession {
        async fn navigate(&self, _url: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn page_title(&self) -> anyhow::Result<String> {
            Ok(String::new())
        }
        async fn wait_for(&self, _selector: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn close(&self) -> anyhow::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct RecordingListener {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LifecycleListener for RecordingListener {
        async fn on_event(&self, event: &TestEvent) {
            if let TestEvent::TestFailed { name, error, .. } = event {
                self.seen.lock().unwrap().push(format!(
                    "failed:{}:{}",
                    name,
                    error.as_deref().unwrap_or("")
                ));
            }
        }
    }

    #[tokio::test]
    async fn panicked_parallel_case_reports_failure_and_releases_session() {
        let registry = Arc::new(SessionRegistry::<FakeSession>::new());
        let unit = UnitId(0);
        let session = Arc::new(FakeSession::new());
        registry.set(unit, session.clone());

        let mut emitter = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        emitter.register(Box::new(RecordingListener { seen: seen.clone() }));

        let handle: tokio::task::JoinHandle<TestStatus> =
            tokio::spawn(async { panic!("assertion blew up") });

        let status =
            settle_parallel_case(handle, unit, "exploding".to_string(), &registry, &emitter).await;

        assert_eq!(status, TestStatus::Failed);
        // The session was closed and deregistered despite the panic
        assert!(registry.get(unit).is_none());
        assert!(session.closed.load(Ordering::SeqCst));
        // The failure reached the listeners, so a result record gets written
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("failed:exploding:"));
        assert!(events[0].contains("panicked"));
    }

    #[test]
    fn summary_tallies_every_status() {
        let mut summary = RunSummary::default();
        summary.count(TestStatus::Passed);
        summary.count(TestStatus::Passed);
        summary.count(TestStatus::Failed);
        summary.count(TestStatus::Skipped);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.all_passed());
    }

    #[test]
    fn suite_builder_registers_cases_in_order() {
        let suite = Suite::new("smoke", RunConfig::default())
            .case("first", |_session| async { Ok(()) })
            .skip("second")
            .case("third", |_session| async { Ok(()) });
        assert_eq!(suite.len(), 3);
        assert_eq!(suite.cases[0].name, "first");
        assert!(matches!(suite.cases[1].kind, CaseKind::Skipped));
        assert_eq!(suite.cases[2].name, "third");
    }
}
