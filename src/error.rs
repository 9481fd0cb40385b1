use thiserror::Error;

/// Failure taxonomy for the harness.
///
/// Evidence-capture failures are deliberately not represented here: capture is
/// best-effort and swallowed at the call site so a secondary failure can never
/// mask the primary test failure. Cleanup problems after a successful report
/// are logged warnings, not errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Bad or missing browser/grid settings. Fatal to session creation,
    /// surfaces immediately, no retry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Browser launch or grid negotiation failed. Fatal to the affected test
    /// only; other execution units are unaffected.
    #[error("session creation failed: {0}")]
    SessionCreation(String),

    /// The external report tool exited non-zero or produced an unexpected
    /// output layout. Aborts finalization but never alters test outcomes.
    #[error("report generation failed: {0}")]
    ReportGeneration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
