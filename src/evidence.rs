//! Failure-time evidence capture.
//!
//! Capture is strictly best-effort: a session that already died must not
//! produce a secondary error that masks the primary test failure, so both
//! capture paths degrade to empty/minimal evidence instead of erroring.

use crate::session::SessionHandle;

/// Attachment label for the failure screenshot.
pub const SCREENSHOT_LABEL: &str = "Screenshot";
/// Attachment label for the failure log.
pub const FAILURE_LOG_LABEL: &str = "Failure Log";

/// PNG screenshot of the session's current page. Returns an empty buffer if
/// the capture fails for any reason.
pub async fn capture_screenshot<S: SessionHandle + ?Sized>(session: &S) -> Vec<u8> {
    match session.screenshot().await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Screenshot capture failed: {:#}", e);
            Vec::new()
        }
    }
}

/// Render a failure description into the text log attached to the report.
/// Always non-empty, even for a blank description.
pub fn capture_log(description: &str) -> String {
    if description.trim().is_empty() {
        "Test failed without an error description".to_string()
    } else {
        description.to_string()
    }
}
