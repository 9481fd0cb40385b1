//! Browser session handles.
//!
//! A session is an opaque handle to one live browser instance, owned by
//! exactly one execution unit for the duration of one test. Sessions are
//! created fresh per test and closed at test end regardless of outcome,
//! never reused.

pub mod factory;
pub mod registry;

use anyhow::{Context, Result};
use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page, ScreenshotType};
use playwright::Playwright;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use factory::{BrowserFamily, RunMode, SessionFactory};
pub use registry::{SessionRegistry, UnitId};

/// Operations a test body or the evidence collector may perform against a
/// live session. Kept as a trait so the lifecycle machinery can be exercised
/// in tests without launching a browser.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Navigate the page. Relative URLs are resolved against the base URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current document title.
    async fn page_title(&self) -> Result<String>;

    /// Wait for an element matching a CSS selector, bounded by the session's
    /// implicit wait timeout. Returns false on timeout.
    async fn wait_for(&self, selector: &str) -> Result<bool>;

    /// PNG screenshot of the current page.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Close the underlying browser. Idempotence is not required; a session
    /// is closed exactly once, by the registry.
    async fn close(&self) -> Result<()>;
}

/// Live browser session backed by Playwright.
pub struct WebSession {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Mutex<Browser>>,
    context: Arc<Mutex<BrowserContext>>,
    page: Arc<Mutex<Page>>,
    family: BrowserFamily,
    mode: RunMode,
    base_url: String,
    implicit_wait_ms: u64,
}

impl WebSession {
    pub(crate) fn new(
        playwright: Playwright,
        browser: Browser,
        context: BrowserContext,
        page: Page,
        family: BrowserFamily,
        mode: RunMode,
        base_url: String,
        implicit_wait_ms: u64,
    ) -> Self {
        Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(Mutex::new(browser)),
            context: Arc::new(Mutex::new(context)),
            page: Arc::new(Mutex::new(page)),
            family,
            mode,
            base_url,
            implicit_wait_ms,
        }
    }

    pub fn family(&self) -> BrowserFamily {
        self.family
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn implicit_wait_ms(&self) -> u64 {
        self.implicit_wait_ms
    }

    fn resolve_url(&self, url: &str) -> String {
        join_base_url(&self.base_url, url)
    }
}

/// Resolve a navigation target against a base URL. Absolute targets pass
/// through untouched; relative ones are joined with exactly one `/` between
/// base and path.
fn join_base_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || base.is_empty() {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}

#[async_trait]
impl SessionHandle for WebSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let full_url = self.resolve_url(url);
        let page = self.page.lock().await;
        page.goto_builder(&full_url)
            .goto()
            .await
            .context("Failed to navigate to URL")?;
        Ok(())
    }

    async fn page_title(&self) -> Result<String> {
        let page = self.page.lock().await;
        let title: String = page.evaluate("() => document.title", ()).await?;
        Ok(title)
    }

    async fn wait_for(&self, selector: &str) -> Result<bool> {
        let page = self.page.lock().await;
        let result = page
            .wait_for_selector_builder(selector)
            .timeout(self.implicit_wait_ms as f64)
            .wait_for_selector()
            .await;
        Ok(result.is_ok())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.page.lock().await;
        let bytes = page
            .screenshot_builder()
            .r#type(ScreenshotType::Png)
            .screenshot()
            .await?;
        Ok(bytes)
    }

    async fn close(&self) -> Result<()> {
        {
            let context = self.context.lock().await;
            context
                .close()
                .await
                .context("Failed to close browser context")?;
        }
        let browser = self.browser.lock().await;
        browser.close().await.context("Failed to close browser")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_pass_through_unchanged() {
        assert_eq!(
            join_base_url("https://example.com", "https://other.test/page"),
            "https://other.test/page"
        );
        assert_eq!(
            join_base_url("", "http://other.test"),
            "http://other.test"
        );
    }

    #[test]
    fn relative_urls_join_with_exactly_one_slash() {
        assert_eq!(
            join_base_url("https://example.com", "/login"),
            "https://example.com/login"
        );
        assert_eq!(
            join_base_url("https://example.com/", "/login"),
            "https://example.com/login"
        );
        assert_eq!(
            join_base_url("https://example.com", "login"),
            "https://example.com/login"
        );
        assert_eq!(
            join_base_url("https://example.com/", "login"),
            "https://example.com/login"
        );
    }

    #[test]
    fn empty_base_leaves_relative_target_alone() {
        assert_eq!(join_base_url("", "/login"), "/login");
    }
}
