//! Builds one browser session from run configuration.
//!
//! Local mode launches a browser through Playwright; grid mode attaches to a
//! remote endpoint over CDP. Construction failures surface immediately, no
//! retries.

use colored::Colorize;
use playwright::api::Viewport;
use playwright::Playwright;
use std::fmt;

use crate::config::RunConfig;
use crate::error::{HarnessError, Result};
use crate::session::WebSession;

/// Known browser families. Unknown configured names fall back to
/// [`BrowserFamily::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserFamily {
    #[default]
    Chrome,
    Firefox,
    Edge,
}

impl BrowserFamily {
    /// Strict name mapping. Returns `None` for unrecognized names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "chrome" => Some(Self::Chrome),
            "firefox" => Some(Self::Firefox),
            "edge" => Some(Self::Edge),
            _ => None,
        }
    }

    /// Permissive mapping: unknown names fall back to the default family.
    /// The fallback is logged so configuration typos stay observable.
    pub fn resolve(name: &str) -> Self {
        match Self::parse(name) {
            Some(family) => family,
            None => {
                log::warn!(
                    "Unknown browser {:?}, falling back to {}",
                    name,
                    Self::default()
                );
                Self::default()
            }
        }
    }
}

impl fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chrome => write!(f, "chrome"),
            Self::Firefox => write!(f, "firefox"),
            Self::Edge => write!(f, "edge"),
        }
    }
}

/// Where the browser runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Local,
    Grid,
}

impl RunMode {
    /// "grid" (case-insensitive) selects grid mode; anything else is local.
    pub fn resolve(name: &str) -> Self {
        if name.eq_ignore_ascii_case("grid") {
            Self::Grid
        } else {
            Self::Local
        }
    }
}

/// Minimal well-formedness check for a grid endpoint: http(s) scheme and a
/// non-empty host. Checked before any browser process is spawned so a typo
/// cannot leak a half-created session.
pub fn validate_grid_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| {
            HarnessError::Configuration(format!(
                "grid URL must use http or https scheme: {:?}",
                url
            ))
        })?;
    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");
    if host.is_empty() {
        return Err(HarnessError::Configuration(format!(
            "grid URL has no host: {:?}",
            url
        )));
    }
    Ok(())
}

/// Creates one fresh session per test from the immutable run configuration.
pub struct SessionFactory {
    config: RunConfig,
}

impl SessionFactory {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Build a session, apply the implicit wait bound, and navigate to the
    /// configured base URL so the test body starts on a loaded page.
    pub async fn create_session(&self) -> Result<WebSession> {
        let family = BrowserFamily::resolve(&self.config.browser);
        let mode = RunMode::resolve(&self.config.run_mode);

        if mode == RunMode::Grid {
            let grid_url = self.config.grid_url.as_deref().ok_or_else(|| {
                HarnessError::Configuration("runMode is grid but gridUrl is not set".to_string())
            })?;
            validate_grid_url(grid_url)?;
        }

        let playwright = Playwright::initialize()
            .await
            .map_err(|e| HarnessError::SessionCreation(format!("Playwright init: {}", e)))?;

        let browser = match mode {
            RunMode::Grid => {
                // Grid sessions attach over CDP, which is a Chromium-engine
                // protocol. Firefox grids are out of reach here.
                let endpoint = self.config.grid_url.as_deref().unwrap_or_default();
                if family == BrowserFamily::Firefox {
                    log::warn!("Grid mode drives the Chromium engine; firefox capability ignored");
                }
                println!(
                    "{} Connecting to grid at: {}",
                    "🔌".blue(),
                    endpoint.cyan()
                );
                playwright
                    .chromium()
                    .connect_over_cdp_builder(endpoint)
                    .connect_over_cdp()
                    .await
                    .map_err(|e| {
                        HarnessError::SessionCreation(format!(
                            "grid negotiation with {} failed: {}",
                            endpoint, e
                        ))
                    })?
            }
            RunMode::Local => self.launch_local(&playwright, family).await?,
        };

        let context = browser
            .context_builder()
            .build()
            .await
            .map_err(|e| HarnessError::SessionCreation(format!("browser context: {}", e)))?;
        let page = context
            .new_page()
            .await
            .map_err(|e| HarnessError::SessionCreation(format!("new page: {}", e)))?;
        page.set_viewport_size(Viewport {
            width: 1280,
            height: 720,
        })
        .await
        .map_err(|e| HarnessError::SessionCreation(format!("viewport: {}", e)))?;

        if !self.config.base_url.is_empty() {
            page.goto_builder(&self.config.base_url)
                .goto()
                .await
                .map_err(|e| {
                    HarnessError::SessionCreation(format!(
                        "initial navigation to {} failed: {}",
                        self.config.base_url, e
                    ))
                })?;
        }

        Ok(WebSession::new(
            playwright,
            browser,
            context,
            page,
            family,
            mode,
            self.config.base_url.clone(),
            self.config.implicit_wait_ms,
        ))
    }

    async fn launch_local(
        &self,
        playwright: &Playwright,
        family: BrowserFamily,
    ) -> Result<playwright::api::Browser> {
        // Default-family policy: chrome runs headless unless overridden,
        // the other families run headed.
        let headless = self
            .config
            .headless
            .unwrap_or(family == BrowserFamily::Chrome);

        let result = match family {
            BrowserFamily::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(headless)
                    .launch()
                    .await
            }
            BrowserFamily::Chrome | BrowserFamily::Edge => {
                let chromium = playwright.chromium();
                let mut launcher = chromium.launcher().headless(headless);

                let executable = browser_executable(family);
                if let Some(path) = &executable {
                    println!(
                        "{} Using browser executable: {}",
                        "🌐".blue(),
                        path.display()
                    );
                    launcher = launcher.executable(path);
                }

                let args: Vec<String> = [
                    "--no-sandbox",
                    "--disable-dev-shm-usage",
                    "--disable-gpu",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect();
                launcher = launcher.args(&args);
                launcher.launch().await
            }
        };

        result.map_err(|e| {
            HarnessError::SessionCreation(format!("failed to launch {}: {}", family, e))
        })
    }
}

/// Locate a family-specific executable. Edge is a Chromium channel, so local
/// Edge sessions are the Chromium engine pointed at the Edge binary.
fn browser_executable(family: BrowserFamily) -> Option<std::path::PathBuf> {
    let env_key = match family {
        BrowserFamily::Chrome => "WEBTRACE_CHROME_PATH",
        BrowserFamily::Edge => "WEBTRACE_EDGE_PATH",
        BrowserFamily::Firefox => return None,
    };
    if let Ok(path) = std::env::var(env_key) {
        return Some(std::path::PathBuf::from(path));
    }

    let candidates: &[&str] = match family {
        BrowserFamily::Chrome => &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ],
        BrowserFamily::Edge => &[
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            "/usr/bin/microsoft-edge",
            "/usr/bin/microsoft-edge-stable",
        ],
        BrowserFamily::Firefox => &[],
    };

    for path in candidates {
        let p = std::path::Path::new(path);
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_browser_names_map_to_their_family() {
        assert_eq!(BrowserFamily::parse("chrome"), Some(BrowserFamily::Chrome));
        assert_eq!(BrowserFamily::parse("Chrome"), Some(BrowserFamily::Chrome));
        assert_eq!(
            BrowserFamily::parse("firefox"),
            Some(BrowserFamily::Firefox)
        );
        assert_eq!(BrowserFamily::parse("EDGE"), Some(BrowserFamily::Edge));
        assert_eq!(BrowserFamily::parse("safari"), None);
    }

    #[test]
    fn unknown_browser_falls_back_to_default_family() {
        assert_eq!(BrowserFamily::resolve("netscape"), BrowserFamily::Chrome);
        assert_eq!(BrowserFamily::resolve(""), BrowserFamily::Chrome);
        // Known names are untouched by the fallback
        assert_eq!(BrowserFamily::resolve("firefox"), BrowserFamily::Firefox);
    }

    #[test]
    fn run_mode_is_grid_only_for_grid() {
        assert_eq!(RunMode::resolve("grid"), RunMode::Grid);
        assert_eq!(RunMode::resolve("GRID"), RunMode::Grid);
        assert_eq!(RunMode::resolve("local"), RunMode::Local);
        assert_eq!(RunMode::resolve("anything"), RunMode::Local);
    }

    #[test]
    fn grid_url_validation_accepts_http_endpoints() {
        assert!(validate_grid_url("http://localhost:4444/wd/hub").is_ok());
        assert!(validate_grid_url("https://grid.internal:4444").is_ok());
        assert!(validate_grid_url("http://10.0.0.1:9222").is_ok());
    }

    #[test]
    fn malformed_grid_url_is_a_configuration_error() {
        for bad in ["", "localhost:4444", "ftp://grid:4444", "http://", "https:///path"] {
            match validate_grid_url(bad) {
                Err(HarnessError::Configuration(_)) => {}
                other => panic!("expected Configuration error for {:?}, got {:?}", bad, other),
            }
        }
    }
}
