use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// Run configuration, resolved once per run and read-only afterwards.
///
/// Loaded from a YAML file, then overlaid with `WEBTRACE_*` environment
/// variables so CI can flip the browser or grid endpoint without editing
/// the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Browser name: chrome | firefox | edge. Unknown names fall back to the
    /// default family with a warning.
    pub browser: String,

    /// Absolute URL every fresh session navigates to before the test body
    /// runs.
    pub base_url: String,

    /// "grid" for a remote session; anything else means local.
    pub run_mode: String,

    /// Remote endpoint, required when `run_mode` is "grid".
    pub grid_url: Option<String>,

    /// Implicit element-wait timeout applied to every session (ms).
    pub implicit_wait_ms: u64,

    /// Headless override. When unset, the default family runs headless and
    /// the others run headed.
    pub headless: Option<bool>,

    /// Raw results directory, written incrementally during the run.
    pub results_dir: PathBuf,

    /// Where final report files land.
    pub reports_dir: PathBuf,

    /// Well-known branding properties file. Absence means default branding.
    pub properties_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            browser: "chrome".to_string(),
            base_url: String::new(),
            run_mode: "local".to_string(),
            grid_url: None,
            implicit_wait_ms: 10_000,
            headless: None,
            results_dir: PathBuf::from("allure-results"),
            reports_dir: PathBuf::from("reports"),
            properties_path: PathBuf::from("resources/allure.properties"),
        }
    }
}

impl RunConfig {
    /// Load from a YAML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| HarnessError::Configuration(format!("{}: {}", path.display(), e)))?;
        Ok(config.with_env_overrides())
    }

    /// Overlay `WEBTRACE_*` environment variables on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("WEBTRACE_BROWSER") {
            self.browser = v;
        }
        if let Ok(v) = std::env::var("WEBTRACE_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = std::env::var("WEBTRACE_RUN_MODE") {
            self.run_mode = v;
        }
        if let Ok(v) = std::env::var("WEBTRACE_GRID_URL") {
            self.grid_url = Some(v);
        }
        if let Ok(v) = std::env::var("WEBTRACE_HEADLESS") {
            self.headless = Some(v == "true" || v == "1");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = RunConfig::default();
        assert_eq!(config.browser, "chrome");
        assert_eq!(config.run_mode, "local");
        assert_eq!(config.implicit_wait_ms, 10_000);
        assert_eq!(config.results_dir, PathBuf::from("allure-results"));
        assert_eq!(config.reports_dir, PathBuf::from("reports"));
        assert!(config.grid_url.is_none());
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = "browser: firefox\nbaseUrl: https://example.com\nrunMode: grid\ngridUrl: http://localhost:4444/wd/hub\n";
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.browser, "firefox");
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.run_mode, "grid");
        assert_eq!(
            config.grid_url.as_deref(),
            Some("http://localhost:4444/wd/hub")
        );
        // Untouched fields keep defaults
        assert_eq!(config.implicit_wait_ms, 10_000);
    }
}
