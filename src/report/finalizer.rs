//! Post-run report finalization.
//!
//! Invokes the external generator against the raw results directory, patches
//! the emitted HTML with branding, and atomically swaps the timestamped temp
//! output for a single self-contained report file.

use async_trait::async_trait;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{HarnessError, Result};
use crate::report::branding::{apply_branding, BrandingConfig};

/// Subprocess seam for the external report tool. The textual patching is
/// testable against fixture output by substituting this implementation.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Produce a single-file HTML report rooted at `index.html` inside
    /// `output_dir`. Blocks until the tool exits.
    async fn generate(&self, results_dir: &Path, output_dir: &Path) -> Result<()>;
}

/// The Allure commandline, resolved from PATH.
pub struct AllureCli;

#[async_trait]
impl ReportGenerator for AllureCli {
    async fn generate(&self, results_dir: &Path, output_dir: &Path) -> Result<()> {
        let binary = which::which("allure").map_err(|e| {
            HarnessError::ReportGeneration(format!("allure commandline not found: {}", e))
        })?;

        // Child output goes straight to our streams so generator progress
        // stays visible.
        let status = Command::new(&binary)
            .arg("generate")
            .arg(results_dir)
            .arg("--clean")
            .arg("--single-file")
            .arg("-o")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| HarnessError::ReportGeneration(format!("failed to spawn allure: {}", e)))?;

        if !status.success() {
            return Err(HarnessError::ReportGeneration(format!(
                "allure exited with {}",
                status
            )));
        }
        Ok(())
    }
}

/// Temp and final paths for one finalization, derived from a shared
/// timestamp. Second granularity; a same-second double run collides and is
/// an accepted edge case.
pub fn timestamped_paths(reports_dir: &Path, stamp: &str) -> (PathBuf, PathBuf) {
    (
        reports_dir.join(format!("temp-allure-report-{}", stamp)),
        reports_dir.join(format!("allure-report-{}.html", stamp)),
    )
}

/// Converts one run's raw results into a single branded report file.
pub struct ReportFinalizer {
    results_dir: PathBuf,
    reports_dir: PathBuf,
    properties_path: PathBuf,
    open_after: bool,
    generator: Box<dyn ReportGenerator>,
}

impl ReportFinalizer {
    pub fn new(
        results_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        properties_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            results_dir: results_dir.into(),
            reports_dir: reports_dir.into(),
            properties_path: properties_path.into(),
            open_after: false,
            generator: Box::new(AllureCli),
        }
    }

    /// Open the final report in the platform viewer after a successful run.
    pub fn open_after(mut self, open: bool) -> Self {
        self.open_after = open;
        self
    }

    /// Substitute the generator subprocess, primarily for tests.
    pub fn with_generator(mut self, generator: Box<dyn ReportGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Run the full pipeline. Any failure up to the final write aborts with
    /// no final report and leaves the temp directory for diagnosis; cleanup
    /// and viewer problems after the write are logged only.
    pub async fn finalize(&self) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (temp_dir, final_path) = timestamped_paths(&self.reports_dir, &stamp);

        let branding = BrandingConfig::load(&self.properties_path);

        self.generator
            .generate(&self.results_dir, &temp_dir)
            .await?;

        let index = temp_dir.join("index.html");
        if !index.exists() {
            return Err(HarnessError::ReportGeneration(format!(
                "index.html not found in {}",
                temp_dir.display()
            )));
        }

        let html = std::fs::read_to_string(&index)?;
        let html = apply_branding(&html, &branding)?;

        std::fs::create_dir_all(&self.reports_dir)?;
        std::fs::write(&final_path, html)?;

        remove_tree(&temp_dir);

        println!(
            "{} Single-file report generated at: {}",
            "✅".green(),
            final_path.display().to_string().cyan()
        );

        if self.open_after {
            open_in_viewer(&final_path);
        }

        Ok(final_path)
    }
}

/// Best-effort recursive delete, files first then directories deepest-first.
/// Failures are surfaced as warnings, never errors: the report already
/// exists.
fn remove_tree(dir: &Path) {
    if !dir.exists() {
        return;
    }
    for entry in walkdir::WalkDir::new(dir)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        };
        if let Err(e) = result {
            log::warn!("Could not remove {}: {}", entry.path().display(), e);
        }
    }
}

/// Hand the report to the platform's opener, if one exists. Non-fatal.
fn open_in_viewer(path: &Path) {
    let result = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(path).spawn()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn()
    } else {
        std::process::Command::new("xdg-open").arg(path).spawn()
    };
    if let Err(e) = result {
        log::warn!("Could not open report viewer: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const FIXTURE: &str = "<html><head><title>Allure Report</title></head>\
<body>ok</body></html>";

    /// Stands in for the allure commandline: emits fixture HTML.
    struct StubGenerator {
        invoked: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ReportGenerator for StubGenerator {
        async fn generate(&self, _results_dir: &Path, output_dir: &Path) -> Result<()> {
            self.invoked.store(true, Ordering::SeqCst);
            std::fs::create_dir_all(output_dir)?;
            std::fs::write(output_dir.join("index.html"), FIXTURE)?;
            Ok(())
        }
    }

    /// Fails like a non-zero exit, after leaving partial output behind.
    struct FailingGenerator;

    #[async_trait]
    impl ReportGenerator for FailingGenerator {
        async fn generate(&self, _results_dir: &Path, output_dir: &Path) -> Result<()> {
            std::fs::create_dir_all(output_dir)?;
            std::fs::write(output_dir.join("partial.log"), "boom")?;
            Err(HarnessError::ReportGeneration(
                "allure exited with exit status: 2".to_string(),
            ))
        }
    }

    /// Exits zero but produces an unexpected layout.
    struct EmptyGenerator;

    #[async_trait]
    impl ReportGenerator for EmptyGenerator {
        async fn generate(&self, _results_dir: &Path, output_dir: &Path) -> Result<()> {
            std::fs::create_dir_all(output_dir)?;
            Ok(())
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("webtrace-finalize-{}", uuid::Uuid::new_v4()))
    }

    fn finalizer(root: &Path, generator: Box<dyn ReportGenerator>) -> ReportFinalizer {
        ReportFinalizer::new(
            root.join("allure-results"),
            root.join("reports"),
            root.join("allure.properties"),
        )
        .with_generator(generator)
    }

    #[test]
    fn paths_share_the_timestamp() {
        let (temp, fin) = timestamped_paths(Path::new("reports"), "20240501_120000");
        assert_eq!(temp, Path::new("reports/temp-allure-report-20240501_120000"));
        assert_eq!(fin, Path::new("reports/allure-report-20240501_120000.html"));
    }

    #[tokio::test]
    async fn finalize_writes_branded_report_and_cleans_temp() {
        let root = scratch_dir();
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(
            root.join("allure.properties"),
            "allure.report.title=Branded Run\n",
        )
        .unwrap();

        let invoked = Arc::new(AtomicBool::new(false));
        let final_path = finalizer(
            &root,
            Box::new(StubGenerator {
                invoked: invoked.clone(),
            }),
        )
        .finalize()
        .await
        .unwrap();

        assert!(invoked.load(Ordering::SeqCst));
        let html = std::fs::read_to_string(&final_path).unwrap();
        assert!(html.contains("<title>Branded Run</title>"));

        // Temp directory is gone after success
        let leftovers: Vec<_> = std::fs::read_dir(root.join("reports"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("temp-"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn generator_failure_leaves_no_final_report_and_keeps_temp() {
        let root = scratch_dir();
        std::fs::create_dir_all(&root).unwrap();

        let result = finalizer(&root, Box::new(FailingGenerator)).finalize().await;
        match result {
            Err(HarnessError::ReportGeneration(msg)) => assert!(msg.contains("2")),
            other => panic!("expected ReportGeneration error, got {:?}", other),
        }

        let reports = root.join("reports");
        let entries: Vec<_> = std::fs::read_dir(&reports)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        // Temp dir kept for diagnosis, no .html written
        assert!(entries
            .iter()
            .all(|e| !e.file_name().to_string_lossy().ends_with(".html")));
        assert!(entries
            .iter()
            .any(|e| e.file_name().to_string_lossy().starts_with("temp-")));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn missing_index_is_a_generation_error() {
        let root = scratch_dir();
        std::fs::create_dir_all(&root).unwrap();

        let result = finalizer(&root, Box::new(EmptyGenerator)).finalize().await;
        match result {
            Err(HarnessError::ReportGeneration(msg)) => assert!(msg.contains("index.html")),
            other => panic!("expected ReportGeneration error, got {:?}", other),
        }

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn missing_properties_file_still_produces_a_report() {
        let root = scratch_dir();
        std::fs::create_dir_all(&root).unwrap();

        let invoked = Arc::new(AtomicBool::new(false));
        let final_path = finalizer(
            &root,
            Box::new(StubGenerator { invoked }),
        )
        .finalize()
        .await
        .unwrap();

        let html = std::fs::read_to_string(final_path).unwrap();
        // Default title survives untouched
        assert!(html.contains("<title>Allure Report</title>"));

        std::fs::remove_dir_all(&root).ok();
    }
}
