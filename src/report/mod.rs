pub mod branding;
pub mod finalizer;

pub use branding::{apply_branding, BrandingConfig};
pub use finalizer::{AllureCli, ReportFinalizer, ReportGenerator};

use crate::config::RunConfig;

/// Build the finalizer the way a run configures it.
pub fn finalizer_from_config(config: &RunConfig, open_after: bool) -> ReportFinalizer {
    ReportFinalizer::new(
        &config.results_dir,
        &config.reports_dir,
        &config.properties_path,
    )
    .open_after(open_after)
}
