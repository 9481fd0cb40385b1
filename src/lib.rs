pub mod config;
pub mod error;
pub mod evidence;
pub mod listener;
pub mod report;
pub mod results;
pub mod runner;
pub mod session;

// Re-export common items
pub use config::RunConfig;
pub use error::{HarnessError, Result};
pub use runner::{RunSummary, Suite};
pub use session::{BrowserFamily, RunMode, SessionFactory, SessionHandle, SessionRegistry, UnitId, WebSession};
