//! Real-time console output for a running suite.

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Mutex;
use std::time::Duration;

use crate::listener::{LifecycleListener, TestEvent};
use crate::session::UnitId;

pub struct ConsoleListener {
    multi: MultiProgress,
    spinners: Mutex<HashMap<UnitId, ProgressBar>>,
}

impl ConsoleListener {
    pub fn new() -> Self {
        // Hidden draw target when piped, to keep escape codes out of logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self {
            multi,
            spinners: Mutex::new(HashMap::new()),
        }
    }

    fn start_spinner(&self, unit: UnitId, name: &str) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("  {spinner} {msg}")
            .expect("spinner template is valid");
        pb.set_style(style);
        pb.set_message(format!("{}... ", name.dimmed()));
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinners
            .lock()
            .expect("spinner lock poisoned")
            .insert(unit, pb);
    }

    fn finish_spinner(&self, unit: UnitId, line: String) {
        let pb = self
            .spinners
            .lock()
            .expect("spinner lock poisoned")
            .remove(&unit);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        println!("{}", line);
    }
}

impl Default for ConsoleListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleListener for ConsoleListener {
    async fn on_event(&self, event: &TestEvent) {
        match event {
            TestEvent::RunStarted { suite } => {
                println!(
                    "\n{} Test run started: {}",
                    "▶".green().bold(),
                    suite.cyan()
                );
            }
            TestEvent::TestStarted { unit, name } => {
                self.start_spinner(*unit, name);
            }
            TestEvent::TestPassed { unit, name } => {
                self.finish_spinner(*unit, format!("  {} {}", "✓".green(), name));
            }
            TestEvent::TestFailed { unit, name, error } => {
                let detail = error
                    .as_deref()
                    .map(|e| format!(": {}", e.red()))
                    .unwrap_or_default();
                self.finish_spinner(*unit, format!("  {} {}{}", "✗".red(), name, detail));
            }
            TestEvent::TestSkipped { unit, name } => {
                self.finish_spinner(
                    *unit,
                    format!("  {} {} {}", "○".yellow(), name, "(skipped)".dimmed()),
                );
            }
            TestEvent::RunFinished { suite } => {
                println!(
                    "{} Finished executing suite: {}",
                    "■".blue().bold(),
                    suite.cyan()
                );
            }
        }
    }
}
