use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use webtrace::report::ReportFinalizer;
use webtrace::session::{SessionFactory, SessionHandle};
use webtrace::{RunConfig, Suite};

#[derive(Parser)]
#[command(name = "webtrace")]
#[command(version = "0.1.0")]
#[command(about = "Browser UI test harness with branded single-file Allure reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in smoke suite against the configured base URL
    Run {
        /// Run configuration file
        #[arg(short, long, default_value = "webtrace.yaml")]
        config: PathBuf,

        /// Require the page title to contain this text
        #[arg(long)]
        expect_title: Option<String>,

        /// Run cases concurrently, one session each
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Open the final report in the default viewer
        #[arg(long, default_value = "false")]
        open: bool,
    },

    /// Finalize an existing raw results directory into one branded report
    Report {
        /// Raw results directory written by a test run
        #[arg(short, long, default_value = "allure-results")]
        results: PathBuf,

        /// Output directory for the final report file
        #[arg(short = 'o', long, default_value = "reports")]
        reports_dir: PathBuf,

        /// Branding properties file
        #[arg(short, long, default_value = "resources/allure.properties")]
        properties: PathBuf,

        /// Open the final report in the default viewer
        #[arg(long, default_value = "false")]
        open: bool,
    },

    /// Create one session from configuration, print the page title, close
    Probe {
        /// Run configuration file
        #[arg(short, long, default_value = "webtrace.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            expect_title,
            parallel,
            open,
        } => {
            let config = RunConfig::load(&config)?;
            println!(
                "{} Running smoke suite against: {}",
                "▶".green().bold(),
                config.base_url.cyan()
            );

            let mut suite = Suite::new("webtrace smoke", config)
                .parallel(parallel)
                .open_report(open)
                .case("base url loads", |session| async move {
                    session.page_title().await?;
                    Ok(())
                });
            if let Some(expected) = expect_title {
                suite = suite.case("page title contains expectation", move |session| {
                    let expected = expected.clone();
                    async move {
                        let title = session.page_title().await?;
                        anyhow::ensure!(
                            title.contains(&expected),
                            "title {:?} does not contain {:?}",
                            title,
                            expected
                        );
                        Ok(())
                    }
                });
            }

            let summary = suite.run().await?;
            println!(
                "  {} passed, {} failed, {} skipped",
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.skipped.to_string().yellow()
            );
            if !summary.all_passed() {
                std::process::exit(1);
            }
        }

        Commands::Report {
            results,
            reports_dir,
            properties,
            open,
        } => {
            println!(
                "{} Generating report from: {}",
                "📊".blue(),
                results.display().to_string().cyan()
            );
            let final_path = ReportFinalizer::new(results, reports_dir, properties)
                .open_after(open)
                .finalize()
                .await?;
            log::info!("Report written to {}", final_path.display());
        }

        Commands::Probe { config } => {
            let config = RunConfig::load(&config)?;
            println!(
                "{} Probing {} session against: {}",
                "🌐".blue(),
                config.browser.cyan(),
                config.base_url.cyan()
            );
            let factory = SessionFactory::new(config);
            let session = factory.create_session().await?;
            let title = session.page_title().await?;
            println!("{} Page title: {}", "✅".green(), title);
            session.close().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_declaration_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_subcommand_parses_config_and_flags() {
        let cli = Cli::parse_from([
            "webtrace",
            "run",
            "--config",
            "ci.yaml",
            "--expect-title",
            "Example",
            "--parallel",
            "--open",
        ]);
        match cli.command {
            Commands::Run {
                config,
                expect_title,
                parallel,
                open,
            } => {
                assert_eq!(config, PathBuf::from("ci.yaml"));
                assert_eq!(expect_title.as_deref(), Some("Example"));
                assert!(parallel);
                assert!(open);
            }
            _ => panic!("expected the run subcommand"),
        }
    }
}
