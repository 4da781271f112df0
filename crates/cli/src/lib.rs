//! Walnut CLI
//!
//! Launches test runs from YAML suite files or compiled suites, and
//! scaffolds new projects.
//!
//! Compiled suites use [`Launcher`] directly:
//!
//! ```no_run
//! # async fn demo(suite: impl walnut_core::Suite + 'static) -> anyhow::Result<()> {
//! use walnut_cli::{LaunchOptions, Launcher};
//! use walnut_core::{RunContext, Settings};
//!
//! let run = RunContext::new(Settings::load("config/walnut.toml".as_ref())?);
//! let mut launcher = Launcher::new(run, LaunchOptions::default())?;
//! launcher.add_suite(move |_mgr| suite).await?;
//! let summary = launcher.launch().await?;
//! std::process::exit(if summary.success() { 0 } else { 1 });
//! # }
//! ```

pub mod init;
pub mod launcher;
pub mod output;

pub use launcher::{LaunchOptions, LaunchSummary, Launcher, ReporterKind};
