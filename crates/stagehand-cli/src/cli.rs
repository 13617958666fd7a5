//! Command-line interface definitions for the stagehand binary.

use std::path::PathBuf;

use clap::Parser;
use logging::LogArgs;

/// Command-line interface arguments for the stagehand binary.
#[derive(Parser, Debug)]
#[command(name = "stagehand", about = "Run UI test suites against the demo application", version)]
pub struct Cli {
    /// Logging controls
    #[command(flatten)]
    pub log: LogArgs,

    /// Optional path to a RON harness config
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the reports directory from the config
    #[arg(long, value_name = "DIR")]
    pub reports: Option<PathBuf>,

    /// Only run tests carrying one of these comma-separated tags
    #[arg(long, value_name = "TAGS", conflicts_with = "name")]
    pub tags: Option<String>,

    /// Run the single test with this name
    #[arg(long)]
    pub name: Option<String>,

    /// List the discovered cases and exit
    #[arg(long)]
    pub list: bool,

    /// Watch visual health while the suite runs
    #[arg(long)]
    pub health: bool,

    /// Stay up after the first run and rerun on the run hotkey; each line on
    /// stdin presses the hotkey
    #[arg(long)]
    pub watch: bool,

    /// Suppress per-case progress lines
    #[arg(long)]
    pub quiet: bool,

    /// Host launch arguments, e.g. `-- -runSuiteTests --tags=smoke -quitOnFinish`
    #[arg(last = true, allow_hyphen_values = true)]
    pub host_args: Vec<String>,
}
