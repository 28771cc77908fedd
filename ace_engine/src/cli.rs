use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that runs a story session and reports its event log",
    version
)]
pub struct Args {
    /// Path to the story root directory (or its story.json directly)
    #[arg(long)]
    pub story_root: PathBuf,

    /// Dialogue script JSON file; repeat to merge several sources
    #[arg(long = "script", value_name = "PATH", required = true)]
    pub scripts: Vec<PathBuf>,

    /// Run a scripted player walkthrough instead of waiting for input
    #[arg(long)]
    pub demo: bool,

    /// Number of simulation ticks to run
    #[arg(long, default_value_t = 600)]
    pub ticks: u32,

    /// Seconds of game time per tick
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub tick_seconds: f32,

    /// Print info events as they are logged
    #[arg(long)]
    pub verbose: bool,

    /// Path to write the session event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,
}
