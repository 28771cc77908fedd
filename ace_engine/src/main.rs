use anyhow::Result;
use clap::Parser;

mod animation;
mod assets;
mod cli;
mod commands;
mod context;
mod dialogue;
mod runtime;
mod scheduler;
mod stack;
mod story;
mod transition;
mod ui;

use cli::Args;

fn main() -> Result<()> {
    runtime::execute(Args::parse())
}
