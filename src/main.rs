mod backup;
mod cli;
mod config;
mod convert;
mod driver;
mod error;
mod fs_utils;
mod game;
mod location;
mod logging;
mod maintenance;
mod manifest;
mod media;
mod piracy;
mod progress;
mod rules;
mod store;
mod verify;

use anyhow::Result;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    cli::run()
}
