//! Relight viewer: streams a tiled RTI dataset and relights it
//! interactively.
//!
//! Left drag pans, right drag (or shift + drag, or `L` to toggle) moves the
//! light, the wheel zooms. `H` fits the image, `C` centers it, `R` rotates,
//! `N` cycles the normals preview, `Esc` quits.

mod controls;
mod platform;
mod viewer;

use std::process::ExitCode;

use clap::Parser;
use relight_config::{CliArgs, Config};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match platform::PlatformDirs::resolve_and_create() {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to initialize platform directories: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config_dir = args.config.clone().unwrap_or_else(|| dirs.config_dir.clone());

    let (mut config, config_error) = match Config::load_or_create(&config_dir) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_cli_overrides(&args);

    relight_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));
    if let Some(e) = config_error {
        warn!(error = %e, dir = %config_dir.display(), "using default config");
    }
    info!(
        config = %config_dir.display(),
        logs = %dirs.log_dir.display(),
        "relight viewer"
    );

    if config.source.url.is_empty() && config.source.img.is_none() && config.source.dem.is_none()
    {
        error!("no dataset given; pass a URL or set source.url in config.ron");
        return ExitCode::from(2);
    }
    info!(
        url = %config.source.url,
        layout = %config.source.layout,
        "opening dataset"
    );

    match viewer::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "viewer failed");
            ExitCode::FAILURE
        }
    }
}
