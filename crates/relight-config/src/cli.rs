//! Command-line argument parsing for the relight viewer.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Relight viewer command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "relight", about = "Tiled RTI relighting viewer")]
pub struct CliArgs {
    /// Dataset URL or local directory (overrides `source.url`).
    pub url: Option<String>,

    /// Tile pyramid layout (image, google, deepzoom, zoomify, iip, iiif).
    #[arg(long)]
    pub layout: Option<String>,

    /// Image server endpoint for iip/iiif layouts.
    #[arg(long)]
    pub server: Option<String>,

    /// Dataset path on the image server.
    #[arg(long)]
    pub path: Option<String>,

    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Normal preview mode (0 off, 1 tangent, 2 lit).
    #[arg(long)]
    pub normals: Option<u8>,

    /// Maximum tiles in flight.
    #[arg(long)]
    pub max_requested: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref url) = args.url {
            self.source.url = url.clone();
        }
        if let Some(ref layout) = args.layout {
            self.source.layout = layout.clone();
        }
        if let Some(ref server) = args.server {
            self.source.server = Some(server.clone());
        }
        if let Some(ref path) = args.path {
            self.source.path = Some(path.clone());
        }
        if let Some(w) = args.width {
            self.viewer.width = w;
        }
        if let Some(h) = args.height {
            self.viewer.height = h;
        }
        if let Some(n) = args.normals {
            self.view.normals = n;
        }
        if let Some(max) = args.max_requested {
            self.fetch.max_requested = max;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            url: Some("https://example.org/coin".to_string()),
            layout: Some("deepzoom".to_string()),
            width: Some(1920),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.source.url, "https://example.org/coin");
        assert_eq!(config.source.layout, "deepzoom");
        assert_eq!(config.viewer.width, 1920);
        // Non-overridden fields retain defaults
        assert_eq!(config.viewer.height, 720);
        assert_eq!(config.fetch.max_requested, 4);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_positional_url() {
        let args = CliArgs::parse_from([
            "relight",
            "/data/coin",
            "--layout",
            "iip",
            "--server",
            "http://srv/iipsrv.fcgi",
            "--max-requested",
            "6",
        ]);
        let mut config = Config::default();
        config.apply_cli_overrides(&args);
        assert_eq!(config.source.url, "/data/coin");
        assert_eq!(config.source.server.as_deref(), Some("http://srv/iipsrv.fcgi"));
        assert_eq!(config.fetch.max_requested, 6);
    }
}
