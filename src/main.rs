use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "text-overlay-rust",
    version,
    about = "HTTP service that draws text onto images"
)]
struct Cli {
    /// Address to listen on (overrides [server].addr)
    #[arg(short = 'a', long = "addr")]
    addr: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "settings")]
    settings: Option<String>,

    /// Folder for uploaded fonts (overrides [fonts].dir)
    #[arg(long = "fonts-dir")]
    fonts_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    text_overlay_rust::logging::init(cli.verbose)?;
    text_overlay_rust::run(text_overlay_rust::Config {
        addr: cli.addr,
        settings_path: cli.settings,
        fonts_dir: cli.fonts_dir,
    })
    .await
}
