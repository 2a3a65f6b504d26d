// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "code-scanner")]
#[command(about = "Scan barcodes with a camera or from image files")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (default: ~/.config/code-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the result envelope as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan with a live camera
    Scan {
        /// Use the front camera
        #[arg(long)]
        front: bool,

        /// Offer the torch toggle (switched on right away)
        #[arg(long)]
        torch: bool,

        /// Do not ring the bell on each scan
        #[arg(long)]
        no_haptics: bool,

        /// Comma separated symbologies, e.g. qr_code,ean13
        #[arg(long, value_delimiter = ',')]
        formats: Vec<String>,

        /// Print every code and keep scanning until Ctrl+C
        #[arg(long = "continue")]
        keep_going: bool,
    },

    /// Scan image files
    Image {
        /// Images to scan, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Comma separated symbologies, e.g. qr_code,ean13
        #[arg(long, value_delimiter = ',')]
        formats: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=code_scanner=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = cli::Output { json: cli.json };

    let code = match cli.command {
        Commands::List => {
            cli::list_cameras();
            return Ok(());
        }
        Commands::Scan {
            front,
            torch,
            no_haptics,
            formats,
            keep_going,
        } => {
            let mut config = cli::load_config(cli.config.as_deref(), &formats)?;
            config.use_front_camera |= front;
            config.show_torch_toggle |= torch;
            if no_haptics {
                config.haptic_feedback = false;
            }
            cli::scan_camera(config, torch, keep_going, output)?
        }
        Commands::Image { paths, formats } => {
            let config = cli::load_config(cli.config.as_deref(), &formats)?;
            cli::scan_images(config, &paths, output)?
        }
    };

    std::process::exit(code)
}
