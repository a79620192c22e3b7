// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use photobooth::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "photobooth")]
#[command(about = "Countdown photo booth that turns three snapshots into a photo strip")]
#[command(version = photobooth::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive booth in the terminal (default)
    Terminal {
        /// Camera index to use (from 'photobooth list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Use a colour-bar test pattern instead of a camera
        #[arg(long)]
        test_pattern: bool,
    },

    /// List available cameras
    List,

    /// Take one strip without a UI and save it
    Strip {
        /// Camera index to use (from 'photobooth list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Use these image files as the camera, one per capture
        #[arg(short, long, num_args = 1.., conflicts_with_all = ["camera", "test_pattern"])]
        images: Vec<PathBuf>,

        /// Use a colour-bar test pattern instead of a camera
        #[arg(long, conflicts_with = "camera")]
        test_pattern: bool,

        /// Output directory (default: ~/Pictures/Photobooth)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compose a strip from three existing images
    Compose {
        #[arg(num_args = 3, required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (default: ~/Pictures/Photobooth)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Terminal { .. }));
    init_logging(interactive);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        None => cli::run_terminal(config, None, false),
        Some(Commands::Terminal {
            camera,
            test_pattern,
        }) => cli::run_terminal(config, camera, test_pattern),
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Strip {
            camera,
            images,
            test_pattern,
            output,
        }) => {
            let source = if !images.is_empty() {
                cli::SourceChoice::Images(images)
            } else if test_pattern {
                cli::SourceChoice::TestPattern
            } else {
                cli::SourceChoice::Camera(camera)
            };
            cli::take_strip(config, source, output)
        }
        Some(Commands::Compose { inputs, output }) => cli::compose_files(config, inputs, output),
        Some(Commands::Config { save }) => cli::print_config(&config, save),
    }
}

/// Set RUST_LOG to control the level, e.g. `RUST_LOG=photobooth=debug`
///
/// The terminal booth owns the screen, so its logs go to a file in the cache
/// directory instead of stderr.
fn init_logging(interactive: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if interactive
        && let Some(file) = log_file()
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn log_file() -> Option<std::fs::File> {
    let dir = dirs::cache_dir()?.join("photobooth");
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("photobooth.log"))
        .ok()
}
