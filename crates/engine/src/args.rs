//! Command-line arguments for the engine host.

use std::path::PathBuf;

use clap::Parser;
use directories::ProjectDirs;

#[derive(Parser, Debug, Clone)]
#[command(name = "engine_host")]
#[command(about = "Bootstrap the engine modules and start the game", long_about = None)]
pub struct Args {
    /// Path to engine.toml (default: the app config directory)
    #[arg(short, long, value_name = "FILE", env = "ENGINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Colored console logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Append a cache-busting token to every module path
    #[arg(long)]
    pub nocache: bool,

    /// Print the module graph in Graphviz format after the bootstrap
    #[arg(long)]
    pub dot: bool,

    /// Write a default config file to the config path and exit
    #[arg(long)]
    pub write_config: bool,
}

impl Args {
    /// The `--config` path, or `engine.toml` in the app config directory.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        match ProjectDirs::from("com", "Pulsar", "Engine_Host") {
            Some(dirs) => dirs.config_dir().join("engine.toml"),
            None => PathBuf::from("engine.toml"),
        }
    }
}
