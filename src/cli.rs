use crate::config::PathOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "musicsynq")]
#[command(version, about = "Mirror a music library onto a portable player", long_about = None)]
pub struct Cli {
    /// Directory holding config.json and the log file
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Also print log output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Make the device match the library
    Sync {
        #[command(flatten)]
        paths: PathArgs,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
        /// Skip removing empty folders from the library
        #[arg(long)]
        no_prune: bool,
    },
    /// Show what a sync would do without touching any file
    Analyze {
        #[command(flatten)]
        paths: PathArgs,
        /// List every file to add and delete
        #[arg(long)]
        list: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show capacity of the target volumes
    Space {
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Show or change saved sync settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Show or change log settings
    #[command(subcommand)]
    Log(LogCommand),
}

#[derive(Debug, Clone, Default, Args)]
pub struct PathArgs {
    /// Music library directory
    #[arg(short, long, value_name = "DIR")]
    pub library: Option<PathBuf>,
    /// Root of the player's internal storage
    #[arg(short, long, value_name = "DIR")]
    pub primary: Option<PathBuf>,
    /// Root of the extension card
    #[arg(short, long, value_name = "DIR")]
    pub secondary: Option<PathBuf>,
}

impl From<PathArgs> for PathOverrides {
    fn from(args: PathArgs) -> Self {
        Self {
            library: args.library,
            primary: args.primary,
            secondary: args.secondary,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the saved settings
    Show,
    /// Change saved settings
    Set(ConfigSetArgs),
}

#[derive(Debug, Default, Args)]
pub struct ConfigSetArgs {
    #[arg(long, value_name = "DIR")]
    pub library: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    pub primary: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    pub secondary: Option<PathBuf>,
    /// Forget the saved extension card
    #[arg(long, conflicts_with = "secondary")]
    pub clear_secondary: bool,
    #[arg(long)]
    pub music_folder: Option<String>,
    /// Comma separated, e.g. MP3,M4A,JPG
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,
    /// Space to keep free on the player, in MB
    #[arg(long, value_name = "MB")]
    pub margin: Option<u64>,
    #[arg(long)]
    pub max_attempts: Option<u32>,
    #[arg(long, value_name = "MS")]
    pub retry_backoff: Option<u64>,
    #[arg(long)]
    pub prune_library: Option<bool>,
    #[arg(long)]
    pub create_music_folder: Option<bool>,
}

#[derive(Debug, Subcommand)]
pub enum LogCommand {
    /// Print log settings and the log file location
    Show,
    /// Change log settings
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        /// Rotate the log past this size (1-100 MB)
        #[arg(long, value_name = "MB")]
        max_size: Option<u32>,
        /// error, warn, info, debug or trace
        #[arg(long)]
        level: Option<String>,
    },
}
