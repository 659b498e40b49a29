//! 命令行子命令的实现

pub mod analyze;
pub mod config;
pub mod log;
pub mod space;
pub mod sync;

use crate::cli::{Commands, ConfigCommand, LogCommand, PathArgs};
use crate::config::{SyncConfig, SyncSettings};
use crate::core::RunStatus;
use anyhow::Result;
use std::path::Path;

/// 执行子命令，返回进程退出码
pub async fn dispatch(command: Commands, config_dir: &Path) -> Result<i32> {
    match command {
        Commands::Sync {
            paths,
            json,
            no_prune,
        } => {
            let status = sync::run_sync(config_dir, paths, json, no_prune).await?;
            Ok(match status {
                RunStatus::Completed => 0,
                RunStatus::SpaceExhausted => 2,
            })
        }
        Commands::Analyze { paths, list, json } => {
            analyze::analyze(config_dir, paths, list, json).await?;
            Ok(0)
        }
        Commands::Space { paths } => {
            space::show_space(config_dir, paths).await?;
            Ok(0)
        }
        Commands::Config(ConfigCommand::Show) => {
            config::show_config(config_dir)?;
            Ok(0)
        }
        Commands::Config(ConfigCommand::Set(args)) => {
            config::set_config(config_dir, args)?;
            Ok(0)
        }
        Commands::Log(LogCommand::Show) => {
            log::show_log_config(config_dir)?;
            Ok(0)
        }
        Commands::Log(LogCommand::Set {
            enabled,
            max_size,
            level,
        }) => {
            log::set_log_config(config_dir, enabled, max_size, level.as_deref())?;
            Ok(0)
        }
    }
}

/// 读取保存的设置并合并命令行路径
pub(crate) fn load_config(config_dir: &Path, paths: PathArgs) -> Result<SyncConfig> {
    let settings = SyncSettings::load(config_dir);
    Ok(settings.resolve(&paths.into())?)
}
