//! 日志相关命令

use crate::logging::LogConfig;
use anyhow::{anyhow, Result};
use std::path::Path;

/// 打印日志配置
pub fn show_log_config(config_dir: &Path) -> Result<()> {
    let config = LogConfig::load(config_dir);
    println!("# {}", config_dir.join("musicsynq.log").display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// 设置日志配置，下次启动生效
pub fn set_log_config(
    config_dir: &Path,
    enabled: Option<bool>,
    max_size_mb: Option<u32>,
    level: Option<&str>,
) -> Result<LogConfig> {
    let mut config = LogConfig::load(config_dir);
    config
        .update(enabled, max_size_mb, level)
        .map_err(|e| anyhow!(e))?;
    config.save(config_dir)?;

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(config)
}
