//! 日志模块 - 文件日志、大小轮转和初始化

use crate::config::{read_section, write_section};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "musicsynq.log";

/// 可选的日志级别
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "log").unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        write_section(config_dir, "log", self)
    }

    /// 修改配置；大小限制在 1-100 MB，级别必须合法
    pub fn update(
        &mut self,
        enabled: Option<bool>,
        max_size_mb: Option<u32>,
        level: Option<&str>,
    ) -> Result<(), String> {
        if let Some(level) = level {
            let level = level.to_lowercase();
            if !LOG_LEVELS.contains(&level.as_str()) {
                return Err(format!("无效的日志级别: {}", level));
            }
            self.level = level;
        }
        if let Some(enabled) = enabled {
            self.enabled = enabled;
        }
        if let Some(size) = max_size_mb {
            self.max_size_mb = size.clamp(1, 100);
        }
        Ok(())
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 带大小限制的日志文件，超过上限时改名为 `.old` 后重新打开
pub struct RotatingFile {
    file_path: PathBuf,
    max_size: u64,
    written: u64,
    writer: BufWriter<File>,
}

impl RotatingFile {
    pub fn open(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE);
        let max_size = u64::from(max_size_mb) * 1024 * 1024;

        if fs::metadata(&file_path).map(|m| m.len() > max_size).unwrap_or(false) {
            rotate(&file_path)?;
        }
        let (writer, written) = open_append(&file_path)?;

        Ok(Self {
            file_path,
            max_size,
            written,
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn rotate_if_needed(&mut self) -> io::Result<()> {
        if self.written <= self.max_size {
            return Ok(());
        }
        self.writer.flush()?;
        rotate(&self.file_path)?;
        let (writer, written) = open_append(&self.file_path)?;
        self.writer = writer;
        self.written = written;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.writer.flush()?;
        self.written += n as u64;
        self.rotate_if_needed()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn open_append(file_path: &Path) -> io::Result<(BufWriter<File>, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;
    let len = file.metadata()?.len();
    Ok((BufWriter::new(file), len))
}

/// musicsynq.log -> musicsynq.log.old，旧备份直接覆盖
fn rotate(file_path: &Path) -> io::Result<()> {
    let backup_path = file_path.with_extension("log.old");
    if backup_path.exists() {
        fs::remove_file(&backup_path)?;
    }
    fs::rename(file_path, &backup_path)
}

/// 初始化日志系统
///
/// 返回的 guard 必须活到进程结束，否则缓冲中的日志会丢失。
/// `verbose` 时同时输出到 stderr。
pub fn init_logging(config_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    let config = LogConfig::load(config_dir);

    // 两个分支都直接叠在 Registry 上
    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .boxed()
    });

    if !config.enabled {
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(level_filter(&config))
            .try_init();
        return None;
    }

    let (file_layer, guard) = match RotatingFile::open(config_dir, config.max_size_mb) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("无法打开日志文件: {}", e);
            (None, None)
        }
    };

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(level_filter(&config))
        .with(file_layer)
        .try_init();

    guard
}

fn level_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_update_clamps_and_validates() {
        let mut config = LogConfig::default();
        config.update(None, Some(500), Some("DEBUG")).unwrap();
        assert_eq!(config.max_size_mb, 100);
        assert_eq!(config.level, "debug");

        config.update(Some(false), Some(0), None).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.max_size_mb, 1);

        assert!(config.update(None, None, Some("loud")).is_err());
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_log_section_shares_config_file() {
        let dir = TempDir::new().unwrap();
        crate::config::SyncSettings::default().save(dir.path()).unwrap();

        let config = LogConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        config.save(dir.path()).unwrap();

        assert_eq!(LogConfig::load(dir.path()), config);
        assert_eq!(
            crate::config::SyncSettings::load(dir.path()),
            crate::config::SyncSettings::default()
        );
    }

    #[test]
    fn test_init_logging_opens_file() {
        let dir = TempDir::new().unwrap();
        let guard = init_logging(dir.path(), true);
        assert!(guard.is_some());
        assert!(dir.path().join("musicsynq.log").exists());
        tracing::info!("日志初始化完成");
        drop(guard);

        let disabled = TempDir::new().unwrap();
        LogConfig {
            enabled: false,
            ..Default::default()
        }
        .save(disabled.path())
        .unwrap();
        assert!(init_logging(disabled.path(), false).is_none());
        assert!(!disabled.path().join("musicsynq.log").exists());
    }

    #[test]
    fn test_file_rotates_past_limit() {
        let dir = TempDir::new().unwrap();
        let mut file = RotatingFile::open(dir.path(), 1).unwrap();

        let line = vec![b'x'; 64 * 1024];
        for _ in 0..17 {
            file.write_all(&line).unwrap();
        }
        file.flush().unwrap();

        let backup = dir.path().join("musicsynq.log.old");
        assert!(backup.exists());
        assert!(fs::metadata(&backup).unwrap().len() > 1024 * 1024);
        assert!(fs::metadata(file.path()).unwrap().len() < 1024 * 1024);
    }
}
