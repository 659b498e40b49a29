//! 应用配置模块
//!
//! 所有配置都保存在配置目录下的 `config.json` 中，按分区存放（`sync`、`log`）。

use crate::core::media::DEFAULT_EXTENSIONS;
use crate::error::SyncError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 主设备必须保留的剩余空间（100 MiB）
pub const DEFAULT_FREE_SPACE_MARGIN: u64 = 100 * 1024 * 1024;
/// 单个文件最多尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;
/// 失败后等待时间（毫秒）
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 3000;

const CONFIG_FILE: &str = "config.json";

/// 默认配置目录
pub fn default_config_dir() -> PathBuf {
    crate::dirs::config_dir()
        .map(|p| p.join("musicsynq"))
        .unwrap_or_else(|| PathBuf::from(".musicsynq"))
}

/// 读取 config.json 中的一个分区，文件不存在或解析失败时返回 None
pub(crate) fn read_section<T: DeserializeOwned>(config_dir: &Path, section: &str) -> Option<T> {
    let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).ok()?;
    let config = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    serde_json::from_value(config.get(section)?.clone()).ok()
}

/// 更新 config.json 中的一个分区，其他分区原样保留
pub(crate) fn write_section<T: Serialize>(
    config_dir: &Path,
    section: &str,
    value: &T,
) -> io::Result<()> {
    fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join(CONFIG_FILE);

    let mut config: serde_json::Value = if config_file.exists() {
        let content = fs::read_to_string(&config_file)?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };
    if !config.is_object() {
        config = serde_json::json!({});
    }

    config[section] = serde_json::to_value(value).map_err(io::Error::other)?;

    let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
    fs::write(&config_file, content)
}

/// 持久化的同步设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// 音乐库目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_path: Option<PathBuf>,
    /// 主设备根目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_path: Option<PathBuf>,
    /// 扩展卡根目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_path: Option<PathBuf>,
    #[serde(default = "default_music_folder")]
    pub music_folder: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// 主设备保留空间（MB）
    #[serde(default = "default_margin_mb")]
    pub free_space_margin_mb: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// 扫描音乐库前删除不含媒体文件的目录
    #[serde(default = "default_true")]
    pub prune_library: bool,
    /// 卷上缺少音乐目录时自动创建
    #[serde(default = "default_true")]
    pub create_music_folder: bool,
}

fn default_music_folder() -> String {
    "Music".to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_margin_mb() -> u64 {
    DEFAULT_FREE_SPACE_MARGIN / (1024 * 1024)
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            library_path: None,
            primary_path: None,
            secondary_path: None,
            music_folder: default_music_folder(),
            extensions: default_extensions(),
            free_space_margin_mb: default_margin_mb(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            prune_library: true,
            create_music_folder: true,
        }
    }
}

/// 命令行传入的路径，优先于配置文件
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub library: Option<PathBuf>,
    pub primary: Option<PathBuf>,
    pub secondary: Option<PathBuf>,
}

impl SyncSettings {
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "sync").unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        write_section(config_dir, "sync", self)
    }

    /// 合并命令行参数，得到引擎配置
    pub fn resolve(&self, overrides: &PathOverrides) -> Result<SyncConfig, SyncError> {
        let library_root = overrides
            .library
            .clone()
            .or_else(|| self.library_path.clone())
            .ok_or_else(|| SyncError::Config("未指定音乐库目录".to_string()))?;
        let primary_root = overrides
            .primary
            .clone()
            .or_else(|| self.primary_path.clone())
            .ok_or_else(|| SyncError::Config("未指定主设备目录".to_string()))?;
        let secondary_root = overrides
            .secondary
            .clone()
            .or_else(|| self.secondary_path.clone());

        let config = self.to_config(library_root, primary_root, secondary_root);
        config.validate()?;
        Ok(config)
    }

    /// 检查与路径无关的设置
    pub fn validate(&self) -> Result<(), SyncError> {
        self.to_config(PathBuf::new(), PathBuf::new(), None).validate()
    }

    fn to_config(
        &self,
        library_root: PathBuf,
        primary_root: PathBuf,
        secondary_root: Option<PathBuf>,
    ) -> SyncConfig {
        SyncConfig {
            library_root,
            primary_root,
            secondary_root,
            music_folder: self.music_folder.clone(),
            extensions: self.extensions.clone(),
            free_space_margin: self.free_space_margin_mb.saturating_mul(1024 * 1024),
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            prune_library: self.prune_library,
            create_music_folder: self.create_music_folder,
        }
    }
}

/// 引擎配置，构造引擎时传入
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub library_root: PathBuf,
    pub primary_root: PathBuf,
    pub secondary_root: Option<PathBuf>,
    /// 卷上的同步根目录名
    pub music_folder: String,
    pub extensions: Vec<String>,
    /// 主设备保留空间（字节），扩展卡不保留
    pub free_space_margin: u64,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub prune_library: bool,
    pub create_music_folder: bool,
}

impl SyncConfig {
    pub fn new(
        library_root: impl Into<PathBuf>,
        primary_root: impl Into<PathBuf>,
        secondary_root: Option<PathBuf>,
    ) -> Self {
        Self {
            library_root: library_root.into(),
            primary_root: primary_root.into(),
            secondary_root,
            music_folder: default_music_folder(),
            extensions: default_extensions(),
            free_space_margin: DEFAULT_FREE_SPACE_MARGIN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            prune_library: true,
            create_music_folder: true,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_attempts == 0 {
            return Err(SyncError::Config("最大尝试次数必须大于 0".to_string()));
        }
        if self.music_folder.is_empty() || self.music_folder.contains(|c: char| c == '/' || c == '\\') {
            return Err(SyncError::Config(format!(
                "无效的音乐目录名: {:?}",
                self.music_folder
            )));
        }
        if self.extensions.is_empty() {
            return Err(SyncError::Config("扩展名列表为空".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = SyncSettings::load(dir.path());
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.free_space_margin_mb, 100);
        assert_eq!(settings.max_attempts, 25);
        assert_eq!(settings.retry_backoff_ms, 3000);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"sync": {"libraryPath": "/music", "maxAttempts": 3}}"#,
        )
        .unwrap();

        let settings = SyncSettings::load(dir.path());
        assert_eq!(settings.library_path, Some(PathBuf::from("/music")));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.music_folder, "Music");
    }

    #[test]
    fn test_save_keeps_other_sections() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"log": {"level": "debug"}}"#).unwrap();

        let settings = SyncSettings {
            primary_path: Some(PathBuf::from("/media/player")),
            ..Default::default()
        };
        settings.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["log"]["level"], "debug");
        assert_eq!(SyncSettings::load(dir.path()), settings);
    }

    #[test]
    fn test_resolve_requires_roots() {
        let settings = SyncSettings::default();
        let err = settings.resolve(&PathOverrides::default()).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));

        let overrides = PathOverrides {
            library: Some(PathBuf::from("/music")),
            ..Default::default()
        };
        assert!(settings.resolve(&overrides).is_err());
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let settings = SyncSettings {
            library_path: Some(PathBuf::from("/old")),
            primary_path: Some(PathBuf::from("/media/player")),
            retry_backoff_ms: 10,
            ..Default::default()
        };
        let overrides = PathOverrides {
            library: Some(PathBuf::from("/new")),
            secondary: Some(PathBuf::from("/media/ext")),
            ..Default::default()
        };

        let config = settings.resolve(&overrides).unwrap();
        assert_eq!(config.library_root, PathBuf::from("/new"));
        assert_eq!(config.primary_root, PathBuf::from("/media/player"));
        assert_eq!(config.secondary_root, Some(PathBuf::from("/media/ext")));
        assert_eq!(config.free_space_margin, DEFAULT_FREE_SPACE_MARGIN);
        assert_eq!(config.retry_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = SyncConfig::new("/music", "/media/player", None);
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
