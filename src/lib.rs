pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod volume;

pub use config::{PathOverrides, SyncConfig, SyncSettings};
pub use crate::core::{RunStatus, SyncEngine, SyncEvent, SyncReport};
pub use error::{ScanError, SyncError};

/// 平台配置目录
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}
