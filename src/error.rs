//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 单次扫描的致命错误，调用方决定是否中止整个同步
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("扫描根目录不存在: {0}")]
    RootMissing(PathBuf),

    #[error("遍历目录失败 {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("文件操作失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("扫描任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 扫描失败的根目录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
    Library,
    Primary,
    Secondary,
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanTarget::Library => write!(f, "音乐库"),
            ScanTarget::Primary => write!(f, "主设备"),
            ScanTarget::Secondary => write!(f, "扩展卡"),
        }
    }
}

/// 整次同步的致命错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("配置无效: {0}")]
    Config(String),

    #[error("扫描{target}失败: {source}")]
    Scan {
        target: ScanTarget,
        #[source]
        source: ScanError,
    },
}

impl SyncError {
    pub fn scan(target: ScanTarget, source: ScanError) -> Self {
        SyncError::Scan { target, source }
    }
}
