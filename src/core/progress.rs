//! 进度通知
//!
//! 引擎单向发出不可变事件，观察者（命令行界面等）只读不写。
//! 发送从不阻塞，接收端关闭后事件直接丢弃。

use crate::core::media::MediaPath;
use crate::metadata::Artwork;
use crate::volume::{VolumeRole, VolumeSpace};
use serde::Serialize;
use tokio::sync::mpsc;

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Scanning,
    Deleting,
    Copying,
    Finished,
}

/// 某个卷在某一时刻的容量
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshot {
    pub role: VolumeRole,
    pub total: u64,
    pub available: u64,
}

impl VolumeSnapshot {
    pub fn new(role: VolumeRole, space: VolumeSpace) -> Self {
        Self {
            role,
            total: space.total,
            available: space.available,
        }
    }

    pub fn used_ratio(&self) -> f64 {
        VolumeSpace {
            total: self.total,
            available: self.available,
        }
        .used_ratio()
    }
}

/// 引擎发出的事件
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Phase(SyncPhase),
    Status(String),
    /// 已处理 / 待添加总数
    Progress { processed: usize, total: usize },
    Space(VolumeSnapshot),
    CoverArt { track: MediaPath, artwork: Artwork },
    Warning(String),
}

/// 事件发送端
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::UnboundedSender<SyncEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// 不发送任何事件
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// 创建一对发送端 / 接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn phase(&self, phase: SyncPhase) {
        self.emit(SyncEvent::Phase(phase));
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(SyncEvent::Status(message.into()));
    }

    pub fn progress(&self, processed: usize, total: usize) {
        self.emit(SyncEvent::Progress { processed, total });
    }

    pub fn space(&self, snapshot: VolumeSnapshot) {
        self.emit(SyncEvent::Space(snapshot));
    }

    pub fn cover_art(&self, track: MediaPath, artwork: Artwork) {
        self.emit(SyncEvent::CoverArt { track, artwork });
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(SyncEvent::Warning(message.into()));
    }
}

/// 格式化字节数：不足 1024Mb 显示整数 Mb，否则显示两位小数的 Gb
pub fn format_bytes(bytes: u64) -> String {
    let mega_bytes = bytes / (1024 * 1024);
    if mega_bytes > 1024 {
        format!("{:.2}Gb", mega_bytes as f64 / 1024.0)
    } else {
        format!("{}Mb", mega_bytes)
    }
}
