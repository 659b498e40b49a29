//! 目标卷：主设备与扩展卡
//!
//! 剩余空间每次都实时查询，从不缓存，因为复制过程中它一直在变。

pub mod disk;

use crate::core::media::MediaPath;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use disk::DiskSpaceProbe;

/// 卷的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeRole {
    Primary,
    Secondary,
}

impl std::fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeRole::Primary => write!(f, "主设备"),
            VolumeRole::Secondary => write!(f, "扩展卡"),
        }
    }
}

/// 一个可写的目标卷
#[derive(Debug, Clone)]
pub struct TargetVolume {
    pub role: VolumeRole,
    /// 卷根目录（用于查询空间）
    pub root: PathBuf,
    /// 同步根目录，即 `root/<music_folder>`
    pub music_dir: PathBuf,
}

impl TargetVolume {
    pub fn new(role: VolumeRole, root: impl Into<PathBuf>, music_folder: &str) -> Self {
        let root = root.into();
        let music_dir = root.join(music_folder);
        Self {
            role,
            root,
            music_dir,
        }
    }

    /// 标识在本卷上对应的完整路径
    pub fn locate(&self, id: &MediaPath) -> PathBuf {
        id.resolve(&self.music_dir)
    }
}

/// 卷容量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpace {
    pub total: u64,
    pub available: u64,
}

impl VolumeSpace {
    /// 已用比例（0.0 ~ 1.0）
    pub fn used_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let used = self.total.saturating_sub(self.available);
        (used as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// 卷容量查询接口
#[async_trait]
pub trait SpaceProbe: Send + Sync {
    /// 查询 `root` 所在卷的总容量与剩余空间
    async fn space(&self, root: &Path) -> Result<VolumeSpace>;
}

/// 测试用的容量查询实现
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 返回预设值
    #[derive(Default)]
    pub struct FixedProbe {
        spaces: Mutex<HashMap<PathBuf, VolumeSpace>>,
        queries: AtomicU32,
    }

    impl FixedProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, root: &Path, total: u64, available: u64) -> Self {
            self.spaces
                .lock()
                .unwrap()
                .insert(root.to_path_buf(), VolumeSpace { total, available });
            self
        }

        pub fn queries(&self) -> u32 {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpaceProbe for FixedProbe {
        async fn space(&self, root: &Path) -> Result<VolumeSpace> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.spaces
                .lock()
                .unwrap()
                .get(root)
                .copied()
                .ok_or_else(|| anyhow!("未知的卷: {:?}", root))
        }
    }

    /// 前 N 次查询失败
    pub struct FlakyProbe {
        inner: FixedProbe,
        remaining_failures: AtomicU32,
    }

    impl FlakyProbe {
        pub fn new(inner: FixedProbe, failures: u32) -> Self {
            Self {
                inner,
                remaining_failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl SpaceProbe for FlakyProbe {
        async fn space(&self, root: &Path) -> Result<VolumeSpace> {
            let left = self.remaining_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining_failures.store(left - 1, Ordering::SeqCst);
                return Err(anyhow!("卷暂时不可用: {:?}", root));
            }
            self.inner.space(root).await
        }
    }

    /// 剩余空间 = 容量 − 卷目录下现有文件大小，随复制实时变化
    #[derive(Default)]
    pub struct UsageProbe {
        capacity: HashMap<PathBuf, u64>,
    }

    impl UsageProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, root: &Path, capacity: u64) -> Self {
            self.capacity.insert(root.to_path_buf(), capacity);
            self
        }
    }

    #[async_trait]
    impl SpaceProbe for UsageProbe {
        async fn space(&self, root: &Path) -> Result<VolumeSpace> {
            let total = *self
                .capacity
                .get(root)
                .ok_or_else(|| anyhow!("未知的卷: {:?}", root))?;
            let used: u64 = walkdir::WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum();
            Ok(VolumeSpace {
                total,
                available: total.saturating_sub(used),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_ratio() {
        let space = VolumeSpace {
            total: 1000,
            available: 250,
        };
        assert!((space.used_ratio() - 0.75).abs() < f64::EPSILON);

        let empty = VolumeSpace {
            total: 0,
            available: 0,
        };
        assert_eq!(empty.used_ratio(), 0.0);
    }

    #[test]
    fn test_locate_uses_music_folder() {
        let volume = TargetVolume::new(VolumeRole::Secondary, "/mnt/ext", "Music");
        let id = MediaPath::new("A/B/1.mp3");
        assert_eq!(
            volume.locate(&id),
            Path::new("/mnt/ext/Music").join("A").join("B").join("1.mp3")
        );
    }
}
