//! 文件放置与复制
//!
//! 主设备需要在复制后仍保留 `margin` 字节，扩展卡只要放得下即可。
//! 这种不对称是有意保留的。

use crate::core::media::MediaPath;
use crate::core::progress::ProgressReporter;
use crate::volume::{SpaceProbe, TargetVolume, VolumeRole, VolumeSpace};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};

/// 复制过程中使用的临时文件后缀
const PART_SUFFIX: &str = ".musicsynq.part";

/// 放置决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Primary,
    Secondary,
    NoRoom,
}

/// 主设备：复制后剩余空间必须大于保留量
pub fn primary_fits(available: u64, size: u64, margin: u64) -> bool {
    available
        .checked_sub(size)
        .map(|rest| rest > margin)
        .unwrap_or(false)
}

/// 扩展卡：剩余空间大于文件即可
pub fn secondary_fits(available: u64, size: u64) -> bool {
    available > size
}

/// 先看主设备，再看扩展卡，都放不下时返回 NoRoom
pub fn choose_placement(
    primary_available: u64,
    secondary_available: Option<u64>,
    size: u64,
    margin: u64,
) -> Placement {
    if primary_fits(primary_available, size, margin) {
        Placement::Primary
    } else if secondary_available.is_some_and(|free| secondary_fits(free, size)) {
        Placement::Secondary
    } else {
        Placement::NoRoom
    }
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// 已复制；`estimate` 为复制后该卷的预计容量
    Succeeded {
        role: VolumeRole,
        bytes: u64,
        attempts: u32,
        estimate: VolumeSpace,
    },
    /// 达到最大尝试次数后放弃
    Abandoned { attempts: u32, last_error: String },
    /// 两个卷都放不下，添加阶段到此为止
    SpaceExhausted,
}

/// 单次尝试的结果（错误走 Err）
enum Attempt {
    Copied {
        role: VolumeRole,
        bytes: u64,
        estimate: VolumeSpace,
    },
    NoRoom,
}

/// 把音乐库中的文件放到某个卷上，失败时按固定间隔重试
pub struct FileTransfer<'a> {
    primary: &'a TargetVolume,
    secondary: Option<&'a TargetVolume>,
    probe: &'a dyn SpaceProbe,
    reporter: &'a ProgressReporter,
    margin: u64,
    max_attempts: u32,
    backoff: Duration,
}

impl<'a> FileTransfer<'a> {
    pub fn new(
        primary: &'a TargetVolume,
        secondary: Option<&'a TargetVolume>,
        probe: &'a dyn SpaceProbe,
        reporter: &'a ProgressReporter,
    ) -> Self {
        Self {
            primary,
            secondary,
            probe,
            reporter,
            margin: crate::config::DEFAULT_FREE_SPACE_MARGIN,
            max_attempts: crate::config::DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(crate::config::DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    pub fn with_margin(mut self, margin: u64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// 放置并复制一个文件
    ///
    /// 每次失败后等待 `backoff`，再从查询空间开始重来。
    pub async fn transfer(&self, source: &Path, id: &MediaPath) -> TransferOutcome {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.try_once(source, id).await {
                Ok(Attempt::Copied {
                    role,
                    bytes,
                    estimate,
                }) => {
                    debug!("已复制 {} 到{} (第 {} 次尝试)", id, role, attempt);
                    return TransferOutcome::Succeeded {
                        role,
                        bytes,
                        attempts: attempt,
                        estimate,
                    };
                }
                Ok(Attempt::NoRoom) => return TransferOutcome::SpaceExhausted,
                Err(e) => {
                    last_error = format!("{:#}", e);
                    self.reporter.status(format!("Failed to write: {}", id));

                    if attempt < self.max_attempts {
                        warn!(
                            "写入失败，{}ms 后重试 ({}/{}): {} - {}",
                            self.backoff.as_millis(),
                            attempt,
                            self.max_attempts,
                            id,
                            last_error
                        );
                        tokio::time::sleep(self.backoff).await;
                    } else {
                        error!(
                            "写入最终失败，放弃 (已尝试 {} 次): {} - {}",
                            self.max_attempts, id, last_error
                        );
                    }
                }
            }
        }

        TransferOutcome::Abandoned {
            attempts: self.max_attempts,
            last_error,
        }
    }

    async fn try_once(&self, source: &Path, id: &MediaPath) -> Result<Attempt> {
        let size = tokio::fs::metadata(source)
            .await
            .with_context(|| format!("无法读取源文件 {:?}", source))?
            .len();

        let primary_space = self.probe.space(&self.primary.root).await?;

        // 主设备放得下时不查询扩展卡
        let secondary_space = match self.secondary {
            Some(volume) if !primary_fits(primary_space.available, size, self.margin) => {
                Some(self.probe.space(&volume.root).await?)
            }
            _ => None,
        };

        let (volume, space) = match choose_placement(
            primary_space.available,
            secondary_space.map(|s| s.available),
            size,
            self.margin,
        ) {
            Placement::Primary => (self.primary, primary_space),
            Placement::Secondary => match (self.secondary, secondary_space) {
                (Some(volume), Some(space)) => (volume, space),
                _ => return Err(anyhow!("扩展卡不可用")),
            },
            Placement::NoRoom => return Ok(Attempt::NoRoom),
        };

        self.reporter.status(format!("Moving file {}", id.file_name()));

        let dest = volume.locate(id);
        copy_file(source, &dest).await?;

        Ok(Attempt::Copied {
            role: volume.role,
            bytes: size,
            estimate: VolumeSpace {
                total: space.total,
                available: space.available.saturating_sub(size),
            },
        })
    }
}

/// 复制到目标路径，已存在时覆盖
///
/// 先写入同目录下的临时文件再重命名；任何一步失败都会删除临时文件。
pub async fn copy_file(source: &Path, dest: &Path) -> Result<u64> {
    let parent = dest
        .parent()
        .ok_or_else(|| anyhow!("目标路径没有上级目录: {:?}", dest))?;
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("无法创建目录 {:?}", parent))?;

    let temp = part_path(dest);
    let guard = scopeguard::guard(temp.clone(), |path| {
        let _ = std::fs::remove_file(path);
    });

    let bytes = tokio::fs::copy(source, &temp)
        .await
        .with_context(|| format!("复制失败 {:?} -> {:?}", source, temp))?;
    tokio::fs::rename(&temp, dest)
        .await
        .with_context(|| format!("重命名失败 {:?} -> {:?}", temp, dest))?;

    // 临时文件已经变成目标文件
    let _ = scopeguard::ScopeGuard::into_inner(guard);
    Ok(bytes)
}

/// 删除目录下上次中断留下的临时文件，返回删除的路径
pub async fn sweep_part_files(dir: &Path) -> Vec<PathBuf> {
    let dir = dir.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let mut removed = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            let is_part = entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.ends_with(PART_SUFFIX));
            if !is_part {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    warn!("删除残留的临时文件: {:?}", entry.path());
                    removed.push(entry.into_path());
                }
                Err(e) => warn!("无法删除临时文件 {:?}: {}", entry.path(), e),
            }
        }
        removed
    })
    .await;

    result.unwrap_or_else(|e| {
        warn!("清理临时文件任务异常退出: {}", e);
        Vec::new()
    })
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(PART_SUFFIX);
    dest.with_file_name(name)
}
