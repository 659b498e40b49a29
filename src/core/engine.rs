use crate::config::SyncConfig;
use crate::core::media::{ExtensionSet, FileSet, MediaPath};
use crate::core::progress::{ProgressReporter, SyncPhase, VolumeSnapshot};
use crate::core::reconciler::{reconcile, SyncPlan};
use crate::core::scanner::{LibraryScan, MediaScanner, ScanConfig};
use crate::core::transfer::{sweep_part_files, FileTransfer, TransferOutcome};
use crate::error::{ScanError, ScanTarget, SyncError};
use crate::metadata::{ArtworkSource, LoftyArtwork};
use crate::volume::{DiskSpaceProbe, SpaceProbe, TargetVolume, VolumeRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 同步结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// 所有待添加文件都处理过了（可能有放弃的）
    Completed,
    /// 空间不足，添加阶段提前结束
    SpaceExhausted,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub library_files: usize,
    pub device_files: usize,
    pub library_bytes: u64,
    pub pruned_dirs: usize,
    /// 上次中断留在设备上的临时文件
    pub stale_parts_removed: usize,
    pub files_deleted: usize,
    /// 待删除但在两个卷上都找不到
    pub delete_missing: usize,
    pub delete_failed: usize,
    pub files_to_add: usize,
    pub files_copied: usize,
    pub files_abandoned: usize,
    /// 空间不足时尚未复制的文件（含触发的那一个）
    pub files_remaining: usize,
    pub bytes_copied: u64,
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// 只读分析结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAnalysis {
    pub library_files: usize,
    pub device_files: usize,
    pub library_bytes: u64,
    pub bytes_to_add: u64,
    pub to_delete: Vec<MediaPath>,
    pub to_add: Vec<MediaPath>,
}

#[derive(Debug, Default)]
struct DeleteStats {
    deleted: usize,
    missing: usize,
    failed: usize,
}

#[derive(Debug, Default)]
struct AddStats {
    copied: usize,
    abandoned: usize,
    remaining: usize,
    bytes: u64,
    exhausted: bool,
}

/// 同步引擎
///
/// 扫描 → 比对 → 删除 → 添加，严格顺序执行，不可取消。
/// 对外只通过 `ProgressReporter` 单向发送事件。
pub struct SyncEngine {
    config: SyncConfig,
    scanner: MediaScanner,
    probe: Arc<dyn SpaceProbe>,
    artwork: Arc<dyn ArtworkSource>,
    reporter: ProgressReporter,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        let scanner = MediaScanner::with_config(ScanConfig {
            extensions: ExtensionSet::new(&config.extensions),
            follow_links: false,
        });
        Self {
            config,
            scanner,
            probe: Arc::new(DiskSpaceProbe::new()),
            artwork: Arc::new(LoftyArtwork),
            reporter: ProgressReporter::disabled(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_artwork(mut self, artwork: Arc<dyn ArtworkSource>) -> Self {
        self.artwork = artwork;
        self
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    fn primary_volume(&self) -> TargetVolume {
        TargetVolume::new(
            VolumeRole::Primary,
            &self.config.primary_root,
            &self.config.music_folder,
        )
    }

    fn secondary_volume(&self) -> Option<TargetVolume> {
        self.config
            .secondary_root
            .as_ref()
            .map(|root| TargetVolume::new(VolumeRole::Secondary, root, &self.config.music_folder))
    }

    /// 执行一次完整同步
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut warnings = Vec::new();

        info!(
            "开始同步 {}: {:?} -> {:?} / {:?}",
            run_id, self.config.library_root, self.config.primary_root, self.config.secondary_root
        );

        let primary = self.primary_volume();
        let secondary = self.secondary_volume();

        // 扫描
        self.reporter.phase(SyncPhase::Scanning);
        self.report_space(&primary).await;
        if let Some(volume) = &secondary {
            self.report_space(volume).await;
        }

        let device_files = self
            .scan_device(&primary, secondary.as_ref(), self.config.create_music_folder)
            .await?;
        self.reporter
            .status(format!("{} files read from device.", device_files.len()));

        let mut stale_parts_removed = 0;
        for volume in std::iter::once(&primary).chain(secondary.as_ref()) {
            if volume.music_dir.is_dir() {
                stale_parts_removed += sweep_part_files(&volume.music_dir).await.len();
            }
        }

        let library = self.scan_library(self.config.prune_library).await?;
        self.reporter
            .status(format!("{} files read from library.", library.files.len()));
        for dir in &library.pruned {
            warnings.push(format!("已删除音乐库中的空目录: {}", dir.display()));
        }
        for (dir, reason) in &library.prune_failed {
            warnings.push(format!("无法删除音乐库中的空目录 {}: {}", dir.display(), reason));
        }

        let library_bytes = self
            .scanner
            .library_size(&self.config.library_root)
            .await
            .map_err(|e| SyncError::scan(ScanTarget::Library, e))?;

        // 比对
        let plan = reconcile(&library.files, &device_files);
        info!(
            "比对完成: 设备 {} 个, 音乐库 {} 个, 待删除 {} 个, 待添加 {} 个",
            device_files.len(),
            library.files.len(),
            plan.to_delete.len(),
            plan.to_add.len()
        );

        // 删除
        self.reporter.phase(SyncPhase::Deleting);
        let deletion = self
            .delete_obsolete(&plan.to_delete, &primary, secondary.as_ref(), &mut warnings)
            .await;

        // 添加
        self.reporter.phase(SyncPhase::Copying);
        let addition = self
            .add_missing(&plan.to_add, &primary, secondary.as_ref(), &mut warnings)
            .await;

        let status = if addition.exhausted {
            RunStatus::SpaceExhausted
        } else {
            self.reporter.status("Done!");
            RunStatus::Completed
        };
        self.reporter.phase(SyncPhase::Finished);

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            library_files: library.files.len(),
            device_files: device_files.len(),
            library_bytes,
            pruned_dirs: library.pruned.len(),
            stale_parts_removed,
            files_deleted: deletion.deleted,
            delete_missing: deletion.missing,
            delete_failed: deletion.failed,
            files_to_add: plan.to_add.len(),
            files_copied: addition.copied,
            files_abandoned: addition.abandoned,
            files_remaining: addition.remaining,
            bytes_copied: addition.bytes,
            warnings,
        };

        info!(
            "同步完成 {}: 删除 {}, 复制 {}, 放弃 {}, 状态 {:?}",
            run_id, report.files_deleted, report.files_copied, report.files_abandoned, status
        );

        Ok(report)
    }

    /// 只扫描和比对，不修改任何文件
    pub async fn analyze(&self) -> Result<SyncAnalysis, SyncError> {
        self.config.validate()?;

        let primary = self.primary_volume();
        let secondary = self.secondary_volume();

        let device_files = self.scan_device(&primary, secondary.as_ref(), false).await?;
        let library = self.scan_library(false).await?;
        let library_bytes = self
            .scanner
            .library_size(&self.config.library_root)
            .await
            .map_err(|e| SyncError::scan(ScanTarget::Library, e))?;

        let SyncPlan {
            mut to_delete,
            to_add,
        } = reconcile(&library.files, &device_files);
        to_delete.sort();

        let mut bytes_to_add = 0u64;
        for id in &to_add {
            let source = id.resolve(&self.config.library_root);
            match tokio::fs::metadata(&source).await {
                Ok(metadata) => bytes_to_add += metadata.len(),
                Err(e) => debug!("无法读取文件大小 {:?}: {}", source, e),
            }
        }

        Ok(SyncAnalysis {
            library_files: library.files.len(),
            device_files: device_files.len(),
            library_bytes,
            bytes_to_add,
            to_delete,
            to_add,
        })
    }

    /// 扫描两个卷的音乐目录并合并
    ///
    /// 卷根目录不存在是致命错误；音乐目录不存在时按 `create` 创建，
    /// 不创建则视为空。
    async fn scan_device(
        &self,
        primary: &TargetVolume,
        secondary: Option<&TargetVolume>,
        create: bool,
    ) -> Result<FileSet, SyncError> {
        let mut files = self
            .scan_volume(primary, create)
            .await
            .map_err(|e| SyncError::scan(ScanTarget::Primary, e))?;

        if let Some(volume) = secondary {
            let more = self
                .scan_volume(volume, create)
                .await
                .map_err(|e| SyncError::scan(ScanTarget::Secondary, e))?;
            files.union_with(more);
        }

        Ok(files)
    }

    async fn scan_volume(&self, volume: &TargetVolume, create: bool) -> Result<FileSet, ScanError> {
        if !volume.root.is_dir() {
            return Err(ScanError::RootMissing(volume.root.clone()));
        }

        if !volume.music_dir.is_dir() {
            if !create {
                debug!("{}上没有音乐目录: {:?}", volume.role, volume.music_dir);
                return Ok(FileSet::new());
            }
            info!("创建音乐目录: {:?}", volume.music_dir);
            tokio::fs::create_dir_all(&volume.music_dir)
                .await
                .map_err(|source| ScanError::Io {
                    path: volume.music_dir.clone(),
                    source,
                })?;
        }

        self.scanner.scan(&volume.music_dir).await
    }

    async fn scan_library(&self, prune: bool) -> Result<LibraryScan, SyncError> {
        let root = &self.config.library_root;
        let result = if prune {
            self.scanner.scan_library(root).await
        } else {
            self.scanner.scan(root).await.map(|files| LibraryScan {
                files,
                ..Default::default()
            })
        };
        result.map_err(|e| SyncError::scan(ScanTarget::Library, e))
    }

    /// 删除设备上多余的文件，先找主设备，再找扩展卡
    async fn delete_obsolete(
        &self,
        to_delete: &[MediaPath],
        primary: &TargetVolume,
        secondary: Option<&TargetVolume>,
        warnings: &mut Vec<String>,
    ) -> DeleteStats {
        let mut stats = DeleteStats::default();

        for id in to_delete {
            self.reporter.status(format!("Deleting file: {}", id));

            let mut target = None;
            for volume in std::iter::once(primary).chain(secondary) {
                let path = volume.locate(id);
                if is_file(&path).await {
                    target = Some(path);
                    break;
                }
            }

            let Some(path) = target else {
                let message = format!("{} was queued for deletion, but was not found on the device", id);
                warn!("{}", message);
                self.reporter.warning(message.clone());
                warnings.push(message);
                stats.missing += 1;
                continue;
            };

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("已删除: {:?}", path);
                    stats.deleted += 1;
                }
                Err(e) => {
                    let message = format!("删除失败 {}: {}", path.display(), e);
                    warn!("{}", message);
                    self.reporter.warning(message.clone());
                    warnings.push(message);
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// 按排序后的顺序复制缺少的文件，空间不足时提前结束
    async fn add_missing(
        &self,
        to_add: &[MediaPath],
        primary: &TargetVolume,
        secondary: Option<&TargetVolume>,
        warnings: &mut Vec<String>,
    ) -> AddStats {
        let mut stats = AddStats::default();
        let total = to_add.len();
        self.reporter.progress(0, total);

        let transfer = FileTransfer::new(primary, secondary, self.probe.as_ref(), &self.reporter)
            .with_margin(self.config.free_space_margin)
            .with_retry(self.config.max_attempts, self.config.retry_backoff);

        for (index, id) in to_add.iter().enumerate() {
            let source = id.resolve(&self.config.library_root);

            if !id.is_image() {
                self.show_cover_art(&source, id).await;
            }

            match transfer.transfer(&source, id).await {
                TransferOutcome::Succeeded {
                    role,
                    bytes,
                    estimate,
                    ..
                } => {
                    stats.copied += 1;
                    stats.bytes += bytes;
                    self.reporter.space(VolumeSnapshot::new(role, estimate));
                }
                TransferOutcome::Abandoned {
                    attempts,
                    last_error,
                } => {
                    let message = format!("放弃 {} (尝试 {} 次): {}", id, attempts, last_error);
                    self.reporter.warning(message.clone());
                    warnings.push(message);
                    stats.abandoned += 1;
                }
                TransferOutcome::SpaceExhausted => {
                    warn!("空间不足，停止添加: {} (剩余 {} 个)", id, total - index);
                    self.reporter.status("Not enough space");
                    self.report_space(primary).await;
                    if let Some(volume) = secondary {
                        self.report_space(volume).await;
                    }
                    stats.remaining = total - index;
                    stats.exhausted = true;
                }
            }

            self.reporter.progress(index + 1, total);
            if stats.exhausted {
                break;
            }
        }

        stats
    }

    /// 读取封面用于展示，失败只记日志
    async fn show_cover_art(&self, source: &std::path::Path, id: &MediaPath) {
        match self.artwork.cover_art(source).await {
            Ok(Some(artwork)) => self.reporter.cover_art(id.clone(), artwork),
            Ok(None) => {}
            Err(e) => warn!("读取封面失败 {}: {:#}", id, e),
        }
    }

    async fn report_space(&self, volume: &TargetVolume) {
        match self.probe.space(&volume.root).await {
            Ok(space) => self.reporter.space(VolumeSnapshot::new(volume.role, space)),
            Err(e) => warn!("查询{}容量失败: {:#}", volume.role, e),
        }
    }
}

async fn is_file(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
