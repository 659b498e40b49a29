use crate::core::media::{ExtensionSet, FileSet, MediaPath};
use crate::error::ScanError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 扫描配置
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// 识别的扩展名
    pub extensions: ExtensionSet,
    /// 是否跟随符号链接
    pub follow_links: bool,
}

/// 音乐库扫描结果
#[derive(Debug, Clone, Default)]
pub struct LibraryScan {
    pub files: FileSet,
    /// 扫描前被删除的目录
    pub pruned: Vec<PathBuf>,
    /// 删除失败的目录及原因
    pub prune_failed: Vec<(PathBuf, String)>,
}

/// 空目录清理结果
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    /// 删除失败不中止扫描，只记录下来
    pub failed: Vec<(PathBuf, String)>,
}

/// 媒体文件扫描器
///
/// `scan` 只读；`scan_library` 会先删除不含可识别文件的子目录再扫描，
/// 对音乐库是破坏性操作。
pub struct MediaScanner {
    config: ScanConfig,
}

impl MediaScanner {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 递归扫描根目录，返回相对于根目录的标识集合
    pub async fn scan(&self, root: &Path) -> Result<FileSet, ScanError> {
        ensure_root(root)?;
        info!("开始扫描: {:?}", root);

        let root = root.to_path_buf();
        let config = self.config.clone();
        // walkdir 是阻塞调用
        let files = tokio::task::spawn_blocking(move || walk_media(&root, &config)).await??;

        info!("扫描完成: {} 个文件", files.len());
        Ok(files)
    }

    /// 先清理空目录，再扫描音乐库
    pub async fn scan_library(&self, root: &Path) -> Result<LibraryScan, ScanError> {
        let prune = self.prune_empty_dirs(root).await?;
        let files = self.scan(root).await?;
        Ok(LibraryScan {
            files,
            pruned: prune.removed,
            prune_failed: prune.failed,
        })
    }

    /// 删除子树中没有任何可识别文件的子目录（根目录本身保留）
    ///
    /// 只删除最上层的那一级，其下的内容随之一起删除。
    pub async fn prune_empty_dirs(&self, root: &Path) -> Result<PruneReport, ScanError> {
        ensure_root(root)?;

        let root = root.to_path_buf();
        let config = self.config.clone();
        let report = tokio::task::spawn_blocking(move || -> Result<PruneReport, ScanError> {
            let targets = find_prunable(&root, &config)?;
            Ok(remove_dirs(targets, |dir| std::fs::remove_dir_all(dir)))
        })
        .await??;

        if !report.removed.is_empty() {
            info!("已清理 {} 个空目录", report.removed.len());
        }
        Ok(report)
    }

    /// 可识别文件的总字节数
    pub async fn library_size(&self, root: &Path) -> Result<u64, ScanError> {
        ensure_root(root)?;

        let root = root.to_path_buf();
        let config = self.config.clone();
        let total = tokio::task::spawn_blocking(move || -> Result<u64, ScanError> {
            let mut total = 0u64;
            for entry in walker(&root, &config) {
                let entry = entry.map_err(|e| walk_error(&root, e))?;
                if is_media_file(&entry, &config) {
                    // 符号链接按目标文件计算大小
                    let metadata =
                        std::fs::metadata(entry.path()).map_err(|source| ScanError::Io {
                            path: entry.path().to_path_buf(),
                            source,
                        })?;
                    total += metadata.len();
                }
            }
            Ok(total)
        })
        .await??;

        Ok(total)
    }
}

impl Default for MediaScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_root(root: &Path) -> Result<(), ScanError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ScanError::RootMissing(root.to_path_buf()))
    }
}

fn walker(root: &Path, config: &ScanConfig) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(config.follow_links)
        .min_depth(1)
        .into_iter()
}

fn walk_error(root: &Path, err: walkdir::Error) -> ScanError {
    ScanError::Walk {
        path: err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
        source: err,
    }
}

/// 可识别的普通文件，或指向普通文件的符号链接
fn is_media_file(entry: &walkdir::DirEntry, config: &ScanConfig) -> bool {
    let is_file =
        entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file());
    is_file && config.extensions.matches(entry.path())
}

/// 不跟随链接时，指向目录的符号链接按“有内容”处理，所在目录不清理
fn is_linked_dir(entry: &walkdir::DirEntry) -> bool {
    entry.path_is_symlink() && entry.path().is_dir()
}

fn remove_dirs<F>(targets: Vec<PathBuf>, mut remove: F) -> PruneReport
where
    F: FnMut(&Path) -> std::io::Result<()>,
{
    let mut report = PruneReport::default();
    for dir in targets {
        warn!("删除不含媒体文件的目录: {:?}", dir);
        match remove(&dir) {
            Ok(()) => report.removed.push(dir),
            Err(e) => {
                warn!("删除目录失败 {:?}: {}", dir, e);
                report.failed.push((dir, e.to_string()));
            }
        }
    }
    report
}

fn walk_media(root: &Path, config: &ScanConfig) -> Result<FileSet, ScanError> {
    let mut files = FileSet::new();

    for entry in walker(root, config) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !is_media_file(&entry, config) {
            continue;
        }

        let path = entry.path();

        let Some(id) = path
            .strip_prefix(root)
            .ok()
            .and_then(MediaPath::from_relative)
        else {
            warn!("无法生成相对路径，跳过: {:?}", path);
            continue;
        };

        debug!("分析文件: {}", id);
        files.insert(id);
    }

    Ok(files)
}

fn find_prunable(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs = Vec::new();
    // 含有可识别文件的目录及其所有上级
    let mut keep: HashSet<PathBuf> = HashSet::new();

    for entry in walker(root, config) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            dirs.push(path.to_path_buf());
        } else if is_media_file(&entry, config) || is_linked_dir(&entry) {
            for ancestor in path.ancestors().skip(1) {
                if !keep.insert(ancestor.to_path_buf()) || ancestor == root {
                    break;
                }
            }
        }
    }

    Ok(dirs
        .into_iter()
        .filter(|dir| !keep.contains(dir))
        .filter(|dir| {
            dir.parent()
                .map(|parent| parent == root || keep.contains(parent))
                .unwrap_or(false)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, bytes: usize) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; bytes]).unwrap();
    }

    #[tokio::test]
    async fn test_scan_filters_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Artist/Album/01.mp3", 1);
        touch(dir.path(), "Artist/Album/Folder.JPG", 1);
        touch(dir.path(), "Artist/Album/notes.txt", 1);
        touch(dir.path(), "Artist/Album/02.flac", 1);

        let files = MediaScanner::new().scan(dir.path()).await.unwrap();
        let ids: Vec<_> = files.sorted().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["Artist/Album/01.mp3", "Artist/Album/Folder.JPG"]);
    }

    #[tokio::test]
    async fn test_scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let result = MediaScanner::new().scan(&dir.path().join("Music")).await;
        assert!(matches!(result, Err(ScanError::RootMissing(_))));
    }

    #[tokio::test]
    async fn test_rescan_is_stable() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "A/B/1.mp3", 1);
        touch(dir.path(), "A/C/2.wma", 1);

        let scanner = MediaScanner::new();
        let first = scanner.scan(dir.path()).await.unwrap();
        let second = scanner.scan(dir.path()).await.unwrap();
        assert_eq!(first.sorted(), second.sorted());
    }

    #[tokio::test]
    async fn test_scan_library_prunes_dirs_without_media() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "A/B/1.mp3", 1);
        fs::create_dir_all(root.join("A/Empty/Deeper")).unwrap();
        touch(root, "Junk/readme.txt", 1);
        fs::create_dir_all(root.join("Nothing")).unwrap();

        let scan = MediaScanner::new().scan_library(root).await.unwrap();

        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.pruned.len(), 3);
        assert!(root.join("A/B/1.mp3").exists());
        assert!(!root.join("A/Empty").exists());
        assert!(!root.join("Junk").exists());
        assert!(!root.join("Nothing").exists());
        assert!(root.exists());
    }

    #[tokio::test]
    async fn test_prune_keeps_root_when_library_empty() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("X/Y")).unwrap();

        let report = MediaScanner::new().prune_empty_dirs(dir.path()).await.unwrap();
        assert_eq!(report.removed, vec![dir.path().join("X")]);
        assert!(report.failed.is_empty());
        assert!(dir.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_track_is_kept_and_scanned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("library");
        touch(dir.path(), "elsewhere/real.mp3", 42);
        fs::create_dir_all(root.join("Artist/Album")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("elsewhere/real.mp3"),
            root.join("Artist/Album/1.mp3"),
        )
        .unwrap();
        fs::create_dir_all(root.join("Linked")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("elsewhere"), root.join("Linked/Album")).unwrap();

        let scanner = MediaScanner::new();
        let scan = scanner.scan_library(&root).await.unwrap();

        assert!(scan.pruned.is_empty());
        assert!(root.join("Artist/Album/1.mp3").exists());
        assert!(root.join("Linked/Album").exists());
        let ids: Vec<_> = scan.files.sorted().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["Artist/Album/1.mp3"]);
        assert_eq!(scanner.library_size(&root).await.unwrap(), 42);
    }

    #[test]
    fn test_failed_removal_is_recorded_not_fatal() {
        let targets = vec![PathBuf::from("/lib/Locked"), PathBuf::from("/lib/Empty")];
        let report = remove_dirs(targets, |dir| {
            if dir.ends_with("Locked") {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))
            } else {
                Ok(())
            }
        });

        assert_eq!(report.removed, vec![PathBuf::from("/lib/Empty")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, PathBuf::from("/lib/Locked"));
    }

    #[tokio::test]
    async fn test_library_size_counts_recognized_only() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "A/B/1.mp3", 100);
        touch(dir.path(), "A/B/2.m4a", 50);
        touch(dir.path(), "A/B/ignored.txt", 1000);

        let size = MediaScanner::new().library_size(dir.path()).await.unwrap();
        assert_eq!(size, 150);
    }
}
