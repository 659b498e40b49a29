use super::{SpaceProbe, VolumeSpace};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

/// 通过 sysinfo 查询磁盘容量
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSpaceProbe;

impl DiskSpaceProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpaceProbe for DiskSpaceProbe {
    async fn space(&self, root: &Path) -> Result<VolumeSpace> {
        let path = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("无法解析卷路径: {:?}", root))?;
        let path = strip_verbatim(path);

        // 每次重新枚举磁盘，拿到的是当前值
        tokio::task::spawn_blocking(move || -> Result<VolumeSpace> {
            let disks = Disks::new_with_refreshed_list();
            let space = pick_disk(
                disks.list().iter().map(|d| {
                    (
                        d.mount_point(),
                        VolumeSpace {
                            total: d.total_space(),
                            available: d.available_space(),
                        },
                    )
                }),
                &path,
            )
            .ok_or_else(|| anyhow!("找不到 {:?} 所在的磁盘", path))?;

            debug!(
                "卷容量 {:?}: 总计 {} 字节, 可用 {} 字节",
                path, space.total, space.available
            );
            Ok(space)
        })
        .await?
    }
}

/// 选出挂载点是 `path` 最长前缀的磁盘
fn pick_disk<'a, I>(disks: I, path: &Path) -> Option<VolumeSpace>
where
    I: IntoIterator<Item = (&'a Path, VolumeSpace)>,
{
    disks
        .into_iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, space)| space)
}

/// Windows 上 canonicalize 会带 `\\?\` 前缀，挂载点没有
#[cfg(windows)]
fn strip_verbatim(path: PathBuf) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_prefix(r"\\?\") {
        Some(rest) => PathBuf::from(rest),
        None => path,
    }
}

#[cfg(not(windows))]
fn strip_verbatim(path: PathBuf) -> PathBuf {
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(available: u64) -> VolumeSpace {
        VolumeSpace {
            total: 1 << 40,
            available,
        }
    }

    #[test]
    fn test_pick_longest_mount() {
        let disks = vec![
            (Path::new("/"), space(1)),
            (Path::new("/media/player"), space(2)),
            (Path::new("/media"), space(3)),
        ];

        let picked = pick_disk(disks.clone(), Path::new("/media/player/Music"));
        assert_eq!(picked.map(|s| s.available), Some(2));

        let picked = pick_disk(disks, Path::new("/home/user/Music"));
        assert_eq!(picked.map(|s| s.available), Some(1));
    }

    #[test]
    fn test_pick_no_match() {
        let disks = vec![(Path::new("/media/player"), space(2))];
        assert!(pick_disk(disks, Path::new("/home")).is_none());
    }
}
