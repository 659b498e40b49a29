use crate::cli::PathArgs;
use crate::config::SyncSettings;
use crate::core::format_bytes;
use crate::volume::{DiskSpaceProbe, SpaceProbe, VolumeRole};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// 显示目标卷容量
pub async fn show_space(config_dir: &Path, paths: PathArgs) -> Result<()> {
    let settings = SyncSettings::load(config_dir);
    let primary = paths
        .primary
        .or(settings.primary_path)
        .ok_or_else(|| anyhow!("未指定主设备目录"))?;
    let secondary = paths.secondary.or(settings.secondary_path);

    let probe = DiskSpaceProbe::new();
    let mut volumes: Vec<(VolumeRole, PathBuf)> = vec![(VolumeRole::Primary, primary)];
    if let Some(root) = secondary {
        volumes.push((VolumeRole::Secondary, root));
    }

    for (role, root) in volumes {
        let label = match role {
            VolumeRole::Primary => "Player",
            VolumeRole::Secondary => "Card",
        };
        match probe.space(&root).await {
            Ok(space) => println!(
                "{:<7} {}: {} free of {} ({:.0}% used)",
                label,
                root.display(),
                format_bytes(space.available),
                format_bytes(space.total),
                space.used_ratio() * 100.0
            ),
            Err(e) => println!("{:<7} {}: unavailable ({:#})", label, root.display(), e),
        }
    }

    Ok(())
}
